use thiserror::Error;

/// Everything that can go wrong while configuring, compressing or decoding a stream.
#[derive(Error, Debug)]
pub enum LzError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("channel #{channel} has {got} frames, expected {expected}")]
    ChannelLength {
        channel: usize,
        expected: usize,
        got: usize,
    },
    #[error("input has {frames} frames, the limit is {limit}")]
    TooManyFrames { frames: usize, limit: usize },
    #[error("internal error: {0}")]
    Internal(String),
    #[error("compressed stream ended early at frame {0}")]
    Truncated(usize),
    #[error("corrupt stream: {0}")]
    Corrupt(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LzError>;
