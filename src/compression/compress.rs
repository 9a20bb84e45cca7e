use log::{debug, info, warn};
use rayon::prelude::*;

use super::loop_detect::{find_loop, LoopPoint};
use super::token_encoder::{ChannelEncoder, TokenStats};
use crate::bitstream::bitwriter::BitWriter;
use crate::error::{LzError, Result};
use crate::lz::format::Format;
use crate::lz::optimal_parse::{parse, ParseTable};

/// Largest song accepted by default, in frames (about 43 minutes at 50Hz).
pub const DEFAULT_MAX_FRAMES: usize = 128 * 1024;
/// Shortest repeated tail worth trimming by default, in frames.
pub const DEFAULT_MIN_LOOP_FRAMES: usize = 64;

/// Everything compress() needs besides the data.
#[derive(Clone, Debug)]
pub struct CompressConfig {
    pub format: Format,
    /// Drop a repeated tail and report where the player should loop.
    pub trim_loops: bool,
    pub min_loop_frames: usize,
    pub max_frames: usize,
}

impl Default for CompressConfig {
    fn default() -> Self {
        Self {
            format: Format::default(),
            trim_loops: false,
            min_loop_frames: DEFAULT_MIN_LOOP_FRAMES,
            max_frames: DEFAULT_MAX_FRAMES,
        }
    }
}

/// What happened to the input, for the user.
#[derive(Clone, Debug)]
pub struct CompressionReport {
    pub format: Format,
    pub channels: usize,
    /// Frames before trimming.
    pub input_frames: usize,
    /// Frames actually encoded.
    pub frames: usize,
    /// Bits of the channel flags and constant values.
    pub header_bits: u64,
    /// Payload bits of each channel, None for constant channels left out of the body.
    pub channel_bits: Vec<Option<u64>>,
    /// Constant channels as (channel, value).
    pub constants: Vec<(usize, u8)>,
    pub loop_point: Option<LoopPoint>,
    pub total_bytes: usize,
    pub stats: TokenStats,
}

impl CompressionReport {
    /// Output size as a percentage of the encoded input.
    pub fn ratio(&self) -> f64 {
        let input = self.channels * self.frames;
        if input == 0 {
            return 0.0;
        }
        100.0 * self.total_bytes as f64 / input as f64
    }
}

/// A compressed stream and its report.
#[derive(Clone, Debug)]
pub struct Compressed {
    pub data: Vec<u8>,
    pub report: CompressionReport,
}

/// How a constant channel 0 is described in the warning.
fn constant_note(value: u8) -> String {
    if value == 0 {
        "is empty".to_string()
    } else {
        format!("contains only ${:02X}", value)
    }
}

/// The single value of a channel, if all its frames agree. Empty channels have none.
fn constant_value(data: &[u8]) -> Option<u8> {
    let first = *data.first()?;
    data.iter().all(|&b| b == first).then(|| first)
}

fn check_input(channels: &[Vec<u8>], config: &CompressConfig) -> Result<usize> {
    config.format.validate()?;
    let expected = match channels.first() {
        Some(c) => c.len(),
        None => return Err(LzError::Config("no channels to compress".to_string())),
    };
    for (channel, data) in channels.iter().enumerate() {
        if data.len() != expected {
            return Err(LzError::ChannelLength {
                channel,
                expected,
                got: data.len(),
            });
        }
    }
    if expected > config.max_frames {
        return Err(LzError::TooManyFrames {
            frames: expected,
            limit: config.max_frames,
        });
    }
    Ok(expected)
}

/// Compress equal length channels into one stream:
/// - a header with one flag bit per channel (from the last channel down to channel 1) and the
///   value of every constant channel,
/// - the tokens of every other channel, interleaved frame by frame from the last channel down
///   to channel 0.
///
/// Each channel is parsed on its own, in parallel.
pub fn compress(channels: &[Vec<u8>], config: &CompressConfig) -> Result<Compressed> {
    let input_frames = check_input(channels, config)?;
    let format = &config.format;

    let loop_point = if config.trim_loops {
        find_loop(channels, config.min_loop_frames)
    } else {
        None
    };
    let frames = loop_point.map_or(input_frames, |lp| lp.frames);
    if let Some(lp) = loop_point {
        info!(
            "Removed {} repeated frames, song now loops from frame {} back to frame {}.",
            lp.removed, lp.frames, lp.target
        );
    }
    let channels: Vec<&[u8]> = channels.iter().map(|c| &c[..frames]).collect();

    //----- Header
    let mut bw = BitWriter::new(frames * channels.len() / 2 + channels.len());
    let mut data = Vec::with_capacity(frames * channels.len() / 2 + channels.len());
    let mut constants = vec![None; channels.len()];
    if frames == 0 {
        warn!("Input is empty, should not be compressed!");
    }
    for (i, channel) in channels.iter().enumerate().rev() {
        let value = constant_value(channel);
        if i == 0 {
            if let Some(v) = value {
                warn!(
                    "Stream #0 {}, should not be included in output!",
                    constant_note(v)
                );
            }
            continue;
        }
        match value {
            Some(v) => {
                info!("Skipping channel #{}, set with ${:02x}.", i, v);
                bw.write_bit(true);
                bw.write_byte(v);
                constants[i] = Some(v);
            }
            None => bw.write_bit(false),
        }
    }
    let header_bits = bw.total_bits();
    bw.flush(&mut data);
    debug!("Header written, stream at {}", bw.loc());

    //----- Parse every channel that needs a body
    let tables = channels
        .par_iter()
        .zip(constants.par_iter())
        .map(|(channel, constant)| match constant {
            Some(_) => Ok(None),
            None => parse(channel, format).map(Some),
        })
        .collect::<Result<Vec<Option<ParseTable>>>>()?;

    //----- Body
    let mut encoders: Vec<Option<ChannelEncoder<'_>>> = channels
        .iter()
        .zip(&tables)
        .map(|(channel, table)| {
            table
                .as_ref()
                .map(|table| ChannelEncoder::new(channel, table, format))
        })
        .collect();
    for pos in 0..frames {
        for encoder in encoders.iter_mut().rev().flatten() {
            encoder.encode(&mut bw, pos)?;
        }
    }
    bw.flush(&mut data);

    //----- Check and report
    let mut stats = TokenStats::default();
    let mut channel_bits = Vec::with_capacity(channels.len());
    for (i, (encoder, table)) in encoders.iter().zip(&tables).enumerate() {
        match (encoder, table) {
            (Some(encoder), Some(table)) => {
                if encoder.bits != table.bits() || !encoder.is_done() {
                    return Err(LzError::Internal(format!(
                        "channel #{} wrote {} bits, the parser predicted {}",
                        i,
                        encoder.bits,
                        table.bits()
                    )));
                }
                stats.merge(&encoder.stats);
                channel_bits.push(Some(encoder.bits));
            }
            _ => channel_bits.push(None),
        }
    }

    let report = CompressionReport {
        format: format.clone(),
        channels: channels.len(),
        input_frames,
        frames,
        header_bits,
        channel_bits,
        constants: constants
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|v| (i, v)))
            .collect(),
        loop_point,
        total_bytes: data.len(),
        stats,
    };
    Ok(Compressed { data, report })
}
