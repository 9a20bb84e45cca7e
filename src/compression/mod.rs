//! The compression module turns the per channel parses into one interleaved stream, and back.
//!
//! Compression happens in the following steps:
//! - Validation: every channel must have the same number of frames, within the frame limit.
//! - Loop trimming (optional): a repeated tail of the song is removed and reported as a loop point.
//! - Header: one flag bit per channel except channel 0. Constant channels set their flag and
//!   store their value, and are left out of the body.
//! - Parsing: every remaining channel gets an optimal parse, in parallel.
//! - Body: for every frame, each channel from the last to the first writes what it needs at
//!   that frame: a token start, one byte of a literal run, or nothing while inside a match.
//!
//! Decompression follows the same order, so a player only needs the channel count, the
//! frame count and the format to rebuild every register frame by frame.
//!

pub mod compress;
pub mod decompress;
pub mod loop_detect;
pub mod token_encoder;
