//! Optimal LZ compression of SAP type R music files.
//!
//! A SAP type R file is a dump of the 9 POKEY sound registers taken once per video frame.
//! lzsap compresses each register as its own stream with a bit-optimal LZSS or LZ4S parse and
//! interleaves the streams frame by frame, so a 6502 player can decode one frame at a time
//! with a small circular buffer per register.
//!
//! Basic usage to compress a file is as follows:
//!
//! `$> lzsap song.sap song.lzs`
//!
//! Add `-F lz4s` for the LZ4S format, `--test` to check the result decodes back to the input,
//! and `-t` to remove a repeated tail of the song.
//!
pub mod bitstream;
pub mod compression;
pub mod error;
pub mod lz;
pub mod tools;
