//! The bitstream module forms the I/O subsystem of lzsap.
//!
//! The compressed stream mixes single bits (LZSS escape bits, header flags), nibbles (LZ4S
//! length fields, the high part of 12 bit LZSS matches) and whole bytes. Bits and nibbles
//! are grouped into bytes that are reserved in the output as soon as the first bit or nibble
//! of the group is written, so a decoder reading the stream in order never has to look ahead.
//!
//! This I/O subsystem is designed to interface with the other modules of lzsap. It is not
//! intended for more general use.
//!
pub mod bitreader;
pub mod bitwriter;
