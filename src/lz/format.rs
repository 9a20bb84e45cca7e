use std::fmt::{Display, Formatter};

use crate::error::{LzError, Result};

/// Largest match or literal run a LZ4S length field may describe.
pub const LZ4S_MAX_RUN: usize = 65536;

/// The two wire formats
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
    /// One escape bit per token, single literals and fixed width match fields.
    Lzss,
    /// Alternating literal-run / match fields with nibble lengths and extension bytes.
    Lz4s,
}
impl Display for Variant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Variant::Lzss => write!(f, "LZSS"),
            Variant::Lz4s => write!(f, "LZ4S"),
        }
    }
}

/// What the parser picks when a literal and a match cost exactly the same.
///
/// Both choices are bit-optimal but produce different streams, so the choice is part of the
/// format definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TieBreak {
    PreferMatch,
    PreferLiteral,
}

/// How a LZSS match (offset + length code) is laid out on the stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchPacking {
    /// 8 bits: one byte.
    Byte,
    /// 9 to 12 bits: one byte plus one nibble.
    ByteNibble,
    /// 13 to 16 bits: two bytes, length code 0 reserved.
    TwoBytes,
}

/// Immutable description of a wire format. Built once, validated, then shared by reference
/// with every channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Format {
    pub variant: Variant,
    /// Bits of the match offset, the window is 2^offset_bits frames.
    pub offset_bits: u8,
    /// Bits of the LZSS match length code. Unused by LZ4S.
    pub length_bits: u8,
    pub min_match_len: usize,
    pub max_match_len: usize,
    pub max_literal_len: usize,
    pub tie_break: TieBreak,
    /// Forbid a match from covering the last frame of a channel.
    pub terminal_literal: bool,
}

impl Format {
    /// LZSS format. Any two of offset, length and total bits may be given, the third one is
    /// derived (offset defaults to 4, total to 8).
    pub fn lzss(
        offset_bits: Option<u8>,
        length_bits: Option<u8>,
        total_bits: Option<u8>,
        min_match_len: usize,
    ) -> Result<Self> {
        let (offset_bits, length_bits) = match (offset_bits, length_bits, total_bits) {
            (Some(_), Some(_), Some(_)) => {
                return Err(LzError::Config(
                    "only two of OFFSET, LENGTH and TOTAL bits should be given".to_string(),
                ))
            }
            (Some(o), Some(l), None) => (o, l),
            (None, Some(l), t) => {
                let t = t.unwrap_or(8);
                if l > t {
                    return Err(LzError::Config(format!(
                        "match length bits ({}) exceed total match bits ({})",
                        l, t
                    )));
                }
                (t - l, l)
            }
            (o, None, t) => {
                let (o, t) = (o.unwrap_or(4), t.unwrap_or(8));
                if o > t {
                    return Err(LzError::Config(format!(
                        "match offset bits ({}) exceed total match bits ({})",
                        o, t
                    )));
                }
                (o, t - o)
            }
        };
        let format = Self::lzss_raw(offset_bits, length_bits, min_match_len);
        format.validate()?;
        Ok(format)
    }

    /// LZSS presets by total match bits: 8 (4+4), 12 (7+5) and 16 (8+8, single byte matches).
    pub fn lzss_preset(total_bits: u8) -> Result<Self> {
        let format = match total_bits {
            8 => Self::lzss_raw(4, 4, 2),
            12 => Self::lzss_raw(7, 5, 2),
            16 => Self::lzss_raw(8, 8, 1),
            other => {
                return Err(LzError::Config(format!(
                    "no LZSS preset for {} bit matches, use 8, 12 or 16",
                    other
                )))
            }
        };
        format.validate()?;
        Ok(format)
    }

    fn lzss_raw(offset_bits: u8, length_bits: u8, min_match_len: usize) -> Self {
        let total = offset_bits.saturating_add(length_bits);
        // The two byte layout reserves length code 0.
        let codes = match total {
            13..=16 => (1_usize << length_bits.min(16)) - 1,
            _ => 1_usize << length_bits.min(16),
        };
        Self {
            variant: Variant::Lzss,
            offset_bits,
            length_bits,
            min_match_len,
            max_match_len: min_match_len + codes - 1,
            max_literal_len: 1,
            tie_break: TieBreak::PreferLiteral,
            terminal_literal: false,
        }
    }

    /// LZ4S format with explicit limits.
    pub fn lz4s(
        offset_bits: u8,
        min_match_len: usize,
        max_match_len: usize,
        max_literal_len: usize,
    ) -> Result<Self> {
        let format = Self {
            variant: Variant::Lz4s,
            offset_bits,
            length_bits: 0,
            min_match_len,
            max_match_len,
            max_literal_len,
            tie_break: TieBreak::PreferMatch,
            terminal_literal: true,
        };
        format.validate()?;
        Ok(format)
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn with_terminal_literal(mut self, terminal_literal: bool) -> Self {
        self.terminal_literal = terminal_literal;
        self
    }

    /// Check every parameter. The fields are public, so compression validates again before
    /// any parsing starts.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(LzError::Config(msg));
        if !(1..=16).contains(&self.min_match_len) {
            return bad("minimum match length should be from 1 to 16".to_string());
        }
        match self.variant {
            Variant::Lzss => {
                let total = self.total_match_bits();
                if !(8..=16).contains(&total) {
                    return bad("total match bits should be from 8 to 16".to_string());
                }
                if self.offset_bits > 12 {
                    return bad("match offset bits should be from 0 to 12".to_string());
                }
                if !(2..=16).contains(&self.length_bits) {
                    return bad("match length bits should be from 2 to 16".to_string());
                }
                if self.packing() == MatchPacking::ByteNibble && self.offset_bits > 8 {
                    return bad(format!(
                        "a {} bit match packs the offset in one byte, offset bits should be at most 8",
                        total
                    ));
                }
                if self.max_literal_len != 1 {
                    return bad("LZSS codes one literal at a time".to_string());
                }
                let codes = match self.packing() {
                    MatchPacking::TwoBytes => (1_usize << self.length_bits) - 1,
                    _ => 1_usize << self.length_bits,
                };
                if self.max_match_len < self.min_match_len
                    || self.max_match_len > self.min_match_len + codes - 1
                {
                    return bad(format!(
                        "maximum match length {} does not fit in {} length bits",
                        self.max_match_len, self.length_bits
                    ));
                }
            }
            Variant::Lz4s => {
                if self.offset_bits > 16 {
                    return bad("match offset bits should be from 0 to 16".to_string());
                }
                if self.max_match_len < self.min_match_len || self.max_match_len > LZ4S_MAX_RUN {
                    return bad(format!(
                        "max match run length should be from {} to {}",
                        self.min_match_len, LZ4S_MAX_RUN
                    ));
                }
                if !(1..=LZ4S_MAX_RUN).contains(&self.max_literal_len) {
                    return bad(format!(
                        "max literal run length should be from 1 to {}",
                        LZ4S_MAX_RUN
                    ));
                }
            }
        }
        Ok(())
    }

    /// Maximum backward distance of a match, in frames.
    pub fn window(&self) -> usize {
        1 << self.offset_bits
    }

    pub fn total_match_bits(&self) -> u8 {
        self.offset_bits.saturating_add(self.length_bits)
    }

    /// Layout of a LZSS match field.
    pub fn packing(&self) -> MatchPacking {
        match self.total_match_bits() {
            0..=8 => MatchPacking::Byte,
            9..=12 => MatchPacking::ByteNibble,
            _ => MatchPacking::TwoBytes,
        }
    }

    /// Number of offset bytes following a LZ4S match length.
    pub fn offset_bytes(&self) -> usize {
        (self.offset_bits as usize + 7) / 8
    }

    /// Maximum that selects the extension layout of the LZ4S match length field. The field
    /// stores `length - min`, but the layout follows the maximum match length itself.
    pub fn match_field_max(&self) -> usize {
        self.max_match_len
    }

    /// LZ4S match length code that reads the same as an empty match field (nibble 15, byte
    /// 0) and so can't be used. Only fields with LZ4 style extension bytes have one.
    pub fn reserved_match_code(&self) -> Option<usize> {
        (self.variant == Variant::Lz4s && self.match_field_max() >= 256).then(|| 15)
    }

    /// Offset code stored on the stream: the window slot just before the match source.
    pub fn offset_code(&self, pos: usize, offset: usize) -> usize {
        (pos - offset + self.window() - 1) & (self.window() - 1)
    }

    /// Inverse of offset_code(), given the position being decoded.
    pub fn offset_from_code(&self, pos: usize, code: usize) -> usize {
        let window = self.window();
        let distance = (pos + window - 1 - code % window) % window;
        if distance == 0 {
            window
        } else {
            distance
        }
    }
}

impl Default for Format {
    fn default() -> Self {
        Self::lzss_raw(4, 4, 2)
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.variant {
            Variant::Lzss => write!(
                f,
                "LZSS: max offset= {},\tmax len= {},\tmatch bits= {}",
                self.window(),
                self.max_match_len,
                self.total_match_bits()
            ),
            Variant::Lz4s => write!(
                f,
                "LZ4S: max offset= {},\tmax mlen= {},\tmax llen= {}",
                self.window(),
                self.max_match_len,
                self.max_literal_len
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lzss_two_of_three_test() {
        let f = Format::lzss(None, None, None, 2).unwrap();
        assert_eq!((f.offset_bits, f.length_bits), (4, 4));
        assert_eq!(f.max_match_len, 17);
        let f = Format::lzss(Some(7), None, Some(12), 2).unwrap();
        assert_eq!((f.offset_bits, f.length_bits), (7, 5));
        assert_eq!(f.packing(), MatchPacking::ByteNibble);
        let f = Format::lzss(None, Some(6), Some(14), 3).unwrap();
        assert_eq!((f.offset_bits, f.length_bits), (8, 6));
        assert_eq!(f.max_match_len, 3 + 62);
        assert!(Format::lzss(Some(4), Some(4), Some(8), 2).is_err());
    }

    #[test]
    fn lzss_limits_test() {
        assert!(Format::lzss(Some(4), None, Some(20), 2).is_err());
        assert!(Format::lzss(Some(13), Some(3), None, 2).is_err());
        assert!(Format::lzss(Some(10), Some(2), None, 2).is_err());
        assert!(Format::lzss(Some(4), Some(4), None, 0).is_err());
        let mut f = Format::default();
        f.max_match_len = 40;
        assert!(f.validate().is_err());
    }

    #[test]
    fn presets_test() {
        let f = Format::lzss_preset(16).unwrap();
        assert_eq!(f.packing(), MatchPacking::TwoBytes);
        assert_eq!(f.max_match_len, 1 + 254);
        assert_eq!(Format::lzss_preset(12).unwrap().window(), 128);
        assert!(Format::lzss_preset(10).is_err());
    }

    #[test]
    fn lz4s_limits_test() {
        let f = Format::lz4s(8, 2, 255, 255).unwrap();
        assert_eq!(f.offset_bytes(), 1);
        assert_eq!(f.match_field_max(), 255);
        assert_eq!(f.reserved_match_code(), None);
        assert_eq!(Format::lz4s(8, 2, 256, 255).unwrap().reserved_match_code(), Some(15));
        assert_eq!(Format::default().reserved_match_code(), None);
        assert_eq!(Format::lz4s(0, 2, 255, 255).unwrap().offset_bytes(), 0);
        assert_eq!(Format::lz4s(9, 2, 255, 255).unwrap().offset_bytes(), 2);
        assert!(Format::lz4s(17, 2, 255, 255).is_err());
        assert!(Format::lz4s(8, 2, 1, 255).is_err());
        assert!(Format::lz4s(8, 2, 255, 0).is_err());
        assert!(Format::lz4s(8, 2, 70000, 255).is_err());
    }

    #[test]
    fn offset_code_round_trip_test() {
        for bits in [0_u8, 1, 4, 8] {
            let f = Format::lz4s(bits, 2, 255, 255).unwrap();
            for pos in 1..300 {
                for offset in 1..=f.window().min(pos) {
                    let code = f.offset_code(pos, offset);
                    assert!(code < f.window());
                    assert_eq!(f.offset_from_code(pos, code), offset);
                }
            }
        }
    }
}
