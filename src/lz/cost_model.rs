use super::format::{Format, MatchPacking, Variant};
use super::optimal_parse::Token;

/// Cost of anything the format cannot represent. Large enough to never be chosen, small
/// enough that adding a few of them together cannot overflow.
pub const INFINITE_COST: u64 = 1 << 40;

const NIBBLE_BITS: u64 = 4;
const BYTE_BITS: u64 = 8;

/// Cost in bits of a nibble length field. Values below 15 fit the nibble, larger ones store
/// 15 in the nibble followed by:
/// - nothing, when the field maximum is below 16,
/// - one byte with the whole value, when the maximum is below 256,
/// - LZ4 style bytes of `value - 15`, 255 at a time, ending with a byte below 255 or when
///   the maximum left can't reach another byte.
pub fn length_field_cost(value: usize, max: usize) -> u64 {
    if value > max {
        return INFINITE_COST;
    }
    if value < 15 || max < 16 {
        return NIBBLE_BITS;
    }
    if max < 256 {
        return NIBBLE_BITS + BYTE_BITS;
    }
    let (rest, rest_max) = (value - 15, max - 15);
    let mut bytes = 1 + rest / 255;
    if rest == rest_max && rest >= 255 && rest % 255 == 0 {
        bytes -= 1;
    }
    NIBBLE_BITS + BYTE_BITS * bytes as u64
}

/// Bit costs of every token a format can emit. These must agree exactly with what the
/// TokenEncoder writes, or the parse is no longer optimal.
#[derive(Clone, Copy, Debug)]
pub struct CostModel<'a> {
    format: &'a Format,
}

impl<'a> CostModel<'a> {
    pub fn new(format: &'a Format) -> Self {
        Self { format }
    }

    /// Bits spent telling a literal from a match.
    pub fn escape_bits(&self) -> u64 {
        match self.format.variant {
            Variant::Lzss => 1,
            Variant::Lz4s => 0,
        }
    }

    /// Fixed bits of a match besides its length: the packed LZSS field or the LZ4S offset bytes.
    pub fn offset_field_bits(&self) -> u64 {
        match self.format.variant {
            Variant::Lzss => match self.format.packing() {
                MatchPacking::Byte => BYTE_BITS,
                MatchPacking::ByteNibble => BYTE_BITS + NIBBLE_BITS,
                MatchPacking::TwoBytes => 2 * BYTE_BITS,
            },
            Variant::Lz4s => BYTE_BITS * self.format.offset_bytes() as u64,
        }
    }

    /// Extra bits needed by the length of a match.
    pub fn match_cost(&self, len: usize) -> u64 {
        if len < self.format.min_match_len || len > self.format.max_match_len {
            return INFINITE_COST;
        }
        let code = len - self.format.min_match_len;
        match self.format.variant {
            // The length code is part of the fixed width field.
            Variant::Lzss => 0,
            Variant::Lz4s if self.format.reserved_match_code() == Some(code) => INFINITE_COST,
            Variant::Lz4s => length_field_cost(code, self.format.match_field_max()),
        }
    }

    /// Extra bits needed by the length of a literal run, not counting the literal bytes.
    pub fn literal_cost(&self, len: usize) -> u64 {
        if len == 0 || len > self.format.max_literal_len {
            return INFINITE_COST;
        }
        match self.format.variant {
            Variant::Lzss => 0,
            Variant::Lz4s => length_field_cost(len, self.format.max_literal_len),
        }
    }

    /// The empty field written before `token` when it follows a token of the same kind: an
    /// empty literal run (nibble 0) before a match, an empty match (nibble 15, byte 0) before
    /// a literal run.
    pub fn marker_cost(&self, token: &Token) -> u64 {
        match (self.format.variant, token) {
            (Variant::Lzss, _) => 0,
            (Variant::Lz4s, Token::Match { .. }) => NIBBLE_BITS,
            (Variant::Lz4s, Token::Literal { .. }) => NIBBLE_BITS + BYTE_BITS,
        }
    }

    /// Full cost of a literal run of `len` frames, data bytes included.
    pub fn literal_token(&self, len: usize) -> u64 {
        self.escape_bits() + self.literal_cost(len) + BYTE_BITS * len as u64
    }

    /// Full cost of a match of `len` frames.
    pub fn match_token(&self, len: usize) -> u64 {
        self.escape_bits() + self.offset_field_bits() + self.match_cost(len)
    }

    /// Runs of literal lengths that share one header cost, as (first, last, cost) with
    /// `last <= max_literal_len`. The parser minimizes over each run separately.
    pub fn literal_brackets(&self) -> Vec<(usize, usize, u64)> {
        let max = self.format.max_literal_len;
        if self.format.variant == Variant::Lzss || max < 16 {
            return vec![(1, max, self.literal_cost(1))];
        }
        let mut brackets: Vec<(usize, usize, u64)> = vec![(1, 14, NIBBLE_BITS)];
        let mut first = 15;
        while first <= max {
            let last = (first + 254).min(max);
            let cost = length_field_cost(first, max);
            // A maximum that ends exactly on a 255 step saves its last byte.
            match brackets.last_mut() {
                Some(prev) if prev.2 == cost => prev.1 = last,
                _ => brackets.push((first, last, cost)),
            }
            first = last + 1;
        }
        brackets
    }
}
