use log::trace;
use rustc_hash::FxHashMap;

use crate::bitstream::bitwriter::BitWriter;
use crate::error::{LzError, Result};
use crate::lz::format::{Format, MatchPacking, Variant};
use crate::lz::optimal_parse::{FieldState, ParseTable, Token};

/// Token counts and histograms gathered while encoding.
#[derive(Clone, Debug, Default)]
pub struct TokenStats {
    pub literals: usize,
    pub literal_frames: usize,
    pub matches: usize,
    pub matched_frames: usize,
    /// Empty length fields written between two tokens of the same kind.
    pub markers: usize,
    pub literal_runs: FxHashMap<usize, usize>,
    pub match_lens: FxHashMap<usize, usize>,
    pub offsets: FxHashMap<usize, usize>,
}

impl TokenStats {
    fn record(&mut self, token: &Token) {
        match *token {
            Token::Literal { len } => {
                self.literals += 1;
                self.literal_frames += len;
                *self.literal_runs.entry(len).or_insert(0) += 1;
            }
            Token::Match { len, offset } => {
                self.matches += 1;
                self.matched_frames += len;
                *self.match_lens.entry(len).or_insert(0) += 1;
                *self.offsets.entry(offset).or_insert(0) += 1;
            }
        }
    }

    /// Add the counts of another channel.
    pub fn merge(&mut self, other: &TokenStats) {
        self.literals += other.literals;
        self.literal_frames += other.literal_frames;
        self.matches += other.matches;
        self.matched_frames += other.matched_frames;
        self.markers += other.markers;
        for (dst, src) in [
            (&mut self.literal_runs, &other.literal_runs),
            (&mut self.match_lens, &other.match_lens),
            (&mut self.offsets, &other.offsets),
        ] {
            for (key, count) in src {
                *dst.entry(*key).or_insert(0) += count;
            }
        }
    }
}

/// Write a LZ4S length field: a nibble, then extension bytes when the nibble saturates. Below
/// a maximum of 256 the single extension byte holds the whole value, above it the bytes add
/// up to `value - 15` the LZ4 way.
pub fn encode_len(bw: &mut BitWriter, value: usize, max: usize) {
    bw.write_nibble(value.min(15) as u8);
    if value < 15 || max < 16 {
        return;
    }
    if max < 256 {
        bw.write_byte(value as u8);
        return;
    }
    let (mut rest, mut rest_max) = (value - 15, max - 15);
    bw.write_byte(rest.min(255) as u8);
    while rest >= 255 && rest_max > 255 {
        rest -= 255;
        rest_max -= 255;
        bw.write_byte(rest.min(255) as u8);
    }
}

/// Replays the parser's choices for one channel. The orchestrator calls encode() once per
/// frame, so the output of all channels ends up interleaved frame by frame.
#[derive(Debug)]
pub struct ChannelEncoder<'a> {
    data: &'a [u8],
    table: &'a ParseTable,
    format: &'a Format,
    /// Next position that starts a token.
    cursor: usize,
    state: FieldState,
    /// Bytes of the current LZ4S literal run not yet written.
    pending: usize,
    /// Payload bits written by this channel.
    pub bits: u64,
    pub stats: TokenStats,
}

impl<'a> ChannelEncoder<'a> {
    pub fn new(data: &'a [u8], table: &'a ParseTable, format: &'a Format) -> Self {
        Self {
            data,
            table,
            format,
            cursor: 0,
            state: FieldState::AfterMatch,
            pending: 0,
            bits: 0,
            stats: TokenStats::default(),
        }
    }

    /// Emit whatever this channel needs at frame `pos`. Frames must be passed in order.
    pub fn encode(&mut self, bw: &mut BitWriter, pos: usize) -> Result<()> {
        let start = bw.total_bits();
        if pos < self.cursor {
            // Inside a token: only the rest of a literal run has data here
            if self.pending > 0 {
                bw.write_byte(self.data[pos]);
                self.pending -= 1;
            }
        } else {
            if pos != self.cursor {
                return Err(LzError::Internal(format!(
                    "encoder at frame {} expected frame {}",
                    pos, self.cursor
                )));
            }
            let token = self.table.entry(pos, self.state).token;
            if token.is_empty() || pos + token.len() > self.data.len() {
                return Err(LzError::Internal(format!(
                    "parse table has no usable token at frame {}: {:?}",
                    pos, token
                )));
            }
            trace!("{} frame {}: {:?}", bw.loc(), pos, token);
            match self.format.variant {
                Variant::Lzss => self.lzss_token(bw, pos, &token),
                Variant::Lz4s => self.lz4s_token(bw, pos, &token),
            }
            self.stats.record(&token);
            self.cursor = pos + token.len();
            self.state = FieldState::after(&token);
        }
        self.bits += bw.total_bits() - start;
        Ok(())
    }

    fn lzss_token(&mut self, bw: &mut BitWriter, pos: usize, token: &Token) {
        let (len, offset) = match *token {
            Token::Literal { .. } => {
                bw.write_bit(true);
                bw.write_byte(self.data[pos]);
                return;
            }
            Token::Match { len, offset } => (len, offset),
        };
        bw.write_bit(false);
        let f = self.format;
        let code_pos = f.offset_code(pos, offset) as u32;
        let code_len = (len - f.min_match_len) as u32;
        match f.packing() {
            MatchPacking::Byte => bw.write_byte((code_pos << f.length_bits | code_len) as u8),
            MatchPacking::ByteNibble => {
                let low_bits = 8 - f.offset_bits as u32;
                let low = code_len & ((1 << low_bits) - 1);
                bw.write_byte((code_pos << low_bits | low) as u8);
                bw.write_nibble((code_len >> low_bits) as u8);
            }
            MatchPacking::TwoBytes => {
                let code = (code_len + 1) << f.offset_bits | code_pos;
                bw.write_byte((code & 0xff) as u8);
                bw.write_byte((code >> 8) as u8);
            }
        }
    }

    fn lz4s_token(&mut self, bw: &mut BitWriter, pos: usize, token: &Token) {
        if self.state.needs_marker(token) {
            match token {
                // Empty literal run before a match
                Token::Match { .. } => bw.write_nibble(0),
                // Empty match before a literal run
                Token::Literal { .. } => {
                    bw.write_nibble(15);
                    bw.write_byte(0);
                }
            }
            self.stats.markers += 1;
        }
        let f = self.format;
        match *token {
            Token::Literal { len } => {
                encode_len(bw, len, f.max_literal_len);
                bw.write_byte(self.data[pos]);
                self.pending = len - 1;
            }
            Token::Match { len, offset } => {
                encode_len(bw, len - f.min_match_len, f.match_field_max());
                let code = f.offset_code(pos, offset);
                for i in 0..f.offset_bytes() {
                    bw.write_byte((code >> (8 * i)) as u8);
                }
            }
        }
    }

    /// True once every frame of the channel has been covered.
    pub fn is_done(&self) -> bool {
        self.cursor >= self.data.len() && self.pending == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lz::optimal_parse::parse;

    fn encode_channel(data: &[u8], format: &Format) -> (Vec<u8>, u64, u64, TokenStats) {
        let table = parse(data, format).unwrap();
        let mut bw = BitWriter::new(data.len());
        let mut enc = ChannelEncoder::new(data, &table, format);
        for pos in 0..data.len() {
            enc.encode(&mut bw, pos).unwrap();
        }
        assert!(enc.is_done());
        let mut out = vec![];
        bw.flush(&mut out);
        (out, enc.bits, table.bits(), enc.stats)
    }

    #[test]
    fn extension_bytes_test() {
        let mut bw = BitWriter::new(8);
        encode_len(&mut bw, 14, 300);
        encode_len(&mut bw, 15, 300);
        encode_len(&mut bw, 15 + 255 + 3, 300);
        encode_len(&mut bw, 15, 15);
        let mut out = vec![];
        bw.flush(&mut out);
        // Nibble bytes are reserved when their first half is written.
        assert_eq!(out, vec![0xfe, 0x00, 0xff, 0xff, 0x03]);

        // The maximum is reached with a full byte, no zero byte follows.
        let mut bw = BitWriter::new(8);
        encode_len(&mut bw, 270, 270);
        let mut out = vec![];
        bw.flush(&mut out);
        assert_eq!(out, vec![0x0f, 0xff]);
    }

    #[test]
    fn full_value_extension_test() {
        let mut bw = BitWriter::new(8);
        encode_len(&mut bw, 20, 255);
        encode_len(&mut bw, 3, 255);
        encode_len(&mut bw, 15, 16);
        let mut out = vec![];
        bw.flush(&mut out);
        assert_eq!(out, vec![0x3f, 20, 0x0f, 15]);
    }

    #[test]
    fn lzss_repeated_byte_test() {
        let (out, bits, cost, stats) = encode_channel(&[5; 8], &Format::default());
        assert_eq!(bits, cost);
        // Escape bits 1 then 0, literal 5, match with code_pos 15 and code_len 5.
        assert_eq!(out, vec![0b01, 5, 0xf5]);
        assert_eq!(stats.literals, 1);
        assert_eq!(stats.matches, 1);
        assert_eq!(stats.match_lens.get(&7), Some(&1));
    }

    #[test]
    fn lzss_packings_test() {
        let data = [1_u8, 2, 3, 1, 2, 3, 1, 2, 3, 4];
        for format in [
            Format::lzss_preset(12).unwrap(),
            Format::lzss_preset(16).unwrap(),
            Format::lzss(Some(8), None, Some(12), 2).unwrap(),
        ] {
            let (_, bits, cost, stats) = encode_channel(&data, &format);
            assert_eq!(bits, cost, "{}", format);
            assert_eq!(stats.matched_frames + stats.literal_frames, data.len());
        }
    }

    #[test]
    fn lzss_byte_nibble_layout_test() {
        // Five literals, then 4 frames from 2 back: offset code 2 (source - 1), length code 2.
        let data = [9_u8, 8, 7, 1, 2, 1, 2, 1, 2];
        let (out, bits, cost, _) = encode_channel(&data, &Format::lzss_preset(12).unwrap());
        assert_eq!(bits, cost);
        assert_eq!(bits, 5 * 9 + 13);
        // Offset in the top 7 bits with the low length bit under it, then the high length bits.
        assert_eq!(out, vec![0b01_1111, 9, 8, 7, 1, 2, 2 << 1, 0x01]);
    }

    #[test]
    fn lzss_two_bytes_layout_test() {
        let data = [9_u8, 8, 7, 1, 2, 1, 2, 1, 2];
        let (out, bits, cost, _) = encode_channel(&data, &Format::lzss_preset(16).unwrap());
        assert_eq!(bits, cost);
        assert_eq!(bits, 5 * 9 + 17);
        // (length code + 1) << 8 | offset code, low byte first.
        assert_eq!(out, vec![0b01_1111, 9, 8, 7, 1, 2, 0x02, 0x04]);
    }

    #[test]
    fn lz4s_short_match_layout_test() {
        let format = Format::lz4s(8, 2, 255, 255).unwrap();
        let (out, bits, cost, _) = encode_channel(&[9, 1, 2, 1, 2, 7], &format);
        assert_eq!(bits, cost);
        // Run of 3, a 2 frame match is length code 0, then a final run of 1.
        assert_eq!(out, vec![0x03, 9, 1, 2, 0x00, 0x01, 7]);
    }

    #[test]
    fn lz4s_match_after_match_layout_test() {
        let format = Format::lz4s(8, 2, 255, 255).unwrap();
        let data = [5_u8, 6, 7, 5, 6, 7, 5, 6, 5, 6, 5, 6, 0];
        let (out, bits, cost, stats) = encode_channel(&data, &format);
        assert_eq!(bits, cost);
        assert_eq!(bits, 28 + 12 + 4 + 12 + 12);
        assert_eq!(stats.markers, 1);
        // Run of 3 and match code 3 share a byte, offset code 255. Then an empty run before
        // the match of 4 frames from 2 back (code 2, offset code 5), and a run of 1.
        assert_eq!(out, vec![0x33, 5, 6, 7, 0xff, 0x20, 0x05, 0x01, 0x00]);
    }

    #[test]
    fn lz4s_literal_after_literal_layout_test() {
        // Runs of at most 4: two runs with an empty match (15 then byte 0) between them.
        let format = Format::lz4s(8, 2, 255, 4).unwrap();
        let (out, bits, cost, stats) = encode_channel(&[1, 2, 3, 4, 5, 6], &format);
        assert_eq!(bits, cost);
        assert_eq!(bits, 20 + 12 + 36);
        assert_eq!(stats.markers, 1);
        assert_eq!(stats.literal_runs.get(&2), Some(&1));
        assert_eq!(stats.literal_runs.get(&4), Some(&1));
        assert_eq!(out, vec![0xf2, 1, 2, 0x00, 0x04, 3, 4, 5, 6]);
    }

    #[test]
    fn lz4s_literal_run_test() {
        let format = Format::lz4s(8, 2, 255, 255).unwrap();
        let (out, bits, cost, stats) = encode_channel(&[1, 2, 3, 4, 5], &format);
        assert_eq!(bits, cost);
        assert_eq!(out, vec![0x05, 1, 2, 3, 4, 5]);
        assert_eq!(stats.literal_runs.get(&5), Some(&1));
        assert_eq!(stats.markers, 0);
    }

    #[test]
    fn lz4s_bits_match_cost_test() {
        let data: Vec<u8> = (0..400_usize).map(|i| ((i * i) % 7 + i / 50) as u8).collect();
        for format in [
            Format::lz4s(8, 2, 255, 255).unwrap(),
            Format::lz4s(0, 1, 16, 4).unwrap(),
            Format::lz4s(12, 3, 1000, 600).unwrap(),
        ] {
            let (_, bits, cost, _) = encode_channel(&data, &format);
            assert_eq!(bits, cost, "{}", format);
        }
    }

    #[test]
    fn merge_test() {
        let mut a = TokenStats::default();
        a.record(&Token::Match { len: 3, offset: 1 });
        let mut b = TokenStats::default();
        b.record(&Token::Match { len: 3, offset: 2 });
        b.record(&Token::Literal { len: 2 });
        a.merge(&b);
        assert_eq!(a.matches, 2);
        assert_eq!(a.match_lens.get(&3), Some(&2));
        assert_eq!(a.offsets.len(), 2);
        assert_eq!(a.literal_frames, 2);
    }
}
