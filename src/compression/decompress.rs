use log::{debug, trace};

use crate::bitstream::bitreader::BitReader;
use crate::error::{LzError, Result};
use crate::lz::format::{Format, MatchPacking, Variant};
use crate::lz::optimal_parse::FieldState;

/// Decode state of one channel.
#[derive(Debug)]
struct ChannelDecoder {
    out: Vec<u8>,
    /// Literal bytes of the current run still to read.
    literal_left: usize,
    /// Frames of the current match still to copy.
    copy_left: usize,
    offset: usize,
    /// LZ4S only: which length field comes next.
    state: FieldState,
}

/// Read a LZ4S literal run length field.
fn read_len<R: std::io::Read>(br: &mut BitReader<R>, max: usize, pos: usize) -> Result<usize> {
    let nibble = br.nibble().ok_or(LzError::Truncated(pos))? as usize;
    if nibble < 15 || max < 16 {
        return Ok(nibble);
    }
    let first = next_byte(br, pos)?;
    read_extension(br, first, max, pos)
}

/// Read a LZ4S match length field. None for an empty match: nibble 15 followed by byte 0.
fn read_match_code<R: std::io::Read>(
    br: &mut BitReader<R>,
    max: usize,
    pos: usize,
) -> Result<Option<usize>> {
    let nibble = br.nibble().ok_or(LzError::Truncated(pos))? as usize;
    if nibble < 15 {
        return Ok(Some(nibble));
    }
    let first = next_byte(br, pos)?;
    if first == 0 {
        return Ok(None);
    }
    if max < 16 {
        return Err(LzError::Corrupt(format!(
            "match length code above 14 at frame {}",
            pos
        )));
    }
    read_extension(br, first, max, pos).map(Some)
}

/// Rest of a length field after its first extension byte.
fn read_extension<R: std::io::Read>(
    br: &mut BitReader<R>,
    first: u8,
    max: usize,
    pos: usize,
) -> Result<usize> {
    if max < 256 {
        return Ok(first as usize);
    }
    let (mut value, mut rest_max) = (15 + first as usize, max - 15);
    let mut byte = first;
    while byte == 255 && rest_max > 255 {
        rest_max -= 255;
        byte = next_byte(br, pos)?;
        value += byte as usize;
    }
    Ok(value)
}

fn next_byte<R: std::io::Read>(br: &mut BitReader<R>, pos: usize) -> Result<u8> {
    br.byte().ok_or(LzError::Truncated(pos))
}

impl ChannelDecoder {
    fn new(frames: usize) -> Self {
        Self {
            out: Vec::with_capacity(frames),
            literal_left: 0,
            copy_left: 0,
            offset: 0,
            state: FieldState::AfterMatch,
        }
    }

    /// Produce the value of frame `pos`.
    fn decode<R: std::io::Read>(
        &mut self,
        br: &mut BitReader<R>,
        format: &Format,
        pos: usize,
        frames: usize,
    ) -> Result<()> {
        if self.copy_left > 0 {
            let value = self.out[pos - self.offset];
            self.out.push(value);
            self.copy_left -= 1;
            return Ok(());
        }
        if self.literal_left > 0 {
            self.out.push(next_byte(br, pos)?);
            self.literal_left -= 1;
            return Ok(());
        }
        match format.variant {
            Variant::Lzss => {
                if br.bit().ok_or(LzError::Truncated(pos))? {
                    self.out.push(next_byte(br, pos)?);
                    return Ok(());
                }
                let (code_len, code_pos) = lzss_match_field(br, format, pos)?;
                let len = code_len + format.min_match_len;
                self.start_match(format, pos, frames, len, code_pos)
            }
            Variant::Lz4s => {
                let mut run = 0;
                let mut code = None;
                if self.state == FieldState::AfterMatch {
                    run = read_len(br, format.max_literal_len, pos)?;
                    if run == 0 {
                        code = read_match_code(br, format.match_field_max(), pos)?;
                    }
                } else {
                    code = read_match_code(br, format.match_field_max(), pos)?;
                    if code.is_none() {
                        run = read_len(br, format.max_literal_len, pos)?;
                    }
                }
                match code {
                    Some(code) => {
                        let mut code_pos = 0;
                        for i in 0..format.offset_bytes() {
                            code_pos |= (next_byte(br, pos)? as usize) << (8 * i);
                        }
                        self.state = FieldState::AfterMatch;
                        let len = code + format.min_match_len;
                        self.start_match(format, pos, frames, len, code_pos)
                    }
                    None if run == 0 => Err(LzError::Corrupt(format!(
                        "two empty length fields in a row at frame {}",
                        pos
                    ))),
                    None => {
                        if run > format.max_literal_len || pos + run > frames {
                            return Err(LzError::Corrupt(format!(
                                "literal run of {} frames at frame {}",
                                run, pos
                            )));
                        }
                        self.out.push(next_byte(br, pos)?);
                        self.literal_left = run - 1;
                        self.state = FieldState::AfterLiteral;
                        Ok(())
                    }
                }
            }
        }
    }

    fn start_match(
        &mut self,
        format: &Format,
        pos: usize,
        frames: usize,
        len: usize,
        code_pos: usize,
    ) -> Result<()> {
        let offset = format.offset_from_code(pos, code_pos);
        if offset > pos || len > format.max_match_len || pos + len > frames {
            return Err(LzError::Corrupt(format!(
                "match of {} frames from {} back at frame {}",
                len, offset, pos
            )));
        }
        let value = self.out[pos - offset];
        self.out.push(value);
        self.copy_left = len - 1;
        self.offset = offset;
        Ok(())
    }
}

/// Read a packed LZSS match field as (length code, offset code).
fn lzss_match_field<R: std::io::Read>(
    br: &mut BitReader<R>,
    format: &Format,
    pos: usize,
) -> Result<(usize, usize)> {
    let ob = format.offset_bits as u32;
    let lb = format.length_bits as u32;
    match format.packing() {
        MatchPacking::Byte => {
            let byte = next_byte(br, pos)? as u32;
            Ok(((byte & ((1 << lb) - 1)) as usize, (byte >> lb) as usize))
        }
        MatchPacking::ByteNibble => {
            let byte = next_byte(br, pos)? as u32;
            let high = br.nibble().ok_or(LzError::Truncated(pos))? as u32;
            let low_bits = 8 - ob;
            let code_len = (byte & ((1 << low_bits) - 1)) | high << low_bits;
            Ok((code_len as usize, (byte >> low_bits) as usize))
        }
        MatchPacking::TwoBytes => {
            let low = next_byte(br, pos)? as u32;
            let high = next_byte(br, pos)? as u32;
            let code = low | high << 8;
            let len_code = code >> ob;
            if len_code == 0 {
                return Err(LzError::Corrupt(format!(
                    "reserved match length code at frame {}",
                    pos
                )));
            }
            Ok(((len_code - 1) as usize, (code & ((1 << ob) - 1)) as usize))
        }
    }
}

/// Rebuild `channels` channels of `frames` frames from a stream made by compress(). The
/// channel count, frame count and format are not stored in the stream.
pub fn decompress(
    data: &[u8],
    channels: usize,
    frames: usize,
    format: &Format,
) -> Result<Vec<Vec<u8>>> {
    format.validate()?;
    if channels == 0 {
        return Err(LzError::Config("no channels to decompress".to_string()));
    }
    let mut br = BitReader::new(data);

    // Header: flags from the last channel down to channel 1, each set flag followed by a value
    let mut constants = vec![None; channels];
    for i in (1..channels).rev() {
        if br.bit().ok_or(LzError::Truncated(0))? {
            constants[i] = Some(next_byte(&mut br, 0)?);
        }
    }
    br.align();
    debug!("Header read, constant channels {:?}", constants);

    let mut decoders: Vec<Option<ChannelDecoder>> = constants
        .iter()
        .map(|c| c.is_none().then(|| ChannelDecoder::new(frames)))
        .collect();
    for pos in 0..frames {
        for decoder in decoders.iter_mut().rev().flatten() {
            decoder.decode(&mut br, format, pos, frames)?;
        }
    }
    if br.byte().is_some() {
        return Err(LzError::Corrupt(format!(
            "unused data after {} frames at {}",
            frames,
            br.loc()
        )));
    }
    trace!("Stream fully decoded at {}", br.loc());

    Ok(decoders
        .into_iter()
        .zip(constants)
        .map(|(decoder, constant)| match (decoder, constant) {
            (Some(decoder), _) => decoder.out,
            (None, Some(v)) => vec![v; frames],
            (None, None) => vec![],
        })
        .collect())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compression::compress::{compress, CompressConfig};
    use crate::lz::format::TieBreak;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    /// Channels that look a bit like register dumps: slow ramps, repeats and some noise.
    fn song(rng: &mut StdRng, channels: usize, frames: usize) -> Vec<Vec<u8>> {
        (0..channels)
            .map(|c| {
                let period = rng.gen_range(2..40);
                let pattern: Vec<u8> = (0..period).map(|_| rng.gen_range(0..8) * c as u8).collect();
                (0..frames)
                    .map(|i| {
                        if rng.gen_ratio(1, 20) {
                            rng.gen()
                        } else {
                            pattern[i % period]
                        }
                    })
                    .collect()
            })
            .collect()
    }

    fn round_trip(channels: &[Vec<u8>], config: &CompressConfig) {
        let out = compress(channels, config).unwrap();
        let frames = out.report.frames;
        let back = decompress(&out.data, channels.len(), frames, &config.format).unwrap();
        for (c, (orig, back)) in channels.iter().zip(&back).enumerate() {
            assert_eq!(&orig[..frames], back.as_slice(), "channel {} {}", c, config.format);
        }
    }

    #[test]
    fn round_trip_formats_test() {
        let mut rng = StdRng::seed_from_u64(2023);
        let formats = [
            Format::default(),
            Format::lzss_preset(12).unwrap(),
            Format::lzss_preset(16).unwrap(),
            Format::lzss(Some(0), None, Some(8), 2).unwrap(),
            Format::lzss(Some(8), None, Some(12), 3).unwrap(),
            Format::lzss(Some(12), None, Some(16), 2).unwrap(),
            Format::lz4s(8, 2, 255, 255).unwrap(),
            Format::lz4s(0, 1, 16, 8).unwrap(),
            Format::lz4s(12, 3, 2000, 600).unwrap(),
            Format::lz4s(16, 2, 65536, 65536).unwrap(),
        ];
        for format in formats {
            let channels = song(&mut rng, 9, 700);
            round_trip(&channels, &CompressConfig { format: format.clone(), ..Default::default() });
            let format = format.with_tie_break(TieBreak::PreferMatch).with_terminal_literal(false);
            round_trip(&channels, &CompressConfig { format, ..Default::default() });
        }
    }

    #[test]
    fn long_runs_round_trip_test() {
        // Runs long enough for several LZ4S extension bytes.
        let mut channel = vec![0_u8; 1200];
        channel.extend((0..700).map(|i| (i * 7 % 251) as u8));
        channel.extend(vec![3_u8; 900]);
        let channels = vec![channel.clone(), channel.iter().rev().cloned().collect()];
        for format in [
            Format::lz4s(8, 2, 255, 255).unwrap(),
            Format::lz4s(4, 2, 5000, 5000).unwrap(),
            Format::default(),
        ] {
            round_trip(&channels, &CompressConfig { format, ..Default::default() });
        }
    }

    #[test]
    fn constant_channels_round_trip_test() {
        let channels = vec![vec![1, 2, 3, 4, 5], vec![7; 5], vec![0; 5], vec![1, 1, 2, 2, 9]];
        round_trip(&channels, &CompressConfig::default());
        round_trip(
            &channels,
            &CompressConfig {
                format: Format::lz4s(8, 2, 255, 255).unwrap(),
                ..Default::default()
            },
        );
    }

    #[test]
    fn trimmed_round_trip_test() {
        let mut rng = StdRng::seed_from_u64(5);
        let intro = song(&mut rng, 3, 50);
        let chorus = song(&mut rng, 3, 64);
        let channels: Vec<Vec<u8>> = intro
            .iter()
            .zip(&chorus)
            .map(|(a, b)| [a.as_slice(), b, b, b].concat())
            .collect();
        let config = CompressConfig {
            trim_loops: true,
            min_loop_frames: 32,
            ..Default::default()
        };
        round_trip(&channels, &config);
        let out = compress(&channels, &config).unwrap();
        let lp = out.report.loop_point.unwrap();
        assert!(lp.frames <= 50 + 64);
        assert_eq!(lp.distance % 64, 0);
    }

    #[test]
    fn empty_round_trip_test() {
        round_trip(&[vec![], vec![]], &CompressConfig::default());
        let back = decompress(&[0], 2, 0, &Format::default()).unwrap();
        assert_eq!(back, vec![Vec::<u8>::new(), vec![]]);
    }

    #[test]
    fn lz4s_layout_decode_test() {
        // Hand built streams: run of 3, match code 0 with offset code 0, run of 1.
        let lz4s = Format::lz4s(8, 2, 255, 255).unwrap();
        let back = decompress(&[0x03, 9, 1, 2, 0x00, 0x01, 7], 1, 6, &lz4s).unwrap();
        assert_eq!(back, vec![vec![9, 1, 2, 1, 2, 7]]);

        // Run of 2, empty match, run of 4.
        let short_runs = Format::lz4s(8, 2, 255, 4).unwrap();
        let back = decompress(&[0xf2, 1, 2, 0x00, 0x04, 3, 4, 5, 6], 1, 6, &short_runs).unwrap();
        assert_eq!(back, vec![vec![1, 2, 3, 4, 5, 6]]);

        // Run of 1, then a match of 2 + 20 frames: nibble 15 and the whole code in one byte.
        let back = decompress(&[0xf1, 4, 20, 0xff], 1, 23, &lz4s).unwrap();
        assert_eq!(back, vec![vec![4; 23]]);

        // With a maximum of 300 the byte holds code - 15.
        let long = Format::lz4s(8, 2, 300, 255).unwrap();
        let back = decompress(&[0xf1, 4, 5, 0xff], 1, 23, &long).unwrap();
        assert_eq!(back, vec![vec![4; 23]]);
    }

    #[test]
    fn truncated_test() {
        let out = compress(&[vec![1, 2, 3, 4]], &CompressConfig::default()).unwrap();
        assert_eq!(out.data, vec![0b1111, 1, 2, 3, 4]);
        let err = decompress(&out.data[..4], 1, 4, &Format::default()).unwrap_err();
        assert!(matches!(err, LzError::Truncated(3)));
    }

    #[test]
    fn corrupt_test() {
        let lz4s = Format::lz4s(8, 2, 255, 255).unwrap();
        // An empty literal field followed by an empty match field.
        assert!(matches!(
            decompress(&[0xf0, 0x00], 1, 3, &lz4s),
            Err(LzError::Corrupt(_))
        ));
        // A 2 frame match on the very first frame.
        assert!(matches!(
            decompress(&[0x00, 0x00], 1, 3, &lz4s),
            Err(LzError::Corrupt(_))
        ));
        // A match on the very first frame.
        assert!(matches!(
            decompress(&[0b0, 0x00], 1, 2, &Format::default()),
            Err(LzError::Corrupt(_))
        ));
        // A literal run longer than the channel.
        assert!(matches!(
            decompress(&[0x05, 1], 1, 3, &lz4s),
            Err(LzError::Corrupt(_))
        ));
        // Leftover bytes.
        assert!(matches!(
            decompress(&[0b1, 9, 9], 1, 1, &Format::default()),
            Err(LzError::Corrupt(_))
        ));
    }
}
