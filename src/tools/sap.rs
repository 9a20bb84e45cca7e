//! Reader for SAP type "R" files: a text header followed by one 9 byte POKEY register dump
//! per video frame.

use log::{debug, warn};

/// Registers dumped per frame: AUDF1, AUDC1 .. AUDF4, AUDC4, AUDCTL.
pub const SAP_CHANNELS: usize = 9;

/// Longest header line, line feed included.
const MAX_LINE: usize = 79;

/// Length of the text header: every line ending in a line feed within MAX_LINE bytes. An
/// empty line also ends the header and belongs to it. Real SAP files put the binary data
/// right after that empty line; stopping only at the first line that doesn't fit would give
/// the same length for them.
pub fn header_len(data: &[u8]) -> usize {
    let mut pos = 0;
    loop {
        let rest = &data[pos..];
        let window = &rest[..rest.len().min(MAX_LINE)];
        match window.iter().position(|&b| b == b'\n') {
            Some(end) => {
                let line = &rest[..=end];
                pos += end + 1;
                if line == b"\n" || line == b"\r\n" {
                    return pos;
                }
            }
            None => return pos,
        }
    }
}

/// Drop AUDC bits that make no audible difference so equal sounds get equal bytes:
/// - volume 0: the whole register is 0,
/// - volume-only mode: only the mode bit and the volume matter,
/// - pure tone: the noise selection bit is ignored.
pub fn simplify_audc(audc: u8) -> u8 {
    let volume = audc & 0x0f;
    let distortion = audc & 0xf0;
    if volume == 0 {
        0
    } else if distortion & 0x10 != 0 {
        audc & 0x1f
    } else if distortion & 0x20 != 0 {
        audc & 0xbf
    } else {
        audc
    }
}

/// Split the frame data into one channel per register. Odd registers (the AUDC ones) are
/// simplified when `simplify` is set. A partial frame at the end is ignored.
pub fn split_frames(data: &[u8], simplify: bool) -> Vec<Vec<u8>> {
    let frames = data.len() / SAP_CHANNELS;
    if data.len() % SAP_CHANNELS != 0 {
        warn!(
            "Ignoring {} bytes of a partial frame at the end of the input.",
            data.len() % SAP_CHANNELS
        );
    }
    let mut channels = vec![Vec::with_capacity(frames); SAP_CHANNELS];
    for frame in data.chunks_exact(SAP_CHANNELS) {
        for (i, &reg) in frame.iter().enumerate() {
            let value = if simplify && i & 1 == 1 {
                simplify_audc(reg)
            } else {
                reg
            };
            channels[i].push(value);
        }
    }
    channels
}

/// Read a whole SAP type R file into channels.
pub fn read_sap(data: &[u8], simplify: bool) -> Vec<Vec<u8>> {
    let header = header_len(data);
    let channels = split_frames(&data[header..], simplify);
    debug!(
        "SAP header is {} bytes, {} frames follow.",
        header,
        channels[0].len()
    );
    channels
}
