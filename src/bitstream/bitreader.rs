//! BitReader: reads back the mixed bit / nibble / byte stream written by BitWriter.
//!
//! NOTE: This module can read from any I/O source that supports the read() call.
//!

const BUFFER_SIZE: usize = 64 * 1024;

/// Reads an lzsap stream.
#[derive(Debug)]
pub struct BitReader<R> {
    buffer: Vec<u8>,
    cursor: usize,
    source: R,
    /// Bytes consumed before the current buffer, for loc()
    consumed: usize,
    /// The open bit byte and the index of the next bit to read from it.
    bit_byte: Option<(u8, u8)>,
    /// The high half of a nibble byte whose low half was already read.
    high_nibble: Option<u8>,
}

impl<R: std::io::Read> BitReader<R> {
    /// Creates a new BitReader (reading through a 64k buffer).
    pub fn new(source: R) -> Self {
        Self {
            buffer: Vec::with_capacity(BUFFER_SIZE),
            cursor: 0,
            source,
            consumed: 0,
            bit_byte: None,
            high_nibble: None,
        }
    }

    /// Check (and refill) buffer. Returns true if we have data, false if there is no more
    fn have_data(&mut self) -> bool {
        // Only try to read more data when the buffer length is equal to the buffer cursor location
        if self.cursor == self.buffer.len() {
            self.buffer.resize(BUFFER_SIZE, 0);
            let size = loop {
                match self.source.read(&mut self.buffer) {
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(_) => break 0,
                    Ok(size) => break size,
                }
            };
            self.consumed += self.cursor;
            self.buffer.truncate(size);
            self.cursor = 0;
            if size == 0 {
                return false;
            }
        }
        true
    }

    /// Returns the next whole byte, or None if there is no more data to read.
    pub fn byte(&mut self) -> Option<u8> {
        if !self.have_data() {
            return None;
        }
        let byte = self.buffer[self.cursor];
        self.cursor += 1;
        Some(byte)
    }

    /// Returns the next bit, opening a new bit byte when the previous one is used up.
    pub fn bit(&mut self) -> Option<bool> {
        let (byte, num) = match self.bit_byte {
            Some(open) => open,
            None => (self.byte()?, 0),
        };
        self.bit_byte = if num == 7 { None } else { Some((byte, num + 1)) };
        Some(byte & (1 << num) != 0)
    }

    /// Returns the next half byte: the low half of a fresh byte, then its high half.
    pub fn nibble(&mut self) -> Option<u8> {
        if let Some(high) = self.high_nibble.take() {
            return Some(high);
        }
        let byte = self.byte()?;
        self.high_nibble = Some(byte >> 4);
        Some(byte & 0x0f)
    }

    /// Forget any partly used bit or nibble byte. Mirrors BitWriter::flush().
    pub fn align(&mut self) {
        self.bit_byte = None;
        self.high_nibble = None;
    }

    /// Debugging function. Report current position in the stream.
    pub fn loc(&self) -> String {
        let bit = self.bit_byte.map_or(0, |(_, num)| num);
        format!("[{}.{}]", self.consumed + self.cursor, bit)
    }
}
