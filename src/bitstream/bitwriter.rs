/// Writes the mixed bit / nibble / byte stream used by both wire formats.
///
/// Bits and nibbles do not get their own stream. The first bit of a group reserves a whole
/// byte at the current end of the output and the next seven bits are stored into that same
/// byte (least significant bit first), while any bytes written in the meantime land after it.
/// Nibbles work the same way: the first one reserves a byte and fills its low half, the
/// second one fills the high half. A decoder that reads the stream in order therefore always
/// finds a bit (or nibble) byte exactly where it first needs one.
#[derive(Debug, Default)]
pub struct BitWriter {
    /// Output buffer holding everything written since the last flush.
    output: Vec<u8>,
    /// Index in the output of the byte collecting bits, if one is open.
    bit_slot: Option<usize>,
    /// Next free bit in the open bit byte.
    bit_num: u8,
    /// Index in the output of the byte waiting for its high nibble, if one is open.
    nibble_slot: Option<usize>,
    /// Bytes already handed out by previous flushes.
    flushed: usize,
    /// Payload counters, used to check the cost model against real output.
    bits: u64,
    nibbles: u64,
    bytes: u64,
}

impl BitWriter {
    /// Create a new BitWriter with an output buffer of the size specified.
    pub fn new(size: usize) -> Self {
        Self {
            output: Vec::with_capacity(size),
            ..Default::default()
        }
    }

    /// Put one bit on the stream, opening a new bit byte when needed.
    pub fn write_bit(&mut self, bit: bool) {
        let slot = match self.bit_slot {
            Some(slot) => slot,
            None => {
                self.output.push(0);
                self.bit_num = 0;
                self.output.len() - 1
            }
        };
        if bit {
            self.output[slot] |= 1 << self.bit_num;
        }
        self.bit_num += 1;
        self.bit_slot = if self.bit_num == 8 { None } else { Some(slot) };
        self.bits += 1;
    }

    /// Put a whole byte on the stream.
    pub fn write_byte(&mut self, byte: u8) {
        self.output.push(byte);
        self.bytes += 1;
    }

    /// Put a half byte on the stream. Two consecutive nibbles share one byte, low half first.
    pub fn write_nibble(&mut self, nibble: u8) {
        debug_assert!(nibble < 16, "nibble out of range: {}", nibble);
        match self.nibble_slot.take() {
            Some(slot) => self.output[slot] |= nibble << 4,
            None => {
                self.output.push(nibble & 0x0f);
                self.nibble_slot = Some(self.output.len() - 1);
            }
        }
        self.nibbles += 1;
    }

    /// Close any open bit or nibble byte (the unused part stays zero) and move everything
    /// written so far to the end of `out`.
    pub fn flush(&mut self, out: &mut Vec<u8>) {
        self.bit_slot = None;
        self.bit_num = 0;
        self.nibble_slot = None;
        self.flushed += self.output.len();
        out.append(&mut self.output);
    }

    /// Total bytes produced so far, flushed or not.
    pub fn total_bytes(&self) -> usize {
        self.flushed + self.output.len()
    }

    /// Payload bits written so far, not counting padding of half-used bit or nibble bytes.
    pub fn total_bits(&self) -> u64 {
        self.bits + 4 * self.nibbles + 8 * self.bytes
    }

    /// Debugging function to return the number of bytes.bits output so far
    pub fn loc(&self) -> String {
        format!("[{}.{}]", self.total_bytes(), self.bit_num)
    }
}

#[cfg(test)]
mod test {
    use super::BitWriter;

    #[test]
    fn bits_fill_lsb_first_test() {
        let mut bw = BitWriter::new(4);
        for bit in [true, false, true, true, false, false, false, true] {
            bw.write_bit(bit);
        }
        bw.write_bit(true);
        let mut out = vec![];
        bw.flush(&mut out);
        assert_eq!(out, vec![0b1000_1101, 0b0000_0001]);
    }

    #[test]
    fn bit_byte_comes_before_later_bytes_test() {
        let mut bw = BitWriter::new(4);
        bw.write_bit(true);
        bw.write_byte(0xaa);
        bw.write_bit(true);
        bw.write_byte(0xbb);
        let mut out = vec![];
        bw.flush(&mut out);
        assert_eq!(out, vec![0b0000_0011, 0xaa, 0xbb]);
    }

    #[test]
    fn nibbles_pack_low_then_high_test() {
        let mut bw = BitWriter::new(4);
        bw.write_nibble(0x3);
        bw.write_byte(0x42);
        bw.write_nibble(0xc);
        bw.write_nibble(0x7);
        let mut out = vec![];
        bw.flush(&mut out);
        assert_eq!(out, vec![0xc3, 0x42, 0x07]);
    }

    #[test]
    fn flush_closes_partial_groups_test() {
        let mut bw = BitWriter::new(4);
        bw.write_bit(true);
        bw.write_nibble(0x5);
        let mut out = vec![];
        bw.flush(&mut out);
        // A fresh group after the flush must not touch the bytes already handed out.
        bw.write_bit(true);
        bw.write_nibble(0x6);
        bw.flush(&mut out);
        assert_eq!(out, vec![0x01, 0x05, 0x01, 0x06]);
        assert_eq!(bw.total_bytes(), 4);
    }

    #[test]
    fn counters_and_loc_test() {
        let mut bw = BitWriter::new(4);
        bw.write_bit(false);
        bw.write_bit(true);
        bw.write_nibble(1);
        bw.write_byte(9);
        assert_eq!(bw.total_bits(), 2 + 4 + 8);
        assert_eq!(bw.loc(), "[3.2]");
    }
}
