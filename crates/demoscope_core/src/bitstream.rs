//! # Bitstream
//!
//! Read-only view over a byte buffer at bit granularity.
//!
//! ## Layout
//!
//! ```text
//! bytes:  [b0      ][b1      ][b2      ][b3      ][b4 ...
//! words:  [w0 = b0 | b1<<8 | b2<<16 | b3<<24    ][w1 ...
//! bit 0 of the stream is the least significant bit of b0
//! ```
//!
//! A read that straddles two words is stitched together from the high bits
//! of the first word and the low bits of the second.

use crate::error::{CoreError, CoreResult};
use crate::varint::{zigzag_decode32, zigzag_decode64, VARINT32_MAX_BYTES, VARINT64_MAX_BYTES};

/// Width of one backing word in bits.
const WORD_BITS: usize = u32::BITS as usize;

/// Maximum number of bits a single [`Bitstream::read`] may return.
pub const MAX_READ_BITS: usize = 32;

/// A bit-addressable reader over an owned, word-aligned copy of some bytes.
///
/// Invariant: `0 <= position <= len` after every operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bitstream {
    /// Source bytes packed little-endian into 32-bit words.
    words: Vec<u32>,
    /// Current position in bits.
    position: usize,
    /// Total length in bits.
    length: usize,
}

impl Bitstream {
    /// Creates a bitstream over a copy of `data`.
    ///
    /// # Errors
    ///
    /// [`CoreError::BitstreamTooLarge`] if `data` holds more than `u32::MAX` bits.
    pub fn new(data: &[u8]) -> CoreResult<Self> {
        if data.len() as u64 * 8 > u64::from(u32::MAX) {
            return Err(CoreError::BitstreamTooLarge { bytes: data.len() });
        }

        let mut words = Vec::with_capacity(data.len().div_ceil(4));
        for chunk in data.chunks(4) {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            words.push(u32::from_le_bytes(word));
        }

        Ok(Self {
            words,
            position: 0,
            length: data.len() * 8,
        })
    }

    /// Returns true while unread bits remain.
    #[inline]
    #[must_use]
    pub const fn good(&self) -> bool {
        self.position < self.length
    }

    /// Number of bits left to read.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.length - self.position
    }

    /// Total length in bits.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns true if the stream holds no bits at all.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Current position in bits.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Moves to `position`, clamped to the stream length.
    #[inline]
    pub fn set_position(&mut self, position: usize) {
        self.position = position.min(self.length);
    }

    /// Seeks `bits` forward, stopping at the end of the stream.
    #[inline]
    pub fn seek_forward(&mut self, bits: usize) {
        self.position = self.position.saturating_add(bits).min(self.length);
    }

    /// Seeks `bits` backward, stopping at the start of the stream.
    #[inline]
    pub fn seek_backward(&mut self, bits: usize) {
        self.position = self.position.saturating_sub(bits);
    }

    /// Reads the next `bits` bits (at most 32) as an unsigned integer.
    ///
    /// # Errors
    ///
    /// [`CoreError::BitstreamOverflow`] if `bits > 32` or fewer than `bits`
    /// bits remain. The position is unchanged on error.
    #[inline]
    pub fn read(&mut self, bits: usize) -> CoreResult<u32> {
        if bits > MAX_READ_BITS || bits > self.remaining() {
            return Err(self.overflow(bits));
        }
        if bits == 0 {
            return Ok(0);
        }

        let start = self.position / WORD_BITS;
        let end = (self.position + bits - 1) / WORD_BITS;
        let shift = self.position % WORD_BITS;

        let mut value = u64::from(self.words[start]) >> shift;
        if start != end {
            // shift > 0 here, otherwise a read of <= 32 bits fits one word
            value |= u64::from(self.words[end]) << (WORD_BITS - shift);
        }

        self.position += bits;
        Ok((value & ((1u64 << bits) - 1)) as u32)
    }

    /// Reads a single bit.
    ///
    /// # Errors
    ///
    /// [`CoreError::BitstreamOverflow`] at the end of the stream.
    #[inline]
    pub fn read_bool(&mut self) -> CoreResult<bool> {
        Ok(self.read(1)? != 0)
    }

    /// Reads a 32-bit varint one 8-bit group at a time.
    ///
    /// # Errors
    ///
    /// [`CoreError::BitstreamOverflow`] if the stream ends mid-varint and
    /// [`CoreError::VarintCorrupt`] if the fifth group still has its
    /// continuation bit set.
    pub fn read_var_u32(&mut self) -> CoreResult<u32> {
        let mut result = 0u32;

        for group in 0..VARINT32_MAX_BYTES {
            let byte = self.read(8)?;
            result |= (byte & 0x7F) << (7 * group);

            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }

        Err(CoreError::VarintCorrupt {
            max_bytes: VARINT32_MAX_BYTES,
        })
    }

    /// Reads a 64-bit varint one 8-bit group at a time.
    ///
    /// # Errors
    ///
    /// Same as [`Bitstream::read_var_u32`], with a ten group cap.
    pub fn read_var_u64(&mut self) -> CoreResult<u64> {
        let mut result = 0u64;

        for group in 0..VARINT64_MAX_BYTES {
            let byte = self.read(8)?;
            result |= u64::from(byte & 0x7F) << (7 * group);

            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }

        Err(CoreError::VarintCorrupt {
            max_bytes: VARINT64_MAX_BYTES,
        })
    }

    /// Reads a zig-zag encoded signed 32-bit varint.
    ///
    /// # Errors
    ///
    /// Same as [`Bitstream::read_var_u32`].
    #[inline]
    pub fn read_var_i32(&mut self) -> CoreResult<i32> {
        self.read_var_u32().map(zigzag_decode32)
    }

    /// Reads a zig-zag encoded signed 64-bit varint.
    ///
    /// # Errors
    ///
    /// Same as [`Bitstream::read_var_u64`].
    #[inline]
    pub fn read_var_i64(&mut self) -> CoreResult<i64> {
        self.read_var_u64().map(zigzag_decode64)
    }

    /// Reads a NUL-terminated string of at most `buffer.len()` bytes.
    ///
    /// Stops after the first zero byte. The destination is always
    /// terminated: if no zero byte shows up, the last slot is overwritten
    /// with one. Returns the string length without the terminator.
    ///
    /// # Errors
    ///
    /// [`CoreError::BufferTooSmall`] for an empty buffer and
    /// [`CoreError::BitstreamOverflow`] if the stream runs out first.
    pub fn read_string(&mut self, buffer: &mut [u8]) -> CoreResult<usize> {
        if buffer.is_empty() {
            return Err(CoreError::BufferTooSmall {
                required: 1,
                available: 0,
            });
        }

        for (i, slot) in buffer.iter_mut().enumerate() {
            let byte = self.read(8)? as u8;
            *slot = byte;

            if byte == 0 {
                return Ok(i);
            }
        }

        let last = buffer.len() - 1;
        buffer[last] = 0;
        Ok(last)
    }

    /// Copies exactly `bits` bits into `buffer`, whole bytes first, then the
    /// remaining sub-byte tail in the low bits of the next byte.
    ///
    /// # Errors
    ///
    /// [`CoreError::BufferTooSmall`] if `buffer` is shorter than
    /// `bits.div_ceil(8)` bytes and [`CoreError::BitstreamOverflow`] if fewer
    /// than `bits` bits remain. Nothing is consumed on error.
    pub fn read_bits(&mut self, buffer: &mut [u8], bits: usize) -> CoreResult<()> {
        let required = bits.div_ceil(8);
        if buffer.len() < required {
            return Err(CoreError::BufferTooSmall {
                required,
                available: buffer.len(),
            });
        }
        if bits > self.remaining() {
            return Err(self.overflow(bits));
        }

        let whole = bits / 8;
        for slot in &mut buffer[..whole] {
            *slot = self.read(8)? as u8;
        }

        let tail = bits % 8;
        if tail > 0 {
            buffer[whole] = self.read(tail)? as u8;
        }

        Ok(())
    }

    fn overflow(&self, requested: usize) -> CoreError {
        CoreError::BitstreamOverflow {
            requested,
            position: self.position,
            length: self.length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitwriter::BitWriter;
    use rand::Rng;

    fn random_bytes(len: usize) -> Vec<u8> {
        let mut rng = rand::thread_rng();
        (0..len).map(|_| rng.gen()).collect()
    }

    /// Reference extraction over a little-endian 128-bit integer.
    fn reference_bits(bytes: &[u8], position: usize, bits: usize) -> u32 {
        let mut raw = [0u8; 16];
        raw.copy_from_slice(&bytes[..16]);
        let big = u128::from_le_bytes(raw);
        ((big >> position) & ((1u128 << bits) - 1)) as u32
    }

    #[test]
    fn test_length_and_position() {
        let stream = Bitstream::new(&[0u8; 5]).unwrap();
        assert_eq!(stream.len(), 40);
        assert_eq!(stream.position(), 0);
        assert_eq!(stream.remaining(), 40);
        assert!(stream.good());

        let empty = Bitstream::new(&[]).unwrap();
        assert!(empty.is_empty());
        assert!(!empty.good());
    }

    #[test]
    fn test_read_little_endian_bits() {
        let mut stream = Bitstream::new(&[0b1010_1101, 0xFF]).unwrap();
        assert_eq!(stream.read(1).unwrap(), 1);
        assert_eq!(stream.read(3).unwrap(), 0b110);
        assert_eq!(stream.read(4).unwrap(), 0b1010);
        assert_eq!(stream.read(8).unwrap(), 0xFF);
        assert!(!stream.good());
    }

    #[test]
    fn test_cross_word_boundary_every_offset() {
        let bytes = random_bytes(16);

        for width in 1..=MAX_READ_BITS {
            for position in 0..=(128 - width) {
                let mut stream = Bitstream::new(&bytes).unwrap();
                stream.set_position(position);
                assert_eq!(
                    stream.read(width).unwrap(),
                    reference_bits(&bytes, position, width),
                    "width {width} at position {position}"
                );
                assert_eq!(stream.position(), position + width);
            }
        }
    }

    #[test]
    fn test_straddling_read_matches_byte_aligned() {
        let bytes = random_bytes(16);
        let mut stream = Bitstream::new(&bytes).unwrap();

        // bits 24..40 span words 0 and 1 and equal bytes 3 and 4
        stream.set_position(24);
        let expected = u32::from(u16::from_le_bytes([bytes[3], bytes[4]]));
        assert_eq!(stream.read(16).unwrap(), expected);

        // a full 32-bit read at a byte offset inside word 1
        stream.set_position(40);
        let expected = u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);
        assert_eq!(stream.read(32).unwrap(), expected);
    }

    #[test]
    fn test_read_overflow() {
        let mut stream = Bitstream::new(&[0u8; 8]).unwrap();
        assert!(matches!(
            stream.read(33),
            Err(CoreError::BitstreamOverflow { requested: 33, .. })
        ));

        stream.set_position(60);
        assert_eq!(
            stream.read(5),
            Err(CoreError::BitstreamOverflow {
                requested: 5,
                position: 60,
                length: 64
            })
        );
        assert_eq!(stream.position(), 60);
        assert_eq!(stream.read(4).unwrap(), 0);
        assert_eq!(stream.read(0).unwrap(), 0);
    }

    #[test]
    fn test_seek_clamps() {
        let mut stream = Bitstream::new(&[0u8; 2]).unwrap();
        stream.seek_forward(100);
        assert_eq!(stream.position(), 16);
        stream.seek_backward(4);
        assert_eq!(stream.position(), 12);
        stream.seek_backward(100);
        assert_eq!(stream.position(), 0);
        stream.set_position(17);
        assert_eq!(stream.position(), 16);
    }

    #[test]
    fn test_varint_aligned() {
        let mut stream = Bitstream::new(&[0x9E, 0xA7, 0x05, 0x8E, 0x02]).unwrap();
        assert_eq!(stream.read_var_u32().unwrap(), 86942);
        assert_eq!(stream.read_var_u64().unwrap(), 270);
        assert!(!stream.good());
    }

    #[test]
    fn test_varint_unaligned() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b101, 3);
        writer.write_var_u32(86942);
        writer.write_var_i32(-1234);

        let mut stream = Bitstream::new(writer.as_slice()).unwrap();
        assert_eq!(stream.read(3).unwrap(), 0b101);
        assert_eq!(stream.read_var_u32().unwrap(), 86942);
        assert_eq!(stream.read_var_i32().unwrap(), -1234);
    }

    #[test]
    fn test_varint_cap_is_hard_fault() {
        let mut stream = Bitstream::new(&[0xFF; 6]).unwrap();
        assert_eq!(
            stream.read_var_u32(),
            Err(CoreError::VarintCorrupt { max_bytes: 5 })
        );

        let mut stream = Bitstream::new(&[0xFF; 11]).unwrap();
        assert_eq!(
            stream.read_var_u64(),
            Err(CoreError::VarintCorrupt { max_bytes: 10 })
        );

        let mut stream = Bitstream::new(&[0x80]).unwrap();
        assert!(matches!(
            stream.read_var_u32(),
            Err(CoreError::BitstreamOverflow { .. })
        ));
    }

    #[test]
    fn test_read_string() {
        let mut stream = Bitstream::new(b"hello\0world").unwrap();
        let mut buf = [0xAAu8; 16];
        assert_eq!(stream.read_string(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..6], b"hello\0");
        assert_eq!(stream.position(), 48);
    }

    #[test]
    fn test_read_string_truncates_and_terminates() {
        let mut stream = Bitstream::new(b"truncated").unwrap();
        let mut buf = [0xAAu8; 4];
        assert_eq!(stream.read_string(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"tru\0");
        assert_eq!(stream.position(), 32);

        assert!(matches!(
            stream.read_string(&mut []),
            Err(CoreError::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn test_read_bits() {
        let mut stream = Bitstream::new(&[0x12, 0x34, 0xFF]).unwrap();
        let mut buf = [0u8; 3];
        stream.read_bits(&mut buf, 20).unwrap();
        assert_eq!(buf, [0x12, 0x34, 0x0F]);
        assert_eq!(stream.position(), 20);

        let mut small = [0u8; 1];
        assert!(matches!(
            stream.read_bits(&mut small, 9),
            Err(CoreError::BufferTooSmall { required: 2, available: 1 })
        ));

        let mut buf = [0u8; 2];
        assert!(matches!(
            stream.read_bits(&mut buf, 5),
            Err(CoreError::BitstreamOverflow { .. })
        ));
        assert_eq!(stream.position(), 20);
    }
}
