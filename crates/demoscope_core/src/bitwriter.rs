//! # Bit Writer
//!
//! The write-side mirror of [`Bitstream`](crate::bitstream::Bitstream):
//! packs values LSB-first so a bitstream over the output reads them back in
//! order. Used to build nested sub-frame payloads.

use crate::varint::{zigzag_encode32, VARINT32_MAX_BYTES};

/// Growable LSB-first bit packer.
#[derive(Clone, Debug, Default)]
pub struct BitWriter {
    buffer: Vec<u8>,
    bit_position: usize,
}

impl BitWriter {
    /// Creates an empty writer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            bit_position: 0,
        }
    }

    /// Number of bits written so far.
    #[inline]
    #[must_use]
    pub const fn bit_len(&self) -> usize {
        self.bit_position
    }

    /// Number of bytes written, rounded up.
    #[inline]
    #[must_use]
    pub const fn byte_len(&self) -> usize {
        self.bit_position.div_ceil(8)
    }

    /// The packed bytes. Unused high bits of the last byte are zero.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the writer and returns the packed bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Writes the low `bits` bits of `value` (at most 32).
    pub fn write_bits(&mut self, value: u32, bits: usize) {
        debug_assert!(bits <= 32);

        for i in 0..bits {
            let byte_idx = self.bit_position / 8;
            if byte_idx == self.buffer.len() {
                self.buffer.push(0);
            }

            if (value >> i) & 1 == 1 {
                self.buffer[byte_idx] |= 1 << (self.bit_position % 8);
            }

            self.bit_position += 1;
        }
    }

    /// Writes a single bit.
    #[inline]
    pub fn write_bool(&mut self, value: bool) {
        self.write_bits(u32::from(value), 1);
    }

    /// Writes a 32-bit varint as 8-bit groups.
    pub fn write_var_u32(&mut self, value: u32) {
        let mut remaining = value;
        for _ in 0..VARINT32_MAX_BYTES {
            if remaining < 0x80 {
                break;
            }
            self.write_bits((remaining & 0x7F) | 0x80, 8);
            remaining >>= 7;
        }
        self.write_bits(remaining, 8);
    }

    /// Writes a zig-zag encoded signed 32-bit varint.
    #[inline]
    pub fn write_var_i32(&mut self, value: i32) {
        self.write_var_u32(zigzag_encode32(value));
    }

    /// Writes raw bytes, each as an 8-bit group.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.write_bits(u32::from(byte), 8);
        }
    }
}
