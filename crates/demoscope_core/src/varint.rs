//! # Varint Codec
//!
//! Base-128 variable-length integers as used by protobuf: every byte carries
//! seven payload bits, least significant group first, and the high bit marks
//! that another byte follows.
//!
//! ## Two Decode Paths
//!
//! - **Checked**: pulls bytes from a [`ByteSource`] and reports truncation or
//!   corruption as errors.
//! - **Unchecked**: walks a slice without bounds checks. The caller promises
//!   that enough trailing bytes exist; the envelope decoder only takes this
//!   path when the remaining buffer is longer than any possible header.

// SAFETY: This module requires unsafe for the unchecked fast path.
// Every unsafe read is bounded by the documented caller contract.
#![allow(unsafe_code)]

use std::io::Read;

use crate::error::{CoreError, CoreResult};

/// Maximum number of bytes a 32-bit varint may occupy.
pub const VARINT32_MAX_BYTES: usize = 5;

/// Maximum number of bytes a 64-bit varint may occupy.
pub const VARINT64_MAX_BYTES: usize = 10;

const PAYLOAD_MASK: u8 = 0x7F;
const CONTINUE_BIT: u8 = 0x80;

/// A sequential, bounded source of bytes for the checked decoders.
pub trait ByteSource {
    /// Returns the next byte, or `None` once the source is exhausted.
    fn next_byte(&mut self) -> Option<u8>;
}

impl ByteSource for &[u8] {
    #[inline]
    fn next_byte(&mut self) -> Option<u8> {
        let (&first, rest) = self.split_first()?;
        *self = rest;
        Some(first)
    }
}

/// Adapts any [`Read`] implementation into a [`ByteSource`].
///
/// I/O errors end the source the same way end-of-file does.
#[derive(Debug)]
pub struct ReadSource<R> {
    reader: R,
}

impl<R: Read> ReadSource<R> {
    /// Wraps a reader.
    #[must_use]
    pub const fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Returns the wrapped reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> ByteSource for ReadSource<R> {
    fn next_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        self.reader.read_exact(&mut byte).ok()?;
        Some(byte[0])
    }
}

/// Decodes a 32-bit varint from `source`.
///
/// Returns the value and the number of bytes consumed.
///
/// # Errors
///
/// - [`CoreError::VarintTruncated`] if the source ends mid-varint.
/// - [`CoreError::VarintCorrupt`] if the fifth byte still has its
///   continuation bit set.
pub fn read_var_u32<S: ByteSource + ?Sized>(source: &mut S) -> CoreResult<(u32, usize)> {
    let mut result = 0u32;

    for read in 0..VARINT32_MAX_BYTES {
        let byte = source.next_byte().ok_or(CoreError::VarintTruncated { read })?;
        result |= u32::from(byte & PAYLOAD_MASK) << (7 * read);

        if byte & CONTINUE_BIT == 0 {
            return Ok((result, read + 1));
        }
    }

    Err(CoreError::VarintCorrupt {
        max_bytes: VARINT32_MAX_BYTES,
    })
}

/// Decodes a 64-bit varint from `source`.
///
/// # Errors
///
/// Same conditions as [`read_var_u32`], with a ten byte cap.
pub fn read_var_u64<S: ByteSource + ?Sized>(source: &mut S) -> CoreResult<(u64, usize)> {
    let mut result = 0u64;

    for read in 0..VARINT64_MAX_BYTES {
        let byte = source.next_byte().ok_or(CoreError::VarintTruncated { read })?;
        result |= u64::from(byte & PAYLOAD_MASK) << (7 * read);

        if byte & CONTINUE_BIT == 0 {
            return Ok((result, read + 1));
        }
    }

    Err(CoreError::VarintCorrupt {
        max_bytes: VARINT64_MAX_BYTES,
    })
}

/// Decodes a zig-zag encoded signed 32-bit varint.
///
/// # Errors
///
/// Same conditions as [`read_var_u32`].
pub fn read_var_i32<S: ByteSource + ?Sized>(source: &mut S) -> CoreResult<(i32, usize)> {
    read_var_u32(source).map(|(value, read)| (zigzag_decode32(value), read))
}

/// Decodes a zig-zag encoded signed 64-bit varint.
///
/// # Errors
///
/// Same conditions as [`read_var_u64`].
pub fn read_var_i64<S: ByteSource + ?Sized>(source: &mut S) -> CoreResult<(i64, usize)> {
    read_var_u64(source).map(|(value, read)| (zigzag_decode64(value), read))
}

/// Decodes a 32-bit varint without bounds checks.
///
/// Returns the value and the slice that follows it, or `None` if the varint
/// would need more than [`VARINT32_MAX_BYTES`] bytes.
///
/// # Safety
///
/// `data` must contain at least [`VARINT32_MAX_BYTES`] bytes.
#[inline]
#[must_use]
pub unsafe fn read_var_u32_unchecked(data: &[u8]) -> Option<(u32, &[u8])> {
    debug_assert!(data.len() >= VARINT32_MAX_BYTES);

    let mut result = 0u32;
    for i in 0..VARINT32_MAX_BYTES {
        // SAFETY: i < VARINT32_MAX_BYTES <= data.len() by contract.
        let byte = *data.get_unchecked(i);
        result |= u32::from(byte & PAYLOAD_MASK) << (7 * i);

        if byte & CONTINUE_BIT == 0 {
            // SAFETY: i + 1 <= VARINT32_MAX_BYTES <= data.len().
            return Some((result, data.get_unchecked(i + 1..)));
        }
    }

    None
}

/// Decodes a 64-bit varint without bounds checks.
///
/// # Safety
///
/// `data` must contain at least [`VARINT64_MAX_BYTES`] bytes.
#[inline]
#[must_use]
pub unsafe fn read_var_u64_unchecked(data: &[u8]) -> Option<(u64, &[u8])> {
    debug_assert!(data.len() >= VARINT64_MAX_BYTES);

    let mut result = 0u64;
    for i in 0..VARINT64_MAX_BYTES {
        // SAFETY: i < VARINT64_MAX_BYTES <= data.len() by contract.
        let byte = *data.get_unchecked(i);
        result |= u64::from(byte & PAYLOAD_MASK) << (7 * i);

        if byte & CONTINUE_BIT == 0 {
            // SAFETY: i + 1 <= VARINT64_MAX_BYTES <= data.len().
            return Some((result, data.get_unchecked(i + 1..)));
        }
    }

    None
}

/// Number of bytes [`write_var_u32`] emits for `value`.
#[inline]
#[must_use]
pub const fn encoded_len_u32(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0x0FFF_FFFF => 4,
        _ => 5,
    }
}

/// Number of bytes [`write_var_u64`] emits for `value`.
#[inline]
#[must_use]
pub const fn encoded_len_u64(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    if bits == 0 {
        1
    } else {
        (bits + 6) / 7
    }
}

/// Encodes `value` into a fixed array, returning it with the used length.
#[inline]
#[must_use]
pub fn encode_var_u32(value: u32) -> ([u8; VARINT32_MAX_BYTES], usize) {
    let mut out = [0u8; VARINT32_MAX_BYTES];
    let mut remaining = value;
    let mut len = 0;

    while remaining > u32::from(PAYLOAD_MASK) {
        out[len] = (remaining as u8 & PAYLOAD_MASK) | CONTINUE_BIT;
        remaining >>= 7;
        len += 1;
    }
    out[len] = remaining as u8;

    (out, len + 1)
}

/// Encodes `value` into the front of `out` using the minimal byte count.
///
/// Returns the number of bytes written.
///
/// # Errors
///
/// [`CoreError::BufferTooSmall`] if `out` cannot hold the encoding.
pub fn write_var_u32(out: &mut [u8], value: u32) -> CoreResult<usize> {
    let (encoded, len) = encode_var_u32(value);
    let available = out.len();
    let dst = out.get_mut(..len).ok_or(CoreError::BufferTooSmall {
        required: len,
        available,
    })?;
    dst.copy_from_slice(&encoded[..len]);
    Ok(len)
}

/// Encodes a 64-bit `value` into the front of `out`.
///
/// # Errors
///
/// [`CoreError::BufferTooSmall`] if `out` cannot hold the encoding.
pub fn write_var_u64(out: &mut [u8], value: u64) -> CoreResult<usize> {
    let required = encoded_len_u64(value);
    if out.len() < required {
        return Err(CoreError::BufferTooSmall {
            required,
            available: out.len(),
        });
    }

    let mut remaining = value;
    for slot in &mut out[..required - 1] {
        *slot = (remaining as u8 & PAYLOAD_MASK) | CONTINUE_BIT;
        remaining >>= 7;
    }
    out[required - 1] = remaining as u8;

    Ok(required)
}

/// Appends the encoding of `value` to `out`.
pub fn push_var_u32(out: &mut Vec<u8>, value: u32) {
    push_var_u64(out, u64::from(value));
}

/// Appends the encoding of a 64-bit `value` to `out`.
pub fn push_var_u64(out: &mut Vec<u8>, value: u64) {
    let mut remaining = value;
    while remaining > u64::from(PAYLOAD_MASK) {
        out.push((remaining as u8 & PAYLOAD_MASK) | CONTINUE_BIT);
        remaining >>= 7;
    }
    out.push(remaining as u8);
}

/// Maps a signed value onto the unsigned range so small magnitudes stay short.
#[inline]
#[must_use]
pub const fn zigzag_encode32(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

/// Inverse of [`zigzag_encode32`].
#[inline]
#[must_use]
pub const fn zigzag_decode32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

/// 64-bit zig-zag encode.
#[inline]
#[must_use]
pub const fn zigzag_encode64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode64`].
#[inline]
#[must_use]
pub const fn zigzag_decode64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}
