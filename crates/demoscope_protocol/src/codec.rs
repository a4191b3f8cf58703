//! # Block Codec
//!
//! Compressed payloads are self-describing blocks that lead with their
//! decompressed length. The length is read and the block walked without
//! writing anything before any expansion, so a destination is never left
//! half-filled by a corrupt block.
//!
//! Demo files store Snappy raw blocks ([`SnappyCodec`]). [`Lz4Codec`] is
//! available for files written by this crate with a different codec.

use demoscope_core::varint::read_var_u32;
use lz4_flex::block;

/// Bytes taken by the decompressed-length prefix of an LZ4 block.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// A block compressor for envelope payloads.
pub trait BlockCodec: Send + Sync {
    /// Compresses `input` into a new self-describing block.
    ///
    /// # Panics
    ///
    /// Implementations may panic on inputs over `u32::MAX` bytes, which no
    /// envelope can carry.
    fn compress(&self, input: &[u8]) -> Vec<u8>;

    /// Declared decompressed length of `block`, or `None` if the block is
    /// not well formed.
    fn decompressed_len(&self, block: &[u8]) -> Option<usize>;

    /// Walks `block` without expanding it.
    ///
    /// Returns `true` only if every literal and back-reference stays in
    /// bounds and the block expands to exactly its declared length.
    fn validate(&self, block: &[u8]) -> bool;

    /// Expands `block` into the front of `out`.
    ///
    /// Returns the number of bytes written, or `None` if the block is
    /// corrupt or `out` is shorter than the declared length.
    fn decompress_into(&self, block: &[u8], out: &mut [u8]) -> Option<usize>;
}

/// Snappy raw block codec (varint length header, no framing).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SnappyCodec;

impl BlockCodec for SnappyCodec {
    fn compress(&self, input: &[u8]) -> Vec<u8> {
        // Only inputs past u32::MAX bytes are refused, which no envelope can carry.
        snap::raw::Encoder::new()
            .compress_vec(input)
            .unwrap_or_else(|err| panic!("snappy refused a {} byte block: {err}", input.len()))
    }

    fn decompressed_len(&self, block: &[u8]) -> Option<usize> {
        if block.is_empty() {
            return None;
        }
        snap::raw::decompress_len(block).ok()
    }

    fn validate(&self, block: &[u8]) -> bool {
        self.decompressed_len(block)
            .and_then(|declared| walk_snappy(block, declared))
            .is_some()
    }

    fn decompress_into(&self, block: &[u8], out: &mut [u8]) -> Option<usize> {
        let expected = self.decompressed_len(block)?;
        let out = out.get_mut(..expected)?;
        let written = snap::raw::Decoder::new().decompress(block, out).ok()?;
        (written == expected).then_some(written)
    }
}

/// LZ4 block codec with a size prefix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Lz4Codec;

impl BlockCodec for Lz4Codec {
    fn compress(&self, input: &[u8]) -> Vec<u8> {
        block::compress_prepend_size(input)
    }

    fn decompressed_len(&self, block: &[u8]) -> Option<usize> {
        let prefix: [u8; LENGTH_PREFIX_LEN] = block.get(..LENGTH_PREFIX_LEN)?.try_into().ok()?;
        usize::try_from(u32::from_le_bytes(prefix)).ok()
    }

    fn validate(&self, block: &[u8]) -> bool {
        self.decompressed_len(block)
            .and_then(|declared| walk_lz4(&block[LENGTH_PREFIX_LEN..], declared))
            .is_some()
    }

    fn decompress_into(&self, block: &[u8], out: &mut [u8]) -> Option<usize> {
        let expected = self.decompressed_len(block)?;
        let out = out.get_mut(..expected)?;
        let written = block::decompress_into(&block[LENGTH_PREFIX_LEN..], out).ok()?;
        (written == expected).then_some(written)
    }
}

/// Little-endian integer of up to `size_of::<usize>()` bytes.
fn read_le(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .rev()
        .fold(0, |acc, &byte| (acc << 8) | usize::from(byte))
}

/// Advances `produced` by `len`, failing past `declared`.
fn produce(produced: usize, len: usize, declared: usize) -> Option<usize> {
    produced.checked_add(len).filter(|&total| total <= declared)
}

fn walk_snappy(block: &[u8], declared: usize) -> Option<()> {
    let mut source = block;
    let (_, mut pos) = read_var_u32(&mut source).ok()?;
    let mut produced = 0;

    while pos < block.len() {
        let tag = block[pos];
        pos += 1;
        let code = usize::from(tag >> 2);

        let (len, offset) = match tag & 0b11 {
            0 => {
                let len = if code < 60 {
                    code + 1
                } else {
                    let extra = code - 59;
                    let bytes = block.get(pos..pos + extra)?;
                    pos += extra;
                    read_le(bytes).checked_add(1)?
                };
                if len > block.len() - pos {
                    return None;
                }
                pos += len;
                produced = produce(produced, len, declared)?;
                continue;
            }
            1 => {
                let low = usize::from(*block.get(pos)?);
                pos += 1;
                ((code & 0b111) + 4, (usize::from(tag & 0b1110_0000) << 3) | low)
            }
            2 => {
                let bytes = block.get(pos..pos + 2)?;
                pos += 2;
                (code + 1, read_le(bytes))
            }
            _ => {
                let bytes = block.get(pos..pos + 4)?;
                pos += 4;
                (code + 1, read_le(bytes))
            }
        };

        if offset == 0 || offset > produced {
            return None;
        }
        produced = produce(produced, len, declared)?;
    }

    (produced == declared).then_some(())
}

/// LZ4 length continuation: bytes are summed until one is below 255.
fn read_lz4_extension(body: &[u8], pos: &mut usize) -> Option<usize> {
    let mut total = 0usize;
    loop {
        let byte = *body.get(*pos)?;
        *pos += 1;
        total = total.checked_add(usize::from(byte))?;
        if byte != u8::MAX {
            return Some(total);
        }
    }
}

fn walk_lz4(body: &[u8], declared: usize) -> Option<()> {
    let mut pos = 0;
    let mut produced = 0;

    loop {
        let token = *body.get(pos)?;
        pos += 1;

        let mut literals = usize::from(token >> 4);
        if literals == 15 {
            literals = literals.checked_add(read_lz4_extension(body, &mut pos)?)?;
        }
        if literals > body.len() - pos {
            return None;
        }
        pos += literals;
        produced = produce(produced, literals, declared)?;

        // The last sequence carries literals only.
        if pos >= body.len() {
            break;
        }

        let offset = usize::from(u16::from_le_bytes(body.get(pos..pos + 2)?.try_into().ok()?));
        pos += 2;
        let mut len = usize::from(token & 0x0F) + 4;
        if len == 19 {
            len = len.checked_add(read_lz4_extension(body, &mut pos)?)?;
        }
        if offset == 0 || offset > produced {
            return None;
        }
        produced = produce(produced, len, declared)?;
    }

    (produced == declared).then_some(())
}
