//! # Packet Envelope
//!
//! One framed message on the wire:
//!
//! ```text
//! varint(type) varint(tick) varint(size) payload[size]
//! ```
//!
//! All three header fields are 32-bit varints, so a header never exceeds
//! [`MAX_HEADER_SIZE`] bytes. When more than that remains in the buffer the
//! header is decoded on the unchecked fast path; otherwise every byte is
//! bounds-checked.

#![allow(unsafe_code)]

use std::borrow::Cow;

use demoscope_core::varint::{encode_var_u32, read_var_u32, read_var_u32_unchecked};
use demoscope_core::{CoreError, VARINT32_MAX_BYTES};

use crate::codec::BlockCodec;
use crate::error::{EnvelopeError, EnvelopeResult, UncompressError};

/// Type flag marking a compressed payload.
pub const COMPRESSED_FLAG: u32 = 0x40;

/// Largest possible envelope header: three 5-byte varints.
pub const MAX_HEADER_SIZE: usize = 3 * VARINT32_MAX_BYTES;

/// A framed message with its payload.
///
/// The payload borrows from the buffer it was read from (or a scratch
/// buffer after [`Envelope::uncompress`]) unless [`Envelope::compress`] or
/// [`Envelope::into_owned`] gave it its own allocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope<'a> {
    /// Tick the message belongs to.
    pub tick: u32,
    /// Message type, possibly with [`COMPRESSED_FLAG`] set.
    pub packet_type: u32,
    payload: Option<Cow<'a, [u8]>>,
}

impl<'a> Envelope<'a> {
    /// Creates an envelope over a borrowed payload.
    #[must_use]
    pub const fn new(tick: u32, packet_type: u32, payload: &'a [u8]) -> Self {
        Self {
            tick,
            packet_type,
            payload: Some(Cow::Borrowed(payload)),
        }
    }

    /// Creates an envelope that owns its payload.
    #[must_use]
    pub const fn with_owned(tick: u32, packet_type: u32, payload: Vec<u8>) -> Self {
        Self {
            tick,
            packet_type,
            payload: Some(Cow::Owned(payload)),
        }
    }

    /// Payload bytes, or `None` after a failed [`Envelope::uncompress`].
    #[inline]
    #[must_use]
    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// Current payload length in bytes. Zero when the payload is absent.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.payload.as_ref().map_or(0, |p| p.len())
    }

    /// Whether the payload is still compressed.
    #[inline]
    #[must_use]
    pub const fn is_compressed(&self) -> bool {
        self.packet_type & COMPRESSED_FLAG != 0
    }

    /// Message type with the compressed flag cleared.
    #[inline]
    #[must_use]
    pub const fn message_type(&self) -> u32 {
        self.packet_type & !COMPRESSED_FLAG
    }

    /// Whether the payload owns its bytes.
    #[must_use]
    pub fn is_owned(&self) -> bool {
        matches!(self.payload, Some(Cow::Owned(_)))
    }

    /// Copies a borrowed payload so the envelope outlives its source.
    #[must_use]
    pub fn into_owned(self) -> Envelope<'static> {
        Envelope {
            tick: self.tick,
            packet_type: self.packet_type,
            payload: self.payload.map(|p| Cow::Owned(p.into_owned())),
        }
    }

    /// Reads one envelope from the front of `buffer`.
    ///
    /// Returns the envelope, with its payload aliasing `buffer`, and the
    /// total number of bytes consumed.
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::Varint`] for a corrupt or truncated header and
    /// [`EnvelopeError::PayloadOutOfBounds`] when the declared size runs
    /// past the end of `buffer`.
    pub fn deserialize(buffer: &'a [u8]) -> EnvelopeResult<(Self, usize)> {
        let header = if buffer.len() > MAX_HEADER_SIZE {
            read_header_fast(buffer)?
        } else {
            read_header_checked(buffer)?
        };

        let available = buffer.len() - header.len;
        let size = usize::try_from(header.size).unwrap_or(usize::MAX);
        if size > available {
            return Err(EnvelopeError::PayloadOutOfBounds {
                header: header.len,
                size: header.size,
                available,
            });
        }

        let end = header.len + size;
        let envelope = Self::new(header.tick, header.packet_type, &buffer[header.len..end]);
        Ok((envelope, end))
    }

    /// Writes the envelope to the front of `buffer`, compressing first when
    /// `pack` is given.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Panics
    ///
    /// If `buffer` is shorter than the payload plus [`MAX_HEADER_SIZE`], or
    /// the payload is longer than `u32::MAX` bytes.
    pub fn serialize(&mut self, buffer: &mut [u8], pack: Option<&dyn BlockCodec>) -> usize {
        if let Some(codec) = pack {
            self.compress(codec);
        }

        let payload = self.payload().unwrap_or_default();
        assert!(
            buffer.len() >= payload.len() + MAX_HEADER_SIZE,
            "envelope buffer too small: {} bytes for a {} byte payload",
            buffer.len(),
            payload.len()
        );
        let size = u32::try_from(payload.len()).unwrap_or_else(|_| {
            panic!("envelope payload of {} bytes exceeds u32", payload.len())
        });

        let mut written = 0;
        for value in [self.packet_type, self.tick, size] {
            let (bytes, len) = encode_var_u32(value);
            buffer[written..written + len].copy_from_slice(&bytes[..len]);
            written += len;
        }
        buffer[written..written + payload.len()].copy_from_slice(payload);

        written + payload.len()
    }

    /// Replaces the payload with its compressed block and sets
    /// [`COMPRESSED_FLAG`]. The new payload is owned by the envelope.
    pub fn compress(&mut self, codec: &dyn BlockCodec) {
        let block = codec.compress(self.payload().unwrap_or_default());
        self.payload = Some(Cow::Owned(block));
        self.packet_type |= COMPRESSED_FLAG;
    }

    /// Expands a compressed payload into `scratch` and repoints the payload
    /// at it, clearing [`COMPRESSED_FLAG`].
    ///
    /// The block is walked by [`BlockCodec::validate`] and its declared
    /// length checked against `scratch` before anything is written, so a
    /// failure leaves `scratch` untouched. Returns the decompressed size.
    ///
    /// # Errors
    ///
    /// Any [`UncompressError`]. The payload is absent afterwards.
    pub fn uncompress(
        &mut self,
        codec: &dyn BlockCodec,
        scratch: &'a mut [u8],
    ) -> Result<usize, UncompressError> {
        let block = self.payload.take().ok_or(UncompressError::MissingPayload)?;
        if !codec.validate(&block) {
            return Err(UncompressError::Malformed);
        }
        let required = codec
            .decompressed_len(&block)
            .ok_or(UncompressError::Malformed)?;
        if required > scratch.len() {
            return Err(UncompressError::ScratchTooSmall {
                required,
                capacity: scratch.len(),
            });
        }

        let written = codec
            .decompress_into(&block, &mut scratch[..required])
            .ok_or(UncompressError::Corrupt)?;

        let scratch: &'a [u8] = scratch;
        self.payload = Some(Cow::Borrowed(&scratch[..written]));
        self.packet_type &= !COMPRESSED_FLAG;
        Ok(written)
    }
}

struct Header {
    packet_type: u32,
    tick: u32,
    size: u32,
    len: usize,
}

fn read_header_fast(buffer: &[u8]) -> EnvelopeResult<Header> {
    debug_assert!(buffer.len() > MAX_HEADER_SIZE);
    let corrupt = || {
        EnvelopeError::Varint(CoreError::VarintCorrupt {
            max_bytes: VARINT32_MAX_BYTES,
        })
    };

    // SAFETY: each read consumes at most VARINT32_MAX_BYTES, and three of
    // them fit in MAX_HEADER_SIZE < buffer.len(), so every call sees at
    // least VARINT32_MAX_BYTES bytes.
    let (packet_type, rest) = unsafe { read_var_u32_unchecked(buffer) }.ok_or_else(corrupt)?;
    let (tick, rest) = unsafe { read_var_u32_unchecked(rest) }.ok_or_else(corrupt)?;
    let (size, rest) = unsafe { read_var_u32_unchecked(rest) }.ok_or_else(corrupt)?;

    Ok(Header {
        packet_type,
        tick,
        size,
        len: buffer.len() - rest.len(),
    })
}

fn read_header_checked(buffer: &[u8]) -> EnvelopeResult<Header> {
    let mut source = buffer;
    let (packet_type, _) = read_var_u32(&mut source)?;
    let (tick, _) = read_var_u32(&mut source)?;
    let (size, _) = read_var_u32(&mut source)?;

    Ok(Header {
        packet_type,
        tick,
        size,
        len: buffer.len() - source.len(),
    })
}
