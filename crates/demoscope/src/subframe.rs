//! # Nested Sub-Frames
//!
//! Wrapper packets of variant B carry a bit-packed run of sub-frames:
//!
//! ```text
//! kind    6 bits: low 4 bits of the kind + 2 selector bits
//!         selector 0: done, 1: +4 bits, 2: +8 bits, 3: +28 bits
//! length  varint (8-bit groups), body size in bytes
//! body    length * 8 bits
//! ```
//!
//! The tokenizer only records boundaries; bodies are read on demand.

use demoscope_core::{BitWriter, Bitstream, CoreError, CoreResult};

/// Smallest tail worth trying to tokenize; anything shorter is padding.
const MIN_FRAME_BITS: usize = 8;

/// Selector mask over the first 6 kind bits.
const SELECTOR_MASK: u32 = 0x30;

/// Body length in bits, saturating where `usize` cannot hold it.
fn body_bits(size: u32) -> usize {
    usize::try_from(size)
        .ok()
        .and_then(|bytes| bytes.checked_mul(8))
        .unwrap_or(usize::MAX)
}

/// One sub-frame boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Subframe {
    /// Message kind.
    pub kind: u32,
    /// Body length in bytes.
    pub size: u32,
    /// Bit offset of the body within the wrapper payload.
    pub bit_offset: usize,
}

/// Lazy, restartable tokenizer over a wrapper payload.
///
/// Yields `Ok(Subframe)` per boundary. After the first error it yields that
/// error once and then ends.
#[derive(Clone, Debug)]
pub struct SubframeReader {
    stream: Bitstream,
    failed: bool,
}

impl SubframeReader {
    /// Creates a tokenizer over a copy of `payload`.
    ///
    /// # Errors
    ///
    /// [`CoreError::BitstreamTooLarge`] if the payload cannot be addressed
    /// in bits.
    pub fn new(payload: &[u8]) -> CoreResult<Self> {
        Ok(Self {
            stream: Bitstream::new(payload)?,
            failed: false,
        })
    }

    /// Goes back to the first sub-frame.
    pub fn restart(&mut self) {
        self.stream.set_position(0);
        self.failed = false;
    }

    /// Bit position of the tokenizer.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.stream.position()
    }

    /// Reads the next boundary, or `None` at the end of the payload.
    ///
    /// # Errors
    ///
    /// [`CoreError::BitstreamOverflow`] or [`CoreError::VarintCorrupt`] if
    /// the payload is cut short or malformed.
    pub fn next_subframe(&mut self) -> CoreResult<Option<Subframe>> {
        if self.stream.remaining() < MIN_FRAME_BITS {
            return Ok(None);
        }

        let kind = self.read_kind()?;
        let size = self.stream.read_var_u32()?;
        let bit_offset = self.stream.position();

        let body_bits = body_bits(size);
        if body_bits > self.stream.remaining() {
            return Err(CoreError::BitstreamOverflow {
                requested: body_bits,
                position: bit_offset,
                length: self.stream.len(),
            });
        }
        self.stream.seek_forward(body_bits);

        Ok(Some(Subframe {
            kind,
            size,
            bit_offset,
        }))
    }

    /// Copies the body of `frame` out of the payload.
    ///
    /// The tokenizer position is left where it was.
    ///
    /// # Errors
    ///
    /// [`CoreError::BitstreamOverflow`] if `frame` does not lie inside this
    /// payload.
    pub fn body(&mut self, frame: &Subframe) -> CoreResult<Vec<u8>> {
        let bits = body_bits(frame.size);
        let fits = frame
            .bit_offset
            .checked_add(bits)
            .is_some_and(|end| end <= self.stream.len());
        if !fits {
            return Err(CoreError::BitstreamOverflow {
                requested: bits,
                position: frame.bit_offset,
                length: self.stream.len(),
            });
        }

        let resume = self.stream.position();
        self.stream.set_position(frame.bit_offset);
        let mut body = vec![0u8; bits / 8];
        let result = self.stream.read_bits(&mut body, bits);
        self.stream.set_position(resume);

        result.map(|()| body)
    }

    fn read_kind(&mut self) -> CoreResult<u32> {
        let head = self.stream.read(6)?;
        let extra = match head & SELECTOR_MASK {
            0x10 => self.stream.read(4)?,
            0x20 => self.stream.read(8)?,
            0x30 => self.stream.read(28)?,
            _ => return Ok(head),
        };
        Ok((head & 0x0F) | (extra << 4))
    }
}

impl Iterator for SubframeReader {
    type Item = CoreResult<Subframe>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_subframe() {
            Ok(frame) => frame.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Builds a wrapper payload from sub-frames.
#[derive(Clone, Debug, Default)]
pub struct SubframeWriter {
    writer: BitWriter,
    count: usize,
}

impl SubframeWriter {
    /// Creates an empty payload.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            writer: BitWriter::new(),
            count: 0,
        }
    }

    /// Appends a sub-frame.
    ///
    /// # Panics
    ///
    /// If `body` is longer than `u32::MAX` bytes.
    pub fn push(&mut self, kind: u32, body: &[u8]) {
        let low = kind & 0x0F;
        let high = kind >> 4;
        let (selector, width) = match high {
            0 => (0x00, 0),
            1..=0x0F => (0x10, 4),
            0x10..=0xFF => (0x20, 8),
            _ => (0x30, 28),
        };

        self.writer.write_bits(low | selector, 6);
        if width > 0 {
            self.writer.write_bits(high, width);
        }
        let size = u32::try_from(body.len())
            .unwrap_or_else(|_| panic!("sub-frame body of {} bytes exceeds u32", body.len()));
        self.writer.write_var_u32(size);
        self.writer.write_bytes(body);
        self.count += 1;
    }

    /// Number of sub-frames written.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Returns true if nothing was written.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Finishes the payload.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.writer.into_bytes()
    }
}
