//! # Demo Writer
//!
//! Builds a demo file in memory: header first, then one envelope per
//! packet. The output streams back through [`DemoFile`](crate::DemoFile).

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use demoscope_protocol::{BlockCodec, Envelope, FormatVariant, SnappyCodec, MAX_HEADER_SIZE};
use tracing::debug;

use crate::error::DemoResult;
use crate::header::{DemoHeader, HEADER_SIZE};

/// Demo file builder.
pub struct DemoWriter {
    header: DemoHeader,
    buffer: Vec<u8>,
    codec: Arc<dyn BlockCodec>,
    packet_count: usize,
}

impl DemoWriter {
    /// Starts a demo of `variant` using the Snappy codec.
    #[must_use]
    pub fn new(variant: FormatVariant) -> Self {
        Self::with_codec(variant, Arc::new(SnappyCodec))
    }

    /// Starts a demo of `variant` with a custom codec.
    #[must_use]
    pub fn with_codec(variant: FormatVariant, codec: Arc<dyn BlockCodec>) -> Self {
        let header = DemoHeader::new(variant, 0);
        let mut buffer = Vec::with_capacity(4096);
        buffer.extend_from_slice(header.as_bytes());

        Self {
            header,
            buffer,
            codec,
            packet_count: 0,
        }
    }

    /// Sets the summary offset written in the header.
    pub fn set_summary_offset(&mut self, offset: i32) {
        self.header.set_summary_offset(offset);
        self.buffer[..HEADER_SIZE].copy_from_slice(self.header.as_bytes());
    }

    /// Appends a packet with a raw payload. Returns the bytes written.
    pub fn push(&mut self, tick: u32, message_type: u32, payload: &[u8]) -> usize {
        self.push_envelope(&mut Envelope::new(tick, message_type, payload), false)
    }

    /// Appends a packet whose payload is stored compressed.
    pub fn push_compressed(&mut self, tick: u32, message_type: u32, payload: &[u8]) -> usize {
        self.push_envelope(&mut Envelope::new(tick, message_type, payload), true)
    }

    /// Appends an envelope, compressing it first when `pack` is set.
    pub fn push_envelope(&mut self, envelope: &mut Envelope<'_>, pack: bool) -> usize {
        if pack {
            envelope.compress(self.codec.as_ref());
        }

        let start = self.buffer.len();
        self.buffer.resize(start + envelope.size() + MAX_HEADER_SIZE, 0);
        let written = envelope.serialize(&mut self.buffer[start..], None);
        self.buffer.truncate(start + written);
        self.packet_count += 1;
        written
    }

    /// Number of packets written.
    #[must_use]
    pub const fn packet_count(&self) -> usize {
        self.packet_count
    }

    /// Size of the demo so far in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no packets have been written.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.packet_count == 0
    }

    /// The demo bytes so far.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Finishes the demo.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Writes the demo to `writer`.
    ///
    /// # Errors
    ///
    /// Any I/O error from `writer`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.buffer)
    }

    /// Writes the demo to a file.
    ///
    /// # Errors
    ///
    /// [`DemoError::Io`](crate::DemoError::Io) if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> DemoResult<()> {
        let path = path.as_ref();
        fs::write(path, &self.buffer)?;
        debug!(
            path = %path.display(),
            bytes = self.buffer.len(),
            packets = self.packet_count,
            "wrote demo file"
        );
        Ok(())
    }
}
