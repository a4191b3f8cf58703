//! # Demo Container
//!
//! Streams the packets of one demo file.
//!
//! ## Lifecycle
//!
//! ```text
//! open / from_bytes ──► HeaderValidated ──get()──► Streaming ──► Exhausted
//!        │
//!        └── Err(TooSmall | InvalidFormat | Io), buffer released
//! ```
//!
//! ## Memory
//!
//! - The primary buffer is owned (read from a path) or borrowed (caller memory)
//! - One scratch buffer, allocated after the header validates, holds every
//!   decompressed payload in turn
//! - A [`Packet`] borrows both, so it must be dropped before the next `get()`

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use demoscope_protocol::{
    BlockCodec, DecodeResult, DecodedMessage, DemoCommand, Envelope, FormatVariant,
    MessageRegistry, PacketCategory, Registries, SnappyCodec, UncompressError,
};
use tracing::{debug, trace, warn};

use crate::config::ParserConfig;
use crate::error::{DemoError, DemoResult};
use crate::header::{parse_header, DemoHeader, HEADER_SIZE};
use crate::subframe::{Subframe, SubframeReader};

/// Where the primary buffer lives.
enum Buffer<'a> {
    Owned(Vec<u8>),
    Borrowed(&'a [u8]),
}

impl Buffer<'_> {
    fn as_slice(&self) -> &[u8] {
        match self {
            Self::Owned(data) => data,
            Self::Borrowed(data) => data,
        }
    }
}

/// Streaming state of a [`DemoFile`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    /// Header checked, no packet read yet.
    HeaderValidated,
    /// At least one packet read and more remain.
    Streaming,
    /// Every packet has been read, or the stream was abandoned after a
    /// malformed packet.
    Exhausted,
}

/// A demo file being streamed.
pub struct DemoFile<'a> {
    data: Buffer<'a>,
    scratch: Vec<u8>,
    cursor: usize,
    header: DemoHeader,
    variant: FormatVariant,
    state: StreamState,
    last_tick: Option<u32>,
    registries: Arc<Registries>,
    codec: Arc<dyn BlockCodec>,
    config: ParserConfig,
}

impl DemoFile<'static> {
    /// Reads a demo file with the default tables and settings.
    ///
    /// # Errors
    ///
    /// [`DemoError::Io`], [`DemoError::TooSmall`] or
    /// [`DemoError::InvalidFormat`].
    pub fn open(path: impl AsRef<Path>) -> DemoResult<Self> {
        Self::open_with(
            path,
            Arc::new(Registries::with_defaults()),
            ParserConfig::default(),
        )
    }

    /// Reads a demo file with explicit tables and settings.
    ///
    /// # Errors
    ///
    /// As [`DemoFile::open`], plus [`DemoError::Config`] for an invalid
    /// `config`.
    pub fn open_with(
        path: impl AsRef<Path>,
        registries: Arc<Registries>,
        config: ParserConfig,
    ) -> DemoResult<Self> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        debug!(path = %path.display(), bytes = data.len(), "read demo file");
        Self::from_buffer(Buffer::Owned(data), registries, config)
    }

    /// Takes ownership of demo bytes already in memory.
    ///
    /// # Errors
    ///
    /// [`DemoError::TooSmall`] or [`DemoError::InvalidFormat`].
    pub fn from_vec(data: Vec<u8>) -> DemoResult<Self> {
        Self::from_buffer(
            Buffer::Owned(data),
            Arc::new(Registries::with_defaults()),
            ParserConfig::default(),
        )
    }
}

impl<'a> DemoFile<'a> {
    /// Streams demo bytes owned by the caller.
    ///
    /// # Errors
    ///
    /// [`DemoError::TooSmall`] or [`DemoError::InvalidFormat`].
    pub fn from_bytes(data: &'a [u8]) -> DemoResult<Self> {
        Self::from_bytes_with(
            data,
            Arc::new(Registries::with_defaults()),
            ParserConfig::default(),
        )
    }

    /// Streams caller-owned bytes with explicit tables and settings.
    ///
    /// # Errors
    ///
    /// As [`DemoFile::from_bytes`], plus [`DemoError::Config`].
    pub fn from_bytes_with(
        data: &'a [u8],
        registries: Arc<Registries>,
        config: ParserConfig,
    ) -> DemoResult<Self> {
        Self::from_buffer(Buffer::Borrowed(data), registries, config)
    }

    fn from_buffer(
        data: Buffer<'a>,
        registries: Arc<Registries>,
        config: ParserConfig,
    ) -> DemoResult<Self> {
        config.validate()?;
        let (header, variant) = parse_header(data.as_slice())?;
        let scratch = vec![0u8; config.scratch_capacity];

        debug!(
            variant = variant.name(),
            bytes = data.as_slice().len(),
            scratch = scratch.len(),
            "demo stream ready"
        );

        Ok(Self {
            data,
            scratch,
            cursor: HEADER_SIZE,
            header,
            variant,
            state: StreamState::HeaderValidated,
            last_tick: None,
            registries,
            codec: Arc::new(SnappyCodec),
            config,
        })
    }

    /// Replaces the payload codec (Snappy by default).
    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn BlockCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Returns true while packets remain.
    #[inline]
    #[must_use]
    pub fn good(&self) -> bool {
        self.cursor < self.data.as_slice().len()
    }

    /// Reads the next packet.
    ///
    /// Compressed payloads are expanded into the scratch buffer. A payload
    /// that fails to expand is reported on the packet and left absent; the
    /// stream carries on.
    ///
    /// # Errors
    ///
    /// - [`DemoError::Exhausted`] if no packets remain.
    /// - [`DemoError::Envelope`] for a malformed packet. The stream is
    ///   exhausted afterwards.
    pub fn get(&mut self) -> DemoResult<Packet<'_>> {
        let buffer = self.data.as_slice();
        if self.cursor >= buffer.len() {
            self.state = StreamState::Exhausted;
            return Err(DemoError::Exhausted);
        }

        let offset = self.cursor;
        let (mut envelope, consumed) = match Envelope::deserialize(&buffer[offset..]) {
            Ok(parsed) => parsed,
            Err(source) => {
                warn!(offset, error = %source, "malformed packet, abandoning stream");
                self.cursor = buffer.len();
                self.state = StreamState::Exhausted;
                return Err(DemoError::Envelope { offset, source });
            }
        };

        self.cursor = offset + consumed;
        self.state = if self.cursor < buffer.len() {
            StreamState::Streaming
        } else {
            StreamState::Exhausted
        };

        if let Some(last) = self.last_tick {
            if envelope.tick < last && self.config.warn_on_tick_regression {
                warn!(offset, tick = envelope.tick, previous = last, "tick went backwards");
            }
        }
        self.last_tick = Some(envelope.tick);

        let compressed = envelope.is_compressed();
        let mut uncompress_error = None;
        if compressed {
            if let Err(err) = envelope.uncompress(self.codec.as_ref(), &mut self.scratch) {
                warn!(
                    offset,
                    tick = envelope.tick,
                    message_type = envelope.message_type(),
                    error = %err,
                    "failed to uncompress payload"
                );
                uncompress_error = Some(err);
            }
        }

        let tokenize =
            self.config.tokenize_wrappers && self.variant.is_wrapper(envelope.message_type());

        Ok(Packet {
            envelope,
            offset,
            variant: self.variant,
            compressed,
            uncompress_error,
            tokenize,
            subframes: None,
            registry: self.registries.get(self.variant),
        })
    }

    /// Goes back to the first packet.
    pub fn rewind(&mut self) {
        self.cursor = HEADER_SIZE;
        self.state = StreamState::HeaderValidated;
        self.last_tick = None;
    }

    /// Current streaming state.
    #[must_use]
    pub const fn state(&self) -> StreamState {
        self.state
    }

    /// Format variant named by the header.
    #[must_use]
    pub const fn variant(&self) -> FormatVariant {
        self.variant
    }

    /// The validated header.
    #[must_use]
    pub const fn header(&self) -> &DemoHeader {
        &self.header
    }

    /// Offset of the out-of-band summary.
    #[must_use]
    pub const fn summary_offset(&self) -> i32 {
        self.header.summary_offset()
    }

    /// Byte offset of the next packet.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.cursor
    }

    /// Total size of the demo in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.as_slice().len()
    }

    /// Returns true if the demo holds no packets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() <= HEADER_SIZE
    }

    /// Whether the container owns its primary buffer.
    #[must_use]
    pub const fn is_owned(&self) -> bool {
        matches!(self.data, Buffer::Owned(_))
    }

    /// Capacity of the decompression scratch buffer.
    #[must_use]
    pub fn scratch_capacity(&self) -> usize {
        self.scratch.len()
    }

    /// Decoder table installed for this demo's variant.
    #[must_use]
    pub fn registry(&self) -> &MessageRegistry {
        self.registries.get(self.variant)
    }

    /// Active settings.
    #[must_use]
    pub const fn config(&self) -> &ParserConfig {
        &self.config
    }
}

impl fmt::Debug for DemoFile<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DemoFile")
            .field("variant", &self.variant)
            .field("len", &self.len())
            .field("owned", &self.is_owned())
            .field("cursor", &self.cursor)
            .field("state", &self.state)
            .field("scratch_capacity", &self.scratch.len())
            .finish_non_exhaustive()
    }
}

/// One packet read from a [`DemoFile`].
///
/// The payload borrows the container's buffers.
#[derive(Debug)]
pub struct Packet<'p> {
    envelope: Envelope<'p>,
    offset: usize,
    variant: FormatVariant,
    compressed: bool,
    uncompress_error: Option<UncompressError>,
    /// Wrapper payload not yet handed to a tokenizer.
    tokenize: bool,
    subframes: Option<SubframeReader>,
    registry: &'p MessageRegistry,
}

impl<'p> Packet<'p> {
    /// Tick the packet belongs to.
    #[must_use]
    pub const fn tick(&self) -> u32 {
        self.envelope.tick
    }

    /// Raw type field, including the compressed flag if the payload is
    /// still compressed.
    #[must_use]
    pub const fn packet_type(&self) -> u32 {
        self.envelope.packet_type
    }

    /// Type with the compressed flag cleared.
    #[must_use]
    pub const fn message_type(&self) -> u32 {
        self.envelope.message_type()
    }

    /// Demo command, if the type is one the variant knows.
    #[must_use]
    pub fn command(&self) -> Option<DemoCommand> {
        DemoCommand::from_u32(self.message_type())
            .filter(|&command| command <= self.variant.last_command())
    }

    /// Payload bytes, absent if decompression failed.
    #[must_use]
    pub fn payload(&self) -> Option<&[u8]> {
        self.envelope.payload()
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.envelope.size()
    }

    /// Byte offset of the packet in the demo.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Whether the payload was stored compressed.
    #[must_use]
    pub const fn was_compressed(&self) -> bool {
        self.compressed
    }

    /// Why the payload could not be expanded, if it could not.
    #[must_use]
    pub const fn uncompress_error(&self) -> Option<UncompressError> {
        self.uncompress_error
    }

    /// Whether the packet carries nested sub-frames.
    #[must_use]
    pub const fn is_wrapper(&self) -> bool {
        self.variant.is_wrapper(self.message_type())
    }

    /// The underlying envelope.
    #[must_use]
    pub const fn envelope(&self) -> &Envelope<'p> {
        &self.envelope
    }

    /// Takes the envelope. Call [`Envelope::into_owned`] to keep it past
    /// the next `get()`.
    #[must_use]
    pub fn into_envelope(self) -> Envelope<'p> {
        self.envelope
    }

    /// Sub-frame tokenizer for wrapper packets, built on first use.
    pub fn subframes(&mut self) -> Option<&mut SubframeReader> {
        if self.tokenize {
            self.tokenize = false;
            if let Some(payload) = self.envelope.payload() {
                match SubframeReader::new(payload) {
                    Ok(reader) => self.subframes = Some(reader),
                    Err(err) => {
                        warn!(
                            offset = self.offset,
                            error = %err,
                            "cannot tokenize wrapper payload"
                        );
                    }
                }
            }
        }
        self.subframes.as_mut()
    }

    /// Decodes the payload with the demo-command decoder for its type.
    ///
    /// `Ok(None)` if no decoder is registered or the payload is absent.
    ///
    /// # Errors
    ///
    /// The decoder's error.
    pub fn resolve(&self) -> DecodeResult<Option<DecodedMessage>> {
        let Some(payload) = self.payload() else {
            return Ok(None);
        };

        let decoded = self
            .registry
            .resolve(PacketCategory::Demo, self.message_type(), payload)?;
        if decoded.is_none() {
            trace!(message_type = self.message_type(), "no decoder for demo command");
        }
        Ok(decoded)
    }

    /// Decodes the body of a sub-frame with the network-message decoder
    /// for its kind.
    ///
    /// # Errors
    ///
    /// [`DemoError::Bitstream`] if the body lies outside the payload,
    /// [`DemoError::Decode`] for the decoder's error.
    pub fn resolve_subframe(&mut self, frame: &Subframe) -> DemoResult<Option<DecodedMessage>> {
        let registry = self.registry;
        let Some(reader) = self.subframes() else {
            return Ok(None);
        };
        if !registry.is_registered(PacketCategory::Net, frame.kind) {
            trace!(kind = frame.kind, "no decoder for sub-frame");
            return Ok(None);
        }

        let body = reader.body(frame)?;
        Ok(registry.resolve(PacketCategory::Net, frame.kind, &body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subframe::SubframeWriter;
    use crate::writer::DemoWriter;

    fn wrapper_demo() -> Vec<u8> {
        let mut frames = SubframeWriter::new();
        frames.push(4, b"net");
        let mut writer = DemoWriter::new(FormatVariant::B);
        writer.push(0, DemoCommand::Packet as u32, &frames.into_bytes());
        writer.into_bytes()
    }

    #[test]
    fn test_wrapper_tokenizer_built_on_demand() {
        let bytes = wrapper_demo();
        let mut demo = DemoFile::from_bytes(&bytes).unwrap();
        let mut packet = demo.get().unwrap();
        assert!(packet.subframes.is_none());

        let frame = packet.subframes().unwrap().next().unwrap().unwrap();
        assert_eq!(frame.kind, 4);
        assert!(packet.subframes.is_some());
    }

    #[test]
    fn test_skipped_wrapper_never_tokenized() {
        let bytes = wrapper_demo();
        let mut demo = DemoFile::from_bytes(&bytes).unwrap();
        let packet = demo.get().unwrap();
        assert!(packet.is_wrapper());
        assert!(packet.tokenize);
        assert!(packet.subframes.is_none());
    }
}
