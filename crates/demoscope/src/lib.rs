//! # DEMOSCOPE
//!
//! Streaming parser for recorded game demo files.
//!
//! ## File Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Header (12 bytes): magic (8) | offset (4)    │
//! ├──────────────────────────────────────────────┤
//! │ varint(type) varint(tick) varint(size) data  │
//! ├──────────────────────────────────────────────┤
//! │ ...                                          │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The magic selects a [`FormatVariant`]. Variant B wrapper packets carry
//! nested, bit-packed sub-frames, exposed through [`SubframeReader`].
//!
//! ## Example
//!
//! ```rust
//! use demoscope::{DemoFile, DemoWriter, FormatVariant};
//!
//! let mut writer = DemoWriter::new(FormatVariant::A);
//! writer.push(1, 4, b"tables");
//! writer.push_compressed(2, 13, &[0u8; 1024]);
//! let bytes = writer.into_bytes();
//!
//! let mut demo = DemoFile::from_bytes(&bytes).unwrap();
//! while demo.good() {
//!     let packet = demo.get().unwrap();
//!     assert!(packet.payload().is_some());
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod container;
pub mod error;
pub mod header;
pub mod subframe;
pub mod summary;
pub mod writer;

pub use config::{ParserConfig, DEFAULT_SCRATCH_CAPACITY};
pub use container::{DemoFile, Packet, StreamState};
pub use error::{DemoError, DemoResult};
pub use header::{parse_header, DemoHeader, HEADER_SIZE};
pub use subframe::{Subframe, SubframeReader, SubframeWriter};
pub use summary::{CommandStats, DemoSummary};
pub use writer::DemoWriter;

pub use demoscope_protocol::{
    BlockCodec, DecodeError, DecodedMessage, DemoCommand, FormatVariant, Lz4Codec, Message,
    MessageRegistry, OpaqueMessage, PacketCategory, Registries, SnappyCodec, UncompressError,
};
