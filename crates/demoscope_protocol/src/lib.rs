//! # DEMOSCOPE Protocol
//!
//! Framing and dispatch for demo packet streams.
//!
//! ## Layers
//!
//! 1. **Envelope** - `varint(type) varint(tick) varint(size) payload`
//! 2. **Codec** - optional payload compression, flagged by bit `0x40` of the type
//! 3. **Registry** - `(category, subtype)` to payload decoder, one table per variant
//!
//! ## Example
//!
//! ```rust
//! use demoscope_protocol::{Envelope, SnappyCodec};
//!
//! let mut envelope = Envelope::new(123, 4, b"IAmTheData");
//! let mut buffer = [0u8; 64];
//! let written = envelope.serialize(&mut buffer, None);
//! assert_eq!(written, 13);
//!
//! let (decoded, consumed) = Envelope::deserialize(&buffer[..written]).unwrap();
//! assert_eq!((decoded.tick, consumed), (123, 13));
//!
//! let mut packed = Envelope::new(1, 7, &[0u8; 256]);
//! packed.compress(&SnappyCodec);
//! assert!(packed.is_compressed());
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod codec;
pub mod command;
pub mod envelope;
pub mod error;
pub mod registry;
pub mod variant;

pub use codec::{BlockCodec, Lz4Codec, SnappyCodec};
pub use command::DemoCommand;
pub use envelope::{Envelope, COMPRESSED_FLAG, MAX_HEADER_SIZE};
pub use error::{DecodeError, DecodeResult, EnvelopeError, EnvelopeResult, UncompressError};
pub use registry::{DecodedMessage, Message, MessageRegistry, OpaqueMessage, PacketCategory, Registries};
pub use variant::FormatVariant;
