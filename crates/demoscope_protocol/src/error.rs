//! # Protocol Error Types
//!
//! Faults raised while framing envelopes and decoding payloads.

use demoscope_core::CoreError;
use thiserror::Error;

/// Errors that can occur while deserializing a packet envelope.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeError {
    /// One of the three header varints was corrupt or truncated.
    #[error("envelope header: {0}")]
    Varint(#[from] CoreError),

    /// The declared payload size runs past the end of the buffer.
    #[error("payload out of bounds: header of {header} bytes declares {size} payload bytes, {available} available")]
    PayloadOutOfBounds {
        /// Bytes taken by the header varints.
        header: usize,
        /// Declared payload size.
        size: u32,
        /// Bytes left after the header.
        available: usize,
    },
}

/// Result type for envelope framing.
pub type EnvelopeResult<T> = Result<T, EnvelopeError>;

/// Reasons a compressed payload could not be expanded.
///
/// These are soft failures: the envelope loses its payload but the stream
/// that produced it stays usable.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UncompressError {
    /// The envelope has no payload to expand.
    #[error("no payload to uncompress")]
    MissingPayload,

    /// The payload is not a well-formed compressed block.
    #[error("payload is not a valid compressed block")]
    Malformed,

    /// The declared decompressed length does not fit the scratch buffer.
    #[error("decompressed length {required} exceeds scratch capacity {capacity}")]
    ScratchTooSmall {
        /// Declared decompressed length.
        required: usize,
        /// Scratch buffer capacity.
        capacity: usize,
    },

    /// The block body failed to decode to its declared length.
    #[error("compressed block is corrupt")]
    Corrupt,
}

/// Errors a payload decoder reports for bytes it cannot parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload ended before the message was complete.
    #[error("payload truncated: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes needed.
        needed: usize,
        /// Bytes present.
        available: usize,
    },

    /// The payload is structurally invalid for the message kind.
    #[error("invalid payload: {0}")]
    Invalid(String),
}

/// Result type for payload decoding.
pub type DecodeResult<T> = Result<T, DecodeError>;
