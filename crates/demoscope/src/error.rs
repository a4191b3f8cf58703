//! # Demo Error Types
//!
//! All errors that can occur while opening or streaming a demo file.

use std::io;

use demoscope_core::CoreError;
use demoscope_protocol::{DecodeError, EnvelopeError};
use thiserror::Error;

use crate::header::HEADER_SIZE;

/// Errors that can occur in the demo container.
#[derive(Error, Debug)]
pub enum DemoError {
    /// The file could not be read.
    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),

    /// The data is shorter than the fixed header.
    #[error("demo too small: {size} bytes, header needs {}", HEADER_SIZE)]
    TooSmall {
        /// Size of the rejected data.
        size: usize,
    },

    /// The magic matches neither known format variant.
    #[error("invalid demo format: unrecognised magic {magic:02x?}")]
    InvalidFormat {
        /// The magic bytes found.
        magic: [u8; 8],
    },

    /// A packet envelope could not be framed.
    #[error("malformed packet at byte {offset}: {source}")]
    Envelope {
        /// Byte offset of the envelope in the file.
        offset: usize,
        /// Underlying framing error.
        source: EnvelopeError,
    },

    /// A bit-level read failed.
    #[error("bitstream: {0}")]
    Bitstream(#[from] CoreError),

    /// A payload decoder rejected its bytes.
    #[error("decode: {0}")]
    Decode(#[from] DecodeError),

    /// `get()` was called with no packets left.
    #[error("demo stream exhausted")]
    Exhausted,

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for demo operations.
pub type DemoResult<T> = Result<T, DemoError>;
