//! # Core Error Types
//!
//! Faults raised by the varint codec and the bitstream.

use thiserror::Error;

/// Errors that can occur while decoding primitive values.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreError {
    /// A read asked for more bits than remain, or for more than 32 at once.
    #[error("bitstream overflow: requested {requested} bits at position {position} of {length}")]
    BitstreamOverflow {
        /// Number of bits requested.
        requested: usize,
        /// Bit position at the time of the read.
        position: usize,
        /// Total length of the stream in bits.
        length: usize,
    },

    /// A varint kept its continuation bit set past the maximum byte count.
    #[error("corrupt varint: continuation bit still set after {max_bytes} bytes")]
    VarintCorrupt {
        /// Maximum number of bytes allowed for the integer width.
        max_bytes: usize,
    },

    /// The byte source ran dry in the middle of a varint.
    #[error("truncated varint: source exhausted after {read} bytes")]
    VarintTruncated {
        /// Bytes consumed before the source ran out.
        read: usize,
    },

    /// Data handed to a bitstream exceeds what a 32-bit bit counter can address.
    #[error("bitstream data too large: {bytes} bytes")]
    BitstreamTooLarge {
        /// Size of the rejected data in bytes.
        bytes: usize,
    },

    /// A destination buffer cannot hold the requested output.
    #[error("buffer too small: need {required} bytes, have {available}")]
    BufferTooSmall {
        /// Bytes required.
        required: usize,
        /// Bytes available.
        available: usize,
    },
}

/// Result type for core decode operations.
pub type CoreResult<T> = Result<T, CoreError>;
