//! # DEMOSCOPE Core
//!
//! Bit-level decode primitives shared by the demo protocol and container:
//! - Base-128 varints with a checked slow path and an unchecked fast path
//! - A bitstream with unaligned reads of up to 32 bits
//! - FNV-1a hashing for magic detection
//!
//! ## Example
//!
//! ```rust
//! use demoscope_core::{Bitstream, varint};
//!
//! let mut src: &[u8] = &[0x9E, 0xA7, 0x05];
//! assert_eq!(varint::read_var_u32(&mut src), Ok((86942, 3)));
//!
//! let mut stream = Bitstream::new(&[0x9E, 0xA7, 0x05]).unwrap();
//! assert_eq!(stream.read(4), Ok(0xE));
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod bitstream;
pub mod bitwriter;
pub mod error;
pub mod hash;
pub mod varint;

pub use bitstream::{Bitstream, MAX_READ_BITS};
pub use bitwriter::BitWriter;
pub use error::{CoreError, CoreResult};
pub use hash::{fnv1a64, fnv1a64_cstr};
pub use varint::{ByteSource, ReadSource, VARINT32_MAX_BYTES, VARINT64_MAX_BYTES};
