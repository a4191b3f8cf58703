//! # Demo Header
//!
//! ```text
//! ┌──────────────────────────────┬──────────────────────┐
//! │ magic (8, NUL-terminated)    │ summary offset (4)   │
//! └──────────────────────────────┴──────────────────────┘
//! ```
//!
//! The offset is little-endian and points at an out-of-band summary that
//! streaming never reads.

use bytemuck::{Pod, Zeroable};
use demoscope_core::fnv1a64_cstr;
use demoscope_protocol::variant::MAGIC_LEN;
use demoscope_protocol::FormatVariant;
use tracing::debug;

use crate::error::{DemoError, DemoResult};

/// Size of the fixed header in bytes.
pub const HEADER_SIZE: usize = 12;

/// The fixed file header.
///
/// Total size: 12 bytes, byte aligned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct DemoHeader {
    /// Variant magic.
    pub magic: [u8; MAGIC_LEN],
    /// Little-endian summary offset.
    offset: [u8; 4],
}

const _: () = assert!(std::mem::size_of::<DemoHeader>() == HEADER_SIZE);

impl DemoHeader {
    /// Creates a header for `variant`.
    #[must_use]
    pub const fn new(variant: FormatVariant, summary_offset: i32) -> Self {
        Self {
            magic: variant.magic(),
            offset: summary_offset.to_le_bytes(),
        }
    }

    /// Offset of the out-of-band summary.
    #[inline]
    #[must_use]
    pub const fn summary_offset(&self) -> i32 {
        i32::from_le_bytes(self.offset)
    }

    /// Updates the summary offset.
    pub fn set_summary_offset(&mut self, offset: i32) {
        self.offset = offset.to_le_bytes();
    }

    /// Hash of the magic up to its terminator.
    #[must_use]
    pub const fn magic_hash(&self) -> u64 {
        fnv1a64_cstr(&self.magic)
    }

    /// Variant named by the magic, if any.
    #[must_use]
    pub const fn variant(&self) -> Option<FormatVariant> {
        FormatVariant::from_magic_hash(self.magic_hash())
    }

    /// The header as it appears on disk.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Reads and validates the header at the start of `data`.
///
/// # Errors
///
/// - [`DemoError::TooSmall`] if `data` is shorter than [`HEADER_SIZE`].
/// - [`DemoError::InvalidFormat`] if the magic is not a known variant.
pub fn parse_header(data: &[u8]) -> DemoResult<(DemoHeader, FormatVariant)> {
    let bytes = data
        .get(..HEADER_SIZE)
        .ok_or(DemoError::TooSmall { size: data.len() })?;
    let header: DemoHeader = bytemuck::try_pod_read_unaligned(bytes)
        .map_err(|_| DemoError::TooSmall { size: data.len() })?;

    let Some(variant) = header.variant() else {
        return Err(DemoError::InvalidFormat {
            magic: header.magic,
        });
    };

    debug!(
        variant = variant.name(),
        summary_offset = header.summary_offset(),
        "detected demo header"
    );
    Ok((header, variant))
}
