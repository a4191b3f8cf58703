//! # Format Variants
//!
//! The two demo layouts, told apart by the magic at the start of the file.

use std::fmt;

use demoscope_core::fnv1a64_cstr;

use crate::command::DemoCommand;

/// Size of the magic field in the file header.
pub const MAGIC_LEN: usize = 8;

/// Magic of the first-generation layout.
pub const MAGIC_A: [u8; MAGIC_LEN] = *b"PBUFDEM\0";

/// Magic of the second-generation layout with nested sub-frames.
pub const MAGIC_B: [u8; MAGIC_LEN] = *b"PBDEMS2\0";

/// FNV-1a hash of [`MAGIC_A`] up to its terminator.
pub const MAGIC_HASH_A: u64 = fnv1a64_cstr(&MAGIC_A);

/// FNV-1a hash of [`MAGIC_B`] up to its terminator.
pub const MAGIC_HASH_B: u64 = fnv1a64_cstr(&MAGIC_B);

static COMMANDS: [DemoCommand; 17] = DemoCommand::ALL;

/// Demo file layout, selected by the header magic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FormatVariant {
    /// Flat packet stream, commands 0-14.
    A,
    /// Packet stream whose wrapper packets carry bit-packed sub-frames,
    /// commands 0-16.
    B,
}

impl FormatVariant {
    /// Both variants, in detection order.
    pub const ALL: [Self; 2] = [Self::A, Self::B];

    /// Header magic for this variant.
    #[must_use]
    pub const fn magic(self) -> [u8; MAGIC_LEN] {
        match self {
            Self::A => MAGIC_A,
            Self::B => MAGIC_B,
        }
    }

    /// Precomputed magic hash for this variant.
    #[must_use]
    pub const fn magic_hash(self) -> u64 {
        match self {
            Self::A => MAGIC_HASH_A,
            Self::B => MAGIC_HASH_B,
        }
    }

    /// Maps a magic hash back to its variant.
    #[must_use]
    pub const fn from_magic_hash(hash: u64) -> Option<Self> {
        match hash {
            MAGIC_HASH_A => Some(Self::A),
            MAGIC_HASH_B => Some(Self::B),
            _ => None,
        }
    }

    /// Detects the variant of a raw magic field.
    #[must_use]
    pub const fn detect(magic: &[u8; MAGIC_LEN]) -> Option<Self> {
        Self::from_magic_hash(fnv1a64_cstr(magic))
    }

    /// Whether wrapper packets carry nested sub-frames.
    #[must_use]
    pub const fn has_subframes(self) -> bool {
        matches!(self, Self::B)
    }

    /// Whether `message_type` is a wrapper carrying nested sub-frames.
    #[must_use]
    pub const fn is_wrapper(self, message_type: u32) -> bool {
        self.has_subframes()
            && (message_type == DemoCommand::Packet as u32
                || message_type == DemoCommand::SignonPacket as u32)
    }

    /// Highest demo command this variant knows.
    #[must_use]
    pub const fn last_command(self) -> DemoCommand {
        match self {
            Self::A => DemoCommand::SaveGame,
            Self::B => DemoCommand::AnimationData,
        }
    }

    /// The demo commands this variant knows, in id order.
    #[must_use]
    pub fn commands(self) -> &'static [DemoCommand] {
        &COMMANDS[..=self.last_command() as usize]
    }

    /// Short display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

impl fmt::Display for FormatVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "variant {}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_both_magics() {
        assert_eq!(FormatVariant::detect(&MAGIC_A), Some(FormatVariant::A));
        assert_eq!(FormatVariant::detect(&MAGIC_B), Some(FormatVariant::B));
        assert_eq!(FormatVariant::detect(b"HL2DEMO\0"), None);
        assert_eq!(FormatVariant::detect(&[0u8; MAGIC_LEN]), None);
    }

    #[test]
    fn test_hashes_differ() {
        assert_ne!(MAGIC_HASH_A, MAGIC_HASH_B);
        for variant in FormatVariant::ALL {
            assert_eq!(FormatVariant::from_magic_hash(variant.magic_hash()), Some(variant));
        }
    }

    #[test]
    fn test_wrappers_only_in_b() {
        assert!(!FormatVariant::A.is_wrapper(7));
        assert!(FormatVariant::B.is_wrapper(7));
        assert!(FormatVariant::B.is_wrapper(8));
        assert!(!FormatVariant::B.is_wrapper(9));
    }

    #[test]
    fn test_command_ranges() {
        assert_eq!(FormatVariant::A.commands().len(), 15);
        assert_eq!(FormatVariant::B.commands().len(), 17);
        assert_eq!(FormatVariant::B.commands()[16], DemoCommand::AnimationData);
    }
}
