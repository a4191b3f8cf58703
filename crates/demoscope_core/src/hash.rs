//! # FNV-1a Hashing
//!
//! 64-bit FNV-1a, usable in `const` context so magic constants can be
//! hashed at compile time and compared against runtime input.

/// FNV-1a 64-bit offset basis.
pub const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;

/// FNV-1a 64-bit prime.
pub const FNV_PRIME: u64 = 0x0000_0100_0000_01B3;

/// Hashes every byte of `bytes`.
#[inline]
#[must_use]
pub const fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

/// Hashes `bytes` up to (not including) the first NUL byte.
///
/// Fixed-width C string fields are hashed this way: whatever follows the
/// terminator is ignored.
#[inline]
#[must_use]
pub const fn fnv1a64_cstr(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    let mut i = 0;
    while i < bytes.len() && bytes[i] != 0 {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}
