//! Helper functions for bit arithmetic on the unified 128-bit key space

use crate::constants::{KEY_BITS, V4_OFFSET};

#[inline]
pub fn v4_key(addr: u32) -> u128 {
    addr as u128
}

#[inline]
pub fn v4_addr(key: u128) -> u32 {
    key as u32
}

/// Mask with the top `prefix_len` bits of a `total_bits` wide value set.
///
/// Callers validate `prefix_len <= total_bits`; this only debug-asserts it.
#[inline]
pub fn mask(prefix_len: u8, total_bits: u8) -> u128 {
    debug_assert!(prefix_len <= total_bits && total_bits <= KEY_BITS);
    if prefix_len == 0 {
        return 0;
    }
    let top = !0u128 << (KEY_BITS - prefix_len);
    top >> (KEY_BITS - total_bits)
}

/// Bit at 1-based `position`, counted from the least significant bit.
#[inline]
pub fn get_bit(key: u128, position: u8) -> u8 {
    debug_assert!((1..=KEY_BITS).contains(&position));
    ((key >> (position - 1)) & 1) as u8
}

/// Number of leading bits on which `key1` and `key2` agree, measured inside a
/// `total_bits` wide value.
#[inline]
pub fn leading_common_bits(key1: u128, key2: u128, total_bits: u8) -> u8 {
    let lz = (key1 ^ key2).leading_zeros() as u8;
    if total_bits == KEY_BITS {
        lz
    } else {
        lz.saturating_sub(V4_OFFSET)
    }
}
