//! Constants shared across the trie, the codec and the C ABI.

/// Significant bits of an IPv4 address.
pub const V4_BITS: u8 = 32;
/// Significant bits of an IPv6 address.
pub const V6_BITS: u8 = 128;
/// Width of the unified key space.
pub const KEY_BITS: u8 = 128;
/// IPv4 values live in the low 32 bits; this many high bits are always zero.
pub const V4_OFFSET: u8 = KEY_BITS - V4_BITS;

/// Index of the root node inside the arena.
pub const ROOT: usize = 0;

/// Maximum tag length (bytes, including the trailing NUL) carried over the C ABI.
pub const TAG_MAX_LEN: usize = 64;

// Metric names
pub const METRIC_INSERTS: &str = "cidrtrie_inserts_total";
pub const METRIC_DUMMIES: &str = "cidrtrie_dummy_nodes_total";
pub const METRIC_FINDS: &str = "cidrtrie_finds_total";
pub const METRIC_LOOKUPS: &str = "cidrtrie_lookups_total";
pub const METRIC_NODES: &str = "cidrtrie_nodes";
