//! This module contains constants that are needed throughout the codebase.

/// The width of a storage slot (and of any word on the EVM) in bytes.
pub const SLOT_SIZE_BYTES: usize = 32;

/// The width of an address in bytes.
pub const ADDRESS_SIZE_BYTES: usize = 20;

/// The number of bytes a `bool` occupies when packed into a slot.
pub const BOOL_SIZE_BYTES: usize = 1;

/// The number of bytes an enum occupies when packed into a slot.
///
/// Enums with more than 256 members would need more, but contracts with such
/// enums are not seen in practice.
pub const ENUM_SIZE_BYTES: usize = 1;

/// The number of storage slot indices whose hashes are precomputed.
///
/// The compiler constant-folds `keccak(slot)` for dynamic arrays and strings
/// declared at small slot indices, so these hashes never show up as hashing
/// events during execution and have to be recognised from this table instead.
pub const PRECOMPUTED_SLOT_HASH_COUNT: u64 = 5_000;

/// The number of leading digest bytes used to look up a hash.
///
/// Keys derived as `digest + offset` share this prefix with their digest for
/// any offset that does not carry into it.
pub const HASH_LOOKUP_PREFIX_BYTES: usize = 20;

/// The maximum number of hashing steps followed when resolving a single key.
pub const MAXIMUM_RESOLUTION_DEPTH: usize = 64;

/// The separator used in the textual form of a path.
pub const PATH_SEPARATOR: char = '|';

/// The number of leading zero bytes above which a label is rendered as an
/// integer.
pub const NUMERIC_LABEL_LEADING_ZEROS: usize = 16;

/// Integer labels with fewer significant bits than this are rendered in
/// decimal, otherwise in hexadecimal.
pub const DECIMAL_LABEL_MAXIMUM_BITS: u32 = 31;

/// The seed hashed to produce the Solidity layout fingerprint.
pub const SOLIDITY_LAYOUT_NAME: &str = "solidity";

/// The seed hashed to produce the Serpent layout fingerprint.
pub const SERPENT_LAYOUT_NAME: &str = "serpent";

/// The default for whether the Solidity layout dictionary is recorded.
pub const DEFAULT_RECORD_SOLIDITY: bool = true;

/// The default for whether the Serpent layout dictionary is recorded.
pub const DEFAULT_RECORD_SERPENT: bool = true;

/// The default for whether typed queries synthesize entries for top-level
/// members that were never written.
pub const DEFAULT_FILL_MISSING_KEYS: bool = true;

/// The default upper bound on the number of entries in a single page.
pub const DEFAULT_MAXIMUM_PAGE_SIZE: usize = 1_000;

/// Leading zero nibble bounds for a raw word to look like an address.
pub const ADDRESS_LEADING_ZERO_NIBBLES: (usize, usize) = (24, 30);

/// Trailing zero nibble bounds for a raw word to look like a short string.
pub const STRING_TRAILING_ZERO_NIBBLES: (usize, usize) = (14, 62);

/// The minimum number of leading zero nibbles for a raw word to look like a
/// number.
pub const NUMBER_LEADING_ZERO_NIBBLES: usize = 48;
