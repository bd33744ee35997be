//! # Layout Constants
//!
//! This module centralizes the fixed on-disk layout values for slotdb,
//! grouping interdependent sizes together and enforcing their relationships
//! with compile-time assertions.
//!
//! ## Dependency Graph
//!
//! ```text
//! DEFAULT_LOGICAL_BLOCK_SIZE (65536 bytes)
//!       │
//!       └─> FileMapper extension granularity; every mapped file is a
//!           whole number of logical blocks.
//!
//! INT_STORAGE_SIZE (4 bytes)
//!       │
//!       ├─> SLOT_FLAG_SIZE (same width; the allocation flag is a u32)
//!       │
//!       └─> DATA_HEADER_SIZE (same width; the slot_count header is a u32)
//!
//! TEXT_MAX_PAYLOAD (256 bytes)
//!       │
//!       └─> TEXT_STORAGE_SIZE (derived: TEXT_LEN_SIZE + TEXT_MAX_PAYLOAD)
//! ```
//!
//! ## Critical Invariants
//!
//! 1. `TEXT_STORAGE_SIZE == TEXT_LEN_SIZE + TEXT_MAX_PAYLOAD`
//! 2. `SLOT_FLAG_SIZE == INT_STORAGE_SIZE` (the flag is stored as a u32)
//! 3. `DEFAULT_LOGICAL_BLOCK_SIZE` is a power of two
//!
//! All multi-byte on-disk integers are big-endian regardless of host order;
//! the conversion happens at the serialization boundary, never here.

/// Default granularity at which a `FileMapper` extends its file.
pub const DEFAULT_LOGICAL_BLOCK_SIZE: u32 = 65536;

/// Stored width of an INT column value (32-bit big-endian).
pub const INT_STORAGE_SIZE: usize = 4;

/// Width of the per-slot allocation flag (u32 big-endian, non-zero = live).
pub const SLOT_FLAG_SIZE: usize = 4;

/// Width of the data-file header (the big-endian `slot_count`).
pub const DATA_HEADER_SIZE: usize = 4;

/// Width of a STRING column's length prefix.
pub const TEXT_LEN_SIZE: usize = 4;

/// Maximum payload a STRING column can hold; longer writes are rejected.
pub const TEXT_MAX_PAYLOAD: usize = 256;

/// Stored width of a STRING column region (length prefix + payload).
pub const TEXT_STORAGE_SIZE: usize = TEXT_LEN_SIZE + TEXT_MAX_PAYLOAD;

const _: () = assert!(
    TEXT_STORAGE_SIZE == TEXT_LEN_SIZE + TEXT_MAX_PAYLOAD,
    "TEXT_STORAGE_SIZE derivation mismatch"
);

const _: () = assert!(
    SLOT_FLAG_SIZE == INT_STORAGE_SIZE,
    "the allocation flag is stored as a u32"
);

const _: () = assert!(
    DEFAULT_LOGICAL_BLOCK_SIZE.is_power_of_two(),
    "logical blocks must be a power of two"
);
