//! # slotdb Configuration Module
//!
//! This module holds the layout constants and the one runtime knob the
//! engine exposes: the logical block size.
//!
//! ## The logical block size
//!
//! A `FileMapper` always extends its file by whole logical blocks, so every
//! table file's size is a multiple of this value. The knob is process-wide
//! for compatibility with the external CLI, but each mapper snapshots it at
//! construction: changing the global afterwards never desynchronizes an
//! already-open mapping.
//!
//! Values must be a positive power of two. The default is 64 KiB, which
//! keeps small tables at two blocks total (one per file) while amortizing
//! remap cost for growing ones.
//!
//! ## Module Organization
//!
//! - [`constants`]: fixed layout values with dependency documentation

pub mod constants;
pub use constants::*;

use std::sync::atomic::{AtomicU32, Ordering};

static LOGICAL_BLOCK_SIZE: AtomicU32 = AtomicU32::new(DEFAULT_LOGICAL_BLOCK_SIZE);

/// Returns the logical block size new mappers will capture.
pub fn logical_block_size() -> u32 {
    LOGICAL_BLOCK_SIZE.load(Ordering::Relaxed)
}

/// Sets the process-wide logical block size.
///
/// Returns `false` without changing anything unless `block_size` is a
/// positive power of two. Mappers constructed before the call keep the
/// value they captured.
pub fn set_logical_block_size(block_size: u32) -> bool {
    if !block_size.is_power_of_two() {
        return false;
    }
    LOGICAL_BLOCK_SIZE.store(block_size, Ordering::Relaxed);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_block_size_is_64k() {
        assert_eq!(logical_block_size(), 65536);
    }

    #[test]
    fn set_block_size_accepts_power_of_two() {
        assert!(set_logical_block_size(DEFAULT_LOGICAL_BLOCK_SIZE));
        assert_eq!(logical_block_size(), DEFAULT_LOGICAL_BLOCK_SIZE);
    }

    #[test]
    fn set_block_size_rejects_zero() {
        assert!(!set_logical_block_size(0));
        assert_eq!(logical_block_size(), DEFAULT_LOGICAL_BLOCK_SIZE);
    }

    #[test]
    fn set_block_size_rejects_non_power_of_two() {
        assert!(!set_logical_block_size(65537));
        assert!(!set_logical_block_size(6000));
        assert_eq!(logical_block_size(), DEFAULT_LOGICAL_BLOCK_SIZE);
    }
}
