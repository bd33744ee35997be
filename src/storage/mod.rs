//! # Storage Layer
//!
//! The foundational storage layer of slotdb: memory-mapped file windows,
//! slot-id allocation, and the slotted table that composes them.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │           StorageTable  (table.rs)          │
//! │  typed row accessors, traversal, lifecycle  │
//! ├──────────────────────┬──────────────────────┤
//! │ SlotAllocator        │ schema::persistence  │
//! │ (freelist.rs)        │ (index-file codec)   │
//! ├──────────────────────┴──────────────────────┤
//! │           FileMapper  (mmap.rs)             │
//! │   growable mapped windows over table files  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Each table owns two mappers — `<name>.idx` for the schema blob and
//! `<name>.dat` for the fixed-width slot area — plus the allocator that
//! hands out slot ids and reuses freed ones.
//!
//! ## Safety Model
//!
//! Mapped regions are invalidated by growth. The layer exposes only byte
//! slices derived per access (`&self`/`&mut self` borrows), so the borrow
//! checker rules out stale references across a remap at compile time; the
//! table layer stores byte offsets, never addresses.
//!
//! ## Module Organization
//!
//! - `mmap`: low-level mapped file windows (`FileMapper`)
//! - `freelist`: O(1) slot-id allocation (`SlotAllocator`)
//! - `table`: the slotted table and its entry handles

mod freelist;
mod mmap;
mod table;

pub use freelist::{ListIter, SlotAllocator};
pub use mmap::FileMapper;
pub use table::{Entry, EntryMut, StorageTable, DATA_FILE_EXTENSION, INDEX_FILE_EXTENSION};
