//! # slotdb - Slotted Table Storage Engine
//!
//! slotdb is the storage core of a minimal relational database. Each table
//! persists as a pair of memory-mapped files — a self-describing schema
//! blob plus a fixed-width slotted record area — with constant-time slot
//! reuse so delete/insert churn never grows a file.
//!
//! ## Quick Start
//!
//! ```ignore
//! use slotdb::{ColumnDef, StorageTable, TableSchema, Value};
//!
//! let schema = TableSchema::new(vec![
//!     ColumnDef::int("id").primary(),
//!     ColumnDef::text("name"),
//! ])?;
//!
//! let mut table = StorageTable::create(dir, "users", schema)?;
//! table.append_entry(&[Value::Int(7), Value::from("alice")])?;
//!
//! // later, in another process
//! let table = StorageTable::open(dir, "users")?;
//! table.traverse_live_read(|entry| {
//!     println!("{:?}", entry.get("name"));
//! })?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │     StorageTable (row-level API)     │
//! ├──────────────┬───────────────────────┤
//! │ SlotAllocator│  schema codec (.idx)  │
//! ├──────────────┴───────────────────────┤
//! │   FileMapper (mapped byte windows)   │
//! └──────────────────────────────────────┘
//! ```
//!
//! ## On-Disk Format
//!
//! All multi-byte integers are big-endian regardless of host order. The
//! `.dat` file is a `u32 slot_count` header followed by fixed-width slots
//! (`u32` allocation flag + packed columns); the `.idx` file is the schema
//! blob described in [`schema::persistence`]. Both files are padded to a
//! whole number of logical blocks (default 64 KiB).
//!
//! ## Scope
//!
//! slotdb is deliberately a core: no SQL layer, no secondary indexes, no
//! transactions, no journaling, no concurrent writers. The command
//! interpreter and catalog that drive it live with the caller.
//!
//! ## Module Overview
//!
//! - [`storage`]: file mapping, slot allocation, the table itself
//! - [`schema`]: table schemas and the index-file codec
//! - [`types`]: column types and runtime values
//! - [`config`]: layout constants and the logical-block-size knob
//! - [`error`]: level-tagged errors (NORMAL … FATAL)

#[macro_use]
mod macros;

pub mod config;
pub mod error;
pub mod schema;
pub mod storage;
pub mod types;

pub use config::{logical_block_size, set_logical_block_size};
pub use error::{ErrorLevel, StorageError};
pub use schema::TableSchema;
pub use storage::{Entry, EntryMut, FileMapper, SlotAllocator, StorageTable};
pub use types::{ColumnDef, DataType, Value};
