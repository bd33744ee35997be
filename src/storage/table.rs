//! # Slotted Storage Tables
//!
//! `StorageTable` composes the pieces of the engine: two [`FileMapper`]s
//! (one per table file), the decoded [`TableSchema`], and the
//! [`SlotAllocator`]. It exposes the row-level API — allocate, append,
//! delete, typed get/set by column name, and traversal over live slots.
//!
//! ## File Layout
//!
//! Each table is a sibling pair in its database directory:
//!
//! ```text
//! database_dir/
//! ├── users.idx   # schema blob (see schema::persistence), block-padded
//! └── users.dat   # slot area, block-padded:
//!     ┌──────────────────────────────────────────────┐
//!     │ u32 slot_count (big-endian)                  │
//!     │ slot 0: u32 allocation flag, packed columns  │
//!     │ slot 1: ...                                  │
//!     └──────────────────────────────────────────────┘
//! ```
//!
//! Slot width is `4 + Σ column storage sizes`; all slots are fixed-width,
//! so a slot's byte range is pure arithmetic on its id. Deleted slots keep
//! their bytes (only the flag is cleared) and their ids return to the
//! allocator for reuse, which bounds file growth under delete/insert
//! churn.
//!
//! ## Growth and Pointer Invalidation
//!
//! The data mapper grows — one logical block at a time — *before* any
//! write that would fall outside the current window. Growth remaps the
//! file, so this module never stores addresses: every access recomputes
//! byte offsets from the mapper's current base. Entry handles carry
//! `(table, slot id)` only.
//!
//! ## Poisoning
//!
//! A table whose invariants cannot be trusted (wrong file combination on
//! open, duplicate column names, a slot count that overruns the data file,
//! corrupt stored strings, or an explicit erase) is *poisoned*: the flag
//! sticks, and every subsequent operation fails fast with a CRITICAL
//! `TablePoisoned` error. Recovery is the caller's job, typically by
//! dropping and recreating the table.
//!
//! ## Concurrency
//!
//! A table is single-threaded by contract: no operation is designed to
//! interleave with another on the same table (the poison flag is a `Cell`
//! so read paths can trip it). The mappers' grow locks protect only the
//! remap itself.

use std::cell::Cell;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use eyre::{ensure, Result, WrapErr};
use hashbrown::HashMap;
use smallvec::SmallVec;

use super::{FileMapper, SlotAllocator};
use crate::config::{DATA_HEADER_SIZE, SLOT_FLAG_SIZE, TEXT_MAX_PAYLOAD};
use crate::error::StorageError;
use crate::schema::{persistence, TableSchema};
use crate::types::{ColumnDef, DataType, Value};

/// Extension of the schema file.
pub const INDEX_FILE_EXTENSION: &str = "idx";

/// Extension of the slot-data file.
pub const DATA_FILE_EXTENSION: &str = "dat";

/// A table persisted as an `.idx`/`.dat` file pair.
#[derive(Debug)]
pub struct StorageTable {
    name: String,
    index_mapper: Option<FileMapper>,
    data_mapper: Option<FileMapper>,
    schema: TableSchema,
    /// Byte offset of each column inside the packed record area.
    column_offsets: SmallVec<[u32; 8]>,
    /// Column name → ordinal, for O(1) named access.
    ordinals: HashMap<String, usize>,
    allocator: SlotAllocator,
    /// Full slot width: allocation flag + packed record area.
    entry_size: usize,
    /// Mirrors the data file's header.
    slot_count: u32,
    poisoned: Cell<bool>,
}

fn table_paths(dir: &Path, name: &str) -> (PathBuf, PathBuf) {
    (
        dir.join(format!("{}.{}", name, INDEX_FILE_EXTENSION)),
        dir.join(format!("{}.{}", name, DATA_FILE_EXTENSION)),
    )
}

impl StorageTable {
    /// Opens an existing table.
    ///
    /// Both `<dir>/<name>.idx` and `<dir>/<name>.dat` must exist. The
    /// schema is decoded from the index file and the allocator is
    /// rehydrated from the per-slot allocation flags. A missing directory,
    /// a missing file, duplicate column names, or a slot count that
    /// overruns the data file yield a *poisoned* table (`has_error()`
    /// true) rather than an `Err`; genuine I/O and mapping failures are
    /// returned as FATAL errors.
    pub fn open(dir: &Path, name: &str) -> Result<Self> {
        let (idx_path, dat_path) = table_paths(dir, name);

        if !dir.is_dir() || !idx_path.is_file() || !dat_path.is_file() {
            tracing::warn!(table = name, "open: table files missing, poisoning");
            return Ok(Self::unusable(name));
        }

        let index_mapper = FileMapper::open(&idx_path)?;
        let schema = match persistence::decode(index_mapper.bytes()) {
            Ok(schema) => schema,
            Err(report) => {
                if matches!(
                    report.downcast_ref::<StorageError>(),
                    Some(StorageError::DuplicateColumn { .. })
                ) {
                    tracing::warn!(table = name, %report, "open: bad schema, poisoning");
                    return Ok(Self::unusable(name));
                }
                return Err(report);
            }
        };

        let mut table = Self::with_schema(name, schema);
        table.index_mapper = Some(index_mapper);

        let data_mapper = FileMapper::open(&dat_path)?;
        let data = data_mapper.bytes();
        let slot_count = u32::from_be_bytes(data[..DATA_HEADER_SIZE].try_into().unwrap());

        let needed = DATA_HEADER_SIZE + slot_count as usize * table.entry_size;
        if needed > data.len() {
            tracing::warn!(
                table = name,
                slot_count,
                file_len = data.len(),
                "open: slot count overruns the data file, poisoning"
            );
            return Ok(Self::unusable(name));
        }

        let mut bitmap = Vec::with_capacity(slot_count as usize);
        for id in 0..slot_count {
            let off = DATA_HEADER_SIZE + id as usize * table.entry_size;
            let flag = u32::from_be_bytes(data[off..off + SLOT_FLAG_SIZE].try_into().unwrap());
            bitmap.push(flag != 0);
        }

        table.data_mapper = Some(data_mapper);
        table.allocator = SlotAllocator::from_bitmap(&bitmap);
        table.slot_count = slot_count;

        tracing::debug!(
            table = name,
            slots = slot_count,
            live = table.allocator.live_count(),
            "opened table"
        );
        Ok(table)
    }

    /// Creates a new table with the supplied schema.
    ///
    /// The directory is created if missing. If either table file already
    /// exists the returned table is poisoned (`has_error()` true).
    pub fn create(dir: &Path, name: &str, schema: TableSchema) -> Result<Self> {
        if !dir.exists() {
            fs::create_dir_all(dir)
                .wrap_err_with(|| format!("failed to create directory '{}'", dir.display()))?;
        }

        let (idx_path, dat_path) = table_paths(dir, name);
        if idx_path.exists() || dat_path.exists() {
            tracing::warn!(table = name, "create: table files already exist, poisoning");
            return Ok(Self::unusable(name));
        }

        let mut table = Self::with_schema(name, schema);

        let mut index_mapper = FileMapper::open(&idx_path)?;
        let required = persistence::encoded_size(&table.schema);
        while index_mapper.len() < required {
            index_mapper.grow()?;
        }
        persistence::encode_into(&table.schema, index_mapper.bytes_mut())?;
        table.index_mapper = Some(index_mapper);

        let mut data_mapper = FileMapper::open(&dat_path)?;
        data_mapper.bytes_mut()[..DATA_HEADER_SIZE].copy_from_slice(&0u32.to_be_bytes());
        table.data_mapper = Some(data_mapper);

        tracing::debug!(table = name, columns = table.schema.len(), "created table");
        Ok(table)
    }

    fn with_schema(name: &str, schema: TableSchema) -> Self {
        let mut column_offsets = SmallVec::with_capacity(schema.len());
        let mut ordinals = HashMap::with_capacity(schema.len());
        let mut offset = 0u32;
        for (i, col) in schema.columns().iter().enumerate() {
            column_offsets.push(offset);
            ordinals.insert(col.name().to_owned(), i);
            offset += col.storage_size() as u32;
        }

        Self {
            name: name.to_owned(),
            index_mapper: None,
            data_mapper: None,
            entry_size: SLOT_FLAG_SIZE + schema.record_size(),
            schema,
            column_offsets,
            ordinals,
            allocator: SlotAllocator::new(),
            slot_count: 0,
            poisoned: Cell::new(false),
        }
    }

    fn unusable(name: &str) -> Self {
        let table = Self::with_schema(name, TableSchema::empty());
        table.poisoned.set(true);
        table
    }

    /// Whether this table has been poisoned and refuses operations.
    pub fn has_error(&self) -> bool {
        self.poisoned.get()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Full slot width in bytes (allocation flag + packed columns).
    pub fn entry_size(&self) -> usize {
        self.entry_size
    }

    /// Total slots the data file accounts for (live + freed).
    pub fn slot_count(&self) -> u32 {
        self.slot_count
    }

    /// Number of live slots.
    pub fn live_count(&self) -> usize {
        self.allocator.live_count()
    }

    /// Current size of the data file in bytes.
    pub fn data_file_size(&self) -> Result<usize> {
        Ok(self.data()?.len())
    }

    /// Ordinal of a column by name.
    pub fn get_type_index(&self, name: &str) -> Option<usize> {
        self.ordinals.get(name).copied()
    }

    /// The primary column's declaration, if the table has one.
    pub fn get_primary_index(&self) -> Option<&ColumnDef> {
        self.schema.primary_column()
    }

    pub fn primary_ordinal(&self) -> Option<u32> {
        self.schema.primary_ordinal()
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.poisoned.get() {
            return Err(StorageError::TablePoisoned {
                name: self.name.clone(),
            }
            .into());
        }
        Ok(())
    }

    fn data(&self) -> Result<&FileMapper> {
        self.ensure_usable()?;
        self.data_mapper.as_ref().ok_or_else(|| {
            StorageError::TablePoisoned {
                name: self.name.clone(),
            }
            .into()
        })
    }

    fn data_mut(&mut self) -> Result<&mut FileMapper> {
        self.ensure_usable()?;
        self.data_mapper.as_mut().ok_or_else(|| {
            StorageError::TablePoisoned {
                name: self.name.clone(),
            }
            .into()
        })
    }

    /// Byte offset of slot `id` inside the data mapping.
    fn slot_offset(&self, id: u32) -> usize {
        DATA_HEADER_SIZE + id as usize * self.entry_size
    }

    /// Absolute byte offset of a column's region inside slot `id`.
    fn column_offset(&self, id: u32, ordinal: usize) -> usize {
        self.slot_offset(id) + SLOT_FLAG_SIZE + self.column_offsets[ordinal] as usize
    }

    /// Allocates a slot (reusing a freed id when one exists), marks it
    /// live on disk, and returns a handle to it.
    ///
    /// The data mapper grows one logical block at a time until the slot's
    /// byte range fits.
    pub fn allocate_entry(&mut self) -> Result<EntryMut<'_>> {
        self.ensure_usable()?;

        let id = self.allocator.allocate();
        let slot_end = self.slot_offset(id) + self.entry_size;
        while slot_end > self.data()?.len() {
            self.data_mut()?.grow()?;
        }

        if id >= self.slot_count {
            self.slot_count = id + 1;
        }
        let flag_at = self.slot_offset(id);
        let slot_count = self.slot_count;
        let data = self.data_mut()?;
        let bytes = data.bytes_mut();
        bytes[flag_at..flag_at + SLOT_FLAG_SIZE].copy_from_slice(&1u32.to_be_bytes());
        bytes[..DATA_HEADER_SIZE].copy_from_slice(&slot_count.to_be_bytes());

        Ok(EntryMut { table: self, id })
    }

    /// Allocates a slot and writes `values` into its columns in
    /// declaration order.
    ///
    /// STRING values longer than the 256-byte payload area fail before
    /// anything is allocated. Type mismatches silently skip the column,
    /// matching per-column `set` semantics.
    pub fn append_entry(&mut self, values: &[Value]) -> Result<EntryMut<'_>> {
        self.ensure_usable()?;
        for (i, value) in values.iter().enumerate() {
            if let Value::Text(s) = value {
                ensure!(
                    s.len() <= TEXT_MAX_PAYLOAD,
                    "value for column {} is {} bytes, exceeding the {}-byte payload area",
                    i,
                    s.len(),
                    TEXT_MAX_PAYLOAD
                );
            }
        }

        let id = self.allocate_entry()?.id();
        for ordinal in 0..self.schema.len().min(values.len()) {
            self.write_by_ordinal(id, ordinal, &values[ordinal])?;
        }
        Ok(EntryMut { table: self, id })
    }

    /// Clears the slot's allocation flag and returns its id to the
    /// allocator. Out-of-range or already-free ids return `Ok(false)`.
    pub fn delete_entry_by_id(&mut self, id: u32) -> Result<bool> {
        self.ensure_usable()?;
        if !self.allocator.is_allocated(id) {
            return Ok(false);
        }

        let flag_at = self.slot_offset(id);
        let data = self.data_mut()?;
        data.bytes_mut()[flag_at..flag_at + SLOT_FLAG_SIZE]
            .copy_from_slice(&0u32.to_be_bytes());
        self.allocator.free(id);
        Ok(true)
    }

    /// Deletes every live slot whose primary-column value equals `key`.
    ///
    /// Fails with a CRITICAL error when the table has no primary column or
    /// `key` is of the wrong type. Returns the number of slots deleted.
    pub fn delete_entry_by_primary_key(&mut self, key: &Value) -> Result<usize> {
        self.ensure_usable()?;
        let Some(ordinal) = self.schema.primary_ordinal() else {
            return Err(StorageError::MissingPrimaryColumn {
                table: self.name.clone(),
            }
            .into());
        };
        let ordinal = ordinal as usize;
        let primary_type = self.schema.columns()[ordinal].data_type();
        if !key.is_type(primary_type) {
            return Err(StorageError::TypeMismatch {
                expected: primary_type,
                actual: key.data_type(),
            }
            .into());
        }

        let mut matches: SmallVec<[u32; 16]> = SmallVec::new();
        for id in self.allocator.live_ids() {
            let stored = self.read_by_ordinal(id, ordinal)?;
            if stored.compare(key)? == Ordering::Equal {
                matches.push(id);
            }
        }

        for &id in &matches {
            self.delete_entry_by_id(id)?;
        }
        Ok(matches.len())
    }

    /// Whether slot `id` is currently allocated.
    pub fn is_allocated(&self, id: u32) -> bool {
        self.allocator.is_allocated(id)
    }

    /// A read handle to slot `id`, if it is live.
    pub fn entry(&self, id: u32) -> Option<Entry<'_>> {
        self.allocator
            .is_allocated(id)
            .then_some(Entry { table: self, id })
    }

    /// A write handle to slot `id`, if it is live.
    pub fn entry_mut(&mut self, id: u32) -> Option<EntryMut<'_>> {
        if self.allocator.is_allocated(id) {
            Some(EntryMut { table: self, id })
        } else {
            None
        }
    }

    /// Visits every live slot, most recently allocated first.
    pub fn traverse_live_read<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(Entry<'_>),
    {
        self.ensure_usable()?;
        for id in self.allocator.live_ids() {
            f(Entry { table: self, id });
        }
        Ok(())
    }

    /// Visits every live slot with write access, most recently allocated
    /// first.
    pub fn traverse_live_rw<F>(&mut self, mut f: F) -> Result<()>
    where
        F: for<'a, 'b> FnMut(&'b mut EntryMut<'a>),
    {
        self.ensure_usable()?;
        let ids: SmallVec<[u32; 16]> = self.allocator.live_ids().collect();
        for id in ids {
            let mut entry = EntryMut { table: self, id };
            f(&mut entry);
        }
        Ok(())
    }

    /// Flushes both mappings to disk.
    pub fn sync(&self) -> Result<()> {
        self.ensure_usable()?;
        if let Some(mapper) = &self.index_mapper {
            mapper.sync()?;
        }
        if let Some(mapper) = &self.data_mapper {
            mapper.sync()?;
        }
        Ok(())
    }

    /// Closes both mappings, deletes both files, and poisons the table.
    pub fn erase_and_make_unavailable(&mut self) -> Result<()> {
        self.ensure_usable()?;

        let paths: Vec<PathBuf> = self
            .index_mapper
            .take()
            .into_iter()
            .chain(self.data_mapper.take())
            .map(|mapper| {
                let path = mapper.path().to_path_buf();
                drop(mapper);
                path
            })
            .collect();

        self.schema = TableSchema::empty();
        self.column_offsets.clear();
        self.ordinals.clear();
        self.allocator = SlotAllocator::new();
        self.slot_count = 0;
        self.entry_size = SLOT_FLAG_SIZE;
        self.poisoned.set(true);

        for path in paths {
            fs::remove_file(&path)
                .wrap_err_with(|| format!("failed to remove '{}'", path.display()))?;
        }

        tracing::debug!(table = %self.name, "erased table");
        Ok(())
    }

    /// Writes `value` into the named column of slot `id`.
    ///
    /// Returns `Ok(false)` — leaving the slot untouched — when the column
    /// does not exist, the value's type disagrees, or a STRING payload
    /// exceeds 256 bytes.
    pub fn set_value(&mut self, id: u32, name: &str, value: &Value) -> Result<bool> {
        self.ensure_usable()?;
        let Some(ordinal) = self.ordinals.get(name).copied() else {
            return Ok(false);
        };
        self.write_by_ordinal(id, ordinal, value)
    }

    /// Reads the named column of slot `id` as a freshly materialized
    /// value, or `None` if no such column exists.
    pub fn get_value(&self, id: u32, name: &str) -> Result<Option<Value>> {
        self.ensure_usable()?;
        let Some(ordinal) = self.ordinals.get(name).copied() else {
            return Ok(None);
        };
        self.read_by_ordinal(id, ordinal).map(Some)
    }

    fn write_by_ordinal(&mut self, id: u32, ordinal: usize, value: &Value) -> Result<bool> {
        if !value.is_type(self.schema.columns()[ordinal].data_type()) {
            return Ok(false);
        }
        let at = self.column_offset(id, ordinal);

        match value {
            Value::Int(v) => {
                let bytes = self.data_mut()?.bytes_mut();
                bytes[at..at + 4].copy_from_slice(&v.to_be_bytes());
            }
            Value::Text(s) => {
                if s.len() > TEXT_MAX_PAYLOAD {
                    return Ok(false);
                }
                let bytes = self.data_mut()?.bytes_mut();
                bytes[at..at + 4].copy_from_slice(&(s.len() as u32).to_be_bytes());
                bytes[at + 4..at + 4 + s.len()].copy_from_slice(s.as_bytes());
            }
        }
        Ok(true)
    }

    fn read_by_ordinal(&self, id: u32, ordinal: usize) -> Result<Value> {
        let col = &self.schema.columns()[ordinal];
        let at = self.column_offset(id, ordinal);
        let data = self.data()?.bytes();

        match col.data_type() {
            DataType::Int => {
                let raw = i32::from_be_bytes(data[at..at + 4].try_into().unwrap());
                Ok(Value::Int(raw))
            }
            DataType::Text => {
                let len = u32::from_be_bytes(data[at..at + 4].try_into().unwrap());
                if len as usize > TEXT_MAX_PAYLOAD {
                    self.poisoned.set(true);
                    return Err(StorageError::CorruptText {
                        column: col.name().to_owned(),
                        length: len,
                        max: TEXT_MAX_PAYLOAD,
                    }
                    .into());
                }
                let payload = &data[at + 4..at + 4 + len as usize];
                Ok(Value::Text(String::from_utf8_lossy(payload).into_owned()))
            }
        }
    }

    fn slot_flag(&self, id: u32) -> bool {
        let Ok(data) = self.data() else {
            return false;
        };
        let at = self.slot_offset(id);
        u32::from_be_bytes(data.bytes()[at..at + SLOT_FLAG_SIZE].try_into().unwrap()) != 0
    }
}

/// Read handle to one live slot: `(table, slot id)`, no owned bytes.
#[derive(Debug)]
pub struct Entry<'t> {
    table: &'t StorageTable,
    id: u32,
}

impl Entry<'_> {
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Width of the slot this entry points at.
    pub fn byte_len(&self) -> usize {
        self.table.entry_size()
    }

    /// Reads the slot's on-disk allocation flag.
    pub fn is_allocated(&self) -> bool {
        self.table.slot_flag(self.id)
    }

    /// A freshly materialized copy of the named column's value, or `None`
    /// if no such column exists.
    pub fn get(&self, name: &str) -> Result<Option<Value>> {
        self.table.get_value(self.id, name)
    }
}

/// Write handle to one live slot.
#[derive(Debug)]
pub struct EntryMut<'t> {
    table: &'t mut StorageTable,
    id: u32,
}

impl EntryMut<'_> {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn byte_len(&self) -> usize {
        self.table.entry_size()
    }

    pub fn is_allocated(&self) -> bool {
        self.table.slot_flag(self.id)
    }

    pub fn get(&self, name: &str) -> Result<Option<Value>> {
        self.table.get_value(self.id, name)
    }

    /// Encodes `value` into the named column. Returns whether the column
    /// exists and the value fits; failed writes leave the slot untouched.
    pub fn set(&mut self, name: &str, value: &Value) -> Result<bool> {
        self.table.set_value(self.id, name, value)
    }

    /// Deletes the slot this handle points at.
    pub fn delete(self) -> Result<bool> {
        self.table.delete_entry_by_id(self.id)
    }
}
