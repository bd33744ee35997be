//! # Column Declarations
//!
//! `ColumnDef` pairs a column name with its `DataType` and primary-key
//! marker. Declaration order is significant: it fixes the on-disk byte
//! offset of every column for the lifetime of the table.

use super::DataType;

/// A column declaration: name, storage type, primary-key marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    name: String,
    data_type: DataType,
    primary: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            primary: false,
        }
    }

    /// Shorthand for an INT column.
    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Int)
    }

    /// Shorthand for a STRING column.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Text)
    }

    /// Marks this column as the primary key.
    ///
    /// If several columns claim it, only the first in declaration order
    /// wins when the schema is assembled.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    /// Bytes this column occupies inside a slot.
    pub fn storage_size(&self) -> usize {
        self.data_type.storage_size()
    }
}
