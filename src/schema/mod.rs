//! # Table Schemas
//!
//! A `TableSchema` is an ordered sequence of column declarations plus the
//! primary-column ordinal. Declaration order is preserved forever: it
//! determines every column's byte offset inside a slot, so adding or
//! removing columns after creation is not supported.
//!
//! ## Invariants
//!
//! - Column names are unique within a table (`TableSchema::new` rejects
//!   duplicates, which also covers the decode path).
//! - At most one column is primary; when several are declared primary only
//!   the first in declaration order wins.
//! - `record_size()` is the packed width of one slot's column area and does
//!   not include the leading allocation flag.
//!
//! The on-disk form of a schema lives in [`persistence`].

pub mod persistence;

use eyre::Result;
use hashbrown::HashSet;

use crate::error::StorageError;
use crate::types::ColumnDef;

/// Ordered column declarations plus the primary-column ordinal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    columns: Vec<ColumnDef>,
    primary_ordinal: Option<u32>,
}

impl TableSchema {
    /// Assembles a schema from column declarations.
    ///
    /// Rejects duplicate column names. The first column declared primary
    /// becomes the primary ordinal; later claims are ignored.
    /// An empty schema, used as the placeholder inside poisoned tables.
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            primary_ordinal: None,
        }
    }

    pub fn new(columns: Vec<ColumnDef>) -> Result<Self> {
        {
            let mut seen = HashSet::with_capacity(columns.len());
            for col in &columns {
                if !seen.insert(col.name()) {
                    return Err(StorageError::DuplicateColumn {
                        name: col.name().to_owned(),
                    }
                    .into());
                }
            }
        }

        let primary_ordinal = columns
            .iter()
            .position(ColumnDef::is_primary)
            .map(|i| i as u32);

        Ok(Self {
            columns,
            primary_ordinal,
        })
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Zero-based ordinal of the primary column, if any.
    pub fn primary_ordinal(&self) -> Option<u32> {
        self.primary_ordinal
    }

    /// The primary column's declaration, if any.
    pub fn primary_column(&self) -> Option<&ColumnDef> {
        self.primary_ordinal
            .map(|i| &self.columns[i as usize])
    }

    /// Ordinal of a column by name.
    pub fn ordinal(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    /// A column declaration by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.ordinal(name).map(|i| &self.columns[i])
    }

    /// Packed width of one slot's column area (excludes the allocation flag).
    pub fn record_size(&self) -> usize {
        self.columns.iter().map(ColumnDef::storage_size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    #[test]
    fn first_declared_primary_wins() {
        let schema = TableSchema::new(vec![
            ColumnDef::int("a"),
            ColumnDef::int("b").primary(),
            ColumnDef::int("c").primary(),
        ])
        .unwrap();

        assert_eq!(schema.primary_ordinal(), Some(1));
        assert_eq!(schema.primary_column().unwrap().name(), "b");
    }

    #[test]
    fn no_primary_is_none() {
        let schema = TableSchema::new(vec![ColumnDef::int("a")]).unwrap();

        assert_eq!(schema.primary_ordinal(), None);
        assert!(schema.primary_column().is_none());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let result = TableSchema::new(vec![ColumnDef::int("x"), ColumnDef::text("x")]);

        assert!(result.is_err());
    }

    #[test]
    fn record_size_sums_column_widths() {
        let schema = TableSchema::new(vec![
            ColumnDef::int("id").primary(),
            ColumnDef::text("name"),
        ])
        .unwrap();

        assert_eq!(schema.record_size(), 4 + 260);
    }

    #[test]
    fn ordinal_lookup_follows_declaration_order() {
        let schema = TableSchema::new(vec![
            ColumnDef::int("id"),
            ColumnDef::text("name"),
        ])
        .unwrap();

        assert_eq!(schema.ordinal("id"), Some(0));
        assert_eq!(schema.ordinal("name"), Some(1));
        assert_eq!(schema.ordinal("missing"), None);
        assert_eq!(schema.column("name").unwrap().data_type(), DataType::Text);
    }
}
