//! # Tagged Storage Errors
//!
//! Every failure in the engine carries an [`ErrorLevel`] alongside its
//! message. `FATAL` marks unrecoverable I/O or mapping failures that poison
//! the owning table; `CRITICAL` marks contract violations reported back to
//! callers. Expected absences (unknown column, already-free slot) are plain
//! `Option`/`bool` returns, not errors.
//!
//! Errors travel as `eyre::Report`; callers that need the level downcast:
//!
//! ```ignore
//! if let Some(err) = report.downcast_ref::<StorageError>() {
//!     if err.level() == ErrorLevel::Fatal { /* drop the table */ }
//! }
//! ```

use std::path::PathBuf;

use thiserror::Error;

use crate::types::DataType;

/// Severity attached to every engine error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorLevel {
    Normal,
    Info,
    Debug,
    Warning,
    Critical,
    Fatal,
}

impl std::fmt::Display for ErrorLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorLevel::Normal => "NORMAL",
            ErrorLevel::Info => "INFO",
            ErrorLevel::Debug => "DEBUG",
            ErrorLevel::Warning => "WARNING",
            ErrorLevel::Critical => "CRITICAL",
            ErrorLevel::Fatal => "FATAL",
        };
        f.write_str(name)
    }
}

/// The engine's tagged error type.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("required file '{path}' is not a regular file")]
    NotRegularFile { path: PathBuf },

    #[error("failed to memory-map '{path}'")]
    MapFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to extend '{path}' by one logical block")]
    ExtendFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("table '{name}' is unavailable after a prior failure")]
    TablePoisoned { name: String },

    #[error("table '{table}' has no primary column")]
    MissingPrimaryColumn { table: String },

    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: DataType,
        actual: DataType,
    },

    #[error("duplicate column name '{name}' in schema")]
    DuplicateColumn { name: String },

    #[error("corrupt schema: {reason}")]
    CorruptSchema { reason: String },

    #[error("corrupt string in column '{column}': stored length {length} exceeds the {max}-byte payload area")]
    CorruptText {
        column: String,
        length: u32,
        max: usize,
    },
}

impl StorageError {
    /// The severity of this error.
    pub fn level(&self) -> ErrorLevel {
        match self {
            StorageError::NotRegularFile { .. }
            | StorageError::MapFailed { .. }
            | StorageError::ExtendFailed { .. }
            | StorageError::CorruptSchema { .. }
            | StorageError::CorruptText { .. } => ErrorLevel::Fatal,
            StorageError::TablePoisoned { .. }
            | StorageError::MissingPrimaryColumn { .. }
            | StorageError::DuplicateColumn { .. }
            | StorageError::TypeMismatch { .. } => ErrorLevel::Critical,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered_by_severity() {
        assert!(ErrorLevel::Fatal > ErrorLevel::Critical);
        assert!(ErrorLevel::Critical > ErrorLevel::Warning);
        assert!(ErrorLevel::Normal < ErrorLevel::Info);
    }

    #[test]
    fn io_failures_are_fatal() {
        let err = StorageError::NotRegularFile {
            path: PathBuf::from("/tmp/dir"),
        };
        assert_eq!(err.level(), ErrorLevel::Fatal);
    }

    #[test]
    fn contract_violations_are_critical() {
        let err = StorageError::TypeMismatch {
            expected: DataType::Int,
            actual: DataType::Text,
        };
        assert_eq!(err.level(), ErrorLevel::Critical);
    }

    #[test]
    fn level_survives_eyre_downcast() {
        let report: eyre::Report = StorageError::TablePoisoned {
            name: "users".into(),
        }
        .into();

        let err = report.downcast_ref::<StorageError>().unwrap();
        assert_eq!(err.level(), ErrorLevel::Critical);
    }
}
