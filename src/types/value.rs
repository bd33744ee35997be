//! # Runtime Value Representation
//!
//! `Value` is the owned runtime form of a column value. Reads from a slot
//! materialize a fresh `Value`; mutating it never touches storage. Writes
//! encode a `Value` into the slot's fixed-width region.
//!
//! ## Comparison Semantics
//!
//! Values of the same type order natively (ints numerically, text bytewise).
//! Comparing values of different types is a contract violation and fails
//! with a CRITICAL `TypeMismatch` error rather than producing an in-band
//! sentinel.

use std::cmp::Ordering;

use eyre::Result;

use super::DataType;
use crate::error::StorageError;

/// Owned runtime value for the two storable column types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Int(i32),
    Text(String),
}

impl Value {
    /// The storage type this value encodes as.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Int(_) => DataType::Int,
            Value::Text(_) => DataType::Text,
        }
    }

    /// Whether this value matches the given column type.
    pub fn is_type(&self, data_type: DataType) -> bool {
        self.data_type() == data_type
    }

    /// Total-order comparison between same-typed values.
    ///
    /// Cross-type comparison returns a `TypeMismatch` error.
    pub fn compare(&self, other: &Value) -> Result<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Ok(a.as_bytes().cmp(b.as_bytes())),
            _ => Err(StorageError::TypeMismatch {
                expected: self.data_type(),
                actual: other.data_type(),
            }
            .into()),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ints_compare_numerically() {
        let a = Value::Int(-3);
        let b = Value::Int(7);

        assert_eq!(a.compare(&b).unwrap(), Ordering::Less);
        assert_eq!(b.compare(&a).unwrap(), Ordering::Greater);
        assert_eq!(a.compare(&a.clone()).unwrap(), Ordering::Equal);
    }

    #[test]
    fn text_compares_bytewise() {
        let a = Value::from("alice");
        let b = Value::from("bob");

        assert_eq!(a.compare(&b).unwrap(), Ordering::Less);
    }

    #[test]
    fn cross_type_comparison_is_an_error() {
        let a = Value::Int(1);
        let b = Value::from("1");

        let report = a.compare(&b).unwrap_err();
        let err = report.downcast_ref::<StorageError>().unwrap();
        assert!(matches!(err, StorageError::TypeMismatch { .. }));
    }

    #[test]
    fn data_type_follows_variant() {
        assert_eq!(Value::Int(0).data_type(), DataType::Int);
        assert_eq!(Value::from("x").data_type(), DataType::Text);
        assert!(Value::Int(0).is_type(DataType::Int));
        assert!(!Value::Int(0).is_type(DataType::Text));
    }
}
