//! Explicit mapping between caller-defined structs and [`Row`]s.

use crate::error::{Result, RowkitError};
use crate::value::{Row, Value};
use chrono::{DateTime, NaiveDate, Utc};

/// A per-table record type with a two-way mapping to adapter rows.
pub trait Record: Sized {
    fn to_row(&self) -> Row;
    fn from_row(row: &Row) -> Result<Self>;
}

/// Typed column accessors used by `Record::from_row` implementations.
/// A missing or NULL column reads as `None`; a value of the wrong kind is an error.
pub trait RowExt {
    fn opt<T>(&self, column: &str, expected: &'static str, f: fn(&Value) -> Option<T>)
        -> Result<Option<T>>;

    fn i64(&self, column: &str) -> Result<Option<i64>> {
        self.opt(column, "integer", Value::as_i64)
    }

    fn f64(&self, column: &str) -> Result<Option<f64>> {
        self.opt(column, "float", Value::as_f64)
    }

    fn bool(&self, column: &str) -> Result<Option<bool>> {
        self.opt(column, "boolean", Value::as_bool)
    }

    fn string(&self, column: &str) -> Result<Option<String>> {
        self.opt(column, "string", |v| v.as_str().map(String::from))
    }

    fn timestamp(&self, column: &str) -> Result<Option<DateTime<Utc>>> {
        self.opt(column, "timestamp", Value::as_timestamp)
    }

    fn date(&self, column: &str) -> Result<Option<NaiveDate>> {
        self.opt(column, "date", Value::as_date)
    }

    /// Like the typed accessors but a missing value is an error.
    fn required<T>(&self, column: &str, value: Option<T>) -> Result<T> {
        value.ok_or_else(|| RowkitError::Decode {
            column: column.to_string(),
            expected: "non-null value",
        })
    }
}

impl RowExt for Row {
    fn opt<T>(
        &self,
        column: &str,
        expected: &'static str,
        f: fn(&Value) -> Option<T>,
    ) -> Result<Option<T>> {
        match self.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => f(v).map(Some).ok_or_else(|| RowkitError::Decode {
                column: column.to_string(),
                expected,
            }),
        }
    }
}
