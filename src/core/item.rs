use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};

use crate::error::ExportError;

/// Represents the result of reading a row from a source.
///
/// `Ok(Some(row))` carries the next row, `Ok(None)` signals the end of the
/// result set and `Err` aborts the export.
pub type RowSourceResult = Result<Option<Row>, ExportError>;

/// A named column at a fixed ordinal position of the result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub ordinal: usize,
}

impl Column {
    pub fn new<S: Into<String>>(name: S, ordinal: usize) -> Self {
        Self {
            name: name.into(),
            ordinal,
        }
    }

    /// Builds an ordered column list from names, numbering them from zero.
    pub fn from_names<I, S>(names: I) -> Vec<Column>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names
            .into_iter()
            .enumerate()
            .map(|(ordinal, name)| Column::new(name, ordinal))
            .collect()
    }
}

/// A single cell as produced by a row source.
///
/// `Null` is a database NULL and is never the same thing as an empty string.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    /// Exact numeric as read from `NUMERIC` and `DECIMAL` columns.
    Decimal(BigDecimal),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Integer(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(CellValue::Null, Into::into)
    }
}

/// An ordered sequence of cells aligned with the column list.
pub type Row = Vec<CellValue>;

/// A producer of tabular data, read one row at a time.
///
/// The column list is fixed for the whole export. Implementations may only
/// know it once the first row has been fetched, so callers query it after
/// the source has been opened.
pub trait RowSource {
    /// Ordered columns of the result set.
    fn columns(&self) -> &[Column];

    /// Reads the next row.
    fn read(&mut self) -> RowSourceResult;
}
