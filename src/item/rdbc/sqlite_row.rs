use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{Column as _, Row as _, TypeInfo, ValueRef, sqlite::SqliteRow};

use crate::core::item::{CellValue, Row};

/// Decodes every cell of a SQLite row.
pub(super) fn map_row(row: &SqliteRow) -> Result<Row, sqlx::Error> {
    (0..row.len()).map(|index| map_cell(row, index)).collect()
}

/// SQLite stores dates as text or numbers, so the declared column type picks
/// the date and boolean decodings. A value that does not decode that way is
/// read by its storage class instead.
fn map_cell(row: &SqliteRow, index: usize) -> Result<CellValue, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(CellValue::Null);
    }

    let declared = row.column(index).type_info().name();
    let typed = match declared {
        "DATE" => row.try_get::<NaiveDate, _>(index).ok().map(CellValue::Date),
        "DATETIME" => row
            .try_get::<NaiveDateTime, _>(index)
            .ok()
            .map(CellValue::DateTime),
        "BOOLEAN" => row.try_get::<bool, _>(index).ok().map(CellValue::Boolean),
        _ => None,
    };
    if let Some(cell) = typed {
        return Ok(cell);
    }

    let storage = raw.type_info().name().to_string();
    let cell = match storage.as_str() {
        "INTEGER" => CellValue::Integer(row.try_get_unchecked(index)?),
        "REAL" => CellValue::Float(row.try_get_unchecked(index)?),
        "BLOB" => {
            let bytes: Vec<u8> = row.try_get_unchecked(index)?;
            CellValue::Text(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => CellValue::Text(row.try_get_unchecked(index)?),
    };

    Ok(cell)
}
