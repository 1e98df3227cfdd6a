use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::{Row as _, TypeInfo, ValueRef, mysql::MySqlRow, types::BigDecimal};

use crate::core::item::{CellValue, Row};

/// Decodes every cell of a MySQL or MariaDB row.
pub(super) fn map_row(row: &MySqlRow) -> Result<Row, sqlx::Error> {
    (0..row.len()).map(|index| map_cell(row, index)).collect()
}

fn map_cell(row: &MySqlRow, index: usize) -> Result<CellValue, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(CellValue::Null);
    }
    let kind = raw.type_info().name().to_string();

    let cell = match kind.as_str() {
        "BOOLEAN" => CellValue::Boolean(row.try_get(index)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            CellValue::Integer(row.try_get(index)?)
        }
        unsigned if unsigned.ends_with(" UNSIGNED") => {
            let value: u64 = row.try_get_unchecked(index)?;
            i64::try_from(value)
                .map(CellValue::Integer)
                .unwrap_or_else(|_| CellValue::Text(value.to_string()))
        }
        "YEAR" => CellValue::Integer(row.try_get_unchecked::<u16, _>(index)?.into()),
        "FLOAT" => CellValue::Float(row.try_get::<f32, _>(index)?.into()),
        "DOUBLE" => CellValue::Float(row.try_get(index)?),
        "DECIMAL" => CellValue::Decimal(row.try_get::<BigDecimal, _>(index)?),
        "DATE" => CellValue::Date(row.try_get::<NaiveDate, _>(index)?),
        "DATETIME" | "TIMESTAMP" => {
            CellValue::DateTime(row.try_get::<NaiveDateTime, _>(index)?)
        }
        "TIME" => CellValue::Text(row.try_get::<NaiveTime, _>(index)?.to_string()),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            let bytes: Vec<u8> = row.try_get_unchecked(index)?;
            CellValue::Text(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => CellValue::Text(row.try_get_unchecked(index)?),
    };

    Ok(cell)
}
