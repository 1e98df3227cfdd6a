use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::{
    Row as _, TypeInfo, ValueRef,
    postgres::PgRow,
    types::{BigDecimal, JsonValue, Uuid},
};

use crate::core::item::{CellValue, Row};

/// Decodes every cell of a PostgreSQL row.
pub(super) fn map_row(row: &PgRow) -> Result<Row, sqlx::Error> {
    (0..row.len()).map(|index| map_cell(row, index)).collect()
}

/// `TIMESTAMPTZ` values are rendered in UTC. Types without a dedicated arm,
/// such as enums and domains over text, are read as text.
fn map_cell(row: &PgRow, index: usize) -> Result<CellValue, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(CellValue::Null);
    }
    let kind = raw.type_info().name().to_string();

    let cell = match kind.as_str() {
        "BOOL" => CellValue::Boolean(row.try_get(index)?),
        "INT2" => CellValue::Integer(row.try_get::<i16, _>(index)?.into()),
        "INT4" => CellValue::Integer(row.try_get::<i32, _>(index)?.into()),
        "INT8" => CellValue::Integer(row.try_get(index)?),
        "FLOAT4" => CellValue::Float(row.try_get::<f32, _>(index)?.into()),
        "FLOAT8" => CellValue::Float(row.try_get(index)?),
        "NUMERIC" => CellValue::Decimal(row.try_get::<BigDecimal, _>(index)?),
        "DATE" => CellValue::Date(row.try_get::<NaiveDate, _>(index)?),
        "TIMESTAMP" => CellValue::DateTime(row.try_get::<NaiveDateTime, _>(index)?),
        "TIMESTAMPTZ" => {
            CellValue::DateTime(row.try_get::<DateTime<Utc>, _>(index)?.naive_utc())
        }
        "TIME" => CellValue::Text(row.try_get::<NaiveTime, _>(index)?.to_string()),
        "UUID" => CellValue::Text(row.try_get::<Uuid, _>(index)?.to_string()),
        "JSON" | "JSONB" => CellValue::Text(row.try_get::<JsonValue, _>(index)?.to_string()),
        "BYTEA" => {
            let bytes: Vec<u8> = row.try_get(index)?;
            CellValue::Text(String::from_utf8_lossy(&bytes).into_owned())
        }
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" | "CITEXT" => {
            CellValue::Text(row.try_get(index)?)
        }
        _ => CellValue::Text(row.try_get_unchecked(index)?),
    };

    Ok(cell)
}
