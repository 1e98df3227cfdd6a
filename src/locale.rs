//! Culture-specific rendering of cell values.
//!
//! A [`Locale`] is carried explicitly by the encoding configuration and is
//! consulted each time a cell value is turned into text. Nothing here touches
//! process-wide state, so two exports with different locales can coexist.

use std::{fmt, str::FromStr};

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};

use crate::{core::item::CellValue, error::ExportError};

/// Formatting culture used to render numbers and dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    EnGb,
    EnUs,
    DeDe,
    FrFr,
    Invariant,
}

impl Locale {
    /// Returns the BCP 47 style tag of the locale.
    pub fn tag(&self) -> &'static str {
        match self {
            Locale::EnGb => "en-GB",
            Locale::EnUs => "en-US",
            Locale::DeDe => "de-DE",
            Locale::FrFr => "fr-FR",
            Locale::Invariant => "invariant",
        }
    }

    /// Character separating the integral and fractional parts of a number.
    pub fn decimal_separator(&self) -> char {
        match self {
            Locale::DeDe | Locale::FrFr => ',',
            Locale::EnGb | Locale::EnUs | Locale::Invariant => '.',
        }
    }

    fn date_pattern(&self) -> &'static str {
        match self {
            Locale::EnGb | Locale::FrFr => "%d/%m/%Y",
            Locale::EnUs => "%-m/%-d/%Y",
            Locale::DeDe => "%d.%m.%Y",
            Locale::Invariant => "%m/%d/%Y",
        }
    }

    fn time_pattern(&self) -> &'static str {
        match self {
            Locale::EnUs => "%-I:%M:%S %p",
            _ => "%H:%M:%S",
        }
    }

    /// Renders a date using the short date pattern of the locale.
    pub fn format_date(&self, date: &NaiveDate) -> String {
        date.format(self.date_pattern()).to_string()
    }

    /// Renders a timestamp as short date followed by long time.
    pub fn format_datetime(&self, datetime: &NaiveDateTime) -> String {
        format!(
            "{} {}",
            datetime.format(self.date_pattern()),
            datetime.format(self.time_pattern())
        )
    }

    /// Renders a floating point number with the locale's decimal separator.
    pub fn format_float(&self, value: f64) -> String {
        self.localize_number(value.to_string())
    }

    /// Renders an exact decimal, keeping its scale.
    pub fn format_decimal(&self, value: &BigDecimal) -> String {
        self.localize_number(value.to_string())
    }

    fn localize_number(&self, text: String) -> String {
        match self.decimal_separator() {
            '.' => text,
            separator => text.replace('.', &separator.to_string()),
        }
    }

    /// Textual projection of a cell, `None` for a database NULL.
    pub fn format(&self, value: &CellValue) -> Option<String> {
        match value {
            CellValue::Null => None,
            CellValue::Text(text) => Some(text.clone()),
            CellValue::Integer(number) => Some(number.to_string()),
            CellValue::Float(number) => Some(self.format_float(*number)),
            CellValue::Decimal(number) => Some(self.format_decimal(number)),
            CellValue::Boolean(true) => Some("True".to_string()),
            CellValue::Boolean(false) => Some("False".to_string()),
            CellValue::Date(date) => Some(self.format_date(date)),
            CellValue::DateTime(datetime) => Some(self.format_datetime(datetime)),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Locale {
    type Err = ExportError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "en-gb" => Ok(Locale::EnGb),
            "en-us" => Ok(Locale::EnUs),
            "de-de" => Ok(Locale::DeDe),
            "fr-fr" => Ok(Locale::FrFr),
            "" | "invariant" => Ok(Locale::Invariant),
            other => Err(ExportError::Configuration(format!(
                "Unsupported locale: {}",
                other
            ))),
        }
    }
}

/// A missing or `null` tag falls back to the default locale.
impl<'de> Deserialize<'de> for Locale {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(tag) => tag.parse().map_err(serde::de::Error::custom),
            None => Ok(Locale::default()),
        }
    }
}
