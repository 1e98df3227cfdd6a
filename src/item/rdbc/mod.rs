use std::str::FromStr;

use crate::error::ExportError;

#[cfg(not(any(
    feature = "rdbc-postgres",
    feature = "rdbc-mysql",
    feature = "rdbc-sqlite"
)))]
compile_error!("the rdbc feature needs at least one of rdbc-postgres, rdbc-mysql or rdbc-sqlite");

/// This module contains the SQLx backed row source.
pub mod rdbc_source;

#[cfg(feature = "rdbc-mysql")]
mod mysql_row;
#[cfg(feature = "rdbc-postgres")]
mod postgres_row;
#[cfg(feature = "rdbc-sqlite")]
mod sqlite_row;

pub use rdbc_source::RdbcRowSource;

/// Database engines a row source can connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Postgres,
    MySql,
    Sqlite,
}

impl Driver {
    /// Infers the engine from a connection URL scheme.
    pub fn from_url(url: &str) -> Result<Driver, ExportError> {
        let scheme = url.split(':').next().unwrap_or_default();
        scheme.parse()
    }

    /// Default TCP port of the engine, if it has one.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Driver::Postgres => Some(5432),
            Driver::MySql => Some(3306),
            Driver::Sqlite => None,
        }
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            Driver::Postgres => "postgres",
            Driver::MySql => "mysql",
            Driver::Sqlite => "sqlite",
        }
    }

    /// Quotes an identifier, doubling any embedded quote character.
    pub fn quote_identifier(&self, identifier: &str) -> String {
        match self {
            Driver::MySql => format!("`{}`", identifier.replace('`', "``")),
            Driver::Postgres | Driver::Sqlite => {
                format!("\"{}\"", identifier.replace('"', "\"\""))
            }
        }
    }

    /// Positional placeholder for the `index`-th parameter, starting at 1.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Driver::Postgres => format!("${}", index),
            Driver::MySql | Driver::Sqlite => "?".to_string(),
        }
    }

    fn qualified_name(&self, schema: Option<&str>, name: &str) -> String {
        match schema.filter(|schema| !schema.is_empty()) {
            Some(schema) => format!(
                "{}.{}",
                self.quote_identifier(schema),
                self.quote_identifier(name)
            ),
            None => self.quote_identifier(name),
        }
    }
}

impl FromStr for Driver {
    type Err = ExportError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Driver::Postgres),
            "mysql" | "mariadb" => Ok(Driver::MySql),
            "sqlite" => Ok(Driver::Sqlite),
            other => Err(ExportError::Configuration(format!(
                "Unsupported database driver: {}",
                other
            ))),
        }
    }
}

/// A value bound to a stored procedure call.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Integer(i64),
    Text(String),
}

impl QueryParam {
    /// The integer as a 32 bit value when it fits.
    ///
    /// Integer parameters are bound as `INT` so they match procedures declared
    /// with `integer` arguments; only values out of that range go as `BIGINT`.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            QueryParam::Integer(value) => i32::try_from(*value).ok(),
            QueryParam::Text(_) => None,
        }
    }
}

/// The statement a row source runs.
#[derive(Debug, Clone, PartialEq)]
pub struct RdbcQuery {
    sql: String,
    params: Vec<QueryParam>,
    pageable: bool,
}

impl RdbcQuery {
    /// `SELECT *` over a table or view, sorted on `order_by` when given.
    ///
    /// Only a sorted query is pageable: without a total order, `LIMIT` and
    /// `OFFSET` may skip or repeat rows between pages.
    pub fn table(
        driver: Driver,
        schema: Option<&str>,
        table: &str,
        order_by: &[&str],
    ) -> RdbcQuery {
        let mut sql = format!("SELECT * FROM {}", driver.qualified_name(schema, table));
        if !order_by.is_empty() {
            let columns: Vec<String> = order_by
                .iter()
                .map(|column| driver.quote_identifier(column))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&columns.join(", "));
        }

        RdbcQuery {
            sql,
            params: Vec::new(),
            pageable: !order_by.is_empty(),
        }
    }

    /// A call to a stored procedure (MySQL) or set returning function
    /// (PostgreSQL) with positional parameters.
    pub fn procedure(
        driver: Driver,
        schema: Option<&str>,
        name: &str,
        params: Vec<QueryParam>,
    ) -> Result<RdbcQuery, ExportError> {
        let placeholders = (1..=params.len())
            .map(|index| driver.placeholder(index))
            .collect::<Vec<_>>()
            .join(", ");
        let name = driver.qualified_name(schema, name);

        let sql = match driver {
            Driver::Postgres => format!("SELECT * FROM {}({})", name, placeholders),
            Driver::MySql => format!("CALL {}({})", name, placeholders),
            Driver::Sqlite => {
                return Err(ExportError::Configuration(
                    "SQLite does not support stored procedures".to_string(),
                ));
            }
        };

        Ok(RdbcQuery {
            sql,
            params,
            pageable: false,
        })
    }

    /// A caller supplied statement, run as is and never paged.
    pub fn raw<S: Into<String>>(sql: S) -> RdbcQuery {
        RdbcQuery {
            sql: sql.into(),
            params: Vec::new(),
            pageable: false,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[QueryParam] {
        &self.params
    }

    pub fn is_pageable(&self) -> bool {
        self.pageable
    }

    /// The statement restricted to one page, when paging applies.
    pub fn page_sql(&self, page_size: Option<usize>, offset: usize) -> String {
        match page_size.filter(|_| self.pageable) {
            Some(page_size) => format!("{} LIMIT {} OFFSET {}", self.sql, page_size, offset),
            None => self.sql.clone(),
        }
    }
}
