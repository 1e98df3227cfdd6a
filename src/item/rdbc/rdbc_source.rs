use std::collections::VecDeque;

use log::{debug, info, warn};
use sqlx::{Column as _, pool::PoolOptions};
use tokio::runtime::{Builder, Runtime};

#[cfg(feature = "rdbc-mysql")]
use sqlx::{MySql, MySqlPool};
#[cfg(feature = "rdbc-postgres")]
use sqlx::{PgPool, Postgres};
#[cfg(feature = "rdbc-sqlite")]
use sqlx::{Sqlite, SqlitePool};

use crate::{
    core::item::{Column, Row, RowSource, RowSourceResult},
    error::ExportError,
};

use super::{Driver, QueryParam, RdbcQuery};

/// Binds the procedure parameters in order, integers as `INT` when they fit.
macro_rules! bind_params {
    ($query:expr, $params:expr) => {{
        let mut query = $query;
        for param in $params {
            query = match (param, param.as_i32()) {
                (_, Some(value)) => query.bind(value),
                (QueryParam::Integer(value), None) => query.bind(*value),
                (QueryParam::Text(value), None) => query.bind(value.clone()),
            };
        }
        query
    }};
}

/// A connection pool typed on the engine, so that rows decode with the
/// engine's own types (dates, timestamps, decimals, fixed width text).
enum DriverPool {
    #[cfg(feature = "rdbc-postgres")]
    Postgres(PgPool),
    #[cfg(feature = "rdbc-mysql")]
    MySql(MySqlPool),
    #[cfg(feature = "rdbc-sqlite")]
    Sqlite(SqlitePool),
}

/// One fetched page: the column list (empty when no row came back) and the
/// decoded rows.
struct Page {
    columns: Vec<Column>,
    rows: Vec<Row>,
}

impl Page {
    fn decode<R: sqlx::Row>(
        rows: &[R],
        map_row: fn(&R) -> Result<Row, sqlx::Error>,
    ) -> Result<Page, sqlx::Error> {
        let columns = rows
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|column| Column::new(column.name(), column.ordinal()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Page {
            columns,
            rows: rows.iter().map(map_row).collect::<Result<_, _>>()?,
        })
    }
}

impl DriverPool {
    async fn connect(driver: Driver, url: &str) -> Result<DriverPool, ExportError> {
        let pool = match driver {
            #[cfg(feature = "rdbc-postgres")]
            Driver::Postgres => PoolOptions::<Postgres>::new()
                .max_connections(1)
                .connect(url)
                .await
                .map(DriverPool::Postgres),
            #[cfg(feature = "rdbc-mysql")]
            Driver::MySql => PoolOptions::<MySql>::new()
                .max_connections(1)
                .connect(url)
                .await
                .map(DriverPool::MySql),
            #[cfg(feature = "rdbc-sqlite")]
            Driver::Sqlite => PoolOptions::<Sqlite>::new()
                .max_connections(1)
                .connect(url)
                .await
                .map(DriverPool::Sqlite),
            #[allow(unreachable_patterns)]
            other => {
                return Err(ExportError::Configuration(format!(
                    "Support for {} was not compiled in",
                    other.scheme()
                )));
            }
        };

        pool.map_err(|error| ExportError::RowSource(error.to_string()))
    }

    async fn fetch(&self, sql: &str, params: &[QueryParam]) -> Result<Page, sqlx::Error> {
        match self {
            #[cfg(feature = "rdbc-postgres")]
            DriverPool::Postgres(pool) => {
                let rows = bind_params!(sqlx::query::<Postgres>(sql), params)
                    .fetch_all(pool)
                    .await?;
                Page::decode(&rows, super::postgres_row::map_row)
            }
            #[cfg(feature = "rdbc-mysql")]
            DriverPool::MySql(pool) => {
                let rows = bind_params!(sqlx::query::<MySql>(sql), params)
                    .fetch_all(pool)
                    .await?;
                Page::decode(&rows, super::mysql_row::map_row)
            }
            #[cfg(feature = "rdbc-sqlite")]
            DriverPool::Sqlite(pool) => {
                let rows = bind_params!(sqlx::query::<Sqlite>(sql), params)
                    .fetch_all(pool)
                    .await?;
                Page::decode(&rows, super::sqlite_row::map_row)
            }
        }
    }

    fn is_closed(&self) -> bool {
        match self {
            #[cfg(feature = "rdbc-postgres")]
            DriverPool::Postgres(pool) => pool.is_closed(),
            #[cfg(feature = "rdbc-mysql")]
            DriverPool::MySql(pool) => pool.is_closed(),
            #[cfg(feature = "rdbc-sqlite")]
            DriverPool::Sqlite(pool) => pool.is_closed(),
        }
    }

    async fn close(&self) {
        match self {
            #[cfg(feature = "rdbc-postgres")]
            DriverPool::Postgres(pool) => pool.close().await,
            #[cfg(feature = "rdbc-mysql")]
            DriverPool::MySql(pool) => pool.close().await,
            #[cfg(feature = "rdbc-sqlite")]
            DriverPool::Sqlite(pool) => pool.close().await,
        }
    }
}

/// Reads the rows of a query through SQLx.
///
/// The source owns a current-thread Tokio runtime and drives every database
/// call with `block_on`, so it exposes a plain synchronous [`RowSource`].
/// The engine is taken from the URL scheme and rows are decoded with that
/// engine's own types.
///
/// When a page size is given and the query is sorted, rows are fetched with
/// `LIMIT`/`OFFSET` one page at a time; otherwise the whole result set is
/// fetched at once. The first page is fetched when the source is opened, which
/// is what makes the column list available before the first `read`.
///
/// An empty result set has no columns.
///
/// The source must not be opened or dropped from within an async context.
pub struct RdbcRowSource {
    runtime: Runtime,
    pool: DriverPool,
    query: RdbcQuery,
    page_size: Option<usize>,
    offset: usize,
    columns: Vec<Column>,
    buffer: VecDeque<Row>,
    exhausted: bool,
}

impl RdbcRowSource {
    /// Connects to `url` and fetches the first page of `query`.
    pub fn open(
        url: &str,
        query: RdbcQuery,
        page_size: Option<usize>,
    ) -> Result<RdbcRowSource, ExportError> {
        let driver = Driver::from_url(url)?;
        let page_size = page_size.filter(|size| *size > 0);
        if page_size.is_some() && !query.is_pageable() {
            warn!("Page size ignored: paging needs a sorted table query");
        }

        let runtime = Builder::new_current_thread().enable_all().build()?;
        let pool = runtime.block_on(DriverPool::connect(driver, url))?;
        info!("Connected to {} database", driver.scheme());

        let mut source = RdbcRowSource {
            runtime,
            pool,
            query,
            page_size,
            offset: 0,
            columns: Vec::new(),
            buffer: VecDeque::new(),
            exhausted: false,
        };
        source.fetch_page()?;

        Ok(source)
    }

    fn fetch_page(&mut self) -> Result<(), ExportError> {
        let sql = self.query.page_sql(self.page_size, self.offset);
        debug!("Fetching rows: {}", sql);

        let page = self
            .runtime
            .block_on(self.pool.fetch(&sql, self.query.params()))
            .map_err(|error| ExportError::RowSource(error.to_string()))?;

        if self.columns.is_empty() && !page.columns.is_empty() {
            self.columns = page.columns;
            debug!(
                "Columns: {}",
                self.columns
                    .iter()
                    .map(|column| column.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        let fetched = page.rows.len();
        self.buffer.extend(page.rows);
        self.offset += fetched;
        self.exhausted = match self.page_size.filter(|_| self.query.is_pageable()) {
            Some(page_size) => fetched < page_size,
            None => true,
        };

        Ok(())
    }

    fn close(&self) {
        if !self.pool.is_closed() {
            self.runtime.block_on(self.pool.close());
            info!("Database connection closed");
        }
    }
}

impl RowSource for RdbcRowSource {
    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn read(&mut self) -> RowSourceResult {
        if self.buffer.is_empty() && !self.exhausted {
            self.fetch_page()?;
        }

        let row = self.buffer.pop_front();
        if row.is_none() {
            self.close();
        }

        Ok(row)
    }
}

impl Drop for RdbcRowSource {
    fn drop(&mut self) {
        self.close();
    }
}
