use std::collections::VecDeque;

use crate::{
    core::item::{Column, Row, RowSource, RowSourceResult},
    error::ExportError,
};

/// A row source over rows already held in memory.
///
/// Useful to export data produced by the application itself, and to exercise
/// the encoder without a database. A failure can be scheduled at a given row
/// index to reproduce a result set that breaks mid-stream.
pub struct MemoryRowSource {
    columns: Vec<Column>,
    rows: VecDeque<Row>,
    position: usize,
    fail_at: Option<usize>,
}

impl MemoryRowSource {
    pub fn new(columns: Vec<Column>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows: rows.into(),
            position: 0,
            fail_at: None,
        }
    }

    /// Makes the read of row `index` fail instead of returning it.
    pub fn fail_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }
}

impl RowSource for MemoryRowSource {
    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn read(&mut self) -> RowSourceResult {
        if self.fail_at == Some(self.position) {
            return Err(ExportError::RowSource(format!(
                "failed to read row {}",
                self.position
            )));
        }

        let row = self.rows.pop_front();
        if row.is_some() {
            self.position += 1;
        }
        Ok(row)
    }
}
