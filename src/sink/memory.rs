//! In-memory output sink.

use crate::error::{ProcessorError, ProcessorResult};
use crate::types::{Array, Schema};

use super::OutputSink;

/// Keeps every write in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    table: Option<String>,
    schema: Option<Schema>,
    writes: Vec<Vec<Array>>,
    creates: usize,
    closed: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    /// Column arrays of every write, in write order.
    pub fn writes(&self) -> &[Vec<Array>] {
        &self.writes
    }

    pub fn creates(&self) -> usize {
        self.creates
    }

    pub fn extends(&self) -> usize {
        self.writes.len().saturating_sub(self.creates)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Total rows across all writes.
    pub fn row_count(&self) -> usize {
        self.writes
            .iter()
            .map(|w| w.first().map_or(0, Array::len))
            .sum()
    }

    /// One output column with all writes concatenated.
    ///
    /// `None` if the column is unknown or a write carried it with another type.
    pub fn column(&self, name: &str) -> Option<Array> {
        let schema = self.schema.as_ref()?;
        let idx = schema.index_of(name)?;
        let mut out = Array::empty(schema.fields[idx].data_type.clone());
        for w in &self.writes {
            if !out.append(w.get(idx)?.clone()) {
                return None;
            }
        }
        Some(out)
    }
}

impl OutputSink for MemorySink {
    fn create(&mut self, table: &str, schema: &Schema, columns: Vec<Array>) -> ProcessorResult<()> {
        if self.creates > 0 {
            return Err(ProcessorError::InvalidOptions {
                message: format!("output table {table} already created"),
            });
        }
        self.table = Some(table.to_string());
        self.schema = Some(schema.clone());
        self.creates += 1;
        self.writes.push(columns);
        Ok(())
    }

    fn extend(&mut self, columns: Vec<Array>) -> ProcessorResult<()> {
        if self.schema.is_none() {
            return Err(ProcessorError::InvalidOptions {
                message: "output table extended before it was created".to_string(),
            });
        }
        self.writes.push(columns);
        Ok(())
    }

    fn close(&mut self) -> ProcessorResult<()> {
        self.closed = true;
        Ok(())
    }
}
