//! In-memory source tables.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{ProcessorError, ProcessorResult};
use crate::types::Array;

use super::{EventTable, TableBackend};

/// A table held in memory as named columns.
///
/// Every [`EventTable::read_column`] call is recorded, which lets callers check how much of
/// the table a run actually touched.
#[derive(Debug)]
pub struct MemoryTable {
    columns: Vec<(String, Array)>,
    row_count: usize,
    reads: AtomicUsize,
    ranges: Mutex<Vec<(usize, usize)>>,
}

impl MemoryTable {
    /// Build a table. All columns must have the same length.
    pub fn new(columns: Vec<(String, Array)>) -> ProcessorResult<Self> {
        let row_count = columns.first().map_or(0, |(_, a)| a.len());
        for (name, a) in &columns {
            if a.len() != row_count {
                return Err(ProcessorError::RowCountMismatch {
                    collection: name.clone(),
                    expected: row_count,
                    found: a.len(),
                });
            }
        }
        Ok(Self {
            columns,
            row_count,
            reads: AtomicUsize::new(0),
            ranges: Mutex::new(Vec::new()),
        })
    }

    /// Number of column reads served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Distinct `[start, stop)` ranges requested so far, in request order.
    pub fn ranges(&self) -> Vec<(usize, usize)> {
        self.ranges
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl EventTable for MemoryTable {
    fn row_count(&self) -> usize {
        self.row_count
    }

    fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|(n, _)| n.clone()).collect()
    }

    fn read_column(&self, name: &str, start: usize, stop: usize) -> ProcessorResult<Array> {
        let (_, a) = self
            .columns
            .iter()
            .find(|(n, _)| n == name)
            .ok_or_else(|| ProcessorError::UnknownColumn {
                name: name.to_string(),
            })?;

        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut ranges) = self.ranges.lock() {
            if ranges.last() != Some(&(start, stop)) {
                ranges.push((start, stop));
            }
        }
        Ok(a.slice(start, stop))
    }
}

/// Path → [`MemoryTable`] backend.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    tables: BTreeMap<PathBuf, Arc<MemoryTable>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table under `path` and return a handle to it.
    pub fn insert(&mut self, path: impl Into<PathBuf>, table: MemoryTable) -> Arc<MemoryTable> {
        let table = Arc::new(table);
        self.tables.insert(path.into(), Arc::clone(&table));
        table
    }

    pub fn table(&self, path: impl AsRef<Path>) -> Option<&Arc<MemoryTable>> {
        self.tables.get(path.as_ref())
    }
}

impl TableBackend for MemoryBackend {
    type Table = Arc<MemoryTable>;

    fn open(&self, path: &Path) -> ProcessorResult<Arc<MemoryTable>> {
        self.tables.get(path).cloned().ok_or_else(|| {
            ProcessorError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no table registered at {}", path.display()),
            ))
        })
    }
}
