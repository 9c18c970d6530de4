//! Storage backends for source tables.
//!
//! The processor only needs four things from storage: open a table, count its rows, list its
//! columns, and read one column over a row range. [`TableBackend`] and [`EventTable`] capture
//! exactly that. Two backends ship with the crate:
//!
//! - [`parquet`]: Parquet files, read synchronously on the calling thread
//! - [`memory`]: in-memory tables, used by tests and for embedding

pub mod memory;
pub mod parquet;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use glob::glob;

use crate::error::{ProcessorError, ProcessorResult};
use crate::types::Array;

pub use memory::{MemoryBackend, MemoryTable};
pub use self::parquet::{ParquetBackend, ParquetTable};

/// A readable columnar table.
pub trait EventTable {
    /// Number of rows.
    fn row_count(&self) -> usize;

    /// Column names in storage order.
    fn column_names(&self) -> Vec<String>;

    /// Read rows `[start, stop)` of one column. `stop` is clipped to the row count.
    fn read_column(&self, name: &str, start: usize, stop: usize) -> ProcessorResult<Array>;
}

impl<T: EventTable + ?Sized> EventTable for Arc<T> {
    fn row_count(&self) -> usize {
        (**self).row_count()
    }

    fn column_names(&self) -> Vec<String> {
        (**self).column_names()
    }

    fn read_column(&self, name: &str, start: usize, stop: usize) -> ProcessorResult<Array> {
        (**self).read_column(name, start, stop)
    }
}

/// Opens source tables by path.
pub trait TableBackend {
    type Table: EventTable;

    fn open(&self, path: &Path) -> ProcessorResult<Self::Table>;
}

/// Expand a glob pattern into a sorted list of files.
///
/// A pattern without matches yields an empty list.
pub fn expand_paths(pattern: &str) -> ProcessorResult<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in glob(pattern)? {
        let path = entry.map_err(|e| ProcessorError::Io(e.into()))?;
        if path.is_file() {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}
