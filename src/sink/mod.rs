//! Output table sinks and the append-only writer.
//!
//! A run produces a single output table. [`StreamingWriter`] fixes that table's column schema
//! on the first write and checks every later write against it before handing the columns to
//! an [`OutputSink`]:
//!
//! - [`parquet`]: one Parquet file, one row group per write
//! - [`memory`]: keeps every write in memory

pub mod memory;
pub mod parquet;

use std::collections::HashSet;

use crate::error::{ProcessorError, ProcessorResult};
use crate::types::{Array, Field, Schema};

pub use memory::MemorySink;
pub use self::parquet::ParquetSink;

/// Destination of the output table.
///
/// `create` is called once with the first chunk; `extend` for every later chunk. Columns are
/// always passed in schema order.
pub trait OutputSink {
    fn create(&mut self, table: &str, schema: &Schema, columns: Vec<Array>) -> ProcessorResult<()>;

    fn extend(&mut self, columns: Vec<Array>) -> ProcessorResult<()>;

    fn close(&mut self) -> ProcessorResult<()>;
}

impl<S: OutputSink + ?Sized> OutputSink for &mut S {
    fn create(&mut self, table: &str, schema: &Schema, columns: Vec<Array>) -> ProcessorResult<()> {
        (**self).create(table, schema, columns)
    }

    fn extend(&mut self, columns: Vec<Array>) -> ProcessorResult<()> {
        (**self).extend(columns)
    }

    fn close(&mut self) -> ProcessorResult<()> {
        (**self).close()
    }
}

/// Create-or-extend writer enforcing one column schema across writes.
#[derive(Debug)]
pub struct StreamingWriter<S: OutputSink> {
    sink: S,
    table: String,
    schema: Option<Schema>,
    rows_written: usize,
    writes: usize,
}

impl<S: OutputSink> StreamingWriter<S> {
    pub fn new(sink: S, table: impl Into<String>) -> Self {
        Self {
            sink,
            table: table.into(),
            schema: None,
            rows_written: 0,
            writes: 0,
        }
    }

    /// Schema fixed by the first write, if any.
    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Append named columns to the output table and return the number of rows written.
    ///
    /// The first call creates the table with these columns. Later calls must carry the same
    /// column names with the same types, in any order; anything else is
    /// [`ProcessorError::SchemaMismatchOnExtend`]. Writing no columns is a no-op.
    pub fn write(&mut self, columns: Vec<(String, Array)>) -> ProcessorResult<usize> {
        let Some((_, first)) = columns.first() else {
            return Ok(0);
        };
        let rows = first.len();

        let mut seen = HashSet::with_capacity(columns.len());
        for (name, a) in &columns {
            if !seen.insert(name.as_str()) {
                return Err(ProcessorError::DuplicateColumn { name: name.clone() });
            }
            if a.len() != rows {
                return Err(ProcessorError::RowCountMismatch {
                    collection: name.clone(),
                    expected: rows,
                    found: a.len(),
                });
            }
        }

        match &self.schema {
            None => {
                let schema = Schema::new(
                    columns
                        .iter()
                        .map(|(n, a)| Field::new(n.clone(), a.data_type().clone()))
                        .collect(),
                );
                let arrays = columns.into_iter().map(|(_, a)| a).collect();
                self.sink.create(&self.table, &schema, arrays)?;
                self.schema = Some(schema);
            }
            Some(schema) => {
                let arrays = align(schema, columns)?;
                self.sink.extend(arrays)?;
            }
        }

        self.rows_written += rows;
        self.writes += 1;
        Ok(rows)
    }

    /// Close the output table and hand back the sink.
    pub fn finish(mut self) -> ProcessorResult<S> {
        self.sink.close()?;
        Ok(self.sink)
    }
}

/// Order `columns` like `schema`, or report how they differ.
fn align(schema: &Schema, mut columns: Vec<(String, Array)>) -> ProcessorResult<Vec<Array>> {
    let missing: Vec<String> = schema
        .field_names()
        .filter(|n| !columns.iter().any(|(c, _)| c == n))
        .map(str::to_string)
        .collect();
    let unexpected: Vec<String> = columns
        .iter()
        .filter(|(c, _)| schema.index_of(c).is_none())
        .map(|(c, _)| c.clone())
        .collect();
    let retyped: Vec<String> = columns
        .iter()
        .filter(|(c, a)| schema.field(c).is_some_and(|f| &f.data_type != a.data_type()))
        .map(|(c, _)| c.clone())
        .collect();

    if !missing.is_empty() || !unexpected.is_empty() || !retyped.is_empty() {
        return Err(ProcessorError::SchemaMismatchOnExtend {
            missing,
            unexpected,
            retyped,
        });
    }

    columns.sort_by_key(|(c, _)| schema.index_of(c));
    Ok(columns.into_iter().map(|(_, a)| a).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    fn chunk(run: Vec<i64>, mjj: Vec<f64>) -> Vec<(String, Array)> {
        vec![
            ("run".to_string(), Array::from_i64(run)),
            ("mjj".to_string(), Array::from_f64(mjj)),
        ]
    }

    #[test]
    fn first_write_creates_later_writes_extend() {
        let mut sink = MemorySink::new();
        let mut w = StreamingWriter::new(&mut sink, "Events");
        assert_eq!(w.write(chunk(vec![1, 2], vec![10.0, 20.0])).unwrap(), 2);
        assert_eq!(w.write(chunk(vec![3], vec![30.0])).unwrap(), 1);
        assert_eq!(w.rows_written(), 3);
        assert_eq!(w.writes(), 2);
        w.finish().unwrap();

        assert_eq!(sink.table(), Some("Events"));
        assert_eq!(sink.creates(), 1);
        assert_eq!(sink.extends(), 1);
        assert!(sink.is_closed());
        assert_eq!(sink.column("run").unwrap(), Array::from_i64(vec![1, 2, 3]));
    }

    #[test]
    fn reordered_columns_are_aligned_to_schema() {
        let mut sink = MemorySink::new();
        let mut w = StreamingWriter::new(&mut sink, "Events");
        w.write(chunk(vec![1], vec![10.0])).unwrap();
        let mut reversed = chunk(vec![2], vec![20.0]);
        reversed.reverse();
        w.write(reversed).unwrap();
        w.finish().unwrap();
        assert_eq!(sink.column("mjj").unwrap(), Array::from_f64(vec![10.0, 20.0]));
    }

    #[test]
    fn different_column_set_is_rejected() {
        let mut sink = MemorySink::new();
        let mut w = StreamingWriter::new(&mut sink, "Events");
        w.write(chunk(vec![1], vec![10.0])).unwrap();

        let err = w
            .write(vec![
                ("run".to_string(), Array::from_i64(vec![2])),
                ("ht".to_string(), Array::from_f64(vec![5.0])),
            ])
            .unwrap_err();
        match err {
            ProcessorError::SchemaMismatchOnExtend {
                missing,
                unexpected,
                retyped,
            } => {
                assert_eq!(missing, vec!["mjj"]);
                assert_eq!(unexpected, vec!["ht"]);
                assert!(retyped.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(w.rows_written(), 1);
    }

    #[test]
    fn retyped_column_is_rejected() {
        let mut sink = MemorySink::new();
        let mut w = StreamingWriter::new(&mut sink, "Events");
        w.write(chunk(vec![1], vec![10.0])).unwrap();
        let err = w
            .write(vec![
                ("run".to_string(), Array::from_f64(vec![2.0])),
                ("mjj".to_string(), Array::from_f64(vec![5.0])),
            ])
            .unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::SchemaMismatchOnExtend { ref retyped, .. } if retyped == &vec!["run".to_string()]
        ));
    }

    #[test]
    fn malformed_writes_are_rejected() {
        let mut sink = MemorySink::new();
        let mut w = StreamingWriter::new(&mut sink, "Events");
        assert_eq!(w.write(vec![]).unwrap(), 0);
        assert!(w.schema().is_none());

        let dup = vec![
            ("run".to_string(), Array::from_i64(vec![1])),
            ("run".to_string(), Array::from_i64(vec![1])),
        ];
        assert!(matches!(w.write(dup), Err(ProcessorError::DuplicateColumn { .. })));

        let ragged = vec![
            ("run".to_string(), Array::from_i64(vec![1])),
            ("Jet_pt".to_string(), Array::empty(DataType::list(DataType::Float64))),
        ];
        assert!(matches!(w.write(ragged), Err(ProcessorError::RowCountMismatch { .. })));
    }
}
