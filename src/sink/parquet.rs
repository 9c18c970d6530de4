//! Parquet output sink.
//!
//! The output file is created (and truncated) when the sink is constructed; the Parquet
//! schema is fixed by the first write. Every write becomes one row group. A sink closed
//! without any write leaves a valid Parquet file with no columns and no rows.
//!
//! Scalar columns are written as `OPTIONAL` primitives. Jagged columns use the standard
//! three-level list layout:
//!
//! ```text
//! REQUIRED group Jet_pt (LIST) {
//!   REPEATED group list {
//!     OPTIONAL DOUBLE element;
//!   }
//! }
//! ```
//!
//! which reads back through [`crate::source::ParquetBackend`] as the same column type.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parquet::column::writer::ColumnWriter;
use parquet::data_type::ByteArray;
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::parser::parse_message_type;
use parquet::schema::types::Type as SchemaType;

use crate::error::{ProcessorError, ProcessorResult};
use crate::types::{Array, DataType, Schema, Value};

use super::OutputSink;

/// Writes the output table to a single Parquet file.
pub struct ParquetSink {
    path: PathBuf,
    file: Option<File>,
    writer: Option<SerializedFileWriter<File>>,
    schema: Option<Schema>,
    row_groups: usize,
}

impl ParquetSink {
    /// Create (or truncate) the output file.
    pub fn new(path: impl AsRef<Path>) -> ProcessorResult<Self> {
        let path = path.as_ref();
        let file = File::create(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            writer: None,
            schema: None,
            row_groups: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Row groups written so far.
    pub fn row_groups(&self) -> usize {
        self.row_groups
    }

    fn write_row_group(&mut self, columns: &[Array]) -> ProcessorResult<()> {
        let (Some(writer), Some(schema)) = (self.writer.as_mut(), self.schema.as_ref()) else {
            return Err(ProcessorError::InvalidOptions {
                message: format!("{} extended before it was created", self.path.display()),
            });
        };
        if columns.len() != schema.fields.len() {
            return Err(ProcessorError::InvalidOptions {
                message: format!(
                    "expected {} columns, got {}",
                    schema.fields.len(),
                    columns.len()
                ),
            });
        }

        let mut rg = writer.next_row_group()?;
        let mut idx = 0usize;
        while let Some(mut col) = rg.next_column()? {
            let (field, array) = (&schema.fields[idx], &columns[idx]);
            write_column(&field.name, array, col.untyped())?;
            col.close()?;
            idx += 1;
        }
        rg.close()?;
        self.row_groups += 1;
        Ok(())
    }
}

impl OutputSink for ParquetSink {
    fn create(&mut self, table: &str, schema: &Schema, columns: Vec<Array>) -> ProcessorResult<()> {
        if self.writer.is_some() {
            return Err(ProcessorError::InvalidOptions {
                message: format!("output table {table} already created"),
            });
        }
        let message = message_type(table, schema)?;
        let parquet_schema = Arc::new(parse_message_type(&message)?);
        let props = Arc::new(WriterProperties::builder().build());
        let file = match self.file.take() {
            Some(file) => file,
            None => File::create(&self.path)?,
        };

        self.writer = Some(SerializedFileWriter::new(file, parquet_schema, props)?);
        self.schema = Some(schema.clone());
        self.write_row_group(&columns)
    }

    fn extend(&mut self, columns: Vec<Array>) -> ProcessorResult<()> {
        self.write_row_group(&columns)
    }

    fn close(&mut self) -> ProcessorResult<()> {
        if let Some(writer) = self.writer.take() {
            writer.close()?;
        } else if let Some(file) = self.file.take() {
            // Nothing written: footer only.
            let schema = Arc::new(SchemaType::group_type_builder("schema").build()?);
            let props = Arc::new(WriterProperties::builder().build());
            SerializedFileWriter::new(file, schema, props)?.close()?;
        }
        self.file = None;
        Ok(())
    }
}

/// Parquet message type for the output table.
fn message_type(table: &str, schema: &Schema) -> ProcessorResult<String> {
    if !is_valid_name(table) {
        return Err(ProcessorError::InvalidOptions {
            message: format!("invalid output table name '{table}'"),
        });
    }

    let mut out = format!("message {table} {{\n");
    for field in &schema.fields {
        if !is_valid_name(&field.name) {
            return Err(ProcessorError::UnsupportedColumn {
                name: field.name.clone(),
                message: "column name cannot be written to parquet".to_string(),
            });
        }
        match &field.data_type {
            DataType::List(inner) => {
                let (physical, annotation) = primitive(&field.name, inner)?;
                out.push_str(&format!(
                    "  REQUIRED group {} (LIST) {{\n    REPEATED group list {{\n      OPTIONAL {physical} element{annotation};\n    }}\n  }}\n",
                    field.name
                ));
            }
            scalar => {
                let (physical, annotation) = primitive(&field.name, scalar)?;
                out.push_str(&format!(
                    "  OPTIONAL {physical} {}{annotation};\n",
                    field.name
                ));
            }
        }
    }
    out.push('}');
    Ok(out)
}

fn primitive(column: &str, data_type: &DataType) -> ProcessorResult<(&'static str, &'static str)> {
    match data_type {
        DataType::Int64 => Ok(("INT64", "")),
        DataType::Float64 => Ok(("DOUBLE", "")),
        DataType::Bool => Ok(("BOOLEAN", "")),
        DataType::Utf8 => Ok(("BINARY", " (UTF8)")),
        DataType::List(_) => Err(ProcessorError::UnsupportedColumn {
            name: column.to_string(),
            message: "lists nested more than one level deep".to_string(),
        }),
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '{' | '}' | '(' | ')' | ';' | ',' | '='))
}

/// Definition/repetition levels plus the non-null leaf values of one column.
struct Levels<'a> {
    def: Vec<i16>,
    rep: Option<Vec<i16>>,
    leaves: Vec<&'a Value>,
}

fn levels<'a>(column: &str, array: &'a Array) -> ProcessorResult<Levels<'a>> {
    let mut def = Vec::with_capacity(array.len());
    let mut leaves = Vec::with_capacity(array.len());

    if array.depth() == 0 {
        for v in array.values() {
            if let Value::Null = v {
                def.push(0);
            } else {
                def.push(1);
                leaves.push(v);
            }
        }
        return Ok(Levels {
            def,
            rep: None,
            leaves,
        });
    }

    let mut rep = Vec::with_capacity(array.len());
    for v in array.values() {
        match v {
            Value::List(items) if !items.is_empty() => {
                for (k, item) in items.iter().enumerate() {
                    rep.push(if k == 0 { 0 } else { 1 });
                    if let Value::Null = item {
                        def.push(1);
                    } else {
                        def.push(2);
                        leaves.push(item);
                    }
                }
            }
            Value::List(_) | Value::Null => {
                def.push(0);
                rep.push(0);
            }
            other => {
                return Err(ProcessorError::UnsupportedColumn {
                    name: column.to_string(),
                    message: format!("expected a list, found {other:?}"),
                });
            }
        }
    }
    Ok(Levels {
        def,
        rep: Some(rep),
        leaves,
    })
}

fn typed<T>(
    column: &str,
    leaves: &[&Value],
    expected: &str,
    convert: impl Fn(&Value) -> Option<T>,
) -> ProcessorResult<Vec<T>> {
    leaves
        .iter()
        .map(|v| {
            convert(v).ok_or_else(|| ProcessorError::UnsupportedColumn {
                name: column.to_string(),
                message: format!("expected {expected}, found {v:?}"),
            })
        })
        .collect()
}

fn write_column(column: &str, array: &Array, writer: &mut ColumnWriter<'_>) -> ProcessorResult<()> {
    let Levels { def, rep, leaves } = levels(column, array)?;
    let rep = rep.as_deref();

    match writer {
        ColumnWriter::Int64ColumnWriter(w) => {
            let values = typed(column, &leaves, "integer", Value::as_i64)?;
            w.write_batch(&values, Some(&def), rep)?;
        }
        ColumnWriter::DoubleColumnWriter(w) => {
            let values = typed(column, &leaves, "number", Value::as_f64)?;
            w.write_batch(&values, Some(&def), rep)?;
        }
        ColumnWriter::BoolColumnWriter(w) => {
            let values = typed(column, &leaves, "bool", Value::as_bool)?;
            w.write_batch(&values, Some(&def), rep)?;
        }
        ColumnWriter::ByteArrayColumnWriter(w) => {
            let values = typed(column, &leaves, "string", |v| match v {
                Value::Utf8(s) => Some(ByteArray::from(s.as_str())),
                _ => None,
            })?;
            w.write_batch(&values, Some(&def), rep)?;
        }
        _ => {
            return Err(ProcessorError::UnsupportedColumn {
                name: column.to_string(),
                message: "unexpected parquet column writer".to_string(),
            });
        }
    }
    Ok(())
}
