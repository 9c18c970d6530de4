//! Parquet source backend.
//!
//! Each top-level Parquet column is one flat column of the event table. Column types are
//! taken from the file schema:
//!
//! - `INT32`/`INT64` → [`DataType::Int64`], `FLOAT`/`DOUBLE` → [`DataType::Float64`]
//! - `BOOLEAN` → [`DataType::Bool`], `BYTE_ARRAY (UTF8)` → [`DataType::Utf8`]
//! - `(LIST)` groups and bare repeated primitives → [`DataType::List`]
//!
//! Row ranges are served with the record API on the calling thread. Each column keeps a
//! forward-only cursor, so consecutive chunks continue where the previous read stopped instead
//! of decoding the row group again from its first row. A read that starts before a column's
//! cursor reopens it at the row group holding the first requested row; earlier row groups are
//! never decoded.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use parquet::basic::{ConvertedType, Repetition, Type as PhysicalType};
use parquet::file::metadata::RowGroupMetaData;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::file::serialized_reader::ReadOptionsBuilder;
use parquet::record::reader::RowIter;
use parquet::record::Field;
use parquet::schema::types::{Type as SchemaType, TypePtr};

use crate::error::{ProcessorError, ProcessorResult};
use crate::types::{Array, DataType, Value};

use super::{EventTable, TableBackend};

/// Opens Parquet files.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetBackend;

impl TableBackend for ParquetBackend {
    type Table = ParquetTable;

    fn open(&self, path: &Path) -> ProcessorResult<ParquetTable> {
        ParquetTable::open(path)
    }
}

/// One Parquet file viewed as an event table.
pub struct ParquetTable {
    path: PathBuf,
    reader: SerializedFileReader<File>,
    columns: Vec<TypePtr>,
    row_groups: Vec<usize>,
    row_count: usize,
    cursors: Mutex<HashMap<String, Cursor>>,
}

/// Read position of one column: `rows` yields row `next` next.
struct Cursor {
    next: usize,
    rows: RowIter<'static>,
}

impl ParquetTable {
    pub fn open(path: impl AsRef<Path>) -> ProcessorResult<Self> {
        let path = path.as_ref();
        let reader = SerializedFileReader::try_from(path)?;

        let meta = reader.metadata();
        let columns = meta.file_metadata().schema().get_fields().to_vec();
        let row_groups: Vec<usize> = (0..meta.num_row_groups())
            .map(|i| usize::try_from(meta.row_group(i).num_rows()).unwrap_or(0))
            .collect();
        let row_count = row_groups.iter().sum();

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            columns,
            row_groups,
            row_count,
            cursors: Mutex::new(HashMap::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Declared type of a column.
    pub fn column_type(&self, name: &str) -> ProcessorResult<DataType> {
        let column = self.column(name)?;
        data_type_of(column)
    }

    fn column(&self, name: &str) -> ProcessorResult<&TypePtr> {
        self.columns
            .iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| ProcessorError::UnknownColumn {
                name: name.to_string(),
            })
    }

    /// Open a cursor on `column` positioned at the start of the row group holding `start`.
    fn cursor(&self, column: &TypePtr, start: usize) -> ProcessorResult<Cursor> {
        let mut first = 0usize;
        let mut offset = 0usize;
        while first < self.row_groups.len() && offset + self.row_groups[first] <= start {
            offset += self.row_groups[first];
            first += 1;
        }

        let options = ReadOptionsBuilder::new()
            .with_predicate(Box::new(move |_: &RowGroupMetaData, i: usize| i >= first))
            .build();
        let reader = SerializedFileReader::new_with_options(File::open(&self.path)?, options)?;

        let root = self.reader.metadata().file_metadata().schema();
        let projection = SchemaType::group_type_builder(root.name())
            .with_fields(vec![column.clone()])
            .build()?;
        let rows = RowIter::from_file_into(Box::new(reader)).project(Some(projection))?;
        Ok(Cursor { next: offset, rows })
    }
}

impl EventTable for ParquetTable {
    fn row_count(&self) -> usize {
        self.row_count
    }

    fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name().to_string()).collect()
    }

    fn read_column(&self, name: &str, start: usize, stop: usize) -> ProcessorResult<Array> {
        let column = self.column(name)?;
        let data_type = data_type_of(column)?;

        let stop = stop.min(self.row_count);
        let start = start.min(stop);
        let mut values = Vec::with_capacity(stop - start);
        if start == stop {
            return Ok(Array::new(data_type, values));
        }

        let mut cursors = self.cursors.lock().map_err(|_| ProcessorError::UnsupportedColumn {
            name: name.to_string(),
            message: "column cursor lock poisoned".to_string(),
        })?;
        let cursor = match cursors.entry(name.to_string()) {
            Entry::Occupied(e) if e.get().next <= start => e.into_mut(),
            Entry::Occupied(mut e) => {
                e.insert(self.cursor(column, start)?);
                e.into_mut()
            }
            Entry::Vacant(e) => e.insert(self.cursor(column, start)?),
        };

        while cursor.next < start {
            match cursor.rows.next() {
                Some(row) => {
                    row?;
                    cursor.next += 1;
                }
                None => break,
            }
        }
        while cursor.next < stop {
            let Some(row) = cursor.rows.next() else {
                break;
            };
            let row = row?;
            cursor.next += 1;
            let field = row
                .get_column_iter()
                .next()
                .map(|(_, f)| f)
                .unwrap_or(&Field::Null);
            values.push(convert_field(name, &data_type, field)?);
        }

        Ok(Array::new(data_type, values))
    }
}

fn data_type_of(column: &SchemaType) -> ProcessorResult<DataType> {
    let unsupported = |message: &str| ProcessorError::UnsupportedColumn {
        name: column.name().to_string(),
        message: message.to_string(),
    };

    if column.is_primitive() {
        let scalar = scalar_type(column).ok_or_else(|| unsupported("unsupported physical type"))?;
        let info = column.get_basic_info();
        if info.has_repetition() && info.repetition() == Repetition::REPEATED {
            return Ok(DataType::list(scalar));
        }
        return Ok(scalar);
    }

    if column.get_basic_info().converted_type() != ConvertedType::LIST {
        return Err(unsupported("nested groups are not supported"));
    }

    // (LIST) annotated group: `repeated group list { element }`, or the legacy two-level
    // form with a repeated primitive directly under the annotation.
    let repeated = column
        .get_fields()
        .first()
        .ok_or_else(|| unsupported("empty list group"))?;
    let element = if repeated.is_group() && repeated.get_fields().len() == 1 {
        &repeated.get_fields()[0]
    } else {
        repeated
    };
    let inner = data_type_of(element)?;
    Ok(DataType::list(inner))
}

fn scalar_type(column: &SchemaType) -> Option<DataType> {
    match column.get_physical_type() {
        PhysicalType::INT32 | PhysicalType::INT64 => Some(DataType::Int64),
        PhysicalType::FLOAT | PhysicalType::DOUBLE => Some(DataType::Float64),
        PhysicalType::BOOLEAN => Some(DataType::Bool),
        PhysicalType::BYTE_ARRAY
            if column.get_basic_info().converted_type() == ConvertedType::UTF8 =>
        {
            Some(DataType::Utf8)
        }
        _ => None,
    }
}

fn convert_field(column: &str, data_type: &DataType, f: &Field) -> ProcessorResult<Value> {
    if let Field::Null = f {
        return Ok(Value::Null);
    }

    let mismatch = |expected: &str| ProcessorError::UnsupportedColumn {
        name: column.to_string(),
        message: format!("expected {expected}, found {f}"),
    };

    match data_type {
        DataType::Int64 => match f {
            Field::Byte(v) => Ok(Value::Int64(i64::from(*v))),
            Field::Short(v) => Ok(Value::Int64(i64::from(*v))),
            Field::Int(v) => Ok(Value::Int64(i64::from(*v))),
            Field::Long(v) => Ok(Value::Int64(*v)),
            Field::UByte(v) => Ok(Value::Int64(i64::from(*v))),
            Field::UShort(v) => Ok(Value::Int64(i64::from(*v))),
            Field::UInt(v) => Ok(Value::Int64(i64::from(*v))),
            Field::ULong(v) => i64::try_from(*v)
                .map(Value::Int64)
                .map_err(|_| mismatch("integer within i64 range")),
            _ => Err(mismatch("integer")),
        },
        DataType::Float64 => match f {
            Field::Float(v) => Ok(Value::Float64(f64::from(*v))),
            Field::Double(v) => Ok(Value::Float64(*v)),
            _ => Err(mismatch("number")),
        },
        DataType::Bool => match f {
            Field::Bool(b) => Ok(Value::Bool(*b)),
            _ => Err(mismatch("bool")),
        },
        DataType::Utf8 => match f {
            Field::Str(s) => Ok(Value::Utf8(s.clone())),
            _ => Err(mismatch("string")),
        },
        DataType::List(inner) => match f {
            Field::ListInternal(list) => list
                .elements()
                .iter()
                .map(|e| convert_field(column, inner, e))
                .collect::<ProcessorResult<Vec<_>>>()
                .map(Value::List),
            _ => Err(mismatch("list")),
        },
    }
}
