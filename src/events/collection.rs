//! Nested collections rebuilt from flat columns.

use crate::error::{ProcessorError, ProcessorResult};
use crate::types::{Array, DataType, Record, Value};

use super::behavior::{RecordType, TypeRegistry};
use super::inference::CollectionSpec;
use super::Notice;

/// One member of an [`super::EventBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum Collection {
    /// A bare column: one value (or one list) per row.
    Leaf(Array),
    /// Fields zipped into records, optionally tagged with a record type.
    Grouped(RecordArray),
}

impl Collection {
    /// Outer length (rows).
    pub fn len(&self) -> usize {
        match self {
            Self::Leaf(a) => a.len(),
            Self::Grouped(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_leaf(&self) -> Option<&Array> {
        match self {
            Self::Leaf(a) => Some(a),
            Self::Grouped(_) => None,
        }
    }

    pub fn as_grouped(&self) -> Option<&RecordArray> {
        match self {
            Self::Grouped(r) => Some(r),
            Self::Leaf(_) => None,
        }
    }

    /// Keep rows whose mask entry is `true`.
    pub fn filter(&self, mask: &[bool]) -> Self {
        match self {
            Self::Leaf(a) => Self::Leaf(a.filter(mask)),
            Self::Grouped(r) => Self::Grouped(r.filter(mask)),
        }
    }

    /// Plain output columns for this collection.
    ///
    /// A leaf keeps its name. A grouped collection `C` yields `C_<field>` per field and, when
    /// jagged, an `nC` count column, i.e. the layout [`super::infer_schema`] reads back.
    pub fn flatten(self, name: &str) -> Vec<(String, Array)> {
        match self {
            Self::Leaf(a) => vec![(name.to_string(), a)],
            Self::Grouped(r) => {
                let mut out = Vec::with_capacity(r.fields.len() + 1);
                if let Some(counts) = &r.counts {
                    let counts = counts.iter().map(|c| *c as i64).collect();
                    out.push((format!("n{name}"), Array::from_i64(counts)));
                }
                for (field, a) in r.fields {
                    out.push((format!("{name}_{field}"), a));
                }
                out
            }
        }
    }
}

/// Struct-of-arrays record collection.
///
/// Flat record arrays hold exactly one record per row. Jagged record arrays hold `counts[row]`
/// records per row; every field is then a list column with those lengths.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordArray {
    name: String,
    fields: Vec<(String, Array)>,
    counts: Option<Vec<usize>>,
    len: usize,
    record_type: Option<RecordType>,
}

impl RecordArray {
    /// Zip named fields into records of collection `collection`.
    ///
    /// The layout is chosen from the declared depth of the fields: if any field is a list
    /// column the result is jagged and scalar fields are repeated for every object of their
    /// row; otherwise the result is flat.
    pub fn zip(
        collection: &str,
        fields: Vec<(String, Array)>,
        record_type: Option<RecordType>,
    ) -> ProcessorResult<Self> {
        let len = fields.first().map_or(0, |(_, a)| a.len());
        for (name, a) in &fields {
            if a.len() != len {
                return Err(ProcessorError::RowCountMismatch {
                    collection: format!("{collection}_{name}"),
                    expected: len,
                    found: a.len(),
                });
            }
        }

        let counts = fields
            .iter()
            .find(|(_, a)| a.depth() > 0)
            .and_then(|(_, a)| a.counts());

        let mut out = Self {
            name: collection.to_string(),
            fields: Vec::with_capacity(fields.len()),
            counts,
            len,
            record_type,
        };
        for (name, a) in fields {
            out.push_field(name, a)?;
        }
        Ok(out)
    }

    fn push_field(&mut self, name: String, array: Array) -> ProcessorResult<()> {
        if array.len() != self.len {
            return Err(ProcessorError::RowCountMismatch {
                collection: format!("{}_{name}", self.name),
                expected: self.len,
                found: array.len(),
            });
        }
        let array = match &self.counts {
            None => array,
            Some(counts) if array.depth() == 0 => broadcast(array, counts),
            Some(counts) => {
                let found = array.counts().unwrap_or_default();
                if let Some(row) = (0..counts.len()).find(|&i| counts[i] != found[i]) {
                    return Err(ProcessorError::JaggedLengthMismatch {
                        collection: self.name.clone(),
                        field: name,
                        row,
                        expected: counts[row],
                        found: found[row],
                    });
                }
                array
            }
        };
        self.fields.push((name, array));
        Ok(())
    }

    /// Collection name the records were built for.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_jagged(&self) -> bool {
        self.counts.is_some()
    }

    /// Per-row object counts for jagged arrays.
    pub fn counts(&self) -> Option<&[usize]> {
        self.counts.as_deref()
    }

    /// Number of records in a row (always `1` for flat arrays).
    pub fn count(&self, row: usize) -> usize {
        match &self.counts {
            Some(c) => c.get(row).copied().unwrap_or(0),
            None if row < self.len => 1,
            None => 0,
        }
    }

    pub fn record_type(&self) -> Option<&RecordType> {
        self.record_type.as_ref()
    }

    pub fn field(&self, name: &str) -> Option<&Array> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, a)| a)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Record `index` of row `row`.
    pub fn record(&self, row: usize, index: usize) -> Option<Record> {
        if index >= self.count(row) {
            return None;
        }
        let fields = self
            .fields
            .iter()
            .map(|(name, a)| {
                let v = match (&self.counts, a.get(row)) {
                    (Some(_), Some(Value::List(items))) => items.get(index).cloned().unwrap_or(Value::Null),
                    (None, Some(v)) => v.clone(),
                    _ => Value::Null,
                };
                (name.clone(), v)
            })
            .collect();
        Some(Record::new(fields))
    }

    /// All records of a row.
    pub fn records(&self, row: usize) -> Vec<Record> {
        (0..self.count(row))
            .filter_map(|i| self.record(row, i))
            .collect()
    }

    /// Evaluate a behavior method of the attached record type on every record.
    ///
    /// Jagged arrays produce a list column with the same counts; flat arrays produce one value
    /// per row. The column type comes from the method's declared output type, so chunks with
    /// no objects yield the same type as chunks with many. A returned value of another type is
    /// an [`ProcessorError::UnsupportedColumn`].
    pub fn call(&self, method: &str) -> ProcessorResult<Array> {
        let m = self
            .record_type
            .as_ref()
            .and_then(|t| t.method(method))
            .ok_or_else(|| ProcessorError::UnknownMethod {
                record_type: self
                    .record_type
                    .as_ref()
                    .map_or_else(|| "<untagged>".to_string(), |t| t.name().to_string()),
                method: method.to_string(),
            })?;
        let output = m.output_type();

        let mut values = Vec::with_capacity(self.len);
        for row in 0..self.len {
            let mut per_row = Vec::with_capacity(self.count(row));
            for record in self.records(row) {
                let v = m.call(&record);
                if !conforms(&v, output) {
                    return Err(ProcessorError::UnsupportedColumn {
                        name: format!("{}.{method}", self.name),
                        message: format!("method declared {output:?}, returned {v:?} at row {row}"),
                    });
                }
                per_row.push(v);
            }
            match self.counts {
                Some(_) => values.push(Value::List(per_row)),
                None => values.push(per_row.into_iter().next().unwrap_or(Value::Null)),
            }
        }
        let data_type = if self.is_jagged() {
            DataType::list(output.clone())
        } else {
            output.clone()
        };
        Ok(Array::new(data_type, values))
    }

    /// Add a field to every record. Scalar columns are repeated per object in jagged arrays.
    pub fn insert_field(&mut self, name: impl Into<String>, array: Array) -> ProcessorResult<()> {
        let name = name.into();
        if self.field(&name).is_some() {
            return Err(ProcessorError::DuplicateColumn { name });
        }
        self.push_field(name, array)
    }

    /// Keep the objects whose entry in `keep[row]` is `true`. Rows keep their position.
    ///
    /// Only jagged arrays can drop objects; a flat array has exactly one record per row.
    pub fn select(&self, keep: &[Vec<bool>]) -> ProcessorResult<Self> {
        let Some(counts) = &self.counts else {
            return Err(ProcessorError::UnsupportedColumn {
                name: self.name.clone(),
                message: "object selection needs a jagged collection".to_string(),
            });
        };
        if keep.len() != self.len {
            return Err(ProcessorError::RowCountMismatch {
                collection: self.name.clone(),
                expected: self.len,
                found: keep.len(),
            });
        }

        let fields = self
            .fields
            .iter()
            .map(|(n, a)| {
                let values = a
                    .values()
                    .iter()
                    .zip(keep)
                    .map(|(v, mask)| match v {
                        Value::List(items) => Value::List(
                            items
                                .iter()
                                .zip(mask)
                                .filter(|(_, k)| **k)
                                .map(|(item, _)| item.clone())
                                .collect(),
                        ),
                        other => other.clone(),
                    })
                    .collect();
                (n.clone(), Array::new(a.data_type().clone(), values))
            })
            .collect();
        let counts = counts
            .iter()
            .zip(keep)
            .map(|(c, mask)| mask.iter().take(*c).filter(|k| **k).count())
            .collect();

        Ok(Self {
            name: self.name.clone(),
            fields,
            counts: Some(counts),
            len: self.len,
            record_type: self.record_type.clone(),
        })
    }

    /// Keep rows whose mask entry is `true`.
    pub fn filter(&self, mask: &[bool]) -> Self {
        let fields = self
            .fields
            .iter()
            .map(|(n, a)| (n.clone(), a.filter(mask)))
            .collect();
        let counts = self.counts.as_ref().map(|c| {
            c.iter()
                .zip(mask)
                .filter(|(_, keep)| **keep)
                .map(|(c, _)| *c)
                .collect::<Vec<_>>()
        });
        let len = mask.iter().take(self.len).filter(|k| **k).count();
        Self {
            name: self.name.clone(),
            fields,
            counts,
            len,
            record_type: self.record_type.clone(),
        }
    }
}

fn broadcast(array: Array, counts: &[usize]) -> Array {
    let data_type = DataType::list(array.data_type().clone());
    let values = array
        .into_values()
        .into_iter()
        .zip(counts)
        .map(|(v, n)| Value::List(vec![v; *n]))
        .collect();
    Array::new(data_type, values)
}

/// `true` if `v` is null or a value of type `t`.
fn conforms(v: &Value, t: &DataType) -> bool {
    match (v, t) {
        (Value::Null, _) => true,
        (Value::Int64(_), DataType::Int64)
        | (Value::Float64(_), DataType::Float64)
        | (Value::Bool(_), DataType::Bool)
        | (Value::Utf8(_), DataType::Utf8) => true,
        (Value::List(items), DataType::List(inner)) => items.iter().all(|i| conforms(i, inner)),
        _ => false,
    }
}

/// Builds one [`Collection`] from the columns of a chunk.
#[derive(Debug, Clone, Copy)]
pub struct CollectionBuilder<'a> {
    types: &'a TypeRegistry,
}

impl<'a> CollectionBuilder<'a> {
    pub fn new(types: &'a TypeRegistry) -> Self {
        Self { types }
    }

    /// Build collection `spec` from the columns that survived filtering.
    ///
    /// For a scalar leaf, `columns` holds the bare column. For a grouped collection it holds
    /// `(field suffix, array)` pairs. Returns `Ok(None)` when a grouped collection has no
    /// surviving field; that is reported as [`Notice::MissingCollectionData`].
    pub fn build(
        &self,
        spec: &CollectionSpec,
        mut columns: Vec<(String, Array)>,
        notify: &mut dyn FnMut(Notice),
    ) -> ProcessorResult<Option<Collection>> {
        if spec.is_leaf() {
            return match columns.pop() {
                Some((_, a)) => Ok(Some(Collection::Leaf(a))),
                None => Err(ProcessorError::UnknownColumn {
                    name: spec.name.clone(),
                }),
            };
        }

        if columns.is_empty() {
            notify(Notice::MissingCollectionData {
                collection: spec.name.clone(),
            });
            return Ok(None);
        }

        let record_type = self.types.record_type(&spec.name);
        if record_type.is_none() {
            notify(Notice::NoTypeTagRegistered {
                collection: spec.name.clone(),
            });
        }
        let records = RecordArray::zip(&spec.name, columns, record_type)?;
        Ok(Some(Collection::Grouped(records)))
    }
}
