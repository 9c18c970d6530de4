//! Core data model types for event streaming.
//!
//! Source tables expose typed columns ([`Array`]), one [`Value`] per row. A column is either
//! flat (one scalar per row) or jagged (one variable-length list per row); which one is
//! decided by its declared [`DataType`], never by looking at the values.

/// Logical data type for a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    Utf8,
    /// Variable-length list per row.
    List(Box<DataType>),
}

impl DataType {
    /// Convenience constructor for `List(inner)`.
    pub fn list(inner: DataType) -> Self {
        Self::List(Box::new(inner))
    }

    /// Nesting depth of the type: `0` for scalars, `1` for a list of scalars, and so on.
    pub fn depth(&self) -> usize {
        match self {
            Self::List(inner) => 1 + inner.depth(),
            _ => 0,
        }
    }

    /// Element type of a list, or `None` for scalars.
    pub fn element(&self) -> Option<&DataType> {
        match self {
            Self::List(inner) => Some(inner),
            _ => None,
        }
    }
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Field data type.
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// An ordered list of fields, e.g. the column schema of the output table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Returns the field with the given name, if present.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A single typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
    /// Variable-length list.
    List(Vec<Value>),
}

impl Value {
    /// Numeric view of the value; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(v) => Some(*v),
            Value::Int64(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Number of elements when the value is a list. `Null` counts as an empty list.
    pub fn list_len(&self) -> Option<usize> {
        match self {
            Value::List(items) => Some(items.len()),
            Value::Null => Some(0),
            _ => None,
        }
    }
}

/// A typed column: one [`Value`] per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    data_type: DataType,
    values: Vec<Value>,
}

impl Array {
    /// Create an array from a declared type and per-row values.
    pub fn new(data_type: DataType, values: Vec<Value>) -> Self {
        Self { data_type, values }
    }

    /// A zero-row array of the given type.
    pub fn empty(data_type: DataType) -> Self {
        Self::new(data_type, Vec::new())
    }

    pub fn from_i64(values: Vec<i64>) -> Self {
        Self::new(DataType::Int64, values.into_iter().map(Value::Int64).collect())
    }

    pub fn from_f64(values: Vec<f64>) -> Self {
        Self::new(DataType::Float64, values.into_iter().map(Value::Float64).collect())
    }

    pub fn from_bool(values: Vec<bool>) -> Self {
        Self::new(DataType::Bool, values.into_iter().map(Value::Bool).collect())
    }

    /// Jagged `Float64` column, one list per row.
    pub fn jagged_f64(rows: Vec<Vec<f64>>) -> Self {
        Self::new(
            DataType::list(DataType::Float64),
            rows.into_iter()
                .map(|r| Value::List(r.into_iter().map(Value::Float64).collect()))
                .collect(),
        )
    }

    /// Jagged `Int64` column, one list per row.
    pub fn jagged_i64(rows: Vec<Vec<i64>>) -> Self {
        Self::new(
            DataType::list(DataType::Int64),
            rows.into_iter()
                .map(|r| Value::List(r.into_iter().map(Value::Int64).collect()))
                .collect(),
        )
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// Declared nesting depth (see [`DataType::depth`]).
    pub fn depth(&self) -> usize {
        self.data_type.depth()
    }

    /// Outer length (number of rows).
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, row: usize) -> Option<&Value> {
        self.values.get(row)
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Per-row list lengths for a jagged array, `None` for flat arrays.
    pub fn counts(&self) -> Option<Vec<usize>> {
        if self.depth() == 0 {
            return None;
        }
        Some(
            self.values
                .iter()
                .map(|v| v.list_len().unwrap_or(0))
                .collect(),
        )
    }

    /// Copy of the rows `[start, stop)`, clipped to the array length.
    pub fn slice(&self, start: usize, stop: usize) -> Self {
        let stop = stop.min(self.values.len());
        let start = start.min(stop);
        Self::new(self.data_type.clone(), self.values[start..stop].to_vec())
    }

    /// Keep rows whose mask entry is `true`.
    ///
    /// Rows beyond the end of `mask` are dropped.
    pub fn filter(&self, mask: &[bool]) -> Self {
        let values = self
            .values
            .iter()
            .zip(mask)
            .filter(|(_, keep)| **keep)
            .map(|(v, _)| v.clone())
            .collect();
        Self::new(self.data_type.clone(), values)
    }

    /// Append the rows of `other`, which must have the same type.
    ///
    /// Returns `false` (and leaves `self` unchanged) on a type mismatch.
    pub fn append(&mut self, other: Array) -> bool {
        if other.data_type != self.data_type {
            return false;
        }
        self.values.extend(other.values);
        true
    }
}

/// One object of a grouped collection: ordered `(field, value)` pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new(fields: Vec<(String, Value)>) -> Self {
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Numeric field lookup; integers are widened.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
