//! Row-aligned event batches and chunk reads.

use std::collections::HashSet;

use crate::error::{ProcessorError, ProcessorResult};
use crate::source::EventTable;
use crate::types::{Array, Record, Value};

use super::collection::{Collection, CollectionBuilder, RecordArray};
use super::inference::EventSchema;
use super::not_load::NotLoad;
use super::Notice;

/// Half-open row interval `[start, stop)` of a source table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub start: usize,
    pub stop: usize,
}

impl ChunkRange {
    /// Raw range. `stop < start` is normalised to an empty range at `start`.
    pub fn new(start: usize, stop: usize) -> Self {
        Self {
            start,
            stop: stop.max(start),
        }
    }

    /// The `index`-th chunk of `chunk_size` rows, clipped to `limit`.
    pub fn nth(index: usize, chunk_size: usize, limit: usize) -> Self {
        let start = index.saturating_mul(chunk_size);
        Self::new(start, start.saturating_add(chunk_size)).clip(limit)
    }

    /// Clip both ends to `[0, limit]`.
    pub fn clip(self, limit: usize) -> Self {
        let start = self.start.min(limit);
        Self {
            start,
            stop: self.stop.min(limit).max(start),
        }
    }

    pub fn len(&self) -> usize {
        self.stop - self.start
    }

    /// `true` for an exhausted chunk.
    pub fn is_empty(&self) -> bool {
        self.start == self.stop
    }
}

/// Number of chunks needed to cover `limit` rows.
pub fn chunk_count(limit: usize, chunk_size: usize) -> usize {
    limit.div_ceil(chunk_size.max(1))
}

/// Ordered collection name → [`Collection`] mapping with a shared row count.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventBatch {
    len: usize,
    collections: Vec<(String, Collection)>,
}

impl EventBatch {
    /// The zero-row batch. Returned for exhausted chunks.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a batch from named collections; the first member fixes the row count.
    pub fn new(collections: Vec<(String, Collection)>) -> ProcessorResult<Self> {
        let len = collections.first().map_or(0, |(_, c)| c.len());
        Self::with_len(len, collections)
    }

    /// Build a batch whose members must all have exactly `len` rows.
    pub fn with_len(len: usize, collections: Vec<(String, Collection)>) -> ProcessorResult<Self> {
        let mut seen = HashSet::with_capacity(collections.len());
        for (name, c) in &collections {
            if c.len() != len {
                return Err(ProcessorError::RowCountMismatch {
                    collection: name.clone(),
                    expected: len,
                    found: c.len(),
                });
            }
            if !seen.insert(name.as_str()) {
                return Err(ProcessorError::DuplicateColumn { name: name.clone() });
            }
        }
        if collections.is_empty() {
            return Ok(Self::empty());
        }
        Ok(Self { len, collections })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Top-level field names in order.
    pub fn field_names(&self) -> Vec<&str> {
        self.collections.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Collection> {
        self.collections.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Collection> {
        self.collections
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
    }

    pub fn leaf(&self, name: &str) -> Option<&Array> {
        self.get(name).and_then(Collection::as_leaf)
    }

    pub fn grouped(&self, name: &str) -> Option<&RecordArray> {
        self.get(name).and_then(Collection::as_grouped)
    }

    /// Add or replace a top-level field. Its row count must match the batch.
    ///
    /// A batch without fields adopts the row count of its first field.
    pub fn insert(&mut self, name: impl Into<String>, collection: Collection) -> ProcessorResult<()> {
        let name = name.into();
        if self.collections.is_empty() {
            self.len = collection.len();
        } else if collection.len() != self.len {
            return Err(ProcessorError::RowCountMismatch {
                collection: name,
                expected: self.len,
                found: collection.len(),
            });
        }
        match self.get_mut(&name) {
            Some(slot) => *slot = collection,
            None => self.collections.push((name, collection)),
        }
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<Collection> {
        let idx = self.collections.iter().position(|(n, _)| n == name)?;
        let (_, c) = self.collections.remove(idx);
        if self.collections.is_empty() {
            self.len = 0;
        }
        Some(c)
    }

    /// Keep rows whose mask entry is `true`. `mask` should have one entry per row.
    pub fn filter(&self, mask: &[bool]) -> Self {
        let collections: Vec<(String, Collection)> = self
            .collections
            .iter()
            .map(|(n, c)| (n.clone(), c.filter(mask)))
            .collect();
        let len = mask.iter().take(self.len).filter(|k| **k).count();
        Self { len, collections }
    }

    pub fn row(&self, index: usize) -> EventRow<'_> {
        EventRow { batch: self, index }
    }

    pub fn rows(&self) -> impl Iterator<Item = EventRow<'_>> {
        (0..self.len).map(move |i| self.row(i))
    }

    /// Flatten into plain output columns (see [`Collection::flatten`]).
    pub fn flatten(self) -> ProcessorResult<Vec<(String, Array)>> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        for (name, c) in self.collections {
            for (col, a) in c.flatten(&name) {
                if !seen.insert(col.clone()) {
                    return Err(ProcessorError::DuplicateColumn { name: col });
                }
                out.push((col, a));
            }
        }
        Ok(out)
    }
}

/// Read-only view of one row of an [`EventBatch`].
#[derive(Debug, Clone, Copy)]
pub struct EventRow<'a> {
    batch: &'a EventBatch,
    index: usize,
}

impl<'a> EventRow<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Value of a leaf field in this row.
    pub fn value(&self, name: &str) -> Option<&'a Value> {
        self.batch.leaf(name)?.get(self.index)
    }

    /// Raw value of one field of a grouped collection (a list for jagged collections).
    pub fn field(&self, collection: &str, field: &str) -> Option<&'a Value> {
        self.batch.grouped(collection)?.field(field)?.get(self.index)
    }

    /// Number of objects of `name` in this row.
    ///
    /// Grouped collections report their record count, list leaves their length and scalar
    /// leaves `1`. Unknown names report `0`.
    pub fn num(&self, name: &str) -> usize {
        match self.batch.get(name) {
            Some(Collection::Grouped(r)) => r.count(self.index),
            Some(Collection::Leaf(a)) => match a.get(self.index) {
                Some(v) if a.depth() > 0 => v.list_len().unwrap_or(0),
                Some(_) => 1,
                None => 0,
            },
            None => 0,
        }
    }

    pub fn record(&self, collection: &str, index: usize) -> Option<Record> {
        self.batch.grouped(collection)?.record(self.index, index)
    }

    pub fn records(&self, collection: &str) -> Vec<Record> {
        self.batch
            .grouped(collection)
            .map(|r| r.records(self.index))
            .unwrap_or_default()
    }
}

/// Read rows `range` of `table` into an [`EventBatch`].
///
/// The range is clipped to the table's row count first; an empty range returns
/// [`EventBatch::empty`] without touching the table. Non-fatal conditions are passed to
/// `notify`.
pub fn read_events<T: EventTable + ?Sized>(
    table: &T,
    schema: &EventSchema,
    range: ChunkRange,
    not_load: &NotLoad,
    builder: &CollectionBuilder<'_>,
    notify: &mut dyn FnMut(Notice),
) -> ProcessorResult<EventBatch> {
    let range = range.clip(table.row_count());
    if range.is_empty() {
        return Ok(EventBatch::empty());
    }

    let mut collections = Vec::with_capacity(schema.len());
    for spec in schema.collections() {
        if not_load.skips_collection(&spec.name) {
            continue;
        }

        let columns = if spec.is_leaf() {
            let a = table.read_column(&spec.name, range.start, range.stop)?;
            vec![(spec.name.clone(), a)]
        } else {
            let mut cols = Vec::with_capacity(spec.fields.len());
            for field in &spec.fields {
                if not_load.skips_field(&spec.name, field) {
                    continue;
                }
                let a = table.read_column(&spec.column_name(field), range.start, range.stop)?;
                cols.push((field.clone(), a));
            }
            cols
        };

        if let Some(c) = builder.build(spec, columns, notify)? {
            collections.push((spec.name.clone(), c));
        }
    }

    EventBatch::with_len(range.len(), collections)
}
