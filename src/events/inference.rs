//! Collection inference from flat column names.
//!
//! Columns follow the `<collection>_<field>` naming convention: `Jet_pt` and `Jet_eta` are two
//! fields of the `Jet` collection, a bare `run` is a scalar leaf. Collection ids starting with
//! `n` (`nJet`, `nMuon`, ...) carry per-row object counts and are never exposed: list lengths
//! are recovered from the jagged columns themselves.

/// One inferred collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    /// Collection id (the column prefix, or the full name for scalar leaves).
    pub name: String,
    /// Field suffixes in column order. Empty for scalar leaves.
    pub fields: Vec<String>,
}

impl CollectionSpec {
    /// `true` if the collection is a single bare column.
    pub fn is_leaf(&self) -> bool {
        self.fields.is_empty()
    }

    /// Flat column name of one field of this collection.
    pub fn column_name(&self, field: &str) -> String {
        format!("{}_{}", self.name, field)
    }
}

/// Ordered collection grouping of one table's columns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventSchema {
    collections: Vec<CollectionSpec>,
}

impl EventSchema {
    pub fn collections(&self) -> &[CollectionSpec] {
        &self.collections
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionSpec> {
        self.collections.iter().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

/// Collection id of a column: the part before the first `_`, or the whole name.
pub fn collection_id(column: &str) -> &str {
    column.split_once('_').map_or(column, |(prefix, _)| prefix)
}

/// Group flat column names into collections.
///
/// Collections appear in the order their id first occurs in `columns`, and fields keep column
/// order, so the same column list always yields the same grouping.
pub fn infer_schema<S: AsRef<str>>(columns: &[S]) -> EventSchema {
    let mut ids: Vec<&str> = Vec::new();
    for c in columns {
        let id = collection_id(c.as_ref());
        if id.starts_with('n') || ids.contains(&id) {
            continue;
        }
        ids.push(id);
    }

    let collections = ids
        .into_iter()
        .map(|id| {
            let prefix = format!("{id}_");
            let fields = columns
                .iter()
                .filter_map(|c| c.as_ref().strip_prefix(prefix.as_str()))
                .map(str::to_string)
                .collect();
            CollectionSpec {
                name: id.to_string(),
                fields,
            }
        })
        .collect();

    EventSchema { collections }
}
