//! Event model: collection inference, filtering, nested reconstruction and batches.
//!
//! A chunk of a source table is turned into an [`EventBatch`] in three steps:
//!
//! - [`infer_schema`] groups the table's flat column names into collections
//! - [`NotLoad`] drops whole collections or single fields
//! - [`CollectionBuilder`] zips each collection's surviving columns into a [`Collection`]
//!
//! [`read_events`] runs these steps for one [`ChunkRange`].

pub mod batch;
pub mod behavior;
pub mod collection;
pub mod inference;
pub mod lorentz;
pub mod not_load;

pub use batch::{chunk_count, read_events, ChunkRange, EventBatch, EventRow};
pub use behavior::{Behavior, Method, RecordType, TypeRegistry};
pub use collection::{Collection, CollectionBuilder, RecordArray};
pub use inference::{collection_id, infer_schema, CollectionSpec, EventSchema};
pub use lorentz::LorentzVector;
pub use not_load::NotLoad;

/// Non-fatal conditions reported while building a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Every field of a grouped collection was filtered out; the collection is left out of the
    /// batch.
    MissingCollectionData { collection: String },
    /// No record type is registered for a grouped collection; it is built untagged.
    NoTypeTagRegistered { collection: String },
}
