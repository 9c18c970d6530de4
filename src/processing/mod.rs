//! Transform helpers over [`crate::events::EventBatch`].
//!
//! A processor transform receives one batch per chunk and returns the batch to write. These
//! helpers cover the usual building blocks:
//!
//! - [`filter()`]: event selection by predicate
//! - [`filter_objects()`]: object selection inside a jagged collection
//! - [`with_field()`]: a derived per-event column
//! - [`with_object_field()`] / [`with_method()`]: derived per-object fields
//!
//! ## Example: select events with two central jets
//!
//! ```rust
//! use event_stream_processing::events::{Collection, EventBatch, RecordArray};
//! use event_stream_processing::processing::{filter, filter_objects, with_field};
//! use event_stream_processing::types::{Array, DataType, Value};
//!
//! let jets = RecordArray::zip(
//!     "Jet",
//!     vec![
//!         ("pt".to_string(), Array::jagged_f64(vec![vec![50.0, 40.0], vec![30.0, 20.0]])),
//!         ("eta".to_string(), Array::jagged_f64(vec![vec![0.1, -0.3], vec![0.2, 3.1]])),
//!     ],
//!     None,
//! )?;
//! let batch = EventBatch::new(vec![("Jet".to_string(), Collection::Grouped(jets))])?;
//!
//! let batch = filter_objects(batch, "Jet", |jet| {
//!     jet.get_f64("eta").is_some_and(|eta| eta.abs() < 2.5)
//! })?;
//! let batch = filter(&batch, |row| row.num("Jet") >= 2);
//! let batch = with_field(batch, "nCentral", DataType::Int64, |row| {
//!     Value::Int64(row.num("Jet") as i64)
//! })?;
//!
//! assert_eq!(batch.len(), 1);
//! assert_eq!(batch.leaf("nCentral").unwrap(), &Array::from_i64(vec![2]));
//! # Ok::<(), event_stream_processing::ProcessorError>(())
//! ```

pub mod filter;
pub mod map;

pub use filter::{filter, filter_objects};
pub use map::{with_field, with_method, with_object_field};
