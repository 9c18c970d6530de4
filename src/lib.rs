//! `event-stream-processing` streams large columnar event tables through a user transform into a
//! single output table, holding at most one chunk of rows in memory at a time.
//!
//! Source tables store nested event data as flat columns named `<collection>_<field>`
//! (`Jet_pt`, `Jet_eta`, ...) next to scalar columns (`run`, `event`). For every chunk the
//! processor:
//!
//! 1. groups the columns into collections ([`events::infer_schema`]),
//! 2. skips unwanted collections and fields ([`events::NotLoad`]),
//! 3. zips each collection into records, optionally tagged with a record type that carries
//!    named methods ([`events::TypeRegistry`], [`events::Behavior`]),
//! 4. hands the resulting [`events::EventBatch`] to the caller's transform,
//! 5. flattens what is left back into columns and appends them to the output table
//!    ([`sink::StreamingWriter`]).
//!
//! Files are read in order, in chunks of `chunk_size` rows, and at most `max_events` rows are
//! read from each file ([`config::ProcessorOptions`]).
//!
//! ## Example
//!
//! ```rust
//! use event_stream_processing::config::ProcessorOptions;
//! use event_stream_processing::events::EventBatch;
//! use event_stream_processing::execution::Processor;
//! use event_stream_processing::processing::filter;
//! use event_stream_processing::sink::MemorySink;
//! use event_stream_processing::source::{MemoryBackend, MemoryTable};
//! use event_stream_processing::types::Array;
//! use event_stream_processing::ProcessorResult;
//!
//! # fn main() -> Result<(), event_stream_processing::ProcessorError> {
//! let mut backend = MemoryBackend::new();
//! backend.insert(
//!     "events.parquet",
//!     MemoryTable::new(vec![
//!         ("run".to_string(), Array::from_i64(vec![1, 1, 2])),
//!         ("Jet_pt".to_string(), Array::jagged_f64(vec![vec![50.0, 40.0], vec![], vec![30.0, 25.0]])),
//!     ])?,
//! );
//!
//! let opts = ProcessorOptions::default().with_chunk_size(2);
//! let mut processor = Processor::new(["events.parquet"], opts, |batch: EventBatch| -> ProcessorResult<EventBatch> {
//!     Ok(filter(&batch, |row| row.num("Jet") >= 2))
//! })?;
//!
//! let mut sink = MemorySink::new();
//! let summary = processor.run(&backend, &mut sink)?;
//! assert_eq!(summary.metrics.rows_read, 3);
//! assert_eq!(summary.metrics.rows_written, 2);
//! assert_eq!(sink.column("run"), Some(Array::from_i64(vec![1, 2])));
//! # Ok(())
//! # }
//! ```
//!
//! With Parquet inputs, [`execution::Processor::run_to_path`] reads the sources through
//! [`source::ParquetBackend`] and writes a Parquet output file.
//!
//! ## Modules
//!
//! - [`types`]: columns, values and records
//! - [`events`]: collection inference, filtering, nested records and batches
//! - [`source`]: storage backends for source tables
//! - [`sink`]: output table sinks and the append-only writer
//! - [`processing`]: transform helpers (event/object selection, derived fields)
//! - [`execution`]: the chunked driver, observers and metrics
//! - [`config`]: processor options
//! - [`error`]: error types

pub mod config;
pub mod error;
pub mod events;
pub mod execution;
pub mod processing;
pub mod sink;
pub mod source;
pub mod types;

pub use error::{ProcessorError, ProcessorResult};
