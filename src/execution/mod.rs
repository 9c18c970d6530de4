//! The chunked read → transform → write driver.
//!
//! A [`Processor`] walks its source files in order. For every file it infers the collection
//! schema once, then reads the file in chunks of at most `chunk_size` rows, up to
//! `max_events` rows per file. Each chunk is handed to the caller's [`Transform`]; whatever
//! survives is flattened and appended to the single output table. Chunk data is owned by the
//! loop body and released before the next read, so at most one chunk is resident at a time.
//!
//! Everything runs on the calling thread. The first error aborts the run; output written up to
//! that point is left in place.
//!
//! Progress is reported through an optional [`ProcessorObserver`] and through
//! [`ProcessorMetrics`], which can be snapshotted at any time.

mod observer;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::config::ProcessorOptions;
use crate::error::ProcessorResult;
use crate::events::{
    chunk_count, infer_schema, read_events, ChunkRange, CollectionBuilder, EventBatch, NotLoad, Notice,
    TypeRegistry,
};
use crate::sink::{OutputSink, ParquetSink, StreamingWriter};
use crate::source::{expand_paths, EventTable, ParquetBackend, TableBackend};
use crate::types::Schema;

pub use observer::{
    CompositeObserver, FileObserver, ProcessorEvent, ProcessorMetrics, ProcessorMetricsSnapshot,
    ProcessorObserver, Severity, StdErrObserver,
};

/// Caller-supplied per-chunk logic: selection, derived fields, dropped collections.
///
/// Any `FnMut(EventBatch) -> ProcessorResult<EventBatch>` is a transform. Returning a batch
/// with zero rows (or no fields) discards the chunk.
pub trait Transform {
    fn apply(&mut self, batch: EventBatch) -> ProcessorResult<EventBatch>;
}

impl<F> Transform for F
where
    F: FnMut(EventBatch) -> ProcessorResult<EventBatch>,
{
    fn apply(&mut self, batch: EventBatch) -> ProcessorResult<EventBatch> {
        self(batch)
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Column schema of the output table, `None` if nothing was written.
    pub schema: Option<Schema>,
    pub metrics: ProcessorMetricsSnapshot,
}

/// Streams events from source files through a transform into one output table.
pub struct Processor<T: Transform> {
    files: Vec<PathBuf>,
    options: ProcessorOptions,
    not_load: NotLoad,
    types: TypeRegistry,
    transform: T,
    observer: Option<Arc<dyn ProcessorObserver>>,
    metrics: Arc<ProcessorMetrics>,
}

impl<T: Transform> Processor<T> {
    /// Create a processor over `files`, processed in the given order.
    ///
    /// Fails with [`crate::ProcessorError::InvalidOptions`] if the options do not validate.
    pub fn new<I, P>(files: I, options: ProcessorOptions, transform: T) -> ProcessorResult<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        options.validate()?;
        let not_load = NotLoad::new(options.not_load.iter().cloned());
        let mut types = TypeRegistry::new();
        types.extend(options.mixins.clone());
        Ok(Self {
            files: files.into_iter().map(Into::into).collect(),
            options,
            not_load,
            types,
            transform,
            observer: None,
            metrics: Arc::new(ProcessorMetrics::new()),
        })
    }

    /// Create a processor over every file matching a glob pattern, in sorted order.
    pub fn from_pattern(pattern: &str, options: ProcessorOptions, transform: T) -> ProcessorResult<Self> {
        let files = expand_paths(pattern)?;
        Self::new(files, options, transform)
    }

    /// Use `types` as the capability table. Mixins from the options are merged on top.
    pub fn with_types(mut self, types: TypeRegistry) -> Self {
        self.types = types;
        self.types.extend(self.options.mixins.clone());
        self
    }

    /// Attach an observer for processor events (logging/alerts).
    pub fn with_observer(mut self, observer: Arc<dyn ProcessorObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get a handle to real-time run metrics.
    pub fn metrics(&self) -> Arc<ProcessorMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn options(&self) -> &ProcessorOptions {
        &self.options
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Run over Parquet sources and write the output table to a Parquet file at `output`.
    ///
    /// The output file is created (or truncated) before the first source is opened. A run
    /// that writes nothing still leaves a readable file with no columns and no rows.
    pub fn run_to_path(&mut self, output: impl AsRef<Path>) -> ProcessorResult<RunSummary> {
        let sink = ParquetSink::new(output)?;
        self.run(&ParquetBackend, sink)
    }

    /// Run over sources opened by `backend`, writing the output table to `sink`.
    pub fn run<B, S>(&mut self, backend: &B, sink: S) -> ProcessorResult<RunSummary>
    where
        B: TableBackend,
        S: OutputSink,
    {
        let start = Instant::now();
        self.metrics.begin_run();
        self.emit(ProcessorEvent::RunStarted {
            files: self.files.len(),
        });

        let result = self.run_files(backend, sink);
        self.metrics.end_run(start.elapsed());

        match result {
            Ok(schema) => {
                let metrics = self.metrics.snapshot();
                self.emit(ProcessorEvent::RunFinished {
                    elapsed: start.elapsed(),
                    metrics: metrics.clone(),
                });
                Ok(RunSummary { schema, metrics })
            }
            Err(e) => {
                self.emit(ProcessorEvent::RunFailed {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn run_files<B, S>(&mut self, backend: &B, sink: S) -> ProcessorResult<Option<Schema>>
    where
        B: TableBackend,
        S: OutputSink,
    {
        let mut writer = StreamingWriter::new(sink, self.options.output_table.clone());
        let files = self.files.clone();
        for path in &files {
            self.run_file(backend, path, &mut writer)?;
        }

        let schema = writer.schema().cloned();
        writer.finish()?;
        Ok(schema)
    }

    fn run_file<B, S>(
        &mut self,
        backend: &B,
        path: &Path,
        writer: &mut StreamingWriter<S>,
    ) -> ProcessorResult<()>
    where
        B: TableBackend,
        S: OutputSink,
    {
        let table = backend.open(path)?;
        let schema = infer_schema(&table.column_names());
        let limit = table.row_count().min(self.options.max_events);
        let chunks = chunk_count(limit, self.options.chunk_size);
        self.emit(ProcessorEvent::FileStarted {
            path: path.to_path_buf(),
            rows: table.row_count(),
            chunks,
        });

        let mut rows_read = 0usize;
        for i in 0..chunks {
            let range = ChunkRange::nth(i, self.options.chunk_size, limit);

            let mut notices = Vec::new();
            let batch = {
                let builder = CollectionBuilder::new(&self.types);
                read_events(&table, &schema, range, &self.not_load, &builder, &mut |n| {
                    notices.push(n)
                })?
            };
            for notice in notices {
                self.notice(path, notice);
            }

            if batch.is_empty() {
                self.emit(ProcessorEvent::FileExhausted {
                    path: path.to_path_buf(),
                    range,
                });
                break;
            }

            rows_read += batch.len();
            self.metrics.on_chunk_read(batch.len());
            self.emit(ProcessorEvent::ChunkRead {
                path: path.to_path_buf(),
                range,
                rows: batch.len(),
            });

            let out = self.transform.apply(batch)?;
            if out.is_empty() || out.field_names().is_empty() {
                drop(out);
                self.metrics.on_chunk_discarded();
                self.emit(ProcessorEvent::ChunkDiscarded {
                    path: path.to_path_buf(),
                    range,
                });
                continue;
            }

            let columns = out.flatten()?;
            let rows = writer.write(columns)?;
            self.metrics.on_chunk_written(rows);
            self.emit(ProcessorEvent::ChunkWritten {
                path: path.to_path_buf(),
                range,
                rows,
            });
        }

        drop(table);
        self.metrics.on_file_finished();
        self.emit(ProcessorEvent::FileFinished {
            path: path.to_path_buf(),
            rows_read,
        });
        Ok(())
    }

    fn notice(&self, path: &Path, notice: Notice) {
        if let Notice::MissingCollectionData { .. } = notice {
            self.metrics.on_collection_dropped();
        }
        self.emit(ProcessorEvent::Notice {
            path: path.to_path_buf(),
            notice,
        });
    }

    fn emit(&self, event: ProcessorEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessorError;
    use crate::events::Collection;
    use crate::sink::MemorySink;
    use crate::source::{MemoryBackend, MemoryTable};
    use crate::types::Array;
    use std::sync::Mutex;

    fn backend(rows: usize) -> MemoryBackend {
        let mut b = MemoryBackend::new();
        b.insert(
            "a",
            MemoryTable::new(vec![
                ("run".into(), Array::from_i64((0..rows as i64).collect())),
                ("Jet_pt".into(), Array::jagged_f64((0..rows).map(|i| vec![i as f64; i % 3]).collect())),
            ])
            .unwrap(),
        );
        b
    }

    fn identity(batch: EventBatch) -> ProcessorResult<EventBatch> {
        Ok(batch)
    }

    #[derive(Default)]
    struct Events(Mutex<Vec<ProcessorEvent>>);

    impl ProcessorObserver for Events {
        fn on_event(&self, event: &ProcessorEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn invalid_options_are_rejected_up_front() {
        let opts = ProcessorOptions::default().with_chunk_size(0);
        assert!(matches!(
            Processor::new(["a"], opts, identity),
            Err(ProcessorError::InvalidOptions { .. })
        ));
    }

    #[test]
    fn mixins_are_merged_into_types() {
        let opts = ProcessorOptions::default().with_mixin("Jet", "Jet");
        let p = Processor::new(["a"], opts, identity)
            .unwrap()
            .with_types(TypeRegistry::new().with_type("Muon", "Muon"));
        assert_eq!(p.types().type_name("Jet"), Some("Jet"));
        assert_eq!(p.types().type_name("Muon"), Some("Muon"));
    }

    #[test]
    fn identity_run_copies_every_row() {
        let b = backend(25);
        let mut sink = MemorySink::new();
        let mut p = Processor::new(["a"], ProcessorOptions::default().with_chunk_size(10), identity).unwrap();
        let summary = p.run(&b, &mut sink).unwrap();

        assert_eq!(summary.metrics.chunks_read, 3);
        assert_eq!(summary.metrics.rows_written, 25);
        assert_eq!(summary.metrics.max_chunk_rows, 10);
        let names: Vec<&str> = summary.schema.as_ref().unwrap().field_names().collect();
        assert_eq!(names, vec!["run", "nJet", "Jet_pt"]);
        assert_eq!(sink.column("run").unwrap(), Array::from_i64((0..25).collect()));
        assert!(sink.is_closed());
    }

    #[test]
    fn events_follow_the_chunk_loop() {
        let b = backend(15);
        let events = Arc::new(Events::default());
        let mut p = Processor::new(
            ["a"],
            ProcessorOptions::default().with_chunk_size(10),
            |batch: EventBatch| -> ProcessorResult<EventBatch> {
                let keep: Vec<bool> = batch.rows().map(|r| r.index() < 5).collect();
                Ok(batch.filter(&keep))
            },
        )
        .unwrap()
        .with_observer(events.clone());
        p.run(&b, MemorySink::new()).unwrap();

        let kinds: Vec<String> = events
            .0
            .lock()
            .unwrap()
            .iter()
            .filter(|e| !matches!(e, ProcessorEvent::Notice { .. }))
            .map(|e| format!("{e:?}").split([' ', '{']).next().unwrap_or_default().to_string())
            .collect();
        assert_eq!(
            kinds,
            vec![
                "RunStarted",
                "FileStarted",
                "ChunkRead",
                "ChunkWritten",
                "ChunkRead",
                "ChunkWritten",
                "FileFinished",
                "RunFinished"
            ]
        );
    }

    #[test]
    fn transform_errors_abort_the_run() {
        let b = backend(30);
        let events = Arc::new(Events::default());
        let mut calls = 0;
        let mut sink = MemorySink::new();
        let mut p = Processor::new(
            ["a"],
            ProcessorOptions::default().with_chunk_size(10),
            |batch: EventBatch| -> ProcessorResult<EventBatch> {
                calls += 1;
                if calls == 2 {
                    return Err(ProcessorError::transform("bad chunk"));
                }
                Ok(batch)
            },
        )
        .unwrap()
        .with_observer(events.clone());

        let err = p.run(&b, &mut sink).unwrap_err();
        assert!(matches!(err, ProcessorError::Transform(_)));
        assert_eq!(sink.row_count(), 10);
        assert!(!sink.is_closed());

        let last = events.0.lock().unwrap().last().cloned().unwrap();
        assert_eq!(last.severity(), Severity::Error);
    }

    #[test]
    fn batch_without_fields_is_discarded() {
        let b = backend(5);
        let mut sink = MemorySink::new();
        let mut p = Processor::new(
            ["a"],
            ProcessorOptions::default(),
            |mut batch: EventBatch| -> ProcessorResult<EventBatch> {
                batch.remove("Jet");
                batch.remove("run");
                Ok(batch)
            },
        )
        .unwrap();
        let summary = p.run(&b, &mut sink).unwrap();
        assert_eq!(summary.metrics.chunks_discarded, 1);
        assert!(summary.schema.is_none());
        assert_eq!(sink.creates(), 0);
    }

    #[test]
    fn derived_fields_are_written() {
        let b = backend(4);
        let mut sink = MemorySink::new();
        let mut p = Processor::new(
            ["a"],
            ProcessorOptions::default(),
            |mut batch: EventBatch| -> ProcessorResult<EventBatch> {
                let n: Vec<i64> = batch.rows().map(|r| r.num("Jet") as i64).collect();
                batch.insert("njets", Collection::Leaf(Array::from_i64(n)))?;
                Ok(batch)
            },
        )
        .unwrap();
        p.run(&b, &mut sink).unwrap();
        assert_eq!(sink.column("njets").unwrap(), Array::from_i64(vec![0, 1, 2, 0]));
    }
}
