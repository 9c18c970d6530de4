use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::events::{ChunkRange, Notice};

/// Severity classification used for observer callbacks and log filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (the run failed).
    Error,
}

/// Events emitted by the [`crate::execution::Processor`] while it runs.
#[derive(Debug, Clone)]
pub enum ProcessorEvent {
    RunStarted {
        files: usize,
    },
    FileStarted {
        path: PathBuf,
        rows: usize,
        chunks: usize,
    },
    ChunkRead {
        path: PathBuf,
        range: ChunkRange,
        rows: usize,
    },
    /// Non-fatal condition raised while building a chunk.
    Notice {
        path: PathBuf,
        notice: Notice,
    },
    /// The transform left no rows (or no fields); nothing was written.
    ChunkDiscarded {
        path: PathBuf,
        range: ChunkRange,
    },
    ChunkWritten {
        path: PathBuf,
        range: ChunkRange,
        rows: usize,
    },
    /// A chunk came back empty; the rest of the file is skipped.
    FileExhausted {
        path: PathBuf,
        range: ChunkRange,
    },
    FileFinished {
        path: PathBuf,
        rows_read: usize,
    },
    RunFailed {
        message: String,
    },
    RunFinished {
        elapsed: Duration,
        metrics: ProcessorMetricsSnapshot,
    },
}

impl ProcessorEvent {
    pub fn severity(&self) -> Severity {
        match self {
            ProcessorEvent::Notice {
                notice: Notice::MissingCollectionData { .. },
                ..
            } => Severity::Warning,
            ProcessorEvent::RunFailed { .. } => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for ProcessorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessorEvent::RunStarted { files } => write!(f, "run started files={files}"),
            ProcessorEvent::FileStarted { path, rows, chunks } => write!(
                f,
                "file started path={} rows={rows} chunks={chunks}",
                path.display()
            ),
            ProcessorEvent::ChunkRead { path, range, rows } => write!(
                f,
                "chunk read path={} range={}..{} rows={rows}",
                path.display(),
                range.start,
                range.stop
            ),
            ProcessorEvent::Notice { path, notice } => match notice {
                Notice::MissingCollectionData { collection } => write!(
                    f,
                    "no data loaded for collection '{collection}' path={}",
                    path.display()
                ),
                Notice::NoTypeTagRegistered { collection } => write!(
                    f,
                    "no record type registered for collection '{collection}' path={}",
                    path.display()
                ),
            },
            ProcessorEvent::ChunkDiscarded { path, range } => write!(
                f,
                "chunk discarded path={} range={}..{}",
                path.display(),
                range.start,
                range.stop
            ),
            ProcessorEvent::ChunkWritten { path, range, rows } => write!(
                f,
                "chunk written path={} range={}..{} rows={rows}",
                path.display(),
                range.start,
                range.stop
            ),
            ProcessorEvent::FileExhausted { path, range } => write!(
                f,
                "file exhausted path={} at={}",
                path.display(),
                range.start
            ),
            ProcessorEvent::FileFinished { path, rows_read } => write!(
                f,
                "file finished path={} rows_read={rows_read}",
                path.display()
            ),
            ProcessorEvent::RunFailed { message } => write!(f, "run failed err={message}"),
            ProcessorEvent::RunFinished { elapsed, metrics } => {
                write!(f, "run finished elapsed={elapsed:?} {metrics}")
            }
        }
    }
}

/// Observer hook for processor events.
pub trait ProcessorObserver: Send + Sync {
    fn on_event(&self, event: &ProcessorEvent);
}

/// Logs processor events at or above a minimum severity to stderr.
#[derive(Debug)]
pub struct StdErrObserver {
    min_severity: Severity,
}

impl StdErrObserver {
    pub fn new(min_severity: Severity) -> Self {
        Self { min_severity }
    }
}

impl Default for StdErrObserver {
    fn default() -> Self {
        Self::new(Severity::Info)
    }
}

impl ProcessorObserver for StdErrObserver {
    fn on_event(&self, event: &ProcessorEvent) {
        let severity = event.severity();
        if severity >= self.min_severity {
            eprintln!("[events][{severity:?}] {event}");
        }
    }
}

/// Appends processor events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl ProcessorObserver for FileObserver {
    fn on_event(&self, event: &ProcessorEvent) {
        self.append_line(&format!(
            "{} severity={:?} {event}",
            unix_ts(),
            event.severity()
        ));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// An observer that fans out events to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn ProcessorObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn ProcessorObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl ProcessorObserver for CompositeObserver {
    fn on_event(&self, event: &ProcessorEvent) {
        for o in &self.observers {
            o.on_event(event);
        }
    }
}

/// Real-time metrics for a processor run.
///
/// The processor updates these counters as it goes; callers can snapshot them at any time,
/// including from another thread while a run is in progress.
pub struct ProcessorMetrics {
    run_id: AtomicU64,
    elapsed_ns: AtomicU64,

    files_processed: AtomicU64,
    chunks_read: AtomicU64,
    chunks_written: AtomicU64,
    chunks_discarded: AtomicU64,
    rows_read: AtomicU64,
    rows_written: AtomicU64,
    collections_dropped: AtomicU64,

    max_chunk_rows: AtomicUsize,
}

impl ProcessorMetrics {
    pub fn new() -> Self {
        Self {
            run_id: AtomicU64::new(0),
            elapsed_ns: AtomicU64::new(0),
            files_processed: AtomicU64::new(0),
            chunks_read: AtomicU64::new(0),
            chunks_written: AtomicU64::new(0),
            chunks_discarded: AtomicU64::new(0),
            rows_read: AtomicU64::new(0),
            rows_written: AtomicU64::new(0),
            collections_dropped: AtomicU64::new(0),
            max_chunk_rows: AtomicUsize::new(0),
        }
    }

    pub fn begin_run(&self) {
        let _ = self.run_id.fetch_add(1, Ordering::SeqCst);

        self.elapsed_ns.store(0, Ordering::SeqCst);
        self.files_processed.store(0, Ordering::SeqCst);
        self.chunks_read.store(0, Ordering::SeqCst);
        self.chunks_written.store(0, Ordering::SeqCst);
        self.chunks_discarded.store(0, Ordering::SeqCst);
        self.rows_read.store(0, Ordering::SeqCst);
        self.rows_written.store(0, Ordering::SeqCst);
        self.collections_dropped.store(0, Ordering::SeqCst);
        self.max_chunk_rows.store(0, Ordering::SeqCst);
    }

    pub fn end_run(&self, elapsed: Duration) {
        self.elapsed_ns
            .store(elapsed.as_nanos().min(u64::MAX as u128) as u64, Ordering::SeqCst);
    }

    pub fn on_file_finished(&self) {
        let _ = self.files_processed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_chunk_read(&self, rows: usize) {
        let _ = self.chunks_read.fetch_add(1, Ordering::SeqCst);
        let _ = self.rows_read.fetch_add(rows as u64, Ordering::SeqCst);
        let _ = self.max_chunk_rows.fetch_max(rows, Ordering::SeqCst);
    }

    pub fn on_chunk_written(&self, rows: usize) {
        let _ = self.chunks_written.fetch_add(1, Ordering::SeqCst);
        let _ = self.rows_written.fetch_add(rows as u64, Ordering::SeqCst);
    }

    pub fn on_chunk_discarded(&self) {
        let _ = self.chunks_discarded.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_collection_dropped(&self) {
        let _ = self.collections_dropped.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ProcessorMetricsSnapshot {
        let elapsed_ns = self.elapsed_ns.load(Ordering::SeqCst);
        let elapsed = if elapsed_ns > 0 {
            Some(Duration::from_nanos(elapsed_ns))
        } else {
            None
        };

        ProcessorMetricsSnapshot {
            run_id: self.run_id.load(Ordering::SeqCst),
            elapsed,
            files_processed: self.files_processed.load(Ordering::SeqCst),
            chunks_read: self.chunks_read.load(Ordering::SeqCst),
            chunks_written: self.chunks_written.load(Ordering::SeqCst),
            chunks_discarded: self.chunks_discarded.load(Ordering::SeqCst),
            rows_read: self.rows_read.load(Ordering::SeqCst),
            rows_written: self.rows_written.load(Ordering::SeqCst),
            collections_dropped: self.collections_dropped.load(Ordering::SeqCst),
            max_chunk_rows: self.max_chunk_rows.load(Ordering::SeqCst),
        }
    }
}

impl Default for ProcessorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProcessorMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProcessorMetrics").field(&self.snapshot()).finish()
    }
}

/// Immutable snapshot of [`ProcessorMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorMetricsSnapshot {
    pub run_id: u64,
    pub elapsed: Option<Duration>,
    pub files_processed: u64,
    pub chunks_read: u64,
    pub chunks_written: u64,
    pub chunks_discarded: u64,
    pub rows_read: u64,
    pub rows_written: u64,
    pub collections_dropped: u64,
    pub max_chunk_rows: usize,
}

impl fmt::Display for ProcessorMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_id={}, files={}, chunks read/written/discarded={}/{}/{}, rows read/written={}/{}, collections_dropped={}, max_chunk_rows={}, elapsed={:?}",
            self.run_id,
            self.files_processed,
            self.chunks_read,
            self.chunks_written,
            self.chunks_discarded,
            self.rows_read,
            self.rows_written,
            self.collections_dropped,
            self.max_chunk_rows,
            self.elapsed
        )
    }
}
