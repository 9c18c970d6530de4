use std::error::Error as StdError;

use thiserror::Error;

/// Convenience result type for processor operations.
pub type ProcessorResult<T> = Result<T, ProcessorError>;

/// Error type returned by the processor and its collaborators.
///
/// Every variant is fatal for a run. Recoverable conditions (a collection filtered down to
/// nothing, a collection without a registered type tag) are reported as
/// [`crate::events::Notice`]s instead.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Parquet read/write error from the storage backend or the output sink.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Configuration could not be decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An input path pattern is not a valid glob.
    #[error("glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// Failure raised by the caller-supplied transform.
    #[error("transform failed: {0}")]
    Transform(Box<dyn StdError + Send + Sync>),

    /// A later write carried a different column set (or types) than the first write.
    #[error(
        "output schema mismatch on extend: missing={missing:?} unexpected={unexpected:?} retyped={retyped:?}"
    )]
    SchemaMismatchOnExtend {
        missing: Vec<String>,
        unexpected: Vec<String>,
        retyped: Vec<String>,
    },

    /// A batch member does not have the batch's row count.
    #[error("collection '{collection}' has {found} rows, expected {expected}")]
    RowCountMismatch {
        collection: String,
        expected: usize,
        found: usize,
    },

    /// Fields of a jagged collection disagree on the number of objects in a row.
    #[error("collection '{collection}' field '{field}' has {found} objects at row {row}, expected {expected}")]
    JaggedLengthMismatch {
        collection: String,
        field: String,
        row: usize,
        expected: usize,
        found: usize,
    },

    /// A column was requested that the table does not have.
    #[error("unknown column '{name}'")]
    UnknownColumn { name: String },

    /// A column exists but cannot be represented or written.
    #[error("unsupported column '{name}': {message}")]
    UnsupportedColumn { name: String, message: String },

    /// The same column name appears twice in one write or batch.
    #[error("duplicate column '{name}'")]
    DuplicateColumn { name: String },

    /// A behavior method was called that is not registered for the record type.
    #[error("no method '{method}' registered for record type '{record_type}'")]
    UnknownMethod { record_type: String, method: String },

    /// Processor options failed validation.
    #[error("invalid options: {message}")]
    InvalidOptions { message: String },
}

impl ProcessorError {
    /// Wrap an arbitrary error raised inside a transform.
    pub fn transform(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Transform(err.into())
    }
}
