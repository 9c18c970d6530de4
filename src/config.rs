//! Processor configuration.
//!
//! [`ProcessorOptions`] can be built in code (start from [`Default`]) or decoded from JSON.
//! Missing JSON keys take their default values:
//!
//! ```json
//! {
//!   "not_load": ["HLT_*", "Jet_btag*"],
//!   "chunk_size": 50000,
//!   "max_events": 1000000,
//!   "output_table": "Events",
//!   "mixins": { "Jet": "Jet", "MET": "MissingET" }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ProcessorError, ProcessorResult};

/// Default number of rows per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

/// Default cap on rows read from each source file.
pub const DEFAULT_MAX_EVENTS: usize = 10_000_000;

/// Default output table name.
pub const DEFAULT_OUTPUT_TABLE: &str = "Events";

/// Options controlling a processor run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessorOptions {
    /// Collections or `collection_field` names to skip, exact or glob.
    pub not_load: Vec<String>,
    /// Rows read per chunk. Bounds the rows held in memory at once.
    pub chunk_size: usize,
    /// Rows read from each file at most.
    pub max_events: usize,
    /// Name of the output table.
    pub output_table: String,
    /// Collection → record type name, merged into the processor's type registry.
    pub mixins: BTreeMap<String, String>,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            not_load: Vec::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_events: DEFAULT_MAX_EVENTS,
            output_table: DEFAULT_OUTPUT_TABLE.to_string(),
            mixins: BTreeMap::new(),
        }
    }
}

impl ProcessorOptions {
    /// Decode options from a JSON document.
    pub fn from_json_str(json: &str) -> ProcessorResult<Self> {
        let opts: Self = serde_json::from_str(json)?;
        opts.validate()?;
        Ok(opts)
    }

    /// Read and decode a JSON options file.
    pub fn from_json_path(path: impl AsRef<Path>) -> ProcessorResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_max_events(mut self, max_events: usize) -> Self {
        self.max_events = max_events;
        self
    }

    pub fn with_not_load<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.not_load = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_output_table(mut self, name: impl Into<String>) -> Self {
        self.output_table = name.into();
        self
    }

    pub fn with_mixin(mut self, collection: impl Into<String>, record_type: impl Into<String>) -> Self {
        self.mixins.insert(collection.into(), record_type.into());
        self
    }

    /// Check option values.
    pub fn validate(&self) -> ProcessorResult<()> {
        if self.chunk_size == 0 {
            return Err(invalid("chunk_size must be > 0"));
        }
        if self.max_events == 0 {
            return Err(invalid("max_events must be > 0"));
        }
        if self.output_table.trim().is_empty() {
            return Err(invalid("output_table must not be empty"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> ProcessorError {
    ProcessorError::InvalidOptions {
        message: message.to_string(),
    }
}
