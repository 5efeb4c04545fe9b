use indexmap::IndexMap;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::collection::{AddOutcome, CollectionIndexSet, RejectReason};
use crate::entry::LogEntry;
use crate::index::IndexError;
use crate::translate::{translate, TranslateError};

#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("log entry produced an invalid index: {0}")]
    InvalidIndex(#[from] IndexError),
    #[error("index was rejected by its own collection: {0}")]
    Rejected(#[from] RejectReason),
}

/// Counters for one optimizer run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub entries: usize,
    pub skipped: usize,
    pub created: usize,
}

/// Folds profiler entries into per-collection index sets.
///
/// Decisions are made online, entry by entry, so the same entries in a
/// different order can leave a different (still non-redundant) set behind.
#[derive(Debug, Default)]
pub struct Optimizer {
    collections: IndexMap<String, CollectionIndexSet>,
    index_options: Map<String, Value>,
    slow_ms: Option<f64>,
    summary: RunSummary,
}

impl Optimizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options rendered with every index, e.g. `{"background": true}`.
    pub fn with_index_options(mut self, options: Map<String, Value>) -> Self {
        self.index_options = options;
        self
    }

    /// Ignores entries that ran faster than `millis`.
    pub fn with_slow_ms(mut self, millis: u64) -> Self {
        self.slow_ms = (millis > 0).then_some(millis as f64);
        self
    }

    /// Offers one entry to the optimizer. Entries that cannot be translated
    /// are logged and skipped; `Ok(None)` is returned for them.
    pub fn process(&mut self, entry: &LogEntry) -> Result<Option<AddOutcome>, OptimizeError> {
        self.summary.entries += 1;

        if let (Some(threshold), Some(millis)) = (self.slow_ms, entry.millis()) {
            if millis < threshold {
                debug!(millis, threshold, "entry below slow threshold, skipping");
                self.summary.skipped += 1;
                return Ok(None);
            }
        }

        let mut candidate = match translate(entry) {
            Ok(candidate) => candidate,
            Err(TranslateError::InvalidIndex(err)) => return Err(err.into()),
            Err(err) => {
                warn!(error = %err, "failed to convert log entry to an index, skipping");
                self.summary.skipped += 1;
                return Ok(None);
            }
        };
        if !self.index_options.is_empty() {
            candidate.set_options(self.index_options.clone());
        }

        let name = candidate.collection().to_string();
        debug!(collection = %name, index = %candidate, "offering index");
        let outcome = self
            .collections
            .entry(name.clone())
            .or_insert_with(|| CollectionIndexSet::new(name.as_str()))
            .add_index(candidate)?;
        debug!(collection = %name, %outcome, "index offered");

        if outcome.created() {
            self.summary.created += 1;
        }
        Ok(Some(outcome))
    }

    pub fn process_all<'a>(
        &mut self,
        entries: impl IntoIterator<Item = &'a LogEntry>,
    ) -> Result<(), OptimizeError> {
        for entry in entries {
            self.process(entry)?;
        }
        Ok(())
    }

    /// Retained index sets, in the order their collections were first seen.
    pub fn collections(&self) -> impl Iterator<Item = &CollectionIndexSet> {
        self.collections.values()
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionIndexSet> {
        self.collections.get(name)
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// One `createIndex` statement per retained index, each newline-terminated.
    pub fn script(&self) -> String {
        let mut out = String::new();
        for index in self.collections().flat_map(CollectionIndexSet::indices) {
            out.push_str(&index.create_statement());
            out.push('\n');
        }
        out
    }
}

/// Runs a fresh optimizer over `entries` and renders the resulting script.
pub fn optimize<'a>(
    entries: impl IntoIterator<Item = &'a LogEntry>,
) -> Result<String, OptimizeError> {
    let mut optimizer = Optimizer::new();
    optimizer.process_all(entries)?;
    Ok(optimizer.script())
}
