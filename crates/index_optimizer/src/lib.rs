//! Recommends MongoDB indexes from `system.profile` entries.
//!
//! Each entry is translated into a candidate index (equality columns, then
//! sort columns, then range columns) and offered to the index set of its
//! collection, which keeps it only when no retained index already serves the
//! same access pattern. The retained sets render as a `createIndex` script.

mod collection;
mod entry;
mod filter;
mod index;
mod pipeline;
mod sort;
mod source;
mod stats;
mod translate;

pub use collection::{AddOutcome, CollectionIndexSet, RejectReason};
pub use entry::LogEntry;
pub use filter::{classify, FilterColumns, OperatorClass};
pub use index::{Direction, Index, IndexError};
pub use pipeline::{optimize, OptimizeError, Optimizer, RunSummary};
pub use sort::{parse_sort, SortColumns};
pub use source::{parse_log, FileLogSource, LogSource, SourceError};
pub use stats::{summarize, QueryStats};
pub use translate::{merge_columns, translate, QueryShape, TranslateError};
