use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Deserializer;
use thiserror::Error;

use crate::entry::LogEntry;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid log entry at line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Where profiler entries come from.
pub trait LogSource {
    fn fetch_entries(&self) -> Result<Vec<LogEntry>, SourceError>;
}

/// A `system.profile` export on disk, either a JSON array
/// (`mongoexport --jsonArray`) or one document per line.
#[derive(Debug, Clone)]
pub struct FileLogSource {
    path: PathBuf,
}

impl FileLogSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSource for FileLogSource {
    fn fetch_entries(&self) -> Result<Vec<LogEntry>, SourceError> {
        let contents = fs::read_to_string(&self.path).map_err(|source| SourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        parse_log(&contents)
    }
}

/// Parses a profiler export. Blank lines and lines starting with `#` are
/// ignored.
pub fn parse_log(contents: &str) -> Result<Vec<LogEntry>, SourceError> {
    // comment lines are blanked rather than removed so error lines stay right
    let cleaned = contents
        .lines()
        .map(|line| if line.trim_start().starts_with('#') { "" } else { line })
        .collect::<Vec<_>>()
        .join("\n");
    let parse_error = |source: serde_json::Error| SourceError::Parse {
        line: source.line(),
        source,
    };

    if cleaned.trim_start().starts_with('[') {
        return serde_json::from_str(&cleaned).map_err(parse_error);
    }
    Deserializer::from_str(&cleaned)
        .into_iter::<LogEntry>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(parse_error)
}
