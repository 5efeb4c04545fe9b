use std::fmt;

use crate::entry::LogEntry;

/// Timing summary of a profiler log. Entries without a positive `millis`
/// are not counted.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryStats<'a> {
    pub count: usize,
    pub total_millis: f64,
    pub max_millis: Option<f64>,
    pub slowest: Option<&'a LogEntry>,
}

impl QueryStats<'_> {
    pub fn average_millis(&self) -> Option<f64> {
        (self.count > 0).then(|| self.total_millis / self.count as f64)
    }
}

pub fn summarize<'a>(entries: impl IntoIterator<Item = &'a LogEntry>) -> QueryStats<'a> {
    let mut stats = QueryStats {
        count: 0,
        total_millis: 0.0,
        max_millis: None,
        slowest: None,
    };
    for entry in entries {
        let Some(millis) = entry.millis().filter(|m| *m > 0.0) else {
            continue;
        };
        stats.count += 1;
        stats.total_millis += millis;
        if stats.max_millis.is_none_or(|max| millis > max) {
            stats.max_millis = Some(millis);
            stats.slowest = Some(entry);
        }
    }
    stats
}

impl fmt::Display for QueryStats<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Queries analyzed: {}", self.count)?;
        match self.average_millis() {
            Some(avg) => writeln!(f, "Average query time: {avg}")?,
            None => writeln!(f, "Average query time: n/a")?,
        }
        match self.max_millis {
            Some(max) => writeln!(f, "Max query runtime: {max}")?,
            None => writeln!(f, "Max query runtime: n/a")?,
        }
        match self.slowest {
            Some(entry) => write!(f, "Max query: {entry}"),
            None => write!(f, "Max query: n/a"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(millis: serde_json::Value, ns: &str) -> LogEntry {
        LogEntry::from_value(json!({"ns": ns, "millis": millis})).unwrap()
    }

    #[test]
    fn count_average_and_slowest() {
        let log = vec![
            entry(json!(10), "a.one"),
            entry(json!(0), "a.zero"),
            entry(json!(30), "a.slow"),
            entry(json!(20), "a.two"),
            entry(json!(30), "a.tie"),
        ];
        let stats = summarize(&log);
        assert_eq!(stats.count, 4);
        assert_eq!(stats.average_millis(), Some(22.5));
        assert_eq!(stats.max_millis, Some(30.0));
        assert_eq!(stats.slowest.and_then(|e| e.ns()), Some("a.slow"));
    }

    #[test]
    fn report_format() {
        let log = vec![entry(json!(4), "a.b"), entry(json!(8), "a.c")];
        assert_eq!(
            summarize(&log).to_string(),
            "Queries analyzed: 2\n\
             Average query time: 6\n\
             Max query runtime: 8\n\
             Max query: {\"ns\":\"a.c\",\"millis\":8}"
        );
    }

    #[test]
    fn empty_log() {
        let stats = summarize(&[]);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.average_millis(), None);
        assert!(stats.to_string().ends_with("Max query: n/a"));
    }
}
