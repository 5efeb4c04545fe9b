use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One document of the `system.profile` collection.
///
/// The document is kept as recorded, in its original key order, so
/// diagnostics show the entry exactly as the profiler wrote it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogEntry {
    document: Map<String, Value>,
}

impl LogEntry {
    pub fn from_value(value: Value) -> serde_json::Result<LogEntry> {
        serde_json::from_value(value)
    }

    pub fn document(&self) -> &Map<String, Value> {
        &self.document
    }

    pub fn ns(&self) -> Option<&str> {
        self.document.get("ns")?.as_str()
    }

    pub fn has_query(&self) -> bool {
        !matches!(self.document.get("query"), None | Some(Value::Null))
    }

    pub fn query(&self) -> Option<&Map<String, Value>> {
        self.document.get("query")?.as_object()
    }

    pub fn command(&self) -> Option<&Map<String, Value>> {
        self.document.get("command")?.as_object()
    }

    /// Execution time in milliseconds. Accepts plain numbers and the
    /// `$numberInt` / `$numberLong` / `$numberDouble` wrappers.
    pub fn millis(&self) -> Option<f64> {
        match self.document.get("millis")? {
            Value::Number(n) => n.as_f64(),
            Value::Object(wrapper) if wrapper.len() == 1 => {
                let (key, inner) = wrapper.iter().next()?;
                match key.as_str() {
                    "$numberInt" | "$numberLong" | "$numberDouble" => {
                        inner.as_str()?.parse().ok()
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(&self.document).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let raw = json!({
            "op": "query",
            "ns": "shop.orders",
            "query": {"find": "orders", "filter": {"status": "A"}},
            "millis": 12,
            "ts": {"$date": "2017-09-27T10:00:00Z"},
        });
        let entry = LogEntry::from_value(raw.clone()).unwrap();
        assert_eq!(entry.ns(), Some("shop.orders"));
        assert_eq!(entry.document().get("op"), Some(&json!("query")));
        assert_eq!(serde_json::to_value(&entry).unwrap(), raw);
    }

    #[test]
    fn display_keeps_recorded_key_order() {
        let entry = LogEntry::from_value(json!({
            "op": "query",
            "ts": 1,
            "query": {"b": 1, "a": 2},
            "millis": 4,
            "ns": "shop.orders",
        }))
        .unwrap();
        assert_eq!(
            entry.to_string(),
            r#"{"op":"query","ts":1,"query":{"b":1,"a":2},"millis":4,"ns":"shop.orders"}"#
        );
    }

    #[test]
    fn millis_accepts_extended_json() {
        let plain = LogEntry::from_value(json!({"millis": 7})).unwrap();
        let wrapped = LogEntry::from_value(json!({"millis": {"$numberLong": "250"}})).unwrap();
        let missing = LogEntry::from_value(json!({"ns": "a.b"})).unwrap();
        assert_eq!(plain.millis(), Some(7.0));
        assert_eq!(wrapped.millis(), Some(250.0));
        assert_eq!(missing.millis(), None);
    }

    #[test]
    fn non_document_query_is_not_a_query() {
        let entry = LogEntry::from_value(json!({"query": "weird", "ns": "a.b"})).unwrap();
        assert!(entry.query().is_none());
        assert!(entry.has_query());
    }
}
