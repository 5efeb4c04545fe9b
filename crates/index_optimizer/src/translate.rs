use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::entry::LogEntry;
use crate::filter::{classify, FilterColumns};
use crate::index::{Direction, Index, IndexError};
use crate::sort::{parse_sort, SortColumns};

const COMMAND_NAMESPACE: &str = "$cmd";

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("log entry shape is not supported: {0}")]
    Unrecognized(String),
    #[error("could not find a collection name in log entry: {0}")]
    MissingCollection(String),
    #[error("aggregation on {collection} has no $match stage")]
    NoMatchStage { collection: String },
    #[error("query on {collection} has no filter or sort columns")]
    NoColumns { collection: String },
    #[error("invalid index: {0}")]
    InvalidIndex(#[from] IndexError),
}

/// The kind of operation a log entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryShape {
    MapReduce,
    Aggregation,
    /// `find`, `count` and `findAndModify`.
    Find,
}

impl QueryShape {
    pub fn of(entry: &LogEntry) -> Option<QueryShape> {
        let command = entry.command();
        let has = |names: &[&str]| {
            command.is_some_and(|c| names.iter().any(|name| is_set(c.get(*name))))
        };

        if has(&["mapreduce", "mapReduce"]) {
            Some(QueryShape::MapReduce)
        } else if has(&["aggregate"]) {
            Some(QueryShape::Aggregation)
        } else if (entry.has_query() && entry.ns().is_some())
            || has(&["find", "count", "findandmodify", "findAndModify"])
        {
            Some(QueryShape::Find)
        } else {
            None
        }
    }
}

/// Turns one profiler entry into the index that would serve it.
pub fn translate(entry: &LogEntry) -> Result<Index, TranslateError> {
    match QueryShape::of(entry) {
        Some(QueryShape::MapReduce) => translate_map_reduce(entry),
        Some(QueryShape::Aggregation) => translate_aggregation(entry),
        Some(QueryShape::Find) => translate_find(entry),
        None => Err(TranslateError::Unrecognized(entry.to_string())),
    }
}

fn translate_map_reduce(entry: &LogEntry) -> Result<Index, TranslateError> {
    let command = entry.command();
    let collection = command
        .and_then(|c| string_field(c, &["mapreduce", "mapReduce"]))
        .ok_or_else(|| TranslateError::MissingCollection(entry.to_string()))?;

    let filter = command
        .and_then(|c| document(c.get("query")))
        .map(classify)
        .unwrap_or_default();
    let sort = command
        .and_then(|c| document(c.get("sort")))
        .map(parse_sort)
        .unwrap_or_default();
    merge_columns(collection, &filter, &sort)
}

/// Only the first `$match` stage is considered. Later stages, including
/// `$sort`, do not contribute columns.
fn translate_aggregation(entry: &LogEntry) -> Result<Index, TranslateError> {
    let command = entry.command();
    let collection = command
        .and_then(|c| string_field(c, &["aggregate"]))
        .ok_or_else(|| TranslateError::MissingCollection(entry.to_string()))?;

    let first_match = command
        .and_then(|c| c.get("pipeline"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .find_map(|stage| document(stage.get("$match")))
        .ok_or_else(|| TranslateError::NoMatchStage {
            collection: collection.to_string(),
        })?;

    let filter = classify(first_match);
    let mut columns = Vec::new();
    for column in filter.equality.iter().chain(&filter.range) {
        if !columns.contains(column) {
            columns.push(column.clone());
        }
    }
    if columns.is_empty() {
        return Err(TranslateError::NoColumns {
            collection: collection.to_string(),
        });
    }
    let directions = vec![Direction::Ascending; columns.len()];
    Ok(Index::new(
        collection,
        columns,
        directions,
        0..filter.equality.len(),
    )?)
}

fn translate_find(entry: &LogEntry) -> Result<Index, TranslateError> {
    let collection = find_collection(entry)
        .ok_or_else(|| TranslateError::MissingCollection(entry.to_string()))?;
    if collection == COMMAND_NAMESPACE {
        warn!(collection, entry = %entry, "collection name resolved to a command namespace");
    }

    let filter = find_filter(entry).map(classify).unwrap_or_default();
    let sort = find_sort(entry).map(parse_sort).unwrap_or_default();
    merge_columns(collection, &filter, &sort)
}

/// Collection name from the explicit `find` / `count` / `findAndModify`
/// target, falling back to the last segment of the namespace.
fn find_collection(entry: &LogEntry) -> Option<&str> {
    let explicit = entry
        .query()
        .and_then(|q| string_field(q, &["find"]))
        .or_else(|| {
            entry.command().and_then(|c| {
                string_field(c, &["count", "findandmodify", "findAndModify", "find"])
            })
        });
    let collection = match explicit {
        Some(collection) => collection,
        None => entry.ns()?.rsplit('.').next()?,
    };
    if collection.is_empty() {
        return None;
    }
    Some(collection)
}

fn find_filter(entry: &LogEntry) -> Option<&Map<String, Value>> {
    if let Some(query) = entry.query() {
        if let Some(filter) = document(query.get("filter")).or(document(query.get("$query"))) {
            return Some(filter);
        }
        // a command-form query without a filter matches everything
        if query.contains_key("find") {
            return None;
        }
        return Some(query);
    }
    let command = entry.command()?;
    document(command.get("query")).or(document(command.get("filter")))
}

fn find_sort(entry: &LogEntry) -> Option<&Map<String, Value>> {
    match entry.query() {
        Some(query) => document(query.get("sort")).or(document(query.get("$orderby"))),
        None => document(entry.command()?.get("sort")),
    }
}

/// Builds the index serving a query: equality columns first, then sort
/// columns in their declared directions, then range columns.
///
/// Equality columns are flippable. Range columns appended after the sort
/// columns are flippable too. Without any filter column every position is
/// flippable, since a sort-only index can be scanned both ways.
pub fn merge_columns(
    collection: &str,
    filter: &FilterColumns,
    sort: &SortColumns,
) -> Result<Index, TranslateError> {
    let mut columns: Vec<String> = filter.equality.iter().cloned().collect();
    let mut directions = vec![Direction::Ascending; columns.len()];
    let mut flippable: Vec<usize> = (0..columns.len()).collect();

    for (column, direction) in sort.columns.iter().zip(&sort.directions) {
        if !columns.contains(column) {
            columns.push(column.clone());
            directions.push(*direction);
        }
    }
    for column in &filter.range {
        if !columns.contains(column) {
            flippable.push(columns.len());
            columns.push(column.clone());
            directions.push(Direction::Ascending);
        }
    }

    if columns.is_empty() {
        return Err(TranslateError::NoColumns {
            collection: collection.to_string(),
        });
    }
    if filter.is_empty() {
        flippable = (0..columns.len()).collect();
    }
    Ok(Index::new(collection, columns, directions, flippable)?)
}

fn is_set(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(_) => true,
    }
}

fn string_field<'a>(doc: &'a Map<String, Value>, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .find_map(|name| doc.get(*name).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

fn document(value: Option<&Value>) -> Option<&Map<String, Value>> {
    value?.as_object()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(value: Value) -> LogEntry {
        LogEntry::from_value(value).unwrap()
    }

    fn keys(index: &Index) -> Vec<(String, i32)> {
        index
            .columns()
            .iter()
            .cloned()
            .zip(index.directions().iter().map(|d| d.as_i32()))
            .collect()
    }

    fn flippable(index: &Index) -> Vec<usize> {
        index.flippable().iter().copied().collect()
    }

    fn pairs(keys: &[(&str, i32)]) -> Vec<(String, i32)> {
        keys.iter().map(|(c, d)| (c.to_string(), *d)).collect()
    }

    #[test]
    fn find_orders_equality_then_sort_then_range() {
        let index = translate(&entry(json!({
            "ns": "shop.orders",
            "query": {
                "find": "orders",
                "filter": {"status": "A", "total": {"$gt": 100}},
                "sort": {"createdAt": -1},
            },
            "millis": 120,
        })))
        .unwrap();

        assert_eq!(index.collection(), "orders");
        assert_eq!(
            keys(&index),
            pairs(&[("status", 1), ("createdAt", -1), ("total", 1)])
        );
        assert_eq!(flippable(&index), vec![0, 2]);
    }

    #[test]
    fn sort_only_query_is_flippable_everywhere() {
        let index = translate(&entry(json!({
            "ns": "shop.orders",
            "query": {"find": "orders", "filter": {}, "sort": {"a": 1, "b": -1}},
        })))
        .unwrap();
        assert_eq!(keys(&index), pairs(&[("a", 1), ("b", -1)]));
        assert_eq!(flippable(&index), vec![0, 1]);
    }

    #[test]
    fn range_positions_skip_columns_already_placed() {
        let index = translate(&entry(json!({
            "ns": "shop.orders",
            "query": {
                "filter": {"a": 1, "b": {"$lt": 3}, "c": {"$gte": 1}},
                "sort": {"a": 1, "b": -1},
            },
        })))
        .unwrap();
        assert_eq!(keys(&index), pairs(&[("a", 1), ("b", -1), ("c", 1)]));
        assert_eq!(flippable(&index), vec![0, 2]);
    }

    #[test]
    fn legacy_query_wrappers_and_namespace_fallback() {
        let index = translate(&entry(json!({
            "ns": "crm.contacts",
            "query": {"$query": {"imei": "123"}, "$orderby": {"lastName": -1}},
        })))
        .unwrap();
        assert_eq!(index.collection(), "contacts");
        assert_eq!(keys(&index), pairs(&[("imei", 1), ("lastName", -1)]));

        let raw = translate(&entry(json!({
            "ns": "crm.contacts",
            "query": {"lastName": "Smith"},
        })))
        .unwrap();
        assert_eq!(keys(&raw), pairs(&[("lastName", 1)]));
    }

    #[test]
    fn count_and_find_and_modify_commands() {
        let count = translate(&entry(json!({
            "ns": "crm.$cmd",
            "command": {"count": "contacts", "query": {"city": "Haifa"}},
        })))
        .unwrap();
        assert_eq!(count.collection(), "contacts");
        assert_eq!(keys(&count), pairs(&[("city", 1)]));

        let modify = translate(&entry(json!({
            "ns": "crm.$cmd",
            "command": {
                "findAndModify": "jobs",
                "query": {"state": "queued"},
                "sort": {"priority": -1},
            },
        })))
        .unwrap();
        assert_eq!(modify.collection(), "jobs");
        assert_eq!(keys(&modify), pairs(&[("state", 1), ("priority", -1)]));
    }

    #[test]
    fn modern_find_command() {
        let index = translate(&entry(json!({
            "ns": "shop.orders",
            "command": {"find": "orders", "filter": {"user": {"$oid": "5a0c4d6e2f8fb814b56fa181"}}},
        })))
        .unwrap();
        assert_eq!(keys(&index), pairs(&[("user", 1)]));
    }

    #[test]
    fn map_reduce_uses_command_query_and_sort() {
        let index = translate(&entry(json!({
            "ns": "shop.$cmd",
            "command": {
                "mapreduce": "orders",
                "query": {"status": "A", "day": {"$gte": 3}},
                "sort": {"user": 1},
            },
        })))
        .unwrap();
        assert_eq!(index.collection(), "orders");
        assert_eq!(
            keys(&index),
            pairs(&[("status", 1), ("user", 1), ("day", 1)])
        );
        assert_eq!(flippable(&index), vec![0, 2]);
    }

    #[test]
    fn aggregation_reads_the_first_match_stage_only() {
        let index = translate(&entry(json!({
            "ns": "shop.$cmd",
            "command": {
                "aggregate": "orders",
                "pipeline": [
                    {"$project": {"status": 1}},
                    {"$match": {"status": "A", "total": {"$gt": 5}}},
                    {"$sort": {"createdAt": -1}},
                    {"$match": {"other": 1}},
                ],
            },
        })))
        .unwrap();
        assert_eq!(index.collection(), "orders");
        assert_eq!(keys(&index), pairs(&[("status", 1), ("total", 1)]));
        assert_eq!(flippable(&index), vec![0]);
    }

    #[test]
    fn aggregation_without_match_is_skipped() {
        let err = translate(&entry(json!({
            "command": {"aggregate": "orders", "pipeline": [{"$group": {"_id": "$user"}}]},
        })))
        .unwrap_err();
        assert!(matches!(err, TranslateError::NoMatchStage { .. }));
    }

    #[test]
    fn unrecognized_entry_is_rejected() {
        let err = translate(&entry(json!({"op": "insert", "millis": 3}))).unwrap_err();
        assert!(matches!(err, TranslateError::Unrecognized(raw) if raw.contains("insert")));
    }

    #[test]
    fn empty_filter_without_sort_has_no_columns() {
        let err = translate(&entry(json!({
            "ns": "shop.orders",
            "query": {"find": "orders"},
        })))
        .unwrap_err();
        assert!(matches!(err, TranslateError::NoColumns { collection } if collection == "orders"));
    }

    #[test]
    fn missing_collection_is_rejected() {
        let err = translate(&entry(json!({
            "ns": "shop.",
            "query": {"status": "A"},
        })))
        .unwrap_err();
        assert!(matches!(err, TranslateError::MissingCollection(_)));
    }

    #[test]
    fn command_namespace_is_still_translated() {
        let index = translate(&entry(json!({
            "ns": "shop.$cmd",
            "query": {"a": 1},
        })))
        .unwrap();
        assert_eq!(index.collection(), "$cmd");
        assert_eq!(keys(&index), pairs(&[("a", 1)]));
    }

    #[test]
    fn column_in_both_equality_and_range_is_placed_once() {
        let index = translate(&entry(json!({
            "ns": "shop.orders",
            "query": {
                "filter": {"a": 1, "$or": [{"a": {"$gt": 0}}, {"b": {"$lt": 3}}]},
            },
        })))
        .unwrap();
        assert_eq!(keys(&index), pairs(&[("a", 1), ("b", 1)]));
        assert_eq!(flippable(&index), vec![0, 1]);
    }
}
