use indexmap::IndexSet;
use serde_json::{Map, Value};
use tracing::warn;

const EQUALITY_COMPARISON_OPERATORS: &[&str] = &["$eq", "$ne", "$in", "$nin"];
const RANGE_COMPARISON_OPERATORS: &[&str] = &["$gt", "$gte", "$lt", "$lte"];
const LOGICAL_OPERATORS: &[&str] = &["$and", "$not", "$nor", "$or"];
const ELEMENT_OPERATORS: &[&str] = &["$exists", "$type"];
const EVALUATION_OPERATORS: &[&str] = &["$mod", "$regex", "$text", "$where"];
const ARRAY_SIZE_OPERATORS: &[&str] = &["$size"];
const BITWISE_OPERATORS: &[&str] = &[
    "$bitsAllClear",
    "$bitsAllSet",
    "$bitsAnyClear",
    "$bitsAnySet",
];
const GEOSPATIAL_OPERATORS: &[&str] = &["$geoIntersects", "$geoWithin", "$near", "$nearSphere"];
const PROJECTION_OPERATORS: &[&str] = &["$", "$meta", "$slice"];

/// Extended JSON wrappers for values that always match by equality.
const SIMPLE_EQUALITY_TYPES: &[&str] = &[
    "$oid",
    "$date",
    "$timestamp",
    "$numberLong",
    "$numberInt",
    "$numberDouble",
    "$numberDecimal",
    "$binary",
    "$uuid",
];
const REGEX_TYPES: &[&str] = &["$regularExpression"];

const EQUALITY_OPERATOR_GROUPS: &[&[&str]] = &[
    EQUALITY_COMPARISON_OPERATORS,
    ELEMENT_OPERATORS,
    EVALUATION_OPERATORS,
    ARRAY_SIZE_OPERATORS,
    BITWISE_OPERATORS,
    GEOSPATIAL_OPERATORS,
    PROJECTION_OPERATORS,
];

/// How an operator touches the column it is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorClass {
    /// Point lookups, and everything not usefully range-optimizable.
    Equality,
    /// `$gt`, `$gte`, `$lt`, `$lte`.
    Range,
    /// `$and`, `$or`, `$nor`, `$not` over sub-expressions.
    Logical,
}

impl OperatorClass {
    pub fn of(operator: &str) -> Option<OperatorClass> {
        if EQUALITY_OPERATOR_GROUPS
            .iter()
            .any(|group| group.contains(&operator))
        {
            Some(OperatorClass::Equality)
        } else if RANGE_COMPARISON_OPERATORS.contains(&operator) {
            Some(OperatorClass::Range)
        } else if LOGICAL_OPERATORS.contains(&operator) {
            Some(OperatorClass::Logical)
        } else {
            None
        }
    }
}

/// Columns of a filter, split by how they are matched, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterColumns {
    pub equality: IndexSet<String>,
    pub range: IndexSet<String>,
}

impl FilterColumns {
    pub fn is_empty(&self) -> bool {
        self.equality.is_empty() && self.range.is_empty()
    }
}

enum FilterValue<'a> {
    Scalar,
    Regex,
    Typed,
    Operator(OperatorClass),
    Logical(&'a [Value]),
    Document,
    Unsupported(&'static str),
}

impl<'a> FilterValue<'a> {
    fn of(key: &str, value: &'a Value) -> FilterValue<'a> {
        if OperatorClass::of(key) == Some(OperatorClass::Logical) {
            return match value {
                Value::Array(clauses) => FilterValue::Logical(clauses),
                _ => FilterValue::Unsupported("logical operator without an array of clauses"),
            };
        }
        if key.starts_with('$') {
            return FilterValue::Unsupported("operator in column position");
        }

        let Value::Object(object) = value else {
            return match value {
                // arrays match as a whole value
                Value::Array(_) => FilterValue::Document,
                _ => FilterValue::Scalar,
            };
        };
        let Some(first) = object.keys().next().map(String::as_str) else {
            return FilterValue::Document;
        };
        match OperatorClass::of(first) {
            Some(OperatorClass::Equality) => FilterValue::Operator(OperatorClass::Equality),
            Some(OperatorClass::Range) => FilterValue::Operator(OperatorClass::Range),
            _ if SIMPLE_EQUALITY_TYPES.contains(&first) => FilterValue::Typed,
            _ if REGEX_TYPES.contains(&first) => FilterValue::Regex,
            _ => FilterValue::Document,
        }
    }
}

/// Splits the columns of a query filter into equality and range columns,
/// descending into `$and` / `$or` / `$nor` / `$not` clauses.
pub fn classify(filter: &Map<String, Value>) -> FilterColumns {
    let mut columns = FilterColumns::default();
    classify_into(filter, &mut columns);
    columns
}

fn classify_into(filter: &Map<String, Value>, out: &mut FilterColumns) {
    for (key, value) in filter {
        match FilterValue::of(key, value) {
            FilterValue::Scalar
            | FilterValue::Regex
            | FilterValue::Typed
            | FilterValue::Operator(OperatorClass::Equality)
            | FilterValue::Document => {
                out.equality.insert(key.clone());
            }
            FilterValue::Operator(_) => {
                out.range.insert(key.clone());
            }
            FilterValue::Logical(clauses) => {
                for clause in clauses {
                    match clause {
                        Value::Object(clause) => classify_into(clause, out),
                        other => warn!(
                            operator = %key,
                            clause = %other,
                            "unsupported logical clause, ignoring"
                        ),
                    }
                }
            }
            FilterValue::Unsupported(reason) => {
                warn!(key = %key, value = %value, reason, "unexpected filter entry, ignoring");
            }
        }
    }
}
