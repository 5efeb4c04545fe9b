use serde_json::{Map, Value};
use tracing::warn;

use crate::index::Direction;

/// Sort columns with their declared directions, in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortColumns {
    pub columns: Vec<String>,
    pub directions: Vec<Direction>,
}

impl SortColumns {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn push(&mut self, column: &str, direction: Direction) {
        self.columns.push(column.to_string());
        self.directions.push(direction);
    }
}

/// Parses a sort document such as `{"createdAt": -1, "name": 1}`.
///
/// Keys whose value is not a usable direction (`{"$meta": "textScore"}`,
/// a zero, a bare string) are skipped.
pub fn parse_sort(sort: &Map<String, Value>) -> SortColumns {
    let mut result = SortColumns::default();
    for (column, value) in sort {
        match direction_of(value) {
            Some(direction) => result.push(column, direction),
            None => warn!(column = %column, value = %value, "unsupported sort direction, ignoring"),
        }
    }
    result
}

fn direction_of(value: &Value) -> Option<Direction> {
    match value {
        Value::Number(n) => sign(n.as_f64()?),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(Direction::Ascending),
            "desc" | "descending" => Some(Direction::Descending),
            _ => None,
        },
        Value::Object(wrapper) if wrapper.len() == 1 => {
            let (key, inner) = wrapper.iter().next()?;
            match key.as_str() {
                "$numberInt" | "$numberLong" | "$numberDouble" | "$numberDecimal" => {
                    sign(inner.as_str()?.trim().parse::<f64>().ok()?)
                }
                _ => None,
            }
        }
        _ => None,
    }
}

fn sign(n: f64) -> Option<Direction> {
    if n > 0.0 {
        Some(Direction::Ascending)
    } else if n < 0.0 {
        Some(Direction::Descending)
    } else {
        None
    }
}
