use std::collections::BTreeSet;
use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("index collection name is empty")]
    EmptyCollection,
    #[error("index has no columns")]
    EmptyColumns,
    #[error("index has no directions")]
    EmptyDirections,
    #[error("{columns} columns but {directions} directions")]
    LengthMismatch { columns: usize, directions: usize },
    #[error("flippable position {position} is out of bounds for {len} columns")]
    FlippableOutOfBounds { position: usize, len: usize },
    #[error("position {0} is not flippable")]
    NotFlippable(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn as_i32(self) -> i32 {
        match self {
            Direction::Ascending => 1,
            Direction::Descending => -1,
        }
    }

    pub fn reversed(self) -> Direction {
        match self {
            Direction::Ascending => Direction::Descending,
            Direction::Descending => Direction::Ascending,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i32())
    }
}

/// A candidate or retained index on one collection.
///
/// `flippable` holds the column positions whose direction does not matter to
/// the query that produced the index (equality columns, sort-only columns).
/// Two indexes that only differ on such positions serve the same query.
#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    collection: String,
    columns: Vec<String>,
    directions: Vec<Direction>,
    flippable: BTreeSet<usize>,
    options: Map<String, Value>,
}

impl Index {
    pub fn new(
        collection: impl Into<String>,
        columns: Vec<String>,
        directions: Vec<Direction>,
        flippable: impl IntoIterator<Item = usize>,
    ) -> Result<Self, IndexError> {
        let collection = collection.into();
        if collection.is_empty() {
            return Err(IndexError::EmptyCollection);
        }
        if columns.is_empty() {
            return Err(IndexError::EmptyColumns);
        }
        if directions.is_empty() {
            return Err(IndexError::EmptyDirections);
        }
        if columns.len() != directions.len() {
            return Err(IndexError::LengthMismatch {
                columns: columns.len(),
                directions: directions.len(),
            });
        }
        let flippable = flippable.into_iter().collect::<BTreeSet<_>>();
        if let Some(&position) = flippable.iter().find(|&&p| p >= columns.len()) {
            return Err(IndexError::FlippableOutOfBounds {
                position,
                len: columns.len(),
            });
        }

        Ok(Self {
            collection,
            columns,
            directions,
            flippable,
            options: Map::new(),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn directions(&self) -> &[Direction] {
        &self.directions
    }

    pub fn flippable(&self) -> &BTreeSet<usize> {
        &self.flippable
    }

    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Replaces the options rendered after the key document, e.g.
    /// `{"unique": true}` or a `partialFilterExpression`.
    pub fn set_options(&mut self, options: Map<String, Value>) {
        self.options = options;
    }

    /// Flips the direction of every given position. Fails without touching
    /// the index if any position is not flippable.
    pub fn flip_directions(&mut self, positions: &[usize]) -> Result<(), IndexError> {
        if let Some(&position) = positions.iter().find(|p| !self.flippable.contains(*p)) {
            return Err(IndexError::NotFlippable(position));
        }
        for &position in positions {
            self.directions[position] = self.directions[position].reversed();
        }
        Ok(())
    }

    /// Same collection, same columns and same directions, in order.
    pub fn same_keys(&self, other: &Index) -> bool {
        self.is_prefix_of(other) && other.is_prefix_of(self)
    }

    /// True when `self` matches the leading columns and directions of `other`.
    /// An index is a prefix of itself.
    pub fn is_prefix_of(&self, other: &Index) -> bool {
        if self.collection != other.collection || self.len() > other.len() {
            return false;
        }
        self.keys().zip(other.keys()).all(|(a, b)| a == b)
    }

    /// Same columns, with every direction inverted.
    pub fn is_reverse_of(&self, other: &Index) -> bool {
        if self.collection != other.collection || self.len() != other.len() {
            return false;
        }
        self.keys()
            .zip(other.keys())
            .all(|((col_a, dir_a), (col_b, dir_b))| {
                col_a == col_b && dir_a.as_i32() * dir_b.as_i32() == -1
            })
    }

    /// True when `candidate` has the same columns as `self` and every position
    /// is declared flippable by `self`. The candidate's directions are not
    /// compared.
    pub fn is_flip_equivalent_to(&self, candidate: &Index) -> bool {
        if self.collection != candidate.collection || self.len() != candidate.len() {
            return false;
        }
        self.columns
            .iter()
            .zip(&candidate.columns)
            .enumerate()
            .all(|(i, (a, b))| a == b && self.flippable.contains(&i))
    }

    /// True when `self` is a prefix of `candidate`, so the candidate can take
    /// its place.
    pub fn is_covered_by(&self, candidate: &Index) -> bool {
        self.is_prefix_of(candidate)
    }

    /// Renders the `db.<collection>.createIndex(...)` statement.
    pub fn create_statement(&self) -> String {
        let keys = self
            .keys()
            .map(|(column, direction)| format!("'{column}': {direction}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "db.{}.createIndex({{{keys}}}, {})",
            self.collection,
            Value::Object(self.options.clone()),
        )
    }

    fn keys(&self) -> impl Iterator<Item = (&String, &Direction)> {
        self.columns.iter().zip(&self.directions)
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.create_statement())
    }
}

#[cfg(test)]
pub(crate) fn index(collection: &str, keys: &[(&str, i32)], flippable: &[usize]) -> Index {
    let columns = keys.iter().map(|(c, _)| c.to_string()).collect();
    let directions = keys
        .iter()
        .map(|(_, d)| {
            if *d < 0 {
                Direction::Descending
            } else {
                Direction::Ascending
            }
        })
        .collect();
    Index::new(collection, columns, directions, flippable.iter().copied()).unwrap()
}
