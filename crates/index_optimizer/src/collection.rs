use std::fmt;

use thiserror::Error;

use crate::index::Index;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("index targets collection {found}, expected {expected}")]
    CollectionMismatch { expected: String, found: String },
    #[error("index has no columns or directions")]
    EmptyKeys,
}

/// What `add_index` did with an accepted candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// An index with the same keys is already retained.
    AlreadyExists,
    /// The reverse of the candidate is retained and serves the same scans.
    ReverseExists,
    /// The candidate is a leading segment of a retained index.
    PrefixOfExisting,
    /// A retained index was a prefix of the candidate; the candidate took its
    /// position.
    Replaced { position: usize },
    /// A retained index has the same columns and differs only on positions
    /// it declares flippable.
    FlippableExists,
    /// The candidate was appended.
    Created,
}

impl AddOutcome {
    /// True when the candidate ended up in the set.
    pub fn created(self) -> bool {
        matches!(self, AddOutcome::Replaced { .. } | AddOutcome::Created)
    }
}

impl fmt::Display for AddOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddOutcome::AlreadyExists => write!(f, "index already exists"),
            AddOutcome::ReverseExists => write!(f, "reverse index exists"),
            AddOutcome::PrefixOfExisting => write!(f, "index is a prefix of an existing index"),
            AddOutcome::Replaced { position } => {
                write!(f, "index replaced its prefix at position {position}")
            }
            AddOutcome::FlippableExists => {
                write!(f, "an index with the same columns in other directions exists")
            }
            AddOutcome::Created => write!(f, "index created"),
        }
    }
}

/// The indexes retained for one collection, in the order they were first
/// created.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionIndexSet {
    name: String,
    indices: Vec<Index>,
}

impl CollectionIndexSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indices: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn indices(&self) -> &[Index] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Offers a candidate to the set. The checks run in a fixed order and the
    /// first one that matches decides; a decision is never revisited.
    pub fn add_index(&mut self, candidate: Index) -> Result<AddOutcome, RejectReason> {
        if candidate.collection() != self.name {
            return Err(RejectReason::CollectionMismatch {
                expected: self.name.clone(),
                found: candidate.collection().to_string(),
            });
        }
        if candidate.columns().is_empty() || candidate.directions().is_empty() {
            return Err(RejectReason::EmptyKeys);
        }

        if self.position(|existing| existing.same_keys(&candidate)).is_some() {
            return Ok(AddOutcome::AlreadyExists);
        }
        if self.position(|existing| existing.is_reverse_of(&candidate)).is_some() {
            return Ok(AddOutcome::ReverseExists);
        }
        if self.position(|existing| candidate.is_prefix_of(existing)).is_some() {
            return Ok(AddOutcome::PrefixOfExisting);
        }
        if let Some(position) = self.position(|existing| existing.is_covered_by(&candidate)) {
            self.indices[position] = candidate;
            return Ok(AddOutcome::Replaced { position });
        }
        if self
            .position(|existing| existing.is_flip_equivalent_to(&candidate))
            .is_some()
        {
            return Ok(AddOutcome::FlippableExists);
        }

        self.indices.push(candidate);
        Ok(AddOutcome::Created)
    }

    fn position(&self, predicate: impl Fn(&Index) -> bool) -> Option<usize> {
        self.indices.iter().position(predicate)
    }
}
