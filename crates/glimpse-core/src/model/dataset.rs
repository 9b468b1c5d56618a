use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::model::{CatalogRecord, Vector};

/// One catalog record paired with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub record: CatalogRecord,
    pub vector: Vector,
}

impl IndexEntry {
    #[must_use]
    pub fn new(record: CatalogRecord, vector: Vector) -> Self {
        Self { record, vector }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.record.id
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.record.source_url
    }
}

/// The complete, ordered set of index entries for one dimension.
///
/// Holds at most one entry per id. Re-inserting an id replaces its vector
/// and URL but keeps the entry at its original position, so the order of
/// first insertion is stable across resumed runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    dimension: usize,
    entries: Vec<IndexEntry>,
    positions: HashMap<String, usize>,
}

impl Dataset {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: Vec::new(),
            positions: HashMap::new(),
        }
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&IndexEntry> {
        self.positions.get(id).map(|&pos| &self.entries[pos])
    }

    #[must_use]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, IndexEntry> {
        self.entries.iter()
    }

    /// Insert or replace an entry.
    ///
    /// Returns `true` if the id was not present before.
    ///
    /// # Errors
    /// Returns [`Error::DimensionMismatch`] if the vector does not match
    /// the dataset dimension.
    pub fn insert(&mut self, entry: IndexEntry) -> Result<bool> {
        if entry.vector.dimension() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: entry.vector.dimension(),
            });
        }

        if let Some(&pos) = self.positions.get(entry.id()) {
            self.entries[pos] = entry;
            Ok(false)
        } else {
            self.positions
                .insert(entry.id().to_string(), self.entries.len());
            self.entries.push(entry);
            Ok(true)
        }
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a IndexEntry;
    type IntoIter = std::slice::Iter<'a, IndexEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
