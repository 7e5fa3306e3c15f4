//! Ordered collection of records discovered by one query run.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::PaperRecord;

/// All records of one batch, indexed `0..n`.
///
/// Records are created together at discovery and never inserted or removed
/// afterwards; stages only mutate them in place. On disk the collection is a map
/// from string-encoded index to record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchCollection {
    records: Vec<PaperRecord>,
}

impl BatchCollection {
    /// Create a batch from records in source order.
    #[must_use]
    pub fn new(records: Vec<PaperRecord>) -> Self {
        Self { records }
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the batch holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Get a record by batch index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&PaperRecord> {
        self.records.get(index)
    }

    /// Get a mutable record by batch index.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut PaperRecord> {
        self.records.get_mut(index)
    }

    /// Iterate `(index, record)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &PaperRecord)> {
        self.records.iter().enumerate()
    }

    /// Iterate `(index, record)` pairs mutably in index order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut PaperRecord)> {
        self.records.iter_mut().enumerate()
    }

    /// Records in index order.
    #[must_use]
    pub fn records(&self) -> &[PaperRecord] {
        &self.records
    }

    /// Check whether every record has a terminal marker from every stage.
    ///
    /// A retired batch is kept on disk; it simply needs no further runs.
    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.records.iter().all(PaperRecord::is_settled)
    }
}

impl Serialize for BatchCollection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.records.len()))?;
        for (index, record) in self.records.iter().enumerate() {
            map.serialize_entry(&index.to_string(), record)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for BatchCollection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<usize, PaperRecord>::deserialize(deserializer)?;

        // Keys must be exactly 0..n; a gap means the file was edited or truncated.
        if let Some((position, key)) = raw.keys().enumerate().find(|(i, k)| i != *k) {
            return Err(serde::de::Error::custom(format!(
                "batch indices are not contiguous: expected {position}, found {key}"
            )));
        }

        Ok(Self { records: raw.into_values().collect() })
    }
}

impl IntoIterator for BatchCollection {
    type Item = PaperRecord;
    type IntoIter = std::vec::IntoIter<PaperRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}
