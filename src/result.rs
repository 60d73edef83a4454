//! Search and family results.

use crate::record::{Record, RecordLoader};
use std::sync::Arc;

/// Hit list of one search or family operation, as cached by the client.
///
/// Holds only identifiers, never records, so cached hit lists do not keep
/// clients alive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitSet {
    /// Total hits reported by the server
    pub total_hits: usize,
    /// PPNs in server order, at most the configured cap
    pub ppns: Vec<String>,
}

/// Ordered records produced by a search or family operation.
///
/// [`SearchResult::total_hits`] is what the server reported;
/// [`SearchResult::len`] is how many records were materialized, which never
/// exceeds the client's `max_hits`. Records are unloaded handles bound to the
/// client that produced them.
#[derive(Debug, Clone)]
pub struct SearchResult {
    total_hits: usize,
    records: Vec<Record>,
}

impl SearchResult {
    /// Create a result from already constructed records.
    #[must_use]
    pub fn new(total_hits: usize, records: Vec<Record>) -> Self {
        SearchResult {
            total_hits,
            records,
        }
    }

    /// Create unloaded records for every PPN of `hits`, bound to `loader`.
    #[must_use]
    pub fn from_hits(hits: &HitSet, loader: &Arc<dyn RecordLoader>) -> Self {
        let records = hits
            .ppns
            .iter()
            .map(|ppn| Record::new(ppn.clone(), Arc::clone(loader)))
            .collect();
        SearchResult::new(hits.total_hits, records)
    }

    /// Number of hits reported by the server.
    #[must_use]
    pub fn total_hits(&self) -> usize {
        self.total_hits
    }

    /// The records in server hit order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of materialized records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no record was materialized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over the records.
    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Iterate over the PPNs of the records.
    pub fn ppns(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(Record::ppn)
    }

    /// Consume the result, returning its records.
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

impl<'a> IntoIterator for &'a SearchResult {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
