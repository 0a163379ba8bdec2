//! Region-wide station index filled by the crawler.

use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard, PoisonError};

use crate::domain::station::{Station, StationId, merge_new};

#[derive(Debug, Default)]
struct IndexState {
    stations: Vec<Station>,
    seen: HashSet<StationId>,
    ready: bool,
}

/// Deduplicated, append-only collection of crawled stations.
///
/// Once [`MasterIndex::mark_ready`] is called the index is frozen: further
/// merges are ignored.
#[derive(Debug, Default)]
pub struct MasterIndex {
    state: RwLock<IndexState>,
}

/// Stations matching a name query.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMatches {
    /// Matching stations in discovery order, truncated to the requested limit.
    pub hits: Vec<Station>,
    /// Total matches before truncation.
    pub total: usize,
    /// The crawl had not finished when the lookup ran.
    pub partial: bool,
}

impl MasterIndex {
    /// Empty, not-yet-ready index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append stations whose ids have not been seen. Returns how many were
    /// added.
    pub fn merge(&self, incoming: Vec<Station>) -> usize {
        let mut state = self.write();
        if state.ready {
            return 0;
        }
        let IndexState { stations, seen, .. } = &mut *state;
        let added = merge_new(seen, incoming);
        let count = added.len();
        stations.extend(added);
        count
    }

    /// Freeze the index and flag it complete.
    pub fn mark_ready(&self) {
        self.write().ready = true;
    }

    /// Whether a full crawl has completed.
    pub fn is_ready(&self) -> bool {
        self.read().ready
    }

    /// Number of distinct stations held.
    pub fn len(&self) -> usize {
        self.read().stations.len()
    }

    /// Whether no stations have been merged yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every indexed station.
    pub fn snapshot(&self) -> Vec<Station> {
        self.read().stations.clone()
    }

    /// Case-insensitive substring search over station names.
    pub fn find_by_name(&self, needle: &str, limit: usize) -> IndexMatches {
        let needle = needle.trim().to_lowercase();
        let state = self.read();
        let matching = state
            .stations
            .iter()
            .filter(|station| station.name.to_lowercase().contains(&needle))
            .collect::<Vec<_>>();
        IndexMatches {
            total: matching.len(),
            hits: matching.into_iter().take(limit).cloned().collect(),
            partial: !state.ready,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn stop(id: i64, name: &str) -> Station {
        Station {
            id: StationId::new(id),
            name: name.to_owned(),
            lat: 10.77,
            lng: 106.69,
        }
    }

    #[rstest]
    fn merge_skips_known_ids() {
        let index = MasterIndex::new();
        assert_eq!(index.merge(vec![stop(1, "Ben Thanh"), stop(2, "Ham Nghi")]), 2);
        assert_eq!(index.merge(vec![stop(2, "Ham Nghi"), stop(3, "Cho Lon")]), 1);
        assert_eq!(index.len(), 3);
    }

    #[rstest]
    fn ready_index_is_frozen() {
        let index = MasterIndex::new();
        index.merge(vec![stop(1, "Ben Thanh")]);
        index.mark_ready();
        assert_eq!(index.merge(vec![stop(2, "Ham Nghi")]), 0);
        assert_eq!(index.snapshot(), vec![stop(1, "Ben Thanh")]);
    }

    #[rstest]
    #[case("ben", 2)]
    #[case("  BEN THANH ", 1)]
    #[case("xe buyt", 0)]
    fn name_search_is_case_insensitive(#[case] needle: &str, #[case] expected: usize) {
        let index = MasterIndex::new();
        index.merge(vec![
            stop(1, "Ben Thanh"),
            stop(2, "Ben xe Mien Dong"),
            stop(3, "Cho Lon"),
        ]);
        let found = index.find_by_name(needle, 200);
        assert_eq!(found.hits.len(), expected);
        assert!(found.partial);
    }

    #[rstest]
    fn search_is_capped_but_reports_total() {
        let index = MasterIndex::new();
        index.merge((0..5).map(|i| stop(i, "Tram")).collect());
        index.mark_ready();
        let found = index.find_by_name("tram", 3);
        assert_eq!(found.hits.len(), 3);
        assert_eq!(found.total, 5);
        assert!(!found.partial);
    }
}
