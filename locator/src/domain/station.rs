//! Transit stop records and id-based deduplication.

use std::collections::HashSet;
use std::fmt;

/// Stable upstream (OSM node) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StationId(i64);

impl StationId {
    /// Wrap a raw upstream identifier.
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Raw upstream identifier.
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A public-transport stop.
///
/// Identity is [`Station::id`]; two records with the same id denote the same
/// stop regardless of their other fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    /// Upstream identifier.
    pub id: StationId,
    /// Display name, or a placeholder when the source has none.
    pub name: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

/// Keep the first occurrence of every id from `incoming`, recording kept ids
/// in `seen`. Order among kept stations is preserved.
///
/// # Examples
///
/// ```
/// use std::collections::HashSet;
/// use stop_locator::domain::{Station, StationId, merge_new};
///
/// let stop = |id| Station { id: StationId::new(id), name: "Ben Thanh".to_owned(), lat: 10.77, lng: 106.69 };
/// let mut seen = HashSet::new();
/// assert_eq!(merge_new(&mut seen, vec![stop(1), stop(2), stop(1)]).len(), 2);
/// assert!(merge_new(&mut seen, vec![stop(2)]).is_empty());
/// ```
pub fn merge_new<S>(seen: &mut HashSet<StationId, S>, incoming: Vec<Station>) -> Vec<Station>
where
    S: std::hash::BuildHasher,
{
    incoming
        .into_iter()
        .filter(|station| seen.insert(station.id))
        .collect()
}

/// Drop repeated ids from `stations`, keeping first occurrences.
pub fn dedup_by_id(stations: Vec<Station>) -> Vec<Station> {
    let mut seen = HashSet::with_capacity(stations.len());
    merge_new(&mut seen, stations)
}
