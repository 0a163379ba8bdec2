//! Free-text stop search over the master index, with a place fallback.

use std::sync::Arc;

use tracing::warn;

use super::GeoRect;
use super::ports::{GeoPoint, Notice, NoticeSink, PlaceGeocoder};
use super::prefetch::MasterIndex;
use super::station::Station;

/// Maximum stations returned by one search.
pub const SEARCH_RESULT_LIMIT: usize = 200;

/// Result of [`StationSearch::search`].
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Matching stations from the index.
    Stations {
        hits: Vec<Station>,
        /// The index was still being filled.
        partial: bool,
    },
    /// No station matched; the text resolved to a place.
    Place {
        point: GeoPoint,
        inside_region: bool,
    },
    /// Neither stations nor places matched.
    NotFound,
    /// Blank input.
    Empty,
}

/// Station-name search with a geocoding fallback.
pub struct StationSearch {
    index: Arc<MasterIndex>,
    geocoder: Arc<dyn PlaceGeocoder>,
    notices: Arc<dyn NoticeSink>,
    region: GeoRect,
}

impl StationSearch {
    /// Search `index`, falling back to `geocoder` for places in `region`.
    pub fn new(
        index: Arc<MasterIndex>,
        geocoder: Arc<dyn PlaceGeocoder>,
        notices: Arc<dyn NoticeSink>,
        region: GeoRect,
    ) -> Self {
        Self {
            index,
            geocoder,
            notices,
            region,
        }
    }

    /// Search for `text`.
    ///
    /// While the index is incomplete an [`Notice::IndexPartial`] is emitted
    /// and hits are flagged partial. Without hits the geocoder is asked; a
    /// place outside the region is still returned, with a notice.
    pub async fn search(&self, text: &str) -> SearchOutcome {
        let needle = text.trim();
        if needle.is_empty() {
            return SearchOutcome::Empty;
        }
        if !self.index.is_ready() {
            self.notices.notify(Notice::IndexPartial);
        }

        let matches = self.index.find_by_name(needle, SEARCH_RESULT_LIMIT);
        if !matches.hits.is_empty() {
            return SearchOutcome::Stations {
                hits: matches.hits,
                partial: matches.partial,
            };
        }

        match self.geocoder.locate(needle).await {
            Ok(Some(point)) => {
                let inside_region = self.region.contains_point(point.lat, point.lng);
                if !inside_region {
                    self.notices.notify(Notice::PlaceOutsideRegion);
                }
                SearchOutcome::Place {
                    point,
                    inside_region,
                }
            }
            Ok(None) => {
                self.notices.notify(Notice::NothingFound);
                SearchOutcome::NotFound
            }
            Err(error) => {
                warn!(kind = error.kind(), error = %error, "place lookup failed");
                self.notices.notify(Notice::PlaceLookupUnavailable);
                SearchOutcome::NotFound
            }
        }
    }
}
