//! Port for advisory, user-facing notices.
//!
//! Notices never block interaction; the presentation layer decides how to
//! show them (toast, status line, log).

use std::fmt;

/// Advisory messages raised by the acquisition engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// Stops for the current view could not be loaded; retry later.
    StopsUnavailable,
    /// The region index is still being built, so search results are partial.
    IndexPartial,
    /// Neither a stop nor a place matched the search text.
    NothingFound,
    /// The geocoded place lies outside the region of interest.
    PlaceOutsideRegion,
    /// The place lookup service could not be reached.
    PlaceLookupUnavailable,
}

impl Notice {
    /// Human-readable message for the notice.
    pub const fn message(self) -> &'static str {
        match self {
            Self::StopsUnavailable => {
                "Could not load stops (the map service may be rate limiting). Try again in a few seconds."
            }
            Self::IndexPartial => "The region index is still loading; results will be complete shortly.",
            Self::NothingFound => "No matching stop or place was found.",
            Self::PlaceOutsideRegion => "The place found lies outside the region; moving there anyway.",
            Self::PlaceLookupUnavailable => "Place lookup is unavailable right now.",
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Receives notices for display.
#[cfg_attr(test, mockall::automock)]
pub trait NoticeSink: Send + Sync {
    /// Surface `notice` to the user.
    fn notify(&self, notice: Notice);
}
