//! Notice sink writing advisory notices as tracing events.

use tracing::{info, warn};

use crate::domain::ports::{Notice, NoticeSink};

/// Emits every notice as a structured log event under the `notice` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNoticeSink;

impl NoticeSink for TracingNoticeSink {
    fn notify(&self, notice: Notice) {
        match notice {
            Notice::StopsUnavailable | Notice::PlaceLookupUnavailable => {
                warn!(target: "notice", ?notice, "{notice}");
            }
            Notice::IndexPartial | Notice::NothingFound | Notice::PlaceOutsideRegion => {
                info!(target: "notice", ?notice, "{notice}");
            }
        }
    }
}
