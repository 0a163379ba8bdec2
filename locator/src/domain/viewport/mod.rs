//! On-demand stop loading for the visible map area.
//!
//! [`ViewportLoader`] is single-flight: a call that arrives while another is
//! in flight returns [`ViewportLoad::Skipped`] instead of queueing. Each new
//! load cancels the token of the previous one before issuing its own query.
//! Failures never escape; they become a [`Notice`] and an empty outcome.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::ports::{Notice, NoticeSink};
use super::query_executor::{QueryError, QueryExecutor, QueryOptions};
use super::station::{Station, dedup_by_id};
use super::stop_query::{DEFAULT_QUERY_TIMEOUT_SECONDS, build_stop_query, stations_from_document};
use super::GeoRect;

mod session;

pub use session::{DEFAULT_MIN_ZOOM, ViewportOutcome, ViewportSession};

/// Result of one [`ViewportLoader::load`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewportLoad {
    /// Deduplicated stops inside the requested rectangle. May be empty.
    Loaded(Vec<Station>),
    /// Another load was in flight; nothing was fetched.
    Skipped,
    /// The load was superseded or torn down.
    Cancelled,
    /// The upstream could not be reached; a notice was emitted.
    Unavailable,
}

impl ViewportLoad {
    /// Stations carried by a successful load.
    pub fn stations(&self) -> Option<&[Station]> {
        match self {
            Self::Loaded(stations) => Some(stations),
            _ => None,
        }
    }
}

/// Single-flight, cancellable loader for viewport stops.
pub struct ViewportLoader {
    executor: Arc<QueryExecutor>,
    notices: Arc<dyn NoticeSink>,
    options: QueryOptions,
    query_timeout_seconds: u32,
    busy: AtomicBool,
    in_flight: Mutex<Option<CancellationToken>>,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ViewportLoader {
    /// Build a loader issuing queries through `executor`.
    pub fn new(executor: Arc<QueryExecutor>, notices: Arc<dyn NoticeSink>) -> Self {
        Self {
            executor,
            notices,
            options: QueryOptions::default(),
            query_timeout_seconds: DEFAULT_QUERY_TIMEOUT_SECONDS,
            busy: AtomicBool::new(false),
            in_flight: Mutex::new(None),
        }
    }

    /// Override the retry budget used for viewport queries.
    #[must_use]
    pub fn with_retry_budget(mut self, retry_budget: u32) -> Self {
        self.options.retry_budget = retry_budget;
        self
    }

    /// Override the server-side timeout directive.
    #[must_use]
    pub fn with_query_timeout(mut self, seconds: u32) -> Self {
        self.query_timeout_seconds = seconds;
        self
    }

    /// Whether a load is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Load the stops inside `rect`.
    ///
    /// The caller gates zoom level, region intersection, and repeated views
    /// (see [`ViewportSession`]); `rect` is trusted as given.
    pub async fn load(&self, rect: &GeoRect) -> ViewportLoad {
        if self.busy.swap(true, Ordering::AcqRel) {
            debug!(%rect, "viewport load already in flight; dropping request");
            return ViewportLoad::Skipped;
        }
        let _busy = BusyGuard(&self.busy);

        let token = CancellationToken::new();
        if let Some(previous) = self.lock_in_flight().replace(token.clone()) {
            previous.cancel();
        }

        let query = build_stop_query(rect, self.query_timeout_seconds);
        let options = self.options.clone().with_cancel(token);
        let document = match self.executor.execute(&query, &options).await {
            Ok(document) => document,
            Err(QueryError::Cancelled) => {
                debug!(%rect, "viewport load cancelled");
                return ViewportLoad::Cancelled;
            }
            Err(error) => {
                warn!(%rect, kind = error.kind(), error = %error, "viewport load failed");
                self.notices.notify(Notice::StopsUnavailable);
                return ViewportLoad::Unavailable;
            }
        };

        match stations_from_document(&document) {
            Ok(stations) => {
                let stations = dedup_by_id(stations);
                debug!(%rect, count = stations.len(), "viewport stops loaded");
                ViewportLoad::Loaded(stations)
            }
            Err(message) => {
                warn!(%rect, error = %message, "viewport response undecodable");
                self.notices.notify(Notice::StopsUnavailable);
                ViewportLoad::Unavailable
            }
        }
    }

    /// Cancel the live load, if any.
    pub fn cancel_in_flight(&self) {
        if let Some(token) = self.lock_in_flight().take() {
            token.cancel();
        }
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
