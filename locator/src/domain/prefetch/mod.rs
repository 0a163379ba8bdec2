//! Background crawl of a whole region into the [`MasterIndex`].
//!
//! The region is tiled and tiles are fetched in fixed-size batches through
//! the shared [`QueryExecutor`], so they reuse its cache and retry policy. A
//! tile that still fails is logged and skipped. After every batch new
//! stations are merged, a [`CrawlProgress`] is published, and the crawler
//! pauses before the next batch to keep the aggregate request rate low.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::query_executor::{DEFAULT_RETRY_BUDGET, QueryError, QueryExecutor, QueryOptions, Sleeper};
use super::station::Station;
use super::stop_query::{DEFAULT_QUERY_TIMEOUT_SECONDS, build_stop_query, stations_from_document};
use super::{GeoRect, TilingError};

mod index;

pub use index::{IndexMatches, MasterIndex};

/// Crawl tunables.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefetchConfig {
    /// Maximum tile side in degrees.
    pub step: f64,
    /// Tiles fetched together in one batch.
    pub concurrency: usize,
    /// Courtesy pause between batches.
    pub pause: Duration,
    /// Retry budget per tile query.
    pub retry_budget: u32,
    /// Server-side timeout directive per tile query.
    pub query_timeout_seconds: u32,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            step: 0.3,
            concurrency: 1,
            pause: Duration::from_millis(300),
            retry_budget: DEFAULT_RETRY_BUDGET,
            query_timeout_seconds: DEFAULT_QUERY_TIMEOUT_SECONDS,
        }
    }
}

/// Progress published after every batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlProgress {
    /// Tiles processed so far, failed ones included.
    pub tiles_done: usize,
    /// Tiles in the region grid.
    pub tiles_total: usize,
    /// Stations in the index after the latest batch.
    pub entities_so_far: usize,
}

/// Outcome of one [`RegionPrefetcher::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Tiles in the region grid.
    pub tiles_total: usize,
    /// Tiles processed, failed ones included.
    pub tiles_done: usize,
    /// Tiles skipped after exhausting their retries.
    pub failed_tiles: usize,
    /// Stations in the index when the crawl ended.
    pub stations: usize,
    /// Every tile was processed and the index is ready.
    pub completed: bool,
}

/// Errors that prevent a crawl from starting.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PrefetchError {
    /// The region could not be tiled with the configured step.
    #[error("cannot tile prefetch region: {0}")]
    Tiling(#[from] TilingError),
    /// The index was already completed by an earlier crawl.
    #[error("master index is already complete")]
    AlreadyComplete,
}

enum TileOutcome {
    Fetched(Vec<Station>),
    Failed,
    Stopped,
}

/// Region crawler feeding a shared [`MasterIndex`].
pub struct RegionPrefetcher {
    executor: Arc<QueryExecutor>,
    index: Arc<MasterIndex>,
    sleeper: Arc<dyn Sleeper>,
    config: PrefetchConfig,
    progress: watch::Sender<CrawlProgress>,
}

impl RegionPrefetcher {
    /// Build a crawler that pauses with the executor's sleeper.
    pub fn new(executor: Arc<QueryExecutor>, index: Arc<MasterIndex>, config: PrefetchConfig) -> Self {
        let sleeper = executor.sleeper();
        let (progress, _) = watch::channel(CrawlProgress::default());
        Self {
            executor,
            index,
            sleeper,
            config,
            progress,
        }
    }

    /// Receive progress updates; the current value is the latest batch.
    pub fn subscribe(&self) -> watch::Receiver<CrawlProgress> {
        self.progress.subscribe()
    }

    /// Index this crawler fills.
    pub fn index(&self) -> Arc<MasterIndex> {
        Arc::clone(&self.index)
    }

    /// Crawl `region` tile by tile.
    ///
    /// When `stop` fires the crawl ends after the current wait or request;
    /// the summary then reports `completed == false` and the index stays
    /// partial.
    ///
    /// # Errors
    ///
    /// Returns [`PrefetchError`] when the region cannot be tiled or the index
    /// is already complete. Tile failures never surface here.
    pub async fn run(
        &self,
        region: &GeoRect,
        stop: Option<CancellationToken>,
    ) -> Result<CrawlSummary, PrefetchError> {
        if self.index.is_ready() {
            return Err(PrefetchError::AlreadyComplete);
        }
        let tiles = region.tiles(self.config.step)?;
        let tiles_total = tiles.len();
        let stop = stop.unwrap_or_default();
        let options = QueryOptions::default()
            .with_retry_budget(self.config.retry_budget)
            .with_cancel(stop.clone());

        let mut tiles_done = 0;
        let mut failed_tiles = 0;
        let mut stopped = false;
        self.publish(tiles_done, tiles_total);
        info!(%region, tiles_total, "prefetch started");

        for batch in tiles.chunks(self.config.concurrency.max(1)) {
            let outcomes = join_all(batch.iter().map(|tile| self.fetch_tile(tile, &options))).await;
            for outcome in outcomes {
                match outcome {
                    TileOutcome::Fetched(stations) => {
                        self.index.merge(stations);
                        tiles_done += 1;
                    }
                    TileOutcome::Failed => {
                        failed_tiles += 1;
                        tiles_done += 1;
                    }
                    TileOutcome::Stopped => stopped = true,
                }
            }
            self.publish(tiles_done, tiles_total);
            debug!(tiles_done, tiles_total, stations = self.index.len(), "prefetch batch merged");

            if stopped || tiles_done == tiles_total {
                break;
            }
            tokio::select! {
                biased;
                () = stop.cancelled() => {
                    stopped = true;
                    break;
                }
                () = self.sleeper.sleep(self.config.pause) => {}
            }
        }

        let completed = !stopped && tiles_done == tiles_total;
        if completed {
            self.index.mark_ready();
        }
        let summary = CrawlSummary {
            tiles_total,
            tiles_done,
            failed_tiles,
            stations: self.index.len(),
            completed,
        };
        info!(
            tiles_done,
            tiles_total,
            failed_tiles,
            stations = summary.stations,
            completed,
            "prefetch finished"
        );
        Ok(summary)
    }

    async fn fetch_tile(&self, tile: &GeoRect, options: &QueryOptions) -> TileOutcome {
        let query = build_stop_query(tile, self.config.query_timeout_seconds);
        let document = match self.executor.execute(&query, options).await {
            Ok(document) => document,
            Err(QueryError::Cancelled) => return TileOutcome::Stopped,
            Err(error) => {
                warn!(%tile, kind = error.kind(), error = %error, "tile failed; skipping");
                return TileOutcome::Failed;
            }
        };
        match stations_from_document(&document) {
            Ok(stations) => TileOutcome::Fetched(stations),
            Err(message) => {
                warn!(%tile, error = %message, "tile response undecodable; skipping");
                TileOutcome::Failed
            }
        }
    }

    fn publish(&self, tiles_done: usize, tiles_total: usize) {
        self.progress.send_replace(CrawlProgress {
            tiles_done,
            tiles_total,
            entities_so_far: self.index.len(),
        });
    }
}
