//! Stop acquisition domain.
//!
//! Purpose: turn geographic rectangles into deduplicated transit stops while
//! coping with rate-limited, multi-mirror Overpass services. All I/O goes
//! through the traits in [`ports`].
//!
//! Public surface:
//! - GeoRect / ViewKey / tiling: rectangles, viewport keys, crawl tiles.
//! - Station / merge_new: stop records and id-based deduplication.
//! - CacheStore: two-tier, 24 hour query cache.
//! - QueryExecutor: rotation, backoff, retries, and cancellation.
//! - ViewportLoader / ViewportSession: single-flight viewport loading.
//! - RegionPrefetcher / MasterIndex: courteous region crawl and its index.
//! - StationSearch: name search over the index with a place fallback.

pub mod ports;

mod cache_store;
mod geo_rect;
mod prefetch;
mod query_executor;
mod search;
mod station;
mod stop_query;
mod viewport;

pub use self::cache_store::{CacheStore, CacheStoreError, DEFAULT_CACHE_TTL};
pub use self::geo_rect::{GRID_SLACK, GeoRect, GeoRectError, MAX_TILES, TilingError, ViewKey};
pub use self::prefetch::{
    CrawlProgress, CrawlSummary, IndexMatches, MasterIndex, PrefetchConfig, PrefetchError,
    RegionPrefetcher,
};
pub use self::query_executor::{
    BackoffJitter, BackoffPolicy, DEFAULT_RETRY_BUDGET, EndpointRotator, EndpointRotatorError,
    ExecutorRuntime, QueryError, QueryExecutor, QueryOptions, RandomJitter, Sleeper, TokioSleeper,
};
pub use self::search::{SEARCH_RESULT_LIMIT, SearchOutcome, StationSearch};
pub use self::station::{Station, StationId, dedup_by_id, merge_new};
pub use self::stop_query::{
    DEFAULT_QUERY_TIMEOUT_SECONDS, UNNAMED_STOP, build_stop_query, stations_from_document,
};
pub use self::viewport::{
    DEFAULT_MIN_ZOOM, ViewportLoad, ViewportLoader, ViewportOutcome, ViewportSession,
};
