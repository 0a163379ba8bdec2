//! Cached, retrying, cancellable Overpass query execution.
//!
//! The executor owns the whole acquisition path for one query: cache lookup,
//! endpoint rotation, the retry loop with backoff, and cache population.
//! Attempts within one call are strictly sequential. Cancellation is raced
//! against every suspension point and is never retried.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::cache_store::CacheStore;
use super::ports::{OverpassSource, OverpassSourceError, define_port_error};

mod backoff;
mod rotator;
mod runtime;

pub use backoff::BackoffPolicy;
pub use rotator::{EndpointRotator, EndpointRotatorError};
pub use runtime::{ExecutorRuntime, RandomJitter, TokioSleeper};

/// Default number of retries after the first attempt.
pub const DEFAULT_RETRY_BUDGET: u32 = 4;

/// Async clock-independent sleeping abstraction for retries.
///
/// ```rust,no_run
/// use async_trait::async_trait;
/// use std::sync::Mutex;
/// use std::time::Duration;
/// use stop_locator::domain::Sleeper;
///
/// #[derive(Default)]
/// struct CountingSleeper(Mutex<u32>);
///
/// #[async_trait]
/// impl Sleeper for CountingSleeper {
///     async fn sleep(&self, _duration: Duration) {
///         *self.0.lock().expect("calls mutex") += 1;
///     }
/// }
/// ```
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspend execution for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Retry backoff jitter abstraction.
pub trait BackoffJitter: Send + Sync {
    /// Return `base` plus an amount in `0..=bound`.
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use stop_locator::domain::BackoffJitter;
    ///
    /// struct HalfJitter;
    /// impl BackoffJitter for HalfJitter {
    ///     fn jittered_delay(&self, base: Duration, bound: Duration) -> Duration {
    ///         base + bound / 2
    ///     }
    /// }
    /// let delay = HalfJitter.jittered_delay(Duration::from_millis(500), Duration::from_millis(100));
    /// assert_eq!(delay, Duration::from_millis(550));
    /// ```
    fn jittered_delay(&self, base: Duration, bound: Duration) -> Duration;
}

define_port_error! {
    /// Terminal failures of [`QueryExecutor::execute`].
    pub enum QueryError {
        /// The caller's cancellation token fired.
        Cancelled => "query cancelled",
        /// Every attempt ended in a retryable failure.
        ExhaustedRetries { attempts: u32, last_error: OverpassSourceError } =>
            "query failed after {attempts} attempts: {last_error}",
        /// The upstream answered with a status that is never retried.
        NonRetryableUpstream { status: u16, message: String } =>
            "upstream rejected query with status {status}: {message}",
    }
}

/// Per-call options for [`QueryExecutor::execute`].
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Retries allowed after the first attempt.
    pub retry_budget: u32,
    /// Token that aborts the call when cancelled.
    pub cancel: Option<CancellationToken>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            retry_budget: DEFAULT_RETRY_BUDGET,
            cancel: None,
        }
    }
}

impl QueryOptions {
    /// Override the retry budget.
    #[must_use]
    pub fn with_retry_budget(mut self, retry_budget: u32) -> Self {
        self.retry_budget = retry_budget;
        self
    }

    /// Attach a cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

enum AttemptError {
    Retryable(OverpassSourceError),
    Rejected { status: u16, message: String },
}

impl From<OverpassSourceError> for AttemptError {
    fn from(error: OverpassSourceError) -> Self {
        match error {
            OverpassSourceError::Rejected { status, message } => Self::Rejected { status, message },
            retryable => Self::Retryable(retryable),
        }
    }
}

/// Shared query executor. Construct once and share through an `Arc`.
pub struct QueryExecutor {
    source: Arc<dyn OverpassSource>,
    rotator: EndpointRotator,
    cache: Arc<CacheStore>,
    policy: BackoffPolicy,
    sleeper: Arc<dyn Sleeper>,
    jitter: Arc<dyn BackoffJitter>,
}

impl QueryExecutor {
    /// Build an executor with Tokio sleeps and random jitter.
    pub fn new(
        source: Arc<dyn OverpassSource>,
        rotator: EndpointRotator,
        cache: Arc<CacheStore>,
    ) -> Self {
        Self::with_runtime(source, rotator, cache, ExecutorRuntime::default())
    }

    /// Build an executor with injected runtime abstractions.
    pub fn with_runtime(
        source: Arc<dyn OverpassSource>,
        rotator: EndpointRotator,
        cache: Arc<CacheStore>,
        runtime: ExecutorRuntime,
    ) -> Self {
        Self {
            source,
            rotator,
            cache,
            policy: BackoffPolicy::default(),
            sleeper: runtime.sleeper,
            jitter: runtime.jitter,
        }
    }

    /// Replace the backoff policy.
    #[must_use]
    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sleeper shared with collaborators that pace their own work.
    pub fn sleeper(&self) -> Arc<dyn Sleeper> {
        Arc::clone(&self.sleeper)
    }

    /// Run `query`, serving it from cache when possible.
    ///
    /// At most `retry_budget + 1` attempts are made. Successful responses are
    /// cached; failures never are.
    ///
    /// # Errors
    ///
    /// - [`QueryError::Cancelled`] when the token fires before or during any
    ///   attempt or wait.
    /// - [`QueryError::NonRetryableUpstream`] on the first non-retryable status.
    /// - [`QueryError::ExhaustedRetries`] carrying the last failure otherwise.
    pub async fn execute(&self, query: &str, options: &QueryOptions) -> Result<Value, QueryError> {
        if let Some(cached) = self.cache.get(query) {
            return Ok(cached);
        }
        debug!("query cache miss");

        let cancel = options.cancel.clone().unwrap_or_default();
        let mut attempt = 0_u32;
        loop {
            if cancel.is_cancelled() {
                return Err(QueryError::cancelled());
            }
            let endpoint = self.rotator.next();
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(QueryError::cancelled()),
                outcome = self.source.post_query(endpoint, query) => outcome,
            };

            let error = match outcome {
                Ok(document) => {
                    self.populate_cache(query, document.clone());
                    return Ok(document);
                }
                Err(error) => AttemptError::from(error),
            };

            match error {
                AttemptError::Rejected { status, message } => {
                    warn!(%endpoint, status, "overpass rejected query");
                    return Err(QueryError::non_retryable_upstream(status, message));
                }
                AttemptError::Retryable(error) if attempt >= options.retry_budget => {
                    warn!(%endpoint, attempts = attempt + 1, error = %error, "overpass retries exhausted");
                    return Err(QueryError::exhausted_retries(attempt + 1, error));
                }
                AttemptError::Retryable(error) => {
                    let delay =
                        self.policy
                            .delay_for(attempt, error.retry_after(), self.jitter.as_ref());
                    debug!(
                        %endpoint,
                        attempt,
                        kind = error.kind(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "retrying overpass query",
                    );
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(QueryError::cancelled()),
                        () = self.sleeper.sleep(delay) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }

    fn populate_cache(&self, query: &str, document: Value) {
        if let Err(error) = self.cache.put(query, document) {
            warn!(error = %error, "caching in memory only");
        }
    }
}
