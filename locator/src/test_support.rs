//! Shared test doubles for unit and integration tests.
//!
//! Compiled for `cfg(test)` and for the `test-support` feature, which the
//! crate's own dev-dependency enables for `tests/`.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, Utc};
use mockable::Clock;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::sync::Notify;
use url::Url;

use crate::domain::ports::{
    CachedPayload, DurableCacheError, DurableCacheTier, Notice, NoticeSink, OverpassSource,
    OverpassSourceError, QueryCacheKey,
};
use crate::domain::{BackoffJitter, Sleeper};
use crate::outbound::cache::FsCacheTier;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clock that only moves when told to.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    /// Clock frozen at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let delta = match TimeDelta::from_std(delta) {
            Ok(delta) => delta,
            Err(error) => {
                panic!("failed to convert Duration to TimeDelta: {error}; delta={delta:?}")
            }
        };
        *lock(&self.0) += delta;
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *lock(&self.0)
    }
}

/// Sleeper that returns at once.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateSleeper;

#[async_trait]
impl Sleeper for ImmediateSleeper {
    async fn sleep(&self, _duration: Duration) {}
}

/// Sleeper that returns at once and remembers every requested wait.
#[derive(Default)]
pub struct RecordingSleeper(Mutex<Vec<Duration>>);

impl RecordingSleeper {
    /// Waits requested so far, in order.
    pub fn recorded(&self) -> Vec<Duration> {
        lock(&self.0).clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        lock(&self.0).push(duration);
    }
}

/// Jitter that always returns the base delay.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoJitter;

impl BackoffJitter for NoJitter {
    fn jittered_delay(&self, base: Duration, _bound: Duration) -> Duration {
        base
    }
}

type Responder = Box<dyn Fn(&str) -> Result<Value, OverpassSourceError> + Send + Sync>;

/// Overpass source replaying scripted outcomes.
///
/// Scripted results are consumed first; afterwards the optional responder
/// answers, and without one the source rejects the query. A gated source
/// blocks every call until the gate is notified.
pub struct ScriptedOverpassSource {
    scripted: Mutex<VecDeque<Result<Value, OverpassSourceError>>>,
    responder: Option<Responder>,
    calls: AtomicUsize,
    endpoints: Mutex<Vec<Url>>,
    queries: Mutex<Vec<String>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedOverpassSource {
    /// Source replaying `scripted` in order.
    pub fn scripted(scripted: Vec<Result<Value, OverpassSourceError>>) -> Self {
        Self {
            scripted: Mutex::new(scripted.into()),
            responder: None,
            calls: AtomicUsize::new(0),
            endpoints: Mutex::new(Vec::new()),
            queries: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Source answering every query through `responder`.
    pub fn responding_with<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Result<Value, OverpassSourceError> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::scripted(Vec::new())
        }
    }

    /// Block each call until `gate` is notified.
    #[must_use]
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Endpoints called, in order.
    pub fn endpoints(&self) -> Vec<Url> {
        lock(&self.endpoints).clone()
    }

    /// Query bodies received, in order.
    pub fn queries(&self) -> Vec<String> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl OverpassSource for ScriptedOverpassSource {
    async fn post_query(&self, endpoint: &Url, query: &str) -> Result<Value, OverpassSourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.endpoints).push(endpoint.clone());
        lock(&self.queries).push(query.to_owned());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(next) = lock(&self.scripted).pop_front() {
            return next;
        }
        match &self.responder {
            Some(responder) => responder(query),
            None => Err(OverpassSourceError::rejected(
                500_u16,
                "source script exhausted unexpectedly",
            )),
        }
    }
}

/// Build an Overpass document holding one bus-stop node per `(id, name)`.
pub fn stop_document(stops: &[(i64, &str)]) -> Value {
    let elements = stops
        .iter()
        .map(|(id, name)| {
            json!({
                "type": "node",
                "id": id,
                "lat": 10.77,
                "lon": 106.69,
                "tags": { "highway": "bus_stop", "name": name },
            })
        })
        .collect::<Vec<_>>();
    json!({ "version": 0.6, "elements": elements })
}

/// Notice sink that keeps every notice in order.
#[derive(Default)]
pub struct RecordingNoticeSink(Mutex<Vec<Notice>>);

impl RecordingNoticeSink {
    /// Notices received, in order.
    pub fn notices(&self) -> Vec<Notice> {
        lock(&self.0).clone()
    }
}

impl NoticeSink for RecordingNoticeSink {
    fn notify(&self, notice: Notice) {
        lock(&self.0).push(notice);
    }
}

/// In-memory durable tier with optional write failures.
#[derive(Default)]
pub struct MemoryDurableTier {
    entries: Mutex<HashMap<QueryCacheKey, CachedPayload>>,
    loads: AtomicUsize,
    reject_writes: bool,
}

impl MemoryDurableTier {
    /// Tier whose writes always fail, as a full or denied store would.
    pub fn rejecting_writes() -> Self {
        Self {
            reject_writes: true,
            ..Self::default()
        }
    }

    /// Loads served so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Whether `key` has been stored.
    pub fn contains(&self, key: &QueryCacheKey) -> bool {
        lock(&self.entries).contains_key(key)
    }
}

impl DurableCacheTier for MemoryDurableTier {
    fn load(&self, key: &QueryCacheKey) -> Result<Option<CachedPayload>, DurableCacheError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn store(&self, key: &QueryCacheKey, entry: &CachedPayload) -> Result<(), DurableCacheError> {
        if self.reject_writes {
            return Err(DurableCacheError::storage("quota exceeded"));
        }
        lock(&self.entries).insert(key.clone(), entry.clone());
        Ok(())
    }

    fn evict(&self, key: &QueryCacheKey) -> Result<(), DurableCacheError> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}

/// Filesystem cache tier rooted in a fresh temporary directory.
///
/// Keep the returned [`TempDir`] alive for as long as the tier is used.
pub fn temp_cache_tier() -> io::Result<(TempDir, FsCacheTier)> {
    let dir = tempfile::tempdir()?;
    let tier = FsCacheTier::open(dir.path())?;
    Ok((dir, tier))
}
