//! Behaviour-driven tests for viewport stop loading.

use std::sync::Arc;

use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::{ScenarioState, given, scenario, then, when};
use stop_locator::domain::ports::{Notice, OverpassSourceError};
use stop_locator::domain::{
    CacheStore, EndpointRotator, ExecutorRuntime, GeoRect, QueryExecutor, ViewportLoad,
    ViewportLoader, ViewportOutcome, ViewportSession,
};
use stop_locator::test_support::{
    ImmediateSleeper, NoJitter, RecordingNoticeSink, ScriptedOverpassSource, stop_document,
};
use tokio::runtime::Runtime;
use url::Url;

const VIEW: (f64, f64, f64, f64) = (10.77, 106.69, 10.78, 106.70);

#[derive(Clone)]
struct RuntimeHandle(Arc<Runtime>);

#[derive(Default, ScenarioState)]
struct ViewportWorld {
    runtime: Slot<RuntimeHandle>,
    source: Slot<Arc<ScriptedOverpassSource>>,
    notices: Slot<Arc<RecordingNoticeSink>>,
    session: Slot<Arc<ViewportSession>>,
    outcomes: Slot<Vec<ViewportOutcome>>,
}

impl ViewportWorld {
    fn setup(&self, source: ScriptedOverpassSource) {
        let runtime = Runtime::new().expect("create runtime");
        let source = Arc::new(source);
        let notices = Arc::new(RecordingNoticeSink::default());
        let endpoint = Url::parse("https://overpass.test/api/interpreter").expect("url");
        let executor = QueryExecutor::with_runtime(
            source.clone(),
            EndpointRotator::new(vec![endpoint]).expect("rotator"),
            Arc::new(CacheStore::in_memory(Arc::new(mockable::DefaultClock))),
            ExecutorRuntime {
                sleeper: Arc::new(ImmediateSleeper),
                jitter: Arc::new(NoJitter),
            },
        );
        let loader = ViewportLoader::new(Arc::new(executor), notices.clone()).with_retry_budget(1);
        let region = GeoRect::new(10.3, 106.35, 11.2, 107.05).expect("valid region");
        let session = ViewportSession::new(Arc::new(loader), region);

        self.runtime.set(RuntimeHandle(Arc::new(runtime)));
        self.source.set(source);
        self.notices.set(notices);
        self.session.set(Arc::new(session));
        self.outcomes.set(Vec::new());
    }

    fn refresh(&self, offset: f64, zoom: u8) {
        let RuntimeHandle(runtime) = self.runtime.get().expect("runtime should be set");
        let session = self.session.get().expect("session should be set");
        let (south, west, north, east) = VIEW;
        let view = GeoRect::new(south + offset, west + offset, north + offset, east + offset)
            .expect("valid view");
        let outcome = runtime.block_on(session.refresh(&view, zoom));
        let mut outcomes = self.outcomes.get().unwrap_or_default();
        outcomes.push(outcome);
        self.outcomes.set(outcomes);
    }

    fn last_outcome(&self) -> ViewportOutcome {
        self.outcomes
            .get()
            .and_then(|outcomes| outcomes.last().cloned())
            .expect("a refresh should have run")
    }
}

#[fixture]
fn world() -> ViewportWorld {
    ViewportWorld::default()
}

#[given("a viewport loader whose source repeats stop {id}")]
fn a_viewport_loader_whose_source_repeats_stop(world: &ViewportWorld, id: i64) {
    world.setup(ScriptedOverpassSource::responding_with(move |_| {
        Ok(stop_document(&[
            (id, "Ben Thanh"),
            (id + 1, "Ham Nghi"),
            (id, "Ben Thanh"),
        ]))
    }));
}

#[given("a viewport loader whose source always fails")]
fn a_viewport_loader_whose_source_always_fails(world: &ViewportWorld) {
    world.setup(ScriptedOverpassSource::responding_with(|_| {
        Err(OverpassSourceError::transport("connection reset"))
    }));
}

#[when("the viewport is refreshed at zoom {zoom}")]
fn the_viewport_is_refreshed_at_zoom(world: &ViewportWorld, zoom: u8) {
    world.refresh(0.0, zoom);
}

#[when("the viewport is nudged slightly and refreshed at zoom {zoom}")]
fn the_viewport_is_nudged_slightly(world: &ViewportWorld, zoom: u8) {
    world.refresh(0.000_01, zoom);
}

#[then("the viewport shows {count} stops")]
fn the_viewport_shows_stops(world: &ViewportWorld, count: usize) {
    let ViewportOutcome::Fetched(ViewportLoad::Loaded(stations)) = world.last_outcome() else {
        panic!("viewport should have loaded");
    };
    assert_eq!(stations.len(), count);
}

#[then("no notices were emitted")]
fn no_notices_were_emitted(world: &ViewportWorld) {
    let notices = world.notices.get().expect("notices should be set");
    assert!(notices.notices().is_empty());
}

#[then("the viewport is below the minimum zoom")]
fn the_viewport_is_below_the_minimum_zoom(world: &ViewportWorld) {
    assert_eq!(world.last_outcome(), ViewportOutcome::BelowMinZoom);
}

#[then("the source was not queried")]
fn the_source_was_not_queried(world: &ViewportWorld) {
    let source = world.source.get().expect("source should be set");
    assert_eq!(source.calls(), 0);
}

#[then("the second refresh is unchanged")]
fn the_second_refresh_is_unchanged(world: &ViewportWorld) {
    assert_eq!(world.last_outcome(), ViewportOutcome::Unchanged);
}

#[then("the source was queried {count} times")]
fn the_source_was_queried(world: &ViewportWorld, count: usize) {
    let source = world.source.get().expect("source should be set");
    assert_eq!(source.calls(), count);
}

#[then("the viewport is unavailable")]
fn the_viewport_is_unavailable(world: &ViewportWorld) {
    assert_eq!(
        world.last_outcome(),
        ViewportOutcome::Fetched(ViewportLoad::Unavailable)
    );
}

#[then("a stops-unavailable notice was emitted")]
fn a_stops_unavailable_notice_was_emitted(world: &ViewportWorld) {
    let notices = world.notices.get().expect("notices should be set");
    assert_eq!(notices.notices(), [Notice::StopsUnavailable]);
}

#[scenario(
    path = "tests/features/viewport_loading.feature",
    name = "Duplicate stops in a viewport are collapsed"
)]
fn duplicate_stops_in_a_viewport_are_collapsed(world: ViewportWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/viewport_loading.feature",
    name = "Zoomed-out views do not query the upstream"
)]
fn zoomed_out_views_do_not_query_the_upstream(world: ViewportWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/viewport_loading.feature",
    name = "Panning within the same quantized view is ignored"
)]
fn panning_within_the_same_quantized_view_is_ignored(world: ViewportWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/viewport_loading.feature",
    name = "An unavailable upstream produces a notice"
)]
fn an_unavailable_upstream_produces_a_notice(world: ViewportWorld) {
    drop(world);
}
