//! Stop locator entry-point: loads settings, wires adapters, runs one command.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use mockable::{Clock, DefaultClock};
use ortho_config::OrthoConfig;
use serde_json::json;
use tokio::runtime::Builder;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use stop_locator::config::LocatorSettings;
use stop_locator::domain::ports::{NoticeSink, OverpassSource};
use stop_locator::domain::{
    CacheStore, CrawlSummary, EndpointRotator, GeoRect, GeoRectError, MasterIndex, QueryExecutor,
    RegionPrefetcher, SearchOutcome, Station, StationSearch, ViewportLoad, ViewportLoader,
    ViewportOutcome, ViewportSession,
};
use stop_locator::outbound::cache::FsCacheTier;
use stop_locator::outbound::geocoder::{NominatimGeocoder, NominatimIdentity};
use stop_locator::outbound::notices::TracingNoticeSink;
use stop_locator::outbound::overpass::OverpassHttpSource;

/// `stop-locator` command arguments.
#[derive(Debug, Parser)]
#[command(
    name = "stop-locator",
    about = "Locate public-transport stops from Overpass mirrors with caching and retries",
    version
)]
struct CliArgs {
    /// Emit logs as JSON lines.
    #[arg(long = "json-logs", global = true)]
    json_logs: bool,
    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load the stops visible in one viewport.
    Stops {
        /// Viewport bounds as `south,west,north,east`.
        #[arg(long, value_name = "s,w,n,e", value_parser = parse_bounds)]
        bounds: GeoRect,
        /// Map zoom level; defaults to the configured minimum.
        #[arg(long)]
        zoom: Option<u8>,
    },
    /// Crawl the whole region into the master index.
    Prefetch,
    /// Search stops by name, falling back to a place lookup.
    Search {
        /// Free-text query.
        text: String,
        /// Search the empty index instead of crawling the region first.
        #[arg(long = "no-prefetch")]
        no_prefetch: bool,
    },
}

fn parse_bounds(raw: &str) -> Result<GeoRect, GeoRectError> {
    GeoRect::parse(raw)
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = CliArgs::parse();
    init_tracing(args.json_logs);

    // Settings come from the environment and config files only; the command
    // line belongs to clap.
    let settings = LocatorSettings::load_from_iter([OsString::from("stop-locator")])
        .map_err(|error| eyre!("failed to load settings: {error}"))?;

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("failed to build Tokio runtime")?;
    runtime.block_on(run(args, settings))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    let initialised = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(error) = initialised {
        eprintln!("tracing init failed: {error}");
    }
}

async fn run(args: CliArgs, settings: LocatorSettings) -> Result<()> {
    let region = settings.region()?;
    let executor = build_executor(&settings)?;
    let notices: Arc<dyn NoticeSink> = Arc::new(TracingNoticeSink);

    match args.command {
        Command::Stops { bounds, zoom } => {
            let loader = ViewportLoader::new(executor, notices)
                .with_retry_budget(settings.retry_budget())
                .with_query_timeout(settings.query_timeout_secs());
            let session = ViewportSession::new(Arc::new(loader), region)
                .with_min_zoom(settings.min_zoom());
            let outcome = session
                .refresh(&bounds, zoom.unwrap_or_else(|| settings.min_zoom()))
                .await;
            print_viewport(&outcome, args.json);
        }
        Command::Prefetch => {
            let index = Arc::new(MasterIndex::new());
            let summary = prefetch(&settings, executor, index, &region).await?;
            print_summary(&summary, args.json);
        }
        Command::Search { text, no_prefetch } => {
            let index = Arc::new(MasterIndex::new());
            if !no_prefetch {
                prefetch(&settings, executor, Arc::clone(&index), &region).await?;
            }
            let geocoder = NominatimGeocoder::new(
                settings.geocoder_url()?,
                settings.request_timeout(),
                nominatim_identity(&settings),
            )
            .wrap_err("failed to build Nominatim client")?;
            let search = StationSearch::new(index, Arc::new(geocoder), notices, region);
            let outcome = search.search(&text).await;
            print_search(&outcome, args.json);
        }
    }
    Ok(())
}

fn build_executor(settings: &LocatorSettings) -> Result<Arc<QueryExecutor>> {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let cache = match settings.cache_dir.as_deref() {
        Some(path) => {
            let tier = FsCacheTier::open(path)
                .wrap_err_with(|| format!("failed to open cache directory {}", path.display()))?;
            CacheStore::with_durable(clock, Arc::new(tier))
        }
        None => CacheStore::in_memory(clock),
    };
    let source = match settings.user_agent() {
        Some(agent) => OverpassHttpSource::with_user_agent(settings.request_timeout(), agent),
        None => OverpassHttpSource::new(settings.request_timeout()),
    }
    .wrap_err("failed to build Overpass client")?;
    let source: Arc<dyn OverpassSource> = Arc::new(source);
    let rotator = EndpointRotator::new(settings.endpoints()?)?;
    Ok(Arc::new(QueryExecutor::new(source, rotator, Arc::new(cache))))
}

fn nominatim_identity(settings: &LocatorSettings) -> NominatimIdentity {
    let defaults = NominatimIdentity::default();
    NominatimIdentity {
        user_agent: settings
            .user_agent()
            .map_or(defaults.user_agent, str::to_owned),
        country_codes: settings.country_codes(),
        ..defaults
    }
}

async fn prefetch(
    settings: &LocatorSettings,
    executor: Arc<QueryExecutor>,
    index: Arc<MasterIndex>,
    region: &GeoRect,
) -> Result<CrawlSummary> {
    let prefetcher = RegionPrefetcher::new(executor, index, settings.prefetch_config());
    let mut progress = prefetcher.subscribe();

    let stop = CancellationToken::new();
    let stop_on_signal = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop_on_signal.cancel();
        }
    });

    let crawl = prefetcher.run(region, Some(stop));
    tokio::pin!(crawl);
    let summary = loop {
        tokio::select! {
            summary = &mut crawl => break summary?,
            changed = progress.changed() => {
                if changed.is_err() {
                    break (&mut crawl).await?;
                }
                let current = *progress.borrow_and_update();
                info!(
                    tiles_done = current.tiles_done,
                    tiles_total = current.tiles_total,
                    stations = current.entities_so_far,
                    "prefetch progress"
                );
            }
        }
    };
    Ok(summary)
}

fn station_json(station: &Station) -> serde_json::Value {
    json!({
        "id": station.id.get(),
        "name": station.name,
        "lat": station.lat,
        "lng": station.lng,
    })
}

fn print_stations(stations: &[Station], json: bool) {
    if json {
        let rows = stations.iter().map(station_json).collect::<Vec<_>>();
        println!("{}", serde_json::Value::Array(rows));
        return;
    }
    for station in stations {
        println!(
            "{}\t{}\t{:.6}\t{:.6}",
            station.id, station.name, station.lat, station.lng
        );
    }
}

fn status_line(status: &str, json: bool) -> String {
    if json {
        json!({ "status": status }).to_string()
    } else {
        format!("status={status}")
    }
}

fn print_status(status: &str, json: bool) {
    println!("{}", status_line(status, json));
}

fn viewport_status(outcome: &ViewportOutcome) -> Option<&'static str> {
    match outcome {
        ViewportOutcome::Fetched(ViewportLoad::Loaded(_)) => None,
        ViewportOutcome::BelowMinZoom => Some("below_min_zoom"),
        ViewportOutcome::OutsideRegion => Some("outside_region"),
        ViewportOutcome::Unchanged => Some("unchanged"),
        ViewportOutcome::Fetched(ViewportLoad::Skipped) => Some("skipped"),
        ViewportOutcome::Fetched(ViewportLoad::Cancelled) => Some("cancelled"),
        ViewportOutcome::Fetched(ViewportLoad::Unavailable) => Some("unavailable"),
    }
}

fn print_viewport(outcome: &ViewportOutcome, json: bool) {
    match (outcome, viewport_status(outcome)) {
        (ViewportOutcome::Fetched(ViewportLoad::Loaded(stations)), _) => {
            print_stations(stations, json);
        }
        (_, Some(status)) => print_status(status, json),
        (_, None) => {}
    }
}

fn print_summary(summary: &CrawlSummary, json: bool) {
    if json {
        println!(
            "{}",
            json!({
                "tiles_total": summary.tiles_total,
                "tiles_done": summary.tiles_done,
                "failed_tiles": summary.failed_tiles,
                "stations": summary.stations,
                "completed": summary.completed,
            })
        );
        return;
    }
    println!("tiles_total={}", summary.tiles_total);
    println!("tiles_done={}", summary.tiles_done);
    println!("failed_tiles={}", summary.failed_tiles);
    println!("stations={}", summary.stations);
    println!("completed={}", summary.completed);
}

fn print_search(outcome: &SearchOutcome, json: bool) {
    match outcome {
        SearchOutcome::Stations { hits, partial } => {
            if json {
                let rows = hits.iter().map(station_json).collect::<Vec<_>>();
                println!("{}", json!({ "partial": partial, "stations": rows }));
                return;
            }
            if *partial {
                println!("partial=true");
            }
            print_stations(hits, false);
        }
        SearchOutcome::Place {
            point,
            inside_region,
        } => {
            if json {
                println!(
                    "{}",
                    json!({ "lat": point.lat, "lng": point.lng, "inside_region": inside_region })
                );
            } else {
                println!("place={:.6},{:.6}", point.lat, point.lng);
                println!("inside_region={inside_region}");
            }
        }
        SearchOutcome::NotFound => print_status("not_found", json),
        SearchOutcome::Empty => print_status("empty", json),
    }
}
