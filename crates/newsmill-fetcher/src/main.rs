use newsmill_core::cache::write_snapshot;
use newsmill_core::config::Settings;
use newsmill_core::store::SqliteStore;
use newsmill_core::{Aggregator, InitialLoad, SnapshotOrigin};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

type Error = Box<dyn std::error::Error + Send + Sync>;

/// Embedded `feeds.toml` unless `NEWSMILL_CONFIG` points elsewhere.
fn load_settings() -> Result<Settings, Error> {
    let mut settings = match std::env::var("NEWSMILL_CONFIG") {
        Ok(path) => {
            info!(path = %path, "Loading configuration file");
            Settings::load(&path)?
        }
        Err(_) => Settings::embedded()?,
    };
    if let Ok(path) = std::env::var("FALLBACK_SNAPSHOT") {
        settings.cache.fallback_snapshot = Some(PathBuf::from(path));
    }
    Ok(settings)
}

fn origin_label(origin: SnapshotOrigin) -> &'static str {
    match origin {
        SnapshotOrigin::Live => "live",
        SnapshotOrigin::FreshCache => "fresh-cache",
        SnapshotOrigin::StaleCache => "stale-cache",
        SnapshotOrigin::FallbackSnapshot => "fallback-snapshot",
    }
}

/// One load, refresh and scrape pass. Returns a JSON report of the run.
async fn run_cycle(
    aggregator: &Arc<Aggregator>,
    snapshot_output: Option<&PathBuf>,
) -> Result<serde_json::Value, Error> {
    let InitialLoad {
        articles,
        origin,
        refresh_in_background,
    } = aggregator.initial_load().await?;
    info!(count = articles.len(), origin = origin_label(origin), "Initial load complete");

    if refresh_in_background {
        // A batch run has nothing else to do, so wait for it.
        if let Err(e) = aggregator.spawn_refresh().await {
            warn!(error = %e, "Refresh task panicked");
        }
    }

    let enriched = aggregator.enrich_images().await;
    let articles = aggregator.articles().await;

    if let Some(path) = snapshot_output {
        write_snapshot(path, &articles).await?;
    }

    Ok(serde_json::json!({
        "origin": origin_label(origin),
        "articles": articles.len(),
        "sources": aggregator.sources().await.len(),
        "enriched": enriched,
    }))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings()?;
    let db_path = std::env::var("DATABASE_PATH").unwrap_or_else(|_| "newsmill.db".into());
    let snapshot_output = std::env::var("SNAPSHOT_OUTPUT").ok().map(PathBuf::from);
    let interval = std::env::var("REFRESH_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs);

    info!(
        feeds = settings.feeds.len(),
        db = %db_path,
        "Starting newsmill fetcher"
    );

    let store = Arc::new(SqliteStore::open(&db_path)?);
    let aggregator = Arc::new(Aggregator::new(settings, store)?);

    let Some(interval) = interval else {
        let report = run_cycle(&aggregator, snapshot_output.as_ref()).await?;
        println!("{report}");
        return Ok(());
    };

    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match run_cycle(&aggregator, snapshot_output.as_ref()).await {
                    Ok(report) => info!(report = %report, "Cycle complete"),
                    Err(e) => warn!(error = %e, "Cycle failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                return Ok(());
            }
        }
    }
}
