use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use backend::{
    cli::{Cli, Command, SelloutArgs, WatchAction},
    config::AppConfig,
    notify::build_notifier,
    report::{ReportService, StaticMetricsProvider},
    ticketing::TicketingClient,
};
use clap::Parser;
use common::logger::init_logger;
use common::time::now_ms;
use demand::{ArtistMetricSnapshot, CompositeScorer};
use scheduler::{PacedSource, SurgeScheduler};
use tokio_util::sync::CancellationToken;
use watch::WatchRegistry;
use watch::store::sqlite_store::SqliteWatchStore;

async fn open_store(cfg: &AppConfig) -> anyhow::Result<Arc<SqliteWatchStore>> {
    let store = SqliteWatchStore::new(&cfg.database_url)
        .await
        .with_context(|| format!("opening {}", cfg.database_url))?;
    Ok(Arc::new(store))
}

/// The ticketing client behind the process-wide pacing and backoff.
fn paced_ticketing(client: TicketingClient, cfg: &AppConfig) -> Arc<PacedSource> {
    Arc::new(PacedSource::new(Arc::new(client), &cfg.scheduler_config()))
}

/// Runs the scheduler until Ctrl-C, then lets the current step wind down.
async fn run(cfg: &AppConfig) -> anyhow::Result<()> {
    let store = open_store(cfg).await?;

    let client = TicketingClient::from_config(cfg)?;
    if client.is_degraded() {
        tracing::warn!("TICKETMASTER_API_KEY not set; no events will be found");
    }

    let scheduler = Arc::new(
        SurgeScheduler::new(
            cfg.scheduler_config(),
            store.clone(),
            store.clone(),
            paced_ticketing(client, cfg),
            build_notifier(cfg)?,
        )
        .with_sightings(store.clone()),
    );

    let cancel = CancellationToken::new();
    let mut worker = {
        let scheduler = Arc::clone(&scheduler);
        let cancel = cancel.clone();
        tokio::spawn(async move { scheduler.run(cancel).await })
    };

    let outcome = tokio::select! {
        res = &mut worker => res,
        res = tokio::signal::ctrl_c() => {
            res.context("listening for ctrl-c")?;
            tracing::info!("Shutdown signal received");
            cancel.cancel();
            worker.await
        }
    };

    outcome.context("scheduler task panicked")??;
    Ok(())
}

async fn watch_cmd(cfg: &AppConfig, action: WatchAction) -> anyhow::Result<()> {
    let store = open_store(cfg).await?;
    let registry = WatchRegistry::with_limits(store, cfg.max_surge_artists, cfg.default_watch_days);
    let now = now_ms();

    match action {
        WatchAction::Add { artist, days } => {
            let watch = registry.add_watch(&artist, days, now).await?;
            println!("{}", serde_json::to_string_pretty(&watch)?);
        }
        WatchAction::Remove { artist } => {
            registry.remove_watch(&artist).await?;
            println!("removed {artist}");
        }
        WatchAction::List => {
            let watches = registry.list_watches(now).await?;
            println!("{}", serde_json::to_string_pretty(&watches)?);
        }
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn score(cfg: &AppConfig, file: &Path) -> anyhow::Result<()> {
    let snapshot: ArtistMetricSnapshot = read_json(file)?;
    let score = CompositeScorer::new(cfg.label_bands).score(&snapshot);
    println!("{}", serde_json::to_string_pretty(&score)?);
    Ok(())
}

fn read_weights(path: Option<&Path>) -> anyhow::Result<BTreeMap<String, f64>> {
    match path {
        Some(path) => read_json(path),
        None => Ok(BTreeMap::new()),
    }
}

async fn report(
    cfg: &AppConfig,
    artist: &str,
    metrics: Option<&Path>,
    limit: usize,
    weights: Option<&Path>,
) -> anyhow::Result<()> {
    let store = open_store(cfg).await?;

    let mut service = ReportService::from_config(cfg)
        .with_sightings(store)
        .with_city_limit(limit)
        .with_city_weights(read_weights(weights)?);

    if let Some(path) = metrics {
        let snapshots: Vec<ArtistMetricSnapshot> = read_json(path)?;
        for provider in StaticMetricsProvider::from_snapshots(&snapshots) {
            service = service.with_provider(Arc::new(provider));
        }
    }

    let client = TicketingClient::from_config(cfg)?;
    if !client.is_degraded() {
        service = service.with_live_events(paced_ticketing(client, cfg));
    }

    let report = service.artist_report(artist).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn sellout(cfg: &AppConfig, args: &SelloutArgs) -> anyhow::Result<()> {
    let service =
        ReportService::from_config(cfg).with_city_weights(read_weights(args.weights.as_deref())?);
    let estimate = service.sellout_probability(&args.event(), args.signals());

    println!("{}", serde_json::to_string_pretty(&estimate)?);
    println!("{}%: {}", estimate.probability(), estimate.outlook.summary());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = AppConfig::from_env()?;

    init_logger("surge-watch", cfg.json_logs);

    match cli.command {
        Command::Run => {
            tracing::info!("Starting surge watch scheduler...");
            run(&cfg).await
        }
        Command::Watch { action } => watch_cmd(&cfg, action).await,
        Command::Score { file } => score(&cfg, &file),
        Command::Report {
            artist,
            metrics,
            limit,
            weights,
        } => report(&cfg, &artist, metrics.as_deref(), limit, weights.as_deref()).await,
        Command::Sellout(args) => sellout(&cfg, &args),
    }
}
