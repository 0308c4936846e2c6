use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use listing_watcher::config::{AppConfig, LoggingConfig};
use listing_watcher::core::{locale, DomainAggregator, ListingExtractor};
use listing_watcher::models::Listing;
use listing_watcher::plugins::PluginManager;
use listing_watcher::scheduler::{CycleRunner, WatchScheduler};
use listing_watcher::scraper::HttpPageFetcher;
use listing_watcher::storage::open_backend;

#[derive(Parser)]
#[command(name = "listing-watcher", version, about = "Watches marketplace searches across country mirrors")]
struct Cli {
    /// Directory holding default.toml and its overrides
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Poll on the configured interval until interrupted
    Run,
    /// Run a single cycle and print the new listings
    Once {
        /// Skip notifications and leave the watermark cache untouched
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate configuration, list every mirror and test notifier connections
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = AppConfig::from_dir(&cli.config_dir)
        .with_context(|| format!("Failed to load configuration from {}", cli.config_dir.display()))?;
    let _log_guard = init_tracing(&config.logging);

    if config.metrics.enabled {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], config.metrics.port))
            .install()
            .context("Failed to start metrics exporter")?;
        info!("Serving metrics on port {}", config.metrics.port);
    }

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Once { dry_run } => once(config, dry_run).await,
        Command::CheckConfig => check_config(&config).await,
    }
}

fn init_tracing(logging: &LoggingConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let (file_layer, guard) = match &logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &logging.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "listing_watcher=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}

async fn build_runner(config: &AppConfig, dry_run: bool) -> Result<CycleRunner> {
    let fetcher = Arc::new(HttpPageFetcher::new(&config.scraper)?);
    let extractor = ListingExtractor::new(&config.extraction)?;
    let aggregator = DomainAggregator::new(
        fetcher,
        extractor,
        Duration::from_millis(config.scraper.mirror_delay_ms),
    );

    let plugins = if dry_run {
        PluginManager::new()
    } else {
        PluginManager::from_config(&config.notifications).await?
    };

    let backend = open_backend(&config.cache).await?;
    CycleRunner::new(aggregator, config.search_targets()?, backend, plugins).await
}

async fn run(config: AppConfig) -> Result<()> {
    info!("Starting Listing Watcher with {} search(es)", config.searches.len());

    let runner = build_runner(&config, false).await?;
    let mut scheduler = WatchScheduler::new(runner, config.scheduler.clone()).await?;
    scheduler.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    if scheduler.is_running() {
        info!("Waiting for the running cycle to finish");
    }
    scheduler.shutdown().await?;

    let stats = scheduler.stats().await;
    info!(
        "Ran {} cycle(s), {} listing(s) found, {} notified",
        stats.runs, stats.listings_found, stats.notifications_sent
    );
    Ok(())
}

async fn once(config: AppConfig, dry_run: bool) -> Result<()> {
    let mut runner = build_runner(&config, dry_run).await?;

    if dry_run {
        let listings = runner.preview().await;
        print_listings(&listings);
        return Ok(());
    }

    let report = runner.run_cycle().await;
    print_listings(&report.listings);
    for error in &report.errors {
        eprintln!("error: {}", error);
    }
    runner.shutdown().await?;

    if !report.persisted {
        anyhow::bail!("New watermarks could not be persisted");
    }
    Ok(())
}

fn print_listings(listings: &[Listing]) {
    if listings.is_empty() {
        println!("No new listings");
        return;
    }
    for listing in listings {
        println!(
            "{}  {}  {}  {}",
            listing.published_at.format("%Y-%m-%d %H:%M"),
            listing.price,
            listing.title,
            listing.url
        );
    }
}

async fn check_config(config: &AppConfig) -> Result<()> {
    for target in config.search_targets()? {
        println!("{}", target.name());
        for mirror in target.mirrors() {
            match mirror {
                Ok(mirror) => {
                    let locale = locale::resolve(&mirror.domain_code)?;
                    println!("  {:<8} {:<12} {}", mirror.domain_code, locale, mirror.url);
                }
                Err(e) => println!("  {}", e),
            }
        }
    }

    let plugins = PluginManager::from_config(&config.notifications).await?;
    if plugins.is_empty().await {
        println!("No notifier configured");
    } else {
        println!("Notifiers: {}", plugins.list_notifier_types().await.join(", "));
        for (plugin_type, reachable) in plugins.test_connections().await {
            println!("  {:<10} {}", plugin_type, if reachable { "ok" } else { "unreachable" });
        }
    }
    plugins.shutdown().await?;

    println!("Configuration OK");
    Ok(())
}
