//! Geo-Harvest main entry point
//!
//! This is the command-line interface for the Geo-Harvest photo geolocation
//! harvester.

use clap::Parser;
use geo_harvest::config::{load_config_with_hash, validate, Config};
use geo_harvest::logging::init_logging;
use geo_harvest::output::{load_statistics, print_statistics, print_summary};
use geo_harvest::storage::{open_storage, RecordSink, RunStatus, RunTotals};
use geo_harvest::{Coordinator, HarvestError};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Geo-Harvest: a concurrent photo geolocation harvester
///
/// Geo-Harvest visits listing pages, discovers the photos they embed, and
/// fetches every photo page concurrently to record its coordinates in a
/// SQLite database.
#[derive(Parser, Debug)]
#[command(name = "geo-harvest")]
#[command(version)]
#[command(about = "A concurrent photo geolocation harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Override the configured number of workers
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Listing page to harvest; replaces the configured seeds (repeatable)
    #[arg(long = "seed", value_name = "URL")]
    seeds: Vec<String>,

    /// Validate config and show what would be harvested without fetching anything
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    apply_overrides(&mut config, &cli)?;
    init_logging(&config.logging, cli.verbose, cli.quiet)?;
    tracing::info!(
        "Configuration loaded from {} (hash: {})",
        cli.config.display(),
        config_hash
    );

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, &config_hash).await?;
    }

    Ok(())
}

/// Applies command-line overrides and validates the result again
fn apply_overrides(config: &mut Config, cli: &Cli) -> Result<(), HarvestError> {
    if let Some(workers) = cli.workers {
        config.crawler.worker_count = Some(workers);
    }
    if !cli.seeds.is_empty() {
        config.seeds = cli.seeds.clone();
    }
    validate(config)?;
    Ok(())
}

/// Handles the --dry-run mode: shows the resolved configuration
fn handle_dry_run(config: &Config) {
    println!("=== Geo-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Workers: {}", config.crawler.effective_worker_count());
    println!("  Retry policy: {:?}", config.crawler.retry_policy);
    println!("  Max attempts: {}", config.crawler.max_attempts);
    println!(
        "  Timeouts: {}s request, {}s connect",
        config.crawler.request_timeout_secs, config.crawler.connect_timeout_secs
    );
    match config.crawler.queue_bound() {
        Some(bound) => println!("  Queue capacity: {}", bound),
        None => println!("  Queue capacity: unbounded"),
    }

    println!("\nUser Agent: {}", config.user_agent.header_value());
    println!("Site: {}", config.site.base_url);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!(
        "  Log: {} ({})",
        config.logging.destination.as_deref().unwrap_or("stderr"),
        config.logging.level
    );

    println!("\nSeeds ({}):", config.seeds.len());
    for seed in &config.seeds {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), HarvestError> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main harvest operation
async fn handle_crawl(config: Config, config_hash: &str) -> Result<(), HarvestError> {
    let storage = Arc::new(open_storage(Path::new(&config.output.database_path))?);
    let run_id = storage.begin_run(config_hash)?;
    tracing::info!("Starting run {}", run_id);

    let sink: Arc<dyn RecordSink> = storage.clone();
    let coordinator = match Coordinator::new(config, sink) {
        Ok(coordinator) => coordinator,
        Err(e) => {
            storage.finish_run(run_id, RunStatus::Failed, &RunTotals::default())?;
            return Err(e);
        }
    };

    let cancel = coordinator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping workers");
            cancel.cancel();
        }
    });

    match coordinator.run().await {
        Ok(summary) => {
            storage.finish_run(run_id, summary.run_status(), &summary.run_totals())?;
            print_summary(&summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            storage.finish_run(run_id, RunStatus::Failed, &RunTotals::default())?;
            Err(e)
        }
    }
}
