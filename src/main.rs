//! schoolscrape main entry point
//!
//! This is the command-line interface for the schoolscrape scraper.

use chrono::Utc;
use clap::Parser;
use schoolscrape::config::{load_config_with_hash, Config};
use schoolscrape::downloader::{Delayer, Downloader, HttpSession, RunOutcome};
use schoolscrape::output::{export_datasets, load_statistics, print_statistics};
use schoolscrape::scheduler::{Filter, Scheduler};
use schoolscrape::sites::Stage;
use schoolscrape::storage::{open_storage, CacheSink, RunStatus, Storage};
use schoolscrape::vpn::VpnRotator;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// schoolscrape: a resumable school-data scraper
///
/// Schedules queries from a reference table, downloads and extracts them one
/// at a time behind a rate delay and a rotating network identity, and caches
/// every dataset in SQLite.
#[derive(Parser, Debug)]
#[command(name = "schoolscrape")]
#[command(version)]
#[command(about = "A resumable school-data scraper", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Stage to run
    #[arg(value_enum, value_name = "STAGE")]
    stage: Stage,

    /// Only schedule rows in this two-letter state
    #[arg(long)]
    state: Option<String>,

    /// Schedule rows in this city (repeatable)
    #[arg(long)]
    city: Vec<String>,

    /// Schedule rows in this zipcode (repeatable)
    #[arg(long)]
    zipcode: Vec<String>,

    /// Schedule rows in this county (repeatable)
    #[arg(long)]
    county: Vec<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Reschedule queries even if they were resolved recently
    #[arg(long)]
    fresh: bool,

    /// Validate config and show the resolved queue without scraping
    #[arg(long, conflicts_with_all = ["stats", "export"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export"])]
    stats: bool,

    /// Export cached datasets as CSV and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export: bool,
}

impl Cli {
    fn filter(&self) -> Filter {
        let mut filter = Filter::new();
        if let Some(state) = &self.state {
            filter = filter.state(state.to_uppercase());
        }
        for city in &self.city {
            filter = filter.city(city.as_str());
        }
        for zipcode in &self.zipcode {
            filter = filter.zipcode(zipcode);
        }
        for county in &self.county {
            filter = filter.county(county.as_str());
        }
        filter
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let filter = cli.filter();

    if cli.dry_run {
        handle_dry_run(&config, cli.stage, &filter, cli.fresh)?;
    } else if cli.stats {
        handle_stats(&config, cli.stage)?;
    } else if cli.export {
        handle_export(&config, cli.stage)?;
    } else {
        handle_scrape(config, &config_hash, cli.stage, filter, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("schoolscrape=info,warn"),
            1 => EnvFilter::new("schoolscrape=debug,info"),
            2 => EnvFilter::new("schoolscrape=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn database_path(config: &Config) -> &Path {
    Path::new(&config.output.database_path)
}

/// Keys resolved within the refresh window, unless a fresh run was asked for
fn recent_keys(
    config: &Config,
    storage: &dyn Storage,
    stage: Stage,
    fresh: bool,
) -> Result<HashSet<String>, Box<dyn std::error::Error>> {
    if fresh || config.scraper.refresh_days == 0 {
        return Ok(HashSet::new());
    }

    let since = Utc::now() - chrono::Duration::days(i64::from(config.scraper.refresh_days));
    Ok(storage.fresh_keys(stage.as_str(), since)?)
}

fn scheduler(config: &Config, stage: Stage, skip: HashSet<String>) -> Scheduler {
    Scheduler::new(stage.source(config))
        .randomize(config.scraper.randomize)
        .limit(config.scraper.limit)
        .skip(skip)
}

/// Handles the --dry-run mode: validates config and shows the resolved queue
fn handle_dry_run(
    config: &Config,
    stage: Stage,
    filter: &Filter,
    fresh: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== schoolscrape Dry Run ({}) ===\n", stage);

    println!("Scraper Configuration:");
    println!("  Base URL: {}", config.scraper.base_url);
    println!("  Attempts per query: {}", config.scraper.attempts);
    println!("  Randomize: {}", config.scraper.randomize);
    if let Some(limit) = config.scraper.limit {
        println!("  Limit: {}", limit);
    }
    println!("  Refresh window: {} days", config.scraper.refresh_days);
    println!("  Delay: {:?}", config.delay.method);

    println!("\nVPN:");
    if config.vpn.enabled {
        println!("  Rotations available: {}", config.vpn.max_rotations);
        println!("  Servers: {}", config.vpn.servers.len());
    } else {
        println!("  Disabled");
    }

    let skip = if database_path(config).exists() {
        let storage = open_storage(database_path(config))?;
        recent_keys(config, &storage, stage, fresh)?
    } else {
        HashSet::new()
    };

    let queue = scheduler(config, stage, skip).queue(filter, config.scraper.attempts)?;

    println!("\nQueue ({} queries):", queue.len());
    for entry in queue.entries() {
        println!("  - {}", entry.query);
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config, stage: Stage) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(database_path(config))?;
    let stats = load_statistics(&storage, stage.as_str())?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export mode: writes cached datasets as CSV
fn handle_export(config: &Config, stage: Stage) -> Result<(), Box<dyn std::error::Error>> {
    let dir = Path::new(&config.output.export_dir).join(stage.as_str());
    println!("=== Exporting {} datasets ===\n", stage);
    println!("Database: {}", config.output.database_path);
    println!("Output: {}\n", dir.display());

    let storage = open_storage(database_path(config))?;
    let written = export_datasets(&storage, stage.as_str(), &dir)?;

    for path in &written {
        println!("✓ {}", path.display());
    }
    if written.is_empty() {
        println!("Nothing to export");
    }

    Ok(())
}

/// Handles the main scrape operation
async fn handle_scrape(
    config: Config,
    config_hash: &str,
    stage: Stage,
    filter: Filter,
    fresh: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut storage = open_storage(database_path(&config))?;

    let skip = recent_keys(&config, &storage, stage, fresh)?;
    let queue = scheduler(&config, stage, skip).queue(&filter, config.scraper.attempts)?;
    if queue.is_empty() {
        tracing::info!("Nothing to scrape for {}", stage);
        return Ok(());
    }

    let site = stage.site(&config)?;
    let session = HttpSession::new(config.session.clone())?;
    let vpn = VpnRotator::from_config(&config.vpn);

    let run_id = storage.create_run(stage.as_str(), config_hash)?;
    tracing::info!("Started run #{} ({} queries)", run_id, queue.len());

    let mut downloader = Downloader::new(
        site,
        Box::new(session),
        queue,
        Delayer::from_config(&config.delay),
        vpn,
    )
    .with_referer(config.scraper.referer.clone());

    let result = {
        let mut sink = CacheSink::new(&mut storage, run_id, stage.as_str());
        downloader.run(&mut sink).await
    };

    storage.save_query_states(run_id, stage.as_str(), downloader.queue().entries())?;

    let status = match &result {
        Ok(report) if report.outcome == RunOutcome::Completed => RunStatus::Completed,
        Ok(_) => RunStatus::Terminated,
        Err(_) => RunStatus::Failed,
    };
    storage.finish_run(run_id, status)?;
    downloader.into_vpn().shutdown().await;

    match result {
        Ok(report) => {
            if report.outcome == RunOutcome::Terminated {
                tracing::warn!("Run #{} stopped early: network identity exhausted", run_id);
            }
            println!(
                "Run #{} {}: {} succeeded, {} failed, {} abandoned, {} datasets in {:.1}s",
                run_id,
                status,
                report.summary.success,
                report.summary.failure,
                report.summary.abandoned,
                report.yielded,
                report.elapsed.as_secs_f64()
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Run #{} failed: {}", run_id, e);
            Err(e.into())
        }
    }
}
