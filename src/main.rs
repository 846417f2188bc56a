//! Airport-Harvest main entry point
//!
//! This is the command-line interface for the airport directory harvester.

use airport_harvest::config::{load_config_with_hash, Config};
use airport_harvest::output::{export_all, print_records_summary, print_snapshot};
use airport_harvest::storage::open_store;
use airport_harvest::{Coordinator, CrawlState};
use anyhow::{bail, Context};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Airport-Harvest: a resumable airport directory harvester
///
/// Airport-Harvest walks the listing pages of an airport directory, fetches
/// every record's detail page through rotating gateways, and caches results
/// after every chunk so an interrupted session can be exported later.
#[derive(Parser, Debug)]
#[command(name = "airport-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resumable airport directory harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Listing page to start from (overrides crawler.entry-url)
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Detail pages fetched concurrently (1-50, overrides crawler.concurrency)
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be harvested without any network access
    #[arg(long, conflicts_with = "export_cached")]
    dry_run: bool,

    /// Export the cached session as JSON and CSV and exit
    #[arg(long, conflicts_with = "dry_run")]
    export_cached: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config, &cli);
        return Ok(());
    }

    if cli.export_cached {
        return handle_export_cached(&config);
    }

    handle_harvest(&config, &cli).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("airport_harvest=info,warn"),
            1 => EnvFilter::new("airport_harvest=debug,info"),
            2 => EnvFilter::new("airport_harvest=trace,debug"),
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

fn entry_url<'a>(config: &'a Config, cli: &'a Cli) -> Option<&'a str> {
    cli.url
        .as_deref()
        .or(config.crawler.entry_url.as_deref())
}

/// Handles the --dry-run mode: shows the resolved configuration
fn handle_dry_run(config: &Config, cli: &Cli) {
    println!("=== Airport-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!(
        "  Entry URL: {}",
        entry_url(config, cli).unwrap_or("(none, pass --url)")
    );
    println!(
        "  Concurrency: {}",
        cli.concurrency.unwrap_or(config.crawler.concurrency)
    );
    println!("  Attempts per fetch: {}", config.crawler.max_retries);
    println!("  Request timeout: {}ms", config.crawler.request_timeout_ms);
    println!("  Backoff unit: {}ms", config.crawler.backoff_base_ms);
    println!(
        "  Chunk pause: {}-{}ms",
        config.crawler.politeness_min_ms, config.crawler.politeness_max_ms
    );
    println!("  Page delay: {}ms", config.crawler.page_delay_ms);
    println!(
        "  Record path prefix: {}",
        config.directory.record_path_prefix
    );

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  JSON: {}", config.output.json_path);
    println!("  CSV: {}", config.output.csv_path);

    println!("\nGateways ({}):", config.gateways.len());
    for (index, gateway) in config.gateways.iter().enumerate() {
        println!(
            "  GW-{}: {} ({:?})",
            index + 1,
            gateway.template,
            gateway.envelope
        );
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --export-cached mode: writes exports from the cached session
fn handle_export_cached(config: &Config) -> anyhow::Result<()> {
    let mut store = open_store(Path::new(&config.output.database_path))
        .context("failed to open the result cache")?;
    let records = store.reload();

    if records.is_empty() {
        println!("No cached records in {}", config.output.database_path);
        return Ok(());
    }

    export_all(&records, &config.output).context("export failed")?;
    print_records_summary(&records);
    println!("✓ JSON exported to: {}", config.output.json_path);
    println!("✓ CSV exported to: {}", config.output.csv_path);

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: &Config, cli: &Cli) -> anyhow::Result<()> {
    let Some(entry_url) = entry_url(config, cli) else {
        bail!("no entry URL: pass --url or set crawler.entry-url");
    };
    let concurrency = cli.concurrency.unwrap_or(config.crawler.concurrency);

    let store = open_store(Path::new(&config.output.database_path))
        .context("failed to open the result cache")?;
    let mut coordinator = Coordinator::new(config, store)?;

    let restored = coordinator.restore_cached();
    if restored > 0 {
        tracing::info!(
            "Previous session left {} cached records; starting a new session replaces them",
            restored
        );
    }

    let cancel = coordinator.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing the current chunk");
            cancel.interrupt();
        }
    });

    let state = coordinator.start(entry_url, concurrency).await?;
    print_snapshot(&coordinator.snapshot());

    let records = coordinator.export_records();
    if records.is_empty() {
        tracing::warn!("Session ended without records");
    } else {
        export_all(records, &config.output).context("export failed")?;
        print_records_summary(records);
    }

    match state {
        CrawlState::Complete => tracing::info!("Harvest completed successfully"),
        _ => tracing::warn!("Harvest ended early ({})", state),
    }

    Ok(())
}
