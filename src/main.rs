//! Wipe-Ledger main entry point
//!
//! This is the command-line interface for the Wipe-Ledger ingestion pipeline.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use wipe_ledger::config::{load_config_with_hash, resolve_credentials, Config};
use wipe_ledger::output::{
    collect_existing_names, export_names, generate_markdown_summary, load_statistics,
    print_statistics, RECENT_RUN_LIMIT,
};
use wipe_ledger::pipeline::{run_sources, selected_sources};
use wipe_ledger::storage::{backfill_legacy_schedules, open_store};

/// Wipe-Ledger: game-server wipe schedule ingestion
///
/// Wipe-Ledger pulls Rust server listings from the configured sources,
/// infers group size and weekly wipe slots, and reconciles them into a
/// SQLite ledger. Meant to be invoked periodically (e.g. every 15 minutes).
#[derive(Parser, Debug)]
#[command(name = "wipe-ledger")]
#[command(version = "1.0.0")]
#[command(about = "Game-server wipe schedule ingestion", long_about = None)]
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

    /// Only run the named source (repeatable)
    #[arg(long = "source", value_name = "NAME")]
    sources: Vec<String>,

    /// Validate config and show what would run without fetching anything
    #[arg(long, conflicts_with_all = ["stats", "export_summary", "migrate"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_summary", "migrate"])]
    stats: bool,

    /// Generate markdown summary of recent runs and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "migrate"])]
    export_summary: bool,

    /// Backfill wipe slots from legacy single wipe instants and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "export_summary"])]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Credentials may live in a local .env file
    dotenvy::dotenv().ok();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config, &cli.sources)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export_summary {
        handle_export_summary(&config)?;
    } else if cli.migrate {
        handle_migrate(&config)?;
    } else {
        handle_ingest(&config, &cli.sources, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("wipe_ledger=info,warn"),
            1 => EnvFilter::new("wipe_ledger=debug,info"),
            2 => EnvFilter::new("wipe_ledger=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would run
fn handle_dry_run(config: &Config, selected: &[String]) -> anyhow::Result<()> {
    println!("=== Wipe-Ledger Dry Run ===\n");

    println!("Client:");
    println!("  User agent: {}", config.client.user_agent);
    println!(
        "  Timeouts: {}s total, {}s connect",
        config.client.timeout_secs, config.client.connect_timeout_secs
    );

    println!("\nStore:");
    println!("  Database: {}", config.store.database_path);
    if let Some(path) = &config.store.export_path {
        println!("  Name export: {}", path);
    }
    if let Some(path) = &config.store.summary_path {
        println!("  Summary: {}", path);
    }

    let sources = selected_sources(config, selected)?;
    println!("\nSources ({}):", sources.len());
    for source in &sources {
        println!("  - {} ({})", source.name, source.kind.as_str());
        println!("    URL: {}", source.base_url);
        println!(
            "    Pages: up to {}{}",
            source.max_pages,
            source
                .page_size
                .map(|size| format!(", {} per full page", size))
                .unwrap_or_default()
        );
        println!(
            "    Delay: {}-{}ms, {} attempt(s)",
            source.delay_min_ms, source.delay_max_ms, source.max_attempts
        );
        if let Some(rating) = source.min_rating {
            println!("    Minimum rating: {}%", rating);
        }
        if let Some(variable) = &source.api_key_env {
            let present = std::env::var(variable).map_or(false, |v| !v.trim().is_empty());
            println!(
                "    Credential: {} ({})",
                variable,
                if present { "set" } else { "MISSING" }
            );
        }
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.store.database_path);

    let store = open_store(Path::new(&config.store.database_path))?;
    let stats = load_statistics(&store, RECENT_RUN_LIMIT)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-summary mode: generates markdown summary
fn handle_export_summary(config: &Config) -> anyhow::Result<()> {
    let summary_path = config
        .store
        .summary_path
        .as_deref()
        .context("--export-summary needs store.summary-path in the configuration")?;

    println!("=== Exporting Ingestion Summary ===\n");
    println!("Database: {}", config.store.database_path);
    println!("Output: {}", summary_path);
    println!();

    let store = open_store(Path::new(&config.store.database_path))?;
    let stats = load_statistics(&store, RECENT_RUN_LIMIT)?;
    generate_markdown_summary(&stats, Path::new(summary_path))?;

    println!("✓ Summary exported to: {}", summary_path);
    Ok(())
}

/// Handles the --migrate mode: backfills wipe slots from legacy instants
fn handle_migrate(config: &Config) -> anyhow::Result<()> {
    let mut store = open_store(Path::new(&config.store.database_path))?;
    let report = backfill_legacy_schedules(&mut store)?;

    println!("=== Legacy Backfill ===\n");
    println!("  Servers examined: {}", report.examined);
    println!("  Slots created: {}", report.created);
    println!("  Already present: {}", report.already_present);
    Ok(())
}

/// Handles the main ingestion run
async fn handle_ingest(config: &Config, selected: &[String], config_hash: &str) -> anyhow::Result<()> {
    let credentials = resolve_credentials(config, selected, |var| std::env::var(var).ok())?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current page");
            on_signal.cancel();
        }
    });

    let reports = run_sources(config, &credentials, selected, config_hash, cancel).await?;

    for report in &reports {
        println!(
            "{}: {} pages, {} created, {} schedule added, {} duplicate, {} updated, {} failed, {} discarded",
            report.source,
            report.pages_processed,
            report.created,
            report.schedule_added,
            report.skipped_duplicate,
            report.updated,
            report.failures,
            report.discarded
        );
    }

    if let Some(path) = &config.store.export_path {
        let names = collect_existing_names(&reports);
        export_names(&names, Path::new(path))?;
    }

    Ok(())
}
