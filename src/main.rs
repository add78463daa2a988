//! Chan-Archiver main entry point
//!
//! This is the command-line interface for the Chan-Archiver thread archiver.

use anyhow::Context;
use chan_archiver::config::{load_config_with_hash, Config};
use chan_archiver::crawler::Coordinator;
use chan_archiver::storage::RunRecord;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Chan-Archiver: an incremental thread archiver
///
/// Chan-Archiver mirrors the threads of image boards into a SQLite database,
/// downloading attachments and applying trigger rules that retain or tag
/// threads. Each invocation performs one update pass per board.
#[derive(Parser, Debug)]
#[command(name = "chan-archiver")]
#[command(version = "1.0.0")]
#[command(about = "An incremental thread archiver", long_about = None)]
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

    /// Only update this board (repeatable); defaults to every active board
    #[arg(short, long = "board", value_name = "NAME")]
    boards: Vec<String>,

    /// Override the configured number of workers
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=64))]
    workers: Option<u32>,

    /// Validate config and show what would be archived without crawling
    #[arg(long, conflicts_with = "history")]
    dry_run: bool,

    /// Show recent runs from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    history: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(workers) = cli.workers {
        config.scraper.workers = workers;
    }

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config, &cli.boards);
    } else if cli.history {
        handle_history(&config)?;
    } else {
        handle_crawl(config, &cli.boards).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("chan_archiver=info,warn"),
            1 => EnvFilter::new("chan_archiver=debug,info"),
            2 => EnvFilter::new("chan_archiver=trace,debug"),
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

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config, selected: &[String]) {
    println!("=== Chan-Archiver Dry Run ===\n");

    println!("Scraper Configuration:");
    println!("  Workers: {}", config.scraper.workers);
    println!("  API wait: {}ms", config.scraper.api_wait);
    println!("  File wait: {}ms", config.scraper.file_wait);
    println!(
        "  Connection timeout: {}s",
        config.scraper.connection_timeout
    );

    println!("\nAPI:");
    println!("  Threads: {}", config.api.api_url);
    println!("  Images: {}", config.api.image_url);
    println!("  Thumbnails: {}", config.api.thumbnail_url);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Media: {}", config.output.media_path);

    println!("\nBoards ({}):", config.boards.len());
    for board in &config.boards {
        let marker = if will_crawl(board.name.as_str(), board.active, selected) {
            "*"
        } else {
            " "
        };
        println!(
            "  {} /{}/ (active: {}, replies threshold: {}, keep for: {}h)",
            marker, board.name, board.active, board.replies_threshold, board.store_threads_for
        );
    }

    println!("\n✓ Configuration is valid");
}

fn will_crawl(name: &str, active: bool, selected: &[String]) -> bool {
    if selected.is_empty() {
        active
    } else {
        selected.iter().any(|s| s == name)
    }
}

/// Handles the --history mode: shows recent runs from the database
fn handle_history(config: &Config) -> anyhow::Result<()> {
    use chan_archiver::output::{load_run_history, print_run_history};
    use chan_archiver::storage::open_storage;
    use std::path::Path;

    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(
        Path::new(&config.output.database_path),
        Path::new(&config.output.media_path),
    )?;
    let runs = load_run_history(&storage, 20)?;
    print_run_history(&runs);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, selected: &[String]) -> anyhow::Result<()> {
    let workers = config.scraper.workers as usize;
    let coordinator =
        Coordinator::new(config).context("Failed to open the archive database")?;

    let runs: Vec<RunRecord> = if selected.is_empty() {
        coordinator.run().await?
    } else {
        let mut runs = Vec::with_capacity(selected.len());
        for board in selected {
            runs.push(coordinator.run_board(board, workers).await?);
        }
        runs
    };

    for run in &runs {
        tracing::info!(
            "/{}/ done: {} posts added, {} removed in {:.2}s",
            run.board,
            run.added_posts,
            run.removed_posts,
            run.total_time
        );
    }

    Ok(())
}
