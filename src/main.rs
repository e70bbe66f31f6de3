//! Site-Strata main entry point
//!
//! This is the command-line interface for the Site-Strata website cartographer.

use anyhow::Context;
use clap::Parser;
use site_strata::analysis::{analyze_store, save_model};
use site_strata::config::{load_config_with_hash, Config, RenderMode};
use site_strata::crawler::{build_http_client, Coordinator, HttpRenderer};
use site_strata::output::{load_statistics, print_model_summary, print_statistics};
use site_strata::storage::{open_store, SqlitePageStore};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Site-Strata: a website cartographer
///
/// Site-Strata crawls a single website into a SQLite page store and infers
/// its content model: navigation, page types, relationships between page
/// types, and recurring content objects.
#[derive(Parser, Debug)]
#[command(name = "site-strata")]
#[command(version)]
#[command(about = "Crawl a website and infer its content model", long_about = None)]
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

    /// Continue from the pages already in the store (the default when it exists)
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Clear the store and crawl from the base URL
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Skip crawling and analyze the existing store
    #[arg(long, conflicts_with_all = ["skip_analysis", "stats"])]
    analyze_only: bool,

    /// Crawl without running analysis afterwards
    #[arg(long, conflicts_with = "stats")]
    skip_analysis: bool,

    /// Show statistics from the store and exit
    #[arg(long)]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("invalid configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let db_path = PathBuf::from(&config.store.database_path);

    if cli.stats {
        return handle_stats(&db_path);
    }

    let cancel = Arc::new(AtomicBool::new(false));
    spawn_interrupt_handler(Arc::clone(&cancel));

    let mut store = if cli.analyze_only {
        open_store(&db_path, true)
            .with_context(|| format!("cannot open page store {}", db_path.display()))?
    } else {
        let resume = cli.resume || (!cli.fresh && db_path.exists());
        let mut store = open_store(&db_path, resume)
            .with_context(|| format!("cannot open page store {}", db_path.display()))?;
        handle_crawl(&config, &config_hash, &mut store, resume, Arc::clone(&cancel)).await?;
        store
    };

    if cli.skip_analysis {
        return Ok(());
    }
    if cancel.load(Ordering::SeqCst) {
        tracing::warn!("Interrupted; skipping analysis");
        return Ok(());
    }

    handle_analysis(&config, &mut store, &cancel)
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_strata=info,warn"),
            1 => EnvFilter::new("site_strata=debug,info"),
            2 => EnvFilter::new("site_strata=trace,debug"),
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

/// Raises `cancel` on Ctrl-C so the crawl drains and the run is marked interrupted
fn spawn_interrupt_handler(cancel: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing in-flight fetches");
            cancel.store(true, Ordering::SeqCst);
        }
    });
}

/// Handles the --stats mode: shows statistics from the store
fn handle_stats(db_path: &Path) -> anyhow::Result<()> {
    println!("Database: {}\n", db_path.display());

    let store = SqlitePageStore::open_existing(db_path)
        .with_context(|| format!("cannot open page store {}", db_path.display()))?;
    let stats = load_statistics(&store)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the crawl phase
async fn handle_crawl(
    config: &Config,
    config_hash: &str,
    store: &mut SqlitePageStore,
    resume: bool,
    cancel: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    if config.crawl.render_mode == RenderMode::Headless {
        anyhow::bail!("headless rendering is not available from the command line");
    }

    if resume {
        tracing::info!("Resuming crawl of {}", config.crawl.base_url);
    } else {
        tracing::info!("Starting fresh crawl of {}", config.crawl.base_url);
    }

    let client = build_http_client(&config.user_agent, config.crawl.timeout_ms)?;
    let renderer = Arc::new(HttpRenderer::new(client.clone()));

    let report = Coordinator::new(config, store, renderer, client)?
        .with_config_hash(config_hash)
        .with_cancel_flag(cancel)
        .run(resume)
        .await
        .context("crawl failed")?;

    tracing::info!(
        "Crawl finished: {} fetched, {} successful, {} failed, {} excluded, {} denied by robots.txt in {:.1?}",
        report.fetched,
        report.successful,
        report.failed,
        report.excluded,
        report.robots_denied,
        report.elapsed
    );
    Ok(())
}

/// Handles the analysis phase: infers the model and stores its artifacts
fn handle_analysis(
    config: &Config,
    store: &mut SqlitePageStore,
    cancel: &AtomicBool,
) -> anyhow::Result<()> {
    let model = analyze_store(&*store, &config.analysis, cancel).context("analysis failed")?;
    save_model(store, &model)?;
    print_model_summary(&model);
    Ok(())
}
