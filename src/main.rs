//! Livecam-Aggregator main entry point
//!
//! This is the command-line interface for the live webcam playlist aggregator.

use anyhow::Context;
use clap::Parser;
use livecam_aggregator::config::{load_config_with_hash, Config};
use livecam_aggregator::cycle::{print_cycle_stats, run_schedule, CycleRunner, CycleTracker};
use livecam_aggregator::discovery::{BackoffPolicy, QueryClient, YouTubeBackend};
use livecam_aggregator::playlist::PublicationStore;
use livecam_aggregator::resolver::{CommandResolver, PoolConfig, ResolverPool};
use livecam_aggregator::server::{self, AppState};
use livecam_aggregator::ConfigError;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// Livecam-Aggregator: a self-refreshing playlist of live webcam streams
///
/// Discovers live streams through the YouTube Data API, resolves each one to a
/// playable URL with an external tool, and serves the result as an extended
/// M3U playlist that is rebuilt on a fixed interval.
#[derive(Parser, Debug)]
#[command(name = "livecam-aggregator")]
#[command(version = "1.0.0")]
#[command(about = "A self-refreshing live webcam playlist", long_about = None)]
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

    /// Validate config and show the search profile without contacting anything
    #[arg(long, conflicts_with = "once")]
    dry_run: bool,

    /// Run a single cycle, print its statistics, and exit
    #[arg(long, conflicts_with = "dry_run")]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let runner = build_runner(&config)?;

    if cli.once {
        handle_once(&runner).await
    } else {
        handle_serve(&config, runner).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("livecam_aggregator=info,warn"),
            1 => EnvFilter::new("livecam_aggregator=debug,tower_http=debug,info"),
            2 => EnvFilter::new("livecam_aggregator=trace,debug"),
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

/// Wires the search backend, resolver pool, and store into a cycle runner
fn build_runner(config: &Config) -> anyhow::Result<CycleRunner> {
    let api_key = config
        .upstream
        .resolve_api_key()
        .ok_or_else(|| ConfigError::MissingApiKey(config.upstream.api_key_env.clone()))?;

    let backend = YouTubeBackend::from_config(&config.upstream, api_key)
        .context("failed to build HTTP client")?;
    let client = QueryClient::new(
        Arc::new(backend),
        BackoffPolicy::from_config(&config.upstream),
    );

    let resolver = CommandResolver::from_config(&config.resolver);
    let pool = ResolverPool::new(Arc::new(resolver), PoolConfig::from_config(&config.resolver));

    let runner = CycleRunner::new(
        client,
        pool,
        PublicationStore::new(),
        Arc::new(CycleTracker::new()),
        config.profile(),
    )
    .with_playlist_path(config.output.playlist_path.as_ref().map(PathBuf::from));

    Ok(runner)
}

/// Handles the --dry-run mode: validates config and shows what would run
fn handle_dry_run(config: &Config) {
    let profile = config.profile();

    println!("=== Livecam-Aggregator Dry Run ===\n");

    println!("Search Profile:");
    println!("  Query: {}", profile.query);
    println!("  Result cap: {}", profile.result_cap);
    println!("  Page size: {}", profile.page_size);
    println!(
        "  Region: {}",
        profile.region_code.as_deref().unwrap_or("(provider default)")
    );
    println!(
        "  Excluded categories ({}):",
        profile.excluded_categories.len()
    );
    for name in &profile.excluded_categories {
        println!("    - {}", name);
    }

    println!("\nUpstream:");
    println!("  API base URL: {}", config.upstream.api_base_url);
    println!(
        "  API key: {}",
        if config.upstream.resolve_api_key().is_some() {
            "present"
        } else {
            "MISSING"
        }
    );
    println!(
        "  Retries: {} (backoff {}ms..{}ms)",
        config.upstream.max_retries,
        config.upstream.initial_backoff_ms,
        config.upstream.max_backoff_ms
    );

    println!("\nResolver:");
    println!(
        "  Command: {} {}",
        config.resolver.program,
        config.resolver.args.join(" ")
    );
    println!("  Concurrency: {}", config.resolver.concurrency);
    println!("  Max buffered results: {}", config.resolver.max_buffered);
    println!("  Per-item timeout: {}s", config.resolver.timeout_secs);

    println!("\nSchedule:");
    println!("  Interval: {}s", config.schedule.interval_secs);
    println!(
        "  Health fails after: {}s in one cycle",
        config.schedule.stuck_threshold().as_secs()
    );

    println!("\nServer:");
    println!(
        "  Listen: {}:{}",
        config.server.bind_address, config.server.port
    );
    if let Some(path) = &config.output.playlist_path {
        println!("  Playlist file: {}", path);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --once mode: one cycle, printed stats, failure exit on abort
async fn handle_once(runner: &CycleRunner) -> anyhow::Result<()> {
    let stats = runner.run_cycle().await;
    print_cycle_stats(&stats);

    if stats.outcome.is_aborted() {
        anyhow::bail!("cycle {} aborted", stats.cycle);
    }
    Ok(())
}

/// Handles the default mode: HTTP front door plus the cycle loop
async fn handle_serve(config: &Config, runner: CycleRunner) -> anyhow::Result<()> {
    let addr = server::listen_addr(&config.server)?;
    let listener = server::bind(addr).await?;

    let app = server::router(AppState {
        store: runner.store().clone(),
        tracker: Arc::clone(runner.tracker()),
        stuck_after: config.schedule.stuck_threshold(),
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server_task = tokio::spawn(server::serve(listener, app, wait_for(shutdown_rx.clone())));

    tracing::info!(
        "Starting cycle loop: every {}s, {} resolvers",
        config.schedule.interval_secs,
        config.resolver.concurrency
    );

    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await
            }
        }
    };
    run_schedule(&runner, config.schedule.interval(), ctrl_c).await;

    // The receiver side only needs the value to change
    let _ = shutdown_tx.send(true);
    match server_task.await {
        Ok(result) => result?,
        Err(e) => tracing::error!("HTTP server task failed: {}", e),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn wait_for(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            break;
        }
    }
}
