//! Main entry point for the gallery-elo rating service
//!
//! Loads configuration, initializes logging, restores the rating snapshot
//! and serves the HTTP API until a shutdown signal arrives.

use anyhow::Result;
use clap::Parser;
use gallery_elo::config::{validate_config, AppConfig};
use gallery_elo::service::{self, AppState, HealthCheck, HealthStatus};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::time::Duration;
use tracing::{error, info, warn};

/// Gallery Elo - pairwise image comparison and ranking service
#[derive(Parser)]
#[command(
    name = "gallery-elo",
    version,
    about = "Serves random image pairs, records votes and ranks a gallery by Elo rating",
    long_about = "Gallery Elo keeps an Elo rating for every image in a gallery. Voters are shown \
                 two distinct random images, pick a winner, and both ratings are updated \
                 atomically from the server's current values."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Perform health check and exit
    #[arg(long, help = "Load the store, run a health check and exit with status code")]
    health_check: bool,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// HTTP port override
    #[arg(long, value_name = "PORT", help = "Override HTTP server port")]
    http_port: Option<u16>,

    /// Snapshot path override
    #[arg(long, value_name = "FILE", help = "Override rating snapshot file")]
    snapshot_path: Option<PathBuf>,

    /// K-factor override
    #[arg(long, value_name = "K", help = "Override the Elo K-factor")]
    k_factor: Option<f64>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Perform health check and return appropriate exit code
async fn perform_health_check(config: AppConfig) -> Result<()> {
    info!("Performing health check...");

    let app_state = Arc::new(AppState::read_only(config)?);
    app_state.start().await?;

    let health = HealthCheck::check(app_state.clone()).await?;
    println!("Health Check: {}", health.status);
    match health.stats.items {
        Some(items) => println!("  Items: {}", items),
        None => println!("  Items: unknown"),
    }
    for check in &health.checks {
        match &check.message {
            Some(message) => println!("  {}: {} ({})", check.name, check.status, message),
            None => println!("  {}: {}", check.name, check.status),
        }
    }

    app_state.shutdown().await?;

    if health.status == HealthStatus::Unhealthy {
        std::process::exit(1);
    }
    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Log a health summary periodically
async fn health_check_task(app_state: Arc<AppState>) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));

    while app_state.is_running().await {
        interval.tick().await;

        match HealthCheck::check(app_state.clone()).await {
            Ok(health) => {
                info!(
                    "Health check: {} - {:?} items, {} pairs served, {} votes recorded",
                    health.status,
                    health.stats.items,
                    health.stats.pairs_served,
                    health.stats.outcomes_recorded
                );
            }
            Err(e) => {
                warn!("Health check failed: {}", e);
            }
        }
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("🖼️  Gallery Elo Rating Service");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!(
        "   HTTP: {}:{}",
        config.service.http_host, config.service.http_port
    );
    info!(
        "   Rating: initial={}, k={}",
        config.rating.initial_rating, config.rating.k_factor
    );
    match &config.storage.snapshot_path {
        Some(path) => info!(
            "   Snapshot: {} (every {}s)",
            path.display(),
            config.storage.snapshot_interval_seconds
        ),
        None => info!("   Snapshot: disabled"),
    }
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load and merge configuration from environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(http_port) = args.http_port {
        config.service.http_port = http_port;
    }

    if let Some(snapshot_path) = &args.snapshot_path {
        config.storage.snapshot_path = Some(snapshot_path.clone());
    }

    if let Some(k_factor) = args.k_factor {
        config.rating.k_factor = k_factor;
    }

    validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration (CLI args can override environment/config file)
    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.health_check {
        return perform_health_check(config).await;
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    display_startup_banner(&config);

    info!("Initializing service components...");
    let app_state = match AppState::new(config.clone()) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    let health_task = {
        let app_state = app_state.clone();
        tokio::spawn(async move {
            health_check_task(app_state).await;
        })
    };

    info!("✅ Gallery Elo service is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    if let Err(e) = service::serve(app_state.clone(), wait_for_shutdown_signal()).await {
        error!("HTTP server error: {}", e);
    }

    info!("🛑 Shutdown signal received, beginning graceful shutdown...");
    health_task.abort();

    match tokio::time::timeout(config.shutdown_timeout(), app_state.shutdown()).await {
        Ok(Ok(())) => info!("✅ Graceful shutdown completed successfully"),
        Ok(Err(e)) => error!("Shutdown failed: {}", e),
        Err(_) => warn!("⚠️  Shutdown timeout exceeded, forcing exit"),
    }

    info!("🛑 Gallery Elo service stopped");
    Ok(())
}
