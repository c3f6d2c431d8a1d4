//! # Scanward Server
//!
//! Security-scan metadata API with background scan workers.
//!
//! ## Overview
//!
//! - **Providers and checks**: catalogue of what can be scanned
//! - **Scans**: created over HTTP, executed asynchronously by workers
//! - **Findings**: per-check outcomes recorded by the runner
//! - **Health**: liveness derived from worker heartbeats

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scanward_core::{
    application::AppUnitOfWork,
    seed::{self, SeedData},
};
use scanward_server::{
    create_app,
    infra::{
        config::{Config, ConfigLoad, ConfigLoader},
        startup::{build_state, connect_postgres, start_workers},
    },
};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "scanward-server")]
#[command(about = "Security-scan metadata API and scan workers")]
struct Cli {
    /// Path to a scanward.toml configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API (default), with embedded workers unless disabled
    Serve(ServeArgs),
    /// Run scan workers only
    Worker,
    #[command(subcommand)]
    Db(DbCommand),
    /// Load provider and check fixtures
    Seed(SeedArgs),
}

#[derive(ClapArgs, Debug, Clone, Default)]
struct ServeArgs {
    /// Server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Do not start embedded scan workers; run `scanward-server worker` separately
    #[arg(long, env = "SCANWARD_NO_WORKER", default_value_t = false)]
    no_worker: bool,
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Apply database migrations and exit
    Migrate,
}

#[derive(ClapArgs, Debug, Clone)]
struct SeedArgs {
    /// JSON fixture file; defaults to the bundled sample
    #[arg(long)]
    file: Option<PathBuf>,

    /// Delete every provider (and its checks, scans and findings) first
    #[arg(long, default_value_t = false)]
    flush: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_runtime_config(cli.config)?;

    match cli.command.unwrap_or(Command::Serve(ServeArgs::default())) {
        Command::Serve(args) => run_server(config, args).await,
        Command::Worker => run_worker(config).await,
        Command::Db(DbCommand::Migrate) => run_db_migrate(config).await,
        Command::Seed(args) => run_seed(config, args).await,
    }
}

fn load_runtime_config(config_path: Option<PathBuf>) -> anyhow::Result<Config> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = config_path {
        loader = loader.with_config_path(path);
    }
    let ConfigLoad { config, warnings } =
        loader.load().context("failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                // Override via RUST_LOG.
                "scanward_server=info,scanward_core=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "configuration file loaded");
    }
    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => warn!(message = %warning.message, hint = %hint, "configuration warning"),
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }

    Ok(config)
}

fn require_postgres(config: &Config, command: &str) -> anyhow::Result<()> {
    if !config.uses_postgres() {
        anyhow::bail!(
            "`{command}` needs a shared database; set DATABASE_URL or database.url"
        );
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for Ctrl-C; shutting down");
    }
    info!("shutdown signal received");
}

async fn run_server(mut config: Config, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    let config = Arc::new(config);

    let state = build_state(Arc::clone(&config)).await?;
    let shutdown = CancellationToken::new();

    let workers = if args.no_worker {
        if !config.uses_postgres() {
            warn!("workers disabled with the in-memory store; scans will stay pending");
        }
        None
    } else {
        Some(start_workers(&state, shutdown.child_token()))
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, dev_mode = config.dev_mode, "Starting Scanward server (HTTP)");

    let token = shutdown.clone();
    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            token.cancel();
        })
        .await
        .context("HTTP server failed")?;

    if let Some(workers) = workers {
        workers.shutdown().await;
    }
    info!("server stopped");
    Ok(())
}

async fn run_worker(config: Config) -> anyhow::Result<()> {
    require_postgres(&config, "worker")?;
    let state = build_state(Arc::new(config)).await?;

    let shutdown = CancellationToken::new();
    let workers = start_workers(&state, shutdown.clone());
    info!(pool = %workers.id(), "worker process running; press Ctrl-C to stop");

    shutdown_signal().await;
    workers.shutdown().await;
    Ok(())
}

async fn run_db_migrate(config: Config) -> anyhow::Result<()> {
    require_postgres(&config, "db migrate")?;
    connect_postgres(&config).await?;
    info!("Database migrations applied successfully");
    Ok(())
}

async fn run_seed(config: Config, args: SeedArgs) -> anyhow::Result<()> {
    require_postgres(&config, "seed")?;

    let data = match &args.file {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            SeedData::from_json(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => SeedData::bundled().context("bundled fixture is invalid")?,
    };

    let postgres = connect_postgres(&config).await?;
    let uow = AppUnitOfWork::from_postgres(&postgres);

    if args.flush {
        let removed = seed::flush(&uow).await.context("failed to flush providers")?;
        info!(removed, "existing providers removed");
    }

    let report = seed::load(&uow, &data)
        .await
        .context("failed to load seed data")?;
    info!(
        providers_created = report.providers_created,
        checks_created = report.checks_created,
        "seed complete"
    );
    Ok(())
}
