// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Hashlock Node
//!
//! Entry point for the `hashlock-node` binary. Parses CLI arguments, loads
//! the TOML config, initializes logging and metrics, opens the sled world
//! state, and serves the REST API.
//!
//! The binary supports four subcommands:
//!
//! - `run`    : start the node
//! - `init`   : create a data directory with a sample config
//! - `invoke` : run one invocation against the local database
//! - `version`: print build version information

mod api;
mod cli;
mod config;
mod dispatcher;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use hashlock_contracts::Invocation;
use hashlock_protocol::storage::LedgerDb;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;

use cli::{Commands, ConfigArgs, HashlockNodeCli};
use config::{NodeConfig, CONFIG_FILE_NAME};
use dispatcher::Dispatcher;
use logging::LogFormat;
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = HashlockNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Invoke(args) => invoke_once(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Resolves the config file: explicit path, then `<data_dir>/config.toml`,
/// then defaults. `--data-dir` always wins over the file's `data_dir`.
fn load_config(args: &ConfigArgs) -> Result<NodeConfig> {
    let mut config = match &args.config {
        Some(path) => NodeConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => {
            let candidate = args
                .data_dir
                .clone()
                .unwrap_or_else(|| NodeConfig::default().data_dir)
                .join(CONFIG_FILE_NAME);
            if candidate.exists() {
                NodeConfig::load(&candidate)
                    .with_context(|| format!("failed to load config {}", candidate.display()))?
            } else {
                NodeConfig::default()
            }
        }
    };
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    Ok(config)
}

fn open_dispatcher(config: &NodeConfig, metrics: Arc<NodeMetrics>) -> Result<Dispatcher> {
    let db_path = config.data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;

    let db = Arc::new(
        LedgerDb::open(&db_path)
            .with_context(|| format!("failed to open database at {}", db_path.display()))?,
    );
    tracing::info!(path = %db_path.display(), entries = db.entry_count(), "database opened");

    let identities = config.registry().context("invalid identity registry")?;
    if identities.is_empty() {
        tracing::warn!("identity registry is empty; every invocation will be rejected");
    }
    Ok(Dispatcher::new(db, identities, metrics))
}

/// Starts the node: API server and metrics endpoint.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    let mut config = load_config(&args.config)?;
    if let Some(port) = args.api_port {
        config.api_port = port;
    }
    if let Some(port) = args.metrics_port {
        config.metrics_port = port;
    }
    if let Some(format) = args.log_format {
        config.log.format = format;
    }

    logging::init_logging(&config.log.level, config.log.format);

    tracing::info!(
        api_port = config.api_port,
        metrics_port = config.metrics_port,
        data_dir = %config.data_dir.display(),
        identities = config.identities.len(),
        "starting hashlock-node"
    );

    let node_metrics = Arc::new(NodeMetrics::new());
    let dispatcher = Arc::new(open_dispatcher(&config, Arc::clone(&node_metrics))?);

    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            hashlock_protocol::config::PROTOCOL_VERSION,
        ),
        dispatcher,
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = config.listen_socket(config.api_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = config.listen_socket(config.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    tracing::info!("hashlock-node stopped");
    Ok(())
}

/// Creates the data directory and writes a sample config.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("hashlock_node=info", LogFormat::Pretty);

    let data_dir = &args.data_dir;
    tracing::info!(data_dir = %data_dir.display(), "initializing node");

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let config_path: PathBuf = data_dir.join(CONFIG_FILE_NAME);
    if config_path.exists() && !args.force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite",
            config_path.display()
        );
    }

    let config = NodeConfig::sample(data_dir);
    std::fs::write(&config_path, config.to_toml_string()?)
        .with_context(|| format!("failed to write {}", config_path.display()))?;

    println!("Node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Config         : {}", config_path.display());
    for identity in &config.identities {
        println!("  Identity       : {} ({})", identity.name, identity.id);
    }

    Ok(())
}

/// Runs one invocation against the local database and prints the receipt.
fn invoke_once(args: cli::InvokeArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    logging::init_logging(&config.log.level, config.log.format);

    let invocation: Invocation =
        serde_json::from_str(&args.invocation).context("invocation is not valid JSON")?;
    let dispatcher = open_dispatcher(&config, Arc::new(NodeMetrics::new()))?;

    match dispatcher.invoke(&args.caller, &invocation) {
        Ok(receipt) => {
            println!("{}", serde_json::to_string_pretty(&receipt)?);
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("{} ({})", e, e.code())),
    }
}

/// Prints version information to stdout.
fn print_version() {
    println!("hashlock-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol      {}", hashlock_protocol::config::PROTOCOL_VERSION);
    println!("hash lock     {}", hashlock_protocol::config::HASH_LOCK_FUNCTION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
