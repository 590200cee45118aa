//! labeldesk-web - Text labelling service
//!
//! Serves the password-gated labelling page and its JSON API, reading
//! records from the input table and appending judgments to the output table.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use labeldesk_common::config::{resolve_config_path, AppConfig, TomlConfig};
use labeldesk_common::models::Record;
use labeldesk_common::store::{import_records, open_store};
use labeldesk_web::{build_router, AppState};

/// Command-line arguments for labeldesk-web
#[derive(Parser, Debug)]
#[command(name = "labeldesk-web")]
#[command(about = "Password-gated text labelling service")]
#[command(version)]
struct Args {
    /// Config file (overrides LABELDESK_CONFIG and the per-user default)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Listen address override
    #[arg(long, global = true)]
    host: Option<String>,

    /// Listen port override
    #[arg(short, long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Append records from a JSON array file to the input table
    ImportInput {
        /// JSON file: `[{"prompt_id": .., "original_id": .., "text": ".."}, ...]`
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // The config decides the default log level, so it is read before tracing
    // is up and its outcome is reported afterwards
    let config_path = resolve_config_path(args.config.as_deref());
    let loaded = TomlConfig::load(config_path.as_deref());
    let log_level = loaded
        .as_ref()
        .map(|(toml, _)| toml.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},tower_http=info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting labeldesk-web v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let (mut toml, source) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    source.report();

    if let Some(host) = args.host {
        toml.server.host = host;
    }
    if let Some(port) = args.port {
        toml.server.port = port;
    }

    let config = AppConfig::from_toml(toml).context("Invalid configuration")?;
    info!(
        backend = ?config.store.backend,
        input_table = %config.store.input_table,
        output_table = %config.store.output_table,
        "Store configured"
    );

    let store = match open_store(&config.store).await {
        Ok(store) => {
            info!("✓ Opened {} store", store.backend());
            store
        }
        Err(e) => {
            error!("Failed to open store: {}", e);
            return Err(e.into());
        }
    };

    match args.command.unwrap_or(Command::Serve) {
        Command::ImportInput { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let records: Vec<Record> = serde_json::from_str(&content)
                .with_context(|| format!("{} is not a JSON array of records", file.display()))?;
            let count =
                import_records(store.as_ref(), &config.store.input_table, &records).await?;
            info!("Imported {} records into '{}'", count, config.store.input_table);
            Ok(())
        }
        Command::Serve => serve(&config, store).await,
    }
}

async fn serve(config: &AppConfig, store: labeldesk_common::store::SharedStore) -> Result<()> {
    let state = AppState::from_config(config, store);
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("labeldesk-web listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
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
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
