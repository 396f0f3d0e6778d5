//! Colloquy CLI and REST API entry point.
//!
//! Binary name: `colloquy`
//!
//! Parses CLI arguments, loads configuration, initializes database and
//! services, then dispatches to the command handler or starts the server.

mod cli;
mod http;
mod state;

use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use colloquy_infra::config::{apply_env_overrides, default_data_dir, load_config};
use colloquy_observe::tracing_setup::{init_tracing, shutdown_tracing, TracingOptions};

use cli::{Cli, Commands};
use state::AppState;

/// How often `serve` drops expired login sessions.
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(&TracingOptions {
        verbose: cli.verbose,
        json: cli.json_logs,
        otel: cli.otel,
    }) {
        eprintln!("Warning: failed to initialize tracing: {e}");
    }

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let data_dir = default_data_dir();
    let mut config = load_config(&data_dir).await;
    apply_env_overrides(&mut config);

    // Opening the pool applies pending migrations.
    let state = AppState::init(data_dir, config).await?;

    match cli.command {
        Commands::Serve { port, host } => serve(state, host, port).await?,

        Commands::Migrate => {
            println!(
                "  {} Database schema is up to date ({})",
                console::style("✓").green().bold(),
                state.data_dir.display()
            );
        }

        Commands::Model { action } => {
            cli::model::handle_model_command(action, &state, cli.json).await?;
        }

        Commands::Key { action } => {
            cli::key::handle_key_command(action, &state, cli.json).await?;
        }

        Commands::PurgeSessions => {
            let purged = state.sessions.purge_expired().await?;
            if cli.json {
                println!("{}", serde_json::json!({ "purged": purged }));
            } else {
                println!("  Removed {purged} expired session(s).");
            }
        }
    }

    Ok(())
}

async fn serve(state: AppState, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| state.config.server.host.clone());
    let port = port.unwrap_or(state.config.server.port);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(%addr, providers = ?state.registry.supported_providers(), "colloquy API listening");
    println!(
        "  {} Colloquy API listening on {}",
        console::style("⚡").bold(),
        console::style(format!("http://{addr}")).cyan()
    );
    println!("  {}", console::style("Press Ctrl+C to stop").dim());

    let purge_task = tokio::spawn(purge_sessions_periodically(state.clone()));
    let router = http::router::build_router(state);

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    purge_task.abort();
    served?;

    println!("\n  Server stopped.");
    Ok(())
}

async fn purge_sessions_periodically(state: AppState) {
    let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
    loop {
        interval.tick().await;
        if let Err(e) = state.sessions.purge_expired().await {
            warn!(error = %e, "session purge failed");
        }
    }
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
