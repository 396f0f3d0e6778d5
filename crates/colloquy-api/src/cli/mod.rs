//! CLI command definitions for the `colloquy` binary.
//!
//! Uses clap derive macros for argument parsing. Besides `serve`, the
//! commands administer the model catalog and the stored provider keys.

pub mod key;
pub mod model;

use clap::{Parser, Subcommand};

/// Multi-tenant chat service with pluggable model providers.
#[derive(Parser)]
#[command(name = "colloquy", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true, env = "COLLOQUY_OTEL")]
    pub otel: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server.
    Serve {
        /// Port to listen on. Defaults to the configured port.
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to. Defaults to the configured host.
        #[arg(long)]
        host: Option<String>,
    },

    /// Create or upgrade the database schema, then exit.
    Migrate,

    /// Manage model records.
    Model {
        #[command(subcommand)]
        action: model::ModelCommand,
    },

    /// Manage provider API keys.
    Key {
        #[command(subcommand)]
        action: key::KeyCommand,
    },

    /// Remove expired login sessions.
    PurgeSessions,
}
