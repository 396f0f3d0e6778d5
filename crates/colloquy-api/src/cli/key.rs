//! Provider API key CLI commands: add, list, deactivate.
//!
//! Key values are write-only: listing shows metadata, never the secret.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use secrecy::SecretString;
use uuid::Uuid;

use colloquy_types::model::CatalogStatus;

use crate::state::AppState;

#[derive(Subcommand)]
pub enum KeyCommand {
    /// Store a new active key for a provider.
    Add {
        /// Registry id of the provider (e.g. "openai").
        provider: String,

        /// Label for the key.
        #[arg(long, default_value = "default")]
        name: String,

        /// The key value.
        #[arg(long, env = "COLLOQUY_PROVIDER_KEY", hide_env_values = true)]
        secret: String,
    },

    /// List key metadata for a provider, newest first.
    #[command(alias = "ls")]
    List { provider: String },

    /// Mark a key inactive.
    Deactivate { id: String },
}

pub async fn handle_key_command(cmd: KeyCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        KeyCommand::Add {
            provider,
            name,
            secret,
        } => {
            if secret.trim().is_empty() {
                bail!("key value must not be empty");
            }
            let secret = SecretString::from(secret);
            let record = state.catalog.add_api_key(&provider, &name, &secret).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                println!(
                    "  {} Key {} stored for {}",
                    style("✓").green().bold(),
                    style(record.id).dim(),
                    style(&record.provider_id).cyan().bold()
                );
            }
        }
        KeyCommand::List { provider } => {
            let keys = state.catalog.list_api_keys(&provider).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&keys)?);
                return Ok(());
            }
            if keys.is_empty() {
                println!("  No keys stored for '{provider}'.");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(presets::UTF8_FULL_CONDENSED);
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec![
                Cell::new("Id").fg(Color::White),
                Cell::new("Name").fg(Color::White),
                Cell::new("Status").fg(Color::White),
                Cell::new("Created").fg(Color::White),
            ]);
            for key in &keys {
                let status_cell = match key.status {
                    CatalogStatus::Active => Cell::new("active").fg(Color::Green),
                    CatalogStatus::Inactive => Cell::new("inactive").fg(Color::DarkGrey),
                };
                table.add_row(vec![
                    Cell::new(key.id).fg(Color::DarkGrey),
                    Cell::new(&key.name).fg(Color::White),
                    status_cell,
                    Cell::new(key.created_at.format("%Y-%m-%d %H:%M")).fg(Color::DarkGrey),
                ]);
            }
            println!("{table}");
        }
        KeyCommand::Deactivate { id } => {
            let id: Uuid = id.parse().with_context(|| format!("invalid key id '{id}'"))?;
            state.catalog.deactivate_api_key(&id).await?;
            if !json {
                println!("  {} Key {} deactivated", style("✓").green().bold(), style(id).dim());
            }
        }
    }
    Ok(())
}
