//! Model catalog CLI commands: add, list.

use anyhow::{bail, Result};
use chrono::Utc;
use clap::Subcommand;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use colloquy_types::llm::ModelParams;
use colloquy_types::model::{CatalogStatus, ModelRecord};

use crate::state::AppState;

#[derive(Subcommand)]
pub enum ModelCommand {
    /// Create or replace a model record.
    Add {
        /// Record id that canvases and requests refer to (e.g. "default").
        id: String,

        /// Registry id of the provider (e.g. "openai", "echo").
        #[arg(long)]
        provider: String,

        /// Vendor-side model name (e.g. "gpt-4o").
        #[arg(long)]
        vendor_model: String,

        /// Display name. Defaults to the record id.
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        temperature: Option<f32>,

        #[arg(long)]
        max_tokens: Option<u32>,

        /// Store the record as inactive.
        #[arg(long)]
        inactive: bool,
    },

    /// List model records.
    #[command(alias = "ls")]
    List,
}

pub async fn handle_model_command(cmd: ModelCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        ModelCommand::Add {
            id,
            provider,
            vendor_model,
            name,
            temperature,
            max_tokens,
            inactive,
        } => {
            let supported = state.registry.supported_providers();
            if !supported.contains(&provider.as_str()) {
                bail!(
                    "unknown provider '{provider}' (supported: {})",
                    supported.join(", ")
                );
            }

            let now = Utc::now();
            let record = ModelRecord {
                name: name.unwrap_or_else(|| id.clone()),
                id,
                provider_id: provider,
                vendor_model,
                params: ModelParams {
                    temperature,
                    max_tokens,
                    ..ModelParams::default()
                },
                status: if inactive {
                    CatalogStatus::Inactive
                } else {
                    CatalogStatus::Active
                },
                created_at: now,
                updated_at: now,
            };
            state.catalog.upsert_model(&record).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                println!(
                    "  {} Model {} -> {}/{}",
                    style("✓").green().bold(),
                    style(&record.id).cyan().bold(),
                    record.provider_id,
                    record.vendor_model
                );
            }
        }
        ModelCommand::List => list_models(state, json).await?,
    }
    Ok(())
}

async fn list_models(state: &AppState, json: bool) -> Result<()> {
    let models = state.catalog.list_models().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&models)?);
        return Ok(());
    }

    if models.is_empty() {
        println!("  No models configured. Add one with `colloquy model add`.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Id").fg(Color::White),
        Cell::new("Provider").fg(Color::White),
        Cell::new("Vendor Model").fg(Color::White),
        Cell::new("Name").fg(Color::White),
        Cell::new("Status").fg(Color::White),
    ]);

    for model in &models {
        let status_cell = match model.status {
            CatalogStatus::Active => Cell::new("active").fg(Color::Green),
            CatalogStatus::Inactive => Cell::new("inactive").fg(Color::DarkGrey),
        };
        table.add_row(vec![
            Cell::new(&model.id).fg(Color::Cyan),
            Cell::new(&model.provider_id).fg(Color::White),
            Cell::new(&model.vendor_model).fg(Color::DarkGrey),
            Cell::new(&model.name).fg(Color::White),
            status_cell,
        ]);
    }

    println!("{table}");
    Ok(())
}
