mod commands;
mod logging;
mod render;
mod time_input;
mod utils;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parish_core::RecurrenceType;
use parish_core::config::ParishConfig;
use parish_core::engine::EventSyncEngine;

#[derive(Parser)]
#[command(name = "parish")]
#[command(about = "Manage parish events and keep recurring ones materialized ahead of time")]
struct Cli {
    /// Show debug logs from the sync engine
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Read configuration from this file instead of ~/.config/parish/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a one-off event or a recurring template
    Add {
        title: String,

        /// Start date/time (e.g. "2025-03-20T15:00", "sun 10am")
        #[arg(short, long)]
        start: String,

        /// End date/time
        #[arg(short, long, conflicts_with = "duration")]
        end: Option<String>,

        /// Length of the event (e.g. "1h", "90m"); defaults to one hour
        #[arg(short, long)]
        duration: Option<String>,

        #[arg(short, long)]
        location: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// weekly, biweekly, monthly or first-tuesday
        #[arg(short, long)]
        repeat: Option<RecurrenceType>,
    },
    /// Change fields of an existing event
    Update {
        id: String,

        #[arg(short, long)]
        title: Option<String>,

        /// New start date/time; the event keeps its length unless --end or --duration is given
        #[arg(short, long)]
        start: Option<String>,

        #[arg(short, long, conflicts_with = "duration")]
        end: Option<String>,

        #[arg(short, long)]
        duration: Option<String>,

        #[arg(short, long)]
        location: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// weekly, biweekly, monthly, first-tuesday or none
        #[arg(short, long)]
        repeat: Option<RecurrenceType>,
    },
    /// Delete an event; deleting a template also deletes its instances
    Delete { id: String },
    /// Show a single event
    Show {
        id: String,

        /// Print the stored record as JSON
        #[arg(long)]
        json: bool,
    },
    /// List upcoming events
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,

        /// List recurring templates instead of occurrences
        #[arg(long)]
        templates: bool,
    },
    /// Materialize recurring events over the configured horizon
    Sync,
    /// Keep syncing on an interval until interrupted
    Watch {
        /// Time between sync passes (e.g. "15m", "1h")
        #[arg(short, long, default_value = "1h")]
        interval: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = match &cli.config {
        Some(path) => ParishConfig::load_from(path)
            .with_context(|| format!("Could not load config from {}", path.display()))?,
        None => ParishConfig::load().context("Could not load config")?,
    };

    let engine = EventSyncEngine::connect(config.open_store(), config.engine_config())
        .await
        .context("Could not open the event store")?;

    match cli.command {
        Commands::Add {
            title,
            start,
            end,
            duration,
            location,
            description,
            repeat,
        } => {
            let args = commands::add::AddArgs {
                title,
                start,
                end,
                duration,
                location,
                description,
                repeat,
            };
            commands::add::run(&engine, args).await
        }
        Commands::Update {
            id,
            title,
            start,
            end,
            duration,
            location,
            description,
            repeat,
        } => {
            let args = commands::update::UpdateArgs {
                title,
                start,
                end,
                duration,
                location,
                description,
                repeat,
            };
            commands::update::run(&engine, &id, args).await
        }
        Commands::Delete { id } => commands::delete::run(&engine, &id).await,
        Commands::Show { id, json } => commands::show::run(&engine, &id, json).await,
        Commands::List { json, templates } => commands::list::run(&engine, json, templates).await,
        Commands::Sync => commands::sync::run(&engine).await,
        Commands::Watch { interval } => {
            let interval = time_input::parse_interval(&interval)?;
            commands::watch::run(&engine, interval).await
        }
    }
}
