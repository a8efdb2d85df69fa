pub mod commands;
pub mod context;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::status::EntityKind;

#[derive(Parser)]
#[command(name = "pedal")]
#[command(about = "Pedal admin console - moderate users, routes, stores and payments")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Sign in, register and inspect the current session")]
    Auth {
        #[command(subcommand)]
        cmd: commands::auth::AuthCommands,
    },

    #[command(about = "User accounts")]
    Users {
        #[command(subcommand)]
        cmd: commands::users::UserCommands,
    },

    #[command(about = "Route moderation")]
    Routes {
        #[command(subcommand)]
        cmd: commands::routes::RouteCommands,
    },

    #[command(about = "Store moderation")]
    Stores {
        #[command(subcommand)]
        cmd: commands::stores::StoreCommands,
    },

    #[command(about = "Payment history (read only)")]
    Transactions {
        #[command(subcommand)]
        cmd: commands::transactions::TransactionCommands,
    },

    #[command(about = "Dashboard statistics and approval queues")]
    Stats {
        #[arg(long, help = "Refresh until interrupted")]
        watch: bool,
        #[arg(long, help = "Seconds between refreshes (defaults to PEDAL_DASHBOARD_REFRESH_SECS)")]
        interval: Option<u64>,
    },

    #[command(about = "Move any entity to a new status")]
    Transition {
        #[arg(help = "Entity type: route, store, user or transaction")]
        kind: EntityKind,
        #[arg(help = "Entity id")]
        id: String,
        #[arg(help = "Target status, e.g. aprobada or suspendido")]
        status: String,
    },

    #[command(about = "Delete any entity")]
    Delete {
        #[arg(help = "Entity type: route, store, user or transaction")]
        kind: EntityKind,
        #[arg(help = "Entity id")]
        id: String,
    },

    #[command(about = "Check that the data source is reachable")]
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    let result = match cli.command {
        Commands::Auth { cmd } => commands::auth::handle(cmd, output_format.clone()).await,
        Commands::Users { cmd } => commands::users::handle(cmd, output_format.clone()).await,
        Commands::Routes { cmd } => commands::routes::handle(cmd, output_format.clone()).await,
        Commands::Stores { cmd } => commands::stores::handle(cmd, output_format.clone()).await,
        Commands::Transactions { cmd } => commands::transactions::handle(cmd, output_format.clone()).await,
        Commands::Stats { watch, interval } => {
            commands::stats::handle(watch, interval, output_format.clone()).await
        }
        Commands::Transition { kind, id, status } => {
            commands::entity::transition(kind, &id, &status, output_format.clone()).await
        }
        Commands::Delete { kind, id } => commands::entity::delete(kind, &id, output_format.clone()).await,
        Commands::Ping => commands::entity::ping(output_format.clone()).await,
    };

    if let Err(e) = &result {
        if let Some(console_error) = e.downcast_ref::<crate::error::ConsoleError>() {
            utils::output_error(&output_format, console_error)?;
        }
    }
    result
}
