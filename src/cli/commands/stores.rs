use chrono::{DateTime, Utc};
use clap::Subcommand;

use crate::backend::{DateRange, StoreFilter};
use crate::cache::Mount;
use crate::cli::commands::output_transition;
use crate::cli::context::CliContext;
use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::models::StoreRecord;
use crate::status::{EntityKind, StoreStatus};

#[derive(Subcommand)]
pub enum StoreCommands {
    #[command(about = "List stores, newest first")]
    List {
        #[arg(long, help = "Match store or owner name")]
        search: Option<String>,
        #[arg(long, help = "pendiente_aprobacion, aprobado, suspendido or rechazado")]
        status: Option<StoreStatus>,
        #[arg(long, value_parser = parse_from_date, help = "Created on or after (YYYY-MM-DD)")]
        from: Option<DateTime<Utc>>,
        #[arg(long, value_parser = parse_to_date, help = "Created on or before (YYYY-MM-DD)")]
        to: Option<DateTime<Utc>>,
    },

    #[command(about = "Approve a pending store")]
    Approve {
        #[arg(help = "Store id")]
        id: String,
    },

    #[command(about = "Reject a pending store")]
    Reject {
        #[arg(help = "Store id")]
        id: String,
    },

    #[command(about = "Suspend an approved store")]
    Suspend {
        #[arg(help = "Store id")]
        id: String,
    },

    #[command(about = "Delete a store")]
    Delete {
        #[arg(help = "Store id")]
        id: String,
    },
}

fn print_stores(stores: &[StoreRecord]) {
    println!("{:<38} {:<28} {:<22} {:<22} {}", "ID", "NAME", "OWNER", "STATUS", "CREATED");
    println!("{}", "-".repeat(128));
    for store in stores {
        println!(
            "{:<38} {:<28} {:<22} {:<22} {}",
            clip(&store.id, 38),
            clip(&store.name, 28),
            clip(store.owner_name.as_deref().unwrap_or("-"), 22),
            store.status.as_str(),
            short_date(&store.created_at)
        );
    }
}

pub async fn handle(cmd: StoreCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let ctx = CliContext::open().await?;
    let console = ctx.console().await?;

    match cmd {
        StoreCommands::List { search, status, from, to } => {
            let filter = StoreFilter {
                search,
                status,
                created: DateRange { from, to },
            };
            let stores = console.stores(&filter, &Mount::new()).await?;
            output_collection(&output_format, "stores", &stores, "No stores match", print_stores)
        }
        StoreCommands::Approve { id } => output_transition(&output_format, &console.approve_store(&id).await?),
        StoreCommands::Reject { id } => output_transition(&output_format, &console.reject_store(&id).await?),
        StoreCommands::Suspend { id } => output_transition(&output_format, &console.suspend_store(&id).await?),
        StoreCommands::Delete { id } => {
            console.delete(EntityKind::Store, &id).await?;
            output_success(&output_format, &format!("Store {} deleted", id), None)
        }
    }
}
