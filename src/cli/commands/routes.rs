use chrono::{DateTime, Utc};
use clap::Subcommand;

use crate::backend::{DateRange, RouteFilter};
use crate::cache::Mount;
use crate::cli::commands::output_transition;
use crate::cli::context::CliContext;
use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::models::{Difficulty, RouteRecord};
use crate::status::{EntityKind, RouteStatus};

#[derive(Subcommand)]
pub enum RouteCommands {
    #[command(about = "List routes, newest first")]
    List {
        #[arg(long, help = "Match title or creator name")]
        search: Option<String>,
        #[arg(long, help = "borrador, pendiente_aprobacion, aprobada, rechazada or inactiva")]
        status: Option<RouteStatus>,
        #[arg(long, help = "facil, moderado, dificil or experto")]
        difficulty: Option<Difficulty>,
        #[arg(long, value_parser = parse_from_date, help = "Created on or after (YYYY-MM-DD)")]
        from: Option<DateTime<Utc>>,
        #[arg(long, value_parser = parse_to_date, help = "Created on or before (YYYY-MM-DD)")]
        to: Option<DateTime<Utc>>,
    },

    #[command(about = "Publish a pending route")]
    Approve {
        #[arg(help = "Route id")]
        id: String,
    },

    #[command(about = "Reject a pending route")]
    Reject {
        #[arg(help = "Route id")]
        id: String,
    },

    #[command(about = "Take an approved route off sale")]
    Deactivate {
        #[arg(help = "Route id")]
        id: String,
    },

    #[command(about = "Delete a route")]
    Delete {
        #[arg(help = "Route id")]
        id: String,
    },
}

fn print_routes(routes: &[RouteRecord]) {
    println!(
        "{:<38} {:<28} {:<20} {:>8} {:<10} {:>9} {:<22} {}",
        "ID", "TITLE", "CREATOR", "KM", "LEVEL", "PRICE", "STATUS", "CREATED"
    );
    println!("{}", "-".repeat(150));
    for route in routes {
        println!(
            "{:<38} {:<28} {:<20} {:>8.1} {:<10} {:>9} {:<22} {}",
            clip(&route.id, 38),
            clip(&route.title, 28),
            clip(route.creator_name.as_deref().unwrap_or("-"), 20),
            route.distance_km,
            route.difficulty.as_str(),
            route.price.round_dp(2).to_string(),
            route.status.as_str(),
            short_date(&route.created_at)
        );
    }
}

pub async fn handle(cmd: RouteCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let ctx = CliContext::open().await?;
    let console = ctx.console().await?;

    match cmd {
        RouteCommands::List {
            search,
            status,
            difficulty,
            from,
            to,
        } => {
            let filter = RouteFilter {
                search,
                status,
                difficulty,
                created: DateRange { from, to },
            };
            let routes = console.routes(&filter, &Mount::new()).await?;
            output_collection(&output_format, "routes", &routes, "No routes match", print_routes)
        }
        RouteCommands::Approve { id } => output_transition(&output_format, &console.approve_route(&id).await?),
        RouteCommands::Reject { id } => output_transition(&output_format, &console.reject_route(&id).await?),
        RouteCommands::Deactivate { id } => {
            output_transition(&output_format, &console.deactivate_route(&id).await?)
        }
        RouteCommands::Delete { id } => {
            console.delete(EntityKind::Route, &id).await?;
            output_success(&output_format, &format!("Route {} deleted", id), None)
        }
    }
}
