use std::time::Duration;

use serde_json::json;

use crate::cache::{Mount, QueryScope};
use crate::cli::context::CliContext;
use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::console::Overview;

fn print_overview(output_format: &OutputFormat, overview: &Overview) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ "overview": overview }))?);
        }
        OutputFormat::Text => {
            let stats = &overview.stats;
            println!(
                "Users: {} ({} riders, {} merchants, {} route creators)",
                stats.total_users, stats.total_cyclists, stats.total_merchants, stats.total_route_creators
            );
            println!("Routes: {} ({} pending)", stats.total_routes, stats.pending_routes);
            println!("Stores: {} ({} pending)", stats.total_stores, stats.pending_stores);
            println!(
                "Transactions: {} (revenue {})",
                stats.total_transactions,
                stats.total_revenue.round_dp(2)
            );

            if !overview.pending_routes.is_empty() {
                println!("\nRoutes awaiting approval:");
                for route in &overview.pending_routes {
                    println!(
                        "  {}  {}  by {}",
                        route.id,
                        route.title,
                        route.creator_name.as_deref().unwrap_or("-")
                    );
                }
            }
            if !overview.pending_stores.is_empty() {
                println!("\nStores awaiting approval:");
                for store in &overview.pending_stores {
                    println!(
                        "  {}  {}  by {}",
                        store.id,
                        store.name,
                        store.owner_name.as_deref().unwrap_or("-")
                    );
                }
            }
        }
    }
    Ok(())
}

pub async fn handle(watch: bool, interval: Option<u64>, output_format: OutputFormat) -> anyhow::Result<()> {
    let ctx = CliContext::open().await?;
    let console = ctx.console().await?;
    let mount = Mount::new();

    if !watch {
        let overview = console.overview(&mount).await?;
        return print_overview(&output_format, &overview);
    }

    let secs = interval.unwrap_or(ctx.config.dashboard.refresh_secs).max(1);
    let mut ticker = tokio::time::interval(Duration::from_secs(secs));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                console.bus().publish(QueryScope::ALL);
                match console.overview(&mount).await {
                    Ok(overview) => {
                        if let OutputFormat::Text = output_format {
                            println!("\n[{}]", short_date(&chrono::Utc::now()));
                        }
                        print_overview(&output_format, &overview)?;
                    }
                    Err(e) if e.is_retryable() => tracing::warn!("Dashboard refresh failed: {}", e),
                    Err(e) => return Err(e.into()),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                mount.unmount();
                break;
            }
        }
    }
    Ok(())
}
