use chrono::{DateTime, Utc};
use clap::Subcommand;
use rust_decimal::Decimal;

use crate::backend::{DateRange, TransactionFilter};
use crate::cache::Mount;
use crate::cli::context::CliContext;
use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::models::{TransactionRecord, TransactionType};
use crate::status::PaymentStatus;

#[derive(Subcommand)]
pub enum TransactionCommands {
    #[command(about = "List payments, newest first")]
    List {
        #[arg(long, help = "Match buyer name or transaction id")]
        search: Option<String>,
        #[arg(long, help = "pendiente, completado, fallido or reembolsado")]
        status: Option<PaymentStatus>,
        #[arg(long = "type", help = "compra_ruta or pedido_comercio")]
        transaction_type: Option<TransactionType>,
        #[arg(long, value_parser = parse_from_date, help = "Created on or after (YYYY-MM-DD)")]
        from: Option<DateTime<Utc>>,
        #[arg(long, value_parser = parse_to_date, help = "Created on or before (YYYY-MM-DD)")]
        to: Option<DateTime<Utc>>,
    },
}

fn print_transactions(transactions: &[TransactionRecord]) {
    println!(
        "{:<38} {:<22} {:<16} {:>10} {:<12} {}",
        "ID", "BUYER", "TYPE", "AMOUNT", "STATUS", "CREATED"
    );
    println!("{}", "-".repeat(118));
    for tx in transactions {
        println!(
            "{:<38} {:<22} {:<16} {:>10} {:<12} {}",
            clip(&tx.id, 38),
            clip(tx.user_name.as_deref().unwrap_or("-"), 22),
            tx.transaction_type.as_str(),
            tx.amount.round_dp(2).to_string(),
            tx.payment_status.as_str(),
            short_date(&tx.created_at)
        );
    }
    let completed: Decimal = transactions
        .iter()
        .filter(|tx| tx.payment_status == PaymentStatus::Completed)
        .map(|tx| tx.amount)
        .sum();
    println!("\nCompleted total: {}", completed.round_dp(2));
}

pub async fn handle(cmd: TransactionCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let ctx = CliContext::open().await?;
    let console = ctx.console().await?;

    match cmd {
        TransactionCommands::List {
            search,
            status,
            transaction_type,
            from,
            to,
        } => {
            let filter = TransactionFilter {
                search,
                status,
                transaction_type,
                created: DateRange { from, to },
            };
            let transactions = console.transactions(&filter, &Mount::new()).await?;
            output_collection(
                &output_format,
                "transactions",
                &transactions,
                "No transactions match",
                print_transactions,
            )
        }
    }
}
