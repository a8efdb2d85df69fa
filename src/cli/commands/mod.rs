pub mod auth;
pub mod entity;
pub mod routes;
pub mod stats;
pub mod stores;
pub mod transactions;
pub mod users;

use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::status::TransitionOutcome;

/// Shared report for every status change command
pub(crate) fn output_transition(output_format: &OutputFormat, outcome: &TransitionOutcome) -> anyhow::Result<()> {
    let message = match outcome.stamped_at {
        Some(at) => format!(
            "{} {}: {} -> {} (at {})",
            outcome.kind,
            outcome.id,
            outcome.from,
            outcome.to,
            at.format("%Y-%m-%d %H:%M:%S")
        ),
        None => format!("{} {}: {} -> {}", outcome.kind, outcome.id, outcome.from, outcome.to),
    };
    output_success(output_format, &message, Some(json!({ "transition": outcome })))
}
