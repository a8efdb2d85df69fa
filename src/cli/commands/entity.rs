use crate::cli::commands::output_transition;
use crate::cli::context::CliContext;
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::status::EntityKind;

pub async fn transition(kind: EntityKind, id: &str, status: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let ctx = CliContext::open().await?;
    let console = ctx.console().await?;
    let outcome = console.transition(kind, id, status).await?;
    output_transition(&output_format, &outcome)
}

pub async fn delete(kind: EntityKind, id: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let ctx = CliContext::open().await?;
    let console = ctx.console().await?;
    console.delete(kind, id).await?;
    output_success(&output_format, &format!("{} {} deleted", kind, id), None)
}

pub async fn ping(output_format: OutputFormat) -> anyhow::Result<()> {
    let ctx = CliContext::open().await?;
    let console = ctx.console().await?;
    console.health_check().await?;
    let target = match ctx.config.backend {
        crate::config::BackendKind::Http => ctx.config.api.base_url.clone(),
        crate::config::BackendKind::Postgres => "database".to_string(),
    };
    output_success(
        &output_format,
        &format!("{} is reachable", target),
        Some(serde_json::json!({ "backend": ctx.config.backend })),
    )
}
