use chrono::{DateTime, Utc};
use clap::Subcommand;
use serde_json::{json, Value};

use crate::auth::{RegisterRequest, Role};
use crate::cli::context::CliContext;
use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::session::SessionManager;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Sign in with email and password")]
    Login {
        #[arg(help = "Email")]
        email: String,
        #[arg(long, help = "Password (falls back to PEDAL_PASSWORD, then stdin)")]
        password: Option<String>,
    },

    #[command(about = "Create an account and sign in with it")]
    Register {
        #[arg(help = "Full name")]
        name: String,
        #[arg(help = "Email")]
        email: String,
        #[arg(long, default_value = "ciclista", help = "ciclista, comerciante, creador_ruta or administrador")]
        role: Role,
        #[arg(long, help = "Password (falls back to PEDAL_PASSWORD, then stdin)")]
        password: Option<String>,
    },

    #[command(about = "Sign out and clear the stored session")]
    Logout,

    #[command(about = "Show current authentication status")]
    Status,

    #[command(about = "Show current user information")]
    Whoami,
}

/// `auth status` body; the flag is re-derived at `now`, never read back from storage
async fn status_report(session: &SessionManager, api_url: &str, now: DateTime<Utc>) -> Value {
    json!({
        "authenticated": session.is_authenticated_at(now).await,
        "user": session.current_identity().await,
        "api_url": api_url,
    })
}

pub async fn handle(cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let ctx = CliContext::open().await?;

    match cmd {
        AuthCommands::Login { email, password } => {
            let password = resolve_password(password)?;
            let credential = ctx.auth_client()?.login(&email, &password).await?;
            let identity = ctx.session.login(credential).await?;

            output_success(
                &output_format,
                &format!("Signed in as {} ({})", identity.name, identity.role.label()),
                Some(json!({ "user": identity })),
            )
        }
        AuthCommands::Register {
            name,
            email,
            role,
            password,
        } => {
            let request = RegisterRequest {
                nombre: name,
                email,
                password: resolve_password(password)?,
                rol: role,
            };
            let credential = ctx.auth_client()?.register(&request).await?;
            let identity = ctx.session.login(credential).await?;

            output_success(
                &output_format,
                &format!("Registered and signed in as {} ({})", identity.email, identity.role.label()),
                Some(json!({ "user": identity })),
            )
        }
        AuthCommands::Logout => {
            ctx.session.logout().await;
            output_success(&output_format, "Signed out", None)
        }
        AuthCommands::Status => {
            let report = status_report(&ctx.session, &ctx.config.api.base_url, Utc::now()).await;
            match output_format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                OutputFormat::Text => match ctx.session.current_identity().await {
                    Some(identity) if report["authenticated"] == true => {
                        println!("Signed in as {} <{}>", identity.name, identity.email);
                        println!("Role: {}", identity.role.label());
                        println!("Expires: {}", short_date(&identity.expires_at));
                        println!("API: {}", ctx.config.api.base_url);
                    }
                    Some(identity) => {
                        println!("Session for {} expired at {}", identity.email, short_date(&identity.expires_at));
                    }
                    None => println!("Not signed in"),
                },
            }
            Ok(())
        }
        AuthCommands::Whoami => {
            let identity = ctx.session.require_identity().await?;
            match output_format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&json!({ "user": identity }))?);
                }
                OutputFormat::Text => {
                    println!("{} <{}> [{}] id={}", identity.name, identity.email, identity.role, identity.id);
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;
    use chrono::Duration;

    #[tokio::test]
    async fn status_reports_expiry_of_a_loaded_session() {
        let ctx = TestContext::signed_in(Role::Administrator).await.unwrap();

        let now = status_report(&ctx.session, "http://localhost:4000", Utc::now()).await;
        assert_eq!(now["authenticated"], true);

        let later = Utc::now() + Duration::hours(2);
        let report = status_report(&ctx.session, "http://localhost:4000", later).await;
        assert_eq!(report["authenticated"], false);
        assert_eq!(report["user"]["id"], "admin-1");
    }

    #[tokio::test]
    async fn status_without_a_session() {
        let ctx = TestContext::new();
        let report = status_report(&ctx.session, "http://localhost:4000", Utc::now()).await;
        assert_eq!(report["authenticated"], false);
        assert!(report["user"].is_null());
    }
}
