use clap::Subcommand;
use serde_json::json;

use crate::auth::Role;
use crate::backend::UserFilter;
use crate::cache::Mount;
use crate::cli::commands::output_transition;
use crate::cli::context::CliContext;
use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::models::{NewUser, UserRecord, UserUpdate};
use crate::status::EntityKind;

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "List users, newest first")]
    List {
        #[arg(long, help = "Match name or email")]
        search: Option<String>,
        #[arg(long, help = "ciclista, comerciante, creador_ruta or administrador")]
        role: Option<Role>,
        #[arg(long, help = "true for active accounts, false for suspended ones")]
        active: Option<bool>,
    },

    #[command(about = "Create a user account")]
    Create {
        #[arg(help = "Full name")]
        name: String,
        #[arg(help = "Email")]
        email: String,
        #[arg(long, default_value = "ciclista", help = "ciclista, comerciante, creador_ruta or administrador")]
        role: Role,
        #[arg(long, help = "Phone number")]
        phone: Option<String>,
        #[arg(long, help = "Create the account suspended")]
        inactive: bool,
    },

    #[command(about = "Edit a user's profile")]
    Edit {
        #[arg(help = "User id")]
        id: String,
        #[arg(long, help = "New full name")]
        name: Option<String>,
        #[arg(long, help = "New email")]
        email: Option<String>,
        #[arg(long, help = "New role")]
        role: Option<Role>,
        #[arg(long, help = "New phone number")]
        phone: Option<String>,
    },

    #[command(about = "Flip a user between active and suspended")]
    Toggle {
        #[arg(help = "User id")]
        id: String,
    },

    #[command(about = "Reactivate a suspended user")]
    Activate {
        #[arg(help = "User id")]
        id: String,
    },

    #[command(about = "Suspend an active user")]
    Suspend {
        #[arg(help = "User id")]
        id: String,
    },

    #[command(about = "Delete a user")]
    Delete {
        #[arg(help = "User id")]
        id: String,
    },
}

fn print_users(users: &[UserRecord]) {
    println!("{:<38} {:<24} {:<30} {:<16} {:<10} {}", "ID", "NAME", "EMAIL", "ROLE", "STATE", "CREATED");
    println!("{}", "-".repeat(134));
    for user in users {
        println!(
            "{:<38} {:<24} {:<30} {:<16} {:<10} {}",
            clip(&user.id, 38),
            clip(&user.full_name, 24),
            clip(&user.email, 30),
            user.role.label(),
            user.state().as_str(),
            short_date(&user.created_at)
        );
    }
}

pub async fn handle(cmd: UserCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let ctx = CliContext::open().await?;
    let console = ctx.console().await?;

    match cmd {
        UserCommands::List { search, role, active } => {
            let filter = UserFilter { search, role, active };
            let users = console.users(&filter, &Mount::new()).await?;
            output_collection(&output_format, "users", &users, "No users match", print_users)
        }
        UserCommands::Create {
            name,
            email,
            role,
            phone,
            inactive,
        } => {
            let user = NewUser {
                full_name: name,
                email,
                role,
                phone,
                is_active: !inactive,
            };
            let created = console.create_user(&user).await?;
            output_success(
                &output_format,
                &format!("User {} created with id {}", created.email, created.id),
                Some(json!({ "user": created })),
            )
        }
        UserCommands::Edit {
            id,
            name,
            email,
            role,
            phone,
        } => {
            let update = UserUpdate {
                full_name: name,
                email,
                role,
                phone,
            };
            let updated = console.update_user(&id, &update).await?;
            output_success(
                &output_format,
                &format!("User {} updated", updated.id),
                Some(json!({ "user": updated })),
            )
        }
        UserCommands::Toggle { id } => output_transition(&output_format, &console.toggle_user(&id).await?),
        UserCommands::Activate { id } => {
            output_transition(&output_format, &console.set_user_active(&id, true).await?)
        }
        UserCommands::Suspend { id } => {
            output_transition(&output_format, &console.set_user_active(&id, false).await?)
        }
        UserCommands::Delete { id } => {
            console.delete(EntityKind::User, &id).await?;
            output_success(&output_format, &format!("User {} deleted", id), None)
        }
    }
}
