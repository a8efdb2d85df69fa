use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::error::{ConsoleError, ConsoleResult};
use crate::models::Moderated;
use crate::status::{Status, UserState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    #[serde(default)]
    pub phone: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

impl UserRecord {
    pub fn state(&self) -> UserState {
        UserState::from_flag(self.is_active)
    }
}

impl Moderated for UserRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> Status {
        Status::User(self.state())
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

fn active_by_default() -> bool {
    true
}

fn check_name(full_name: &str) -> ConsoleResult<()> {
    if full_name.trim().is_empty() {
        return Err(ConsoleError::validation("full_name must not be empty"));
    }
    Ok(())
}

fn check_email(email: &str) -> ConsoleResult<()> {
    match email.trim().split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ConsoleError::validation(format!("'{}' is not an email address", email))),
    }
}

/// Account created from the console
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

impl NewUser {
    pub fn validate(&self) -> ConsoleResult<()> {
        check_name(&self.full_name)?;
        check_email(&self.email)
    }
}

/// Profile edit. Only the fields present are changed; the active flag moves
/// through status transitions, never through an edit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.email.is_none() && self.role.is_none() && self.phone.is_none()
    }

    pub fn validate(&self) -> ConsoleResult<()> {
        if self.is_empty() {
            return Err(ConsoleError::validation("nothing to update"));
        }
        if let Some(full_name) = &self.full_name {
            check_name(full_name)?;
        }
        if let Some(email) = &self.email {
            check_email(email)?;
        }
        Ok(())
    }

    pub fn apply(&self, user: &mut UserRecord) {
        if let Some(full_name) = &self.full_name {
            user.full_name = full_name.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(phone) = &self.phone {
            user.phone = Some(phone.clone());
        }
    }
}
