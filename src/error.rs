// Console error taxonomy
use serde_json::{json, Value};
use thiserror::Error;

/// Every failure the console can report to a view or to the CLI.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// Credential could not be decoded into an Identity
    #[error("Malformed credential: {0}")]
    Decode(String),

    /// Status change not permitted by the entity's state machine
    #[error("Illegal transition for {kind}: {from} -> {to}")]
    IllegalTransition {
        kind: String,
        from: String,
        to: String,
    },

    /// Status value outside the entity's declared enumeration
    #[error("Invalid {kind} status: {value}")]
    InvalidStatus { kind: String, value: String },

    /// Rejected profile input
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Row status moved underneath a compare-and-set write
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Authentication required")]
    AuthRequired,

    /// Login rejected by the authentication endpoint
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Session storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Response arrived after its view was unmounted
    #[error("Request cancelled")]
    Cancelled,
}

impl ConsoleError {
    pub fn decode(message: impl Into<String>) -> Self {
        ConsoleError::Decode(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ConsoleError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ConsoleError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ConsoleError::Conflict(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        ConsoleError::Transport(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        ConsoleError::Storage(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ConsoleError::Forbidden(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        ConsoleError::Config(message.into())
    }

    /// Stable code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ConsoleError::Decode(_) => "DECODE_ERROR",
            ConsoleError::IllegalTransition { .. } => "ILLEGAL_TRANSITION",
            ConsoleError::InvalidStatus { .. } => "INVALID_STATUS",
            ConsoleError::Validation(_) => "VALIDATION_ERROR",
            ConsoleError::NotFound(_) => "NOT_FOUND",
            ConsoleError::Conflict(_) => "CONFLICT",
            ConsoleError::Transport(_) => "TRANSPORT_ERROR",
            ConsoleError::AuthRequired => "AUTH_REQUIRED",
            ConsoleError::Unauthorized(_) => "UNAUTHORIZED",
            ConsoleError::Forbidden(_) => "FORBIDDEN",
            ConsoleError::Storage(_) => "STORAGE_ERROR",
            ConsoleError::Config(_) => "CONFIG_ERROR",
            ConsoleError::Cancelled => "CANCELLED",
        }
    }

    /// Only transport failures are worth re-triggering by hand; nothing is retried automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConsoleError::Transport(_))
    }

    /// Report body shown by the triggering view
    pub fn to_json(&self) -> Value {
        json!({
            "success": false,
            "error": self.to_string(),
            "error_code": self.error_code(),
        })
    }
}

impl From<reqwest::Error> for ConsoleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ConsoleError::Transport(format!("request timed out: {}", err))
        } else if err.is_decode() {
            ConsoleError::Transport(format!("unexpected response body: {}", err))
        } else {
            ConsoleError::Transport(err.to_string())
        }
    }
}

impl From<sqlx::Error> for ConsoleError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ConsoleError::not_found("Record not found"),
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                ConsoleError::conflict(db.message().to_string())
            }
            other => {
                tracing::error!("SQLx error: {}", other);
                ConsoleError::Transport(format!("database error: {}", other))
            }
        }
    }
}

impl From<std::io::Error> for ConsoleError {
    fn from(err: std::io::Error) -> Self {
        ConsoleError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(err: serde_json::Error) -> Self {
        ConsoleError::Storage(format!("invalid stored data: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for ConsoleError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        ConsoleError::Decode(err.to_string())
    }
}

pub type ConsoleResult<T> = Result<T, ConsoleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ConsoleError::AuthRequired.error_code(), "AUTH_REQUIRED");
        assert_eq!(ConsoleError::decode("x").error_code(), "DECODE_ERROR");
        let err = ConsoleError::IllegalTransition {
            kind: "store".into(),
            from: "aprobado".into(),
            to: "pendiente_aprobacion".into(),
        };
        assert_eq!(err.error_code(), "ILLEGAL_TRANSITION");
        assert_eq!(
            err.to_string(),
            "Illegal transition for store: aprobado -> pendiente_aprobacion"
        );
    }

    #[test]
    fn only_transport_is_retryable() {
        assert!(ConsoleError::transport("down").is_retryable());
        assert!(!ConsoleError::not_found("u9").is_retryable());
        assert!(!ConsoleError::AuthRequired.is_retryable());
    }

    #[test]
    fn report_body_carries_code_and_message() {
        let body = ConsoleError::not_found("store s1").to_json();
        assert_eq!(body["success"], false);
        assert_eq!(body["error_code"], "NOT_FOUND");
        assert_eq!(body["error"], "Not found: store s1");
    }
}
