use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::{Credential, Role};
use crate::config::ConsoleConfig;
use crate::error::{ConsoleError, ConsoleResult};

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub nombre: String,
    pub email: String,
    pub password: String,
    pub rol: Role,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    message: Option<String>,
}

/// Client for the login/register exchange
pub struct AuthClient {
    client: Client,
    base_url: String,
}

impl AuthClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ConsoleResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConsoleError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ConsoleConfig) -> ConsoleResult<Self> {
        Self::new(
            config.api.base_url.clone(),
            Duration::from_secs(config.api.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn login(&self, email: &str, password: &str) -> ConsoleResult<Credential> {
        self.exchange(
            "/api/auth/login",
            json!({ "email": email, "password": password }),
            "Error al iniciar sesión.",
        )
        .await
    }

    pub async fn register(&self, request: &RegisterRequest) -> ConsoleResult<Credential> {
        self.exchange(
            "/api/auth/register",
            serde_json::to_value(request).map_err(|e| ConsoleError::config(e.to_string()))?,
            "Error al registrar la cuenta.",
        )
        .await
    }

    async fn exchange(&self, path: &str, body: Value, fallback: &str) -> ConsoleResult<Credential> {
        let url = format!("{}{}", self.base_url, path);

        let response = self.client.post(&url).json(&body).send().await.map_err(|e| {
            tracing::error!("Failed to send POST request to {}: {}", url, e);
            ConsoleError::transport(format!("No se pudo conectar con el servidor: {}", e))
        })?;

        let status = response.status();
        if status.is_success() {
            let TokenResponse { token } = response.json().await?;
            return Ok(Credential::new(token));
        }

        let message = response
            .json::<MessageResponse>()
            .await
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| fallback.to_string());

        tracing::warn!("Authentication exchange {} failed with {}: {}", path, status, message);

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ConsoleError::Unauthorized(message)),
            _ => Err(ConsoleError::transport(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_body_uses_spanish_field_names() {
        let request = RegisterRequest {
            nombre: "Rita".into(),
            email: "rita@pedal.example".into(),
            password: "pw".into(),
            rol: Role::Merchant,
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["nombre"], "Rita");
        assert_eq!(body["rol"], "comerciante");
    }

    #[test]
    fn trims_trailing_slash() {
        let client = AuthClient::new("http://localhost:4000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:4000");
    }
}
