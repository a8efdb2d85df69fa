use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    pub environment: Environment,
    pub api: ApiConfig,
    pub backend: BackendKind,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Where admin reads and mutations go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Http,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Directory holding the credential and identity slots
    pub config_dir: Option<PathBuf>,
    /// Unauthenticated entry point emitted with every sign-out
    pub login_path: String,
    /// HS256 secret; when absent credentials are decoded without signature checks
    pub jwt_secret: Option<String>,
    pub require_admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub refresh_secs: u64,
}

impl ConsoleConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // API overrides
        if let Ok(v) = env::var("PEDAL_API_URL") {
            self.api.base_url = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("PEDAL_API_TIMEOUT_SECS") {
            self.api.request_timeout_secs = v.parse().unwrap_or(self.api.request_timeout_secs);
        }
        if let Ok(v) = env::var("PEDAL_BACKEND") {
            self.backend = match v.to_ascii_lowercase().as_str() {
                "postgres" | "pg" | "sql" => BackendKind::Postgres,
                "http" | "api" => BackendKind::Http,
                _ => self.backend,
            };
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Session overrides
        if let Ok(v) = env::var("PEDAL_CONFIG_DIR") {
            self.session.config_dir = Some(PathBuf::from(v));
        }
        if let Ok(v) = env::var("PEDAL_LOGIN_PATH") {
            self.session.login_path = v;
        }
        if let Ok(v) = env::var("PEDAL_JWT_SECRET") {
            self.session.jwt_secret = if v.is_empty() { None } else { Some(v) };
        }
        if let Ok(v) = env::var("PEDAL_REQUIRE_ADMIN") {
            self.session.require_admin = v.parse().unwrap_or(self.session.require_admin);
        }

        if let Ok(v) = env::var("PEDAL_DASHBOARD_REFRESH_SECS") {
            self.dashboard.refresh_secs = v.parse().unwrap_or(self.dashboard.refresh_secs);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            api: ApiConfig {
                base_url: "http://localhost:4000".to_string(),
                request_timeout_secs: 30,
            },
            backend: BackendKind::Http,
            database: DatabaseConfig {
                url: None,
                max_connections: 5,
                connection_timeout: 30,
            },
            session: SessionConfig {
                config_dir: None,
                login_path: "/login".to_string(),
                jwt_secret: None,
                require_admin: false,
            },
            dashboard: DashboardConfig { refresh_secs: 30 },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            api: ApiConfig {
                base_url: "https://staging-api.pedal.example".to_string(),
                request_timeout_secs: 15,
            },
            backend: BackendKind::Http,
            database: DatabaseConfig {
                url: None,
                max_connections: 5,
                connection_timeout: 10,
            },
            session: SessionConfig {
                config_dir: None,
                login_path: "/login".to_string(),
                jwt_secret: None,
                require_admin: true,
            },
            dashboard: DashboardConfig { refresh_secs: 30 },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            api: ApiConfig {
                base_url: "https://api.pedal.example".to_string(),
                request_timeout_secs: 10,
            },
            backend: BackendKind::Http,
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 5,
            },
            session: SessionConfig {
                config_dir: None,
                login_path: "/login".to_string(),
                jwt_secret: None,
                require_admin: true,
            },
            dashboard: DashboardConfig { refresh_secs: 30 },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<ConsoleConfig> = Lazy::new(ConsoleConfig::from_env);

pub fn config() -> &'static ConsoleConfig {
    &CONFIG
}
