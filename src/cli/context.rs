use std::sync::Arc;

use crate::auth::AuthClient;
use crate::backend;
use crate::config::{config, ConsoleConfig};
use crate::console::AdminConsole;
use crate::session::SessionManager;

/// Everything a command needs, restored from the config directory
pub struct CliContext {
    pub config: &'static ConsoleConfig,
    pub session: Arc<SessionManager>,
}

impl CliContext {
    /// Load the stored session; an expired or corrupt one is discarded here
    pub async fn open() -> anyhow::Result<Self> {
        let session = Arc::new(SessionManager::from_config()?);
        session.initialize().await;
        Ok(Self {
            config: config(),
            session,
        })
    }

    pub fn auth_client(&self) -> anyhow::Result<AuthClient> {
        Ok(AuthClient::from_config(self.config)?)
    }

    pub async fn console(&self) -> anyhow::Result<AdminConsole> {
        let backend = backend::from_config(self.config, self.session.clone()).await?;
        Ok(AdminConsole::from_config(self.config, self.session.clone(), backend))
    }
}
