pub mod fixtures;

use std::sync::Arc;

use chrono::Duration;

use crate::auth::{CredentialDecoder, Role};
use crate::backend::MemoryBackend;
use crate::console::AdminConsole;
use crate::error::ConsoleResult;
use crate::session::{MemorySessionStore, SessionManager};

/// In-process console wired to a memory backend and memory session slots
pub struct TestContext {
    pub backend: Arc<MemoryBackend>,
    pub store: Arc<MemorySessionStore>,
    pub session: Arc<SessionManager>,
    pub console: AdminConsole,
}

impl TestContext {
    pub fn new() -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let store = Arc::new(MemorySessionStore::new());
        let session = Arc::new(SessionManager::new(store.clone(), CredentialDecoder::default()));
        let console = AdminConsole::new(session.clone(), backend.clone())
            .with_required_role(Some(Role::Administrator));

        Self {
            backend,
            store,
            session,
            console,
        }
    }

    /// Context with a live session for `role`, valid for an hour
    pub async fn signed_in(role: Role) -> ConsoleResult<Self> {
        let ctx = Self::new();
        ctx.sign_in(role, Duration::hours(1)).await?;
        Ok(ctx)
    }

    pub async fn sign_in(&self, role: Role, ttl: Duration) -> ConsoleResult<()> {
        let identity = fixtures::identity("admin-1", role, ttl);
        let credential = fixtures::credential(&identity)?;
        self.session.login(credential).await?;
        Ok(())
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signed_in_context_is_authenticated() {
        let ctx = TestContext::signed_in(Role::Administrator).await.unwrap();
        assert!(ctx.session.is_authenticated().await);
        assert!(ctx.store.peek(crate::session::Slot::Credential).await.is_some());
    }
}
