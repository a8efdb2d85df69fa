pub mod store;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{info, warn};

use crate::auth::{Credential, CredentialDecoder, Identity, Role};
use crate::error::{ConsoleError, ConsoleResult};

pub use store::{FileSessionStore, MemorySessionStore, SessionStore, Slot};

/// The current credential together with the identity decoded from it
#[derive(Debug, Clone)]
pub struct Session {
    pub credential: Credential,
    pub identity: Identity,
}

/// "Authenticated changed" notification consumed by the routing layer
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SignedIn(Identity),
    SignedOut { redirect_to: String },
}

/// Owns the single Credential/Identity pair of the running client.
///
/// Every decode or storage failure collapses to a logout; protected content is
/// never shown without a currently valid Identity. Login and logout are
/// serialized and always overwrite both slots.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    decoder: CredentialDecoder,
    current: RwLock<Option<Session>>,
    writer: Mutex<()>,
    events: broadcast::Sender<SessionEvent>,
    login_path: String,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, decoder: CredentialDecoder) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            store,
            decoder,
            current: RwLock::new(None),
            writer: Mutex::new(()),
            events,
            login_path: "/login".to_string(),
        }
    }

    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// File-backed manager using the global console configuration
    pub fn from_config() -> ConsoleResult<Self> {
        let session = &crate::config::config().session;
        let store = FileSessionStore::from_config()?;
        Ok(Self::new(Arc::new(store), CredentialDecoder::from_config())
            .with_login_path(session.login_path.clone()))
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Restore the pair left in durable storage by a previous run
    pub async fn initialize(&self) -> Option<Identity> {
        let _writer = self.writer.lock().await;

        let credential = self.store.read(Slot::Credential).await;
        let identity = self.store.read(Slot::Identity).await;

        let (credential, identity) = match (credential, identity) {
            (Ok(None), Ok(None)) => {
                *self.current.write().await = None;
                return None;
            }
            (Ok(Some(credential)), Ok(Some(identity))) => (Credential::new(credential), identity),
            (Err(e), _) | (_, Err(e)) => {
                self.collapse(&format!("stored session unreadable: {}", e)).await;
                return None;
            }
            _ => {
                self.collapse("stored session is missing one of its slots").await;
                return None;
            }
        };

        let stored: Identity = match serde_json::from_str(&identity) {
            Ok(stored) => stored,
            Err(e) => {
                self.collapse(&format!("stored identity is corrupt: {}", e)).await;
                return None;
            }
        };

        match self.decoder.decode(&credential) {
            Ok(decoded) if decoded == stored => {}
            Ok(_) => {
                self.collapse("stored identity does not match its credential").await;
                return None;
            }
            Err(e) => {
                self.collapse(&format!("stored credential is malformed: {}", e)).await;
                return None;
            }
        }

        if !stored.is_valid_at(Utc::now()) {
            self.collapse("stored session has expired").await;
            return None;
        }

        info!("Restored session for {} ({})", stored.email, stored.role);
        *self.current.write().await = Some(Session {
            credential,
            identity: stored.clone(),
        });
        let _ = self.events.send(SessionEvent::SignedIn(stored.clone()));
        Some(stored)
    }

    /// Adopt a freshly issued credential; any failure leaves the client logged out
    pub async fn login(&self, credential: Credential) -> ConsoleResult<Identity> {
        let _writer = self.writer.lock().await;

        let identity = match self.decoder.decode(&credential) {
            Ok(identity) => identity,
            Err(e) => {
                self.collapse(&format!("login credential rejected: {}", e)).await;
                return Err(e);
            }
        };

        if !identity.is_valid_at(Utc::now()) {
            self.collapse("login credential already expired").await;
            return Err(ConsoleError::decode("credential expired"));
        }

        if let Err(e) = self.persist(&credential, &identity).await {
            self.collapse(&format!("could not persist session: {}", e)).await;
            return Err(e);
        }

        info!("Signed in as {} ({})", identity.email, identity.role);
        *self.current.write().await = Some(Session {
            credential,
            identity: identity.clone(),
        });
        let _ = self.events.send(SessionEvent::SignedIn(identity.clone()));
        Ok(identity)
    }

    /// Idempotent; always ends with both slots empty and a redirect signal
    pub async fn logout(&self) {
        let _writer = self.writer.lock().await;
        self.sign_out().await;
        info!("Signed out");
    }

    pub async fn current_identity(&self) -> Option<Identity> {
        self.current.read().await.as_ref().map(|s| s.identity.clone())
    }

    /// Current credential, only while its identity is still valid
    pub async fn credential(&self) -> Option<Credential> {
        self.valid_session(Utc::now()).await.map(|s| s.credential)
    }

    /// Re-derived on every call so a mid-use expiry is caught
    pub async fn is_authenticated(&self) -> bool {
        self.is_authenticated_at(Utc::now()).await
    }

    pub async fn is_authenticated_at(&self, now: DateTime<Utc>) -> bool {
        self.current
            .read()
            .await
            .as_ref()
            .is_some_and(|s| s.identity.is_valid_at(now))
    }

    /// Protected-view gate: without a valid session, log out (redirect) and refuse
    pub async fn require_session(&self) -> ConsoleResult<Session> {
        if let Some(session) = self.valid_session(Utc::now()).await {
            return Ok(session);
        }

        let _writer = self.writer.lock().await;
        // A login may have landed while waiting for the lock
        if let Some(session) = self.valid_session(Utc::now()).await {
            return Ok(session);
        }
        if self.current.read().await.is_some() {
            warn!("Session expired while in use");
        }
        self.sign_out().await;
        Err(ConsoleError::AuthRequired)
    }

    pub async fn require_identity(&self) -> ConsoleResult<Identity> {
        self.require_session().await.map(|s| s.identity)
    }

    /// Gate plus role check; a wrong role is refused without ending the session
    pub async fn require_role(&self, role: Role) -> ConsoleResult<Session> {
        let session = self.require_session().await?;
        if session.identity.role != role {
            return Err(ConsoleError::forbidden(format!(
                "{} is signed in as {}, {} required",
                session.identity.email,
                session.identity.role.label(),
                role.label()
            )));
        }
        Ok(session)
    }

    async fn valid_session(&self, now: DateTime<Utc>) -> Option<Session> {
        self.current
            .read()
            .await
            .as_ref()
            .filter(|s| s.identity.is_valid_at(now))
            .cloned()
    }

    async fn persist(&self, credential: &Credential, identity: &Identity) -> ConsoleResult<()> {
        let serialized = serde_json::to_string(identity)
            .map_err(|e| ConsoleError::storage(format!("cannot serialize identity: {}", e)))?;
        self.store.write(Slot::Identity, &serialized).await?;
        self.store.write(Slot::Credential, credential.as_str()).await?;
        Ok(())
    }

    async fn collapse(&self, reason: &str) {
        warn!("Discarding session: {}", reason);
        self.sign_out().await;
    }

    /// Caller holds the writer lock
    async fn sign_out(&self) {
        *self.current.write().await = None;
        for slot in [Slot::Credential, Slot::Identity] {
            if let Err(e) = self.store.clear(slot).await {
                tracing::error!("Failed to clear {:?} slot: {}", slot, e);
            }
        }
        let _ = self.events.send(SessionEvent::SignedOut {
            redirect_to: self.login_path.clone(),
        });
    }
}
