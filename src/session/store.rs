use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{ConsoleError, ConsoleResult};

/// The two durable slots owned by the session manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Raw credential string
    Credential,
    /// Serialized identity decoded from the credential
    Identity,
}

impl Slot {
    pub fn file_name(&self) -> &'static str {
        match self {
            Slot::Credential => "token",
            Slot::Identity => "user.json",
        }
    }
}

/// Durable storage port for the session pair
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn read(&self, slot: Slot) -> ConsoleResult<Option<String>>;
    async fn write(&self, slot: Slot, value: &str) -> ConsoleResult<()>;
    /// Clearing an empty slot is not an error
    async fn clear(&self, slot: Slot) -> ConsoleResult<()>;
}

/// One file per slot under the CLI config directory
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `PEDAL_CONFIG_DIR`, else `$HOME/.config/pedal/cli`
    pub fn from_config() -> ConsoleResult<Self> {
        let dir = match &crate::config::config().session.config_dir {
            Some(dir) => dir.clone(),
            None => {
                let home = std::env::var("HOME")
                    .map_err(|_| ConsoleError::config("HOME environment variable not set"))?;
                PathBuf::from(home).join(".config").join("pedal").join("cli")
            }
        };
        Ok(Self::new(dir))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, slot: Slot) -> PathBuf {
        self.dir.join(slot.file_name())
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn read(&self, slot: Slot) -> ConsoleResult<Option<String>> {
        match tokio::fs::read_to_string(self.path(slot)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, slot: Slot, value: &str) -> ConsoleResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        // Write-then-rename so a crash never leaves a half-written slot
        let target = self.path(slot);
        let staging = self.dir.join(format!(".{}.tmp", slot.file_name()));
        tokio::fs::write(&staging, value).await?;
        tokio::fs::rename(&staging, &target).await?;
        Ok(())
    }

    async fn clear(&self, slot: Slot) -> ConsoleResult<()> {
        match tokio::fs::remove_file(self.path(slot)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process slots, with a switch that makes writes fail
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    slots: RwLock<HashMap<Slot, String>>,
    fail_writes: AtomicBool,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a slot as if left behind by a previous run
    pub async fn seed(&self, slot: Slot, value: impl Into<String>) {
        self.slots.write().await.insert(slot, value.into());
    }

    pub async fn peek(&self, slot: Slot) -> Option<String> {
        self.slots.read().await.get(&slot).cloned()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn read(&self, slot: Slot) -> ConsoleResult<Option<String>> {
        Ok(self.slots.read().await.get(&slot).cloned())
    }

    async fn write(&self, slot: Slot, value: &str) -> ConsoleResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ConsoleError::storage(format!("write to {:?} slot refused", slot)));
        }
        self.slots.write().await.insert(slot, value.to_string());
        Ok(())
    }

    async fn clear(&self, slot: Slot) -> ConsoleResult<()> {
        self.slots.write().await.remove(&slot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        std::env::temp_dir().join(format!("pedal_store_{}_{}_{}", tag, std::process::id(), nanos))
    }

    #[tokio::test]
    async fn file_store_round_trips_and_clears() {
        let dir = temp_dir("rt");
        let store = FileSessionStore::new(&dir);

        assert_eq!(store.read(Slot::Credential).await.unwrap(), None);
        store.write(Slot::Credential, "tok").await.unwrap();
        assert_eq!(store.read(Slot::Credential).await.unwrap().as_deref(), Some("tok"));
        assert!(dir.join("token").exists());

        store.clear(Slot::Credential).await.unwrap();
        store.clear(Slot::Credential).await.unwrap();
        assert_eq!(store.read(Slot::Credential).await.unwrap(), None);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn memory_store_can_refuse_writes() {
        let store = MemorySessionStore::new();
        store.fail_writes(true);
        assert!(matches!(
            store.write(Slot::Identity, "{}").await,
            Err(ConsoleError::Storage(_))
        ));
        assert!(store.is_empty().await);
    }
}
