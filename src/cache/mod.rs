use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

use crate::error::{ConsoleError, ConsoleResult};

/// Read families that a mutation can invalidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryScope {
    Users,
    Routes,
    Stores,
    Transactions,
    DashboardStats,
}

impl QueryScope {
    pub const ALL: [QueryScope; 5] = [
        QueryScope::Users,
        QueryScope::Routes,
        QueryScope::Stores,
        QueryScope::Transactions,
        QueryScope::DashboardStats,
    ];

    /// Cache key prefix used by the web console
    pub fn label(&self) -> &'static str {
        match self {
            QueryScope::Users => "admin-users",
            QueryScope::Routes => "admin-routes",
            QueryScope::Stores => "admin-stores",
            QueryScope::Transactions => "admin-transactions",
            QueryScope::DashboardStats => "admin-dashboard-stats",
        }
    }
}

/// A scope plus the serialized filter that produced the read
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub scope: QueryScope,
    pub params: String,
}

impl QueryKey {
    pub fn new(scope: QueryScope, params: &impl Serialize) -> Self {
        Self {
            scope,
            params: serde_json::to_string(params).unwrap_or_default(),
        }
    }

    pub fn scope_only(scope: QueryScope) -> Self {
        Self {
            scope,
            params: String::new(),
        }
    }
}

/// Publish/subscribe channel that carries invalidated scopes
#[derive(Debug, Clone)]
pub struct InvalidationBus {
    sender: broadcast::Sender<QueryScope>,
}

impl InvalidationBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self { sender }
    }

    pub fn publish(&self, scopes: impl IntoIterator<Item = QueryScope>) {
        for scope in scopes {
            debug!("Invalidating {}", scope.label());
            // No subscribers is fine
            let _ = self.sender.send(scope);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueryScope> {
        self.sender.subscribe()
    }
}

impl Default for InvalidationBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifetime of a view. Results of loads started under a mount are discarded
/// once it is unmounted or dropped.
#[derive(Debug)]
pub struct Mount {
    active: Arc<AtomicBool>,
}

impl Mount {
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn unmount(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    /// Handle held by an in-flight load
    pub fn watch(&self) -> MountWatch {
        MountWatch {
            active: Arc::clone(&self.active),
        }
    }
}

impl Default for Mount {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Mount {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[derive(Debug, Clone)]
pub struct MountWatch {
    active: Arc<AtomicBool>,
}

impl MountWatch {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

struct Entry<V> {
    value: V,
    fresh: bool,
}

struct CacheState<V> {
    entries: HashMap<QueryKey, Entry<V>>,
    epochs: HashMap<QueryScope, u64>,
}

/// Keyed read cache. A fresh entry is served without a reload; invalidation
/// drops the scope's entries and bumps its epoch so that loads already in
/// flight store their result as stale. Stale entries go with the next
/// invalidation of their scope.
pub struct QueryCache<V> {
    state: Mutex<CacheState<V>>,
}

impl<V: Clone + Send> QueryCache<V> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                epochs: HashMap::new(),
            }),
        }
    }

    /// Fresh cached value, if any
    pub async fn get(&self, key: &QueryKey) -> Option<V> {
        let state = self.state.lock().await;
        state
            .entries
            .get(key)
            .filter(|entry| entry.fresh)
            .map(|entry| entry.value.clone())
    }

    pub async fn is_fresh(&self, key: &QueryKey) -> bool {
        self.get(key).await.is_some()
    }

    pub async fn fetch<F, Fut>(&self, key: QueryKey, mount: &Mount, loader: F) -> ConsoleResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ConsoleResult<V>>,
    {
        let watch = mount.watch();

        let started_at = {
            let state = self.state.lock().await;
            if let Some(entry) = state.entries.get(&key).filter(|entry| entry.fresh) {
                debug!("Cache hit for {} {}", key.scope.label(), key.params);
                return Ok(entry.value.clone());
            }
            state.epochs.get(&key.scope).copied().unwrap_or(0)
        };

        let result = loader().await;

        if !watch.is_active() {
            debug!("Discarding {} result for unmounted view", key.scope.label());
            return Err(ConsoleError::Cancelled);
        }
        let value = result?;

        let mut state = self.state.lock().await;
        let fresh = state.epochs.get(&key.scope).copied().unwrap_or(0) == started_at;
        if !fresh {
            debug!("{} invalidated during load; storing as stale", key.scope.label());
        }
        state.entries.insert(
            key,
            Entry {
                value: value.clone(),
                fresh,
            },
        );
        Ok(value)
    }

    /// Drop every entry of `scope`; returns how many were dropped
    pub async fn invalidate(&self, scope: QueryScope) -> usize {
        let mut state = self.state.lock().await;
        *state.epochs.entry(scope).or_insert(0) += 1;
        let before = state.entries.len();
        state.entries.retain(|key, _| key.scope != scope);
        let dropped = before - state.entries.len();
        debug!("Invalidated {} ({} entries dropped)", scope.label(), dropped);
        dropped
    }

    pub async fn invalidate_all(&self) {
        for scope in QueryScope::ALL {
            self.invalidate(scope).await;
        }
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<V: Clone + Send> Default for QueryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
