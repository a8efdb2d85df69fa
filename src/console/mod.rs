use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::auth::{Identity, Role};
use crate::backend::{AdminBackend, RouteFilter, StoreFilter, TransactionFilter, UserFilter};
use crate::cache::{InvalidationBus, Mount, QueryCache, QueryKey, QueryScope};
use crate::config::ConsoleConfig;
use crate::error::{ConsoleError, ConsoleResult};
use crate::models::{
    DashboardStats, NewUser, RouteRecord, StoreRecord, TransactionRecord, UserRecord, UserUpdate,
};
use crate::session::{Session, SessionManager};
use crate::status::{
    EntityKind, RouteStatus, Status, StatusController, StoreStatus, TransitionOutcome, UserState,
};

/// Dashboard landing data
#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub stats: DashboardStats,
    pub pending_routes: Vec<RouteRecord>,
    pub pending_stores: Vec<StoreRecord>,
}

/// What the admin views talk to: every call is gated on a valid session,
/// reads go through the query cache, and writes go through the status controller.
pub struct AdminConsole {
    session: Arc<SessionManager>,
    backend: Arc<dyn AdminBackend>,
    controller: StatusController,
    invalidations: Mutex<broadcast::Receiver<QueryScope>>,
    required_role: Option<Role>,
    users: QueryCache<Vec<UserRecord>>,
    routes: QueryCache<Vec<RouteRecord>>,
    stores: QueryCache<Vec<StoreRecord>>,
    transactions: QueryCache<Vec<TransactionRecord>>,
    stats: QueryCache<DashboardStats>,
}

impl AdminConsole {
    pub fn new(session: Arc<SessionManager>, backend: Arc<dyn AdminBackend>) -> Self {
        Self::with_bus(session, backend, InvalidationBus::new())
    }

    /// Share a bus with other consoles so their writes invalidate our reads
    pub fn with_bus(session: Arc<SessionManager>, backend: Arc<dyn AdminBackend>, bus: InvalidationBus) -> Self {
        let invalidations = Mutex::new(bus.subscribe());
        Self {
            controller: StatusController::new(backend.clone(), bus),
            session,
            backend,
            invalidations,
            required_role: None,
            users: QueryCache::new(),
            routes: QueryCache::new(),
            stores: QueryCache::new(),
            transactions: QueryCache::new(),
            stats: QueryCache::new(),
        }
    }

    pub fn from_config(config: &ConsoleConfig, session: Arc<SessionManager>, backend: Arc<dyn AdminBackend>) -> Self {
        let required = config.session.require_admin.then_some(Role::Administrator);
        Self::new(session, backend).with_required_role(required)
    }

    pub fn with_required_role(mut self, role: Option<Role>) -> Self {
        self.required_role = role;
        self
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn bus(&self) -> &InvalidationBus {
        self.controller.bus()
    }

    /// The identity allowed to see protected views right now
    pub async fn whoami(&self) -> ConsoleResult<Identity> {
        self.gate().await.map(|s| s.identity)
    }

    async fn gate(&self) -> ConsoleResult<Session> {
        match self.required_role {
            Some(role) => self.session.require_role(role).await,
            None => self.session.require_session().await,
        }
    }

    /// A rejected credential from the data source ends the session
    async fn guard<T>(&self, result: ConsoleResult<T>) -> ConsoleResult<T> {
        if let Err(ConsoleError::AuthRequired) = &result {
            warn!("Backend rejected the credential; signing out");
            self.session.logout().await;
        }
        result
    }

    /// Apply scopes published since the last read
    async fn sync_invalidations(&self) {
        let mut rx = self.invalidations.lock().await;
        loop {
            match rx.try_recv() {
                Ok(scope) => self.invalidate(scope).await,
                Err(TryRecvError::Lagged(missed)) => {
                    debug!("Missed {} invalidations; dropping every cached read", missed);
                    for scope in QueryScope::ALL {
                        self.invalidate(scope).await;
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    async fn invalidate(&self, scope: QueryScope) {
        match scope {
            QueryScope::Users => self.users.invalidate(scope).await,
            QueryScope::Routes => self.routes.invalidate(scope).await,
            QueryScope::Stores => self.stores.invalidate(scope).await,
            QueryScope::Transactions => self.transactions.invalidate(scope).await,
            QueryScope::DashboardStats => self.stats.invalidate(scope).await,
        };
    }

    pub async fn users(&self, filter: &UserFilter, mount: &Mount) -> ConsoleResult<Vec<UserRecord>> {
        self.gate().await?;
        self.sync_invalidations().await;
        let key = QueryKey::new(QueryScope::Users, filter);
        let result = self.users.fetch(key, mount, || self.backend.list_users(filter)).await;
        self.guard(result).await
    }

    pub async fn routes(&self, filter: &RouteFilter, mount: &Mount) -> ConsoleResult<Vec<RouteRecord>> {
        self.gate().await?;
        self.sync_invalidations().await;
        let key = QueryKey::new(QueryScope::Routes, filter);
        let result = self.routes.fetch(key, mount, || self.backend.list_routes(filter)).await;
        self.guard(result).await
    }

    pub async fn stores(&self, filter: &StoreFilter, mount: &Mount) -> ConsoleResult<Vec<StoreRecord>> {
        self.gate().await?;
        self.sync_invalidations().await;
        let key = QueryKey::new(QueryScope::Stores, filter);
        let result = self.stores.fetch(key, mount, || self.backend.list_stores(filter)).await;
        self.guard(result).await
    }

    pub async fn transactions(
        &self,
        filter: &TransactionFilter,
        mount: &Mount,
    ) -> ConsoleResult<Vec<TransactionRecord>> {
        self.gate().await?;
        self.sync_invalidations().await;
        let key = QueryKey::new(QueryScope::Transactions, filter);
        let result = self
            .transactions
            .fetch(key, mount, || self.backend.list_transactions(filter))
            .await;
        self.guard(result).await
    }

    pub async fn dashboard_stats(&self, mount: &Mount) -> ConsoleResult<DashboardStats> {
        self.gate().await?;
        self.sync_invalidations().await;
        let key = QueryKey::scope_only(QueryScope::DashboardStats);
        let result = self.stats.fetch(key, mount, || self.backend.dashboard_stats()).await;
        self.guard(result).await
    }

    /// Stats plus both approval queues, fetched concurrently
    pub async fn overview(&self, mount: &Mount) -> ConsoleResult<Overview> {
        let routes = RouteFilter {
            status: Some(RouteStatus::PendingApproval),
            ..Default::default()
        };
        let stores = StoreFilter {
            status: Some(StoreStatus::PendingApproval),
            ..Default::default()
        };

        let (stats, pending_routes, pending_stores) = futures::try_join!(
            self.dashboard_stats(mount),
            self.routes(&routes, mount),
            self.stores(&stores, mount),
        )?;

        Ok(Overview {
            stats,
            pending_routes,
            pending_stores,
        })
    }

    pub async fn transition(&self, kind: EntityKind, id: &str, target: &str) -> ConsoleResult<TransitionOutcome> {
        self.gate().await?;
        let result = self.controller.apply_transition(kind, id, target).await;
        self.guard(result).await
    }

    async fn apply(&self, kind: EntityKind, id: &str, target: Status) -> ConsoleResult<TransitionOutcome> {
        self.gate().await?;
        let result = self.controller.apply(kind, id, target).await;
        self.guard(result).await
    }

    pub async fn approve_route(&self, id: &str) -> ConsoleResult<TransitionOutcome> {
        self.apply(EntityKind::Route, id, Status::Route(RouteStatus::Approved)).await
    }

    pub async fn reject_route(&self, id: &str) -> ConsoleResult<TransitionOutcome> {
        self.apply(EntityKind::Route, id, Status::Route(RouteStatus::Rejected)).await
    }

    pub async fn deactivate_route(&self, id: &str) -> ConsoleResult<TransitionOutcome> {
        self.apply(EntityKind::Route, id, Status::Route(RouteStatus::Inactive)).await
    }

    pub async fn approve_store(&self, id: &str) -> ConsoleResult<TransitionOutcome> {
        self.apply(EntityKind::Store, id, Status::Store(StoreStatus::Approved)).await
    }

    pub async fn reject_store(&self, id: &str) -> ConsoleResult<TransitionOutcome> {
        self.apply(EntityKind::Store, id, Status::Store(StoreStatus::Rejected)).await
    }

    pub async fn suspend_store(&self, id: &str) -> ConsoleResult<TransitionOutcome> {
        self.apply(EntityKind::Store, id, Status::Store(StoreStatus::Suspended)).await
    }

    pub async fn set_user_active(&self, id: &str, active: bool) -> ConsoleResult<TransitionOutcome> {
        self.apply(EntityKind::User, id, Status::User(UserState::from_flag(active))).await
    }

    pub async fn toggle_user(&self, id: &str) -> ConsoleResult<TransitionOutcome> {
        self.gate().await?;
        let result = self.controller.toggle_user(id).await;
        self.guard(result).await
    }

    pub async fn create_user(&self, user: &NewUser) -> ConsoleResult<UserRecord> {
        self.gate().await?;
        user.validate()?;
        let result = self.backend.create_user(user).await;
        let created = self.guard(result).await?;

        info!("Created user {} <{}>", created.id, created.email);
        self.bus().publish(EntityKind::User.dependent_scopes());
        Ok(created)
    }

    /// Edit profile fields; suspension goes through `set_user_active`
    pub async fn update_user(&self, id: &str, update: &UserUpdate) -> ConsoleResult<UserRecord> {
        self.gate().await?;
        update.validate()?;
        let result = self.backend.update_user(id, update).await;
        let updated = self.guard(result).await?;

        info!("Updated user {}", id);
        self.bus().publish(EntityKind::User.dependent_scopes());
        Ok(updated)
    }

    pub async fn delete(&self, kind: EntityKind, id: &str) -> ConsoleResult<()> {
        self.gate().await?;
        let result = self.controller.delete(kind, id).await;
        self.guard(result).await
    }

    pub async fn health_check(&self) -> ConsoleResult<()> {
        self.backend.health_check().await
    }
}
