pub mod filter;
pub mod http;
pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{BackendKind, ConsoleConfig};
use crate::error::ConsoleResult;
use crate::models::{
    DashboardStats, NewUser, RouteRecord, StoreRecord, TransactionRecord, UserRecord, UserUpdate,
};
use crate::session::SessionManager;
use crate::status::{EntityKind, Status, StatusChange};

pub use filter::{DateRange, RouteFilter, StoreFilter, TransactionFilter, UserFilter};
pub use http::HttpBackend;
pub use memory::MemoryBackend;
pub use postgres::PgBackend;

/// Data port behind the console. Lists come back filtered and newest first.
#[async_trait]
pub trait AdminBackend: Send + Sync {
    async fn list_users(&self, filter: &UserFilter) -> ConsoleResult<Vec<UserRecord>>;
    async fn list_routes(&self, filter: &RouteFilter) -> ConsoleResult<Vec<RouteRecord>>;
    async fn list_stores(&self, filter: &StoreFilter) -> ConsoleResult<Vec<StoreRecord>>;
    async fn list_transactions(&self, filter: &TransactionFilter) -> ConsoleResult<Vec<TransactionRecord>>;
    async fn dashboard_stats(&self) -> ConsoleResult<DashboardStats>;

    /// `NotFound` when the id does not exist
    async fn current_status(&self, kind: EntityKind, id: &str) -> ConsoleResult<Status>;

    /// Atomic per row; `Conflict` if the row no longer holds `change.from`
    async fn write_status(&self, kind: EntityKind, id: &str, change: &StatusChange) -> ConsoleResult<()>;

    async fn delete(&self, kind: EntityKind, id: &str) -> ConsoleResult<()>;

    /// `Conflict` when the email is already registered
    async fn create_user(&self, user: &NewUser) -> ConsoleResult<UserRecord>;

    /// Profile fields only; `NotFound` when the id does not exist
    async fn update_user(&self, id: &str, update: &UserUpdate) -> ConsoleResult<UserRecord>;

    async fn health_check(&self) -> ConsoleResult<()>;
}

/// Backend selected by `PEDAL_BACKEND`
pub async fn from_config(
    config: &ConsoleConfig,
    session: Arc<SessionManager>,
) -> ConsoleResult<Arc<dyn AdminBackend>> {
    match config.backend {
        BackendKind::Http => Ok(Arc::new(HttpBackend::from_config(config, session)?)),
        BackendKind::Postgres => Ok(Arc::new(PgBackend::connect(&config.database).await?)),
    }
}
