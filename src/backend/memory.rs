use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::auth::Role;
use crate::backend::{AdminBackend, RouteFilter, StoreFilter, TransactionFilter, UserFilter};
use crate::error::{ConsoleError, ConsoleResult};
use crate::models::{
    sort_newest_first, DashboardStats, Moderated, NewUser, RouteRecord, StoreRecord,
    TransactionRecord, UserRecord, UserUpdate,
};
use crate::status::{
    EntityKind, PaymentStatus, RouteStatus, StampField, Status, StatusChange, StoreStatus,
};

#[derive(Debug, Default)]
struct Tables {
    users: Vec<UserRecord>,
    routes: Vec<RouteRecord>,
    stores: Vec<StoreRecord>,
    transactions: Vec<TransactionRecord>,
    writes: usize,
    next_user: usize,
}

/// In-process backend used by tests and offline demos.
///
/// Writes follow the same compare-and-set contract as the relational backend.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RwLock<Tables>,
    offline: AtomicBool,
}

fn not_found(kind: EntityKind, id: &str) -> ConsoleError {
    ConsoleError::not_found(format!("{} {}", kind, id))
}

/// Locate a row and check it still holds the expected status
fn locate<'a, T: Moderated>(
    rows: &'a mut [T],
    kind: EntityKind,
    id: &str,
    change: &StatusChange,
) -> ConsoleResult<&'a mut T> {
    let row = rows
        .iter_mut()
        .find(|row| row.id() == id)
        .ok_or_else(|| not_found(kind, id))?;
    if row.status() != change.from {
        return Err(ConsoleError::conflict(format!(
            "{} {} is now {}, expected {}",
            kind,
            id,
            row.status(),
            change.from
        )));
    }
    Ok(row)
}

fn email_taken(users: &[UserRecord], email: &str, except: Option<&str>) -> bool {
    users
        .iter()
        .any(|u| u.email.eq_ignore_ascii_case(email) && Some(u.id.as_str()) != except)
}

fn remove<T: Moderated>(rows: &mut Vec<T>, kind: EntityKind, id: &str) -> ConsoleResult<()> {
    let before = rows.len();
    rows.retain(|row| row.id() != id);
    if rows.len() == before {
        return Err(not_found(kind, id));
    }
    Ok(())
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with a transport error while offline
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn reachable(&self) -> ConsoleResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ConsoleError::transport("backend unreachable"));
        }
        Ok(())
    }

    pub async fn insert_user(&self, user: UserRecord) {
        self.tables.write().await.users.push(user);
    }

    pub async fn insert_route(&self, route: RouteRecord) {
        self.tables.write().await.routes.push(route);
    }

    pub async fn insert_store(&self, store: StoreRecord) {
        self.tables.write().await.stores.push(store);
    }

    pub async fn insert_transaction(&self, transaction: TransactionRecord) {
        self.tables.write().await.transactions.push(transaction);
    }

    pub async fn user(&self, id: &str) -> Option<UserRecord> {
        self.tables.read().await.users.iter().find(|u| u.id == id).cloned()
    }

    pub async fn route(&self, id: &str) -> Option<RouteRecord> {
        self.tables.read().await.routes.iter().find(|r| r.id == id).cloned()
    }

    pub async fn store(&self, id: &str) -> Option<StoreRecord> {
        self.tables.read().await.stores.iter().find(|s| s.id == id).cloned()
    }

    /// Number of committed status writes and deletes
    pub async fn write_count(&self) -> usize {
        self.tables.read().await.writes
    }
}

#[async_trait]
impl AdminBackend for MemoryBackend {
    async fn list_users(&self, filter: &UserFilter) -> ConsoleResult<Vec<UserRecord>> {
        self.reachable()?;
        let mut users: Vec<_> = self.tables.read().await.users.iter().filter(|u| filter.matches(u)).cloned().collect();
        sort_newest_first(&mut users);
        Ok(users)
    }

    async fn list_routes(&self, filter: &RouteFilter) -> ConsoleResult<Vec<RouteRecord>> {
        self.reachable()?;
        let mut routes: Vec<_> = self.tables.read().await.routes.iter().filter(|r| filter.matches(r)).cloned().collect();
        sort_newest_first(&mut routes);
        Ok(routes)
    }

    async fn list_stores(&self, filter: &StoreFilter) -> ConsoleResult<Vec<StoreRecord>> {
        self.reachable()?;
        let mut stores: Vec<_> = self.tables.read().await.stores.iter().filter(|s| filter.matches(s)).cloned().collect();
        sort_newest_first(&mut stores);
        Ok(stores)
    }

    async fn list_transactions(&self, filter: &TransactionFilter) -> ConsoleResult<Vec<TransactionRecord>> {
        self.reachable()?;
        let mut transactions: Vec<_> = self
            .tables
            .read()
            .await
            .transactions
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        sort_newest_first(&mut transactions);
        Ok(transactions)
    }

    async fn dashboard_stats(&self) -> ConsoleResult<DashboardStats> {
        self.reachable()?;
        let tables = self.tables.read().await;
        let with_role = |role: Role| tables.users.iter().filter(|u| u.role == role).count() as i64;

        Ok(DashboardStats {
            total_users: tables.users.len() as i64,
            total_cyclists: with_role(Role::Rider),
            total_merchants: with_role(Role::Merchant),
            total_route_creators: with_role(Role::RouteCreator),
            total_routes: tables.routes.len() as i64,
            pending_routes: tables
                .routes
                .iter()
                .filter(|r| r.status == RouteStatus::PendingApproval)
                .count() as i64,
            total_stores: tables.stores.len() as i64,
            pending_stores: tables
                .stores
                .iter()
                .filter(|s| s.status == StoreStatus::PendingApproval)
                .count() as i64,
            total_revenue: tables
                .transactions
                .iter()
                .filter(|t| t.payment_status == PaymentStatus::Completed)
                .map(|t| t.amount)
                .sum::<Decimal>(),
            total_transactions: tables.transactions.len() as i64,
        })
    }

    async fn current_status(&self, kind: EntityKind, id: &str) -> ConsoleResult<Status> {
        self.reachable()?;
        let tables = self.tables.read().await;
        let found = match kind {
            EntityKind::User => tables.users.iter().find(|r| r.id == id).map(Moderated::status),
            EntityKind::Route => tables.routes.iter().find(|r| r.id == id).map(Moderated::status),
            EntityKind::Store => tables.stores.iter().find(|r| r.id == id).map(Moderated::status),
            EntityKind::Transaction => tables.transactions.iter().find(|r| r.id == id).map(Moderated::status),
        };
        found.ok_or_else(|| not_found(kind, id))
    }

    async fn write_status(&self, kind: EntityKind, id: &str, change: &StatusChange) -> ConsoleResult<()> {
        self.reachable()?;
        let mut tables = self.tables.write().await;
        let stamp = |field: StampField| change.stamp.filter(|s| s.field == field).map(|s| s.at);

        match change.to {
            Status::User(state) => {
                let user = locate(&mut tables.users, kind, id, change)?;
                user.is_active = state.is_active();
            }
            Status::Route(status) => {
                let route = locate(&mut tables.routes, kind, id, change)?;
                route.status = status;
                if let Some(at) = stamp(StampField::PublishedAt) {
                    route.published_at = Some(at);
                }
            }
            Status::Store(status) => {
                let store = locate(&mut tables.stores, kind, id, change)?;
                store.status = status;
                if let Some(at) = stamp(StampField::ApprovedAt) {
                    store.approved_at = Some(at);
                }
            }
            Status::Payment(_) => {
                return Err(ConsoleError::IllegalTransition {
                    kind: kind.to_string(),
                    from: change.from.to_string(),
                    to: change.to.to_string(),
                })
            }
        }

        tables.writes += 1;
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> ConsoleResult<()> {
        self.reachable()?;
        let mut tables = self.tables.write().await;
        match kind {
            EntityKind::User => remove(&mut tables.users, kind, id)?,
            EntityKind::Route => remove(&mut tables.routes, kind, id)?,
            EntityKind::Store => remove(&mut tables.stores, kind, id)?,
            EntityKind::Transaction => remove(&mut tables.transactions, kind, id)?,
        }
        tables.writes += 1;
        Ok(())
    }

    async fn create_user(&self, user: &NewUser) -> ConsoleResult<UserRecord> {
        self.reachable()?;
        let mut tables = self.tables.write().await;
        if email_taken(&tables.users, &user.email, None) {
            return Err(ConsoleError::conflict(format!("email {} is already registered", user.email)));
        }

        tables.next_user += 1;
        let record = UserRecord {
            id: format!("user-{}", tables.next_user),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
            phone: user.phone.clone(),
            is_active: user.is_active,
            email_verified: false,
            created_at: Utc::now(),
            last_login: None,
        };
        tables.users.push(record.clone());
        tables.writes += 1;
        Ok(record)
    }

    async fn update_user(&self, id: &str, update: &UserUpdate) -> ConsoleResult<UserRecord> {
        self.reachable()?;
        let mut tables = self.tables.write().await;
        if let Some(email) = &update.email {
            if email_taken(&tables.users, email, Some(id)) {
                return Err(ConsoleError::conflict(format!("email {} is already registered", email)));
            }
        }

        let user = tables
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| not_found(EntityKind::User, id))?;
        update.apply(user);
        let updated = user.clone();
        tables.writes += 1;
        Ok(updated)
    }

    async fn health_check(&self) -> ConsoleResult<()> {
        self.reachable()
    }
}
