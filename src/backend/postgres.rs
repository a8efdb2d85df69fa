use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres};
use tracing::info;

use crate::auth::Role;
use crate::backend::{AdminBackend, DateRange, RouteFilter, StoreFilter, TransactionFilter, UserFilter};
use crate::config::DatabaseConfig;
use crate::error::{ConsoleError, ConsoleResult};
use crate::models::{
    DashboardStats, Difficulty, NewUser, RouteRecord, StoreRecord, TransactionRecord, TransactionType,
    UserRecord, UserUpdate,
};
use crate::status::{EntityKind, Status, StatusChange, UserState};

/// Bound value of a generated statement
#[derive(Debug, Clone, PartialEq)]
enum SqlParam {
    Text(String),
    Timestamp(DateTime<Utc>),
    Bool(bool),
}

#[derive(Debug, Clone, Default)]
struct SqlResult {
    query: String,
    params: Vec<SqlParam>,
}

impl SqlResult {
    fn new(select: &str) -> Self {
        Self {
            query: format!("{} WHERE TRUE", select),
            params: Vec::new(),
        }
    }

    /// Append `AND <expr> $n`, binding `param` as `$n`
    fn and(&mut self, expr: &str, param: SqlParam) -> &mut Self {
        self.params.push(param);
        self.query
            .push_str(&format!(" AND {} ${}", expr, self.params.len()));
        self
    }

    /// Case-insensitive match of one term against any of `columns`
    fn search(&mut self, columns: &[&str], term: Option<&str>) -> &mut Self {
        if let Some(term) = term {
            self.params.push(SqlParam::Text(format!("%{}%", escape_like(term))));
            let n = self.params.len();
            let any: Vec<String> = columns
                .iter()
                .map(|column| format!("COALESCE({}, '') ILIKE ${}", column, n))
                .collect();
            self.query.push_str(&format!(" AND ({})", any.join(" OR ")));
        }
        self
    }

    fn created(&mut self, column: &str, range: &DateRange) -> &mut Self {
        if let Some(from) = range.from {
            self.and(&format!("{} >=", column), SqlParam::Timestamp(from));
        }
        if let Some(to) = range.to {
            self.and(&format!("{} <=", column), SqlParam::Timestamp(to));
        }
        self
    }

    fn newest_first(&mut self, column: &str) -> &mut Self {
        self.query.push_str(&format!(" ORDER BY {} DESC", column));
        self
    }
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn bind_param_query_as<'q, O>(
    q: sqlx::query::QueryAs<'q, Postgres, O, PgArguments>,
    v: &'q SqlParam,
) -> sqlx::query::QueryAs<'q, Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, PgRow>,
{
    match v {
        SqlParam::Text(s) => q.bind(s),
        SqlParam::Timestamp(t) => q.bind(*t),
        SqlParam::Bool(b) => q.bind(*b),
    }
}

fn bind_param_query<'q>(
    q: sqlx::query::Query<'q, Postgres, PgArguments>,
    v: &'q SqlParam,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match v {
        SqlParam::Text(s) => q.bind(s),
        SqlParam::Timestamp(t) => q.bind(*t),
        SqlParam::Bool(b) => q.bind(*b),
    }
}

/// Single-row compare-and-set for a status change: the row is only touched
/// while it still holds `change.from`
fn status_update(kind: EntityKind, id: &str, change: &StatusChange) -> ConsoleResult<SqlResult> {
    let mut params = Vec::new();
    let query = match change.to {
        Status::User(state) => {
            params.push(SqlParam::Bool(state.is_active()));
            params.push(SqlParam::Text(id.to_string()));
            params.push(SqlParam::Bool(change.from == Status::User(UserState::Active)));
            "UPDATE users SET is_active = $1, updated_at = NOW() WHERE id::text = $2 AND is_active = $3".to_string()
        }
        Status::Route(_) | Status::Store(_) => {
            params.push(SqlParam::Text(change.to.as_str().to_string()));
            let mut set = String::from("status = $1");
            if let Some(stamp) = change.stamp {
                params.push(SqlParam::Timestamp(stamp.at));
                set.push_str(&format!(", {} = ${}", stamp.field.column(), params.len()));
            }
            params.push(SqlParam::Text(id.to_string()));
            let id_param = params.len();
            params.push(SqlParam::Text(change.from.as_str().to_string()));
            format!(
                "UPDATE {} SET {}, updated_at = NOW() WHERE id::text = ${} AND status::text = ${}",
                kind.collection(),
                set,
                id_param,
                params.len()
            )
        }
        Status::Payment(_) => {
            return Err(ConsoleError::IllegalTransition {
                kind: kind.to_string(),
                from: change.from.to_string(),
                to: change.to.to_string(),
            })
        }
    };
    Ok(SqlResult { query, params })
}

/// Refusal for a compare-and-set that matched no row although the row exists
fn lost_race(kind: EntityKind, id: &str, current: Status, change: &StatusChange) -> ConsoleError {
    ConsoleError::conflict(format!(
        "{} {} is now {}, expected {}",
        kind, id, current, change.from
    ))
}

fn parse_column<T: std::str::FromStr<Err = String>>(column: &str, value: &str) -> ConsoleResult<T> {
    value
        .parse()
        .map_err(|e: String| ConsoleError::transport(format!("bad {} in database: {}", column, e)))
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: String,
    email: String,
    full_name: String,
    role: String,
    phone: Option<String>,
    is_active: bool,
    email_verified: bool,
    created_at: DateTime<Utc>,
    last_login: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = ConsoleError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(UserRecord {
            role: parse_column::<Role>("role", &row.role)?,
            id: row.id,
            email: row.email,
            full_name: row.full_name,
            phone: row.phone,
            is_active: row.is_active,
            email_verified: row.email_verified,
            created_at: row.created_at,
            last_login: row.last_login,
        })
    }
}

#[derive(Debug, FromRow)]
struct RouteRow {
    id: String,
    creator_id: String,
    creator_name: Option<String>,
    title: String,
    description: Option<String>,
    distance_km: f64,
    difficulty: String,
    price: Decimal,
    status: String,
    total_sales: i64,
    view_count: i64,
    average_rating: f64,
    created_at: DateTime<Utc>,
    published_at: Option<DateTime<Utc>>,
}

impl TryFrom<RouteRow> for RouteRecord {
    type Error = ConsoleError;

    fn try_from(row: RouteRow) -> Result<Self, Self::Error> {
        Ok(RouteRecord {
            difficulty: parse_column::<Difficulty>("difficulty", &row.difficulty)?,
            status: row.status.parse()?,
            id: row.id,
            creator_id: row.creator_id,
            creator_name: row.creator_name,
            title: row.title,
            description: row.description,
            distance_km: row.distance_km,
            price: row.price,
            total_sales: row.total_sales,
            view_count: row.view_count,
            average_rating: row.average_rating,
            created_at: row.created_at,
            published_at: row.published_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct StoreRow {
    id: String,
    owner_id: String,
    owner_name: Option<String>,
    name: String,
    description: Option<String>,
    address: Option<String>,
    phone: Option<String>,
    status: String,
    total_orders: i64,
    average_rating: f64,
    created_at: DateTime<Utc>,
    approved_at: Option<DateTime<Utc>>,
}

impl TryFrom<StoreRow> for StoreRecord {
    type Error = ConsoleError;

    fn try_from(row: StoreRow) -> Result<Self, Self::Error> {
        Ok(StoreRecord {
            status: row.status.parse()?,
            id: row.id,
            owner_id: row.owner_id,
            owner_name: row.owner_name,
            name: row.name,
            description: row.description,
            address: row.address,
            phone: row.phone,
            total_orders: row.total_orders,
            average_rating: row.average_rating,
            created_at: row.created_at,
            approved_at: row.approved_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct TransactionRow {
    id: String,
    user_id: String,
    user_name: Option<String>,
    transaction_type: String,
    amount: Decimal,
    payment_status: String,
    route_id: Option<String>,
    order_id: Option<String>,
    payment_method: Option<String>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<TransactionRow> for TransactionRecord {
    type Error = ConsoleError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(TransactionRecord {
            transaction_type: parse_column::<TransactionType>("transaction_type", &row.transaction_type)?,
            payment_status: row.payment_status.parse()?,
            id: row.id,
            user_id: row.user_id,
            user_name: row.user_name,
            amount: row.amount,
            route_id: row.route_id,
            order_id: row.order_id,
            payment_method: row.payment_method,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

const USER_SELECT: &str = "SELECT u.id::text AS id, u.email, u.full_name, u.role::text AS role, u.phone, \
     u.is_active, COALESCE(u.email_verified, FALSE) AS email_verified, u.created_at, u.last_login \
     FROM users u";

const ROUTE_SELECT: &str = "SELECT r.id::text AS id, r.creator_id::text AS creator_id, c.full_name AS creator_name, \
     r.title, r.description, r.distance_km::float8 AS distance_km, r.difficulty::text AS difficulty, \
     r.price::numeric AS price, r.status::text AS status, COALESCE(r.total_sales, 0)::int8 AS total_sales, \
     COALESCE(r.view_count, 0)::int8 AS view_count, COALESCE(r.average_rating, 0)::float8 AS average_rating, \
     r.created_at, r.published_at \
     FROM routes r LEFT JOIN users c ON c.id = r.creator_id";

const STORE_SELECT: &str = "SELECT s.id::text AS id, s.owner_id::text AS owner_id, o.full_name AS owner_name, \
     s.name, s.description, s.address, s.phone, s.status::text AS status, \
     COALESCE(s.total_orders, 0)::int8 AS total_orders, COALESCE(s.average_rating, 0)::float8 AS average_rating, \
     s.created_at, s.approved_at \
     FROM stores s LEFT JOIN users o ON o.id = s.owner_id";

const TRANSACTION_SELECT: &str = "SELECT t.id::text AS id, t.user_id::text AS user_id, b.full_name AS user_name, \
     t.transaction_type::text AS transaction_type, t.amount::numeric AS amount, \
     t.payment_status::text AS payment_status, t.route_id::text AS route_id, t.order_id::text AS order_id, \
     t.payment_method, t.created_at, t.completed_at \
     FROM transactions t LEFT JOIN users b ON b.id = t.user_id";

const USER_INSERT: &str = "INSERT INTO users (full_name, email, role, phone, is_active) \
     VALUES ($1, $2, $3, $4, $5) RETURNING id::text";

/// Absent fields bind as NULL and keep the stored value; `is_active` is not editable here
const USER_PROFILE_UPDATE: &str = "UPDATE users SET full_name = COALESCE($1, full_name), \
     email = COALESCE($2, email), role = COALESCE($3, role), phone = COALESCE($4, phone), \
     updated_at = NOW() WHERE id::text = $5";

/// Relational backend over the marketplace schema.
///
/// Status columns are compared as text so both enum-typed and text columns work.
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub async fn connect(config: &DatabaseConfig) -> ConsoleResult<Self> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| ConsoleError::config("DATABASE_URL is required for the postgres backend"))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        info!("Connected to admin database");
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn select<R, T>(&self, sql: &SqlResult) -> ConsoleResult<Vec<T>>
    where
        R: for<'r> FromRow<'r, PgRow> + Send + Unpin,
        T: TryFrom<R, Error = ConsoleError>,
    {
        let mut q = sqlx::query_as::<_, R>(&sql.query);
        for p in sql.params.iter() {
            q = bind_param_query_as(q, p);
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(T::try_from).collect()
    }

    async fn user_by_id(&self, id: &str) -> ConsoleResult<UserRecord> {
        let mut sql = SqlResult::new(USER_SELECT);
        sql.and("u.id::text =", SqlParam::Text(id.to_string()));
        self.select::<UserRow, UserRecord>(&sql)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ConsoleError::not_found(format!("user {}", id)))
    }

    /// Raw status column of one row, `None` when the id does not exist
    async fn status_column(&self, kind: EntityKind, id: &str) -> ConsoleResult<Option<String>> {
        let sql = match kind {
            EntityKind::User => {
                "SELECT CASE WHEN is_active THEN 'activo' ELSE 'suspendido' END FROM users WHERE id::text = $1"
            }
            EntityKind::Route => "SELECT status::text FROM routes WHERE id::text = $1",
            EntityKind::Store => "SELECT status::text FROM stores WHERE id::text = $1",
            EntityKind::Transaction => "SELECT payment_status::text FROM transactions WHERE id::text = $1",
        };
        Ok(sqlx::query_scalar::<_, String>(sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }
}

#[async_trait]
impl AdminBackend for PgBackend {
    async fn list_users(&self, filter: &UserFilter) -> ConsoleResult<Vec<UserRecord>> {
        let mut sql = SqlResult::new(USER_SELECT);
        sql.search(&["u.full_name", "u.email"], filter.search());
        if let Some(role) = filter.role {
            sql.and("u.role::text =", SqlParam::Text(role.as_str().to_string()));
        }
        if let Some(active) = filter.active {
            sql.and("u.is_active =", SqlParam::Bool(active));
        }
        sql.newest_first("u.created_at");
        self.select::<UserRow, _>(&sql).await
    }

    async fn list_routes(&self, filter: &RouteFilter) -> ConsoleResult<Vec<RouteRecord>> {
        let mut sql = SqlResult::new(ROUTE_SELECT);
        sql.search(&["r.title", "c.full_name"], filter.search());
        if let Some(status) = filter.status {
            sql.and("r.status::text =", SqlParam::Text(status.as_str().to_string()));
        }
        if let Some(difficulty) = filter.difficulty {
            sql.and("r.difficulty::text =", SqlParam::Text(difficulty.as_str().to_string()));
        }
        sql.created("r.created_at", &filter.created).newest_first("r.created_at");
        self.select::<RouteRow, _>(&sql).await
    }

    async fn list_stores(&self, filter: &StoreFilter) -> ConsoleResult<Vec<StoreRecord>> {
        let mut sql = SqlResult::new(STORE_SELECT);
        sql.search(&["s.name", "o.full_name"], filter.search());
        if let Some(status) = filter.status {
            sql.and("s.status::text =", SqlParam::Text(status.as_str().to_string()));
        }
        sql.created("s.created_at", &filter.created).newest_first("s.created_at");
        self.select::<StoreRow, _>(&sql).await
    }

    async fn list_transactions(&self, filter: &TransactionFilter) -> ConsoleResult<Vec<TransactionRecord>> {
        let mut sql = SqlResult::new(TRANSACTION_SELECT);
        sql.search(&["b.full_name", "t.id::text"], filter.search());
        if let Some(status) = filter.status {
            sql.and("t.payment_status::text =", SqlParam::Text(status.as_str().to_string()));
        }
        if let Some(kind) = filter.transaction_type {
            sql.and("t.transaction_type::text =", SqlParam::Text(kind.as_str().to_string()));
        }
        sql.created("t.created_at", &filter.created).newest_first("t.created_at");
        self.select::<TransactionRow, _>(&sql).await
    }

    async fn dashboard_stats(&self) -> ConsoleResult<DashboardStats> {
        let row = sqlx::query_as::<_, StatsRow>(
            "SELECT COALESCE(total_users, 0)::int8 AS total_users, \
             COALESCE(total_cyclists, 0)::int8 AS total_cyclists, \
             COALESCE(total_merchants, 0)::int8 AS total_merchants, \
             COALESCE(total_route_creators, 0)::int8 AS total_route_creators, \
             COALESCE(total_routes, 0)::int8 AS total_routes, \
             COALESCE(pending_routes, 0)::int8 AS pending_routes, \
             COALESCE(total_stores, 0)::int8 AS total_stores, \
             COALESCE(pending_stores, 0)::int8 AS pending_stores, \
             COALESCE(total_revenue, 0)::numeric AS total_revenue, \
             COALESCE(total_transactions, 0)::int8 AS total_transactions \
             FROM admin_dashboard_stats",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(DashboardStats::from).unwrap_or_default())
    }

    async fn current_status(&self, kind: EntityKind, id: &str) -> ConsoleResult<Status> {
        let raw = self
            .status_column(kind, id)
            .await?
            .ok_or_else(|| ConsoleError::not_found(format!("{} {}", kind, id)))?;
        Status::parse(kind, &raw)
    }

    async fn write_status(&self, kind: EntityKind, id: &str, change: &StatusChange) -> ConsoleResult<()> {
        let sql = status_update(kind, id, change)?;
        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param_query(q, p);
        }
        let result = q.execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            // Either gone (NotFound from the lookup) or moved by someone else
            let current = self.current_status(kind, id).await?;
            return Err(lost_race(kind, id, current, change));
        }
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> ConsoleResult<()> {
        let sql = format!("DELETE FROM {} WHERE id::text = $1", kind.collection());
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(ConsoleError::not_found(format!("{} {}", kind, id)));
        }
        Ok(())
    }

    async fn create_user(&self, user: &NewUser) -> ConsoleResult<UserRecord> {
        // Unique email violations surface as Conflict
        let id = sqlx::query_scalar::<_, String>(USER_INSERT)
            .bind(&user.full_name)
            .bind(&user.email)
            .bind(user.role.as_str())
            .bind(user.phone.as_deref())
            .bind(user.is_active)
            .fetch_one(&self.pool)
            .await?;
        info!("Created user {}", id);
        self.user_by_id(&id).await
    }

    async fn update_user(&self, id: &str, update: &UserUpdate) -> ConsoleResult<UserRecord> {
        let result = sqlx::query(USER_PROFILE_UPDATE)
            .bind(update.full_name.as_deref())
            .bind(update.email.as_deref())
            .bind(update.role.map(|role| role.as_str()))
            .bind(update.phone.as_deref())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ConsoleError::not_found(format!("user {}", id)));
        }
        self.user_by_id(id).await
    }

    async fn health_check(&self) -> ConsoleResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[derive(Debug, FromRow)]
struct StatsRow {
    total_users: i64,
    total_cyclists: i64,
    total_merchants: i64,
    total_route_creators: i64,
    total_routes: i64,
    pending_routes: i64,
    total_stores: i64,
    pending_stores: i64,
    total_revenue: Decimal,
    total_transactions: i64,
}

impl From<StatsRow> for DashboardStats {
    fn from(row: StatsRow) -> Self {
        Self {
            total_users: row.total_users,
            total_cyclists: row.total_cyclists,
            total_merchants: row.total_merchants,
            total_route_creators: row.total_route_creators,
            total_routes: row.total_routes,
            pending_routes: row.pending_routes,
            total_stores: row.total_stores,
            pending_stores: row.pending_stores,
            total_revenue: row.total_revenue,
            total_transactions: row.total_transactions,
        }
    }
}
