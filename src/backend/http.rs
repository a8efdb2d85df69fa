use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use url::Url;

use crate::backend::{AdminBackend, RouteFilter, StoreFilter, TransactionFilter, UserFilter};
use crate::config::ConsoleConfig;
use crate::error::{ConsoleError, ConsoleResult};
use crate::models::{
    sort_newest_first, DashboardStats, Moderated, NewUser, RouteRecord, StoreRecord,
    TransactionRecord, UserRecord, UserUpdate,
};
use crate::session::SessionManager;
use crate::status::{EntityKind, Status, StatusChange};

/// Header the admin API reads the credential from
pub const AUTH_HEADER: &str = "x-auth-token";

/// Body field carrying the status a write expects to replace
pub const EXPECTED_STATUS: &str = "expected_status";

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// Admin REST API client. The credential is taken from the session on every
/// request; filters are sent as query parameters and re-applied locally.
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    session: Arc<SessionManager>,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration, session: Arc<SessionManager>) -> ConsoleResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ConsoleError::config(format!("invalid API URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ConsoleError::config(format!("API URL '{}' cannot be a base", base_url)));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConsoleError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            session,
        })
    }

    pub fn from_config(config: &ConsoleConfig, session: Arc<SessionManager>) -> ConsoleResult<Self> {
        Self::new(
            &config.api.base_url,
            Duration::from_secs(config.api.request_timeout_secs),
            session,
        )
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn admin(&self, segments: &[&str]) -> Url {
        let mut all = vec!["api", "admin"];
        all.extend_from_slice(segments);
        self.endpoint(&all)
    }

    /// Attach the credential, send, and map failure statuses
    async fn send(&self, request: RequestBuilder, what: &str) -> ConsoleResult<Response> {
        let credential = self.session.credential().await.ok_or(ConsoleError::AuthRequired)?;

        let response = request
            .header(AUTH_HEADER, credential.as_str())
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Request for {} failed: {}", what, e);
                ConsoleError::from(e)
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message.or(body.error))
            .unwrap_or_else(|| status.to_string());

        tracing::warn!("{} returned {}: {}", what, status, message);

        Err(match status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ConsoleError::validation(message),
            StatusCode::UNAUTHORIZED => ConsoleError::AuthRequired,
            StatusCode::FORBIDDEN => ConsoleError::forbidden(message),
            StatusCode::NOT_FOUND => ConsoleError::not_found(what.to_string()),
            StatusCode::CONFLICT => ConsoleError::conflict(message),
            _ => ConsoleError::transport(format!("{}: {}", status, message)),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&'static str, String)],
        what: &str,
    ) -> ConsoleResult<T> {
        let response = self.send(self.client.get(url).query(query), what).await?;
        Ok(response.json().await?)
    }

    async fn list<T>(&self, collection: &str, query: &[(&'static str, String)], keep: impl Fn(&T) -> bool) -> ConsoleResult<Vec<T>>
    where
        T: DeserializeOwned + Moderated,
    {
        let rows: Vec<T> = self
            .get_json(self.admin(&[collection]), query, collection)
            .await?;
        let mut rows: Vec<T> = rows.into_iter().filter(|row| keep(row)).collect();
        sort_newest_first(&mut rows);
        Ok(rows)
    }
}

/// Request body for a status write. `expected_status` makes the write a
/// compare-and-set: the API answers 409 when the row no longer holds it.
fn status_body(change: &StatusChange) -> Value {
    let mut body = Map::new();
    match change.to {
        Status::User(state) => {
            body.insert("is_active".to_string(), json!(state.is_active()));
        }
        to => {
            body.insert("status".to_string(), json!(to.as_str()));
            if let Some(stamp) = change.stamp {
                body.insert(stamp.field.column().to_string(), json!(stamp.at));
            }
        }
    }
    body.insert(EXPECTED_STATUS.to_string(), json!(change.from.as_str()));
    Value::Object(body)
}

#[async_trait]
impl AdminBackend for HttpBackend {
    async fn list_users(&self, filter: &UserFilter) -> ConsoleResult<Vec<UserRecord>> {
        self.list("users", &filter.query_pairs(), |u| filter.matches(u)).await
    }

    async fn list_routes(&self, filter: &RouteFilter) -> ConsoleResult<Vec<RouteRecord>> {
        self.list("routes", &filter.query_pairs(), |r| filter.matches(r)).await
    }

    async fn list_stores(&self, filter: &StoreFilter) -> ConsoleResult<Vec<StoreRecord>> {
        self.list("stores", &filter.query_pairs(), |s| filter.matches(s)).await
    }

    async fn list_transactions(&self, filter: &TransactionFilter) -> ConsoleResult<Vec<TransactionRecord>> {
        self.list("transactions", &filter.query_pairs(), |t| filter.matches(t)).await
    }

    async fn dashboard_stats(&self) -> ConsoleResult<DashboardStats> {
        self.get_json(self.admin(&["dashboard"]), &[], "dashboard").await
    }

    async fn current_status(&self, kind: EntityKind, id: &str) -> ConsoleResult<Status> {
        let url = self.admin(&[kind.collection(), id]);
        let what = format!("{} {}", kind, id);
        Ok(match kind {
            EntityKind::User => self.get_json::<UserRecord>(url, &[], &what).await?.status(),
            EntityKind::Route => self.get_json::<RouteRecord>(url, &[], &what).await?.status(),
            EntityKind::Store => self.get_json::<StoreRecord>(url, &[], &what).await?.status(),
            EntityKind::Transaction => self.get_json::<TransactionRecord>(url, &[], &what).await?.status(),
        })
    }

    async fn write_status(&self, kind: EntityKind, id: &str, change: &StatusChange) -> ConsoleResult<()> {
        let url = match kind {
            EntityKind::User => self.admin(&["users", id]),
            _ => self.admin(&[kind.collection(), id, "status"]),
        };
        let request = self.client.request(Method::PUT, url).json(&status_body(change));
        self.send(request, &format!("{} {}", kind, id)).await?;
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> ConsoleResult<()> {
        let request = self.client.delete(self.admin(&[kind.collection(), id]));
        self.send(request, &format!("{} {}", kind, id)).await?;
        Ok(())
    }

    async fn create_user(&self, user: &NewUser) -> ConsoleResult<UserRecord> {
        let request = self.client.post(self.admin(&["users"])).json(user);
        let response = self.send(request, &format!("user {}", user.email)).await?;
        Ok(response.json().await?)
    }

    async fn update_user(&self, id: &str, update: &UserUpdate) -> ConsoleResult<UserRecord> {
        let request = self.client.request(Method::PUT, self.admin(&["users", id])).json(update);
        let response = self.send(request, &format!("user {}", id)).await?;
        Ok(response.json().await?)
    }

    async fn health_check(&self) -> ConsoleResult<()> {
        let url = self.endpoint(&["health"]);
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ConsoleError::transport(format!("health check returned {}", response.status())));
        }
        Ok(())
    }
}
