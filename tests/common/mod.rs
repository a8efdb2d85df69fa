#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{Duration as TtlDuration, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use pedal_admin::auth::{issue, CredentialDecoder, Identity, Role};
use pedal_admin::backend::http::EXPECTED_STATUS;
use pedal_admin::backend::HttpBackend;
use pedal_admin::console::AdminConsole;
use pedal_admin::session::{MemorySessionStore, SessionManager};
use pedal_admin::testing::fixtures;

pub const PASSWORD: &str = "correct horse";

/// Everything the mock admin API has stored or observed
#[derive(Default)]
pub struct MockState {
    pub tables: HashMap<String, Vec<Value>>,
    pub stats: Value,
    /// Credentials received in the x-auth-token header
    pub seen_tokens: Vec<String>,
    /// (path, body) of every accepted PUT or POST
    pub writes: Vec<(String, Value)>,
    pub reject_tokens: bool,
    pub conflict_next: bool,
}

type Shared = Arc<Mutex<MockState>>;
type Reply = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn failure(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "message": message })))
}

fn authorize(state: &mut MockState, headers: &HeaderMap) -> Result<(), (StatusCode, Json<Value>)> {
    let token = headers
        .get("x-auth-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if token.is_empty() || state.reject_tokens {
        return Err(failure(StatusCode::UNAUTHORIZED, "Token inválido"));
    }
    state.seen_tokens.push(token);
    Ok(())
}

fn token_for(identity: &Identity) -> String {
    issue(identity, fixtures::TEST_SECRET)
        .map(|c| c.as_str().to_string())
        .unwrap_or_default()
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn login(Json(body): Json<Value>) -> Reply {
    if body["password"] != PASSWORD {
        return Err(failure(StatusCode::UNAUTHORIZED, "Credenciales inválidas"));
    }
    let email = body["email"].as_str().unwrap_or_default();
    let mut identity = fixtures::identity("admin-1", Role::Administrator, TtlDuration::hours(1));
    identity.email = email.to_string();
    Ok(Json(json!({ "token": token_for(&identity) })))
}

async fn register(Json(body): Json<Value>) -> Reply {
    let role: Role = body["rol"]
        .as_str()
        .and_then(|r| r.parse().ok())
        .ok_or_else(|| failure(StatusCode::BAD_REQUEST, "Rol inválido"))?;
    let mut identity = fixtures::identity("new-1", role, TtlDuration::hours(1));
    identity.name = body["nombre"].as_str().unwrap_or_default().to_string();
    identity.email = body["email"].as_str().unwrap_or_default().to_string();
    Ok(Json(json!({ "token": token_for(&identity) })))
}

async fn dashboard(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let mut state = state.lock().await;
    authorize(&mut state, &headers)?;
    Ok(Json(state.stats.clone()))
}

async fn list(State(state): State<Shared>, Path(collection): Path<String>, headers: HeaderMap) -> Reply {
    let mut state = state.lock().await;
    authorize(&mut state, &headers)?;
    let rows = state.tables.get(&collection).cloned().unwrap_or_default();
    Ok(Json(Value::Array(rows)))
}

async fn fetch(
    State(state): State<Shared>,
    Path((collection, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Reply {
    let mut state = state.lock().await;
    authorize(&mut state, &headers)?;
    state
        .tables
        .get(&collection)
        .and_then(|rows| rows.iter().find(|row| row["id"] == id.as_str()))
        .cloned()
        .map(Json)
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, "No encontrado"))
}

/// Status a row currently holds, in the form writes name it
fn current_status(collection: &str, row: &Value) -> Value {
    match collection {
        "users" if row["is_active"] == true => json!("activo"),
        "users" => json!("suspendido"),
        "transactions" => row["payment_status"].clone(),
        _ => row["status"].clone(),
    }
}

async fn update(
    state: Shared,
    collection: String,
    id: String,
    path: String,
    headers: HeaderMap,
    mut body: Value,
) -> Reply {
    let mut state = state.lock().await;
    authorize(&mut state, &headers)?;
    if state.conflict_next {
        state.conflict_next = false;
        return Err(failure(StatusCode::CONFLICT, "El estado cambió"));
    }

    let expected = body
        .as_object_mut()
        .and_then(|fields| fields.remove(EXPECTED_STATUS));
    let row = state
        .tables
        .get(&collection)
        .and_then(|rows| rows.iter().find(|row| row["id"] == id.as_str()))
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, "No encontrado"))?;
    if let Some(expected) = expected {
        if current_status(&collection, row) != expected {
            return Err(failure(StatusCode::CONFLICT, "El estado cambió"));
        }
    }

    state.writes.push((path, body.clone()));
    let row = state
        .tables
        .get_mut(&collection)
        .and_then(|rows| rows.iter_mut().find(|row| row["id"] == id.as_str()))
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, "No encontrado"))?;
    if let (Some(row), Some(fields)) = (row.as_object_mut(), body.as_object()) {
        for (key, value) in fields {
            row.insert(key.clone(), value.clone());
        }
    }
    Ok(Json(row.clone()))
}

async fn create(
    State(state): State<Shared>,
    Path(collection): Path<String>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Reply {
    let mut state = state.lock().await;
    authorize(&mut state, &headers)?;
    let rows = state.tables.entry(collection.clone()).or_default();
    if rows.iter().any(|row| row["email"] == body["email"]) {
        return Err(failure(StatusCode::CONFLICT, "El email ya está registrado"));
    }

    if let Some(fields) = body.as_object_mut() {
        fields.insert("id".to_string(), json!(format!("new-{}", rows.len() + 1)));
        fields.insert("created_at".to_string(), json!(Utc::now()));
        fields.entry("is_active").or_insert(json!(true));
    }
    rows.push(body.clone());
    state.writes.push((format!("/api/admin/{}", collection), body.clone()));
    Ok(Json(body))
}

async fn update_row(
    State(state): State<Shared>,
    Path((collection, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    let path = format!("/api/admin/{}/{}", collection, id);
    update(state, collection, id, path, headers, body).await
}

async fn update_status(
    State(state): State<Shared>,
    Path((collection, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    let path = format!("/api/admin/{}/{}/status", collection, id);
    update(state, collection, id, path, headers, body).await
}

async fn remove(
    State(state): State<Shared>,
    Path((collection, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Reply {
    let mut state = state.lock().await;
    authorize(&mut state, &headers)?;
    let rows = state
        .tables
        .get_mut(&collection)
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, "No encontrado"))?;
    let before = rows.len();
    rows.retain(|row| row["id"] != id.as_str());
    if rows.len() == before {
        return Err(failure(StatusCode::NOT_FOUND, "No encontrado"));
    }
    Ok(Json(json!({ "message": "Eliminado" })))
}

/// In-process stand-in for the marketplace admin API
pub struct MockApi {
    pub base_url: String,
    pub state: Shared,
}

impl MockApi {
    pub async fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind mock API")?;

        let state: Shared = Arc::new(Mutex::new(MockState::default()));
        let app = Router::new()
            .route("/health", get(health))
            .route("/api/auth/login", post(login))
            .route("/api/auth/register", post(register))
            .route("/api/admin/dashboard", get(dashboard))
            .route("/api/admin/:collection", get(list).post(create))
            .route("/api/admin/:collection/:id", get(fetch).put(update_row).delete(remove))
            .route("/api/admin/:collection/:id/status", put(update_status))
            .with_state(state.clone());

        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self { base_url, state })
    }

    pub async fn seed<T: Serialize>(&self, collection: &str, rows: &[T]) -> Result<()> {
        let values = rows
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        self.state
            .lock()
            .await
            .tables
            .entry(collection.to_string())
            .or_default()
            .extend(values);
        Ok(())
    }

    pub async fn row(&self, collection: &str, id: &str) -> Option<Value> {
        self.state
            .lock()
            .await
            .tables
            .get(collection)
            .and_then(|rows| rows.iter().find(|row| row["id"] == id).cloned())
    }

    /// Signed-in session plus a bare backend, for driving writes directly
    pub async fn backend(&self) -> Result<(Arc<SessionManager>, HttpBackend)> {
        let (session, _) = self.console().await?;
        let identity = fixtures::identity("admin-1", Role::Administrator, TtlDuration::hours(1));
        session.login(fixtures::credential(&identity)?).await?;
        let backend = HttpBackend::new(&self.base_url, Duration::from_secs(5), session.clone())?;
        Ok((session, backend))
    }

    /// Session over memory slots plus a console talking to this API
    pub async fn console(&self) -> Result<(Arc<SessionManager>, AdminConsole)> {
        let session = Arc::new(SessionManager::new(
            Arc::new(MemorySessionStore::new()),
            CredentialDecoder::default(),
        ));
        let backend = HttpBackend::new(&self.base_url, Duration::from_secs(5), session.clone())?;
        let console = AdminConsole::new(session.clone(), Arc::new(backend))
            .with_required_role(Some(Role::Administrator));
        Ok((session, console))
    }
}
