mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use serde_json::json;

use common::{MockApi, PASSWORD};
use pedal_admin::auth::{AuthClient, RegisterRequest, Role};
use pedal_admin::backend::{AdminBackend, RouteFilter, StoreFilter, UserFilter};
use pedal_admin::cache::Mount;
use pedal_admin::console::AdminConsole;
use pedal_admin::session::{SessionEvent, SessionManager};
use pedal_admin::models::{NewUser, UserUpdate};
use pedal_admin::status::{
    EntityKind, RouteStatus, Stamp, StampField, Status, StatusChange, StoreStatus, UserState,
};
use pedal_admin::testing::fixtures;
use pedal_admin::ConsoleError;

async fn signed_in(api: &MockApi) -> Result<(Arc<SessionManager>, AdminConsole)> {
    let (session, console) = api.console().await?;
    let client = AuthClient::new(api.base_url.clone(), Duration::from_secs(5))?;
    let credential = client.login("ana@pedal.example", PASSWORD).await?;
    session.login(credential).await?;
    Ok((session, console))
}

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let api = MockApi::spawn().await?;
    let (_, console) = api.console().await?;
    console.health_check().await?;
    Ok(())
}

#[tokio::test]
async fn login_exchanges_password_for_a_session() -> Result<()> {
    let api = MockApi::spawn().await?;
    let (session, _) = signed_in(&api).await?;

    let identity = session.require_identity().await?;
    assert_eq!(identity.email, "ana@pedal.example");
    assert_eq!(identity.role, Role::Administrator);
    Ok(())
}

#[tokio::test]
async fn wrong_password_reports_the_server_message() -> Result<()> {
    let api = MockApi::spawn().await?;
    let client = AuthClient::new(api.base_url.clone(), Duration::from_secs(5))?;

    let err = client.login("ana@pedal.example", "nope").await.unwrap_err();

    match err {
        ConsoleError::Unauthorized(message) => assert_eq!(message, "Credenciales inválidas"),
        other => panic!("unexpected error: {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn registration_signs_in_with_the_chosen_role() -> Result<()> {
    let api = MockApi::spawn().await?;
    let (session, _) = api.console().await?;
    let client = AuthClient::new(api.base_url.clone(), Duration::from_secs(5))?;

    let credential = client
        .register(&RegisterRequest {
            nombre: "Mario".into(),
            email: "mario@pedal.example".into(),
            password: PASSWORD.into(),
            rol: Role::Merchant,
        })
        .await?;
    let identity = session.login(credential).await?;

    assert_eq!(identity.name, "Mario");
    assert_eq!(identity.role, Role::Merchant);
    Ok(())
}

#[tokio::test]
async fn reads_send_the_credential_header() -> Result<()> {
    let api = MockApi::spawn().await?;
    api.seed("users", &[fixtures::user("u1", true), fixtures::user("u2", false)]).await?;
    let (session, console) = signed_in(&api).await?;

    let users = console.users(&UserFilter::default(), &Mount::new()).await?;
    assert_eq!(users.len(), 2);

    let credential = session.credential().await.expect("signed in");
    let seen = api.state.lock().await.seen_tokens.clone();
    assert_eq!(seen, vec![credential.as_str().to_string()]);
    Ok(())
}

#[tokio::test]
async fn filters_are_applied_even_when_the_server_ignores_them() -> Result<()> {
    let api = MockApi::spawn().await?;
    api.seed(
        "routes",
        &[
            fixtures::route("r1", RouteStatus::PendingApproval),
            fixtures::route("r2", RouteStatus::Approved),
        ],
    )
    .await?;
    let (_, console) = signed_in(&api).await?;

    let pending = RouteFilter {
        status: Some(RouteStatus::PendingApproval),
        ..Default::default()
    };
    let routes = console.routes(&pending, &Mount::new()).await?;

    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].id, "r1");
    Ok(())
}

#[tokio::test]
async fn store_approval_puts_status_and_stamp() -> Result<()> {
    let api = MockApi::spawn().await?;
    api.seed("stores", &[fixtures::store("s1", StoreStatus::PendingApproval)]).await?;
    let (_, console) = signed_in(&api).await?;

    let outcome = console.approve_store("s1").await?;

    let writes = api.state.lock().await.writes.clone();
    assert_eq!(writes.len(), 1);
    let (path, body) = &writes[0];
    assert_eq!(path, "/api/admin/stores/s1/status");
    assert_eq!(body["status"], "aprobado");
    assert_eq!(body["approved_at"], json!(outcome.stamped_at.expect("stamped")));

    let row = api.row("stores", "s1").await.expect("row s1");
    assert_eq!(row["status"], "aprobado");

    let stores = console.stores(&StoreFilter::default(), &Mount::new()).await?;
    assert_eq!(stores[0].status, StoreStatus::Approved);
    Ok(())
}

#[tokio::test]
async fn user_toggle_puts_the_active_flag() -> Result<()> {
    let api = MockApi::spawn().await?;
    api.seed("users", &[fixtures::user("u1", true)]).await?;
    let (_, console) = signed_in(&api).await?;

    console.toggle_user("u1").await?;

    let writes = api.state.lock().await.writes.clone();
    assert_eq!(writes[0].0, "/api/admin/users/u1");
    assert_eq!(writes[0].1, json!({ "is_active": false }));
    let row = api.row("users", "u1").await.expect("row u1");
    assert_eq!(row["is_active"], false);
    Ok(())
}

#[tokio::test]
async fn missing_entities_are_not_found() -> Result<()> {
    let api = MockApi::spawn().await?;
    let (_, console) = signed_in(&api).await?;

    assert!(matches!(
        console.approve_route("ghost").await,
        Err(ConsoleError::NotFound(_))
    ));
    assert!(matches!(
        console.delete(EntityKind::Store, "ghost").await,
        Err(ConsoleError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn server_side_conflict_is_reported() -> Result<()> {
    let api = MockApi::spawn().await?;
    api.seed("stores", &[fixtures::store("s1", StoreStatus::PendingApproval)]).await?;
    let (_, console) = signed_in(&api).await?;
    api.state.lock().await.conflict_next = true;

    let err = console.approve_store("s1").await.unwrap_err();
    assert!(matches!(err, ConsoleError::Conflict(_)));
    Ok(())
}

#[tokio::test]
async fn status_write_is_refused_when_the_row_moved() -> Result<()> {
    let api = MockApi::spawn().await?;
    api.seed("stores", &[fixtures::store("s1", StoreStatus::Suspended)]).await?;
    let (_, backend) = api.backend().await?;

    let approval = StatusChange {
        from: Status::Store(StoreStatus::PendingApproval),
        to: Status::Store(StoreStatus::Approved),
        stamp: Some(Stamp {
            field: StampField::ApprovedAt,
            at: Utc::now(),
        }),
    };
    let err = backend
        .write_status(EntityKind::Store, "s1", &approval)
        .await
        .unwrap_err();

    assert!(matches!(err, ConsoleError::Conflict(_)));
    let row = api.row("stores", "s1").await.expect("row s1");
    assert_eq!(row["status"], "suspendido");
    assert!(row["approved_at"].is_null());
    assert!(api.state.lock().await.writes.is_empty());
    Ok(())
}

#[tokio::test]
async fn user_flag_write_checks_the_previous_state() -> Result<()> {
    let api = MockApi::spawn().await?;
    api.seed("users", &[fixtures::user("u1", false)]).await?;
    let (_, backend) = api.backend().await?;

    let suspend = StatusChange {
        from: Status::User(UserState::Active),
        to: Status::User(UserState::Suspended),
        stamp: None,
    };
    let err = backend.write_status(EntityKind::User, "u1", &suspend).await.unwrap_err();

    assert!(matches!(err, ConsoleError::Conflict(_)));
    Ok(())
}

#[tokio::test]
async fn admin_creates_and_edits_users() -> Result<()> {
    let api = MockApi::spawn().await?;
    let (_, console) = signed_in(&api).await?;

    let created = console
        .create_user(&NewUser {
            full_name: "Lucía Comerciante".into(),
            email: "lucia@pedal.example".into(),
            role: Role::Merchant,
            phone: None,
            is_active: true,
        })
        .await?;
    assert_eq!(created.role, Role::Merchant);
    assert!(created.is_active);

    let updated = console
        .update_user(
            &created.id,
            &UserUpdate {
                phone: Some("600 000 000".into()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(updated.phone.as_deref(), Some("600 000 000"));

    let writes = api.state.lock().await.writes.clone();
    assert_eq!(writes[0].0, "/api/admin/users");
    assert_eq!(writes[1].0, format!("/api/admin/users/{}", created.id));
    assert_eq!(writes[1].1, json!({ "phone": "600 000 000" }));

    let users = console.users(&UserFilter::default(), &Mount::new()).await?;
    assert_eq!(users.len(), 1);
    Ok(())
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() -> Result<()> {
    let api = MockApi::spawn().await?;
    api.seed("users", &[fixtures::user("u1", true)]).await?;
    let (_, console) = signed_in(&api).await?;

    let err = console
        .create_user(&NewUser {
            full_name: "Otra".into(),
            email: "u1@pedal.example".into(),
            role: Role::Rider,
            phone: None,
            is_active: true,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ConsoleError::Conflict(_)));
    Ok(())
}

#[tokio::test]
async fn rejected_credential_signs_the_admin_out() -> Result<()> {
    let api = MockApi::spawn().await?;
    let (session, console) = signed_in(&api).await?;
    let mut events = session.subscribe();
    api.state.lock().await.reject_tokens = true;

    let err = console.stores(&StoreFilter::default(), &Mount::new()).await.unwrap_err();

    assert!(matches!(err, ConsoleError::AuthRequired));
    assert!(!session.is_authenticated().await);
    assert!(matches!(events.recv().await?, SessionEvent::SignedOut { .. }));
    Ok(())
}
