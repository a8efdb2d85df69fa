use anyhow::Result;
use chrono::{Duration, Utc};

use pedal_admin::auth::Role;
use pedal_admin::backend::{DateRange, RouteFilter, StoreFilter, UserFilter};
use pedal_admin::cache::Mount;
use pedal_admin::console::AdminConsole;
use pedal_admin::status::{RouteStatus, StoreStatus};
use pedal_admin::testing::{fixtures, TestContext};
use pedal_admin::ConsoleError;

#[tokio::test]
async fn cached_reads_do_not_see_direct_backend_changes() -> Result<()> {
    let ctx = TestContext::signed_in(Role::Administrator).await?;
    ctx.backend.insert_user(fixtures::user("u1", true)).await;
    let mount = Mount::new();

    assert_eq!(ctx.console.users(&UserFilter::default(), &mount).await?.len(), 1);
    ctx.backend.insert_user(fixtures::user("u2", true)).await;

    // Nothing invalidated the users scope yet
    assert_eq!(ctx.console.users(&UserFilter::default(), &mount).await?.len(), 1);

    ctx.console.bus().publish([pedal_admin::cache::QueryScope::Users]);
    assert_eq!(ctx.console.users(&UserFilter::default(), &mount).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn writes_from_another_console_invalidate_our_reads() -> Result<()> {
    let ctx = TestContext::signed_in(Role::Administrator).await?;
    ctx.backend.insert_store(fixtures::store("s1", StoreStatus::PendingApproval)).await;
    let other = AdminConsole::with_bus(ctx.session.clone(), ctx.backend.clone(), ctx.console.bus().clone());
    let mount = Mount::new();
    let pending = StoreFilter {
        status: Some(StoreStatus::PendingApproval),
        ..Default::default()
    };

    assert_eq!(ctx.console.stores(&pending, &mount).await?.len(), 1);
    other.approve_store("s1").await?;
    assert!(ctx.console.stores(&pending, &mount).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn unmounted_view_gets_no_result() -> Result<()> {
    let ctx = TestContext::signed_in(Role::Administrator).await?;
    ctx.backend.insert_route(fixtures::route("r1", RouteStatus::Approved)).await;
    let mount = Mount::new();
    mount.unmount();

    let err = ctx.console.routes(&RouteFilter::default(), &mount).await.unwrap_err();
    assert!(matches!(err, ConsoleError::Cancelled));

    // A fresh view loads normally
    assert_eq!(ctx.console.routes(&RouteFilter::default(), &Mount::new()).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn overview_collects_both_queues() -> Result<()> {
    let ctx = TestContext::signed_in(Role::Administrator).await?;
    ctx.backend.insert_route(fixtures::route("r1", RouteStatus::PendingApproval)).await;
    ctx.backend.insert_route(fixtures::route("r2", RouteStatus::Approved)).await;
    ctx.backend.insert_store(fixtures::store("s1", StoreStatus::PendingApproval)).await;

    let overview = ctx.console.overview(&Mount::new()).await?;

    assert_eq!(overview.stats.total_routes, 2);
    assert_eq!(overview.stats.pending_routes, 1);
    assert_eq!(overview.pending_routes.len(), 1);
    assert_eq!(overview.pending_stores[0].id, "s1");
    Ok(())
}

#[tokio::test]
async fn date_range_narrows_lists() -> Result<()> {
    let ctx = TestContext::signed_in(Role::Administrator).await?;
    let mut old = fixtures::route("old", RouteStatus::Approved);
    old.created_at = Utc::now() - Duration::days(30);
    ctx.backend.insert_route(old).await;
    ctx.backend.insert_route(fixtures::route("new", RouteStatus::Approved)).await;

    let recent = RouteFilter {
        created: DateRange {
            from: Some(Utc::now() - Duration::days(7)),
            to: None,
        },
        ..Default::default()
    };
    let routes = ctx.console.routes(&recent, &Mount::new()).await?;

    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].id, "new");
    Ok(())
}

#[tokio::test]
async fn expired_session_blocks_every_view() -> Result<()> {
    let ctx = TestContext::new();
    ctx.sign_in(Role::Administrator, Duration::seconds(-1)).await.unwrap_err();

    let err = ctx.console.overview(&Mount::new()).await.unwrap_err();
    assert!(matches!(err, ConsoleError::AuthRequired));
    assert!(ctx.store.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn console_without_role_requirement_admits_any_signed_in_user() -> Result<()> {
    let ctx = TestContext::signed_in(Role::Merchant).await?;
    let open = AdminConsole::new(ctx.session.clone(), ctx.backend.clone());

    assert_eq!(open.whoami().await?.role, Role::Merchant);
    assert!(matches!(ctx.console.whoami().await, Err(ConsoleError::Forbidden(_))));
    Ok(())
}
