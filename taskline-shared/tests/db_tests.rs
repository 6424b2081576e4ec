/// Integration tests for the connection pool and migrations
///
/// These tests require a running PostgreSQL database.
/// Run with: DATABASE_URL=postgresql://... cargo test --test db_tests
mod common;

use taskline_shared::db::migrations::{get_migration_status, run_migrations};
use taskline_shared::db::pool::{close_pool, health_check, pool_stats};

#[tokio::test]
async fn test_health_check_success() {
    let Some(pool) = common::test_pool().await else {
        return;
    };

    assert!(health_check(&pool).await.is_ok());

    close_pool(pool).await;
}

#[tokio::test]
async fn test_pool_stats_track_checked_out_connections() {
    let Some(pool) = common::test_pool().await else {
        return;
    };

    let _conn = pool.acquire().await.expect("Failed to acquire connection");
    let stats = pool_stats(&pool);

    assert!(stats.active_connections >= 1);
    assert!(stats.total_connections <= 5);
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let Some(pool) = common::test_pool().await else {
        return;
    };

    let before = get_migration_status(&pool).await.expect("Failed to get status");
    run_migrations(&pool).await.expect("Second migration run failed");
    let after = get_migration_status(&pool).await.expect("Failed to get status");

    assert!(after.is_up_to_date);
    assert_eq!(before.applied_migrations, after.applied_migrations);
}

#[tokio::test]
async fn test_default_tenant_is_seeded() {
    use taskline_shared::models::tenant::{Tenant, DEFAULT_TENANT_ID};

    let Some(pool) = common::test_pool().await else {
        return;
    };

    let tenant = Tenant::find_by_id(&pool, DEFAULT_TENANT_ID)
        .await
        .expect("Query failed");
    assert!(tenant.is_some());
}
