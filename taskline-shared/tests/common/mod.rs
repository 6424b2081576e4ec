//! Shared helpers for database-backed integration tests
//!
//! Tests return early when `DATABASE_URL` is not set so the suite still
//! passes on machines without PostgreSQL.

#![allow(dead_code)]

use sqlx::PgPool;
use taskline_shared::db::migrations::run_migrations;
use taskline_shared::db::pool::{create_pool, DatabaseConfig};
use taskline_shared::models::account::{Account, AccountStatus, CreateAccount, Role};
use taskline_shared::models::membership::{CreateMembership, Membership, MembershipRole};
use taskline_shared::models::task::{CreateTask, Task, TaskStatus};
use taskline_shared::models::tenant::{CreateTenant, Tenant};
use uuid::Uuid;

/// Connects and migrates, or returns `None` when no database is configured
pub async fn test_pool() -> Option<PgPool> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("DATABASE_URL not set; skipping database test");
            return None;
        }
    };

    let pool = create_pool(DatabaseConfig::from_url(url, 5))
        .await
        .expect("Failed to create pool");
    run_migrations(&pool).await.expect("Failed to run migrations");

    Some(pool)
}

/// An email address no other test run will use
pub fn unique_email(local: &str) -> String {
    format!("{}+{}@example.com", local, Uuid::new_v4().simple())
}

pub async fn create_tenant(pool: &PgPool) -> Tenant {
    Tenant::create(
        pool,
        CreateTenant {
            name: format!("Tenant {}", Uuid::new_v4().simple()),
        },
    )
    .await
    .expect("Failed to create tenant")
}

pub async fn create_account(pool: &PgPool, email: &str, role: Role, tenant_id: Option<Uuid>) -> Account {
    Account::create(
        pool,
        CreateAccount {
            auth_subject: Some(format!("sub-{}", Uuid::new_v4())),
            email: email.to_string(),
            name: None,
            avatar_url: None,
            role,
            status: AccountStatus::Active,
            tenant_id,
        },
    )
    .await
    .expect("Failed to create account")
}

pub async fn join(pool: &PgPool, tenant_id: Uuid, account_id: Uuid, role: MembershipRole) {
    Membership::ensure(
        pool,
        CreateMembership {
            tenant_id,
            account_id,
            role,
        },
    )
    .await
    .expect("Failed to create membership");
}

pub async fn create_task(pool: &PgPool, tenant_id: Uuid, created_by: Uuid, title: &str) -> Task {
    Task::create(
        pool,
        CreateTask {
            tenant_id,
            created_by,
            title: title.to_string(),
            description: None,
            status: TaskStatus::Todo,
            priority: None,
            due_date: None,
            project_id: None,
        },
    )
    .await
    .expect("Failed to create task")
}
