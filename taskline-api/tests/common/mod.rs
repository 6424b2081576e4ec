//! Common test utilities for HTTP integration tests
//!
//! Builds the router against a test configuration and mints issuer
//! credentials with the test secret. Database-backed contexts return `None`
//! when `DATABASE_URL` is not set.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Duration;
use sqlx::postgres::{PgPool, PgPoolOptions};
use taskline_api::app::{build_router, AppState};
use taskline_api::config::{ApiConfig, Config, DatabaseConfig};
use taskline_shared::auth::issuer::{create_token, IssuerClaims, JwtIssuerConfig};
use taskline_shared::auth::super_admin::SuperAdminList;
use taskline_shared::db::migrations::run_migrations;
use taskline_shared::models::tenant::DEFAULT_TENANT_ID;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str = "test-issuer-secret-at-least-32-bytes-long";

/// Configuration pointing at `database_url`
pub fn test_config(database_url: &str, production: bool, super_admins: &[&str]) -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            production,
            cors_origins: vec!["*".to_string()],
        },
        database: DatabaseConfig {
            url: database_url.to_string(),
            max_connections: 5,
        },
        issuer: JwtIssuerConfig::new(TEST_SECRET),
        super_admins: SuperAdminList::new(super_admins.iter().copied()),
        default_tenant_id: DEFAULT_TENANT_ID,
    }
}

/// A router whose pool never connects; for paths that fail before the database
pub fn offline_app() -> Router {
    let url = "postgresql://taskline@127.0.0.1:1/unreachable";
    let pool = PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_millis(250))
        .connect_lazy(url)
        .expect("Failed to build lazy pool");

    build_router(AppState::new(pool, test_config(url, false, &[])))
}

/// Connects to the test database and migrates it
pub async fn test_pool() -> Option<PgPool> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping database test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("Failed to connect to test database");
    run_migrations(&pool).await.expect("Failed to run migrations");

    Some(pool)
}

/// Router over a real database
pub async fn test_app(production: bool, super_admins: &[&str]) -> Option<(Router, PgPool)> {
    let pool = test_pool().await?;
    let url = std::env::var("DATABASE_URL").unwrap_or_default();
    let app = build_router(AppState::new(pool.clone(), test_config(&url, production, super_admins)));

    Some((app, pool))
}

/// Mints a credential for `subject` signed with [`TEST_SECRET`]
pub fn token_for(subject: &str, email: Option<&str>) -> String {
    let mut claims = IssuerClaims::new(subject, email, Duration::hours(1));
    claims.name = email.map(|e| e.split('@').next().unwrap_or(e).to_string());
    create_token(&claims, TEST_SECRET).expect("Failed to mint token")
}

/// A fresh external identity: `(subject, email)`
pub fn new_identity(local: &str) -> (String, String) {
    let id = Uuid::new_v4().simple().to_string();
    (format!("sub-{}", id), format!("{}+{}@example.com", local, id))
}

/// Sends a request and returns the status and JSON body (`Null` when empty)
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    send_with_headers(app, method, uri, token, body, &[]).await
}

pub async fn send_with_headers(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
    headers: &[(&str, String)],
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    for (name, value) in headers {
        builder = builder.header(*name, value.as_str());
    }

    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("Failed to build request");

    let response = app.clone().oneshot(request).await.expect("Request failed");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");

    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };

    (status, json)
}
