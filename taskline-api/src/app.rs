/// Application state and router builder
///
/// Defines the shared application state, the authentication middleware that
/// turns a bearer credential into an [`AuthContext`], and the Axum router.
///
/// # Example
///
/// ```no_run
/// use taskline_api::{app::{build_router, AppState}, config::Config};
/// use taskline_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(DatabaseConfig::from_url(&config.database.url, config.database.max_connections)).await?;
/// let app = build_router(AppState::new(pool, config));
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    error::{ApiError, ApiResult},
    middleware::security::SecurityHeadersLayer,
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{delete, get, patch, post, put},
    Router,
};
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use taskline_shared::auth::context::AuthContext;
use taskline_shared::auth::identity::IdentityResolver;
use taskline_shared::auth::issuer::{IdentityIssuer, JwtIdentityIssuer};
use taskline_shared::auth::role;
use taskline_shared::models::account::Account;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use uuid::Uuid;

/// Header naming the account to act as (development only)
pub const IMPERSONATE_HEADER: &str = "x-dev-impersonate";

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// External identity issuer
    pub issuer: Arc<dyn IdentityIssuer>,

    /// Identity resolver
    pub resolver: Arc<IdentityResolver>,
}

impl AppState {
    /// Creates application state with the configured JWT issuer
    pub fn new(db: PgPool, config: Config) -> Self {
        let issuer = Arc::new(JwtIdentityIssuer::new(config.issuer.clone()));
        Self::with_issuer(db, config, issuer)
    }

    /// Creates application state with a specific issuer
    pub fn with_issuer(db: PgPool, config: Config, issuer: Arc<dyn IdentityIssuer>) -> Self {
        let resolver = IdentityResolver::new(config.super_admins.clone(), config.default_tenant_id);

        Self {
            db,
            config: Arc::new(config),
            issuer,
            resolver: Arc::new(resolver),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET /health                                   # Health check (public)
/// └── /v1/                                          # Authenticated
///     ├── GET    /me
///     ├── GET    /tasks                             # Visible tasks
///     ├── POST   /tasks
///     ├── PATCH  /tasks/:id                         # Access gate
///     ├── DELETE /tasks/:id                         # Access gate
///     ├── PUT    /tasks/:id/assignees               # Access gate
///     ├── POST   /tasks/:id/collaborators           # Access gate
///     ├── DELETE /tasks/:id/collaborators/:account_id
///     ├── GET    /delegations
///     ├── POST   /delegations                       # admin or god
///     ├── POST   /delegations/:id/revoke            # admin or god
///     ├── GET    /directory
///     ├── POST   /directory                         # admin or god
///     └── POST   /dev/become-sole-god               # non-production only
/// ```
///
/// # Middleware Stack
///
/// Applied in order (outermost first):
/// 1. Security headers
/// 2. CORS
/// 3. Request tracing
/// 4. Authentication (`/v1` only)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let task_routes = Router::new()
        .route("/", get(routes::tasks::list_tasks).post(routes::tasks::create_task))
        .route(
            "/:id",
            patch(routes::tasks::update_task).delete(routes::tasks::delete_task),
        )
        .route("/:id/assignees", put(routes::tasks::replace_assignees))
        .route("/:id/collaborators", post(routes::tasks::add_collaborator))
        .route(
            "/:id/collaborators/:account_id",
            delete(routes::tasks::remove_collaborator),
        );

    let delegation_routes = Router::new()
        .route(
            "/",
            get(routes::delegations::list_delegations).post(routes::delegations::create_delegation),
        )
        .route("/:id/revoke", post(routes::delegations::revoke_delegation));

    let directory_routes = Router::new().route(
        "/",
        get(routes::directory::list_members).post(routes::directory::add_member),
    );

    let mut v1_routes = Router::new()
        .route("/me", get(routes::me::me))
        .nest("/tasks", task_routes)
        .nest("/delegations", delegation_routes)
        .nest("/directory", directory_routes);

    if !state.config.is_production() {
        v1_routes = v1_routes.route("/dev/become-sole-god", post(routes::dev::become_sole_god));
    }

    let v1_routes = v1_routes.layer(axum::middleware::from_fn_with_state(
        state.clone(),
        auth_layer,
    ));

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.is_production()))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Extracts the bearer credential from the Authorization header
fn bearer_token(headers: &HeaderMap) -> ApiResult<&str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Expected Bearer token".to_string()))
}

/// Reads the impersonation header, if present
fn impersonation_target(headers: &HeaderMap) -> ApiResult<Option<Uuid>> {
    let Some(value) = headers.get(IMPERSONATE_HEADER) else {
        return Ok(None);
    };

    value
        .to_str()
        .ok()
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .map(Some)
        .ok_or_else(|| ApiError::BadRequest(format!("{} must be an account ID", IMPERSONATE_HEADER)))
}

/// Authentication middleware
///
/// Resolves the credential to an account, applies development impersonation
/// when allowed, evaluates the effective role and inserts the
/// [`AuthContext`] into request extensions. Any failure ends the request
/// before the handler runs.
async fn auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> ApiResult<Response> {
    let token = bearer_token(req.headers())?.to_string();

    let mut account = state
        .resolver
        .authenticate(&state.db, state.issuer.as_ref(), &token)
        .await?;

    let mut impersonated_by = None;
    if !state.config.is_production() {
        if let Some(target) = impersonation_target(req.headers())? {
            let caller = account.id;
            account = Account::find_by_id(&state.db, target)
                .await?
                .ok_or_else(|| ApiError::NotFound("Impersonated account not found".to_string()))?;

            tracing::warn!(caller_id = %caller, account_id = %target, "impersonating account");
            impersonated_by = Some(caller);
        }
    }

    let effective = role::evaluate(
        &state.db,
        &mut account,
        state.resolver.super_admins(),
        Utc::now(),
    )
    .await?;

    let mut context = AuthContext::new(account, effective);
    context.impersonated_by = impersonated_by;

    req.extensions_mut().insert(context);

    Ok(next.run(req).await)
}
