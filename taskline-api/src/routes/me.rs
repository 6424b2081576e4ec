/// Who-am-I endpoint
///
/// # Endpoint
///
/// ```text
/// GET /v1/me
/// Authorization: Bearer <credential>
/// ```
///
/// # Response
///
/// ```json
/// {
///   "account": { "id": "...", "email": "bob@x.com", "role": "user", "status": "active", ... },
///   "role": "admin",
///   "is_delegated": true,
///   "expires_at": "2025-03-02T12:00:00Z",
///   "impersonated_by": null
/// }
/// ```

use crate::error::ApiResult;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use taskline_shared::auth::context::AuthContext;
use taskline_shared::models::account::{Account, Role};
use uuid::Uuid;

/// Caller's account and effective role
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub account: Account,
    pub role: Role,
    pub is_delegated: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub impersonated_by: Option<Uuid>,
}

impl From<AuthContext> for MeResponse {
    fn from(ctx: AuthContext) -> Self {
        Self {
            role: ctx.role.role,
            is_delegated: ctx.role.is_delegated,
            expires_at: ctx.role.expires_at,
            impersonated_by: ctx.impersonated_by,
            account: ctx.account,
        }
    }
}

/// Returns the resolved caller
pub async fn me(Extension(ctx): Extension<AuthContext>) -> ApiResult<Json<MeResponse>> {
    Ok(Json(MeResponse::from(ctx)))
}
