/// Delegation endpoints
///
/// Admins (including delegated admins) and gods grant `admin` to another
/// account for a whole number of days. Grants are scoped to the caller's
/// primary tenant and lapse on their own; revocation is optional.
///
/// # Endpoints
///
/// - `GET /v1/delegations` - List active grants in the caller's tenant
/// - `POST /v1/delegations` - Create a grant
/// - `POST /v1/delegations/:id/revoke` - Revoke a grant

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use taskline_shared::auth::authorization::require_elevated;
use taskline_shared::auth::context::AuthContext;
use taskline_shared::auth::delegation;
use taskline_shared::models::delegation::DelegationGrant;
use uuid::Uuid;
use validator::Validate;

/// Create delegation request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateDelegationRequest {
    /// Account receiving `admin`
    pub delegate_id: Uuid,

    /// Window length in days
    #[validate(range(min = 1, message = "Days must be a positive number"))]
    pub days: i64,
}

/// List delegations response
#[derive(Debug, Serialize)]
pub struct ListDelegationsResponse {
    pub delegations: Vec<DelegationGrant>,
}

/// Revoke delegation response
#[derive(Debug, Serialize)]
pub struct RevokeDelegationResponse {
    pub revoked: bool,
}

fn caller_tenant(ctx: &AuthContext) -> ApiResult<Uuid> {
    ctx.tenant_id()
        .ok_or_else(|| ApiError::BadRequest("Caller has no tenant".to_string()))
}

/// List active grants in the caller's tenant
pub async fn list_delegations(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<ListDelegationsResponse>> {
    let tenant_id = caller_tenant(&ctx)?;

    let delegations = delegation::list_active_delegations(&state.db, tenant_id, Utc::now()).await?;

    Ok(Json(ListDelegationsResponse { delegations }))
}

/// Create a grant
///
/// # Request
///
/// ```json
/// { "delegate_id": "...", "days": 7 }
/// ```
pub async fn create_delegation(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<CreateDelegationRequest>,
) -> ApiResult<(StatusCode, Json<DelegationGrant>)> {
    require_elevated(&ctx.role)?;
    req.validate()?;
    let tenant_id = caller_tenant(&ctx)?;

    let grant = delegation::create_delegation(
        &state.db,
        ctx.account_id(),
        &ctx.role,
        req.delegate_id,
        tenant_id,
        req.days,
        Utc::now(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(grant)))
}

/// Revoke a grant
///
/// Revoking an already revoked grant also succeeds.
pub async fn revoke_delegation(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(grant_id): Path<Uuid>,
) -> ApiResult<Json<RevokeDelegationResponse>> {
    let tenant_id = caller_tenant(&ctx)?;

    delegation::revoke_delegation(&state.db, &ctx.role, tenant_id, grant_id).await?;

    Ok(Json(RevokeDelegationResponse { revoked: true }))
}
