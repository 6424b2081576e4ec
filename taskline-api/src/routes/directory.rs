/// Tenant directory endpoints
///
/// # Endpoints
///
/// - `GET /v1/directory` - List members of the caller's tenant
/// - `POST /v1/directory` - Add a member by email (admin or god)
///
/// Adding an email nobody has used yet provisions a ghost account that the
/// person claims on first login.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use taskline_shared::auth::authorization::require_elevated;
use taskline_shared::auth::context::AuthContext;
use taskline_shared::auth::identity::find_or_invite;
use taskline_shared::models::membership::{CreateMembership, Membership, MembershipRole, TenantMember};
use uuid::Uuid;
use validator::Validate;

/// Add member request
#[derive(Debug, Deserialize, Validate)]
pub struct AddMemberRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(max = 200, message = "Name must be at most 200 characters"))]
    pub name: Option<String>,

    #[serde(default)]
    pub role: MembershipRole,
}

/// Directory listing
#[derive(Debug, Serialize)]
pub struct ListMembersResponse {
    pub tenant_id: Uuid,
    pub members: Vec<TenantMember>,
}

/// Add member response
#[derive(Debug, Serialize)]
pub struct AddMemberResponse {
    #[serde(flatten)]
    pub member: TenantMember,

    /// Whether a ghost account was provisioned for the email
    pub invited: bool,
}

fn caller_tenant(ctx: &AuthContext) -> ApiResult<Uuid> {
    ctx.tenant_id()
        .ok_or_else(|| ApiError::BadRequest("Caller has no tenant".to_string()))
}

/// List members of the caller's tenant
pub async fn list_members(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<ListMembersResponse>> {
    let tenant_id = caller_tenant(&ctx)?;

    let members = Membership::list_members(&state.db, tenant_id).await?;

    Ok(Json(ListMembersResponse { tenant_id, members }))
}

/// Add a member to the caller's tenant
///
/// # Request
///
/// ```json
/// { "email": "bob@x.com", "name": "Bob", "role": "member" }
/// ```
pub async fn add_member(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<AddMemberRequest>,
) -> ApiResult<(StatusCode, Json<AddMemberResponse>)> {
    require_elevated(&ctx.role)?;
    req.validate()?;
    let tenant_id = caller_tenant(&ctx)?;

    let mut tx = state.db.begin().await?;

    let (account, invited) = find_or_invite(&mut *tx, &req.email, req.name, Some(tenant_id)).await?;
    let membership = Membership::ensure(
        &mut *tx,
        CreateMembership {
            tenant_id,
            account_id: account.id,
            role: req.role,
        },
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        tenant_id = %tenant_id,
        account_id = %account.id,
        added_by = %ctx.account_id(),
        invited,
        "directory member added"
    );

    Ok((
        StatusCode::CREATED,
        Json(AddMemberResponse {
            member: TenantMember {
                account_id: account.id,
                email: account.email,
                name: account.name,
                avatar_url: account.avatar_url,
                role: membership.role,
                status: account.status,
            },
            invited,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_member_request_defaults_to_member() {
        let req: AddMemberRequest = serde_json::from_str(r#"{"email":"new@x.com"}"#).unwrap();

        assert_eq!(req.role, MembershipRole::Member);
        assert!(req.name.is_none());
        assert!(req.validate().is_ok());
    }
}
