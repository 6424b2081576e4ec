/// Development-only endpoints
///
/// Never mounted when `API_PRODUCTION` is set; the handler also refuses to
/// run in production in case it is mounted by mistake.
///
/// # Endpoints
///
/// - `POST /v1/dev/become-sole-god` - Promote the caller to `god` and demote
///   every other `god` to `admin`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, Extension, Json};
use serde::Serialize;
use taskline_shared::auth::context::AuthContext;
use taskline_shared::models::account::Account;
use uuid::Uuid;

/// Result of the role bypass
#[derive(Debug, Serialize)]
pub struct BecomeSoleGodResponse {
    pub account_id: Uuid,

    /// Other accounts demoted from `god` to `admin`
    pub demoted: u64,
}

/// Make the caller the only `god`
///
/// Promotion and demotion happen in one transaction.
pub async fn become_sole_god(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<BecomeSoleGodResponse>> {
    if state.config.is_production() {
        return Err(ApiError::NotFound("Not found".to_string()));
    }

    let account_id = ctx.account_id();
    let mut tx = state.db.begin().await?;

    Account::promote_to_god(&mut *tx, account_id).await?;
    let demoted = Account::demote_other_gods(&mut *tx, account_id).await?;

    tx.commit().await?;

    tracing::warn!(account_id = %account_id, demoted, "dev bypass: caller is now the sole god");

    Ok(Json(BecomeSoleGodResponse {
        account_id,
        demoted,
    }))
}
