/// Delegation store operations
///
/// Role-checked wrappers over [`DelegationGrant`] used by request handlers.
/// Creating and revoking grants requires an effective role of `admin` or
/// `god` (a delegated admin qualifies). Listing is a plain read.
///
/// Grants to the same delegate may overlap; no uniqueness is enforced here.
/// Role evaluation picks the most recently created live grant.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::authorization::{require_elevated, AuthzError};
use super::role::EffectiveRole;
use crate::models::account::Account;
use crate::models::delegation::{CreateDelegation, DelegationGrant, GrantError};

/// Error type for delegation operations
#[derive(Debug, thiserror::Error)]
pub enum DelegationError {
    /// Caller's effective role is below `admin`
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Duration is not a positive number of days (or overflows)
    #[error("Invalid delegation duration: {0} days")]
    InvalidDuration(i64),

    /// Delegate account doesn't exist
    #[error("Delegate account {0} not found")]
    DelegateNotFound(Uuid),

    /// Grant doesn't exist in the caller's tenant
    #[error("Delegation grant not found")]
    NotFound,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<AuthzError> for DelegationError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Forbidden(msg) => DelegationError::Forbidden(msg),
            AuthzError::NotFound(_) => DelegationError::NotFound,
            AuthzError::Database(e) => DelegationError::Database(e),
        }
    }
}

impl From<GrantError> for DelegationError {
    fn from(err: GrantError) -> Self {
        match err {
            GrantError::InvalidDuration(days) => DelegationError::InvalidDuration(days),
            GrantError::Database(e) => DelegationError::Database(e),
        }
    }
}

/// Lists a tenant's active, unexpired grants, newest first
pub async fn list_active_delegations(
    pool: &PgPool,
    tenant_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Vec<DelegationGrant>, DelegationError> {
    Ok(DelegationGrant::list_active(pool, tenant_id, now).await?)
}

/// Grants `admin` to `delegate_id` in `tenant_id` for `days` days from `now`
///
/// # Errors
///
/// - [`DelegationError::Forbidden`] unless `granter_role` is admin or god
/// - [`DelegationError::InvalidDuration`] if `days` is not positive
/// - [`DelegationError::DelegateNotFound`] if the delegate doesn't exist
pub async fn create_delegation(
    pool: &PgPool,
    granter_id: Uuid,
    granter_role: &EffectiveRole,
    delegate_id: Uuid,
    tenant_id: Uuid,
    days: i64,
    now: DateTime<Utc>,
) -> Result<DelegationGrant, DelegationError> {
    require_elevated(granter_role)?;

    if days <= 0 {
        return Err(DelegationError::InvalidDuration(days));
    }

    if Account::find_by_id(pool, delegate_id).await?.is_none() {
        return Err(DelegationError::DelegateNotFound(delegate_id));
    }

    let grant = DelegationGrant::create(
        pool,
        CreateDelegation {
            delegator_id: granter_id,
            delegate_id,
            tenant_id,
            days,
        },
        now,
    )
    .await?;

    tracing::info!(
        grant_id = %grant.id,
        delegator_id = %granter_id,
        delegate_id = %delegate_id,
        tenant_id = %tenant_id,
        expires_at = %grant.expires_at,
        "delegation created"
    );

    Ok(grant)
}

/// Cancels a grant in the caller's tenant
///
/// Revoking a grant that is already cancelled succeeds without changing
/// anything.
///
/// # Errors
///
/// - [`DelegationError::Forbidden`] unless `granter_role` is admin or god
/// - [`DelegationError::NotFound`] if no such grant exists in `tenant_id`
pub async fn revoke_delegation(
    pool: &PgPool,
    granter_role: &EffectiveRole,
    tenant_id: Uuid,
    grant_id: Uuid,
) -> Result<(), DelegationError> {
    require_elevated(granter_role)?;

    if DelegationGrant::cancel(pool, grant_id, tenant_id).await? {
        tracing::info!(grant_id = %grant_id, tenant_id = %tenant_id, "delegation revoked");
        return Ok(());
    }

    if DelegationGrant::find_in_tenant(pool, grant_id, tenant_id)
        .await?
        .is_none()
    {
        return Err(DelegationError::NotFound);
    }

    tracing::debug!(grant_id = %grant_id, "delegation already inactive");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversions() {
        assert!(matches!(
            DelegationError::from(AuthzError::Forbidden("x".to_string())),
            DelegationError::Forbidden(_)
        ));
        assert!(matches!(
            DelegationError::from(GrantError::InvalidDuration(0)),
            DelegationError::InvalidDuration(0)
        ));
    }
}
