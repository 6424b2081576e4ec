/// Effective role evaluation
///
/// The role stored on an account is not the role used for authorization. The
/// *effective* role is computed on every request from:
///
/// 1. the super-admin allow-list (always `god`),
/// 2. the stored role, when it is already `admin` or `god`,
/// 3. the most recently created live delegation grant, when there is one,
/// 4. otherwise the stored role.
///
/// [`effective_role`] is the pure decision; [`evaluate`] gathers its inputs
/// from the store. Nothing is cached between requests, since a delegation
/// window can open or close between any two of them.
///
/// # Example
///
/// ```
/// use taskline_shared::auth::role::effective_role;
/// use taskline_shared::models::account::Role;
/// use chrono::Utc;
///
/// let role = effective_role(Role::User, false, None, Utc::now());
/// assert_eq!(role.role, Role::User);
/// assert!(!role.is_delegated);
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::super_admin::{heal_super_admin, SuperAdminList};
use crate::models::account::{Account, Role};
use crate::models::delegation::DelegationGrant;

/// Error type for role evaluation
#[derive(Debug, thiserror::Error)]
pub enum RoleError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// The role an account holds right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveRole {
    /// Role used for authorization
    pub role: Role,

    /// Whether `role` comes from a delegation grant
    pub is_delegated: bool,

    /// When the delegation lapses (only set when delegated)
    pub expires_at: Option<DateTime<Utc>>,
}

impl EffectiveRole {
    /// A role held outright, not through delegation
    pub fn stored(role: Role) -> Self {
        Self {
            role,
            is_delegated: false,
            expires_at: None,
        }
    }

    /// Whether the role is `god`
    pub fn is_god(&self) -> bool {
        self.role == Role::God
    }

    /// Whether the role is `admin` or `god`
    pub fn is_elevated(&self) -> bool {
        self.role.is_elevated()
    }
}

/// Computes the effective role
///
/// `live_grant` is ignored unless it is live at `now`, and is never consulted
/// for accounts that are already elevated.
pub fn effective_role(
    stored: Role,
    is_super_admin: bool,
    live_grant: Option<&DelegationGrant>,
    now: DateTime<Utc>,
) -> EffectiveRole {
    if is_super_admin {
        return EffectiveRole::stored(Role::God);
    }

    if stored.is_elevated() {
        return EffectiveRole::stored(stored);
    }

    match live_grant.filter(|grant| grant.is_live(now)) {
        Some(grant) => EffectiveRole {
            role: grant.role,
            is_delegated: true,
            expires_at: Some(grant.expires_at),
        },
        None => EffectiveRole::stored(stored),
    }
}

/// Evaluates an account's effective role at `now`
///
/// Self-heals allow-listed accounts whose stored role has drifted (updating
/// `account` in place). The delegation store is only queried for accounts
/// whose stored role is `user`.
pub async fn evaluate(
    pool: &PgPool,
    account: &mut Account,
    super_admins: &SuperAdminList,
    now: DateTime<Utc>,
) -> Result<EffectiveRole, RoleError> {
    heal_super_admin(pool, account, super_admins).await?;

    let is_super_admin = super_admins.contains(&account.email);

    let live_grant = if is_super_admin || account.role.is_elevated() {
        None
    } else {
        DelegationGrant::find_live_for_delegate(pool, account.id, now).await?
    };

    let role = effective_role(account.role, is_super_admin, live_grant.as_ref(), now);

    if role.is_delegated {
        tracing::debug!(
            account_id = %account.id,
            expires_at = ?role.expires_at,
            "using delegated role"
        );
    }

    Ok(role)
}
