/// Per-request authentication context
///
/// Built by the API's authentication middleware after identity resolution
/// and role evaluation, and added to request extensions. Handlers extract it
/// with `Extension<AuthContext>`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::role::EffectiveRole;
use crate::models::account::{Account, Role};

/// Authenticated caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    /// Resolved account
    pub account: Account,

    /// Effective role for this request
    pub role: EffectiveRole,

    /// Account that actually authenticated, when impersonating (development only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impersonated_by: Option<Uuid>,
}

impl AuthContext {
    /// Creates a context for a directly authenticated account
    pub fn new(account: Account, role: EffectiveRole) -> Self {
        Self {
            account,
            role,
            impersonated_by: None,
        }
    }

    /// Caller's account ID
    pub fn account_id(&self) -> Uuid {
        self.account.id
    }

    /// Caller's primary tenant
    pub fn tenant_id(&self) -> Option<Uuid> {
        self.account.tenant_id
    }

    /// Effective role value
    pub fn effective_role(&self) -> Role {
        self.role.role
    }

    /// Whether the effective role is `god`
    pub fn is_god(&self) -> bool {
        self.role.is_god()
    }

    /// Whether the effective role is `admin` or `god`
    pub fn is_elevated(&self) -> bool {
        self.role.is_elevated()
    }
}
