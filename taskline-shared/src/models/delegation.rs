/// Delegation grant model and database operations
///
/// A delegation grant temporarily elevates one account to `admin` within a
/// tenant. Grants are never swept: a grant is *live* only while
/// `status = 'active' AND starts_at <= now < expires_at`, and every query that
/// cares about liveness applies that predicate with the caller's `now`.
///
/// # Lifecycle
///
/// ```text
/// active ──(expires_at passes)──> (still 'active', no longer live)
/// active ──(revoke)──────────────> cancelled
/// cancelled ──(revoke)───────────> cancelled   (no-op)
/// ```
///
/// # Schema
///
/// ```sql
/// CREATE TYPE delegation_status AS ENUM ('active', 'cancelled');
///
/// CREATE TABLE delegations (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     delegator_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
///     delegate_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
///     tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
///     role account_role NOT NULL DEFAULT 'admin',
///     status delegation_status NOT NULL DEFAULT 'active',
///     starts_at TIMESTAMPTZ NOT NULL,
///     expires_at TIMESTAMPTZ NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT delegations_window_check CHECK (expires_at > starts_at),
///     CONSTRAINT delegations_role_check CHECK (role = 'admin')
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use taskline_shared::models::delegation::{CreateDelegation, DelegationGrant};
/// use chrono::Utc;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, admin: Uuid, user: Uuid, tenant: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let now = Utc::now();
/// let grant = DelegationGrant::create(&pool, CreateDelegation {
///     delegator_id: admin,
///     delegate_id: user,
///     tenant_id: tenant,
///     days: 1,
/// }, now).await?;
///
/// assert!(grant.is_live(now));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use thiserror::Error;
use uuid::Uuid;

use crate::models::account::Role;

/// Delegation grant status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "delegation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DelegationStatus {
    /// Grant has not been revoked (it may still have lapsed)
    Active,

    /// Grant was revoked explicitly
    Cancelled,
}

/// Delegation grant row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DelegationGrant {
    /// Unique grant ID
    pub id: Uuid,

    /// Account that issued the grant
    pub delegator_id: Uuid,

    /// Account receiving the elevation
    pub delegate_id: Uuid,

    /// Tenant the grant was issued in
    pub tenant_id: Uuid,

    /// Granted role (always `admin`)
    pub role: Role,

    /// Grant status
    pub status: DelegationStatus,

    /// Start of the window (inclusive)
    pub starts_at: DateTime<Utc>,

    /// End of the window (exclusive)
    pub expires_at: DateTime<Utc>,

    /// When the grant was created
    pub created_at: DateTime<Utc>,
}

/// Input for creating a delegation grant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDelegation {
    /// Account issuing the grant
    pub delegator_id: Uuid,

    /// Account receiving the grant
    pub delegate_id: Uuid,

    /// Tenant scope
    pub tenant_id: Uuid,

    /// Window length in days (must be positive)
    pub days: i64,
}

/// Errors raised while writing delegation grants
#[derive(Debug, Error)]
pub enum GrantError {
    /// Duration is not positive or overflows the timestamp range
    #[error("Invalid delegation duration: {0} days")]
    InvalidDuration(i64),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Computes `now + days`, rejecting non-positive or out-of-range durations
pub fn expiry_after_days(now: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    if days <= 0 {
        return None;
    }

    Duration::try_days(days).and_then(|window| now.checked_add_signed(window))
}

impl DelegationGrant {
    /// Whether the grant is live at `now`
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == DelegationStatus::Active && self.starts_at <= now && now < self.expires_at
    }

    /// Creates an `admin` grant starting at `now`
    ///
    /// No uniqueness is enforced across grants to the same delegate; the most
    /// recently created live grant wins at evaluation time.
    ///
    /// # Errors
    ///
    /// - [`GrantError::InvalidDuration`] if `days` is not positive or overflows
    /// - [`GrantError::Database`] on foreign key violations or connection failure
    pub async fn create<'e, E>(
        executor: E,
        data: CreateDelegation,
        now: DateTime<Utc>,
    ) -> Result<Self, GrantError>
    where
        E: PgExecutor<'e>,
    {
        let expires_at =
            expiry_after_days(now, data.days).ok_or(GrantError::InvalidDuration(data.days))?;

        let grant = sqlx::query_as::<_, DelegationGrant>(
            r#"
            INSERT INTO delegations (delegator_id, delegate_id, tenant_id, role, status,
                                     starts_at, expires_at)
            VALUES ($1, $2, $3, 'admin', 'active', $4, $5)
            RETURNING id, delegator_id, delegate_id, tenant_id, role, status,
                      starts_at, expires_at, created_at
            "#,
        )
        .bind(data.delegator_id)
        .bind(data.delegate_id)
        .bind(data.tenant_id)
        .bind(now)
        .bind(expires_at)
        .fetch_one(executor)
        .await?;

        Ok(grant)
    }

    /// Finds the most recently created grant that is live for `delegate_id` at `now`
    pub async fn find_live_for_delegate<'e, E>(
        executor: E,
        delegate_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let grant = sqlx::query_as::<_, DelegationGrant>(
            r#"
            SELECT id, delegator_id, delegate_id, tenant_id, role, status,
                   starts_at, expires_at, created_at
            FROM delegations
            WHERE delegate_id = $1
              AND status = 'active'
              AND starts_at <= $2
              AND expires_at > $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(delegate_id)
        .bind(now)
        .fetch_optional(executor)
        .await?;

        Ok(grant)
    }

    /// Lists a tenant's active, unexpired grants, newest first
    pub async fn list_active<'e, E>(
        executor: E,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let grants = sqlx::query_as::<_, DelegationGrant>(
            r#"
            SELECT id, delegator_id, delegate_id, tenant_id, role, status,
                   starts_at, expires_at, created_at
            FROM delegations
            WHERE tenant_id = $1
              AND status = 'active'
              AND expires_at > $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(tenant_id)
        .bind(now)
        .fetch_all(executor)
        .await?;

        Ok(grants)
    }

    /// Finds a grant by ID within a tenant
    ///
    /// Grants in other tenants are reported as missing.
    pub async fn find_in_tenant<'e, E>(
        executor: E,
        id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let grant = sqlx::query_as::<_, DelegationGrant>(
            r#"
            SELECT id, delegator_id, delegate_id, tenant_id, role, status,
                   starts_at, expires_at, created_at
            FROM delegations
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await?;

        Ok(grant)
    }

    /// Cancels an active grant in a tenant
    ///
    /// Returns true if the status changed. Cancelling an already cancelled
    /// grant changes nothing and returns false.
    pub async fn cancel<'e, E>(executor: E, id: Uuid, tenant_id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE delegations
            SET status = 'cancelled'
            WHERE id = $1 AND tenant_id = $2 AND status = 'active'
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
