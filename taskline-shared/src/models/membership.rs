/// Tenant membership model and database operations
///
/// Many-to-many link between accounts and tenants, carrying a role scoped to
/// that tenant. The legacy `accounts.tenant_id` column is treated as
/// membership evidence as well; [`Membership::tenant_ids_for_account`] is the
/// one place that combines both sources.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE membership_role AS ENUM ('owner', 'admin', 'member');
///
/// CREATE TABLE tenant_memberships (
///     tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
///     account_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
///     role membership_role NOT NULL DEFAULT 'member',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (tenant_id, account_id)
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use taskline_shared::models::membership::{Membership, CreateMembership, MembershipRole};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, tenant_id: Uuid, account_id: Uuid) -> Result<(), sqlx::Error> {
/// Membership::create(&pool, CreateMembership {
///     tenant_id,
///     account_id,
///     role: MembershipRole::Member,
/// }).await?;
///
/// let tenants = Membership::tenant_ids_for_account(&pool, account_id).await?;
/// assert!(tenants.contains(&tenant_id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Role within a single tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "membership_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MembershipRole {
    /// Created the tenant
    Owner,

    /// Manages the tenant's directory
    Admin,

    /// Regular member
    Member,
}

impl MembershipRole {
    /// Converts role to string for display
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipRole::Owner => "owner",
            MembershipRole::Admin => "admin",
            MembershipRole::Member => "member",
        }
    }
}

impl Default for MembershipRole {
    fn default() -> Self {
        MembershipRole::Member
    }
}

/// Membership row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Membership {
    /// Tenant ID
    pub tenant_id: Uuid,

    /// Account ID
    pub account_id: Uuid,

    /// Role within the tenant
    pub role: MembershipRole,

    /// When the membership was created
    pub created_at: DateTime<Utc>,
}

/// Input for creating a membership
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMembership {
    /// Tenant ID
    pub tenant_id: Uuid,

    /// Account ID
    pub account_id: Uuid,

    /// Role to assign (defaults to Member)
    #[serde(default)]
    pub role: MembershipRole,
}

/// Directory entry: a member of a tenant joined with their account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TenantMember {
    /// Account ID
    pub account_id: Uuid,

    /// Email address
    pub email: String,

    /// Display name
    pub name: Option<String>,

    /// Avatar URL
    pub avatar_url: Option<String>,

    /// Role within the tenant
    pub role: MembershipRole,

    /// Whether the account is still a ghost (`pending`) or `active`
    pub status: crate::models::account::AccountStatus,
}

impl Membership {
    /// Creates a membership
    ///
    /// # Errors
    ///
    /// Returns an error if the membership already exists or the tenant/account
    /// doesn't exist.
    pub async fn create<'e, E>(executor: E, data: CreateMembership) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO tenant_memberships (tenant_id, account_id, role)
            VALUES ($1, $2, $3)
            RETURNING tenant_id, account_id, role, created_at
            "#,
        )
        .bind(data.tenant_id)
        .bind(data.account_id)
        .bind(data.role)
        .fetch_one(executor)
        .await?;

        Ok(membership)
    }

    /// Creates a membership, or returns the existing one unchanged
    pub async fn ensure<'e, E>(executor: E, data: CreateMembership) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        // The no-op update makes RETURNING yield the existing row on conflict
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO tenant_memberships (tenant_id, account_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (tenant_id, account_id)
            DO UPDATE SET role = tenant_memberships.role
            RETURNING tenant_id, account_id, role, created_at
            "#,
        )
        .bind(data.tenant_id)
        .bind(data.account_id)
        .bind(data.role)
        .fetch_one(executor)
        .await?;

        Ok(membership)
    }

    /// Finds a specific membership
    pub async fn find<'e, E>(
        executor: E,
        tenant_id: Uuid,
        account_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            SELECT tenant_id, account_id, role, created_at
            FROM tenant_memberships
            WHERE tenant_id = $1 AND account_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(account_id)
        .fetch_optional(executor)
        .await?;

        Ok(membership)
    }

    /// Returns every tenant the account belongs to
    ///
    /// Combines the membership table with the account's legacy primary-tenant
    /// column. The result has no duplicates.
    pub async fn tenant_ids_for_account<'e, E>(
        executor: E,
        account_id: Uuid,
    ) -> Result<Vec<Uuid>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let tenant_ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT tenant_id FROM tenant_memberships WHERE account_id = $1
            UNION
            SELECT tenant_id FROM accounts WHERE id = $1 AND tenant_id IS NOT NULL
            "#,
        )
        .bind(account_id)
        .fetch_all(executor)
        .await?;

        Ok(tenant_ids)
    }

    /// Lists the members of a tenant with their account details
    ///
    /// Accounts whose primary tenant is `tenant_id` but which have no
    /// membership row are listed as `member`.
    pub async fn list_members<'e, E>(
        executor: E,
        tenant_id: Uuid,
    ) -> Result<Vec<TenantMember>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let members = sqlx::query_as::<_, TenantMember>(
            r#"
            SELECT a.id AS account_id, a.email, a.name, a.avatar_url,
                   COALESCE(m.role, 'member'::membership_role) AS role, a.status
            FROM accounts a
            LEFT JOIN tenant_memberships m
                   ON m.account_id = a.id AND m.tenant_id = $1
            WHERE m.tenant_id IS NOT NULL OR a.tenant_id = $1
            ORDER BY a.email ASC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(executor)
        .await?;

        Ok(members)
    }

    /// Deletes a membership
    pub async fn delete<'e, E>(executor: E, tenant_id: Uuid, account_id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "DELETE FROM tenant_memberships WHERE tenant_id = $1 AND account_id = $2",
        )
        .bind(tenant_id)
        .bind(account_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
