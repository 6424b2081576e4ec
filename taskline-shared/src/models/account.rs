/// Account model and database operations
///
/// An account is a person or an external collaborator. Accounts are created
/// either the first time a verified external identity shows up, or ahead of
/// time by an invitation flow (task collaboration invite, directory add). The
/// second kind is a *ghost*: it has no verified external subject yet and is
/// claimed in place once the real person authenticates with the same email.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE account_role AS ENUM ('user', 'admin', 'god');
/// CREATE TYPE account_status AS ENUM ('pending', 'active');
///
/// CREATE TABLE accounts (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     auth_subject VARCHAR(255) UNIQUE,
///     email VARCHAR(320) NOT NULL,
///     name VARCHAR(255),
///     avatar_url VARCHAR(1024),
///     role account_role NOT NULL DEFAULT 'user',
///     status account_status NOT NULL DEFAULT 'active',
///     tenant_id UUID REFERENCES tenants(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT accounts_email_key UNIQUE (email),
///     CONSTRAINT accounts_email_lowercase CHECK (email = LOWER(email))
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use taskline_shared::models::account::Account;
/// use taskline_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// if let Some(account) = Account::find_by_email(&pool, "bob@example.com").await? {
///     println!("{} ghost={}", account.id, account.is_ghost());
/// }
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

/// Prefix of the synthetic subject stored on accounts provisioned by invitation
pub const PLACEHOLDER_SUBJECT_PREFIX: &str = "invited|";

/// Stored account role
///
/// This is the role persisted on the account row. The role used for
/// authorization decisions is computed per request by
/// [`crate::auth::role::effective_role`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "account_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular account
    User,

    /// Tenant administrator (may also be obtained temporarily via delegation)
    Admin,

    /// Super-admin: sees and may touch everything
    God,
}

impl Role {
    /// Converts role to string for display
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::God => "god",
        }
    }

    /// Whether this role already carries elevated standing (admin or god)
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Admin | Role::God)
    }
}

/// Account lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "account_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    /// Provisioned by invitation, never logged in
    Pending,

    /// Has authenticated at least once
    Active,
}

/// Account row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    /// Unique account ID
    pub id: Uuid,

    /// Subject assigned by the external identity issuer
    ///
    /// `None` (or a synthetic `invited|...` value) for ghost accounts.
    #[serde(skip_serializing)]
    pub auth_subject: Option<String>,

    /// Email address (unique, stored lowercase)
    pub email: String,

    /// Optional display name
    pub name: Option<String>,

    /// Optional avatar URL
    pub avatar_url: Option<String>,

    /// Stored role
    pub role: Role,

    /// Lifecycle status
    pub status: AccountStatus,

    /// Primary (legacy single-tenant) reference
    pub tenant_id: Option<Uuid>,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccount {
    /// External subject (placeholder for invited accounts)
    pub auth_subject: Option<String>,

    /// Email address
    pub email: String,

    /// Optional display name
    pub name: Option<String>,

    /// Optional avatar URL
    pub avatar_url: Option<String>,

    /// Initial stored role
    pub role: Role,

    /// Initial status
    pub status: AccountStatus,

    /// Primary tenant
    pub tenant_id: Option<Uuid>,
}

/// Field values written when a ghost account is claimed
///
/// Produced by [`crate::auth::identity::claim`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimUpdate {
    /// Verified external subject
    pub auth_subject: String,

    /// Display name after merge
    pub name: Option<String>,

    /// Avatar URL after merge
    pub avatar_url: Option<String>,
}

/// Normalizes an email address for storage and lookup (trimmed, lowercase)
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Returns true when `subject` is a synthetic invitation placeholder
pub fn is_placeholder_subject(subject: &str) -> bool {
    subject.starts_with(PLACEHOLDER_SUBJECT_PREFIX)
}

/// Generates a fresh synthetic subject for an invited account
///
/// Format: `invited|<32 hex chars>`
pub fn placeholder_subject() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}{}", PLACEHOLDER_SUBJECT_PREFIX, hex::encode(bytes))
}

impl Account {
    /// Whether this account has never been bound to a verified external subject
    pub fn is_ghost(&self) -> bool {
        match self.auth_subject.as_deref() {
            None => true,
            Some(subject) => subject.is_empty() || is_placeholder_subject(subject),
        }
    }

    /// Creates a new account
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The email or subject already exists (unique constraint violation)
    /// - The tenant doesn't exist (foreign key violation)
    /// - Database connection fails
    pub async fn create<'e, E>(executor: E, data: CreateAccount) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (auth_subject, email, name, avatar_url, role, status, tenant_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, auth_subject, email, name, avatar_url, role, status, tenant_id,
                      created_at, updated_at
            "#,
        )
        .bind(data.auth_subject)
        .bind(data.email)
        .bind(data.name)
        .bind(data.avatar_url)
        .bind(data.role)
        .bind(data.status)
        .bind(data.tenant_id)
        .fetch_one(executor)
        .await?;

        Ok(account)
    }

    /// Finds an account by ID
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, auth_subject, email, name, avatar_url, role, status, tenant_id,
                   created_at, updated_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(account)
    }

    /// Finds an account by its external subject
    ///
    /// This is the fast path of identity resolution.
    pub async fn find_by_subject<'e, E>(
        executor: E,
        subject: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, auth_subject, email, name, avatar_url, role, status, tenant_id,
                   created_at, updated_at
            FROM accounts
            WHERE auth_subject = $1
            "#,
        )
        .bind(subject)
        .fetch_optional(executor)
        .await?;

        Ok(account)
    }

    /// Finds an account by email address
    ///
    /// `email` must already be normalized with [`normalize_email`].
    pub async fn find_by_email<'e, E>(executor: E, email: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, auth_subject, email, name, avatar_url, role, status, tenant_id,
                   created_at, updated_at
            FROM accounts
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(executor)
        .await?;

        Ok(account)
    }

    /// Finds an account by email and locks the row for the rest of the transaction
    ///
    /// Used by the claim path so two concurrent logins for the same ghost
    /// account serialize on the row instead of both rewriting it.
    pub async fn find_by_email_for_update(
        conn: &mut PgConnection,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, auth_subject, email, name, avatar_url, role, status, tenant_id,
                   created_at, updated_at
            FROM accounts
            WHERE email = $1
            FOR UPDATE
            "#,
        )
        .bind(email)
        .fetch_optional(conn)
        .await?;

        Ok(account)
    }

    /// Binds a verified subject to an account and marks it active
    ///
    /// Returns the updated account, or `None` if the row no longer exists.
    pub async fn apply_claim<'e, E>(
        executor: E,
        id: Uuid,
        update: &ClaimUpdate,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let account = sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET auth_subject = $2,
                name = $3,
                avatar_url = $4,
                status = 'active',
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, auth_subject, email, name, avatar_url, role, status, tenant_id,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&update.auth_subject)
        .bind(&update.name)
        .bind(&update.avatar_url)
        .fetch_optional(executor)
        .await?;

        Ok(account)
    }

    /// Promotes an account to `god` if it isn't already
    ///
    /// Returns true if a row was changed. Repeated calls are no-ops.
    pub async fn promote_to_god<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET role = 'god', updated_at = NOW()
            WHERE id = $1 AND role <> 'god'
            "#,
        )
        .bind(id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Demotes every `god` account except `keep` to `admin`
    ///
    /// Returns the number of demoted accounts.
    pub async fn demote_other_gods<'e, E>(executor: E, keep: Uuid) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET role = 'admin', updated_at = NOW()
            WHERE role = 'god' AND id <> $1
            "#,
        )
        .bind(keep)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Counts accounts with the given IDs
    ///
    /// Used to validate that every referenced account exists before writing
    /// rows that point at them.
    pub async fn count_existing<'e, E>(executor: E, ids: &[Uuid]) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM accounts WHERE id = ANY($1)")
            .bind(ids)
            .fetch_one(executor)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(subject: Option<&str>) -> Account {
        Account {
            id: Uuid::new_v4(),
            auth_subject: subject.map(str::to_string),
            email: "bob@x.com".to_string(),
            name: None,
            avatar_url: None,
            role: Role::User,
            status: AccountStatus::Pending,
            tenant_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_role_as_str() {
        assert_eq!(Role::User.as_str(), "user");
        assert_eq!(Role::Admin.as_str(), "admin");
        assert_eq!(Role::God.as_str(), "god");
    }

    #[test]
    fn test_role_is_elevated() {
        assert!(!Role::User.is_elevated());
        assert!(Role::Admin.is_elevated());
        assert!(Role::God.is_elevated());
    }

    #[test]
    fn test_ghost_detection() {
        assert!(account(None).is_ghost());
        assert!(account(Some("")).is_ghost());
        assert!(account(Some(&placeholder_subject())).is_ghost());
        assert!(!account(Some("sub-42")).is_ghost());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Bob@X.com "), "bob@x.com");
        assert_eq!(normalize_email("bob@x.com"), "bob@x.com");
    }

    #[test]
    fn test_placeholder_subject_format() {
        let a = placeholder_subject();
        let b = placeholder_subject();

        assert!(is_placeholder_subject(&a));
        assert_eq!(a.len(), PLACEHOLDER_SUBJECT_PREFIX.len() + 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_subject_not_serialized() {
        let json = serde_json::to_value(account(Some("sub-42"))).unwrap();
        assert!(json.get("auth_subject").is_none());
        assert_eq!(json["role"], "user");
        assert_eq!(json["status"], "pending");
    }
}
