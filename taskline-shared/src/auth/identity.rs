/// Identity resolution
///
/// Maps a verified issuer assertion to a local [`Account`], creating or
/// claiming records as needed.
///
/// # Resolution
///
/// ```text
/// subject match ───────────────────────────────> account (fast path)
/// email match, different or missing subject ───> claim in place
/// no match ────────────────────────────────────> provision (user, or god if allow-listed)
/// then: allow-listed but not god ──────────────> self-heal promotion
/// ```
///
/// Claiming keeps the account's id, grants and history; only the subject,
/// display name, avatar and status change. The merge policy lives in
/// [`claim`]. Concurrent first logins for the same email race on the
/// `accounts_email_key` constraint; the loser retries its lookup once.
///
/// # Example
///
/// ```no_run
/// use taskline_shared::auth::identity::IdentityResolver;
/// use taskline_shared::auth::issuer::{JwtIdentityIssuer, JwtIssuerConfig};
/// use taskline_shared::auth::super_admin::SuperAdminList;
/// use taskline_shared::models::tenant::DEFAULT_TENANT_ID;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, bearer: &str) -> Result<(), Box<dyn std::error::Error>> {
/// let issuer = JwtIdentityIssuer::new(JwtIssuerConfig::new("issuer-secret-at-least-32-bytes-long"));
/// let resolver = IdentityResolver::new(SuperAdminList::from_csv("root@example.com"), DEFAULT_TENANT_ID);
///
/// let account = resolver.authenticate(&pool, &issuer, bearer).await?;
/// println!("resolved {}", account.id);
/// # Ok(())
/// # }
/// ```

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::issuer::{IdentityAssertion, IdentityIssuer, IssuerError};
use super::super_admin::{heal_super_admin, SuperAdminList};
use crate::models::account::{
    normalize_email, placeholder_subject, Account, AccountStatus, ClaimUpdate, CreateAccount, Role,
};
use crate::models::membership::{CreateMembership, Membership, MembershipRole};

/// Domain used for accounts whose email could not be determined
pub const PLACEHOLDER_EMAIL_DOMAIN: &str = "placeholder";

/// Error type for identity resolution
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// Credential missing, unverifiable or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Issuer unreachable or returned something unexpected
    #[error("Identity issuer error: {0}")]
    Issuer(IssuerError),

    /// Lost an email uniqueness race twice
    #[error("Conflicting account for {0}")]
    Conflict(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<IssuerError> for IdentityError {
    fn from(err: IssuerError) -> Self {
        if err.is_credential_error() {
            IdentityError::Unauthorized(err.to_string())
        } else {
            IdentityError::Issuer(err)
        }
    }
}

/// Keeps `existing` unless it is empty, in which case a non-empty `asserted` fills it
///
/// A present value is never replaced, and never erased by an empty one.
pub fn merge_field(existing: Option<&str>, asserted: Option<&str>) -> Option<String> {
    let present = |v: &&str| !v.trim().is_empty();

    existing
        .filter(present)
        .or_else(|| asserted.filter(present))
        .map(str::to_string)
}

/// Computes the field values written when `account` is claimed by `assertion`
pub fn claim(account: &Account, assertion: &IdentityAssertion) -> ClaimUpdate {
    ClaimUpdate {
        auth_subject: assertion.subject.clone(),
        name: merge_field(account.name.as_deref(), assertion.name.as_deref()),
        avatar_url: merge_field(account.avatar_url.as_deref(), assertion.avatar_url.as_deref()),
    }
}

/// Deterministic stand-in email for a subject with no known address
pub fn placeholder_email(subject: &str) -> String {
    normalize_email(&format!("{}@{}", subject, PLACEHOLDER_EMAIL_DOMAIN))
}

/// Returns the normalized email for an assertion
///
/// Uses the asserted email, then the issuer's record for the subject, then
/// [`placeholder_email`].
pub async fn backfill_email(
    issuer: &dyn IdentityIssuer,
    assertion: &IdentityAssertion,
) -> Result<String, IdentityError> {
    if let Some(email) = assertion.email.as_deref() {
        return Ok(normalize_email(email));
    }

    let looked_up = issuer
        .lookup_subject(&assertion.subject)
        .await?
        .and_then(|profile| profile.email);

    Ok(match looked_up {
        Some(email) => normalize_email(&email),
        None => {
            tracing::warn!(subject = %assertion.subject, "no email known for subject, using placeholder");
            placeholder_email(&assertion.subject)
        }
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

/// Finds an account by email or provisions a ghost for it
///
/// Used by invitation flows (collaboration invites, directory adds). The
/// ghost gets a synthetic subject, status `pending` and role `user`. Returns
/// the account and whether it was created. Run on the caller's transaction.
pub async fn find_or_invite(
    conn: &mut PgConnection,
    email: &str,
    name: Option<String>,
    tenant_id: Option<Uuid>,
) -> Result<(Account, bool), sqlx::Error> {
    let email = normalize_email(email);

    if let Some(account) = Account::find_by_email_for_update(&mut *conn, &email).await? {
        return Ok((account, false));
    }

    let account = Account::create(
        &mut *conn,
        CreateAccount {
            auth_subject: Some(placeholder_subject()),
            email,
            name: name.filter(|n| !n.trim().is_empty()),
            avatar_url: None,
            role: Role::User,
            status: AccountStatus::Pending,
            tenant_id,
        },
    )
    .await?;

    tracing::info!(account_id = %account.id, "provisioned invited account");

    Ok((account, true))
}

/// Resolves verified identities to local accounts
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    super_admins: SuperAdminList,
    default_tenant_id: Uuid,
}

impl IdentityResolver {
    /// Creates a resolver
    pub fn new(super_admins: SuperAdminList, default_tenant_id: Uuid) -> Self {
        Self {
            super_admins,
            default_tenant_id,
        }
    }

    /// The configured super-admin allow-list
    pub fn super_admins(&self) -> &SuperAdminList {
        &self.super_admins
    }

    /// Tenant assigned to newly provisioned accounts
    pub fn default_tenant_id(&self) -> Uuid {
        self.default_tenant_id
    }

    /// Verifies a bearer credential and resolves it to an account
    ///
    /// # Errors
    ///
    /// - [`IdentityError::Unauthorized`] if the issuer rejects the credential
    /// - [`IdentityError::Conflict`] if an email race is lost twice
    /// - [`IdentityError::Issuer`] / [`IdentityError::Database`] on infrastructure failure
    pub async fn authenticate(
        &self,
        pool: &PgPool,
        issuer: &dyn IdentityIssuer,
        credential: &str,
    ) -> Result<Account, IdentityError> {
        let assertion = issuer.verify(credential).await?;
        self.resolve(pool, issuer, &assertion).await
    }

    /// Resolves a verified assertion to an account
    ///
    /// Re-resolving the same subject returns the same account.
    pub async fn resolve(
        &self,
        pool: &PgPool,
        issuer: &dyn IdentityIssuer,
        assertion: &IdentityAssertion,
    ) -> Result<Account, IdentityError> {
        let mut account = match Account::find_by_subject(pool, &assertion.subject).await? {
            Some(account) => account,
            None => {
                let email = backfill_email(issuer, assertion).await?;
                self.claim_or_provision_with_retry(pool, assertion, &email)
                    .await?
            }
        };

        heal_super_admin(pool, &mut account, &self.super_admins).await?;

        Ok(account)
    }

    async fn claim_or_provision_with_retry(
        &self,
        pool: &PgPool,
        assertion: &IdentityAssertion,
        email: &str,
    ) -> Result<Account, IdentityError> {
        match self.claim_or_provision(pool, assertion, email, true).await {
            Err(IdentityError::Database(err)) if is_unique_violation(&err) => {
                tracing::warn!(subject = %assertion.subject, "lost account creation race, retrying lookup");

                if let Some(account) = Account::find_by_subject(pool, &assertion.subject).await? {
                    return Ok(account);
                }

                match self.claim_or_provision(pool, assertion, email, false).await {
                    Err(IdentityError::Database(err)) if is_unique_violation(&err) => {
                        Err(IdentityError::Conflict(email.to_string()))
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    /// One transactional attempt: claim the email's account, or provision a new one
    async fn claim_or_provision(
        &self,
        pool: &PgPool,
        assertion: &IdentityAssertion,
        email: &str,
        allow_provision: bool,
    ) -> Result<Account, IdentityError> {
        let mut tx = pool.begin().await?;

        let account = match Account::find_by_email_for_update(&mut *tx, email).await? {
            Some(existing) if existing.auth_subject.as_deref() == Some(assertion.subject.as_str()) => {
                existing
            }
            Some(existing) => {
                let update = claim(&existing, assertion);
                let claimed = Account::apply_claim(&mut *tx, existing.id, &update)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)?;

                tracing::info!(
                    account_id = %claimed.id,
                    was_ghost = existing.is_ghost(),
                    "claimed existing account"
                );
                claimed
            }
            None if allow_provision => self.provision(&mut *tx, assertion, email).await?,
            None => return Err(IdentityError::Conflict(email.to_string())),
        };

        tx.commit().await?;

        Ok(account)
    }

    async fn provision(
        &self,
        conn: &mut PgConnection,
        assertion: &IdentityAssertion,
        email: &str,
    ) -> Result<Account, sqlx::Error> {
        let role = if self.super_admins.contains(email) {
            Role::God
        } else {
            Role::User
        };

        let account = Account::create(
            &mut *conn,
            CreateAccount {
                auth_subject: Some(assertion.subject.clone()),
                email: email.to_string(),
                name: merge_field(None, assertion.name.as_deref()),
                avatar_url: merge_field(None, assertion.avatar_url.as_deref()),
                role,
                status: AccountStatus::Active,
                tenant_id: Some(self.default_tenant_id),
            },
        )
        .await?;

        Membership::ensure(
            &mut *conn,
            CreateMembership {
                tenant_id: self.default_tenant_id,
                account_id: account.id,
                role: MembershipRole::Member,
            },
        )
        .await?;

        tracing::info!(
            account_id = %account.id,
            tenant_id = %self.default_tenant_id,
            role = role.as_str(),
            "provisioned account"
        );

        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;

    fn ghost(name: Option<&str>, avatar_url: Option<&str>) -> Account {
        Account {
            id: Uuid::new_v4(),
            auth_subject: None,
            email: "bob@x.com".to_string(),
            name: name.map(str::to_string),
            avatar_url: avatar_url.map(str::to_string),
            role: Role::User,
            status: AccountStatus::Pending,
            tenant_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn assertion(name: Option<&str>, avatar_url: Option<&str>) -> IdentityAssertion {
        IdentityAssertion {
            subject: "sub-42".to_string(),
            email: Some("bob@x.com".to_string()),
            name: name.map(str::to_string),
            avatar_url: avatar_url.map(str::to_string),
        }
    }

    struct StubIssuer {
        email: Option<String>,
    }

    #[async_trait]
    impl IdentityIssuer for StubIssuer {
        async fn verify(&self, _credential: &str) -> Result<IdentityAssertion, IssuerError> {
            Err(IssuerError::Invalid("stub".to_string()))
        }

        async fn lookup_subject(&self, subject: &str) -> Result<Option<IdentityAssertion>, IssuerError> {
            Ok(Some(IdentityAssertion {
                subject: subject.to_string(),
                email: self.email.clone(),
                name: None,
                avatar_url: None,
            }))
        }
    }

    #[test]
    fn test_merge_field_policy() {
        assert_eq!(merge_field(Some("Bob"), Some("Robert")), Some("Bob".to_string()));
        assert_eq!(merge_field(Some("Bob"), None), Some("Bob".to_string()));
        assert_eq!(merge_field(Some("Bob"), Some("")), Some("Bob".to_string()));
        assert_eq!(merge_field(None, Some("Robert")), Some("Robert".to_string()));
        assert_eq!(merge_field(Some(""), Some("Robert")), Some("Robert".to_string()));
        assert_eq!(merge_field(Some("  "), Some("")), None);
        assert_eq!(merge_field(None, None), None);
    }

    #[test]
    fn test_claim_sets_subject_and_fills_empty_fields() {
        let account = ghost(None, Some("https://img/custom.png"));
        let update = claim(&account, &assertion(Some("Bob"), Some("https://img/issuer.png")));

        assert_eq!(update.auth_subject, "sub-42");
        assert_eq!(update.name.as_deref(), Some("Bob"));
        assert_eq!(update.avatar_url.as_deref(), Some("https://img/custom.png"));
    }

    #[test]
    fn test_claim_never_erases_existing_values() {
        let account = ghost(Some("Bobby"), Some("https://img/custom.png"));
        let update = claim(&account, &assertion(None, Some("")));

        assert_eq!(update.name.as_deref(), Some("Bobby"));
        assert_eq!(update.avatar_url.as_deref(), Some("https://img/custom.png"));
    }

    #[test]
    fn test_placeholder_email() {
        assert_eq!(placeholder_email("sub-42"), "sub-42@placeholder");
        assert_eq!(placeholder_email("Sub-42"), "sub-42@placeholder");
    }

    #[test]
    fn test_credential_errors_are_unauthorized() {
        assert!(matches!(
            IdentityError::from(IssuerError::Expired),
            IdentityError::Unauthorized(_)
        ));
        assert!(matches!(
            IdentityError::from(IssuerError::Lookup("503".to_string())),
            IdentityError::Issuer(_)
        ));
    }

    #[tokio::test]
    async fn test_backfill_prefers_asserted_email() {
        let issuer = StubIssuer {
            email: Some("other@x.com".to_string()),
        };
        let mut a = assertion(None, None);
        a.email = Some("Bob@X.com".to_string());

        assert_eq!(backfill_email(&issuer, &a).await.unwrap(), "bob@x.com");
    }

    #[tokio::test]
    async fn test_backfill_uses_issuer_lookup() {
        let issuer = StubIssuer {
            email: Some("Bob@X.com".to_string()),
        };
        let a = IdentityAssertion::new("sub-42");

        assert_eq!(backfill_email(&issuer, &a).await.unwrap(), "bob@x.com");
    }

    #[tokio::test]
    async fn test_backfill_falls_back_to_placeholder() {
        let issuer = StubIssuer { email: None };
        let a = IdentityAssertion::new("sub-42");

        assert_eq!(backfill_email(&issuer, &a).await.unwrap(), "sub-42@placeholder");
    }
}
