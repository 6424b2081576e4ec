/// Super-admin allow-list
///
/// A configured set of email addresses whose accounts always hold the `god`
/// role. Membership is checked case-insensitively. Evaluating an allow-listed
/// account whose stored role has drifted writes `god` back to the row
/// ("self-heal"); the write is conditional, so it happens at most once.

use std::collections::HashSet;

use sqlx::PgExecutor;

use crate::models::account::{normalize_email, Account, Role};

/// Configured super-admin emails
#[derive(Debug, Clone, Default)]
pub struct SuperAdminList {
    emails: HashSet<String>,
}

impl SuperAdminList {
    /// Builds the list from any iterator of emails
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let emails = emails
            .into_iter()
            .map(|email| normalize_email(email.as_ref()))
            .filter(|email| !email.is_empty())
            .collect();

        Self { emails }
    }

    /// Parses a comma-separated list (the `SUPER_ADMIN_EMAILS` format)
    pub fn from_csv(value: &str) -> Self {
        Self::new(value.split(','))
    }

    /// Whether `email` is allow-listed
    pub fn contains(&self, email: &str) -> bool {
        self.emails.contains(&normalize_email(email))
    }

    /// Number of configured emails
    pub fn len(&self) -> usize {
        self.emails.len()
    }

    /// Whether no emails are configured
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

/// Promotes an allow-listed account to `god` if its stored role differs
///
/// Updates `account` in place and returns true when a write happened.
pub async fn heal_super_admin<'e, E>(
    executor: E,
    account: &mut Account,
    super_admins: &SuperAdminList,
) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    if account.role == Role::God || !super_admins.contains(&account.email) {
        return Ok(false);
    }

    let changed = Account::promote_to_god(executor, account.id).await?;
    account.role = Role::God;

    if changed {
        tracing::info!(account_id = %account.id, "promoted allow-listed account to god");
    }

    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_case_insensitive() {
        let list = SuperAdminList::new(["Root@Example.com", "ops@example.com"]);

        assert!(list.contains("root@example.com"));
        assert!(list.contains("  OPS@example.com"));
        assert!(!list.contains("bob@example.com"));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_from_csv_skips_blanks() {
        let list = SuperAdminList::from_csv("a@x.com, ,b@x.com,");

        assert_eq!(list.len(), 2);
        assert!(list.contains("b@x.com"));
    }

    #[test]
    fn test_empty_list() {
        let list = SuperAdminList::from_csv("");

        assert!(list.is_empty());
        assert!(!list.contains(""));
    }
}
