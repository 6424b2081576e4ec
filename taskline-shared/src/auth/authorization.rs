/// Authorization checks
///
/// Role requirements for administrative operations and the single-task
/// access gate used by mutation routes.
///
/// # Task access gate
///
/// A caller may change a task when any of these holds:
///
/// 1. the effective role is `god`,
/// 2. the task's tenant is one of the caller's tenants (membership table or
///    the account's primary tenant),
/// 3. the caller holds a collaboration grant on that task.
///
/// This is the task-scoped counterpart of [`crate::visibility`]: it answers
/// for one task id without enumerating the visible set. Checks run cheapest
/// first and stop at the first match.
///
/// # Example
///
/// ```no_run
/// use taskline_shared::auth::authorization::require_task_access;
/// use taskline_shared::auth::role::EffectiveRole;
/// use taskline_shared::models::account::Role;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, account_id: Uuid, task_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// require_task_access(&pool, account_id, &EffectiveRole::stored(Role::User), task_id).await?;
/// # Ok(())
/// # }
/// ```

use sqlx::PgPool;
use uuid::Uuid;

use super::role::EffectiveRole;
use crate::models::membership::Membership;
use crate::models::task::Task;
use crate::models::task_assignment::TaskAssignment;
use crate::models::task_collaborator::TaskCollaborator;

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// Action exceeds the caller's effective role or access paths
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Referenced resource doesn't exist
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Requires the effective role to be `admin` or `god`
pub fn require_elevated(role: &EffectiveRole) -> Result<(), AuthzError> {
    if !role.is_elevated() {
        return Err(AuthzError::Forbidden("requires admin role".to_string()));
    }

    Ok(())
}

/// Requires the effective role to be `god`
pub fn require_god(role: &EffectiveRole) -> Result<(), AuthzError> {
    if !role.is_god() {
        return Err(AuthzError::Forbidden("requires god role".to_string()));
    }

    Ok(())
}

/// Decides the access gate from already-gathered facts
pub fn task_access_allowed(
    role: &EffectiveRole,
    task_tenant_id: Uuid,
    caller_tenant_ids: &[Uuid],
    is_collaborator: bool,
) -> bool {
    role.is_god() || caller_tenant_ids.contains(&task_tenant_id) || is_collaborator
}

/// Whether the caller may change the task
///
/// # Errors
///
/// - [`AuthzError::NotFound`] if the task doesn't exist
/// - [`AuthzError::Database`] on store failure
pub async fn can_access_task(
    pool: &PgPool,
    account_id: Uuid,
    role: &EffectiveRole,
    task_id: Uuid,
) -> Result<bool, AuthzError> {
    let task_tenant_id = Task::tenant_of(pool, task_id)
        .await?
        .ok_or(AuthzError::NotFound("Task"))?;

    if role.is_god() {
        return Ok(true);
    }

    let caller_tenant_ids = Membership::tenant_ids_for_account(pool, account_id).await?;
    if task_access_allowed(role, task_tenant_id, &caller_tenant_ids, false) {
        return Ok(true);
    }

    let is_collaborator = TaskCollaborator::exists(pool, task_id, account_id).await?;

    Ok(task_access_allowed(
        role,
        task_tenant_id,
        &caller_tenant_ids,
        is_collaborator,
    ))
}

/// Like [`can_access_task`], but fails on denial
///
/// A task the caller cannot see at all is reported as [`AuthzError::NotFound`],
/// the same as a missing task. A task the caller sees only as an assignee is
/// reported as [`AuthzError::Forbidden`].
pub async fn require_task_access(
    pool: &PgPool,
    account_id: Uuid,
    role: &EffectiveRole,
    task_id: Uuid,
) -> Result<(), AuthzError> {
    if can_access_task(pool, account_id, role, task_id).await? {
        return Ok(());
    }

    tracing::warn!(account_id = %account_id, task_id = %task_id, "task access denied");

    if TaskAssignment::exists(pool, task_id, account_id).await? {
        return Err(AuthzError::Forbidden(
            "assignees cannot change this task".to_string(),
        ));
    }

    Err(AuthzError::NotFound("Task"))
}
