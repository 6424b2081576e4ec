/// Task collaborator model and database operations
///
/// An explicit, per-task collaboration grant. It is independent of tenant
/// membership: a collaborator from another tenant (or a ghost account that
/// has never logged in) can be granted access to a single task.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE collaborator_access AS ENUM ('free', 'paid');
///
/// CREATE TABLE task_collaborators (
///     task_id UUID NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
///     account_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
///     access collaborator_access NOT NULL DEFAULT 'free',
///     invited_by UUID REFERENCES accounts(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (task_id, account_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::task::Task;

/// Access level carried by a collaboration grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "collaborator_access", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CollaboratorAccess {
    /// Free-tier collaborator
    Free,

    /// Paid-seat collaborator
    Paid,
}

impl Default for CollaboratorAccess {
    fn default() -> Self {
        CollaboratorAccess::Free
    }
}

/// Collaboration grant row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskCollaborator {
    /// Task ID
    pub task_id: Uuid,

    /// Collaborating account
    pub account_id: Uuid,

    /// Access level
    pub access: CollaboratorAccess,

    /// Account that issued the invite
    pub invited_by: Option<Uuid>,

    /// When the grant was created
    pub created_at: DateTime<Utc>,
}

/// A task reached through a collaboration grant, with the grant's access level
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CollaboratedTask {
    #[sqlx(flatten)]
    pub task: Task,

    pub access: CollaboratorAccess,
}

impl TaskCollaborator {
    /// Creates a grant, or updates the access level of an existing one
    pub async fn upsert<'e, E>(
        executor: E,
        task_id: Uuid,
        account_id: Uuid,
        access: CollaboratorAccess,
        invited_by: Option<Uuid>,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let grant = sqlx::query_as::<_, TaskCollaborator>(
            r#"
            INSERT INTO task_collaborators (task_id, account_id, access, invited_by)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (task_id, account_id)
            DO UPDATE SET access = EXCLUDED.access
            RETURNING task_id, account_id, access, invited_by, created_at
            "#,
        )
        .bind(task_id)
        .bind(account_id)
        .bind(access)
        .bind(invited_by)
        .fetch_one(executor)
        .await?;

        Ok(grant)
    }

    /// Removes a grant
    ///
    /// Returns true if a grant was removed.
    pub async fn remove<'e, E>(executor: E, task_id: Uuid, account_id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result =
            sqlx::query("DELETE FROM task_collaborators WHERE task_id = $1 AND account_id = $2")
                .bind(task_id)
                .bind(account_id)
                .execute(executor)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Whether the account holds a grant on the task
    pub async fn exists<'e, E>(executor: E, task_id: Uuid, account_id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM task_collaborators WHERE task_id = $1 AND account_id = $2
            )
            "#,
        )
        .bind(task_id)
        .bind(account_id)
        .fetch_one(executor)
        .await?;

        Ok(exists)
    }

    /// Lists the tasks the account collaborates on, with the access level of each grant
    pub async fn list_tasks_for_account<'e, E>(
        executor: E,
        account_id: Uuid,
    ) -> Result<Vec<CollaboratedTask>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let rows = sqlx::query_as::<_, CollaboratedTask>(
            r#"
            SELECT t.id, t.tenant_id, t.created_by, t.title, t.description, t.status,
                   t.priority, t.due_date, t.project_id, t.created_at, t.updated_at,
                   c.access
            FROM tasks t
            JOIN task_collaborators c ON c.task_id = t.id
            WHERE c.account_id = $1
            ORDER BY t.created_at DESC
            "#,
        )
        .bind(account_id)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }
}
