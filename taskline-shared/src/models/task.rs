/// Task model and database operations
///
/// Tasks are the unit of work tracked on the timeline. Every task belongs to
/// exactly one tenant and has exactly one creator. Who may *see* a task is
/// decided by [`crate::visibility`]; who may *change* one by
/// [`crate::auth::authorization`].
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('todo', 'doing', 'paused', 'done');
///
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
///     created_by UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
///     title VARCHAR(500) NOT NULL,
///     description TEXT,
///     status task_status NOT NULL DEFAULT 'todo',
///     priority VARCHAR(32),
///     due_date DATE,
///     project_id UUID,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use taskline_shared::models::task::{Task, CreateTask, TaskStatus};
/// use taskline_shared::db::pool::{create_pool, DatabaseConfig};
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let task = Task::create(&pool, CreateTask {
///     tenant_id: Uuid::new_v4(),
///     created_by: Uuid::new_v4(),
///     title: "Ship v2".to_string(),
///     description: None,
///     status: TaskStatus::Todo,
///     priority: Some("1".to_string()),
///     due_date: None,
///     project_id: None,
/// }).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Task progress status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Not started
    Todo,

    /// In progress
    Doing,

    /// On hold
    Paused,

    /// Finished
    Done,
}

impl TaskStatus {
    /// Converts status to string for display
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::Doing => "doing",
            TaskStatus::Paused => "paused",
            TaskStatus::Done => "done",
        }
    }

    /// Parses status from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "todo" => Some(TaskStatus::Todo),
            "doing" => Some(TaskStatus::Doing),
            "paused" => Some(TaskStatus::Paused),
            "done" => Some(TaskStatus::Done),
            _ => None,
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Todo
    }
}

/// Task row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    /// Unique task ID
    pub id: Uuid,

    /// Tenant this task belongs to
    pub tenant_id: Uuid,

    /// Account that created the task
    pub created_by: Uuid,

    /// Short title
    pub title: String,

    /// Optional long description
    pub description: Option<String>,

    /// Progress status
    pub status: TaskStatus,

    /// Free-form priority; numeric values sort ascending
    pub priority: Option<String>,

    /// Optional due date
    pub due_date: Option<NaiveDate>,

    /// Optional project grouping
    pub project_id: Option<Uuid>,

    /// When the task was created
    pub created_at: DateTime<Utc>,

    /// When the task was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTask {
    /// Tenant ID
    pub tenant_id: Uuid,

    /// Creator
    pub created_by: Uuid,

    /// Title
    pub title: String,

    /// Description
    pub description: Option<String>,

    /// Initial status
    #[serde(default)]
    pub status: TaskStatus,

    /// Priority
    pub priority: Option<String>,

    /// Due date
    pub due_date: Option<NaiveDate>,

    /// Project grouping
    pub project_id: Option<Uuid>,
}

/// Input for updating a task
///
/// Only fields that are `Some` are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTask {
    /// New title
    pub title: Option<String>,

    /// New description
    pub description: Option<String>,

    /// New status
    pub status: Option<TaskStatus>,

    /// New priority
    pub priority: Option<String>,

    /// New due date
    pub due_date: Option<NaiveDate>,

    /// New project grouping
    pub project_id: Option<Uuid>,
}

impl UpdateTask {
    /// Whether the update would write nothing
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.project_id.is_none()
    }
}

const TASK_COLUMNS: &str = "id, tenant_id, created_by, title, description, status, priority, \
                            due_date, project_id, created_at, updated_at";

impl Task {
    /// Creates a new task
    ///
    /// # Errors
    ///
    /// Returns an error if the tenant or creator doesn't exist, or the
    /// database operation fails.
    pub async fn create<'e, E>(executor: E, data: CreateTask) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (tenant_id, created_by, title, description, status, priority,
                               due_date, project_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, tenant_id, created_by, title, description, status, priority,
                      due_date, project_id, created_at, updated_at
            "#,
        )
        .bind(data.tenant_id)
        .bind(data.created_by)
        .bind(data.title)
        .bind(data.description)
        .bind(data.status)
        .bind(data.priority)
        .bind(data.due_date)
        .bind(data.project_id)
        .fetch_one(executor)
        .await?;

        Ok(task)
    }

    /// Finds a task by ID
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let task = sqlx::query_as::<_, Task>(&format!(
            "SELECT {} FROM tasks WHERE id = $1",
            TASK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(task)
    }

    /// Returns the tenant a task belongs to, or `None` if the task doesn't exist
    pub async fn tenant_of<'e, E>(executor: E, id: Uuid) -> Result<Option<Uuid>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let tenant_id: Option<Uuid> = sqlx::query_scalar("SELECT tenant_id FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(tenant_id)
    }

    /// Applies a partial update
    ///
    /// Returns the updated task, or `None` if it doesn't exist.
    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        data: UpdateTask,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let mut query = String::from("UPDATE tasks SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.title.is_some() {
            bind_count += 1;
            query.push_str(&format!(", title = ${}", bind_count));
        }
        if data.description.is_some() {
            bind_count += 1;
            query.push_str(&format!(", description = ${}", bind_count));
        }
        if data.status.is_some() {
            bind_count += 1;
            query.push_str(&format!(", status = ${}", bind_count));
        }
        if data.priority.is_some() {
            bind_count += 1;
            query.push_str(&format!(", priority = ${}", bind_count));
        }
        if data.due_date.is_some() {
            bind_count += 1;
            query.push_str(&format!(", due_date = ${}", bind_count));
        }
        if data.project_id.is_some() {
            bind_count += 1;
            query.push_str(&format!(", project_id = ${}", bind_count));
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {}", TASK_COLUMNS));

        let mut q = sqlx::query_as::<_, Task>(&query).bind(id);

        if let Some(title) = data.title {
            q = q.bind(title);
        }
        if let Some(description) = data.description {
            q = q.bind(description);
        }
        if let Some(status) = data.status {
            q = q.bind(status);
        }
        if let Some(priority) = data.priority {
            q = q.bind(priority);
        }
        if let Some(due_date) = data.due_date {
            q = q.bind(due_date);
        }
        if let Some(project_id) = data.project_id {
            q = q.bind(project_id);
        }

        let task = q.fetch_optional(executor).await?;

        Ok(task)
    }

    /// Lists every task in the system
    ///
    /// Only the `god` access path uses this.
    pub async fn list_all<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let tasks = sqlx::query_as::<_, Task>(&format!(
            "SELECT {} FROM tasks ORDER BY created_at DESC",
            TASK_COLUMNS
        ))
        .fetch_all(executor)
        .await?;

        Ok(tasks)
    }

    /// Lists the tasks of any of the given tenants
    pub async fn list_by_tenants<'e, E>(
        executor: E,
        tenant_ids: &[Uuid],
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        if tenant_ids.is_empty() {
            return Ok(Vec::new());
        }

        let tasks = sqlx::query_as::<_, Task>(&format!(
            "SELECT {} FROM tasks WHERE tenant_id = ANY($1) ORDER BY created_at DESC",
            TASK_COLUMNS
        ))
        .bind(tenant_ids)
        .fetch_all(executor)
        .await?;

        Ok(tasks)
    }

    /// Lists tasks the account is directly assigned to
    pub async fn list_assigned_to<'e, E>(
        executor: E,
        account_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let tasks = sqlx::query_as::<_, Task>(
            r#"
            SELECT t.id, t.tenant_id, t.created_by, t.title, t.description, t.status,
                   t.priority, t.due_date, t.project_id, t.created_at, t.updated_at
            FROM tasks t
            JOIN task_assignments a ON a.task_id = t.id
            WHERE a.account_id = $1
            ORDER BY t.created_at DESC
            "#,
        )
        .bind(account_id)
        .fetch_all(executor)
        .await?;

        Ok(tasks)
    }

    /// Deletes a task
    ///
    /// ⚠️  This also deletes its assignments and collaborator grants due to CASCADE.
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
