/// Task visibility resolution
///
/// Produces the set of tasks an account may read. A task can be reachable
/// through several independent access paths:
///
/// | Path | Holds when | Tag |
/// |------|------------|-----|
/// | god override | effective role is `god` | `god` |
/// | tenant membership | task's tenant is one of the account's tenants | `owner` / `member` |
/// | collaboration grant | account holds a grant on the task | `collaborator_free` / `collaborator_paid` |
/// | direct assignment | account is in the task's assignment list | `assignee` |
///
/// The result is the union of all paths with duplicates collapsed by task id.
/// A task reached more than once is tagged with its highest-precedence path,
/// in table order (god first, assignment last). `is_owner` is computed
/// separately as `created_by == account_id` and never depends on the tag.
///
/// After the union, results are filtered (project, status), enriched with
/// each task's assignees, and ordered by due date ascending (undated last)
/// with numeric priority as tie-break (missing or non-numeric last).
///
/// # Example
///
/// ```no_run
/// use taskline_shared::visibility::{list_visible_tasks, TaskFilter};
/// use taskline_shared::auth::role::EffectiveRole;
/// use taskline_shared::models::account::Role;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, account_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let filter = TaskFilter::parse(None, Some("doing"))?;
/// let tasks = list_visible_tasks(&pool, account_id, &EffectiveRole::stored(Role::User), &filter).await?;
///
/// for task in tasks {
///     println!("{} via {:?} (owner: {})", task.task.title, task.access_source, task.is_owner);
/// }
/// # Ok(())
/// # }
/// ```

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::role::EffectiveRole;
use crate::models::membership::Membership;
use crate::models::task::{Task, TaskStatus};
use crate::models::task_assignment::TaskAssignment;
use crate::models::task_collaborator::{CollaboratorAccess, TaskCollaborator};

/// Error type for visibility resolution
#[derive(Debug, thiserror::Error)]
pub enum VisibilityError {
    /// A filter value could not be parsed
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Why a task is visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessSource {
    /// Super-admin override
    God,

    /// Tenant membership, and the account created the task
    Owner,

    /// Tenant membership
    Member,

    /// Free-tier collaboration grant
    CollaboratorFree,

    /// Paid collaboration grant
    CollaboratorPaid,

    /// Direct assignment
    Assignee,
}

impl AccessSource {
    /// Rank used to pick one tag per task; lower wins
    pub fn precedence(&self) -> u8 {
        match self {
            AccessSource::God => 0,
            AccessSource::Owner | AccessSource::Member => 1,
            AccessSource::CollaboratorFree | AccessSource::CollaboratorPaid => 2,
            AccessSource::Assignee => 3,
        }
    }

    /// Tag for a task reached through tenant membership
    pub fn for_membership(task: &Task, account_id: Uuid) -> Self {
        if task.created_by == account_id {
            AccessSource::Owner
        } else {
            AccessSource::Member
        }
    }

    /// Tag for a task reached through a collaboration grant
    pub fn for_collaboration(access: CollaboratorAccess) -> Self {
        match access {
            CollaboratorAccess::Free => AccessSource::CollaboratorFree,
            CollaboratorAccess::Paid => AccessSource::CollaboratorPaid,
        }
    }

    /// Converts source to its wire string
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessSource::God => "god",
            AccessSource::Owner => "owner",
            AccessSource::Member => "member",
            AccessSource::CollaboratorFree => "collaborator_free",
            AccessSource::CollaboratorPaid => "collaborator_paid",
            AccessSource::Assignee => "assignee",
        }
    }
}

/// A task reached through one access path
#[derive(Debug, Clone)]
pub struct AccessPath {
    pub task: Task,
    pub source: AccessSource,
}

/// A task as returned to a viewer
#[derive(Debug, Clone, Serialize)]
pub struct VisibleTask {
    #[serde(flatten)]
    pub task: Task,

    /// Highest-precedence path that reached the task
    pub access_source: AccessSource,

    /// Whether the viewer created the task
    pub is_owner: bool,

    /// Directly assigned account IDs
    pub assigned_to: Vec<Uuid>,
}

/// Optional constraints on the visible set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskFilter {
    /// Only tasks in this project
    pub project_id: Option<Uuid>,

    /// Only tasks with this status
    pub status: Option<TaskStatus>,
}

impl TaskFilter {
    /// Parses raw query values; empty strings mean "no constraint"
    ///
    /// # Errors
    ///
    /// [`VisibilityError::InvalidFilter`] for a malformed project id or
    /// unknown status.
    pub fn parse(project_id: Option<&str>, status: Option<&str>) -> Result<Self, VisibilityError> {
        let project_id = match project_id.map(str::trim).filter(|v| !v.is_empty()) {
            Some(raw) => Some(Uuid::parse_str(raw).map_err(|_| {
                VisibilityError::InvalidFilter(format!("project_id '{}' is not a UUID", raw))
            })?),
            None => None,
        };

        let status = match status.map(str::trim).filter(|v| !v.is_empty()) {
            Some(raw) => Some(TaskStatus::from_str(raw).ok_or_else(|| {
                VisibilityError::InvalidFilter(format!("unknown status '{}'", raw))
            })?),
            None => None,
        };

        Ok(Self { project_id, status })
    }

    /// Whether a task satisfies every constraint
    pub fn matches(&self, task: &Task) -> bool {
        self.project_id.map_or(true, |p| task.project_id == Some(p))
            && self.status.map_or(true, |s| task.status == s)
    }
}

/// Collapses paths to one per task, keeping the highest-precedence tag
pub fn union_access_paths<I>(paths: I) -> Vec<AccessPath>
where
    I: IntoIterator<Item = AccessPath>,
{
    let mut by_task: HashMap<Uuid, AccessPath> = HashMap::new();

    for path in paths {
        match by_task.get(&path.task.id) {
            Some(existing) if existing.source.precedence() <= path.source.precedence() => {}
            _ => {
                by_task.insert(path.task.id, path);
            }
        }
    }

    by_task.into_values().collect()
}

/// Numeric rank of a priority value; `None` for missing or non-numeric values
pub fn priority_rank(priority: Option<&str>) -> Option<i64> {
    priority.and_then(|p| p.trim().parse::<i64>().ok())
}

fn none_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Display order: due date ascending, then priority ascending, then creation
pub fn compare_for_display(a: &Task, b: &Task) -> Ordering {
    none_last(a.due_date, b.due_date)
        .then_with(|| {
            none_last(
                priority_rank(a.priority.as_deref()),
                priority_rank(b.priority.as_deref()),
            )
        })
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Turns gathered access paths into the final, ordered result
///
/// Pure post-processing: union, filter, assignee enrichment, ordering.
pub fn assemble(
    paths: Vec<AccessPath>,
    account_id: Uuid,
    filter: &TaskFilter,
    assignees: &HashMap<Uuid, Vec<Uuid>>,
) -> Vec<VisibleTask> {
    let mut tasks: Vec<VisibleTask> = union_access_paths(paths)
        .into_iter()
        .filter(|path| filter.matches(&path.task))
        .map(|path| VisibleTask {
            is_owner: path.task.created_by == account_id,
            assigned_to: assignees.get(&path.task.id).cloned().unwrap_or_default(),
            access_source: path.source,
            task: path.task,
        })
        .collect();

    tasks.sort_by(|a, b| compare_for_display(&a.task, &b.task));
    tasks
}

/// Gathers every access path for a non-god account
async fn gather_paths(pool: &PgPool, account_id: Uuid) -> Result<Vec<AccessPath>, sqlx::Error> {
    let membership = async {
        let tenant_ids = Membership::tenant_ids_for_account(pool, account_id).await?;
        Task::list_by_tenants(pool, &tenant_ids).await
    };
    let collaboration = TaskCollaborator::list_tasks_for_account(pool, account_id);
    let assignment = Task::list_assigned_to(pool, account_id);

    let (member_tasks, collaborated, assigned) =
        tokio::try_join!(membership, collaboration, assignment)?;

    let membership_paths = member_tasks.into_iter().map(|task| AccessPath {
        source: AccessSource::for_membership(&task, account_id),
        task,
    });
    let collaboration_paths = collaborated.into_iter().map(|row| AccessPath {
        source: AccessSource::for_collaboration(row.access),
        task: row.task,
    });
    let assignment_paths = assigned.into_iter().map(|task| AccessPath {
        source: AccessSource::Assignee,
        task,
    });

    Ok(membership_paths
        .chain(collaboration_paths)
        .chain(assignment_paths)
        .collect())
}

/// Lists the tasks visible to an account
///
/// An account with no memberships, grants or assignments gets an empty list.
pub async fn list_visible_tasks(
    pool: &PgPool,
    account_id: Uuid,
    role: &EffectiveRole,
    filter: &TaskFilter,
) -> Result<Vec<VisibleTask>, VisibilityError> {
    let paths: Vec<AccessPath> = if role.is_god() {
        Task::list_all(pool)
            .await?
            .into_iter()
            .map(|task| AccessPath {
                task,
                source: AccessSource::God,
            })
            .collect()
    } else {
        gather_paths(pool, account_id).await?
    };

    let task_ids: Vec<Uuid> = paths
        .iter()
        .filter(|path| filter.matches(&path.task))
        .map(|path| path.task.id)
        .collect();
    let assignees = TaskAssignment::assignees_by_task(pool, &task_ids).await?;

    let tasks = assemble(paths, account_id, filter, &assignees);

    tracing::debug!(account_id = %account_id, count = tasks.len(), "resolved visible tasks");

    Ok(tasks)
}
