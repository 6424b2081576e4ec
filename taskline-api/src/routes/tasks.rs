/// Task endpoints
///
/// Listing returns every task visible to the caller (see
/// [`taskline_shared::visibility`]). Every write to an existing task passes
/// the access gate first. A task the caller cannot see is `404`, whether or
/// not it exists; a task seen only as an assignee is `403`.
///
/// # Endpoints
///
/// - `GET /v1/tasks?project_id=&status=` - List visible tasks
/// - `POST /v1/tasks` - Create a task in the caller's tenant
/// - `PATCH /v1/tasks/:id` - Update a task
/// - `DELETE /v1/tasks/:id` - Delete a task
/// - `PUT /v1/tasks/:id/assignees` - Replace the assignment set
/// - `POST /v1/tasks/:id/collaborators` - Invite a collaborator by email
/// - `DELETE /v1/tasks/:id/collaborators/:account_id` - Remove a collaborator

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use taskline_shared::auth::authorization::require_task_access;
use taskline_shared::auth::context::AuthContext;
use taskline_shared::auth::identity::find_or_invite;
use taskline_shared::models::account::Account;
use taskline_shared::models::task::{CreateTask, Task, TaskStatus, UpdateTask};
use taskline_shared::models::task_assignment::TaskAssignment;
use taskline_shared::models::task_collaborator::{CollaboratorAccess, TaskCollaborator};
use taskline_shared::visibility::{list_visible_tasks, AccessSource, TaskFilter, VisibleTask};
use uuid::Uuid;
use validator::Validate;

/// Query parameters for listing tasks
///
/// Kept as raw strings so malformed values produce a descriptive 400.
#[derive(Debug, Default, Deserialize)]
pub struct ListTasksQuery {
    pub project_id: Option<String>,
    pub status: Option<String>,
}

/// List tasks response
#[derive(Debug, Serialize)]
pub struct ListTasksResponse {
    pub tasks: Vec<VisibleTask>,
    pub total: usize,
}

/// Create task request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 500, message = "Title must be 1-500 characters"))]
    pub title: String,

    pub description: Option<String>,

    #[serde(default)]
    pub status: TaskStatus,

    #[validate(length(max = 32, message = "Priority must be at most 32 characters"))]
    pub priority: Option<String>,

    pub due_date: Option<NaiveDate>,

    pub project_id: Option<Uuid>,

    /// Accounts to assign
    #[serde(default)]
    pub assigned_to: Vec<Uuid>,
}

/// Update task request; omitted fields are left unchanged
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 500, message = "Title must be 1-500 characters"))]
    pub title: Option<String>,

    pub description: Option<String>,

    pub status: Option<TaskStatus>,

    #[validate(length(max = 32, message = "Priority must be at most 32 characters"))]
    pub priority: Option<String>,

    pub due_date: Option<NaiveDate>,

    pub project_id: Option<Uuid>,
}

impl From<UpdateTaskRequest> for UpdateTask {
    fn from(req: UpdateTaskRequest) -> Self {
        UpdateTask {
            title: req.title,
            description: req.description,
            status: req.status,
            priority: req.priority,
            due_date: req.due_date,
            project_id: req.project_id,
        }
    }
}

/// Replace assignees request
#[derive(Debug, Deserialize)]
pub struct ReplaceAssigneesRequest {
    pub assigned_to: Vec<Uuid>,
}

/// Assignment set after replacement
#[derive(Debug, Serialize)]
pub struct AssigneesResponse {
    pub task_id: Uuid,
    pub assigned_to: Vec<Uuid>,
}

/// Collaboration invite request
#[derive(Debug, Deserialize, Validate)]
pub struct AddCollaboratorRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Display name used if a new account has to be provisioned
    #[validate(length(max = 200, message = "Name must be at most 200 characters"))]
    pub name: Option<String>,

    #[serde(default)]
    pub access: CollaboratorAccess,
}

/// Collaboration invite response
#[derive(Debug, Serialize)]
pub struct AddCollaboratorResponse {
    #[serde(flatten)]
    pub collaborator: TaskCollaborator,

    pub email: String,

    /// Whether a ghost account was provisioned for the email
    pub invited: bool,
}

/// Sorted, de-duplicated copy of `ids`
fn dedup_ids(ids: &[Uuid]) -> Vec<Uuid> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Fails unless every id names an existing account
async fn ensure_accounts_exist(db: &PgPool, ids: &[Uuid]) -> ApiResult<()> {
    if ids.is_empty() {
        return Ok(());
    }

    let found = Account::count_existing(db, ids).await?;
    if usize::try_from(found).unwrap_or(0) != ids.len() {
        return Err(ApiError::BadRequest(
            "assigned_to contains unknown accounts".to_string(),
        ));
    }

    Ok(())
}

/// List visible tasks
///
/// # Response
///
/// ```json
/// {
///   "tasks": [
///     { "id": "...", "title": "Plan launch", "access_source": "owner", "is_owner": true, "assigned_to": [] }
///   ],
///   "total": 1
/// }
/// ```
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<ListTasksQuery>,
) -> ApiResult<Json<ListTasksResponse>> {
    let filter = TaskFilter::parse(query.project_id.as_deref(), query.status.as_deref())?;

    let tasks = list_visible_tasks(&state.db, ctx.account_id(), &ctx.role, &filter).await?;

    Ok(Json(ListTasksResponse {
        total: tasks.len(),
        tasks,
    }))
}

/// Create a task in the caller's primary tenant
///
/// The task and its assignments are written in one transaction.
pub async fn create_task(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<VisibleTask>)> {
    req.validate()?;

    let tenant_id = ctx
        .tenant_id()
        .ok_or_else(|| ApiError::BadRequest("Caller has no tenant".to_string()))?;

    let assignees = dedup_ids(&req.assigned_to);
    ensure_accounts_exist(&state.db, &assignees).await?;

    let mut tx = state.db.begin().await?;

    let task = Task::create(
        &mut *tx,
        CreateTask {
            tenant_id,
            created_by: ctx.account_id(),
            title: req.title,
            description: req.description,
            status: req.status,
            priority: req.priority,
            due_date: req.due_date,
            project_id: req.project_id,
        },
    )
    .await?;

    TaskAssignment::insert_many(&mut *tx, task.id, &assignees).await?;

    tx.commit().await?;

    tracing::info!(
        task_id = %task.id,
        tenant_id = %tenant_id,
        account_id = %ctx.account_id(),
        assignees = assignees.len(),
        "task created"
    );

    let access_source = if ctx.is_god() {
        AccessSource::God
    } else {
        AccessSource::for_membership(&task, ctx.account_id())
    };

    Ok((
        StatusCode::CREATED,
        Json(VisibleTask {
            is_owner: true,
            access_source,
            assigned_to: assignees,
            task,
        }),
    ))
}

/// Update a task
pub async fn update_task(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<Task>> {
    req.validate()?;
    require_task_access(&state.db, ctx.account_id(), &ctx.role, task_id).await?;

    let update = UpdateTask::from(req);
    if update.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    let task = Task::update(&state.db, task_id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    tracing::info!(task_id = %task_id, account_id = %ctx.account_id(), "task updated");

    Ok(Json(task))
}

/// Delete a task
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_task_access(&state.db, ctx.account_id(), &ctx.role, task_id).await?;

    if !Task::delete(&state.db, task_id).await? {
        return Err(ApiError::NotFound("Task not found".to_string()));
    }

    tracing::info!(task_id = %task_id, account_id = %ctx.account_id(), "task deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Replace a task's assignment set
pub async fn replace_assignees(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<ReplaceAssigneesRequest>,
) -> ApiResult<Json<AssigneesResponse>> {
    require_task_access(&state.db, ctx.account_id(), &ctx.role, task_id).await?;

    let assignees = dedup_ids(&req.assigned_to);
    ensure_accounts_exist(&state.db, &assignees).await?;

    let mut tx = state.db.begin().await?;
    TaskAssignment::replace(&mut *tx, task_id, &assignees).await?;
    tx.commit().await?;

    tracing::info!(task_id = %task_id, assignees = assignees.len(), "assignees replaced");

    Ok(Json(AssigneesResponse {
        task_id,
        assigned_to: assignees,
    }))
}

/// Invite a collaborator by email
///
/// Unknown emails get a ghost account that is claimed on first login.
///
/// # Request
///
/// ```json
/// { "email": "bob@x.com", "access": "paid" }
/// ```
pub async fn add_collaborator(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<AddCollaboratorRequest>,
) -> ApiResult<(StatusCode, Json<AddCollaboratorResponse>)> {
    req.validate()?;
    require_task_access(&state.db, ctx.account_id(), &ctx.role, task_id).await?;

    let mut tx = state.db.begin().await?;

    let (account, invited) = find_or_invite(&mut *tx, &req.email, req.name, None).await?;
    let collaborator = TaskCollaborator::upsert(
        &mut *tx,
        task_id,
        account.id,
        req.access,
        Some(ctx.account_id()),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        task_id = %task_id,
        collaborator_id = %account.id,
        invited_by = %ctx.account_id(),
        invited,
        "collaborator added"
    );

    Ok((
        StatusCode::CREATED,
        Json(AddCollaboratorResponse {
            collaborator,
            email: account.email,
            invited,
        }),
    ))
}

/// Remove a collaborator
pub async fn remove_collaborator(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path((task_id, account_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    require_task_access(&state.db, ctx.account_id(), &ctx.role, task_id).await?;

    if !TaskCollaborator::remove(&state.db, task_id, account_id).await? {
        return Err(ApiError::NotFound("Collaborator not found".to_string()));
    }

    tracing::info!(task_id = %task_id, collaborator_id = %account_id, "collaborator removed");

    Ok(StatusCode::NO_CONTENT)
}
