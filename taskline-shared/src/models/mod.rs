/// Database models for Taskline
///
/// This module contains all database models and their CRUD operations.
/// Every operation is generic over [`sqlx::PgExecutor`] so it can run against
/// the pool or inside a caller's transaction (`&mut *tx`).
///
/// # Models
///
/// - `account`: People and invited (ghost) collaborators
/// - `tenant`: Organizations for multi-tenancy
/// - `membership`: Account-tenant relationships with roles
/// - `delegation`: Time-boxed admin grants
/// - `task`: Timeline tasks
/// - `task_assignment`: Direct task assignments
/// - `task_collaborator`: Per-task collaboration grants
///
/// # Example
///
/// ```no_run
/// use taskline_shared::models::account::{Account, normalize_email};
/// use taskline_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let email = normalize_email("Bob@Example.com");
/// let account = Account::find_by_email(&pool, &email).await?;
/// # Ok(())
/// # }
/// ```

pub mod account;
pub mod delegation;
pub mod membership;
pub mod task;
pub mod task_assignment;
pub mod task_collaborator;
pub mod tenant;
