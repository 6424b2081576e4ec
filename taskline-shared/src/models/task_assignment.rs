/// Task assignment model and database operations
///
/// Direct assignment of accounts to a task. Assignment is one of the access
/// paths that make a task visible.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE task_assignments (
///     task_id UUID NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
///     account_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (task_id, account_id)
/// );
/// ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

/// Assignment row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskAssignment {
    /// Task ID
    pub task_id: Uuid,

    /// Assigned account
    pub account_id: Uuid,

    /// When the assignment was made
    pub created_at: DateTime<Utc>,
}

impl TaskAssignment {
    /// Inserts assignments for a task, ignoring ones that already exist
    ///
    /// Callers creating a task run this on the same transaction as the
    /// task insert.
    pub async fn insert_many<'e, E>(
        executor: E,
        task_id: Uuid,
        account_ids: &[Uuid],
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        if account_ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO task_assignments (task_id, account_id)
            SELECT $1, UNNEST($2::UUID[])
            ON CONFLICT (task_id, account_id) DO NOTHING
            "#,
        )
        .bind(task_id)
        .bind(account_ids)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Replaces the full assignment set of a task
    ///
    /// Takes a connection rather than a generic executor because it issues
    /// two statements; pass `&mut *tx` to keep both in one transaction.
    pub async fn replace(
        conn: &mut PgConnection,
        task_id: Uuid,
        account_ids: &[Uuid],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM task_assignments WHERE task_id = $1")
            .bind(task_id)
            .execute(&mut *conn)
            .await?;

        Self::insert_many(&mut *conn, task_id, account_ids).await?;

        Ok(())
    }

    /// Whether the account is assigned to the task
    pub async fn exists<'e, E>(executor: E, task_id: Uuid, account_id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM task_assignments WHERE task_id = $1 AND account_id = $2)",
        )
        .bind(task_id)
        .bind(account_id)
        .fetch_one(executor)
        .await?;

        Ok(exists)
    }

    /// Loads the assignees of many tasks at once, keyed by task ID
    ///
    /// Tasks without assignments are absent from the map.
    pub async fn assignees_by_task<'e, E>(
        executor: E,
        task_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Uuid>>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        if task_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, TaskAssignment>(
            r#"
            SELECT task_id, account_id, created_at
            FROM task_assignments
            WHERE task_id = ANY($1)
            ORDER BY created_at ASC, account_id ASC
            "#,
        )
        .bind(task_ids)
        .fetch_all(executor)
        .await?;

        Ok(group_by_task(rows))
    }
}

fn group_by_task(rows: Vec<TaskAssignment>) -> HashMap<Uuid, Vec<Uuid>> {
    let mut grouped: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for row in rows {
        grouped.entry(row.task_id).or_default().push(row.account_id);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_by_task_keeps_row_order() {
        let task_a = Uuid::new_v4();
        let task_b = Uuid::new_v4();
        let (x, y, z) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let row = |task_id, account_id| TaskAssignment {
            task_id,
            account_id,
            created_at: Utc::now(),
        };

        let grouped = group_by_task(vec![row(task_a, x), row(task_b, z), row(task_a, y)]);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[&task_a], vec![x, y]);
        assert_eq!(grouped[&task_b], vec![z]);
    }
}
