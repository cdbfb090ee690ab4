//! Task storage
//!
//! [`TaskStore`] mirrors the identity store: an in-memory implementation for
//! single-process deployments and a PostgreSQL one sharing the identity pool.

use super::models::{Task, TaskStatus};
use crate::auth::repository::{map_sqlx_error, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// All tasks, oldest first
    async fn list(&self) -> Result<Vec<Task>, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Task>, StoreError>;

    async fn insert(&self, task: Task) -> Result<Task, StoreError>;

    /// Replace every field of an existing task except `id` and `created_at`
    ///
    /// Fails with `NotFound` when no task has this id.
    async fn update(&self, task: &Task) -> Result<(), StoreError>;

    /// Fails with `NotFound` when no task has this id.
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<Uuid, Task>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn list(&self) -> Result<Vec<Task>, StoreError> {
        let mut tasks: Vec<Task> = self.tasks.read().await.values().cloned().collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(tasks)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn insert(&self, task: Task) -> Result<Task, StoreError> {
        self.tasks.write().await.insert(task.id, task.clone());
        Ok(task)
    }

    async fn update(&self, task: &Task) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        let stored = tasks.get_mut(&task.id).ok_or(StoreError::NotFound)?;
        stored.title = task.title.clone();
        stored.description = task.description.clone();
        stored.due_date = task.due_date;
        stored.status = task.status;
        stored.updated_at = task.updated_at;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.tasks
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}

// ============================================================================
// PostgreSQL store
// ============================================================================

const CREATE_TASKS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id UUID PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        due_date DATE,
        status TEXT NOT NULL CHECK (status IN ('pending', 'in_progress', 'completed')),
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
"#;

#[derive(Debug, sqlx::FromRow)]
struct TaskRecord {
    id: Uuid,
    title: String,
    description: String,
    due_date: Option<NaiveDate>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRecord> for Task {
    type Error = StoreError;

    fn try_from(record: TaskRecord) -> Result<Self, Self::Error> {
        let status = record
            .status
            .parse::<TaskStatus>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        Ok(Task {
            id: record.id,
            title: record.title,
            description: record.description,
            due_date: record.due_date,
            status,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

/// PostgreSQL-backed task store
#[derive(Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `tasks` table if it does not exist yet
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TASKS_TABLE)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn list(&self) -> Result<Vec<Task>, StoreError> {
        let records = sqlx::query_as::<_, TaskRecord>(
            r#"
            SELECT id, title, description, due_date, status, created_at, updated_at
            FROM tasks
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        records.into_iter().map(Task::try_from).collect()
    }

    async fn get(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        let record = sqlx::query_as::<_, TaskRecord>(
            r#"
            SELECT id, title, description, due_date, status, created_at, updated_at
            FROM tasks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        record.map(Task::try_from).transpose()
    }

    async fn insert(&self, task: Task) -> Result<Task, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO tasks (id, title, description, due_date, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.due_date)
        .bind(task.status.as_str())
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(task)
    }

    async fn update(&self, task: &Task) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET title = $1, description = $2, due_date = $3, status = $4, updated_at = $5
            WHERE id = $6
            "#,
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.due_date)
        .bind(task.status.as_str())
        .bind(task.updated_at)
        .bind(task.id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn task(title: &str, created_at: DateTime<Utc>) -> Task {
        Task::new(
            title.to_string(),
            String::new(),
            None,
            TaskStatus::Pending,
            created_at,
        )
    }

    #[tokio::test]
    async fn test_insert_get_and_list_order() {
        let store = InMemoryTaskStore::new();
        let base = Utc::now();
        let later = store.insert(task("later", base + Duration::seconds(5))).await.unwrap();
        let earlier = store.insert(task("earlier", base)).await.unwrap();

        assert_eq!(store.get(later.id).await.unwrap(), Some(later.clone()));
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());

        let titles: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec![earlier.title, later.title]);
    }

    #[tokio::test]
    async fn test_update_keeps_creation_time() {
        let store = InMemoryTaskStore::new();
        let original = store.insert(task("draft", Utc::now())).await.unwrap();

        let mut changed = original.clone();
        changed.title = "final".to_string();
        changed.status = TaskStatus::Completed;
        changed.created_at = original.created_at + Duration::days(1);
        changed.updated_at = original.updated_at + Duration::minutes(3);
        store.update(&changed).await.unwrap();

        let stored = store.get(original.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "final");
        assert_eq!(stored.status, TaskStatus::Completed);
        assert_eq!(stored.created_at, original.created_at);
        assert_eq!(stored.updated_at, changed.updated_at);
    }

    #[tokio::test]
    async fn test_missing_task_errors() {
        let store = InMemoryTaskStore::new();
        let ghost = task("ghost", Utc::now());

        assert!(matches!(store.update(&ghost).await, Err(StoreError::NotFound)));
        assert!(matches!(store.delete(ghost.id).await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryTaskStore::new();
        let stored = store.insert(task("remove me", Utc::now())).await.unwrap();

        store.delete(stored.id).await.unwrap();
        assert!(store.get(stored.id).await.unwrap().is_none());
        assert!(matches!(store.delete(stored.id).await, Err(StoreError::NotFound)));
    }

    #[test]
    fn test_record_with_unknown_status_is_corrupt() {
        let record = TaskRecord {
            id: Uuid::new_v4(),
            title: "t".to_string(),
            description: String::new(),
            due_date: None,
            status: "archived".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(matches!(Task::try_from(record), Err(StoreError::Corrupt(_))));
    }
}
