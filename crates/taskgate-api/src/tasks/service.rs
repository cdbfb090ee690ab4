//! Task operations
//!
//! Parses and validates task requests, stamps timestamps from the injected
//! clock, and bounds every store call with the configured timeout. Access
//! control happens before these methods are reached.

use super::models::{Task, TaskRequest, TaskStatus};
use super::repository::TaskStore;
use crate::auth::repository::{bounded, StoreError};
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use taskgate_core::Clock;
use thiserror::Error;
use uuid::Uuid;

const DUE_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task not found")]
    NotFound,

    #[error("invalid status {0:?}, must be one of: pending, in_progress, completed")]
    InvalidStatus(String),

    #[error("invalid due date {0:?}, use YYYY-MM-DD")]
    InvalidDueDate(String),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for TaskError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => TaskError::NotFound,
            other => TaskError::Store(other),
        }
    }
}

pub struct TaskService {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
}

impl TaskService {
    pub fn new(store: Arc<dyn TaskStore>, clock: Arc<dyn Clock>, store_timeout: Duration) -> Self {
        Self {
            store,
            clock,
            store_timeout,
        }
    }

    pub async fn list_tasks(&self) -> Result<Vec<Task>, TaskError> {
        Ok(bounded(self.store_timeout, self.store.list()).await?)
    }

    pub async fn get_task(&self, id: Uuid) -> Result<Task, TaskError> {
        bounded(self.store_timeout, self.store.get(id))
            .await?
            .ok_or(TaskError::NotFound)
    }

    pub async fn create_task(&self, request: TaskRequest) -> Result<Task, TaskError> {
        let (status, due_date) = parse_fields(&request)?;
        let task = Task::new(
            request.title,
            request.description,
            due_date,
            status,
            self.clock.now(),
        );

        let task = bounded(self.store_timeout, self.store.insert(task)).await?;
        tracing::info!(task_id = %task.id, status = %task.status, "Task created");
        Ok(task)
    }

    /// Replace a task's fields
    ///
    /// A missing task is reported before the request is validated.
    pub async fn update_task(&self, id: Uuid, request: TaskRequest) -> Result<Task, TaskError> {
        let mut task = self.get_task(id).await?;
        let (status, due_date) = parse_fields(&request)?;

        task.title = request.title;
        task.description = request.description;
        task.due_date = due_date;
        task.status = status;
        task.updated_at = self.clock.now();

        bounded(self.store_timeout, self.store.update(&task)).await?;
        tracing::info!(task_id = %task.id, status = %task.status, "Task updated");
        Ok(task)
    }

    pub async fn delete_task(&self, id: Uuid) -> Result<(), TaskError> {
        bounded(self.store_timeout, self.store.delete(id)).await?;
        tracing::info!(task_id = %id, "Task deleted");
        Ok(())
    }
}

impl std::fmt::Debug for TaskService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskService")
            .field("store_timeout", &self.store_timeout)
            .finish_non_exhaustive()
    }
}

fn parse_fields(request: &TaskRequest) -> Result<(TaskStatus, Option<NaiveDate>), TaskError> {
    let status = request
        .status
        .parse()
        .map_err(|_| TaskError::InvalidStatus(request.status.clone()))?;

    let due_date = match request.due_date.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            NaiveDate::parse_from_str(raw, DUE_DATE_FORMAT)
                .map_err(|_| TaskError::InvalidDueDate(raw.to_string()))?,
        ),
    };

    Ok((status, due_date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::repository::InMemoryTaskStore;
    use chrono::{TimeZone, Utc};
    use taskgate_core::ManualClock;

    fn service() -> (TaskService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        ));
        let service = TaskService::new(
            Arc::new(InMemoryTaskStore::new()),
            clock.clone(),
            Duration::from_secs(10),
        );
        (service, clock)
    }

    fn request(title: &str, status: &str, due_date: Option<&str>) -> TaskRequest {
        TaskRequest {
            title: title.to_string(),
            description: "details".to_string(),
            due_date: due_date.map(str::to_string),
            status: status.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (service, clock) = service();

        let task = service
            .create_task(request("Ship", "pending", Some("2024-07-01")))
            .await
            .unwrap();

        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.due_date, NaiveDate::from_ymd_opt(2024, 7, 1));
        assert_eq!(task.created_at, clock.now());
        assert_eq!(service.get_task(task.id).await.unwrap(), task);
        assert_eq!(service.list_tasks().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_due_date_means_none() {
        let (service, _) = service();
        let task = service
            .create_task(request("Ship", "completed", Some("")))
            .await
            .unwrap();
        assert!(task.due_date.is_none());
    }

    #[tokio::test]
    async fn test_invalid_fields_rejected() {
        let (service, _) = service();

        assert!(matches!(
            service.create_task(request("Ship", "done", None)).await,
            Err(TaskError::InvalidStatus(_))
        ));
        assert!(matches!(
            service
                .create_task(request("Ship", "pending", Some("01/07/2024")))
                .await,
            Err(TaskError::InvalidDueDate(_))
        ));
        assert!(service.list_tasks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_replaces_fields() {
        let (service, clock) = service();
        let task = service
            .create_task(request("Draft", "pending", Some("2024-07-01")))
            .await
            .unwrap();

        clock.advance(chrono::Duration::minutes(5));
        let updated = service
            .update_task(task.id, request("Final", "in_progress", None))
            .await
            .unwrap();

        assert_eq!(updated.title, "Final");
        assert_eq!(updated.status, TaskStatus::InProgress);
        assert!(updated.due_date.is_none());
        assert_eq!(updated.created_at, task.created_at);
        assert_eq!(updated.updated_at, clock.now());
        assert_eq!(service.get_task(task.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_missing_task() {
        let (service, _) = service();
        let id = Uuid::new_v4();

        assert!(matches!(service.get_task(id).await, Err(TaskError::NotFound)));
        // Reported as missing even when the body is also invalid
        assert!(matches!(
            service.update_task(id, request("x", "bogus", None)).await,
            Err(TaskError::NotFound)
        ));
        assert!(matches!(service.delete_task(id).await, Err(TaskError::NotFound)));
    }

    #[tokio::test]
    async fn test_delete() {
        let (service, _) = service();
        let task = service
            .create_task(request("Tmp", "pending", None))
            .await
            .unwrap();

        service.delete_task(task.id).await.unwrap();
        assert!(matches!(
            service.get_task(task.id).await,
            Err(TaskError::NotFound)
        ));
    }
}
