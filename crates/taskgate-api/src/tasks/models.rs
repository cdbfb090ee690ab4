//! Task models
//!
//! Author: hephaex@gmail.com

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Task lifecycle state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task status: {0}")]
pub struct UnknownStatus(pub String);

/// Stored task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// Calendar day the task is due, if any
    pub due_date: Option<NaiveDate>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        title: String,
        description: String,
        due_date: Option<NaiveDate>,
        status: TaskStatus,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            description,
            due_date,
            status,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Create or replace a task
///
/// `status` and `due_date` arrive as text and are checked by the service so
/// that bad values produce a 400 with a readable message.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct TaskRequest {
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub title: String,

    #[serde(default)]
    #[validate(length(max = 4000, message = "description must be at most 4000 characters"))]
    pub description: String,

    /// `YYYY-MM-DD`; empty or absent means no due date
    #[serde(default)]
    pub due_date: Option<String>,

    /// One of `pending`, `in_progress`, `completed`
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Completed,
        ] {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, status.as_str());
            assert_eq!(status.as_str().parse::<TaskStatus>(), Ok(status));
        }
        assert_eq!(
            "done".parse::<TaskStatus>(),
            Err(UnknownStatus("done".to_string()))
        );
        assert!("Pending".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_task_serialization() {
        let now = Utc::now();
        let task = Task::new(
            "Write report".to_string(),
            String::new(),
            NaiveDate::from_ymd_opt(2024, 7, 1),
            TaskStatus::InProgress,
            now,
        );

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["due_date"], "2024-07-01");
        assert_eq!(json["status"], "in_progress");
        assert_eq!(task.created_at, task.updated_at);
    }

    #[test]
    fn test_request_validation() {
        let request: TaskRequest =
            serde_json::from_value(serde_json::json!({ "title": "t", "status": "pending" }))
                .unwrap();
        assert!(request.validate().is_ok());
        assert!(request.description.is_empty());
        assert!(request.due_date.is_none());

        let empty_title = TaskRequest {
            title: String::new(),
            ..request
        };
        assert!(empty_title.validate().is_err());
    }
}
