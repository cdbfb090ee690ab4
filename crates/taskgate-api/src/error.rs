//! API error handling
//!
//! Author: hephaex@gmail.com

use crate::auth::{OnboardingError, StoreError};
use crate::tasks::TaskError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new("NOT_FOUND", format!("{resource} not found"))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    /// Carries its own code, e.g. `USERNAME_TAKEN`
    Conflict {
        code: &'static str,
        message: String,
    },
    Unauthorized(String),
    /// Store timed out or is unreachable
    ServiceUnavailable,
    /// Details are logged, never returned
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiError::not_found(&msg)),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ApiError::bad_request(msg)),
            AppError::Conflict { code, message } => {
                (StatusCode::CONFLICT, ApiError::new(code, message))
            }
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, ApiError::new("UNAUTHORIZED", msg))
            }
            AppError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                ApiError::new("SERVICE_UNAVAILABLE", "Identity store is unavailable"),
            ),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, ApiError::internal_error())
            }
        };

        (status, Json(error)).into_response()
    }
}

impl From<OnboardingError> for AppError {
    fn from(err: OnboardingError) -> Self {
        match err {
            OnboardingError::UsernameTaken => AppError::Conflict {
                code: "USERNAME_TAKEN",
                message: "Username already exists".to_string(),
            },
            OnboardingError::AlreadyPrivileged => AppError::Conflict {
                code: "ALREADY_PRIVILEGED",
                message: "Identity is already privileged".to_string(),
            },
            OnboardingError::InvalidCredentials => {
                AppError::Unauthorized("Invalid credentials".to_string())
            }
            OnboardingError::NotFound => AppError::NotFound("Identity".to_string()),
            OnboardingError::SecretTooLong { max } => {
                AppError::BadRequest(format!("password must be at most {max} bytes"))
            }
            OnboardingError::Store(store) => store.into(),
            OnboardingError::Hashing(msg) => AppError::Internal(format!("hashing: {msg}")),
            OnboardingError::Token(err) => AppError::Internal(format!("token: {err}")),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout(_) | StoreError::Unavailable(_) => {
                tracing::warn!(error = %err, "User store unavailable");
                AppError::ServiceUnavailable
            }
            StoreError::Duplicate => AppError::Conflict {
                code: "USERNAME_TAKEN",
                message: "Username already exists".to_string(),
            },
            StoreError::NotFound => AppError::NotFound("Identity".to_string()),
            StoreError::Corrupt(msg) => AppError::Internal(format!("store: {msg}")),
        }
    }
}

impl From<TaskError> for AppError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::NotFound => AppError::NotFound("Task".to_string()),
            TaskError::InvalidStatus(_) | TaskError::InvalidDueDate(_) => {
                AppError::BadRequest(err.to_string())
            }
            TaskError::Store(store) => store.into(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = err
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("{field} is invalid"),
                })
            })
            .collect();
        messages.sort();
        AppError::BadRequest(messages.join("; "))
    }
}
