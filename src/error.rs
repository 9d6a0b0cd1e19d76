use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::dispatch::DispatchError;
use crate::ledger::LedgerError;
use crate::reminders::engine::ReminderError;
use crate::storage::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Notification permission is required to set reminders")]
    PermissionRequired,

    #[error("Reminder schedule is incomplete: {scheduled} of {requested} triggers created")]
    ScheduleIncomplete { scheduled: usize, requested: usize },

    #[error("Notification scheduling failed: {0}")]
    DispatchFailed(String),

    #[error("Completion could not be recorded, please retry")]
    RetryExhausted,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::PermissionRequired => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::ScheduleIncomplete { .. } => (StatusCode::BAD_GATEWAY, self.to_string()),
            AppError::DispatchFailed(msg) => {
                tracing::warn!(error = %msg, "Notification dispatch failure");
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            AppError::RetryExhausted => (StatusCode::CONFLICT, self.to_string()),
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
        };

        let body = json!({
            "error": {
                "message": message,
                "code": status.as_u16(),
            }
        });

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => AppError::Database(e),
            other => AppError::Internal(anyhow::anyhow!(other)),
        }
    }
}

impl From<ReminderError> for AppError {
    fn from(err: ReminderError) -> Self {
        match err {
            ReminderError::NotAuthorized => AppError::PermissionRequired,
            ReminderError::IncompleteSchedule {
                scheduled,
                requested,
            } => AppError::ScheduleIncomplete {
                scheduled,
                requested,
            },
            ReminderError::InvalidConfiguration(msg) => AppError::Validation(msg),
            ReminderError::UnknownHabit(id) => AppError::NotFound(format!("Habit {id} not found")),
            ReminderError::Store(e) => e.into(),
            ReminderError::Dispatch(e) => AppError::DispatchFailed(e.to_string()),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::RetryExhausted { attempts } => {
                tracing::warn!(attempts, "Ledger retries exhausted");
                AppError::RetryExhausted
            }
            LedgerError::Store(e) => e.into(),
        }
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::NotAuthorized => AppError::PermissionRequired,
            DispatchError::Backend(msg) => AppError::DispatchFailed(msg),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
