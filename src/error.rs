use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::utils::{error_codes, error_to_api_response};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Username already exists")]
    DuplicateUsername,

    #[error("Group name already exists")]
    DuplicateGroupName,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Not authorized for this action")]
    NotAuthorized,

    #[error("{0}")]
    Validation(String),

    #[error("Please enter a message before sending")]
    EmptyMessage,

    #[error("You have already requested to join this group or are already a member")]
    MembershipExists,

    #[error("You have already voted in this poll")]
    AlreadyVoted,

    #[error("You are not assigned to any group")]
    NoGroupAssigned,

    #[error("Missing or invalid session token")]
    Unauthenticated,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Password hashing failed: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("Background task failed: {0}")]
    Blocking(#[from] tokio::task::JoinError),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    fn status_and_code(&self) -> (StatusCode, i32) {
        match self {
            AppError::DuplicateUsername | AppError::DuplicateGroupName => {
                (StatusCode::CONFLICT, error_codes::ALREADY_EXISTS)
            }
            AppError::MembershipExists | AppError::AlreadyVoted => {
                (StatusCode::CONFLICT, error_codes::ALREADY_EXISTS)
            }
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, error_codes::AUTH_FAILED),
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, error_codes::AUTH_FAILED),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, error_codes::NOT_FOUND),
            AppError::NotAuthorized | AppError::NoGroupAssigned => {
                (StatusCode::FORBIDDEN, error_codes::PERMISSION_DENIED)
            }
            AppError::Validation(_) | AppError::EmptyMessage => {
                (StatusCode::BAD_REQUEST, error_codes::VALIDATION_ERROR)
            }
            AppError::Database(_)
            | AppError::PasswordHash(_)
            | AppError::Token(_)
            | AppError::CorruptRecord(_)
            | AppError::Blocking(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // 存储层错误不向客户端暴露细节
        let msg = if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
            "Internal server error".to_string()
        } else {
            tracing::warn!("Request rejected: {}", self);
            self.to_string()
        };

        (status, error_to_api_response::<()>(code, msg)).into_response()
    }
}

/// 唯一约束冲突时转换为对应的业务错误
pub(crate) fn on_unique_violation(err: sqlx::Error, conflict: AppError) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => conflict,
        _ => AppError::Database(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_errors_map_to_client_statuses() {
        assert_eq!(
            AppError::DuplicateUsername.status_and_code().0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::NotFound("poll").status_and_code().0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::NoGroupAssigned.status_and_code().0,
            StatusCode::FORBIDDEN
        );
        assert_eq!(AppError::EmptyMessage.status_and_code().0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn storage_errors_are_internal() {
        let err = AppError::from(sqlx::Error::RowNotFound);
        assert_eq!(
            err.status_and_code(),
            (StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR)
        );
    }

    #[test]
    fn not_found_names_the_entity() {
        assert_eq!(AppError::NotFound("poll").to_string(), "poll not found");
    }
}
