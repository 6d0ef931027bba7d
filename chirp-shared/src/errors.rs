use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: shared/infrastructure errors
/// - E1xxx: auth/session errors
/// - E2xxx: user/profile errors
/// - E3xxx: media errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    BadRequest,
    PayloadTooLarge,

    // Auth (E1xxx)
    EmailAlreadyExists,
    EmailOrPasswordIncorrect,
    RefreshTokenInvalid,
    EmailVerifyTokenInvalid,
    ForgotPasswordTokenInvalid,
    TokenExpired,
    TokenInvalid,

    // User (E2xxx)
    UserNotFound,
    UsernameAlreadyExists,
    UserNotVerified,

    // Media (E3xxx)
    FileTypeInvalid,
    FileMissing,
    FileTooLarge,
    UploadFailed,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",
            Self::BadRequest => "E0006",
            Self::PayloadTooLarge => "E0007",

            // Auth
            Self::EmailAlreadyExists => "E1001",
            Self::EmailOrPasswordIncorrect => "E1002",
            Self::RefreshTokenInvalid => "E1003",
            Self::EmailVerifyTokenInvalid => "E1004",
            Self::ForgotPasswordTokenInvalid => "E1005",
            Self::TokenExpired => "E1006",
            Self::TokenInvalid => "E1007",

            // User
            Self::UserNotFound => "E2001",
            Self::UsernameAlreadyExists => "E2002",
            Self::UserNotVerified => "E2003",

            // Media
            Self::FileTypeInvalid => "E3001",
            Self::FileMissing => "E3002",
            Self::FileTooLarge => "E3003",
            Self::UploadFailed => "E3004",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError | Self::UploadFailed => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ValidationError | Self::BadRequest | Self::FileTypeInvalid
            | Self::FileMissing => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge | Self::FileTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound | Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized | Self::RefreshTokenInvalid | Self::ForgotPasswordTokenInvalid
            | Self::TokenExpired | Self::TokenInvalid => StatusCode::UNAUTHORIZED,
            Self::EmailOrPasswordIncorrect | Self::EmailVerifyTokenInvalid => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Forbidden | Self::UserNotVerified => StatusCode::FORBIDDEN,
            Self::EmailAlreadyExists | Self::UsernameAlreadyExists => StatusCode::CONFLICT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message, details } => {
                let status = code.status_code();
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "internal server error"),
                )
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorResponse::new("E0002", msg),
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_codes_map_to_expected_statuses() {
        assert_eq!(ErrorCode::EmailAlreadyExists.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ErrorCode::EmailOrPasswordIncorrect.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ErrorCode::EmailVerifyTokenInvalid.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ErrorCode::RefreshTokenInvalid.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ErrorCode::ForgotPasswordTokenInvalid.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ErrorCode::UserNotVerified.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::UserNotFound.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn code_strings_are_stable() {
        assert_eq!(ErrorCode::InternalError.code(), "E0001");
        assert_eq!(ErrorCode::EmailAlreadyExists.code(), "E1001");
        assert_eq!(ErrorCode::UserNotFound.code(), "E2001");
        assert_eq!(ErrorCode::FileTypeInvalid.code(), "E3001");
    }
}
