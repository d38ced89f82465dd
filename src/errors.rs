use crate::services::{
    asset_service::{DeleteError, ListError, UploadError},
    session_service::AuthError,
};
use axum::{
    Json,
    extract::{multipart::MultipartError, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for request failures, rendered as
/// `{"success": false, "message": ..., "error"?: ...}`.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    /// Downstream error text, sent alongside the message when present.
    pub detail: Option<String>,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl fmt::Display) -> Self {
        self.detail = Some(detail.to_string());
        self
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = match self.detail {
            Some(detail) => json!({
                "success": false,
                "message": self.message,
                "error": detail,
            }),
            None => json!({
                "success": false,
                "message": self.message,
            }),
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredential => Self::new(StatusCode::UNAUTHORIZED, err.to_string()),
            AuthError::NotConfigured => Self::new(StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
            AuthError::SigningFailed => Self::internal("Login failed").with_detail(err),
        }
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::InvalidInput(message) => Self::bad_request(message),
            UploadError::StorageFailure(source) => {
                Self::internal("Error uploading image").with_detail(source)
            }
            UploadError::PersistenceFailure(source) => {
                Self::internal("Error uploading image").with_detail(source)
            }
        }
    }
}

impl From<ListError> for AppError {
    fn from(err: ListError) -> Self {
        Self::internal("Error fetching images").with_detail(err)
    }
}

impl From<DeleteError> for AppError {
    fn from(err: DeleteError) -> Self {
        match err {
            DeleteError::InvalidInput => Self::bad_request(err.to_string()),
            DeleteError::NotFound => Self::not_found(err.to_string()),
            DeleteError::PersistenceFailure(source) => {
                Self::internal("Delete failed").with_detail(source)
            }
        }
    }
}

/// Every unreadable JSON body is a 400, whatever axum's own status would be.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        Self::new(err.status(), err.body_text())
    }
}
