//! Request extractors.

use crate::{errors::AppError, state::AppState};
use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::Utc;

/// Proof that the request carried a valid admin session cookie.
///
/// Put it first in a handler's argument list; requests without a session
/// are answered with `401` before the body is read.
#[derive(Debug, Clone, Copy)]
pub struct AdminSession;

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match state.sessions.verify_at(&parts.headers, Utc::now()) {
            Ok(()) => Ok(AdminSession),
            Err(reason) => {
                tracing::debug!(
                    "rejecting {} {}: {:?}",
                    parts.method,
                    parts.uri.path(),
                    reason
                );
                Err(AppError::unauthorized())
            }
        }
    }
}
