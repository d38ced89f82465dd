//! Admin login, logout and session probe.
//!
//! - POST /api/admin/login   -> check the shared password, set the `admin` cookie
//! - POST /api/admin/logout  -> clear the cookie (and revoke a live session)
//! - GET  /api/admin/session -> whether the caller's cookie is currently valid

use crate::{errors::AppError, state::AppState};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
};
use cookie::Cookie;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub success: bool,
    pub authenticated: bool,
}

/// `POST /api/admin/login`
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload?;
    let password = request.password.unwrap_or_default();

    let cookie = state.sessions.login(&password).inspect_err(|err| {
        tracing::info!("admin login rejected: {}", err);
    })?;
    tracing::info!("admin logged in");

    with_cookie(
        cookie,
        MessageResponse {
            success: true,
            message: "Login successful".into(),
        },
    )
}

/// `POST /api/admin/logout`
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let cookie = state.sessions.logout(&headers);
    with_cookie(
        cookie,
        MessageResponse {
            success: true,
            message: "Logged out successfully".into(),
        },
    )
}

/// `GET /api/admin/session`
pub async fn session_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    Json(SessionStatusResponse {
        success: true,
        authenticated: state.sessions.authorize(&headers),
    })
}

fn with_cookie(cookie: Cookie<'static>, body: MessageResponse) -> Result<Response, AppError> {
    let value = HeaderValue::from_str(&cookie.to_string())
        .map_err(|err| AppError::internal("failed to encode session cookie").with_detail(err))?;
    Ok(([(header::SET_COOKIE, value)], Json(body)).into_response())
}
