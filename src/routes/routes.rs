//! Defines routes for the gallery admin API.
//!
//! ## Structure
//! - **Admin session**
//!   - `POST   /api/admin/login`   — exchange the shared password for a session cookie
//!   - `POST   /api/admin/logout`  — clear the cookie
//!   - `GET    /api/admin/session` — report whether the cookie is valid
//!
//! - **Images**
//!   - `POST   /api/admin/image` — multipart upload (admin only)
//!   - `GET    /api/admin/image` — list, newest first
//!   - `DELETE /api/admin/image` — bulk delete by id (admin only)
//!   - `GET    /api/gallery`     — public alias of the listing
//!
//! - **Media**
//!   - `GET    /media/{*storage_ref}` — image bytes kept by the local store
//!
//! The wildcard `*storage_ref` carries shard directories such as `ab/cd/<uuid>.jpg`.

use crate::{
    handlers::{
        auth_handlers::{login, logout, session_status},
        health_handlers::{healthz, readyz},
        image_handlers::{delete_images, list_images, upload_image},
        media_handlers::serve_media,
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{get, post},
};

/// Build the router; the caller attaches state and middleware.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // admin session
        .route("/api/admin/login", post(login))
        .route("/api/admin/logout", post(logout))
        .route("/api/admin/session", get(session_status))
        // images
        .route(
            "/api/admin/image",
            post(upload_image).get(list_images).delete(delete_images),
        )
        .route("/api/gallery", get(list_images))
        .route("/media/{*storage_ref}", get(serve_media))
}
