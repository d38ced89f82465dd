//! Admin back-end for a clinic's image gallery: password-gated sessions,
//! image uploads into an object store with SQLite metadata, listing and
//! bulk deletion.

pub mod config;
pub mod db;
pub mod errors;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{Router, extract::DefaultBodyLimit};
use state::AppState;
use tower_http::trace::TraceLayer;

/// The complete application router with state, body limit and request tracing.
pub fn app(state: AppState, max_upload_bytes: usize) -> Router {
    routes::routes::routes()
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
