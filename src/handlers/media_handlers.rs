//! `GET /media/{*storage_ref}`: stream an image kept by the local store.

use crate::{errors::AppError, services::object_store::ObjectStoreError, state::AppState};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use tokio_util::io::ReaderStream;

pub async fn serve_media(
    State(state): State<AppState>,
    Path(storage_ref): Path<String>,
) -> Result<Response, AppError> {
    let store = state
        .media
        .as_ref()
        .ok_or_else(|| AppError::not_found("Image not found"))?;

    let (file, len, content_type) = store.open(&storage_ref).await.map_err(|err| match err {
        ObjectStoreError::NotFound(_) | ObjectStoreError::InvalidReference => {
            AppError::not_found("Image not found")
        }
        other => AppError::internal("Error reading image").with_detail(other),
    })?;

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    // Stored objects are never rewritten in place.
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );
    Ok(response)
}
