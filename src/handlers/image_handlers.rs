//! HTTP handlers for the gallery image collection.
//! Decodes multipart uploads and JSON delete requests and delegates the
//! storage work to `AssetService`.

use crate::{
    errors::AppError,
    extract::AdminSession,
    models::image::ImageAsset,
    services::asset_service::{DeletionReport, NewImage},
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct DeleteImagesRequest {
    #[serde(default)]
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub success: bool,
    pub message: String,
    pub image: ImageAsset,
}

#[derive(Debug, Serialize)]
pub struct ImagesResponse {
    pub success: bool,
    pub images: Vec<ImageAsset>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteImagesResponse {
    pub success: bool,
    pub message: String,
    pub requested: usize,
    pub deleted: u64,
    pub storage_failures: Vec<Uuid>,
}

/// `POST /api/admin/image`: multipart `title`, `description`, `image`.
pub async fn upload_image(
    _admin: AdminSession,
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, AppError> {
    let mut multipart =
        multipart.map_err(|rejection| AppError::new(rejection.status(), rejection.body_text()))?;

    let mut new_image = NewImage::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("title") => new_image.title = field.text().await?,
            Some("description") => new_image.description = field.text().await?,
            Some("image") => new_image.payload = field.bytes().await?,
            _ => {}
        }
    }

    let image = state.assets.upload(new_image).await?;
    Ok((
        StatusCode::CREATED,
        Json(ImageResponse {
            success: true,
            message: "Image uploaded successfully".into(),
            image,
        }),
    ))
}

/// `GET /api/admin/image` and `GET /api/gallery`: newest first.
pub async fn list_images(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let images = state.assets.list().await?;
    Ok(Json(ImagesResponse {
        success: true,
        images,
    }))
}

/// `DELETE /api/admin/image`: JSON `{ "ids": [...] }`.
pub async fn delete_images(
    _admin: AdminSession,
    State(state): State<AppState>,
    payload: Result<Json<DeleteImagesRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload.map_err(|rejection| {
        AppError::bad_request("No image IDs provided").with_detail(rejection.body_text())
    })?;
    let report = state.assets.bulk_delete(&request.ids).await?;
    Ok(Json(delete_response(report)))
}

fn delete_response(report: DeletionReport) -> DeleteImagesResponse {
    let mut message = format!("{} image(s) deleted successfully", report.deleted);
    if !report.storage_failures.is_empty() {
        message.push_str(&format!(
            "; {} stored file(s) could not be removed",
            report.storage_failures.len()
        ));
    }
    DeleteImagesResponse {
        success: true,
        message,
        requested: report.requested,
        deleted: report.deleted,
        storage_failures: report.storage_failures,
    }
}
