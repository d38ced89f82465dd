//! src/services/asset_service.rs
//!
//! AssetService: upload, list and bulk delete of gallery images across the
//! object store (binaries) and the image repository (metadata).
//!
//! Upload writes the binary before the row; bulk delete removes binaries
//! before rows. Neither is transactional across the two stores: a failure
//! between the steps can leave a binary without a row or the reverse. Upload
//! makes one compensating delete when the row insert fails; nothing else is
//! reconciled and nothing is retried here.

use crate::{
    models::image::{ImageAsset, NewImageRecord},
    services::{
        image_repository::{ImageRepository, MetadataError},
        object_store::{ObjectStore, ObjectStoreError},
    },
};
use bytes::Bytes;
use serde::Serialize;
use std::{collections::BTreeSet, sync::Arc};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("failed to store image: {0}")]
    StorageFailure(#[source] ObjectStoreError),
    #[error("failed to save image metadata: {0}")]
    PersistenceFailure(#[source] MetadataError),
}

#[derive(Debug, Error)]
pub enum ListError {
    #[error("failed to load images: {0}")]
    PersistenceFailure(#[from] MetadataError),
}

#[derive(Debug, Error)]
pub enum DeleteError {
    #[error("No image IDs provided")]
    InvalidInput,
    #[error("No images found")]
    NotFound,
    #[error("failed to delete image metadata: {0}")]
    PersistenceFailure(#[from] MetadataError),
}

/// An image as received from the admin UI, before anything is stored.
#[derive(Clone, Debug, Default)]
pub struct NewImage {
    pub title: String,
    pub description: String,
    pub payload: Bytes,
}

/// Outcome of a bulk delete.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionReport {
    /// Distinct ids in the request.
    pub requested: usize,
    /// Metadata rows removed.
    pub deleted: u64,
    /// Ids whose binary could not be removed from the object store. Their
    /// metadata is gone regardless.
    pub storage_failures: Vec<Uuid>,
}

#[derive(Clone)]
pub struct AssetService {
    objects: Arc<dyn ObjectStore>,
    images: Arc<dyn ImageRepository>,
}

impl AssetService {
    pub fn new(objects: Arc<dyn ObjectStore>, images: Arc<dyn ImageRepository>) -> Self {
        Self { objects, images }
    }

    pub fn object_store(&self) -> &Arc<dyn ObjectStore> {
        &self.objects
    }

    pub fn repository(&self) -> &Arc<dyn ImageRepository> {
        &self.images
    }

    /// Store the binary, then persist its metadata row.
    pub async fn upload(&self, new_image: NewImage) -> Result<ImageAsset, UploadError> {
        let title = new_image.title.trim();
        let description = new_image.description.trim();
        if title.is_empty() || description.is_empty() || new_image.payload.is_empty() {
            return Err(UploadError::InvalidInput(
                "Image, title, description required".into(),
            ));
        }

        let stored = match self.objects.put_image(new_image.payload).await {
            Ok(stored) => stored,
            Err(ObjectStoreError::NotAnImage) => {
                return Err(UploadError::InvalidInput(
                    "Uploaded file is not a supported image".into(),
                ));
            }
            Err(err) => {
                error!("object store upload failed: {}", err);
                return Err(UploadError::StorageFailure(err));
            }
        };
        debug!(
            "stored {} ({} bytes, {}) as {}",
            title, stored.size_bytes, stored.content_type, stored.storage_ref
        );

        let record = NewImageRecord {
            title: title.to_string(),
            description: description.to_string(),
            image_url: stored.image_url.clone(),
            storage_ref: stored.storage_ref.clone(),
        };
        match self.images.insert(record).await {
            Ok(image) => {
                info!("uploaded image {} ({})", image.id, image.storage_ref);
                Ok(image)
            }
            Err(err) => {
                error!(
                    "saving metadata for {} failed, removing stored binary: {}",
                    stored.storage_ref, err
                );
                if let Err(cleanup) = self.objects.delete(&stored.storage_ref).await {
                    warn!(
                        "orphaned binary {} left in {} store: {}",
                        stored.storage_ref,
                        self.objects.backend_name(),
                        cleanup
                    );
                }
                Err(UploadError::PersistenceFailure(err))
            }
        }
    }

    /// Every image, newest first.
    pub async fn list(&self) -> Result<Vec<ImageAsset>, ListError> {
        Ok(self.images.list_newest_first().await?)
    }

    /// Delete the binaries and rows for `ids`.
    ///
    /// Ids that match nothing are ignored; the call fails with `NotFound` only
    /// when none of them match. Storage failures are collected in the report
    /// and do not stop the metadata delete.
    pub async fn bulk_delete<S: AsRef<str>>(&self, ids: &[S]) -> Result<DeletionReport, DeleteError> {
        if ids.is_empty() {
            return Err(DeleteError::InvalidInput);
        }

        let distinct: BTreeSet<&str> = ids.iter().map(|id| id.as_ref().trim()).collect();
        let parsed: Vec<Uuid> = distinct
            .iter()
            .filter_map(|id| match Uuid::try_parse(id) {
                Ok(uuid) => Some(uuid),
                Err(_) => {
                    debug!("ignoring malformed image id {:?}", id);
                    None
                }
            })
            .collect();

        let found = self.images.find_by_ids(&parsed).await?;
        if found.is_empty() {
            return Err(DeleteError::NotFound);
        }

        let mut storage_failures = Vec::new();
        for image in &found {
            if let Err(err) = self.objects.delete(&image.storage_ref).await {
                warn!(
                    "failed to delete binary {} for image {}: {}",
                    image.storage_ref, image.id, err
                );
                storage_failures.push(image.id);
            }
        }

        let found_ids: Vec<Uuid> = found.iter().map(|image| image.id).collect();
        let deleted = match self.images.delete_by_ids(&found_ids).await {
            Ok(deleted) => deleted,
            Err(err) => {
                error!(
                    "metadata delete failed after removing {} binaries: {}",
                    found.len() - storage_failures.len(),
                    err
                );
                return Err(DeleteError::PersistenceFailure(err));
            }
        };

        info!(
            "deleted {} image(s), {} storage failure(s)",
            deleted,
            storage_failures.len()
        );
        Ok(DeletionReport {
            requested: distinct.len(),
            deleted,
            storage_failures,
        })
    }
}
