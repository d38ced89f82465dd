//! Represents a gallery image: the metadata row that points at one stored binary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A single gallery image.
///
/// The struct holds metadata only; the image bytes live in the object store
/// at `storage_ref`. Records are never edited, only created and deleted.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageAsset {
    /// Identifier assigned when the row is inserted.
    pub id: Uuid,

    /// Short caption shown with the image.
    pub title: String,

    /// Longer description shown with the image.
    pub description: String,

    /// Public URL of the stored binary.
    pub image_url: String,

    /// Opaque object-store reference, used only to delete the binary.
    pub storage_ref: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Fields needed to insert a new row once the binary has been stored.
#[derive(Clone, Debug)]
pub struct NewImageRecord {
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub storage_ref: String,
}
