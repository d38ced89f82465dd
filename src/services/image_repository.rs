//! Metadata store for gallery images.
//!
//! One row in `images` per stored binary. The SQLite implementation keeps no
//! state of its own beyond the pool; atomicity is whatever SQLite gives a
//! single statement.

use crate::models::image::{ImageAsset, NewImageRecord};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type MetadataResult<T> = Result<T, MetadataError>;

#[async_trait]
pub trait ImageRepository: Send + Sync {
    /// Insert a new row, assigning its id and timestamps.
    async fn insert(&self, record: NewImageRecord) -> MetadataResult<ImageAsset>;

    /// Every image, most recently created first.
    async fn list_newest_first(&self) -> MetadataResult<Vec<ImageAsset>>;

    /// Rows whose id is in `ids`. Missing ids are simply absent from the result.
    async fn find_by_ids(&self, ids: &[Uuid]) -> MetadataResult<Vec<ImageAsset>>;

    /// Delete every row whose id is in `ids` in one statement; returns the
    /// number of rows removed.
    async fn delete_by_ids(&self, ids: &[Uuid]) -> MetadataResult<u64>;

    async fn ping(&self) -> MetadataResult<()>;
}

const IMAGE_COLUMNS: &str =
    "id, title, description, image_url, storage_ref, created_at, updated_at";

#[derive(Clone)]
pub struct SqliteImageRepository {
    db: Arc<SqlitePool>,
}

impl SqliteImageRepository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ImageRepository for SqliteImageRepository {
    async fn insert(&self, record: NewImageRecord) -> MetadataResult<ImageAsset> {
        let now = Utc::now();
        let image = sqlx::query_as::<_, ImageAsset>(&format!(
            "INSERT INTO images ({IMAGE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?) \
             RETURNING {IMAGE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&record.title)
        .bind(&record.description)
        .bind(&record.image_url)
        .bind(&record.storage_ref)
        .bind(now)
        .bind(now)
        .fetch_one(&*self.db)
        .await?;
        Ok(image)
    }

    async fn list_newest_first(&self) -> MetadataResult<Vec<ImageAsset>> {
        let rows = sqlx::query_as::<_, ImageAsset>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images ORDER BY created_at DESC, rowid DESC"
        ))
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> MetadataResult<Vec<ImageAsset>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("SELECT {IMAGE_COLUMNS} FROM images WHERE id IN ("));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let rows: Vec<ImageAsset> = builder.build_query_as().fetch_all(&*self.db).await?;
        Ok(rows)
    }

    async fn delete_by_ids(&self, ids: &[Uuid]) -> MetadataResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM images WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let result = builder.build().execute(&*self.db).await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> MetadataResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }
}
