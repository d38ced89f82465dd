//! Shared state handed to every handler via `axum::extract::State`.

use crate::{
    config::{AppConfig, ObjectStoreConfig},
    services::{
        asset_service::AssetService,
        image_repository::SqliteImageRepository,
        object_store::{LocalDiskStore, ObjectStore},
        remote_store::RemoteBucketStore,
        session_service::SessionAuthenticator,
    },
};
use anyhow::Result;
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub assets: AssetService,
    pub sessions: SessionAuthenticator,
    /// Set when images live on local disk and are served from `/media`.
    pub media: Option<Arc<LocalDiskStore>>,
}

impl AppState {
    pub fn new(
        assets: AssetService,
        sessions: SessionAuthenticator,
        media: Option<Arc<LocalDiskStore>>,
    ) -> Self {
        Self {
            assets,
            sessions,
            media,
        }
    }

    /// Wire the configured object store, the SQLite repository and the
    /// session authenticator together.
    pub fn from_config(cfg: &AppConfig, db: Arc<SqlitePool>) -> Result<Self> {
        let (objects, media): (Arc<dyn ObjectStore>, Option<Arc<LocalDiskStore>>) =
            match &cfg.object_store {
                ObjectStoreConfig::Local { storage_dir } => {
                    let store = Arc::new(LocalDiskStore::new(
                        storage_dir.clone(),
                        cfg.public_base_url.clone(),
                    ));
                    let objects: Arc<dyn ObjectStore> = store.clone();
                    (objects, Some(store))
                }
                ObjectStoreConfig::Remote {
                    endpoint,
                    bucket,
                    public_url,
                    timeout,
                } => {
                    let objects: Arc<dyn ObjectStore> = Arc::new(RemoteBucketStore::new(
                        endpoint.clone(),
                        bucket.clone(),
                        public_url.clone(),
                        *timeout,
                    )?);
                    (objects, None)
                }
            };
        tracing::info!("Using {} object store", objects.backend_name());

        let repository = Arc::new(SqliteImageRepository::new(db));
        Ok(Self::new(
            AssetService::new(objects, repository),
            SessionAuthenticator::new(cfg.session.clone()),
            media,
        ))
    }
}
