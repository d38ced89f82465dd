//! src/services/object_store.rs
//!
//! Object store client for image binaries. `ObjectStore` is the seam the
//! asset service talks to; `LocalDiskStore` keeps payloads on local disk
//! sharded beneath `base_path/{shard}/{shard}/{name}` and serves them back
//! through `/media`. The HTTP-backed implementation lives in `remote_store`.

use async_trait::async_trait;
use bytes::Bytes;
use image::ImageFormat;
use md5::Context;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const MAX_STORAGE_REF_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("payload is not a recognised image format")]
    NotAnImage,
    #[error("invalid storage reference")]
    InvalidReference,
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("object store rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

/// What the store hands back after accepting an image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    /// Publicly resolvable URL of the image.
    pub image_url: String,
    /// Reference to pass to [`ObjectStore::delete`].
    pub storage_ref: String,
    pub content_type: &'static str,
    pub size_bytes: u64,
    /// Hex MD5 of the payload, when the backend reports one.
    pub etag: Option<String>,
}

/// Remote or local home for image binaries.
///
/// Implementations must treat deleting an already-missing object as success
/// so that overlapping bulk deletes stay harmless.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an image payload. Payloads that are not images are rejected with
    /// [`ObjectStoreError::NotAnImage`] before anything is written.
    async fn put_image(&self, payload: Bytes) -> ObjectStoreResult<StoredObject>;

    /// Remove the binary at `storage_ref`.
    async fn delete(&self, storage_ref: &str) -> ObjectStoreResult<()>;

    /// Cheap reachability probe used by `/readyz`.
    async fn health_check(&self) -> ObjectStoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str;
}

/// Recognise an image by its magic bytes.
pub fn sniff_image(payload: &[u8]) -> ObjectStoreResult<ImageFormat> {
    image::guess_format(payload).map_err(|_| ObjectStoreError::NotAnImage)
}

/// File extension used when naming a stored object of `format`.
pub fn extension_for(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("img")
}

/// Object name for a freshly accepted image, e.g. `3f2a…e1.jpg`.
pub fn new_object_name(format: ImageFormat) -> String {
    format!("{}.{}", Uuid::new_v4(), extension_for(format))
}

/// Stores image payloads on local disk.
#[derive(Clone, Debug)]
pub struct LocalDiskStore {
    base_path: PathBuf,
    public_base_url: String,
}

impl LocalDiskStore {
    /// `public_base_url` is the externally visible origin of this server; image
    /// URLs are built as `{public_base_url}/media/{storage_ref}`.
    pub fn new(base_path: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn public_url(&self, storage_ref: &str) -> String {
        format!("{}/media/{}", self.public_base_url, storage_ref)
    }

    /// Reject references that could escape `base_path`.
    fn ensure_ref_safe(storage_ref: &str) -> ObjectStoreResult<()> {
        if storage_ref.is_empty() || storage_ref.len() > MAX_STORAGE_REF_LEN {
            return Err(ObjectStoreError::InvalidReference);
        }
        if storage_ref.starts_with('/') || storage_ref.contains("..") {
            return Err(ObjectStoreError::InvalidReference);
        }
        if storage_ref
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(ObjectStoreError::InvalidReference);
        }
        Ok(())
    }

    /// Two-level shard directories taken from MD5(name), `00`–`ff` each.
    fn object_shards(name: &str) -> (String, String) {
        let digest = md5::compute(name);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn object_path(&self, storage_ref: &str) -> PathBuf {
        self.base_path.join(storage_ref)
    }

    /// Open a stored image for streaming out.
    ///
    /// Returns the file, its length and a content type derived from the
    /// extension.
    pub async fn open(&self, storage_ref: &str) -> ObjectStoreResult<(File, u64, &'static str)> {
        Self::ensure_ref_safe(storage_ref)?;
        let path = self.object_path(storage_ref);
        let file = File::open(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                ObjectStoreError::NotFound(storage_ref.to_string())
            } else {
                ObjectStoreError::Io(err)
            }
        })?;
        let len = file.metadata().await?.len();
        let content_type = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(ImageFormat::from_extension)
            .map(|format| format.to_mime_type())
            .unwrap_or("application/octet-stream");
        Ok((file, len, content_type))
    }

    /// Remove empty shard directories between `start` and `stop`.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for LocalDiskStore {
    /// Write to a temp file, fsync, then rename into place so readers never
    /// observe a partial image.
    async fn put_image(&self, payload: Bytes) -> ObjectStoreResult<StoredObject> {
        let format = sniff_image(&payload)?;
        let name = new_object_name(format);
        let (shard_a, shard_b) = Self::object_shards(&name);
        let storage_ref = format!("{}/{}/{}", shard_a, shard_b, name);

        let file_path = self.object_path(&storage_ref);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            ObjectStoreError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut digest = Context::new();
        digest.consume(&payload);
        if let Err(err) = file.write_all(&payload).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ObjectStoreError::Io(err));
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ObjectStoreError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ObjectStoreError::Io(err));
        }
        drop(file);

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ObjectStoreError::Io(err));
        }
        debug!("stored image at {}", file_path.display());

        Ok(StoredObject {
            image_url: self.public_url(&storage_ref),
            storage_ref,
            content_type: format.to_mime_type(),
            size_bytes: payload.len() as u64,
            etag: Some(format!("{:x}", digest.compute())),
        })
    }

    async fn delete(&self, storage_ref: &str) -> ObjectStoreResult<()> {
        Self::ensure_ref_safe(storage_ref)?;
        let file_path = self.object_path(storage_ref);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
            }
            Err(err) => return Err(ObjectStoreError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent, &self.base_path).await;
        }
        Ok(())
    }

    /// Write, read back and remove a probe file under `base_path`.
    async fn health_check(&self) -> ObjectStoreResult<()> {
        fs::create_dir_all(&self.base_path).await?;
        let tmp_path = self.base_path.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&tmp_path, b"readyz").await?;
        let read_back = fs::read(&tmp_path).await;
        let _ = fs::remove_file(&tmp_path).await;
        if read_back? != b"readyz" {
            return Err(ObjectStoreError::Io(io::Error::new(
                ErrorKind::InvalidData,
                "file content mismatch",
            )));
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
