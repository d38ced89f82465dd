//! `ObjectStore` backed by an S3-style bucket reachable over HTTP.
//!
//! Objects are written with `PUT {endpoint}/{bucket}/gallery/{name}` and
//! removed with `DELETE` on the same path. A `404` on delete counts as
//! success.

use crate::services::object_store::{
    ObjectStore, ObjectStoreError, ObjectStoreResult, StoredObject, new_object_name, sniff_image,
};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{StatusCode, header};
use std::time::Duration;
use tracing::debug;

const KEY_PREFIX: &str = "gallery";

#[derive(Clone, Debug)]
pub struct RemoteBucketStore {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    public_base_url: String,
}

impl RemoteBucketStore {
    /// `public_base_url` defaults to `endpoint` when the bucket is served
    /// publicly from the same origin.
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        public_base_url: Option<String>,
        timeout: Duration,
    ) -> ObjectStoreResult<Self> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        let public_base_url = public_base_url
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| endpoint.clone());
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            bucket: bucket.into(),
            public_base_url,
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, self.bucket, key)
    }

    async fn rejected(response: reqwest::Response) -> ObjectStoreError {
        let status = response.status().as_u16();
        let message = response
            .text()
            .await
            .unwrap_or_else(|err| format!("unreadable response body: {}", err));
        ObjectStoreError::Rejected { status, message }
    }
}

#[async_trait]
impl ObjectStore for RemoteBucketStore {
    async fn put_image(&self, payload: Bytes) -> ObjectStoreResult<StoredObject> {
        let format = sniff_image(&payload)?;
        let key = format!("{}/{}", KEY_PREFIX, new_object_name(format));
        let size_bytes = payload.len() as u64;

        let response = self
            .client
            .put(self.object_url(&key))
            .header(header::CONTENT_TYPE, format.to_mime_type())
            .body(payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::rejected(response).await);
        }

        let etag = response
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim_matches('"').to_string());
        debug!("uploaded {} to bucket {}", key, self.bucket);

        Ok(StoredObject {
            image_url: self.public_url(&key),
            storage_ref: key,
            content_type: format.to_mime_type(),
            size_bytes,
            etag,
        })
    }

    async fn delete(&self, storage_ref: &str) -> ObjectStoreResult<()> {
        if storage_ref.is_empty() || storage_ref.contains("..") {
            return Err(ObjectStoreError::InvalidReference);
        }
        let response = self
            .client
            .delete(self.object_url(storage_ref))
            .send()
            .await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => {
                debug!("object {} already missing from bucket", storage_ref);
                Ok(())
            }
            _ => Err(Self::rejected(response).await),
        }
    }

    async fn health_check(&self) -> ObjectStoreResult<()> {
        let response = self
            .client
            .get(format!("{}/healthz", self.endpoint))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::rejected(response).await)
        }
    }

    fn backend_name(&self) -> &'static str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::object_store::test_payloads::jpeg;
    use axum::{
        Router,
        body::Bytes as BodyBytes,
        extract::{Path, State},
        http::StatusCode as HttpStatus,
        routing::{get, put},
    };
    use parking_lot::Mutex;
    use std::{collections::HashMap, sync::Arc};
    use tokio::net::TcpListener;

    type Objects = Arc<Mutex<HashMap<String, BodyBytes>>>;

    async fn put_object(
        State(objects): State<Objects>,
        Path((bucket, key)): Path<(String, String)>,
        body: BodyBytes,
    ) -> HttpStatus {
        objects.lock().insert(format!("{}/{}", bucket, key), body);
        HttpStatus::OK
    }

    async fn delete_object(
        State(objects): State<Objects>,
        Path((bucket, key)): Path<(String, String)>,
    ) -> HttpStatus {
        match objects.lock().remove(&format!("{}/{}", bucket, key)) {
            Some(_) => HttpStatus::NO_CONTENT,
            None => HttpStatus::NOT_FOUND,
        }
    }

    /// Spin up a tiny in-process bucket server and return its base URL.
    async fn spawn_bucket_server(objects: Objects) -> String {
        let app = Router::new()
            .route("/healthz", get(|| async { "ok" }))
            .route("/{bucket}/{*key}", put(put_object).delete(delete_object))
            .with_state(objects);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn round_trips_against_bucket_server() {
        let objects: Objects = Arc::default();
        let endpoint = spawn_bucket_server(objects.clone()).await;
        let store = RemoteBucketStore::new(
            endpoint.clone(),
            "clinic",
            Some("https://cdn.example.com/".into()),
            Duration::from_secs(5),
        )
        .unwrap();

        store.health_check().await.unwrap();

        let stored = store.put_image(jpeg(2048)).await.unwrap();
        assert!(stored.storage_ref.starts_with("gallery/"));
        assert!(stored.storage_ref.ends_with(".jpg"));
        assert_eq!(
            stored.image_url,
            format!("https://cdn.example.com/clinic/{}", stored.storage_ref)
        );
        assert_eq!(
            objects.lock().get(&format!("clinic/{}", stored.storage_ref)).map(|b| b.len()),
            Some(2048)
        );

        store.delete(&stored.storage_ref).await.unwrap();
        assert!(objects.lock().is_empty());
        // A second delete answers 404 upstream and is treated as done.
        store.delete(&stored.storage_ref).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_non_images_without_calling_the_bucket() {
        let objects: Objects = Arc::default();
        let endpoint = spawn_bucket_server(objects.clone()).await;
        let store =
            RemoteBucketStore::new(endpoint, "clinic", None, Duration::from_secs(5)).unwrap();

        let err = store
            .put_image(Bytes::from_static(b"%PDF-1.7 not an image"))
            .await
            .unwrap_err();
        assert!(matches!(err, ObjectStoreError::NotAnImage));
        assert!(objects.lock().is_empty());
    }
}
