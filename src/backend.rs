//! Object-store client shared by the index store and the blob store.
//! An S3-compatible client, extended with a local-directory fallback
//! used in development when no bucket is configured.

use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    Client,
    config::{Credentials, Region},
    primitives::ByteStream,
};
use std::path::PathBuf;

/// Credentials for one S3-compatible bucket.
#[derive(Debug, Clone)]
pub struct BucketConfig {
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
}

/// A single logical object store: either a real S3-compatible bucket, or a
/// local directory used in development when no bucket is configured.
pub enum ObjectStore {
    S3 { client: Client, bucket: String },
    LocalDir { root: PathBuf },
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("object not found")]
    NotFound,
    #[error("backend I/O error: {0}")]
    Io(String),
}

impl ObjectStore {
    pub async fn new_s3(config: BucketConfig) -> Result<Self, BackendError> {
        let credentials_provider = Credentials::new(
            config.access_key_id,
            config.secret_access_key,
            None,
            None,
            "static",
        );

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new("auto"))
            .endpoint_url(config.endpoint)
            .credentials_provider(credentials_provider)
            .load()
            .await;

        Ok(ObjectStore::S3 {
            client: Client::new(&sdk_config),
            bucket: config.bucket,
        })
    }

    pub fn new_local(root: PathBuf) -> Self {
        ObjectStore::LocalDir { root }
    }

    /// Fetch raw bytes by key. The key must already be sanitized by the
    /// caller.
    pub async fn get(&self, key: &str) -> Result<Vec<u8>, BackendError> {
        match self {
            ObjectStore::S3 { client, bucket } => {
                let result = client
                    .get_object()
                    .bucket(bucket)
                    .key(key)
                    .send()
                    .await
                    .map_err(|e| {
                        if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                            BackendError::NotFound
                        } else {
                            BackendError::Io(e.to_string())
                        }
                    })?;

                let bytes = result
                    .body
                    .collect()
                    .await
                    .map_err(|e| BackendError::Io(e.to_string()))?
                    .into_bytes()
                    .to_vec();

                Ok(bytes)
            }
            ObjectStore::LocalDir { root } => {
                let path = root.join(key);
                tokio::fs::read(&path)
                    .await
                    .map_err(|_| BackendError::NotFound)
            }
        }
    }

    pub async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), BackendError> {
        match self {
            ObjectStore::S3 { client, bucket } => {
                client
                    .put_object()
                    .bucket(bucket)
                    .key(key)
                    .body(ByteStream::from(body))
                    .content_type(content_type)
                    .send()
                    .await
                    .map_err(|e| BackendError::Io(e.to_string()))?;
                Ok(())
            }
            ObjectStore::LocalDir { root } => {
                let path = root.join(key);
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| BackendError::Io(e.to_string()))?;
                }
                tokio::fs::write(&path, body)
                    .await
                    .map_err(|e| BackendError::Io(e.to_string()))
            }
        }
    }
}
