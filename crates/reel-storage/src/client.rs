//! Cloudflare R2 backend, spoken to over the S3 API.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::Object;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::store::{new_object_key, ObjectInfo, ObjectStore, StoredObject};

/// Default lifetime of URLs returned by [`ObjectStore::put`].
const DEFAULT_PRESIGN_EXPIRY_SECS: u64 = 24 * 60 * 60;

const DEFAULT_REGION: &str = "auto";

/// Connection settings for an R2 bucket.
#[derive(Debug, Clone)]
pub struct R2Config {
    /// S3 API endpoint of the account
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
    /// Usually "auto" for R2
    pub region: String,
    /// Lifetime of presigned export URLs
    pub presign_expiry: Duration,
}

impl R2Config {
    /// Read `R2_*` environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: required_env("R2_ENDPOINT_URL")?,
            access_key_id: required_env("R2_ACCESS_KEY_ID")?,
            secret_access_key: required_env("R2_SECRET_ACCESS_KEY")?,
            bucket_name: required_env("R2_BUCKET_NAME")?,
            region: std::env::var("R2_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string()),
            presign_expiry: Duration::from_secs(
                std::env::var("R2_PRESIGN_EXPIRY_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_PRESIGN_EXPIRY_SECS),
            ),
        })
    }
}

fn required_env(name: &str) -> StorageResult<String> {
    std::env::var(name).map_err(|_| StorageError::Config(format!("{name} is not set")))
}

/// [`ObjectStore`] over a single R2 bucket.
#[derive(Clone)]
pub struct R2Client {
    client: Client,
    bucket: String,
    presign_expiry: Duration,
}

impl R2Client {
    pub fn new(config: R2Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "r2",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
            presign_expiry: config.presign_expiry,
        }
    }

    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(R2Config::from_env()?))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Fail fast at startup when the bucket cannot be reached.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| {
                StorageError::Unreachable(format!("bucket {}: {}", self.bucket, DisplayErrorContext(e)))
            })?;
        Ok(())
    }

    async fn put_body(&self, key: &str, body: ByteStream, content_type: &str) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::write(key, DisplayErrorContext(e)))?;
        Ok(())
    }

    /// Write bytes to an exact key.
    pub async fn upload_bytes(&self, data: Vec<u8>, key: &str, content_type: &str) -> StorageResult<()> {
        debug!(key, bytes = data.len(), "Uploading object");
        self.put_body(key, ByteStream::from(data), content_type).await
    }

    /// Stream a local file to an exact key.
    pub async fn upload_file(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<()> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::write(key, format!("cannot read {}: {e}", path.display())))?;
        self.put_body(key, body, content_type).await?;
        info!(key, path = %path.display(), "Uploaded file");
        Ok(())
    }

    pub async fn download_bytes(&self, key: &str) -> StorageResult<Vec<u8>> {
        debug!(key, "Downloading object");

        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let e = e.into_service_error();
                return Err(if e.is_no_such_key() {
                    StorageError::not_found(key)
                } else {
                    StorageError::read(key, DisplayErrorContext(e))
                });
            }
        };

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::read(key, e))?;
        Ok(body.into_bytes().to_vec())
    }

    /// Temporary signed GET URL for a private object.
    pub async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let presign_error = |reason: String| StorageError::Presign {
            key: key.to_string(),
            reason,
        };

        let presign_config =
            PresigningConfig::expires_in(expires_in).map_err(|e| presign_error(e.to_string()))?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| presign_error(DisplayErrorContext(e).to_string()))?;

        Ok(presigned.uri().to_string())
    }

    /// Every object under `prefix`, across result pages.
    pub async fn list_objects(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut objects = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| StorageError::List {
                prefix: prefix.to_string(),
                reason: DisplayErrorContext(e).to_string(),
            })?;
            objects.extend(page.contents().iter().map(object_info));
        }

        debug!(prefix, count = objects.len(), "Listed objects");
        Ok(objects)
    }

    async fn stored(&self, key: String) -> StorageResult<StoredObject> {
        let url = self.presign_get(&key, self.presign_expiry).await?;
        Ok(StoredObject { key, url })
    }
}

fn object_info(object: &Object) -> ObjectInfo {
    ObjectInfo {
        key: object.key().unwrap_or_default().to_string(),
        size: object.size().unwrap_or(0).max(0) as u64,
        modified_at: object
            .last_modified()
            .and_then(|t| t.to_millis().ok())
            .and_then(DateTime::<Utc>::from_timestamp_millis),
    }
}

#[async_trait]
impl ObjectStore for R2Client {
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.download_bytes(key).await
    }

    async fn put(
        &self,
        data: Vec<u8>,
        key_prefix: &str,
        extension: &str,
        content_type: &str,
    ) -> StorageResult<StoredObject> {
        let key = new_object_key(key_prefix, extension);
        self.upload_bytes(data, &key, content_type).await?;
        self.stored(key).await
    }

    // Streams from disk instead of buffering the whole export.
    async fn put_file(
        &self,
        path: &Path,
        key_prefix: &str,
        content_type: &str,
    ) -> StorageResult<StoredObject> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let key = new_object_key(key_prefix, extension);
        self.upload_file(path, &key, content_type).await?;
        self.stored(key).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        self.list_objects(prefix).await
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let e = e.into_service_error();
                if e.is_not_found() {
                    Ok(false)
                } else {
                    Err(StorageError::read(key, DisplayErrorContext(e)))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::primitives::DateTime as S3DateTime;

    #[test]
    fn test_object_info_from_listing() {
        let object = Object::builder()
            .key("projects/p1/scenes/s1/render.mp4")
            .size(2048)
            .last_modified(S3DateTime::from_secs(1_700_000_000))
            .build();

        let info = object_info(&object);
        assert_eq!(info.key, "projects/p1/scenes/s1/render.mp4");
        assert_eq!(info.size, 2048);
        assert_eq!(info.modified_at.unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_object_info_tolerates_missing_fields() {
        let info = object_info(&Object::builder().build());
        assert_eq!(info.key, "");
        assert_eq!(info.size, 0);
        assert!(info.modified_at.is_none());
    }

    #[test]
    fn test_new_client_keeps_bucket() {
        let client = R2Client::new(R2Config {
            endpoint_url: "https://account.r2.cloudflarestorage.com".to_string(),
            access_key_id: "key".to_string(),
            secret_access_key: "secret".to_string(),
            bucket_name: "reels".to_string(),
            region: DEFAULT_REGION.to_string(),
            presign_expiry: Duration::from_secs(60),
        });
        assert_eq!(client.bucket(), "reels");
    }
}
