use std::path::{Path, PathBuf};

use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;

use crate::config::S3Config;
use crate::error::AppError;

#[derive(Clone)]
pub struct LocalStorage {
    upload_dir: PathBuf,
}

impl LocalStorage {
    pub fn new(upload_dir: &str) -> Self {
        Self {
            upload_dir: PathBuf::from(upload_dir),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub async fn put(&self, key: &str, data: &[u8]) -> Result<(), AppError> {
        let path = self.upload_dir.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to create directory: {e}")))?;
        }
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write file: {e}")))?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) {
        let path = self.upload_dir.join(key);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!("Failed to delete {key}: {e}");
        }
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("/api/v1/files/{key}")
    }
}

#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    public_base: String,
}

impl S3Storage {
    pub fn new(config: &S3Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "teetime-config",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint) = &config.endpoint {
            // MinIO and friends only speak path-style addressing
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let public_base = config.public_url.clone().unwrap_or_else(|| {
            format!("https://{}.s3.{}.amazonaws.com", config.bucket, config.region)
        });

        Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }

    pub async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), AppError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to upload {key}: {e}")))?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) {
        if let Err(e) = self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            tracing::warn!("Failed to delete {key}: {e}");
        }
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{key}", self.public_base)
    }
}

#[derive(Clone)]
pub enum StorageBackend {
    Local(LocalStorage),
    S3(S3Storage),
}

impl StorageBackend {
    pub fn from_config(upload_dir: &str, s3: Option<&S3Config>) -> Self {
        match s3 {
            Some(s3) => Self::S3(S3Storage::new(s3)),
            None => Self::Local(LocalStorage::new(upload_dir)),
        }
    }

    pub async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), AppError> {
        match self {
            Self::Local(s) => s.put(key, data).await,
            Self::S3(s) => s.put(key, data, content_type).await,
        }
    }

    /// Best-effort; failures are logged.
    pub async fn delete(&self, key: &str) {
        match self {
            Self::Local(s) => s.delete(key).await,
            Self::S3(s) => s.delete(key).await,
        }
    }

    pub fn public_url(&self, key: &str) -> String {
        match self {
            Self::Local(s) => s.public_url(key),
            Self::S3(s) => s.public_url(key),
        }
    }

    /// Directory to serve files from, when files live on local disk.
    pub fn local_upload_dir(&self) -> Option<&Path> {
        match self {
            Self::Local(s) => Some(s.upload_dir()),
            Self::S3(_) => None,
        }
    }
}
