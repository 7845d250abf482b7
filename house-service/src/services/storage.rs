use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Deserialize;
use service_core::error::AppError;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::sync::Mutex;

pub const GCS_API_BASE: &str = "https://storage.googleapis.com";
pub const GCS_PUBLIC_BASE: &str = "https://storage.googleapis.com";

/// Blob storage with public, unsigned retrieval URLs.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `data` under `key`, publicly readable.
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), AppError>;

    /// Retrieval URL for `key`; a pure function of the backend's base
    /// address and the key.
    fn public_url(&self, key: &str) -> String;
}

/// Files on local disk, served back by the router under `/files`.
pub struct LocalStorage {
    base_path: PathBuf,
    public_base_url: String,
}

impl LocalStorage {
    pub async fn new(
        base_path: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
    ) -> Result<Self, AppError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await?;
        }
        Ok(Self {
            base_path,
            public_base_url: public_base_url.into(),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), AppError> {
        // keys come from client filenames; keep them inside base_path
        let relative = Path::new(key);
        if !relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
        {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invalid object key: {}",
                key
            )));
        }

        let path = self.base_path.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;

        tracing::debug!(path = %path.display(), content_type = %content_type, "Stored object on local disk");
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), key)
    }
}

pub const GCS_METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh a cached token this long before it expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Where `GcsStorage` gets its bearer token.
pub enum GcsTokenSource {
    /// A fixed OAuth access token. These expire after about an hour, so this
    /// only suits short runs and tests.
    Static(String),
    /// The instance metadata server (Compute Engine, Cloud Run, GKE), asked
    /// again shortly before each token expires.
    Metadata { url: String },
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Google Cloud Storage via the JSON API media upload.
pub struct GcsStorage {
    client: Client,
    api_base: String,
    bucket: String,
    token_source: GcsTokenSource,
    cached_token: Mutex<Option<CachedToken>>,
}

impl GcsStorage {
    pub fn new(
        bucket: impl Into<String>,
        access_token: impl Into<String>,
        api_base: Option<String>,
    ) -> Self {
        Self::with_token_source(bucket, GcsTokenSource::Static(access_token.into()), api_base)
    }

    pub fn with_token_source(
        bucket: impl Into<String>,
        token_source: GcsTokenSource,
        api_base: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.unwrap_or_else(|| GCS_API_BASE.to_string()),
            bucket: bucket.into(),
            token_source,
            cached_token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String, AppError> {
        let url = match &self.token_source {
            GcsTokenSource::Static(token) => return Ok(token.clone()),
            GcsTokenSource::Metadata { url } => url,
        };

        let mut cached = self.cached_token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let response = self
            .client
            .get(url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::StorageError(anyhow::anyhow!(
                "Metadata server refused an access token with {}",
                status
            )));
        }

        let token: MetadataToken = response.json().await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        tracing::debug!(expires_in = token.expires_in, "Fetched GCS access token from metadata server");

        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });

        Ok(token.access_token)
    }
}

#[async_trait]
impl Storage for GcsStorage {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), AppError> {
        let url = format!(
            "{}/upload/storage/v1/b/{}/o",
            self.api_base.trim_end_matches('/'),
            self.bucket
        );
        let access_token = self.access_token().await?;

        let response = self
            .client
            .post(&url)
            .query(&[
                ("uploadType", "media"),
                ("name", key),
                ("predefinedAcl", "publicRead"),
            ])
            .bearer_auth(access_token)
            .header(header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(bucket = %self.bucket, key = %key, "GCS request failed: {}", e);
                AppError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::StorageError(anyhow::anyhow!(
                "GCS upload of {} to bucket {} failed with {}: {}",
                key,
                self.bucket,
                status,
                body
            )));
        }

        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", GCS_PUBLIC_BASE, self.bucket, key)
    }
}
