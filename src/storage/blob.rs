use crate::error::{Result, StatementError};
use crate::storage::auth::TokenSource;
use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, StatusCode};
use std::path::{Component, Path, PathBuf};
use url::Url;

pub const DEFAULT_BUCKET: &str = "loan_originator_bucket";
const GCS_BASE_URL: &str = "https://storage.googleapis.com";

/// Read access to uploaded statement PDFs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn download(&self, name: &str) -> Result<Vec<u8>>;
}

/// Google Cloud Storage via the JSON API media download.
#[derive(Clone)]
pub struct GcsBlobStore {
    client: Client,
    bucket: String,
    token: TokenSource,
    base_url: String,
}

impl GcsBlobStore {
    pub fn new(bucket: impl Into<String>, token: TokenSource) -> Self {
        Self {
            client: Client::new(),
            bucket: bucket.into(),
            token,
            base_url: GCS_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// `{base}/storage/v1/b/{bucket}/o/{object}?alt=media`, with the object
    /// name percent-encoded as a single segment.
    pub fn media_url(&self, name: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| StatementError::Config(format!("Invalid GCS base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| StatementError::Config("GCS base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["storage", "v1", "b", self.bucket.as_str(), "o", name]);
        url.query_pairs_mut().append_pair("alt", "media");
        Ok(url)
    }
}

#[async_trait]
impl BlobStore for GcsBlobStore {
    async fn download(&self, name: &str) -> Result<Vec<u8>> {
        info!("Downloading gs://{}/{}", self.bucket, name);

        let url = self.media_url(name)?;
        let token = self.token.token().await?;
        let res = self.client.get(url).bearer_auth(token).send().await?;

        let status = res.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StatementError::not_found(&self.bucket, name));
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(StatementError::Storage(format!(
                "GCS download of {} failed (status {}): {}",
                name, status, body
            )));
        }

        let bytes = res.bytes().await?;
        debug!("Downloaded {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }
}

/// Blobs read from a local directory, for development without GCS.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if name.trim().is_empty() || escapes {
            return Err(StatementError::InvalidRequest(format!(
                "Invalid blob name: {}",
                name
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn download(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.resolve(name)?;
        debug!("Reading blob {}", path.display());
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StatementError::not_found("blobs", name))
            }
            Err(e) => Err(e.into()),
        }
    }
}
