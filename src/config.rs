use crate::classifier::{KNearestNeighbors, DEFAULT_NEIGHBORS};
use crate::error::{Result, StatementError};
use crate::llm::client::OPENAI_BASE_URL;
use crate::llm::types::ModelSettings;
use crate::llm::{OpenAiClient, StatementExtractor};
use crate::service::StatementService;
use crate::storage::firestore::DEFAULT_DATABASE;
use crate::storage::{
    BlobStore, FirestoreRepository, GcsBlobStore, InMemoryRepository, LocalBlobStore,
    StatementRepository, TokenSource, DEFAULT_BUCKET,
};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerSection,
    pub llm: LlmSection,
    pub storage: StorageSection,
    pub classifier: ClassifierSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind_addr: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub api_key: Option<String>,
    pub base_url: String,
    #[serde(flatten)]
    pub models: ModelSettings,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: OPENAI_BASE_URL.to_string(),
            models: ModelSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobBackend {
    Gcs,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryBackend {
    Firestore,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub blob_backend: BlobBackend,
    pub bucket: String,
    /// Root directory for the `local` blob backend.
    pub local_root: PathBuf,
    pub repository: RepositoryBackend,
    pub project_id: Option<String>,
    pub database: String,
    /// Static OAuth token; the metadata server is used when absent.
    pub access_token: Option<String>,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            blob_backend: BlobBackend::Gcs,
            bucket: DEFAULT_BUCKET.to_string(),
            local_root: PathBuf::from("."),
            repository: RepositoryBackend::Firestore,
            project_id: None,
            database: DEFAULT_DATABASE.to_string(),
            access_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSection {
    pub neighbors: usize,
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            neighbors: DEFAULT_NEIGHBORS,
        }
    }
}

impl ServiceConfig {
    /// Defaults, then the TOML file if given, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
            .map_err(|e| StatementError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| StatementError::Config(e.to_string()))
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("OPENAI_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = get("GCP_PROJECT_ID") {
            self.storage.project_id = Some(v);
        }
        if let Some(v) = get("GCS_BUCKET_NAME") {
            self.storage.bucket = v;
        }
        if let Some(v) = get("GOOGLE_OAUTH_ACCESS_TOKEN") {
            self.storage.access_token = Some(v);
        }
        if let Some(v) = get("BIND_ADDR") {
            self.server.bind_addr = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.llm.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            return Err(StatementError::Config(
                "llm.api_key (or OPENAI_API_KEY) must be set".to_string(),
            ));
        }
        if self.storage.repository == RepositoryBackend::Firestore
            && self.storage.project_id.is_none()
        {
            return Err(StatementError::Config(
                "storage.project_id (or GCP_PROJECT_ID) is required for the firestore repository"
                    .to_string(),
            ));
        }
        if self.storage.blob_backend == BlobBackend::Gcs && self.storage.bucket.trim().is_empty() {
            return Err(StatementError::Config("storage.bucket must not be empty".to_string()));
        }
        if self.classifier.neighbors == 0 {
            return Err(StatementError::Config(
                "classifier.neighbors must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn extractor(&self) -> Result<StatementExtractor> {
        let api_key = self
            .llm
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| StatementError::Config("OpenAI API key is not set".to_string()))?;
        let client = OpenAiClient::new(api_key).with_base_url(self.llm.base_url.clone());
        Ok(StatementExtractor::new(Arc::new(client)).with_settings(self.llm.models.clone()))
    }

    pub fn blob_store(&self) -> Arc<dyn BlobStore> {
        match self.storage.blob_backend {
            BlobBackend::Gcs => {
                let token = TokenSource::from_config(self.storage.access_token.clone());
                Arc::new(GcsBlobStore::new(self.storage.bucket.clone(), token))
            }
            BlobBackend::Local => Arc::new(LocalBlobStore::new(self.storage.local_root.clone())),
        }
    }

    pub fn repository(&self) -> Result<Arc<dyn StatementRepository>> {
        match self.storage.repository {
            RepositoryBackend::Firestore => {
                let project_id = self.storage.project_id.clone().ok_or_else(|| {
                    StatementError::Config("Firestore project id is not set".to_string())
                })?;
                let token = TokenSource::from_config(self.storage.access_token.clone());
                Ok(Arc::new(
                    FirestoreRepository::new(project_id, token)
                        .with_database(self.storage.database.clone()),
                ))
            }
            RepositoryBackend::Memory => Ok(Arc::new(InMemoryRepository::new())),
        }
    }

    /// Validates the configuration and wires up the backends it names.
    pub fn build_service(&self) -> Result<StatementService> {
        self.validate()?;
        info!(
            "Using {:?} blobs and {:?} repository, {}-NN classifier",
            self.storage.blob_backend, self.storage.repository, self.classifier.neighbors
        );
        Ok(StatementService::new(self.blob_store(), self.repository()?, self.extractor()?)
            .with_classifier(KNearestNeighbors::new(self.classifier.neighbors)))
    }
}
