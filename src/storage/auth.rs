use crate::error::{Result, StatementError};
use reqwest::Client;
use serde::Deserialize;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Where Google Cloud access tokens come from.
#[derive(Clone)]
pub enum TokenSource {
    /// A pre-issued OAuth access token (e.g. `gcloud auth print-access-token`).
    Static(String),
    /// The GCE / Cloud Run metadata server of the running instance.
    MetadataServer { client: Client, url: String },
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
}

impl TokenSource {
    pub fn from_config(access_token: Option<String>) -> Self {
        match access_token.filter(|t| !t.trim().is_empty()) {
            Some(token) => Self::Static(token),
            None => Self::MetadataServer {
                client: Client::new(),
                url: METADATA_TOKEN_URL.to_string(),
            },
        }
    }

    pub async fn token(&self) -> Result<String> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::MetadataServer { client, url } => {
                let res = client
                    .get(url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await?;

                let status = res.status();
                if !status.is_success() {
                    return Err(StatementError::Storage(format!(
                        "Metadata server token request failed (status {})",
                        status
                    )));
                }

                let token: MetadataToken = res.json().await?;
                Ok(token.access_token)
            }
        }
    }
}
