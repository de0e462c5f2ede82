use crate::error::{Result, StatementError};
use crate::llm::types::*;
use async_trait::async_trait;
use log::debug;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// A prompt-in, text-out language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: OPENAI_BASE_URL.to_string(),
        }
    }

    /// Points the client at an OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let model = request.model.clone();
        let payload = ChatCompletionRequest::from(request);

        debug!(
            "Sending chat completion to {} ({} prompt chars)",
            model,
            payload.messages.iter().map(|m| m.content.len()).sum::<usize>()
        );

        let res = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(StatementError::Llm {
                status: status.as_u16(),
                body,
            });
        }

        let body: ChatCompletionResponse = res.json().await?;

        let text = body
            .choices
            .first()
            .ok_or_else(|| StatementError::ExtractionFailed("No choices returned".to_string()))?
            .message
            .content
            .clone()
            .ok_or_else(|| {
                StatementError::ExtractionFailed("Model returned an empty message".to_string())
            })?;

        Ok(text.trim().to_string())
    }
}
