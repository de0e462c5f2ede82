use crate::error::{Result, StatementError};
use crate::llm::client::LanguageModel;
use crate::llm::prompts::*;
use crate::llm::types::{CompletionRequest, ModelSettings};
use crate::llm::utils::{clean_json_output, preview};
use crate::schema::{StatementAnalysis, StatementMetadata};
use log::{debug, info};
use std::sync::Arc;

/// Runs the model calls of the statement pipeline.
#[derive(Clone)]
pub struct StatementExtractor {
    model: Arc<dyn LanguageModel>,
    settings: ModelSettings,
}

impl StatementExtractor {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            settings: ModelSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ModelSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    /// Asks the model for the statement's transactions as comma-separated lines.
    pub async fn extract_transactions_text(&self, statement_text: &str) -> Result<String> {
        info!(
            "Extracting transactions with {} ({} chars of statement text)",
            self.settings.transaction_model,
            statement_text.len()
        );

        let request = CompletionRequest::new(
            &self.settings.transaction_model,
            SYSTEM_PROMPT_TRANSACTIONS.trim(),
            transactions_prompt(statement_text),
        )
        .temperature(self.settings.temperature)
        .max_tokens(self.settings.max_tokens);

        let text = self.model.complete(request).await?;
        if text.trim().is_empty() {
            return Err(StatementError::ExtractionFailed(
                "Model returned no transactions".to_string(),
            ));
        }

        debug!("Transactions text: {}", preview(&text, 400));
        Ok(text)
    }

    /// Reads country, bank and year from the extracted transaction listing.
    pub async fn extract_metadata(&self, content: &str) -> Result<StatementMetadata> {
        info!("Extracting statement metadata with {}", self.settings.metadata_model);

        let schema = StatementMetadata::schema_as_json()?;
        let request = CompletionRequest::new(
            &self.settings.metadata_model,
            metadata_system_prompt(&schema),
            metadata_prompt(content),
        )
        .temperature(self.settings.temperature)
        .json();

        let raw = self.model.complete(request).await?;
        let metadata = parse_metadata(&raw)?;

        debug!(
            "Metadata: country={:?} bank={:?} year={:?}",
            metadata.country_code, metadata.bank_name, metadata.statement_year
        );
        Ok(metadata)
    }

    /// Writes the "Reasons for / Reasons against" rationale for an analysis.
    pub async fn generate_for_against(&self, analysis: &StatementAnalysis) -> Result<String> {
        info!("Generating loan rationale with {}", self.settings.rationale_model);

        let analysis_json = serde_json::to_string(analysis)?;
        let request = CompletionRequest::new(
            &self.settings.rationale_model,
            SYSTEM_PROMPT_RATIONALE.trim(),
            rationale_prompt(&analysis_json),
        )
        .temperature(self.settings.temperature)
        .max_tokens(self.settings.max_tokens);

        self.model.complete(request).await
    }
}

/// Accepts a bare object or a one-element array of objects.
pub fn parse_metadata(raw: &str) -> Result<StatementMetadata> {
    let cleaned = clean_json_output(raw);
    let value: serde_json::Value = serde_json::from_str(&cleaned).map_err(|e| {
        StatementError::ExtractionFailed(format!("Metadata JSON parse failed: {}", e))
    })?;

    let object = match value {
        serde_json::Value::Array(items) => items.into_iter().next().ok_or_else(|| {
            StatementError::ExtractionFailed("Metadata response was an empty array".to_string())
        })?,
        other => other,
    };

    if !object.is_object() {
        return Err(StatementError::ExtractionFailed(format!(
            "Metadata response is not a JSON object: {}",
            preview(&cleaned, 120)
        )));
    }

    Ok(serde_json::from_value(object)?)
}
