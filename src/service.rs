use crate::analysis::build_statement_analysis;
use crate::classifier::KNearestNeighbors;
use crate::error::{Result, StatementError};
use crate::ingestion::transactions_from_text;
use crate::llm::StatementExtractor;
use crate::pdf::extract_text_from_pdf;
use crate::schema::{LoanPredictionResponse, StatementAnalysis, StatementData};
use crate::storage::{BlobStore, StatementRepository};
use log::{info, warn};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Body of a training-label request. At least one of the reference or the
/// analysis must be present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrainingDatapointRequest {
    #[serde(default)]
    pub statement_analysis_ref: Option<String>,
    #[serde(default)]
    pub statement_analysis: Option<StatementAnalysis>,
    /// Overrides the stored loan decision when present.
    #[serde(default)]
    pub loan_decision: Option<bool>,
}

impl TrainingDatapointRequest {
    pub fn for_ref(statement_analysis_ref: impl Into<String>) -> Self {
        Self {
            statement_analysis_ref: Some(statement_analysis_ref.into()),
            ..Default::default()
        }
    }
}

/// The statement pipeline: download, extract, aggregate, classify, persist.
#[derive(Clone)]
pub struct StatementService {
    blobs: Arc<dyn BlobStore>,
    repository: Arc<dyn StatementRepository>,
    extractor: StatementExtractor,
    classifier: KNearestNeighbors,
}

impl StatementService {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        repository: Arc<dyn StatementRepository>,
        extractor: StatementExtractor,
    ) -> Self {
        Self {
            blobs,
            repository,
            extractor,
            classifier: KNearestNeighbors::default(),
        }
    }

    pub fn with_classifier(mut self, classifier: KNearestNeighbors) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn repository(&self) -> &Arc<dyn StatementRepository> {
        &self.repository
    }

    /// Downloads the PDF and turns it into metadata plus cleaned transactions.
    pub async fn process_statement_pdf(&self, statement_pdf_blob: &str) -> Result<StatementData> {
        let blob = statement_pdf_blob.trim();
        if blob.is_empty() {
            return Err(StatementError::InvalidRequest(
                "statement_pdf_blob is required".to_string(),
            ));
        }

        let bytes = self.blobs.download(blob).await?;
        let statement_text = tokio::task::spawn_blocking(move || extract_text_from_pdf(&bytes))
            .await
            .map_err(|e| StatementError::Pdf(format!("Text extraction task failed: {}", e)))??;

        self.process_statement_text(blob, &statement_text).await
    }

    /// Runs the model extraction steps on already-extracted statement text.
    pub async fn process_statement_text(
        &self,
        statement_pdf_blob: &str,
        statement_text: &str,
    ) -> Result<StatementData> {
        let transactions_text = self
            .extractor
            .extract_transactions_text(statement_text)
            .await?;

        let (transactions, report) = transactions_from_text(&transactions_text);
        if transactions.is_empty() {
            return Err(StatementError::ExtractionFailed(format!(
                "No usable transactions in model output ({} lines read, {} skipped, {} dropped)",
                report.lines_read, report.lines_skipped, report.rows_dropped
            )));
        }
        info!(
            "Extracted {} transactions from {}",
            transactions.len(),
            statement_pdf_blob
        );

        let metadata = self.extractor.extract_metadata(&transactions_text).await?;

        Ok(StatementData {
            metadata,
            statement_pdf_blob: statement_pdf_blob.to_string(),
            transactions,
        })
    }

    /// Aggregates the statement and asks the model for its rationale.
    pub async fn analyze_statement(&self, data: &StatementData) -> Result<StatementAnalysis> {
        let mut analysis = build_statement_analysis(data);
        analysis.for_against = Some(self.extractor.generate_for_against(&analysis).await?);
        Ok(analysis)
    }

    /// Fits a fresh k-NN on every labelled statement and classifies this one.
    pub async fn predict_loan_decision(&self, analysis: &StatementAnalysis) -> Result<bool> {
        let training = self.repository.get_training_statements().await?;
        let model = self.classifier.fit(&training)?;
        let approved = model.predict_analysis(analysis)?;
        info!(
            "Loan decision from {}-NN over {} statements: {}",
            self.classifier.k(),
            model.len(),
            if approved { "approve" } else { "deny" }
        );
        Ok(approved)
    }

    /// Full pipeline for one uploaded statement.
    pub async fn get_loan_prediction(
        &self,
        statement_pdf_blob: &str,
    ) -> Result<LoanPredictionResponse> {
        info!("Loan prediction requested for {}", statement_pdf_blob);

        let data = self.process_statement_pdf(statement_pdf_blob).await?;
        let mut analysis = self.analyze_statement(&data).await?;
        analysis.loan_decision = Some(self.predict_loan_decision(&analysis).await?);

        let statement_id = Uuid::new_v4().to_string();
        self.repository
            .save_statement(&statement_id, &analysis)
            .await?;

        Ok(LoanPredictionResponse {
            statement_analysis: analysis,
            statement_analysis_ref: statement_id,
        })
    }

    /// Marks a statement as a training example and returns its id.
    ///
    /// A referenced statement must already exist and only its label may
    /// change; the label comes from `loan_decision`, else from the inline
    /// analysis. An inline analysis without a reference is stored under a
    /// new id.
    pub async fn save_training_datapoint(&self, request: TrainingDatapointRequest) -> Result<String> {
        let statement_ref = request
            .statement_analysis_ref
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        let (statement_id, mut analysis, changed, label) =
            match (statement_ref, request.statement_analysis) {
                (None, None) => {
                    return Err(StatementError::InvalidRequest(
                        "statement_analysis_ref or statement_analysis is required".to_string(),
                    ))
                }
                (None, Some(analysis)) => {
                    (Uuid::new_v4().to_string(), analysis, true, request.loan_decision)
                }
                (Some(id), inline) => {
                    let stored = self
                        .repository
                        .get_statement(&id)
                        .await?
                        .ok_or_else(|| StatementError::not_found("statements", &id))?;
                    let label = request
                        .loan_decision
                        .or_else(|| inline.and_then(|a| a.loan_decision));
                    (id, stored, false, label)
                }
            };

        let relabelled = match label {
            Some(label) if analysis.loan_decision != Some(label) => {
                analysis.loan_decision = Some(label);
                true
            }
            _ => false,
        };

        if changed || relabelled {
            self.repository
                .save_statement(&statement_id, &analysis)
                .await?;
        }

        if analysis.loan_decision.is_none() {
            warn!(
                "Statement {} has no loan decision and will be ignored by the classifier",
                statement_id
            );
        }

        self.repository.save_training_record(&statement_id).await?;
        info!("Saved training record for {}", statement_id);
        Ok(statement_id)
    }
}
