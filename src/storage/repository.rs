use crate::error::{Result, StatementError};
use crate::schema::StatementAnalysis;
use async_trait::async_trait;

pub const STATEMENTS_COLLECTION: &str = "statements";
pub const TRAINING_COLLECTION: &str = "training";

/// Persistence for analysed statements and the training pointers into them.
#[async_trait]
pub trait StatementRepository: Send + Sync {
    /// Creates or replaces the statement document.
    async fn save_statement(&self, id: &str, analysis: &StatementAnalysis) -> Result<()>;

    async fn get_statement(&self, id: &str) -> Result<Option<StatementAnalysis>>;

    /// Marks a stored statement as a labelled training example.
    async fn save_training_record(&self, statement_id: &str) -> Result<()>;

    /// Every statement a training record points at. Dangling pointers are skipped.
    async fn get_training_statements(&self) -> Result<Vec<StatementAnalysis>>;
}

/// Document ids become a single URL path segment.
pub fn validate_document_id(id: &str) -> Result<()> {
    let valid = !id.trim().is_empty()
        && id != "."
        && id != ".."
        && !id.contains('/')
        && id.len() <= 1500;
    if valid {
        Ok(())
    } else {
        Err(StatementError::InvalidRequest(format!(
            "Invalid document id: {:?}",
            id
        )))
    }
}
