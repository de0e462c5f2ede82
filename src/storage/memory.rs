use crate::error::{Result, StatementError};
use crate::schema::{StatementAnalysis, TrainingRecord};
use crate::storage::repository::{validate_document_id, StatementRepository};
use async_trait::async_trait;
use log::warn;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Process-local repository. Documents are kept as JSON, as a document
/// store would hold them.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    statements: RwLock<BTreeMap<String, serde_json::Value>>,
    training: RwLock<BTreeMap<String, TrainingRecord>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a raw document as-is, bypassing serialisation.
    pub fn insert_raw_statement(&self, id: &str, doc: serde_json::Value) -> Result<()> {
        validate_document_id(id)?;
        self.statements
            .write()
            .map_err(poisoned)?
            .insert(id.to_string(), doc);
        Ok(())
    }

    pub fn statement_count(&self) -> usize {
        self.statements.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn training_ids(&self) -> Vec<String> {
        self.training
            .read()
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default()
    }
}

fn poisoned<T>(_: T) -> StatementError {
    StatementError::Storage("In-memory repository lock poisoned".to_string())
}

#[async_trait]
impl StatementRepository for InMemoryRepository {
    async fn save_statement(&self, id: &str, analysis: &StatementAnalysis) -> Result<()> {
        validate_document_id(id)?;
        let doc = serde_json::to_value(analysis)?;
        self.statements
            .write()
            .map_err(poisoned)?
            .insert(id.to_string(), doc);
        Ok(())
    }

    async fn get_statement(&self, id: &str) -> Result<Option<StatementAnalysis>> {
        validate_document_id(id)?;
        let doc = self.statements.read().map_err(poisoned)?.get(id).cloned();
        doc.map(serde_json::from_value::<StatementAnalysis>)
            .transpose()
            .map_err(StatementError::from)
    }

    async fn save_training_record(&self, statement_id: &str) -> Result<()> {
        validate_document_id(statement_id)?;
        self.training.write().map_err(poisoned)?.insert(
            statement_id.to_string(),
            TrainingRecord {
                statement_ref: statement_id.to_string(),
            },
        );
        Ok(())
    }

    async fn get_training_statements(&self) -> Result<Vec<StatementAnalysis>> {
        let refs: Vec<String> = self
            .training
            .read()
            .map_err(poisoned)?
            .values()
            .map(|r| r.statement_ref.clone())
            .collect();

        let statements = self.statements.read().map_err(poisoned)?;
        let mut out = Vec::with_capacity(refs.len());
        for statement_ref in refs {
            let Some(doc) = statements.get(&statement_ref) else {
                warn!("Training record points at missing statement {}", statement_ref);
                continue;
            };
            match serde_json::from_value::<StatementAnalysis>(doc.clone()) {
                Ok(statement) => out.push(statement),
                Err(e) => warn!("Skipping undecodable statement {}: {}", statement_ref, e),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(bank: &str, approved: Option<bool>) -> StatementAnalysis {
        StatementAnalysis {
            bank_name: Some(bank.to_string()),
            loan_decision: approved,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_save_and_get_statement() {
        let repo = InMemoryRepository::new();
        repo.save_statement("a", &analysis("First Bank", Some(true)))
            .await
            .unwrap();

        let loaded = repo.get_statement("a").await.unwrap().unwrap();
        assert_eq!(loaded.bank_name.as_deref(), Some("First Bank"));
        assert!(repo.get_statement("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_training_statements_follow_pointers() {
        let repo = InMemoryRepository::new();
        repo.save_statement("a", &analysis("A", Some(true))).await.unwrap();
        repo.save_statement("b", &analysis("B", Some(false))).await.unwrap();
        repo.save_statement("c", &analysis("C", None)).await.unwrap();

        repo.save_training_record("a").await.unwrap();
        repo.save_training_record("b").await.unwrap();
        repo.save_training_record("ghost").await.unwrap();
        repo.save_training_record("a").await.unwrap();

        let training = repo.get_training_statements().await.unwrap();
        let banks: Vec<_> = training
            .iter()
            .map(|s| s.bank_name.clone().unwrap())
            .collect();
        assert_eq!(banks, vec!["A", "B"]);
        assert_eq!(repo.training_ids(), vec!["a", "b", "ghost"]);
    }

    #[tokio::test]
    async fn test_legacy_and_broken_documents() {
        let repo = InMemoryRepository::new();
        repo.insert_raw_statement(
            "legacy",
            serde_json::json!({
                "bank_name": "Old Bank",
                "monthly_deposit_mean": 2500.0,
                "transactions": [
                    {"Date": "2023-03", "Transaction Details": "PAYROLL", "Amount": 2500.0, "Category": "Deposits - Salary Paycheck"}
                ],
                "loan_decision": 1
            }),
        )
        .unwrap();
        repo.insert_raw_statement("broken", serde_json::json!({ "transactions": "oops" }))
            .unwrap();
        repo.save_training_record("legacy").await.unwrap();
        repo.save_training_record("broken").await.unwrap();

        let training = repo.get_training_statements().await.unwrap();
        assert_eq!(training.len(), 1);
        assert_eq!(training[0].bank_name.as_deref(), Some("Old Bank"));
        assert_eq!(training[0].loan_decision, Some(true));
        assert_eq!(
            training[0].transactions[0].date,
            chrono::NaiveDate::from_ymd_opt(2023, 3, 1)
        );
    }

    #[tokio::test]
    async fn test_invalid_ids_are_rejected() {
        let repo = InMemoryRepository::new();
        assert!(repo.save_training_record("x/y").await.is_err());
        assert_eq!(repo.statement_count(), 0);
    }
}
