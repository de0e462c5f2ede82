use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatementError {
    #[error("PDF text extraction failed: {0}")]
    Pdf(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("LLM API error (status {status}): {body}")]
    Llm { status: u16, body: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("{collection} document not found: {id}")]
    NotFound { collection: String, id: String },

    #[error("Not enough labelled statements to classify: need {required}, have {available}")]
    InsufficientTrainingData { required: usize, available: usize },

    #[error("Statement analysis is missing feature '{0}'")]
    MissingFeature(&'static str),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "service")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl StatementError {
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StatementError>;
