//! # Statement Analyzer
//!
//! Turns bank statement PDFs into a monthly cash-flow profile and a loan
//! decision.
//!
//! ## Pipeline
//!
//! - **Extraction**: statement text is sent to a chat model that returns one CSV
//!   line per transaction, plus a second call for bank metadata
//! - **Ingestion**: the CSV is parsed leniently, signed by its deposit flag and
//!   assigned a category
//! - **Analysis**: transactions are bucketed by calendar month into deposits,
//!   withdrawals and recurring-payment totals, then averaged over the statement
//! - **Classification**: a k-nearest-neighbours vote over previously labelled
//!   statements approves or denies the loan
//!
//! The pure core (everything up to classification) has no I/O. The `service`
//! feature adds the model client, blob and document storage, and the HTTP API.
//!
//! ## Example
//!
//! ```rust,ignore
//! use statement_analyzer::*;
//!
//! let (transactions, report) = transactions_from_text(model_output);
//! let data = StatementData {
//!     metadata: StatementMetadata::default(),
//!     statement_pdf_blob: "may.pdf".to_string(),
//!     transactions,
//! };
//! let analysis = build_statement_analysis(&data);
//! let approved = KNearestNeighbors::default()
//!     .fit(&labelled_statements)?
//!     .predict_analysis(&analysis)?;
//! ```

pub mod analysis;
pub mod classifier;
pub mod error;
pub mod ingestion;
pub mod schema;
pub mod utils;

#[cfg(feature = "service")]
pub mod api;
#[cfg(feature = "service")]
pub mod config;
#[cfg(feature = "service")]
pub mod llm;
#[cfg(feature = "service")]
pub mod pdf;
#[cfg(feature = "service")]
pub mod service;
#[cfg(feature = "service")]
pub mod storage;

pub use analysis::{
    build_statement_analysis, covered_months, income_ratio, monthly_means, summarize_months,
    MonthlyMeans,
};
pub use classifier::{
    feature_vector, training_samples, FeatureVector, FittedKnn, KNearestNeighbors, LabeledSample,
    DEFAULT_NEIGHBORS, FEATURE_NAMES,
};
pub use error::{Result, StatementError};
pub use ingestion::*;
pub use schema::*;
pub use utils::*;

#[cfg(feature = "service")]
pub use config::ServiceConfig;
#[cfg(feature = "service")]
pub use service::{StatementService, TrainingDatapointRequest};
