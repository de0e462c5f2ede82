//! Nearest-neighbour loan classifier.
//!
//! The model is refitted from every labelled statement on each prediction;
//! nothing is cached between calls.

use crate::error::{Result, StatementError};
use crate::schema::StatementAnalysis;
use log::{debug, warn};
use std::cmp::Ordering;

pub const DEFAULT_NEIGHBORS: usize = 3;

pub const FEATURE_NAMES: [&str; 6] = [
    "monthly_deposit_mean",
    "monthly_withdrawal_mean",
    "monthly_rent_mean",
    "monthly_utilities_mean",
    "monthly_loan_payment_mean",
    "monthly_balance_mean",
];

pub type FeatureVector = [f64; 6];

/// Extracts the classifier features in their fixed order.
pub fn feature_vector(analysis: &StatementAnalysis) -> Result<FeatureVector> {
    let raw = [
        analysis.monthly_deposit_mean,
        analysis.monthly_withdrawal_mean,
        analysis.monthly_rent_mean,
        analysis.monthly_utilities_mean,
        analysis.monthly_loan_payment_mean,
        analysis.monthly_balance_mean,
    ];

    let mut features = [0.0; 6];
    for (idx, value) in raw.into_iter().enumerate() {
        match value {
            Some(v) if v.is_finite() => features[idx] = v,
            _ => return Err(StatementError::MissingFeature(FEATURE_NAMES[idx])),
        }
    }
    Ok(features)
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSample {
    pub features: FeatureVector,
    pub approved: bool,
}

/// Builds the training set, skipping statements without a label or with
/// incomplete features.
pub fn training_samples(statements: &[StatementAnalysis]) -> Vec<LabeledSample> {
    statements
        .iter()
        .filter_map(|statement| {
            let blob = statement.statement_pdf_blob.as_deref().unwrap_or("<unknown>");
            let Some(approved) = statement.loan_decision else {
                warn!("Skipping unlabelled training statement {}", blob);
                return None;
            };
            match feature_vector(statement) {
                Ok(features) => Some(LabeledSample { features, approved }),
                Err(e) => {
                    warn!("Skipping training statement {}: {}", blob, e);
                    None
                }
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KNearestNeighbors {
    k: usize,
}

impl Default for KNearestNeighbors {
    fn default() -> Self {
        Self::new(DEFAULT_NEIGHBORS)
    }
}

impl KNearestNeighbors {
    pub fn new(k: usize) -> Self {
        Self { k: k.max(1) }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn fit(&self, statements: &[StatementAnalysis]) -> Result<FittedKnn> {
        self.fit_samples(training_samples(statements))
    }

    pub fn fit_samples(&self, samples: Vec<LabeledSample>) -> Result<FittedKnn> {
        if samples.len() < self.k {
            return Err(StatementError::InsufficientTrainingData {
                required: self.k,
                available: samples.len(),
            });
        }
        debug!("Fitted {}-NN on {} labelled statements", self.k, samples.len());
        Ok(FittedKnn {
            k: self.k,
            samples,
        })
    }
}

#[derive(Debug, Clone)]
pub struct FittedKnn {
    k: usize,
    samples: Vec<LabeledSample>,
}

impl FittedKnn {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Indices of the k closest training samples. Equal distances keep
    /// training order.
    pub fn neighbors(&self, query: &FeatureVector) -> Vec<usize> {
        let mut distances: Vec<(usize, f64)> = self
            .samples
            .iter()
            .enumerate()
            .map(|(idx, sample)| (idx, euclidean(&sample.features, query)))
            .collect();

        distances.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        distances.into_iter().take(self.k).map(|(idx, _)| idx).collect()
    }

    /// Majority vote among the neighbours; a tied vote denies.
    pub fn predict(&self, query: &FeatureVector) -> bool {
        let neighbors = self.neighbors(query);
        let approvals = neighbors
            .iter()
            .filter(|&&idx| self.samples[idx].approved)
            .count();
        let denials = neighbors.len() - approvals;
        approvals > denials
    }

    pub fn predict_analysis(&self, analysis: &StatementAnalysis) -> Result<bool> {
        Ok(self.predict(&feature_vector(analysis)?))
    }
}

fn euclidean(a: &FeatureVector, b: &FeatureVector) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement(deposit: f64, balance: f64, approved: Option<bool>) -> StatementAnalysis {
        StatementAnalysis {
            statement_pdf_blob: Some(format!("statements/{}.pdf", deposit)),
            monthly_deposit_mean: Some(deposit),
            monthly_withdrawal_mean: Some(-deposit * 0.8),
            monthly_rent_mean: Some(-1000.0),
            monthly_utilities_mean: Some(-150.0),
            monthly_loan_payment_mean: Some(0.0),
            monthly_balance_mean: Some(balance),
            loan_decision: approved,
            ..Default::default()
        }
    }

    #[test]
    fn test_feature_vector_order() {
        let s = statement(5000.0, 250.0, None);
        let features = feature_vector(&s).unwrap();
        assert_eq!(features, [5000.0, -4000.0, -1000.0, -150.0, 0.0, 250.0]);
    }

    #[test]
    fn test_missing_feature_is_reported() {
        let mut s = statement(5000.0, 250.0, None);
        s.monthly_utilities_mean = None;
        match feature_vector(&s) {
            Err(StatementError::MissingFeature(name)) => {
                assert_eq!(name, "monthly_utilities_mean")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_majority_of_three_nearest() {
        let training = vec![
            statement(8000.0, 900.0, Some(true)),
            statement(7500.0, 850.0, Some(true)),
            statement(7000.0, 700.0, Some(false)),
            statement(1000.0, 10.0, Some(false)),
            statement(1200.0, 20.0, Some(false)),
        ];
        let model = KNearestNeighbors::default().fit(&training).unwrap();

        assert!(model.predict_analysis(&statement(7800.0, 880.0, None)).unwrap());
        assert!(!model.predict_analysis(&statement(1100.0, 15.0, None)).unwrap());
    }

    #[test]
    fn test_unlabelled_and_incomplete_statements_are_skipped() {
        let mut incomplete = statement(3000.0, 100.0, Some(true));
        incomplete.monthly_rent_mean = None;

        let training = vec![
            statement(8000.0, 900.0, Some(true)),
            statement(7000.0, 700.0, None),
            incomplete,
        ];
        assert_eq!(training_samples(&training).len(), 1);

        match KNearestNeighbors::default().fit(&training) {
            Err(StatementError::InsufficientTrainingData {
                required,
                available,
            }) => {
                assert_eq!(required, 3);
                assert_eq!(available, 1);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_distance_ties_keep_training_order() {
        let samples = vec![
            LabeledSample {
                features: [1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                approved: true,
            },
            LabeledSample {
                features: [-1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                approved: false,
            },
            LabeledSample {
                features: [0.0, 5.0, 0.0, 0.0, 0.0, 0.0],
                approved: false,
            },
        ];
        let model = KNearestNeighbors::new(1).fit_samples(samples).unwrap();
        let query = [0.0; 6];
        assert_eq!(model.neighbors(&query), vec![0]);
        assert!(model.predict(&query));
    }

    #[test]
    fn test_even_vote_denies() {
        let samples = vec![
            LabeledSample {
                features: [0.0; 6],
                approved: true,
            },
            LabeledSample {
                features: [1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                approved: false,
            },
        ];
        let model = KNearestNeighbors::new(2).fit_samples(samples).unwrap();
        assert!(!model.predict(&[0.5, 0.0, 0.0, 0.0, 0.0, 0.0]));
    }

    #[test]
    fn test_prediction_is_deterministic() {
        let training = vec![
            statement(4000.0, 300.0, Some(true)),
            statement(4100.0, 320.0, Some(false)),
            statement(3900.0, 280.0, Some(true)),
            statement(2000.0, 50.0, Some(false)),
        ];
        let query = statement(4050.0, 310.0, None);
        let first = KNearestNeighbors::default()
            .fit(&training)
            .unwrap()
            .predict_analysis(&query)
            .unwrap();
        for _ in 0..5 {
            let again = KNearestNeighbors::default()
                .fit(&training)
                .unwrap()
                .predict_analysis(&query)
                .unwrap();
            assert_eq!(first, again);
        }
    }
}
