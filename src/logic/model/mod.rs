//! Model Module - Unsupervised Outlier Detection
//!
//! Tách thuật toán khỏi service layer.
//! The service only talks to `AnomalyModel`; `IsolationForest` is the one
//! implementation today.

pub mod isolation;
pub mod threshold;

use ndarray::Array2;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

// Re-export common types
pub use isolation::IsolationForest;
pub use threshold::ContaminationThreshold;

// ============================================================================
// CONFIG
// ============================================================================

pub const DEFAULT_N_ESTIMATORS: usize = 100;
pub const DEFAULT_CONTAMINATION: f64 = 0.05;
pub const DEFAULT_RANDOM_SEED: u64 = 42;

/// Estimator hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Number of isolation trees
    pub n_estimators: usize,

    /// Expected share of anomalies in training data, in (0, 0.5]
    pub contamination: f64,

    /// Seed for every random split
    pub random_seed: u64,

    /// Rows sampled per tree (None → min(256, rows))
    pub max_samples: Option<usize>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_estimators: DEFAULT_N_ESTIMATORS,
            contamination: DEFAULT_CONTAMINATION,
            random_seed: DEFAULT_RANDOM_SEED,
            max_samples: None,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.n_estimators == 0 {
            return Err(ModelError::InvalidConfig("n_estimators must be at least 1".to_string()));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(ModelError::InvalidConfig(format!(
                "contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }
        if self.max_samples == Some(0) {
            return Err(ModelError::InvalidConfig("max_samples must be at least 1".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// LABELS & ERRORS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Normal,
    Anomalous,
}

impl Label {
    pub fn is_anomaly(self) -> bool {
        self == Label::Anomalous
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("Invalid training data: {0}")]
    InvalidTrainingData(String),

    #[error("Model not trained: call train() before predict()")]
    NotTrained,

    #[error("Shape mismatch: model expects {expected} features, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),
}

// ============================================================================
// ANOMALY MODEL TRAIT
// ============================================================================

/// Capability interface for outlier detectors over scaled feature rows.
///
/// Scores follow one convention: lower = more anomalous, and a row is
/// `Anomalous` exactly when its decision score is below zero.
pub trait AnomalyModel: Send + Sync + Serialize + DeserializeOwned {
    /// Artifact kind written to disk, checked on load
    const KIND: &'static str;

    /// Fresh, untrained instance expecting `n_features` columns
    fn build(config: &ModelConfig, n_features: usize) -> Result<Self, ModelError>
    where
        Self: Sized;

    fn train(&mut self, data: &Array2<f64>) -> Result<(), ModelError>;

    fn predict(&self, data: &Array2<f64>) -> Result<Vec<Label>, ModelError>;

    fn decision_function(&self, data: &Array2<f64>) -> Result<Vec<f64>, ModelError>;

    fn is_trained(&self) -> bool;

    fn n_features(&self) -> usize;

    /// Structural check for deserialized state
    fn validate(&self) -> Result<(), String>;
}
