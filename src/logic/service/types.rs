use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logic::features::Reading;

pub const STATUS_TRAINING_COMPLETED: &str = "training_completed";

/// One reading to classify, as carried by a batch call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectRequest {
    pub sensor_id: String,
    pub timestamp: String,
    pub reading: Reading,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectResult {
    pub sensor_id: String,
    pub timestamp: String,
    pub is_anomaly: bool,
    /// Decision score; negative = anomalous, lower = more anomalous
    pub anomaly_score: f64,
    pub monitored_features: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainResult {
    pub status: String,
    pub message: String,
}

impl TrainResult {
    pub fn completed() -> Self {
        Self {
            status: STATUS_TRAINING_COMPLETED.to_string(),
            message: "Anomaly model trained and saved successfully.".to_string(),
        }
    }
}

/// Engine status for operators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub model_loaded: bool,
    pub model_kind: String,
    pub pair_id: Option<Uuid>,
    pub trained_at: Option<DateTime<Utc>>,
    pub training_rows: Option<usize>,
    pub layout_hash: u32,
    pub detect_count: u64,
    pub anomaly_count: u64,
    pub monitored_features: Vec<String>,
}
