//! Sensor Anomaly - isolation-forest anomaly detection for sensor telemetry

pub mod constants;
pub mod logic;

pub use logic::config::{ConfigError, DetectorConfig};
pub use logic::features::{FeatureSchema, Payload, Reading};
pub use logic::model::{AnomalyModel, IsolationForest, Label, ModelConfig};
pub use logic::service::{
    DetectRequest, DetectResult, DetectionService, ServiceError, ServiceStatus, TrainResult,
};
