//! Service Module - Detection Service (process-lifetime model holder)
//!
//! Holds the active (model, scaler) pair and exposes `detect` / `train`.
//!
//! # Concurrency
//! - The active pair is an immutable `Arc` behind a `RwLock`; `detect`
//!   clones the `Arc` and releases the lock before doing any math, so
//!   readers never wait on a running `train`.
//! - `train` and `reload` hold `train_lock` for their whole run; the swap
//!   itself is one pointer write under the write lock, so a reader sees the
//!   old pair or the new pair, never a mix.
//!
//! # Failure Strategy
//! - Startup: missing or unreadable artifacts → start untrained, log it.
//! - `train`: any stage failing leaves the active pair and the persisted
//!   artifacts as they were.

pub mod types;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ndarray::Array2;
use parking_lot::{Mutex, RwLock};

use crate::logic::config::{ConfigError, DetectorConfig};
use crate::logic::features::{FeatureSchema, Reading};
use crate::logic::model::{AnomalyModel, IsolationForest, Label, ModelError};
use crate::logic::preprocess::{PreprocessError, Preprocessor, StandardScaler};
use crate::logic::store::{self, PairMeta, StoreError};

pub use types::{DetectRequest, DetectResult, ServiceStatus, TrainResult, STATUS_TRAINING_COMPLETED};

// ============================================================================
// ERRORS
// ============================================================================

/// Which training stage failed, with its cause
#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error("preprocessing failed: {0}")]
    Preprocessing(#[source] PreprocessError),

    #[error("model fitting failed: {0}")]
    Fitting(#[source] ModelError),

    #[error("saving artifacts failed: {0}")]
    Persistence(#[source] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Anomaly detection model or scaler not loaded. Train the model first.")]
    ModelNotLoaded,

    #[error("Data preprocessing failed: {0}")]
    PreprocessingFailed(#[source] PreprocessError),

    #[error("Inference failed: {0}")]
    Inference(#[source] ModelError),

    #[error("No historical data provided for training")]
    NoData,

    #[error("Anomaly model training failed: {0}")]
    TrainingFailed(#[source] TrainingError),

    #[error("Reloading artifacts failed: {0}")]
    Reload(#[source] StoreError),
}

// ============================================================================
// ACTIVE PAIR
// ============================================================================

/// A model and the scaler its training data went through. Never mutated.
#[derive(Debug)]
pub struct ActivePair<M> {
    pub model: M,
    pub scaler: StandardScaler,
    pub meta: PairMeta,
}

// ============================================================================
// DETECTION SERVICE
// ============================================================================

pub struct DetectionService<M = IsolationForest> {
    config: DetectorConfig,
    preprocessor: Preprocessor,
    active: RwLock<Option<Arc<ActivePair<M>>>>,
    train_lock: Mutex<()>,
    detect_count: AtomicU64,
    anomaly_count: AtomicU64,
}

impl DetectionService<IsolationForest> {
    /// Isolation-forest service, loading persisted artifacts if present
    pub fn new(config: DetectorConfig) -> Result<Self, ConfigError> {
        Self::open(config)
    }
}

impl<M: AnomalyModel> DetectionService<M> {
    /// Validate config and try to restore the persisted pair.
    pub fn open(config: DetectorConfig) -> Result<Self, ConfigError> {
        let service = Self::empty(config)?;
        log::debug!("Feature layout: {:?}", service.schema().info());

        match store::load_for_schema::<M>(
            &service.config.model_path,
            &service.config.scaler_path,
            &service.config.features,
        ) {
            Ok(pair) => {
                log::info!(
                    "Loaded anomaly model (pair {}, trained {} on {} rows)",
                    pair.meta.pair_id,
                    pair.meta.created_at.to_rfc3339(),
                    pair.meta.training_rows
                );
                service.install(pair.model, pair.scaler, pair.meta);
            }
            Err(e) if e.is_not_found() => {
                log::info!("{}. Train the model before attempting detection.", e);
            }
            Err(e) => {
                log::warn!("Anomaly model load failed: {}. Starting untrained.", e);
            }
        }

        Ok(service)
    }

    /// Service with no active pair; nothing is read from disk.
    pub fn empty(config: DetectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            preprocessor: Preprocessor::new(config.features.clone()),
            config,
            active: RwLock::new(None),
            train_lock: Mutex::new(()),
            detect_count: AtomicU64::new(0),
            anomaly_count: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.preprocessor.schema()
    }

    pub fn is_model_loaded(&self) -> bool {
        self.active.read().is_some()
    }

    /// Snapshot of the active pair
    pub fn active_pair(&self) -> Option<Arc<ActivePair<M>>> {
        self.active.read().clone()
    }

    // ------------------------------------------------------------------------
    // DETECT
    // ------------------------------------------------------------------------

    /// Classify one reading against the active pair
    pub fn detect(
        &self,
        sensor_id: &str,
        timestamp: &str,
        reading: &Reading,
    ) -> Result<DetectResult, ServiceError> {
        let pair = self.active_pair().ok_or(ServiceError::ModelNotLoaded)?;

        let row = self
            .preprocessor
            .prepare_reading(reading, &pair.scaler)
            .map_err(ServiceError::PreprocessingFailed)?;

        let (label, score) = Self::classify(&pair.model, &row)?
            .into_iter()
            .next()
            .ok_or(ServiceError::Inference(ModelError::ShapeMismatch {
                expected: 1,
                actual: 0,
            }))?;

        Ok(self.result(sensor_id, timestamp, label, score))
    }

    /// Classify many readings at once; missing values use batch means first.
    pub fn detect_batch(
        &self,
        requests: &[DetectRequest],
    ) -> Result<Vec<DetectResult>, ServiceError> {
        let pair = self.active_pair().ok_or(ServiceError::ModelNotLoaded)?;
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let readings: Vec<Reading> = requests.iter().map(|r| r.reading.clone()).collect();
        let matrix = self
            .preprocessor
            .prepare_batch(&readings, &pair.scaler)
            .map_err(ServiceError::PreprocessingFailed)?;

        Ok(Self::classify(&pair.model, &matrix)?
            .into_iter()
            .zip(requests)
            .map(|((label, score), req)| self.result(&req.sensor_id, &req.timestamp, label, score))
            .collect())
    }

    fn classify(model: &M, matrix: &Array2<f64>) -> Result<Vec<(Label, f64)>, ServiceError> {
        let labels = model.predict(matrix).map_err(ServiceError::Inference)?;
        let scores = model.decision_function(matrix).map_err(ServiceError::Inference)?;
        Ok(labels.into_iter().zip(scores).collect())
    }

    fn result(&self, sensor_id: &str, timestamp: &str, label: Label, score: f64) -> DetectResult {
        self.detect_count.fetch_add(1, Ordering::Relaxed);
        if label.is_anomaly() {
            self.anomaly_count.fetch_add(1, Ordering::Relaxed);
            log::debug!("Anomaly on sensor {} at {} (score {:.4})", sensor_id, timestamp, score);
        }

        DetectResult {
            sensor_id: sensor_id.to_string(),
            timestamp: timestamp.to_string(),
            is_anomaly: label.is_anomaly(),
            anomaly_score: score,
            monitored_features: self.schema().names().to_vec(),
        }
    }

    // ------------------------------------------------------------------------
    // TRAIN
    // ------------------------------------------------------------------------

    /// Fit a new scaler and model on `readings`, persist them, then swap.
    pub fn train(&self, readings: &[Reading]) -> Result<TrainResult, ServiceError> {
        if readings.is_empty() {
            return Err(ServiceError::NoData);
        }

        let _guard = self.train_lock.lock();
        log::info!("Starting anomaly model training with {} data points...", readings.len());

        let (scaled, scaler) = self
            .preprocessor
            .prepare_training(readings)
            .map_err(|e| Self::training_failed(TrainingError::Preprocessing(e)))?;

        let mut model = M::build(&self.config.model, self.schema().len())
            .map_err(|e| Self::training_failed(TrainingError::Fitting(e)))?;
        model
            .train(&scaled)
            .map_err(|e| Self::training_failed(TrainingError::Fitting(e)))?;

        let meta = PairMeta::new(self.schema(), readings.len());
        store::save(
            &model,
            &scaler,
            &meta,
            &self.config.model_path,
            &self.config.scaler_path,
        )
        .map_err(|e| Self::training_failed(TrainingError::Persistence(e)))?;

        let pair_id = meta.pair_id;
        self.install(model, scaler, meta);

        log::info!("Anomaly model training completed and saved (pair {}).", pair_id);
        Ok(TrainResult::completed())
    }

    fn training_failed(cause: TrainingError) -> ServiceError {
        log::error!("Error during anomaly model training: {}", cause);
        ServiceError::TrainingFailed(cause)
    }

    /// Re-read the persisted pair and swap it in on success.
    pub fn reload(&self) -> Result<(), ServiceError> {
        let _guard = self.train_lock.lock();

        let pair = store::load_for_schema::<M>(
            &self.config.model_path,
            &self.config.scaler_path,
            &self.config.features,
        )
        .map_err(|e| {
            log::warn!("Reload skipped, keeping active pair: {}", e);
            ServiceError::Reload(e)
        })?;

        log::info!("Reloaded anomaly model (pair {})", pair.meta.pair_id);
        self.install(pair.model, pair.scaler, pair.meta);
        Ok(())
    }

    fn install(&self, model: M, scaler: StandardScaler, meta: PairMeta) {
        let pair = Arc::new(ActivePair { model, scaler, meta });
        *self.active.write() = Some(pair);
    }

    // ------------------------------------------------------------------------
    // STATUS
    // ------------------------------------------------------------------------

    pub fn status(&self) -> ServiceStatus {
        let pair = self.active_pair();
        let meta = pair.as_ref().map(|p| &p.meta);

        ServiceStatus {
            model_loaded: pair.is_some(),
            model_kind: M::KIND.to_string(),
            pair_id: meta.map(|m| m.pair_id),
            trained_at: meta.map(|m| m.created_at),
            training_rows: meta.map(|m| m.training_rows),
            layout_hash: self.schema().layout_hash(),
            detect_count: self.detect_count.load(Ordering::Relaxed),
            anomaly_count: self.anomaly_count.load(Ordering::Relaxed),
            monitored_features: self.schema().names().to_vec(),
        }
    }
}
