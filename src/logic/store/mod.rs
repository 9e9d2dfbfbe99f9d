//! Store Module - Model + Scaler persistence
//!
//! Persists a trained (model, scaler) pair as two JSON artifacts that share
//! one `pair_id`, and restores them with validation.
//!
//! # Architecture
//! - `types.rs`: `Artifact` envelope, `PairMeta`
//! - `validate.rs`: `StoreError`, envelope checks (version, kind, checksum)
//!
//! # Failure Strategy
//! - Save refuses payloads that would not pass load validation.
//! - Save writes both files to `*.tmp` first and only then renames them into
//!   place, so a failed write leaves the previous pair untouched.
//! - The previous model is parked at `*.bak` during the swap and moved back
//!   if the scaler rename fails.
//! - A pair torn anyway (new model, old scaler) is caught on load by the
//!   `pair_id` check and reported as `Corrupted`.

pub mod types;
pub mod validate;

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::logic::features::FeatureSchema;
use crate::logic::model::AnomalyModel;
use crate::logic::preprocess::StandardScaler;

pub use types::{Artifact, PairMeta, ARTIFACT_FORMAT_VERSION, SCALER_KIND};
pub use validate::StoreError;

const APP_DIR: &str = "sensor-anomaly";

// ============================================================================
// PATHS
// ============================================================================

fn default_model_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("models")
}

/// Get default model artifact path
pub fn default_model_path() -> PathBuf {
    default_model_dir().join("isolation_forest.json")
}

/// Get default scaler artifact path
pub fn default_scaler_path() -> PathBuf {
    default_model_dir().join("scaler.json")
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_owned();
    os.push(suffix);
    PathBuf::from(os)
}

// ============================================================================
// STORED PAIR
// ============================================================================

/// A restored (model, scaler) pair plus the metadata both files agree on
#[derive(Debug, Clone)]
pub struct StoredPair<M> {
    pub model: M,
    pub scaler: StandardScaler,
    pub meta: PairMeta,
}

impl<M> StoredPair<M> {
    /// Reject a pair trained against another feature schema
    pub fn check_layout(&self, schema: &FeatureSchema, path: &Path) -> Result<(), StoreError> {
        schema
            .validate_layout(self.meta.layout_hash)
            .map_err(|source| StoreError::LayoutMismatch {
                path: path.to_path_buf(),
                source,
            })
    }
}

// ============================================================================
// SAVE
// ============================================================================

/// Persist model and scaler as one logical unit
pub fn save<M: AnomalyModel>(
    model: &M,
    scaler: &StandardScaler,
    meta: &PairMeta,
    model_path: &Path,
    scaler_path: &Path,
) -> Result<(), StoreError> {
    // Never write what load would reject
    model
        .validate()
        .map_err(|reason| StoreError::persistence(model_path, invalid_data(reason)))?;
    scaler
        .validate()
        .map_err(|reason| StoreError::persistence(scaler_path, invalid_data(reason)))?;

    let model_bytes = encode(Artifact::new(M::KIND, meta.clone(), model), model_path)?;
    let scaler_bytes = encode(Artifact::new(SCALER_KIND, meta.clone(), scaler), scaler_path)?;

    let model_tmp = with_suffix(model_path, ".tmp");
    let scaler_tmp = with_suffix(scaler_path, ".tmp");
    let model_bak = with_suffix(model_path, ".bak");

    let discard_staged = || {
        let _ = fs::remove_file(&model_tmp);
        let _ = fs::remove_file(&scaler_tmp);
    };

    let staged = write_file(&model_tmp, &model_bytes)
        .and_then(|_| write_file(&scaler_tmp, &scaler_bytes));
    if let Err(e) = staged {
        discard_staged();
        return Err(e);
    }

    // Keep the previous model until the scaler is in place too
    let had_model = model_path.exists();
    if had_model {
        if let Err(e) = fs::rename(model_path, &model_bak) {
            discard_staged();
            return Err(StoreError::persistence(model_path, e));
        }
    }

    if let Err(e) = fs::rename(&model_tmp, model_path) {
        discard_staged();
        if had_model {
            restore_model(true, &model_bak, model_path);
        }
        return Err(StoreError::persistence(model_path, e));
    }

    if let Err(e) = fs::rename(&scaler_tmp, scaler_path) {
        let _ = fs::remove_file(&scaler_tmp);
        restore_model(had_model, &model_bak, model_path);
        return Err(StoreError::persistence(scaler_path, e));
    }

    if had_model {
        let _ = fs::remove_file(&model_bak);
    }

    log::info!("Model saved at {}", model_path.display());
    log::info!("Scaler saved at {}", scaler_path.display());
    Ok(())
}

/// Put the previous model back after a failed swap
fn restore_model(had_model: bool, backup: &Path, model_path: &Path) {
    let restored = if had_model {
        fs::rename(backup, model_path)
    } else {
        fs::remove_file(model_path)
    };

    if let Err(e) = restored {
        log::error!(
            "Could not restore previous model at {}: {}; pair is torn until the next save",
            model_path.display(),
            e
        );
    }
}

fn invalid_data(reason: String) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, reason)
}

fn encode<T: Serialize>(
    artifact: Result<Artifact<T>, serde_json::Error>,
    path: &Path,
) -> Result<Vec<u8>, StoreError> {
    artifact
        .and_then(|a| serde_json::to_vec_pretty(&a))
        .map_err(|e| StoreError::persistence(path, invalid_data(e.to_string())))
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    // Ensure directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::persistence(path, e))?;
    }

    let mut file = File::create(path).map_err(|e| StoreError::persistence(path, e))?;
    file.write_all(bytes)
        .and_then(|_| file.sync_all())
        .map_err(|e| StoreError::persistence(path, e))
}

// ============================================================================
// LOAD
// ============================================================================

/// Load model and scaler with validation
pub fn load<M: AnomalyModel>(
    model_path: &Path,
    scaler_path: &Path,
) -> Result<StoredPair<M>, StoreError> {
    if !model_path.exists() {
        return Err(StoreError::NotFound { kind: "Model", path: model_path.to_path_buf() });
    }
    if !scaler_path.exists() {
        return Err(StoreError::NotFound { kind: "Scaler", path: scaler_path.to_path_buf() });
    }

    let model_artifact: Artifact<M> = read_artifact(model_path, M::KIND)?;
    model_artifact
        .payload
        .validate()
        .map_err(|reason| StoreError::corrupted(model_path, reason))?;

    let scaler_artifact: Artifact<StandardScaler> = read_artifact(scaler_path, SCALER_KIND)?;
    scaler_artifact
        .payload
        .validate()
        .map_err(|reason| StoreError::corrupted(scaler_path, reason))?;

    let meta = model_artifact.meta;
    if scaler_artifact.meta.pair_id != meta.pair_id {
        return Err(StoreError::corrupted(
            scaler_path,
            format!(
                "scaler belongs to training run {}, model to {}",
                scaler_artifact.meta.pair_id, meta.pair_id
            ),
        ));
    }

    let model = model_artifact.payload;
    let scaler = scaler_artifact.payload;
    if model.n_features() != scaler.n_features() || model.n_features() != meta.feature_names.len() {
        return Err(StoreError::corrupted(
            model_path,
            format!(
                "model expects {} features, scaler {}, metadata lists {}",
                model.n_features(),
                scaler.n_features(),
                meta.feature_names.len()
            ),
        ));
    }

    log::info!("Model loaded from {} (pair {})", model_path.display(), meta.pair_id);
    log::info!("Scaler loaded from {}", scaler_path.display());

    Ok(StoredPair { model, scaler, meta })
}

/// Load and check the pair against the configured schema
pub fn load_for_schema<M: AnomalyModel>(
    model_path: &Path,
    scaler_path: &Path,
    schema: &FeatureSchema,
) -> Result<StoredPair<M>, StoreError> {
    let pair = load::<M>(model_path, scaler_path)?;
    pair.check_layout(schema, model_path)?;
    Ok(pair)
}

fn read_artifact<T: Serialize + DeserializeOwned>(
    path: &Path,
    kind: &str,
) -> Result<Artifact<T>, StoreError> {
    let data = fs::read(path).map_err(|e| StoreError::persistence(path, e))?;
    let artifact: Artifact<T> = serde_json::from_slice(&data)
        .map_err(|e| StoreError::corrupted(path, format!("invalid format: {}", e)))?;

    validate::validate_envelope(&artifact, kind, path)?;
    Ok(artifact)
}
