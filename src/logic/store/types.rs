use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::logic::features::FeatureSchema;

/// Bump when the envelope layout changes
pub const ARTIFACT_FORMAT_VERSION: u8 = 1;

pub const SCALER_KIND: &str = "standard_scaler";

// ============================================================================
// PAIR METADATA
// ============================================================================

/// Identity shared by a model and the scaler it was trained behind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairMeta {
    pub pair_id: Uuid,
    pub layout_hash: u32,
    pub feature_names: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub training_rows: usize,
}

impl PairMeta {
    pub fn new(schema: &FeatureSchema, training_rows: usize) -> Self {
        Self {
            pair_id: Uuid::new_v4(),
            layout_hash: schema.layout_hash(),
            feature_names: schema.names().to_vec(),
            created_at: Utc::now(),
            training_rows,
        }
    }
}

// ============================================================================
// ARTIFACT ENVELOPE
// ============================================================================

/// On-disk wrapper around one persisted object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact<T> {
    pub format_version: u8,
    pub kind: String,
    pub meta: PairMeta,
    /// SHA-256 (hex) of the payload's JSON encoding
    pub checksum: String,
    pub payload: T,
}

impl<T: Serialize> Artifact<T> {
    pub fn new(kind: &str, meta: PairMeta, payload: T) -> Result<Self, serde_json::Error> {
        let checksum = payload_checksum(&payload)?;
        Ok(Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            kind: kind.to_string(),
            meta,
            checksum,
            payload,
        })
    }
}

pub fn payload_checksum<T: Serialize>(payload: &T) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(payload)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}
