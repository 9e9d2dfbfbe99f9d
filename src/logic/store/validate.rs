use std::path::{Path, PathBuf};

use serde::Serialize;

use super::types::{payload_checksum, Artifact, ARTIFACT_FORMAT_VERSION};
use crate::logic::features::LayoutMismatchError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} artifact not found at {}", .path.display())]
    NotFound { kind: &'static str, path: PathBuf },

    #[error("Corrupted artifact {}: {reason}", .path.display())]
    Corrupted { path: PathBuf, reason: String },

    #[error("Failed to persist {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Artifact {} was trained for another feature layout: {source}", .path.display())]
    LayoutMismatch {
        path: PathBuf,
        #[source]
        source: LayoutMismatchError,
    },
}

impl StoreError {
    pub fn corrupted(path: &Path, reason: impl Into<String>) -> Self {
        StoreError::Corrupted {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn persistence(path: &Path, source: std::io::Error) -> Self {
        StoreError::Persistence {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Validate envelope fields that don't depend on the payload type
pub fn validate_envelope<T: Serialize>(
    artifact: &Artifact<T>,
    expected_kind: &str,
    path: &Path,
) -> Result<(), StoreError> {
    if artifact.format_version != ARTIFACT_FORMAT_VERSION {
        return Err(StoreError::corrupted(
            path,
            format!(
                "unsupported format version {} (expected {})",
                artifact.format_version, ARTIFACT_FORMAT_VERSION
            ),
        ));
    }

    if artifact.kind != expected_kind {
        return Err(StoreError::corrupted(
            path,
            format!("expected a {} artifact, found {}", expected_kind, artifact.kind),
        ));
    }

    let actual = payload_checksum(&artifact.payload)
        .map_err(|e| StoreError::corrupted(path, format!("payload not re-encodable: {}", e)))?;
    if actual != artifact.checksum {
        return Err(StoreError::corrupted(path, "checksum mismatch"));
    }

    Ok(())
}
