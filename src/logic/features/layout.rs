//! Feature Layout - Centralized Feature Definition
//!
//! **This file controls the feature schema**
//!
//! ## Rules (NEVER break these):
//! 1. Add feature → new layout hash
//! 2. Change order → new layout hash
//! 3. Change the encoding of a vector → increment FEATURE_VERSION
//!
//! ## Why the hash matters:
//! - Scaler compatibility
//! - Model compatibility
//! - Artifacts persisted by an older deployment

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

// ============================================================================
// FEATURE VERSION
// ============================================================================

/// Current feature layout version
/// MUST be incremented when the vector encoding changes
pub const FEATURE_VERSION: u8 = 1;

/// Default monitored sensor features, in vector order
pub const DEFAULT_FEATURES: &[&str] = &[
    "temperature", // 0: degrees Celsius
    "humidity",    // 1: relative humidity percent
    "pressure",    // 2: hPa
    "vibration",   // 3: mm/s RMS
];

// ============================================================================
// FEATURE SCHEMA (Authoritative source)
// ============================================================================

/// Ordered, fixed set of monitored feature names.
///
/// Every vector handed to the scaler or the model has exactly `len()` columns
/// in this order. The preprocessor is the only component that builds vectors
/// from named readings, so it is the single place this order is enforced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a comma separated list ("temperature, humidity")
    pub fn parse(list: &str) -> Self {
        Self::new(
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty()),
        )
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Get feature index by name (O(n) but features are few)
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Get feature name by index
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Compute CRC32 hash of the layout
    /// Used to detect artifacts trained against a different schema
    pub fn layout_hash(&self) -> u32 {
        let mut hasher = Hasher::new();

        hasher.update(&[FEATURE_VERSION]);

        for name in &self.names {
            hasher.update(name.as_bytes());
            hasher.update(&[0]); // Separator
        }

        hasher.finalize()
    }

    /// Validate that an incoming artifact matches this layout
    pub fn validate_layout(&self, incoming_hash: u32) -> Result<(), LayoutMismatchError> {
        let current_hash = self.layout_hash();

        if incoming_hash != current_hash {
            return Err(LayoutMismatchError {
                expected_hash: current_hash,
                actual_hash: incoming_hash,
            });
        }

        Ok(())
    }

    pub fn info(&self) -> LayoutInfo {
        LayoutInfo {
            version: FEATURE_VERSION,
            hash: self.layout_hash(),
            feature_count: self.len(),
            feature_names: self.names.clone(),
        }
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::new(DEFAULT_FEATURES.iter().copied())
    }
}

// ============================================================================
// LAYOUT INFO
// ============================================================================

/// Complete layout information for serialization/logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub version: u8,
    pub hash: u32,
    pub feature_count: usize,
    pub feature_names: Vec<String>,
}

// ============================================================================
// LAYOUT VALIDATION
// ============================================================================

/// Error when a persisted layout doesn't match the configured schema
#[derive(Debug, Clone, thiserror::Error)]
#[error("Feature layout mismatch: expected hash {expected_hash:08x}, got {actual_hash:08x}")]
pub struct LayoutMismatchError {
    pub expected_hash: u32,
    pub actual_hash: u32,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schema() {
        let schema = FeatureSchema::default();
        assert_eq!(schema.len(), 4);
        assert_eq!(
            schema.names(),
            &["temperature", "humidity", "pressure", "vibration"]
        );
    }

    #[test]
    fn test_layout_hash_consistency() {
        let schema = FeatureSchema::default();
        assert_eq!(schema.layout_hash(), schema.layout_hash());
        assert_ne!(schema.layout_hash(), 0);
    }

    #[test]
    fn test_layout_hash_depends_on_order() {
        let a = FeatureSchema::new(["temperature", "humidity"]);
        let b = FeatureSchema::new(["humidity", "temperature"]);
        assert_ne!(a.layout_hash(), b.layout_hash());
    }

    #[test]
    fn test_validate_layout() {
        let schema = FeatureSchema::default();
        assert!(schema.validate_layout(schema.layout_hash()).is_ok());

        let err = schema.validate_layout(schema.layout_hash() ^ 1).unwrap_err();
        assert_eq!(err.expected_hash, schema.layout_hash());
    }

    #[test]
    fn test_parse_list() {
        let schema = FeatureSchema::parse(" temperature, pressure ,,vibration ");
        assert_eq!(schema.names(), &["temperature", "pressure", "vibration"]);
    }

    #[test]
    fn test_index_lookup() {
        let schema = FeatureSchema::default();
        assert_eq!(schema.index_of("temperature"), Some(0));
        assert_eq!(schema.index_of("vibration"), Some(3));
        assert_eq!(schema.index_of("nonexistent"), None);
        assert_eq!(schema.name(1), Some("humidity"));
        assert_eq!(schema.name(100), None);
    }

    #[test]
    fn test_layout_info() {
        let info = FeatureSchema::default().info();
        assert_eq!(info.version, FEATURE_VERSION);
        assert_eq!(info.feature_count, 4);
        assert_eq!(info.feature_names.len(), 4);
    }
}
