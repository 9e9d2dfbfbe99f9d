//! Detector Configuration
//!
//! Everything the service needs at startup: estimator settings, artifact
//! paths and the feature schema. Nothing here is read again after the
//! service is constructed.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{
    env_parse, env_parse_opt, env_path, ENV_CONTAMINATION, ENV_FEATURES, ENV_MAX_SAMPLES,
    ENV_MODEL_PATH, ENV_N_ESTIMATORS, ENV_RANDOM_SEED, ENV_SCALER_PATH,
};
use crate::logic::features::FeatureSchema;
use crate::logic::model::{ModelConfig, ModelError};
use crate::logic::store;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Feature schema is empty")]
    EmptySchema,

    #[error("Feature name '{0}' is listed more than once")]
    DuplicateFeature(String),

    #[error("Feature names must not be blank")]
    BlankFeature,

    #[error("Model and scaler must be stored at different paths ({})", .0.display())]
    SharedArtifactPath(PathBuf),
}

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub model: ModelConfig,
    pub model_path: PathBuf,
    pub scaler_path: PathBuf,
    pub features: FeatureSchema,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            model_path: store::default_model_path(),
            scaler_path: store::default_scaler_path(),
            features: FeatureSchema::default(),
        }
    }
}

impl DetectorConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let features = std::env::var(ENV_FEATURES)
            .ok()
            .map(|list| FeatureSchema::parse(&list))
            .filter(|schema| !schema.is_empty())
            .unwrap_or(defaults.features);

        Self {
            model: ModelConfig {
                n_estimators: env_parse(ENV_N_ESTIMATORS, defaults.model.n_estimators),
                contamination: env_parse(ENV_CONTAMINATION, defaults.model.contamination),
                random_seed: env_parse(ENV_RANDOM_SEED, defaults.model.random_seed),
                max_samples: env_parse_opt(ENV_MAX_SAMPLES),
            },
            model_path: env_path(ENV_MODEL_PATH, defaults.model_path),
            scaler_path: env_path(ENV_SCALER_PATH, defaults.scaler_path),
            features,
        }
    }

    /// Artifacts live side by side in `dir`
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.model_path = dir.join("isolation_forest.json");
        self.scaler_path = dir.join("scaler.json");
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.model.validate()?;

        if self.features.is_empty() {
            return Err(ConfigError::EmptySchema);
        }

        let mut seen = HashSet::new();
        for name in self.features.names() {
            if name.trim().is_empty() {
                return Err(ConfigError::BlankFeature);
            }
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateFeature(name.clone()));
            }
        }

        if self.model_path == self.scaler_path {
            return Err(ConfigError::SharedArtifactPath(self.model_path.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DetectorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.features.len(), 4);
        assert_ne!(config.model_path, config.scaler_path);
    }

    #[test]
    fn test_artifact_dir() {
        let config = DetectorConfig::default().with_artifact_dir("/tmp/models");
        assert_eq!(config.model_path, PathBuf::from("/tmp/models/isolation_forest.json"));
        assert_eq!(config.scaler_path, PathBuf::from("/tmp/models/scaler.json"));
    }

    #[test]
    fn test_rejects_bad_schema() {
        let mut config = DetectorConfig::default();
        config.features = FeatureSchema::new(Vec::<String>::new());
        assert!(matches!(config.validate(), Err(ConfigError::EmptySchema)));

        config.features = FeatureSchema::new(["temperature", "temperature"]);
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateFeature(_))));

        config.features = FeatureSchema::new(["temperature", " "]);
        assert!(matches!(config.validate(), Err(ConfigError::BlankFeature)));
    }

    #[test]
    fn test_rejects_bad_model_settings() {
        let mut config = DetectorConfig::default();
        config.model.contamination = 0.9;
        assert!(matches!(config.validate(), Err(ConfigError::Model(_))));
    }

    #[test]
    fn test_rejects_shared_path() {
        let mut config = DetectorConfig::default();
        config.scaler_path = config.model_path.clone();
        assert!(matches!(config.validate(), Err(ConfigError::SharedArtifactPath(_))));
    }
}
