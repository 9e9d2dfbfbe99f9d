//! Central Configuration Constants
//!
//! Single source of truth for environment variable names and defaults.
//! To change a default, only edit this file.

use std::path::PathBuf;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "sensor-anomaly";

pub const ENV_N_ESTIMATORS: &str = "ANOMALY_N_ESTIMATORS";
pub const ENV_CONTAMINATION: &str = "ANOMALY_CONTAMINATION";
pub const ENV_RANDOM_SEED: &str = "ANOMALY_RANDOM_SEED";
pub const ENV_MAX_SAMPLES: &str = "ANOMALY_MAX_SAMPLES";
pub const ENV_MODEL_PATH: &str = "ANOMALY_MODEL_PATH";
pub const ENV_SCALER_PATH: &str = "ANOMALY_SCALER_PATH";
pub const ENV_FEATURES: &str = "ANOMALY_FEATURES";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Parse a variable, falling back on absence or parse failure
pub fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("Ignoring unparsable {}={:?}, using default", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

/// Optional variable; unset or unparsable → None
pub fn env_parse_opt<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// Path variable with fallback
pub fn env_path(key: &str, default: PathBuf) -> PathBuf {
    std::env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or(default)
}
