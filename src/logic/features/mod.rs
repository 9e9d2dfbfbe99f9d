//! Features Module - Feature Schema & Sensor Readings
//!
//! Owns the ordered list of monitored features and the raw reading type.
//! Everything that turns names into column positions goes through here.

pub mod layout;
pub mod reading;

// Re-export common types
pub use layout::{FeatureSchema, LayoutInfo, LayoutMismatchError, FEATURE_VERSION};
pub use reading::{Payload, Reading};
