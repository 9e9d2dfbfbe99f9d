//! Logic Module - Detection pipeline
//!
//! - `features/` - Feature schema, readings, layout hash
//! - `preprocess/` - Missing-value fill and standard scaling
//! - `model/` - Anomaly model trait, isolation forest, threshold
//! - `store/` - Model + scaler persistence
//! - `service/` - Detection service (detect / train)
//! - `config` - Startup configuration

pub mod config;
pub mod features;
pub mod model;
pub mod preprocess;
pub mod service;
pub mod store;
