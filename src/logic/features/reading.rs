//! Sensor Reading - raw input before projection
//!
//! A reading is a loose name → number mapping as it arrives from a sensor
//! gateway. Unknown keys are kept but ignored by projection, non-numeric
//! values are treated as absent.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::logic::preprocess::PreprocessError;

// ============================================================================
// READING
// ============================================================================

/// One sensor reading: feature name → numeric value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "HashMap<String, Value>", into = "HashMap<String, f64>")]
pub struct Reading {
    values: HashMap<String, f64>,
}

impl Reading {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.set(name, value);
        self
    }

    /// Set a value. Non-finite values are stored as absent.
    pub fn set(&mut self, name: &str, value: f64) {
        if value.is_finite() {
            self.values.insert(name.to_string(), value);
        } else {
            self.values.remove(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Build from a JSON object. Anything but an object is a shape error.
    pub fn from_json(value: &Value) -> Result<Self, PreprocessError> {
        match value {
            Value::Object(map) => Ok(map
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<HashMap<_, _>>()
                .into()),
            other => Err(PreprocessError::InvalidInputShape(format!(
                "expected a mapping of feature name to number, got {}",
                json_kind(other)
            ))),
        }
    }
}

impl From<HashMap<String, Value>> for Reading {
    fn from(raw: HashMap<String, Value>) -> Self {
        let mut reading = Reading::new();
        for (name, value) in raw {
            match value.as_f64() {
                Some(v) => reading.set(&name, v),
                None => log::debug!("Ignoring non-numeric value for '{}': {}", name, value),
            }
        }
        reading
    }
}

impl From<Reading> for HashMap<String, f64> {
    fn from(reading: Reading) -> Self {
        reading.values
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for Reading {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut reading = Reading::new();
        for (name, value) in iter {
            let name: String = name.into();
            reading.set(&name, value);
        }
        reading
    }
}

// ============================================================================
// PAYLOAD
// ============================================================================

/// Either a single reading or an ordered historical batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Single(Reading),
    Batch(Vec<Reading>),
}

impl Payload {
    /// Dispatch on JSON shape: object → single, array of objects → batch.
    pub fn from_json(value: &Value) -> Result<Self, PreprocessError> {
        match value {
            Value::Object(_) => Ok(Payload::Single(Reading::from_json(value)?)),
            Value::Array(items) => items
                .iter()
                .map(Reading::from_json)
                .collect::<Result<Vec<_>, _>>()
                .map(Payload::Batch),
            other => Err(PreprocessError::InvalidInputShape(format!(
                "expected a mapping or a sequence of mappings, got {}",
                json_kind(other)
            ))),
        }
    }

    /// Historical batches only; a lone mapping cannot fit a scaler.
    pub fn into_batch(self) -> Result<Vec<Reading>, PreprocessError> {
        match self {
            Payload::Batch(readings) => Ok(readings),
            Payload::Single(_) => Err(PreprocessError::InvalidInputShape(
                "training requires a sequence of readings, got a single mapping".to_string(),
            )),
        }
    }

    pub fn into_single(self) -> Result<Reading, PreprocessError> {
        match self {
            Payload::Single(reading) => Ok(reading),
            Payload::Batch(_) => Err(PreprocessError::InvalidInputShape(
                "detection requires a single mapping, got a sequence".to_string(),
            )),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// TESTS
// ============================================================================
