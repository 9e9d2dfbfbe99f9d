//! Preprocess Module - Readings → aligned numeric matrix
//!
//! # Pipeline
//! - `vector_from_reading` / `matrix_from_batch`: project onto the schema,
//!   absent features become `MISSING` (NaN)
//! - `clean`: fill missing cells
//! - `scale` / `fit_scaler`: standardize with an existing or a fresh scaler
//!
//! # Missing value policy
//! A missing cell takes the mean of the present values in its column of the
//! same matrix. A column with no present value at all takes the fallback
//! statistic, which for inference is the training-time mean stored in the
//! active scaler. Training has no fallback, so a feature absent from every
//! historical reading is rejected.

pub mod scaler;
#[cfg(test)]
mod tests;

use ndarray::{Array1, Array2, Axis};

use crate::logic::features::{FeatureSchema, Reading};

pub use scaler::StandardScaler;

/// Sentinel for an absent or invalid value
pub const MISSING: f64 = f64::NAN;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PreprocessError {
    #[error("Invalid input shape: {0}")]
    InvalidInputShape(String),

    #[error("Cannot fit a scaler on an empty batch")]
    EmptyBatch,

    #[error("Shape mismatch: expected {expected} columns, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Feature '{0}' has no values and no fallback statistic")]
    MissingFeature(String),

    #[error("Scaler statistics are not usable: {0}")]
    DegenerateStatistics(String),
}

// ============================================================================
// PREPROCESSOR
// ============================================================================

/// Single authority for turning readings into schema-ordered matrices.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    schema: FeatureSchema,
}

impl Preprocessor {
    pub fn new(schema: FeatureSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Project one reading onto the schema
    pub fn vector_from_reading(&self, reading: &Reading) -> Array1<f64> {
        self.schema
            .names()
            .iter()
            .map(|name| reading.get(name).unwrap_or(MISSING))
            .collect()
    }

    /// Project a batch; an empty batch yields a 0 x n matrix
    pub fn matrix_from_batch(&self, readings: &[Reading]) -> Array2<f64> {
        let width = self.schema.len();
        let mut matrix = Array2::from_elem((readings.len(), width), MISSING);

        for (mut row, reading) in matrix.axis_iter_mut(Axis(0)).zip(readings) {
            row.assign(&self.vector_from_reading(reading));
        }

        matrix
    }

    /// Fill missing cells with column means, then with `fallback`.
    pub fn clean(
        &self,
        matrix: &Array2<f64>,
        fallback: Option<&[f64]>,
    ) -> Result<Array2<f64>, PreprocessError> {
        if let Some(stats) = fallback {
            if stats.len() != matrix.ncols() {
                return Err(PreprocessError::ShapeMismatch {
                    expected: matrix.ncols(),
                    actual: stats.len(),
                });
            }
        }

        let mut out = matrix.clone();
        for (j, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            let present: Vec<f64> = column.iter().copied().filter(|v| v.is_finite()).collect();
            if present.len() == column.len() {
                continue;
            }

            let fill = if !present.is_empty() {
                present.iter().sum::<f64>() / present.len() as f64
            } else if let Some(stats) = fallback {
                stats[j]
            } else {
                return Err(PreprocessError::MissingFeature(
                    self.schema.name(j).unwrap_or("<unnamed>").to_string(),
                ));
            };

            log::debug!(
                "Filling {} missing value(s) of '{}' with {}",
                column.len() - present.len(),
                self.schema.name(j).unwrap_or("<unnamed>"),
                fill
            );
            column.mapv_inplace(|v| if v.is_finite() { v } else { fill });
        }

        Ok(out)
    }

    /// Apply an already fitted scaler
    pub fn scale(
        &self,
        matrix: &Array2<f64>,
        scaler: &StandardScaler,
    ) -> Result<Array2<f64>, PreprocessError> {
        scaler.transform(matrix)
    }

    /// Fit a fresh scaler and return it with the transformed matrix
    pub fn fit_scaler(
        &self,
        matrix: &Array2<f64>,
    ) -> Result<(Array2<f64>, StandardScaler), PreprocessError> {
        let scaler = StandardScaler::fit(matrix)?;
        let scaled = scaler.transform(matrix)?;
        Ok((scaled, scaler))
    }

    // ------------------------------------------------------------------------
    // Composite paths used by the detection service
    // ------------------------------------------------------------------------

    /// Single reading → 1 x n scaled matrix, using the scaler's training means
    /// for absent features.
    pub fn prepare_reading(
        &self,
        reading: &Reading,
        scaler: &StandardScaler,
    ) -> Result<Array2<f64>, PreprocessError> {
        let row = self.vector_from_reading(reading).insert_axis(Axis(0));
        self.prepare_matrix(&row, scaler)
    }

    /// Batch of readings → scaled matrix against an existing scaler
    pub fn prepare_batch(
        &self,
        readings: &[Reading],
        scaler: &StandardScaler,
    ) -> Result<Array2<f64>, PreprocessError> {
        let matrix = self.matrix_from_batch(readings);
        self.prepare_matrix(&matrix, scaler)
    }

    /// Historical batch → (scaled matrix, freshly fitted scaler)
    pub fn prepare_training(
        &self,
        readings: &[Reading],
    ) -> Result<(Array2<f64>, StandardScaler), PreprocessError> {
        if readings.is_empty() {
            return Err(PreprocessError::EmptyBatch);
        }
        let matrix = self.matrix_from_batch(readings);
        let cleaned = self.clean(&matrix, None)?;
        self.fit_scaler(&cleaned)
    }

    fn prepare_matrix(
        &self,
        matrix: &Array2<f64>,
        scaler: &StandardScaler,
    ) -> Result<Array2<f64>, PreprocessError> {
        if scaler.n_features() != self.schema.len() {
            return Err(PreprocessError::ShapeMismatch {
                expected: self.schema.len(),
                actual: scaler.n_features(),
            });
        }
        let cleaned = self.clean(matrix, Some(scaler.mean()))?;
        self.scale(&cleaned, scaler)
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(FeatureSchema::default())
    }
}
