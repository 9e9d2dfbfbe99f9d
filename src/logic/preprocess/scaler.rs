//! Standard Scaler - per-feature mean / scale normalization
//!
//! Fitted once per training run and persisted next to the model. The mean
//! vector doubles as the training-time fallback used to fill features a
//! single reading leaves out.

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use super::PreprocessError;

/// Fitted standardization: `(x - mean) / scale` column by column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
    n_samples_seen: usize,
}

impl StandardScaler {
    /// Fit on a clean matrix (no missing markers).
    pub fn fit(matrix: &Array2<f64>) -> Result<Self, PreprocessError> {
        let rows = matrix.nrows();
        if rows == 0 {
            return Err(PreprocessError::EmptyBatch);
        }

        let n = rows as f64;
        let mut mean = Vec::with_capacity(matrix.ncols());
        let mut scale = Vec::with_capacity(matrix.ncols());

        for column in matrix.axis_iter(Axis(1)) {
            let mu = column.sum() / n;
            // Population variance, zero-variance columns keep unit scale
            let var = column.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();

            mean.push(mu);
            scale.push(if std > f64::EPSILON * mu.abs().max(1.0) { std } else { 1.0 });
        }

        // Overflowing spreads give an infinite std, which cannot be persisted
        let scaler = Self {
            mean,
            scale,
            n_samples_seen: rows,
        };
        scaler.validate().map_err(PreprocessError::DegenerateStatistics)?;
        Ok(scaler)
    }

    /// Rebuild from persisted parameters
    pub fn from_parts(mean: Vec<f64>, scale: Vec<f64>, n_samples_seen: usize) -> Self {
        Self { mean, scale, n_samples_seen }
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn n_samples_seen(&self) -> usize {
        self.n_samples_seen
    }

    /// Training-time column means
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    pub fn transform(&self, matrix: &Array2<f64>) -> Result<Array2<f64>, PreprocessError> {
        self.check_width(matrix)?;

        let mut out = matrix.clone();
        for (j, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (mu, s) = (self.mean[j], self.scale[j]);
            column.mapv_inplace(|x| (x - mu) / s);
        }
        Ok(out)
    }

    /// Map scaled rows back to sensor units
    pub fn inverse_transform(&self, matrix: &Array2<f64>) -> Result<Array2<f64>, PreprocessError> {
        self.check_width(matrix)?;

        let mut out = matrix.clone();
        for (j, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (mu, s) = (self.mean[j], self.scale[j]);
            column.mapv_inplace(|x| x * s + mu);
        }
        Ok(out)
    }

    /// Structural sanity check for deserialized parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.mean.is_empty() {
            return Err("scaler has no features".to_string());
        }
        if self.mean.len() != self.scale.len() {
            return Err(format!(
                "mean has {} entries but scale has {}",
                self.mean.len(),
                self.scale.len()
            ));
        }
        if self.mean.iter().any(|m| !m.is_finite()) {
            return Err("non-finite mean".to_string());
        }
        if self.scale.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err("scale must be finite and positive".to_string());
        }
        Ok(())
    }

    fn check_width(&self, matrix: &Array2<f64>) -> Result<(), PreprocessError> {
        if matrix.ncols() != self.n_features() {
            return Err(PreprocessError::ShapeMismatch {
                expected: self.n_features(),
                actual: matrix.ncols(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fit_mean_and_scale() {
        let data = array![[1.0, 10.0], [3.0, 10.0]];
        let scaler = StandardScaler::fit(&data).unwrap();

        assert_eq!(scaler.mean(), &[2.0, 10.0]);
        assert_eq!(scaler.scale(), &[1.0, 1.0]); // std 1.0, constant column → 1.0
        assert_eq!(scaler.n_samples_seen(), 2);
    }

    #[test]
    fn test_transform_centers_columns() {
        let data = array![[20.0, 50.0], [22.0, 54.0], [24.0, 58.0]];
        let scaler = StandardScaler::fit(&data).unwrap();
        let scaled = scaler.transform(&data).unwrap();

        for column in scaled.axis_iter(Axis(1)) {
            assert!(column.sum().abs() < 1e-12);
        }
    }

    #[test]
    fn test_inverse_transform_restores_units() {
        let data = array![[20.0, 1000.0], [21.5, 1002.0], [23.0, 998.0]];
        let scaler = StandardScaler::fit(&data).unwrap();
        let restored = scaler
            .inverse_transform(&scaler.transform(&data).unwrap())
            .unwrap();

        for (a, b) in restored.iter().zip(data.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_fit_empty_batch() {
        let data = Array2::<f64>::zeros((0, 4));
        assert!(matches!(
            StandardScaler::fit(&data),
            Err(PreprocessError::EmptyBatch)
        ));
    }

    #[test]
    fn test_fit_rejects_overflowing_spread() {
        let data = array![[1e200, 1.0], [20.0, 2.0], [21.0, 3.0]];
        assert!(matches!(
            StandardScaler::fit(&data),
            Err(PreprocessError::DegenerateStatistics(_))
        ));
    }

    #[test]
    fn test_transform_shape_mismatch() {
        let scaler = StandardScaler::fit(&array![[1.0, 2.0], [3.0, 4.0]]).unwrap();
        let result = scaler.transform(&array![[1.0, 2.0, 3.0]]);

        match result {
            Err(PreprocessError::ShapeMismatch { expected, actual }) => {
                assert_eq!(expected, 2);
                assert_eq!(actual, 3);
            }
            _ => panic!("Expected ShapeMismatch"),
        }
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        assert!(StandardScaler::from_parts(vec![0.0], vec![1.0], 1).validate().is_ok());
        assert!(StandardScaler::from_parts(vec![], vec![], 0).validate().is_err());
        assert!(StandardScaler::from_parts(vec![0.0], vec![0.0], 1).validate().is_err());
        assert!(StandardScaler::from_parts(vec![0.0, 1.0], vec![1.0], 1).validate().is_err());
    }
}
