//! Contamination Threshold
//!
//! Turns the expected anomaly share into a decision offset.
//! The offset is the `contamination` quantile of the training scores, so
//! roughly that share of the training rows lands below it.

use serde::{Deserialize, Serialize};

/// Calibrated decision boundary
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContaminationThreshold {
    /// Expected anomaly share (0.0 - 0.5)
    pub contamination: f64,

    /// Raw score at the contamination quantile
    pub offset: f64,
}

impl ContaminationThreshold {
    /// Calibrate from raw training scores (lower = more anomalous)
    pub fn calibrate(contamination: f64, training_scores: &[f64]) -> Option<Self> {
        let offset = percentile(training_scores, 100.0 * contamination)?;
        Some(Self { contamination, offset })
    }

    /// Shift a raw score so the boundary sits at zero
    pub fn decision(&self, raw_score: f64) -> f64 {
        raw_score - self.offset
    }

    /// Negative decision values are anomalies
    pub fn is_anomaly(&self, raw_score: f64) -> bool {
        self.decision(raw_score) < 0.0
    }
}

/// Percentile with linear interpolation between closest ranks
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=100.0).contains(&q) {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let pos = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;

    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(percentile(&values, 0.0), Some(1.0));
        assert_eq!(percentile(&values, 100.0), Some(4.0));
        assert_eq!(percentile(&values, 50.0), Some(2.5));
        assert_eq!(percentile(&values, 25.0), Some(1.75));
    }

    #[test]
    fn test_percentile_edge_cases() {
        assert_eq!(percentile(&[], 50.0), None);
        assert_eq!(percentile(&[1.0], 101.0), None);
        assert_eq!(percentile(&[7.0], 5.0), Some(7.0));
    }

    #[test]
    fn test_calibrated_threshold_flags_lowest_share() {
        let scores = [-0.7, -0.45, -0.44, -0.43];
        let threshold = ContaminationThreshold::calibrate(0.25, &scores).unwrap();

        let flagged: Vec<bool> = scores.iter().map(|&s| threshold.is_anomaly(s)).collect();
        assert_eq!(flagged, vec![true, false, false, false]);
    }

    #[test]
    fn test_decision_sign_matches_label() {
        let threshold = ContaminationThreshold { contamination: 0.1, offset: -0.5 };
        assert!(threshold.decision(-0.6) < 0.0);
        assert!(threshold.is_anomaly(-0.6));
        assert_eq!(threshold.decision(-0.5), 0.0);
        assert!(!threshold.is_anomaly(-0.5));
    }
}
