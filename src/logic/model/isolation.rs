//! Isolation Forest - ensemble of random partition trees
//!
//! Each tree repeatedly picks a random feature and a random split value
//! between that feature's min and max until a point sits alone (or the depth
//! limit is hit). Outliers get isolated in fewer splits, so a short average
//! path length means "more anomalous".
//!
//! Scoring:
//! - raw score `s(x) = -2^(-E[h(x)] / c(psi))`, in [-1, 0)
//! - decision `s(x) - offset`, offset calibrated from contamination
//! - label `Anomalous` iff decision < 0

use ndarray::{Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::threshold::ContaminationThreshold;
use super::{AnomalyModel, Label, ModelConfig, ModelError};

/// Rows per tree when `max_samples` is not set
pub const AUTO_MAX_SAMPLES: usize = 256;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

// ============================================================================
// TREE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

/// One isolation tree stored as a flat node arena, root at index 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn fit(data: &Array2<f64>, rows: Vec<usize>, max_depth: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(data, rows, 0, max_depth, rng);
        tree
    }

    fn grow(
        &mut self,
        data: &Array2<f64>,
        rows: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { size: rows.len() });

        if depth >= max_depth || rows.len() <= 1 {
            return id;
        }

        // Only features that still vary inside this node can split it
        let candidates: Vec<(usize, f64, f64)> = (0..data.ncols())
            .filter_map(|j| {
                let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                    let x = data[[r, j]];
                    (lo.min(x), hi.max(x))
                });
                (lo < hi).then_some((j, lo, hi))
            })
            .collect();

        if candidates.is_empty() {
            return id;
        }

        let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
        let threshold = rng.gen_range(lo..hi);

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&r| data[[r, feature]] <= threshold);

        let left = self.grow(data, left_rows, depth + 1, max_depth, rng);
        let right = self.grow(data, right_rows, depth + 1, max_depth, rng);
        self.nodes[id] = Node::Split { feature, threshold, left, right };

        id
    }

    /// Depth reached by `row`, plus the expected remaining depth of its leaf
    fn path_length(&self, row: ArrayView1<f64>) -> f64 {
        let mut id = 0;
        let mut depth = 0.0;

        loop {
            match &self.nodes[id] {
                Node::Split { feature, threshold, left, right } => {
                    id = if row[*feature] <= *threshold { *left } else { *right };
                    depth += 1.0;
                }
                Node::Leaf { size } => return depth + average_path_length(*size),
            }
        }
    }

    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("empty tree".to_string());
        }
        for (id, node) in self.nodes.iter().enumerate() {
            if let Node::Split { feature, threshold, left, right } = node {
                if *feature >= n_features {
                    return Err(format!("node {} splits on unknown feature {}", id, feature));
                }
                if !threshold.is_finite() {
                    return Err(format!("node {} has a non-finite threshold", id));
                }
                // Children always come after their parent in the arena
                let len = self.nodes.len();
                if *left <= id || *right <= id || *left >= len || *right >= len {
                    return Err(format!("node {} has out-of-order children", id));
                }
            }
        }
        Ok(())
    }
}

/// Average unsuccessful-search path length in a BST of `n` points, c(n)
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

// ============================================================================
// FOREST
// ============================================================================

/// Isolation-based outlier detector.
///
/// Starts untrained; `train` replaces every tree and the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    config: ModelConfig,
    n_features: usize,
    max_samples: usize,
    trees: Vec<IsolationTree>,
    threshold: Option<ContaminationThreshold>,
}

impl IsolationForest {
    pub fn new(config: ModelConfig, n_features: usize) -> Result<Self, ModelError> {
        config.validate()?;
        if n_features == 0 {
            return Err(ModelError::InvalidConfig("model needs at least one feature".to_string()));
        }

        Ok(Self {
            config,
            n_features,
            max_samples: 0,
            trees: Vec::new(),
            threshold: None,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn threshold(&self) -> Option<ContaminationThreshold> {
        self.threshold
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Raw scores in [-1, 0); lower = more anomalous
    pub fn score_samples(&self, data: &Array2<f64>) -> Result<Vec<f64>, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::NotTrained);
        }
        self.check_width(data)?;

        let norm = average_path_length(self.max_samples);
        let n_trees = self.trees.len() as f64;

        Ok(data
            .axis_iter(Axis(0))
            .map(|row| {
                let total: f64 = self.trees.iter().map(|t| t.path_length(row)).sum();
                let mean_depth = total / n_trees;
                -(2.0f64).powf(-mean_depth / norm)
            })
            .collect())
    }

    fn check_width(&self, data: &Array2<f64>) -> Result<(), ModelError> {
        if data.ncols() != self.n_features {
            return Err(ModelError::ShapeMismatch {
                expected: self.n_features,
                actual: data.ncols(),
            });
        }
        Ok(())
    }

    fn trained_threshold(&self) -> Result<ContaminationThreshold, ModelError> {
        self.threshold.ok_or(ModelError::NotTrained)
    }
}

impl AnomalyModel for IsolationForest {
    const KIND: &'static str = "isolation_forest";

    fn build(config: &ModelConfig, n_features: usize) -> Result<Self, ModelError> {
        Self::new(config.clone(), n_features)
    }

    fn train(&mut self, data: &Array2<f64>) -> Result<(), ModelError> {
        if data.ncols() != self.n_features {
            return Err(ModelError::InvalidTrainingData(format!(
                "expected {} columns, got {}",
                self.n_features,
                data.ncols()
            )));
        }
        if data.nrows() < 2 {
            return Err(ModelError::InvalidTrainingData(format!(
                "need at least 2 rows, got {}",
                data.nrows()
            )));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::InvalidTrainingData(
                "matrix contains missing or non-finite values".to_string(),
            ));
        }

        let n_rows = data.nrows();
        let max_samples = self
            .config
            .max_samples
            .unwrap_or(AUTO_MAX_SAMPLES)
            .min(n_rows);
        // max_samples >= 2 here, so log2 is at least 1
        let max_depth = (max_samples as f64).log2().ceil() as usize;

        let mut rng = StdRng::seed_from_u64(self.config.random_seed);
        let trees: Vec<IsolationTree> = (0..self.config.n_estimators)
            .map(|_| {
                let mut tree_rng = StdRng::seed_from_u64(rng.gen());
                let rows = rand::seq::index::sample(&mut tree_rng, n_rows, max_samples).into_vec();
                IsolationTree::fit(data, rows, max_depth, &mut tree_rng)
            })
            .collect();

        self.trees = trees;
        self.max_samples = max_samples;
        self.threshold = None;

        let scores = self.score_samples(data)?;
        let threshold = ContaminationThreshold::calibrate(self.config.contamination, &scores)
            .ok_or_else(|| {
                ModelError::InvalidTrainingData("could not calibrate threshold".to_string())
            })?;

        log::debug!(
            "Isolation forest trained: {} trees, {} rows/tree, depth <= {}, offset {:.6}",
            self.trees.len(),
            max_samples,
            max_depth,
            threshold.offset
        );

        self.threshold = Some(threshold);
        Ok(())
    }

    fn predict(&self, data: &Array2<f64>) -> Result<Vec<Label>, ModelError> {
        let threshold = self.trained_threshold()?;
        Ok(self
            .score_samples(data)?
            .into_iter()
            .map(|s| if threshold.is_anomaly(s) { Label::Anomalous } else { Label::Normal })
            .collect())
    }

    fn decision_function(&self, data: &Array2<f64>) -> Result<Vec<f64>, ModelError> {
        let threshold = self.trained_threshold()?;
        Ok(self
            .score_samples(data)?
            .into_iter()
            .map(|s| threshold.decision(s))
            .collect())
    }

    fn is_trained(&self) -> bool {
        self.threshold.is_some() && !self.trees.is_empty()
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn validate(&self) -> Result<(), String> {
        self.config.validate().map_err(|e| e.to_string())?;
        if !self.is_trained() {
            return Err("model is not trained".to_string());
        }
        if self.n_features == 0 || self.max_samples < 2 {
            return Err("invalid model dimensions".to_string());
        }
        if !self.threshold.map_or(false, |t| t.offset.is_finite()) {
            return Err("non-finite decision offset".to_string());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|e| format!("tree {}: {}", i, e))?;
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn scenario() -> Array2<f64> {
        array![
            [20.0, 50.0, 1000.0, 1.0],
            [21.0, 51.0, 1001.0, 1.1],
            [22.0, 52.0, 1002.0, 1.2],
            [200.0, 10.0, 500.0, 50.0],
        ]
    }

    fn trained(contamination: f64) -> IsolationForest {
        let config = ModelConfig { contamination, ..Default::default() };
        let mut model = IsolationForest::new(config, 4).unwrap();
        model.train(&scenario()).unwrap();
        model
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!((average_path_length(256) - 10.244_770_920_116_851).abs() < 1e-9);
    }

    #[test]
    fn test_predict_before_train() {
        let model = IsolationForest::new(ModelConfig::default(), 4).unwrap();
        assert!(!model.is_trained());
        assert_eq!(model.predict(&scenario()), Err(ModelError::NotTrained));
        assert_eq!(model.decision_function(&scenario()), Err(ModelError::NotTrained));
    }

    #[test]
    fn test_train_rejects_wrong_width() {
        let mut model = IsolationForest::new(ModelConfig::default(), 4).unwrap();
        let result = model.train(&array![[1.0, 2.0], [3.0, 4.0]]);
        assert!(matches!(result, Err(ModelError::InvalidTrainingData(_))));
        assert!(!model.is_trained());
    }

    #[test]
    fn test_train_rejects_missing_values() {
        let mut model = IsolationForest::new(ModelConfig::default(), 2).unwrap();
        let result = model.train(&array![[1.0, f64::NAN], [3.0, 4.0]]);
        assert!(matches!(result, Err(ModelError::InvalidTrainingData(_))));
    }

    #[test]
    fn test_train_rejects_single_row() {
        let mut model = IsolationForest::new(ModelConfig::default(), 2).unwrap();
        assert!(matches!(
            model.train(&array![[1.0, 2.0]]),
            Err(ModelError::InvalidTrainingData(_))
        ));
    }

    #[test]
    fn test_outlier_labeled_anomalous() {
        let model = trained(0.25);
        let labels = model.predict(&scenario()).unwrap();

        assert_eq!(
            labels,
            vec![Label::Normal, Label::Normal, Label::Normal, Label::Anomalous]
        );
    }

    #[test]
    fn test_outlier_has_lowest_score() {
        let model = trained(0.25);
        let scores = model.decision_function(&scenario()).unwrap();

        for normal in &scores[..3] {
            assert!(scores[3] < *normal);
        }
    }

    #[test]
    fn test_labels_consistent_with_scores() {
        let model = trained(0.25);
        let probe = array![
            [20.5, 50.5, 1000.5, 1.05],
            [100.0, 30.0, 800.0, 20.0],
            [21.0, 51.0, 1001.0, 1.1],
            [-40.0, 99.0, 1100.0, 0.0],
        ];
        let labels = model.predict(&probe).unwrap();
        let scores = model.decision_function(&probe).unwrap();

        for (label, score) in labels.iter().zip(&scores) {
            assert_eq!(label.is_anomaly(), *score < 0.0);
        }
    }

    #[test]
    fn test_predict_shape_mismatch() {
        let model = trained(0.25);
        assert_eq!(
            model.predict(&array![[1.0, 2.0, 3.0]]),
            Err(ModelError::ShapeMismatch { expected: 4, actual: 3 })
        );
    }

    #[test]
    fn test_same_seed_same_forest() {
        assert_eq!(trained(0.1), trained(0.1));
    }

    #[test]
    fn test_constant_data_is_all_normal() {
        let mut model = IsolationForest::new(ModelConfig::default(), 2).unwrap();
        let data = array![[1.0, 1.0], [1.0, 1.0], [1.0, 1.0]];
        model.train(&data).unwrap();

        let labels = model.predict(&data).unwrap();
        assert!(labels.iter().all(|l| *l == Label::Normal));
    }

    #[test]
    fn test_trained_forest_validates() {
        let model = trained(0.05);
        assert_eq!(model.n_trees(), 100);
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_serde_roundtrip_keeps_scores() {
        let model = trained(0.25);
        let json = serde_json::to_vec(&model).unwrap();
        let restored: IsolationForest = serde_json::from_slice(&json).unwrap();

        assert_eq!(restored, model);
        assert_eq!(
            restored.decision_function(&scenario()).unwrap(),
            model.decision_function(&scenario()).unwrap()
        );
    }
}
