use ndarray::{array, Array2};

use super::{PreprocessError, Preprocessor, StandardScaler, MISSING};
use crate::logic::features::{FeatureSchema, Reading};

fn reading(t: f64, h: f64, p: f64, v: f64) -> Reading {
    Reading::new()
        .with("temperature", t)
        .with("humidity", h)
        .with("pressure", p)
        .with("vibration", v)
}

#[test]
fn test_vector_follows_schema_order() {
    let pre = Preprocessor::default();
    let r = Reading::new()
        .with("vibration", 1.5)
        .with("temperature", 20.0)
        .with("pressure", 1000.0)
        .with("humidity", 50.0);

    let v = pre.vector_from_reading(&r);
    assert_eq!(v.to_vec(), vec![20.0, 50.0, 1000.0, 1.5]);
}

#[test]
fn test_missing_and_unknown_keys() {
    let pre = Preprocessor::default();
    let r = Reading::new()
        .with("temperature", 20.0)
        .with("co2_ppm", 400.0);

    let v = pre.vector_from_reading(&r);
    assert_eq!(v.len(), 4);
    assert_eq!(v[0], 20.0);
    assert!(v[1].is_nan());
    assert!(v[2].is_nan());
    assert!(v[3].is_nan());
}

#[test]
fn test_empty_batch_has_schema_width() {
    let pre = Preprocessor::default();
    let m = pre.matrix_from_batch(&[]);
    assert_eq!(m.dim(), (0, 4));
}

#[test]
fn test_clean_uses_batch_column_mean() {
    let pre = Preprocessor::new(FeatureSchema::new(["a", "b"]));
    let m = array![[1.0, 10.0], [MISSING, 20.0], [3.0, MISSING]];

    let cleaned = pre.clean(&m, None).unwrap();
    assert_eq!(cleaned, array![[1.0, 10.0], [2.0, 20.0], [3.0, 15.0]]);
}

#[test]
fn test_clean_falls_back_for_empty_column() {
    let pre = Preprocessor::new(FeatureSchema::new(["a", "b"]));
    let m = array![[5.0, MISSING]];

    let cleaned = pre.clean(&m, Some(&[0.0, 42.0])).unwrap();
    assert_eq!(cleaned, array![[5.0, 42.0]]);
}

#[test]
fn test_clean_without_fallback_reports_feature() {
    let pre = Preprocessor::new(FeatureSchema::new(["a", "b"]));
    let m = array![[1.0, MISSING], [2.0, MISSING]];

    assert_eq!(
        pre.clean(&m, None),
        Err(PreprocessError::MissingFeature("b".to_string()))
    );
}

#[test]
fn test_fit_scaler_on_empty_matrix() {
    let pre = Preprocessor::default();
    let m = Array2::<f64>::zeros((0, 4));
    assert!(matches!(pre.fit_scaler(&m), Err(PreprocessError::EmptyBatch)));
}

#[test]
fn test_scale_rejects_other_width() {
    let pre = Preprocessor::default();
    let scaler = StandardScaler::fit(&array![[1.0, 2.0], [2.0, 3.0]]).unwrap();
    let m = array![[1.0, 2.0, 3.0, 4.0]];

    assert!(matches!(
        pre.scale(&m, &scaler),
        Err(PreprocessError::ShapeMismatch { expected: 2, actual: 4 })
    ));
}

#[test]
fn test_prepare_training_fits_on_cleaned_batch() {
    let pre = Preprocessor::default();
    let batch = vec![
        reading(20.0, 50.0, 1000.0, 1.0),
        Reading::new().with("temperature", 22.0).with("humidity", 52.0).with("pressure", 1002.0),
        reading(24.0, 54.0, 1004.0, 3.0),
    ];

    let (scaled, scaler) = pre.prepare_training(&batch).unwrap();
    assert_eq!(scaled.dim(), (3, 4));
    // Missing vibration filled with the batch mean (2.0) before fitting
    assert_eq!(scaler.mean(), &[22.0, 52.0, 1002.0, 2.0]);
    assert!(scaled.iter().all(|v| v.is_finite()));
}

#[test]
fn test_prepare_training_rejects_empty_batch() {
    let pre = Preprocessor::default();
    assert_eq!(pre.prepare_training(&[]), Err(PreprocessError::EmptyBatch));
}

#[test]
fn test_prepare_training_rejects_feature_absent_everywhere() {
    let pre = Preprocessor::default();
    let batch = vec![
        Reading::new().with("temperature", 20.0).with("humidity", 50.0).with("pressure", 1000.0),
        Reading::new().with("temperature", 21.0).with("humidity", 51.0).with("pressure", 1001.0),
    ];

    assert_eq!(
        pre.prepare_training(&batch),
        Err(PreprocessError::MissingFeature("vibration".to_string()))
    );
}

#[test]
fn test_single_reading_fills_with_training_means() {
    let pre = Preprocessor::default();
    let batch = vec![reading(20.0, 50.0, 1000.0, 1.0), reading(22.0, 54.0, 1004.0, 3.0)];
    let (_, scaler) = pre.prepare_training(&batch).unwrap();

    let partial = Reading::new().with("temperature", 22.0);
    let row = pre.prepare_reading(&partial, &scaler).unwrap();

    assert_eq!(row.dim(), (1, 4));
    assert!((row[[0, 0]] - 1.0).abs() < 1e-12);
    // Filled features sit exactly on the training mean
    assert_eq!(row[[0, 1]], 0.0);
    assert_eq!(row[[0, 2]], 0.0);
    assert_eq!(row[[0, 3]], 0.0);
}

#[test]
fn test_prepare_reading_rejects_foreign_scaler() {
    let pre = Preprocessor::default();
    let scaler = StandardScaler::fit(&array![[1.0, 2.0], [2.0, 3.0]]).unwrap();

    assert!(matches!(
        pre.prepare_reading(&reading(1.0, 1.0, 1.0, 1.0), &scaler),
        Err(PreprocessError::ShapeMismatch { .. })
    ));
}
