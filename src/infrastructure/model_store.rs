//! JSON persistence of trained models.

use crate::application::ml::trainer::TrainedModel;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

pub fn save_model(model: &TrainedModel, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create model file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, model).context("Failed to serialize model")?;
    writer
        .flush()
        .with_context(|| format!("Failed to write model file {}", path.display()))?;
    info!(
        "Saved model (window {}) to {:?}",
        model.window_size(),
        path
    );
    Ok(())
}

/// Loads a model and re-checks that regressor, scaler and window agree.
pub fn load_model(path: &Path) -> Result<TrainedModel> {
    let file =
        File::open(path).with_context(|| format!("Failed to open model file {}", path.display()))?;
    let stored: TrainedModel = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to deserialize model from {}", path.display()))?;

    let (regressor, scaler, window_size) = stored.into_parts();
    if regressor.n_features() != scaler.n_features() {
        anyhow::bail!(
            "Corrupt model file {}: regressor expects {} inputs, scaler {}",
            path.display(),
            regressor.n_features(),
            scaler.n_features()
        );
    }
    let model = TrainedModel::new(regressor, scaler, window_size)
        .with_context(|| format!("Corrupt model file {}", path.display()))?;
    info!("Successfully loaded model from {:?}", path);
    Ok(model)
}

/// Like [`load_model`], but a missing file is `None` rather than an error.
pub fn load_model_if_exists(path: &Path) -> Result<Option<TrainedModel>> {
    if !path.exists() {
        warn!(
            "Model file not found at {:?}. Forecasts will use the historical mean.",
            path
        );
        return Ok(None);
    }
    load_model(path).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ml::gbm::{GbmParams, GradientBoostingRegressor};
    use crate::application::ml::scaler::StandardScaler;
    use crate::domain::ml::feature_registry::FEATURE_COUNT;

    fn model(window: usize) -> TrainedModel {
        let width = window + FEATURE_COUNT;
        let x: Vec<Vec<f64>> = (0..30)
            .map(|i| (0..width).map(|j| (i * (j + 1)) as f64 * 0.01).collect())
            .collect();
        let y: Vec<f64> = (0..30).map(|i| (i as f64 * 0.3).sin() * 0.05).collect();
        let scaler = StandardScaler::fit(&x).unwrap();
        let params = GbmParams {
            num_leaves: 4,
            n_estimators: 5,
            min_child_samples: 3,
            ..Default::default()
        };
        let regressor = GradientBoostingRegressor::fit(&scaler.transform_all(&x).unwrap(), &y, params).unwrap();
        TrainedModel::new(regressor, scaler, window).unwrap()
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("volforecast_{}_{}.json", name, std::process::id()))
    }

    #[test]
    fn test_save_and_load_preserves_predictions() {
        let path = temp_path("roundtrip");
        let original = model(3);
        save_model(&original, &path).unwrap();
        let loaded = load_model(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded.window_size(), 3);
        let row = vec![0.1; 3 + FEATURE_COUNT];
        let diff = loaded.predict_delta(&row).unwrap() - original.predict_delta(&row).unwrap();
        assert!(diff.abs() < 1e-9);
    }

    #[test]
    fn test_saved_file_is_complete_json() {
        let path = temp_path("complete");
        save_model(&model(2), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert!(text.ends_with('}'));
        assert!(serde_json::from_str::<serde_json::Value>(&text).is_ok());
    }

    #[test]
    fn test_save_into_missing_directory_fails() {
        let path = std::env::temp_dir()
            .join(format!("volforecast_no_dir_{}", std::process::id()))
            .join("model.json");
        assert!(save_model(&model(2), &path).is_err());
    }

    #[test]
    fn test_missing_file_is_none() {
        let path = temp_path("does_not_exist");
        assert!(load_model_if_exists(&path).unwrap().is_none());
        assert!(load_model(&path).is_err());
    }

    #[test]
    fn test_garbage_file_is_error() {
        let path = temp_path("garbage");
        std::fs::write(&path, "{not json").unwrap();
        let result = load_model(&path);
        let _ = std::fs::remove_file(&path);
        assert!(result.is_err());
    }
}
