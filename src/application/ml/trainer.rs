//! Hyperparameter search and fit of the next-day log-change regressor.
//!
//! The scaler is fitted once on the full training matrix. Candidates are
//! drawn from the search space, scored by negative MSE over time-ordered
//! folds (in parallel, one trial per task), and the best one is refit on
//! every sample.

use super::cross_validation::{Fold, TimeSeriesSplit, holdout_split};
use super::dataset::Dataset;
use super::gbm::{GbmParams, GradientBoostingRegressor};
use super::predictor::DeltaPredictor;
use super::scaler::StandardScaler;
use super::search::SearchSpace;
use crate::domain::errors::ForecastError;
use crate::domain::ml::feature_registry::{FEATURE_COUNT, input_column_names};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smartcore::metrics::{mean_squared_error, r2 as r2_score};
use std::cmp::Ordering;
use tracing::{debug, info, warn};

pub const MIN_TRAINING_SAMPLES: usize = 10;

/// A regressor bundled with the scaler it was trained with.
///
/// Fields are private so the pair can only be used together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel<R = GradientBoostingRegressor> {
    regressor: R,
    scaler: StandardScaler,
    feature_names: Vec<String>,
    window_size: usize,
}

impl<R: DeltaPredictor> TrainedModel<R> {
    pub fn new(
        regressor: R,
        scaler: StandardScaler,
        window_size: usize,
    ) -> Result<Self, ForecastError> {
        let expected = window_size + FEATURE_COUNT;
        if scaler.n_features() != expected {
            return Err(ForecastError::ScalerMismatch {
                expected,
                actual: scaler.n_features(),
            });
        }
        Ok(Self {
            regressor,
            scaler,
            feature_names: input_column_names(window_size),
            window_size,
        })
    }

    pub fn regressor(&self) -> &R {
        &self.regressor
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn into_parts(self) -> (R, StandardScaler, usize) {
        (self.regressor, self.scaler, self.window_size)
    }

    /// Scales one raw input row with the frozen scaler and predicts its log change.
    pub fn predict_delta(&self, raw_row: &[f64]) -> Result<f64, ForecastError> {
        let scaled = self.scaler.transform(raw_row)?;
        self.regressor.predict(&scaled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mse: f64,
    pub r2: f64,
}

impl RegressionMetrics {
    pub fn compute(y_true: &[f64], y_pred: &[f64]) -> Self {
        let truth = y_true.to_vec();
        let pred = y_pred.to_vec();
        let mse: f64 = mean_squared_error(&truth, &pred);

        let mean = truth.iter().sum::<f64>() / truth.len() as f64;
        let constant = truth.iter().all(|t| (t - mean).abs() < f64::EPSILON);
        let r2: f64 = if constant { 0.0 } else { r2_score(&truth, &pred) };
        Self { mse, r2 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub name: String,
    pub importance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub params: GbmParams,
    /// Mean negative MSE over folds; `None` if the trial failed.
    pub score: Option<f64>,
}

/// Diagnostics of one training run. Not needed to forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub n_samples: usize,
    pub best_params: GbmParams,
    pub cv_score: f64,
    pub in_sample: RegressionMetrics,
    pub holdout: Option<RegressionMetrics>,
    /// Sorted by importance, highest first.
    pub feature_importances: Vec<FeatureImportance>,
    pub trials: Vec<TrialResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub search_space: SearchSpace,
    pub search_iterations: usize,
    pub cv_folds: usize,
    pub seed: u64,
    pub validation_fraction: f64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            search_space: SearchSpace::default(),
            search_iterations: 20,
            cv_folds: 3,
            seed: 42,
            validation_fraction: 0.2,
        }
    }
}

pub struct ModelTrainer {
    config: TrainerConfig,
    splitter: TimeSeriesSplit,
}

fn rows(x: &[Vec<f64>], range: &std::ops::Range<usize>) -> Vec<Vec<f64>> {
    x[range.clone()].to_vec()
}

impl ModelTrainer {
    pub fn new(config: TrainerConfig) -> Result<Self, ForecastError> {
        config.search_space.validate()?;
        if config.search_iterations == 0 {
            return Err(ForecastError::invalid("search_iterations must be positive"));
        }
        if !(0.0..1.0).contains(&config.validation_fraction) {
            return Err(ForecastError::invalid(format!(
                "validation_fraction must be in [0, 1), got {}",
                config.validation_fraction
            )));
        }
        let splitter = TimeSeriesSplit::new(config.cv_folds)?;
        Ok(Self { config, splitter })
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    fn score_candidate(
        params: &GbmParams,
        x: &[Vec<f64>],
        y: &[f64],
        folds: &[Fold],
    ) -> Result<f64, ForecastError> {
        let mut total = 0.0;
        for fold in folds {
            let model = GradientBoostingRegressor::fit(
                &rows(x, &fold.train),
                &y[fold.train.clone()],
                params.clone(),
            )?;
            let pred = model.predict_batch(&rows(x, &fold.test))?;
            total += RegressionMetrics::compute(&y[fold.test.clone()], &pred).mse;
        }
        Ok(-total / folds.len() as f64)
    }

    pub fn train(
        &self,
        dataset: &Dataset,
    ) -> Result<(TrainedModel, TrainingReport), ForecastError> {
        let n = dataset.len();
        if n < MIN_TRAINING_SAMPLES {
            warn!(
                "ModelTrainer: only {} samples, need {}",
                n, MIN_TRAINING_SAMPLES
            );
            return Err(ForecastError::ModelTrainingFailed {
                samples: n,
                required: MIN_TRAINING_SAMPLES,
            });
        }

        let scaler = StandardScaler::fit(&dataset.inputs())?;
        let x = scaler.transform_all(&dataset.inputs())?;
        let y = dataset.targets();
        let folds = self.splitter.split(n)?;

        let candidates = self
            .config
            .search_space
            .sample(self.config.search_iterations, self.config.seed);
        info!(
            "ModelTrainer: evaluating {} candidates over {} time-ordered folds ({} samples)",
            candidates.len(),
            folds.len(),
            n
        );

        let trials: Vec<TrialResult> = candidates
            .into_par_iter()
            .map(|params| {
                let score = match Self::score_candidate(&params, &x, &y, &folds) {
                    Ok(score) => Some(score),
                    Err(e) => {
                        warn!("ModelTrainer: candidate {:?} failed: {}", params, e);
                        None
                    }
                };
                TrialResult { params, score }
            })
            .collect();

        // Earliest candidate wins ties
        let (best_params, cv_score) = trials
            .iter()
            .filter_map(|t| t.score.map(|s| (&t.params, s)))
            .fold(None::<(&GbmParams, f64)>, |best, (params, score)| match best {
                Some((_, best_score)) if score.partial_cmp(&best_score) != Some(Ordering::Greater) => best,
                _ => Some((params, score)),
            })
            .map(|(p, s)| (p.clone(), s))
            .ok_or_else(|| ForecastError::invalid("no hyperparameter candidate could be evaluated"))?;
        debug!("ModelTrainer: best params {:?} (cv score {:.6})", best_params, cv_score);

        let holdout = match holdout_split(n, self.config.validation_fraction) {
            Some(fold) => {
                let model = GradientBoostingRegressor::fit(
                    &rows(&x, &fold.train),
                    &y[fold.train.clone()],
                    best_params.clone(),
                )?;
                let pred = model.predict_batch(&rows(&x, &fold.test))?;
                Some(RegressionMetrics::compute(&y[fold.test.clone()], &pred))
            }
            None => None,
        };

        let regressor = GradientBoostingRegressor::fit(&x, &y, best_params.clone())?;
        let in_sample = RegressionMetrics::compute(&y, &regressor.predict_batch(&x)?);

        let mut feature_importances: Vec<FeatureImportance> = dataset
            .feature_names
            .iter()
            .zip(regressor.feature_importances())
            .map(|(name, importance)| FeatureImportance {
                name: name.clone(),
                importance,
            })
            .collect();
        feature_importances.sort_by(|a, b| {
            b.importance
                .partial_cmp(&a.importance)
                .unwrap_or(Ordering::Equal)
        });

        info!(
            "ModelTrainer: fitted {} trees - in-sample MSE {:.6}, R² {:.4}",
            regressor.n_trees(),
            in_sample.mse,
            in_sample.r2
        );

        let model = TrainedModel::new(regressor, scaler, dataset.window_size)?;
        let report = TrainingReport {
            n_samples: n,
            best_params,
            cv_score,
            in_sample,
            holdout,
            feature_importances,
            trials,
        };
        Ok((model, report))
    }
}
