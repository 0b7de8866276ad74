//! Train-then-forecast orchestration.
//!
//! Data and training insufficiency stop at this boundary and turn into a
//! flagged historical-mean forecast. Malformed input still aborts.

use super::dataset::DatasetBuilder;
use super::forecaster::Forecaster;
use super::summary::ForecastSummary;
use super::trainer::{ModelTrainer, TrainedModel, TrainerConfig, TrainingReport};
use crate::domain::errors::ForecastError;
use crate::domain::series::{FallbackReason, HistoricalSeries, PredictionSeries};
use std::sync::Arc;
use tracing::info;

/// Receives diagnostics that are not needed for correctness.
pub trait DiagnosticsSink: Send + Sync {
    fn on_training_complete(&self, report: &TrainingReport);

    fn on_fallback(&self, reason: &FallbackReason, value: f64);
}

/// Drops every record.
pub struct NoopDiagnostics;

impl DiagnosticsSink for NoopDiagnostics {
    fn on_training_complete(&self, _report: &TrainingReport) {}

    fn on_fallback(&self, _reason: &FallbackReason, _value: f64) {}
}

#[derive(Debug, Clone)]
pub struct ForecastOutcome {
    pub predictions: PredictionSeries,
    pub model: Option<TrainedModel>,
    pub report: Option<TrainingReport>,
    pub summary: Option<ForecastSummary>,
}

pub struct ForecastService {
    builder: DatasetBuilder,
    trainer: ModelTrainer,
    forecaster: Forecaster,
    diagnostics: Arc<dyn DiagnosticsSink>,
}

impl ForecastService {
    pub fn new(
        window_size: usize,
        horizon: usize,
        trainer_config: TrainerConfig,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> Result<Self, ForecastError> {
        Ok(Self {
            builder: DatasetBuilder::new(window_size)?,
            trainer: ModelTrainer::new(trainer_config)?,
            forecaster: Forecaster::new(horizon, window_size)?,
            diagnostics,
        })
    }

    pub fn forecaster(&self) -> &Forecaster {
        &self.forecaster
    }

    /// Builds the dataset and trains. Errors are returned as-is.
    pub fn train(
        &self,
        series: &HistoricalSeries,
    ) -> Result<(TrainedModel, TrainingReport), ForecastError> {
        let dataset = self.builder.build_from_series(series)?;
        let (model, report) = self.trainer.train(&dataset)?;
        self.diagnostics.on_training_complete(&report);
        Ok((model, report))
    }

    /// Forecasts with an existing model, or falls back when there is none.
    pub fn forecast(
        &self,
        model: Option<&TrainedModel>,
        series: &HistoricalSeries,
    ) -> Result<PredictionSeries, ForecastError> {
        let predictions = self.forecaster.forecast_or_fallback(model, series)?;
        if model.is_none() {
            self.diagnostics
                .on_fallback(&FallbackReason::NoModel, series.mean());
        }
        Ok(predictions)
    }

    /// Trains on `series` and forecasts from its end.
    pub fn run(&self, series: &HistoricalSeries) -> Result<ForecastOutcome, ForecastError> {
        let (predictions, model, report) = match self.train(series) {
            Ok((model, report)) => {
                let predictions = self.forecaster.forecast(&model, series)?;
                (predictions, Some(model), Some(report))
            }
            Err(e) if e.is_recoverable() => {
                info!("ForecastService: training skipped ({}), falling back", e);
                let reason = match e {
                    ForecastError::InsufficientData { required, actual } => {
                        FallbackReason::InsufficientData { required, actual }
                    }
                    ForecastError::ModelTrainingFailed { samples, .. } => {
                        FallbackReason::TrainingFailed { samples }
                    }
                    _ => FallbackReason::NoModel,
                };
                self.diagnostics.on_fallback(&reason, series.mean());
                (self.forecaster.fallback(series, reason), None, None)
            }
            Err(e) => return Err(e),
        };

        let summary = ForecastSummary::from_forecast(series, &predictions);
        Ok(ForecastOutcome {
            predictions,
            model,
            report,
            summary,
        })
    }
}
