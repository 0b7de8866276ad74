//! Recursive multi-step forecasting.
//!
//! Each step predicts one business day ahead, then feeds the prediction
//! back as if it were observed. Features that need future ground truth are
//! approximated:
//!
//! - step 1 reuses the last historical feature vector verbatim;
//! - MA5/MA10/MA20 and Volatility10 are recomputed over the combined
//!   (historical + predicted) working series;
//! - EMA5/EMA10 follow fixed smoothing (0.8/0.2 and 0.9/0.1) on the last
//!   prediction, MACD is their difference;
//! - ROC5 uses the last five predictions once available, else 0;
//! - ROC10, IV_diff5 and Vol_change are 0 after step 1;
//! - IV_diff1 is the last prediction minus the value before it;
//! - IV_max5/IV_min5 span the last five predictions once available, else
//!   the predictions plus the raw-value window.
//!
//! Calendar encodings always come from the target date itself.

use super::feature_engineer::{FeatureEngineer, cyclic_encoding};
use super::predictor::DeltaPredictor;
use super::trainer::TrainedModel;
use crate::domain::errors::ForecastError;
use crate::domain::ml::feature_registry::{FeatureVector, input_row};
use crate::domain::ml::numeric::{EPSILON, reconstruct};
use crate::domain::series::{
    FallbackReason, HistoricalSeries, PredictedPoint, PredictionSeries, PredictionSource,
    business_days_after,
};
use chrono::NaiveDate;
use statrs::statistics::{Data, Distribution};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

const EMA_FAST_DECAY: f64 = 0.8;
const EMA_SLOW_DECAY: f64 = 0.9;

fn tail(values: &[f64], n: usize) -> &[f64] {
    &values[values.len().saturating_sub(n)..]
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Rolling state of one forecast run. Private working copy of the history.
struct ForecastState {
    /// Last W raw values, oldest first.
    window: VecDeque<f64>,
    /// Historical values followed by predictions so far.
    combined: Vec<f64>,
    predictions: Vec<f64>,
    last_features: FeatureVector,
    last_value: f64,
    ema5: f64,
    ema10: f64,
}

impl ForecastState {
    fn new(values: &[f64], last_features: FeatureVector, window_size: usize) -> Self {
        let last = values[values.len() - 1];
        Self {
            window: tail(values, window_size).iter().copied().collect(),
            combined: values.to_vec(),
            predictions: Vec::new(),
            last_features,
            last_value: last.max(EPSILON),
            ema5: last_features.ema5,
            ema10: last_features.ema10,
        }
    }

    /// Feature vector for the step targeting `date`.
    fn features_for(&mut self, date: NaiveDate) -> FeatureVector {
        let [dow_sin, dow_cos, dom_sin, dom_cos] = cyclic_encoding(date);

        let Some(&last_pred) = self.predictions.last() else {
            return FeatureVector {
                dow_sin,
                dow_cos,
                dom_sin,
                dom_cos,
                ..self.last_features
            };
        };

        let volatility10 = Data::new(tail(&self.combined, 10).to_vec())
            .std_dev()
            .filter(|v| v.is_finite())
            .unwrap_or(self.last_features.volatility10);

        let preds = &self.predictions;
        let roc5 = match preds.len() {
            n if n >= 5 && preds[n - 5] != 0.0 => (last_pred - preds[n - 5]) / preds[n - 5] * 100.0,
            _ => 0.0,
        };

        self.ema5 = EMA_FAST_DECAY * self.ema5 + (1.0 - EMA_FAST_DECAY) * last_pred;
        self.ema10 = EMA_SLOW_DECAY * self.ema10 + (1.0 - EMA_SLOW_DECAY) * last_pred;

        // Value before the last prediction: a prediction, or the last real value
        let prior = self.combined[self.combined.len() - 2];

        let (iv_max5, iv_min5) = if preds.len() >= 5 {
            let recent = tail(preds, 5);
            (
                recent.iter().copied().fold(f64::MIN, f64::max),
                recent.iter().copied().fold(f64::MAX, f64::min),
            )
        } else {
            let mixed = preds.iter().chain(self.window.iter()).copied();
            (
                mixed.clone().fold(f64::MIN, f64::max),
                mixed.fold(f64::MAX, f64::min),
            )
        };

        FeatureVector {
            ma5: mean(tail(&self.combined, 5)),
            ma10: mean(tail(&self.combined, 10)),
            ma20: mean(tail(&self.combined, 20)),
            volatility10,
            roc5,
            roc10: 0.0,
            ema5: self.ema5,
            ema10: self.ema10,
            macd: self.ema5 - self.ema10,
            dow_sin,
            dow_cos,
            dom_sin,
            dom_cos,
            iv_diff1: last_pred - prior,
            iv_diff5: 0.0,
            iv_max5,
            iv_min5,
            vol_change: 0.0,
        }
    }

    fn push(&mut self, value: f64) {
        self.predictions.push(value);
        self.combined.push(value);
        self.window.pop_front();
        self.window.push_back(value);
        self.last_value = value;
    }
}

/// Extends a series `horizon` business days ahead.
#[derive(Debug, Clone, Copy)]
pub struct Forecaster {
    horizon: usize,
    window_size: usize,
}

impl Forecaster {
    pub fn new(horizon: usize, window_size: usize) -> Result<Self, ForecastError> {
        if horizon == 0 {
            return Err(ForecastError::invalid("horizon must be positive"));
        }
        if window_size == 0 {
            return Err(ForecastError::invalid("window_size must be positive"));
        }
        Ok(Self {
            horizon,
            window_size,
        })
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn forecast<R: DeltaPredictor>(
        &self,
        model: &TrainedModel<R>,
        series: &HistoricalSeries,
    ) -> Result<PredictionSeries, ForecastError> {
        if model.window_size() != self.window_size {
            return Err(ForecastError::WindowMismatch {
                trained: model.window_size(),
                requested: self.window_size,
            });
        }
        if series.len() < self.window_size {
            return Err(ForecastError::InsufficientData {
                required: self.window_size,
                actual: series.len(),
            });
        }

        let frame = FeatureEngineer::compute(series)?;
        let last_features = *frame
            .last_features()
            .ok_or_else(|| ForecastError::invalid("feature frame is empty"))?;
        let mut state = ForecastState::new(&frame.values, last_features, self.window_size);
        let dates = business_days_after(series.last_date(), self.horizon);

        let mut points = Vec::with_capacity(self.horizon);
        for (step, date) in dates.into_iter().enumerate() {
            let features = state.features_for(date);
            let window: Vec<f64> = state.window.iter().copied().collect();
            let delta = model.predict_delta(&input_row(&window, &features))?;
            if !delta.is_finite() {
                return Err(ForecastError::PredictionFailed {
                    reason: format!("non-finite delta {} at step {}", delta, step + 1),
                });
            }
            let value = reconstruct(state.last_value, delta);
            debug!(step = step + 1, %date, delta, value, "Forecaster: step");

            state.push(value);
            points.push(PredictedPoint { date, value });
        }

        info!(
            "Forecaster: {} steps with {} from {}",
            self.horizon,
            model.regressor().name(),
            series.last_date()
        );
        Ok(PredictionSeries::new(
            points,
            PredictionSource::Model {
                name: model.regressor().name().to_string(),
            },
        ))
    }

    /// `horizon` copies of the historical mean, flagged as a fallback.
    pub fn fallback(&self, series: &HistoricalSeries, reason: FallbackReason) -> PredictionSeries {
        let value = series.mean();
        warn!(
            "Forecaster: no model ({:?}), using historical mean {:.4}",
            reason, value
        );
        let points = business_days_after(series.last_date(), self.horizon)
            .into_iter()
            .map(|date| PredictedPoint { date, value })
            .collect();
        PredictionSeries::new(points, PredictionSource::HistoricalMean { reason })
    }

    pub fn forecast_or_fallback<R: DeltaPredictor>(
        &self,
        model: Option<&TrainedModel<R>>,
        series: &HistoricalSeries,
    ) -> Result<PredictionSeries, ForecastError> {
        match model {
            Some(model) => self.forecast(model, series),
            None => Ok(self.fallback(series, FallbackReason::NoModel)),
        }
    }
}
