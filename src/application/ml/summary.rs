use crate::domain::series::{HistoricalSeries, PredictionSeries};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Distribution};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Rising,
    Falling,
    Flat,
}

/// Position of the last prediction relative to mean ± one sample std.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigmaBand {
    AboveOneSigma,
    BelowOneSigma,
    WithinOneSigma,
}

/// Numbers a chart or commentary layer needs about one forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSummary {
    pub current_value: f64,
    pub last_predicted: f64,
    /// Signed percent change from current to last predicted; 0 when current is 0.
    pub change_pct: f64,
    pub direction: Direction,
    pub predicted_min: f64,
    pub predicted_max: f64,
    pub predicted_range: f64,
    pub historical_mean: f64,
    pub historical_std: f64,
    pub band: SigmaBand,
    pub is_fallback: bool,
}

impl ForecastSummary {
    pub fn from_forecast(history: &HistoricalSeries, predictions: &PredictionSeries) -> Option<Self> {
        let filled = history.filled_values();
        let current_value = *filled.last()?;
        let values = predictions.values();
        let last_predicted = *values.last()?;

        let predicted_min = values.iter().copied().fold(f64::MAX, f64::min);
        let predicted_max = values.iter().copied().fold(f64::MIN, f64::max);

        let observed: Vec<f64> = history
            .observations()
            .iter()
            .filter_map(|o| o.value)
            .collect();
        let data = Data::new(observed);
        let historical_mean = data.mean().unwrap_or(current_value);
        let historical_std = data.std_dev().filter(|s| s.is_finite()).unwrap_or(0.0);

        let direction = if last_predicted > current_value {
            Direction::Rising
        } else if last_predicted < current_value {
            Direction::Falling
        } else {
            Direction::Flat
        };
        let change_pct = if current_value != 0.0 {
            (last_predicted - current_value) / current_value * 100.0
        } else {
            0.0
        };
        let band = if last_predicted > historical_mean + historical_std {
            SigmaBand::AboveOneSigma
        } else if last_predicted < historical_mean - historical_std {
            SigmaBand::BelowOneSigma
        } else {
            SigmaBand::WithinOneSigma
        };

        Some(Self {
            current_value,
            last_predicted,
            change_pct,
            direction,
            predicted_min,
            predicted_max,
            predicted_range: predicted_max - predicted_min,
            historical_mean,
            historical_std,
            band,
            is_fallback: predictions.is_fallback(),
        })
    }
}
