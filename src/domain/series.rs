//! Time series types consumed and produced by the forecasting engine.
//!
//! The engine takes one ascending, duplicate-free daily series and returns a
//! predicted series over the following business days.

use crate::domain::errors::ForecastError;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// One daily observation. `None` marks a gap to be closed by filling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

impl Observation {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self {
            date,
            value: Some(value),
        }
    }

    pub fn missing(date: NaiveDate) -> Self {
        Self { date, value: None }
    }
}

/// Ordered daily series with strictly increasing dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSeries {
    observations: Vec<Observation>,
}

impl HistoricalSeries {
    /// Validates ordering and that at least one value is observed.
    pub fn new(observations: Vec<Observation>) -> Result<Self, ForecastError> {
        if observations.is_empty() {
            return Err(ForecastError::invalid("series is empty"));
        }

        for pair in observations.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(ForecastError::invalid(format!(
                    "dates must be strictly increasing: {} followed by {}",
                    pair[0].date, pair[1].date
                )));
            }
        }

        if observations
            .iter()
            .any(|o| o.value.is_some_and(|v| !v.is_finite()))
        {
            return Err(ForecastError::invalid("series contains non-finite values"));
        }

        if observations.iter().all(|o| o.value.is_none()) {
            return Err(ForecastError::invalid("series has no observed values"));
        }

        Ok(Self { observations })
    }

    /// Builds a fully observed series from parallel date/value slices.
    pub fn from_values(dates: &[NaiveDate], values: &[f64]) -> Result<Self, ForecastError> {
        if dates.len() != values.len() {
            return Err(ForecastError::invalid(format!(
                "{} dates but {} values",
                dates.len(),
                values.len()
            )));
        }
        Self::new(
            dates
                .iter()
                .zip(values)
                .map(|(&date, &value)| Observation::new(date, value))
                .collect(),
        )
    }

    /// Builds a series of consecutive business days starting at `start`.
    pub fn business_daily(start: NaiveDate, values: &[f64]) -> Result<Self, ForecastError> {
        let start = if is_business_day(start) {
            start
        } else {
            next_business_day(start)
        };
        let dates = business_days_after(start - Duration::days(1), values.len());
        Self::from_values(&dates, values)
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.observations.iter().map(|o| o.date).collect()
    }

    pub fn last_date(&self) -> NaiveDate {
        // Non-empty by construction
        self.observations[self.observations.len() - 1].date
    }

    /// Values with gaps closed by forward fill, then backward fill.
    pub fn filled_values(&self) -> Vec<f64> {
        let raw: Vec<Option<f64>> = self.observations.iter().map(|o| o.value).collect();
        fill_forward_backward(&raw).unwrap_or_default()
    }

    /// Mean over observed values only.
    pub fn mean(&self) -> f64 {
        let observed: Vec<f64> = self.observations.iter().filter_map(|o| o.value).collect();
        observed.iter().sum::<f64>() / observed.len() as f64
    }
}

/// Forward fill then backward fill. Returns `None` when nothing is observed.
pub fn fill_forward_backward(raw: &[Option<f64>]) -> Option<Vec<f64>> {
    let first = raw.iter().find_map(|v| *v)?;
    let mut last = first;
    Some(
        raw.iter()
            .map(|v| {
                if let Some(v) = v {
                    last = *v;
                }
                last
            })
            .collect(),
    )
}

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// First weekday strictly after `date`. No holiday calendar.
pub fn next_business_day(date: NaiveDate) -> NaiveDate {
    let mut next = date + Duration::days(1);
    while !is_business_day(next) {
        next += Duration::days(1);
    }
    next
}

/// The `count` business days strictly following `date`.
pub fn business_days_after(date: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(count);
    let mut current = date;
    for _ in 0..count {
        current = next_business_day(current);
        dates.push(current);
    }
    dates
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictedPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Why a forecast was produced without a trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FallbackReason {
    NoModel,
    InsufficientData { required: usize, actual: usize },
    TrainingFailed { samples: usize },
}

/// Where the predicted values came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PredictionSource {
    Model { name: String },
    HistoricalMean { reason: FallbackReason },
}

/// Ordered predictions over the business days after the last historical date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSeries {
    points: Vec<PredictedPoint>,
    source: PredictionSource,
}

impl PredictionSeries {
    pub fn new(points: Vec<PredictedPoint>, source: PredictionSource) -> Self {
        Self { points, source }
    }

    pub fn points(&self) -> &[PredictedPoint] {
        &self.points
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn source(&self) -> &PredictionSource {
        &self.source
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.source, PredictionSource::HistoricalMean { .. })
    }
}
