//! Technical features derived from a single daily series.
//!
//! Every column is computed from values up to and including its own date.
//! Warm-up positions start out missing and are closed by forward then
//! backward fill, so no NaN leaves this module.

use crate::domain::errors::ForecastError;
use crate::domain::ml::feature_registry::{FEATURE_COUNT, FeatureVector};
use crate::domain::series::{HistoricalSeries, fill_forward_backward};
use chrono::{Datelike, NaiveDate};
use statrs::statistics::{Data, Distribution};
use std::f64::consts::PI;
use ta::Next;
use ta::indicators::ExponentialMovingAverage;

pub const EMA_FAST_SPAN: usize = 5;
pub const EMA_SLOW_SPAN: usize = 10;

/// Gap-filled values with one feature vector per date.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
    pub features: Vec<FeatureVector>,
}

impl FeatureFrame {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn last_features(&self) -> Option<&FeatureVector> {
        self.features.last()
    }
}

/// sin/cos of day-of-week (Monday = 0, period 7) and day-of-month (period 31).
pub fn cyclic_encoding(date: NaiveDate) -> [f64; 4] {
    let dow = date.weekday().num_days_from_monday() as f64;
    let dom = date.day() as f64;
    [
        (2.0 * PI * dow / 7.0).sin(),
        (2.0 * PI * dow / 7.0).cos(),
        (2.0 * PI * dom / 31.0).sin(),
        (2.0 * PI * dom / 31.0).cos(),
    ]
}

/// Trailing window ending at `i`, or `None` during warm-up.
fn trailing(values: &[f64], i: usize, n: usize) -> Option<&[f64]> {
    (i + 1 >= n).then(|| &values[i + 1 - n..=i])
}

fn rolling_mean(values: &[f64], n: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| trailing(values, i, n).map(|w| w.iter().sum::<f64>() / n as f64))
        .collect()
}

/// Sample standard deviation (n - 1 denominator).
fn rolling_std(values: &[f64], n: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| trailing(values, i, n).and_then(|w| Data::new(w.to_vec()).std_dev()))
        .collect()
}

fn rolling_max(values: &[f64], n: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| trailing(values, i, n).map(|w| w.iter().copied().fold(f64::MIN, f64::max)))
        .collect()
}

fn rolling_min(values: &[f64], n: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| trailing(values, i, n).map(|w| w.iter().copied().fold(f64::MAX, f64::min)))
        .collect()
}

fn diff(values: &[f64], lag: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| (i >= lag).then(|| values[i] - values[i - lag]))
        .collect()
}

/// Percent change vs `lag` positions back. Division by zero yields a
/// non-finite value, which is treated as missing.
fn pct_change(values: &[Option<f64>], lag: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if i < lag {
                return None;
            }
            let (prev, curr) = (values[i - lag]?, values[i]?);
            Some((curr - prev) / prev * 100.0)
        })
        .collect()
}

fn ema(values: &[f64], span: usize) -> Result<Vec<Option<f64>>, ForecastError> {
    let mut indicator = ExponentialMovingAverage::new(span)
        .map_err(|e| ForecastError::invalid(format!("EMA span {}: {:?}", span, e)))?;
    Ok(values.iter().map(|&v| Some(indicator.next(v))).collect())
}

/// Fills a feature column; a column with no finite value becomes zeros.
fn fill_column(column: Vec<Option<f64>>) -> Vec<f64> {
    let len = column.len();
    let cleaned: Vec<Option<f64>> = column
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect();
    fill_forward_backward(&cleaned).unwrap_or_else(|| vec![0.0; len])
}

pub struct FeatureEngineer;

impl FeatureEngineer {
    pub fn compute(series: &HistoricalSeries) -> Result<FeatureFrame, ForecastError> {
        Self::compute_values(&series.dates(), &series.filled_values())
    }

    /// Derives features from already gap-filled values.
    pub fn compute_values(
        dates: &[NaiveDate],
        values: &[f64],
    ) -> Result<FeatureFrame, ForecastError> {
        if dates.len() != values.len() {
            return Err(ForecastError::invalid(format!(
                "{} dates but {} values",
                dates.len(),
                values.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::invalid("feature input contains non-finite values"));
        }

        let observed: Vec<Option<f64>> = values.iter().map(|&v| Some(v)).collect();
        let volatility = rolling_std(values, 10);
        let ema5 = ema(values, EMA_FAST_SPAN)?;
        let ema10 = ema(values, EMA_SLOW_SPAN)?;
        let macd: Vec<Option<f64>> = ema5
            .iter()
            .zip(&ema10)
            .map(|(f, s)| Some((*f)? - (*s)?))
            .collect();

        let mut cyclic: [Vec<Option<f64>>; 4] = Default::default();
        for date in dates {
            for (column, value) in cyclic.iter_mut().zip(cyclic_encoding(*date)) {
                column.push(Some(value));
            }
        }
        let [dow_sin, dow_cos, dom_sin, dom_cos] = cyclic;

        // Same order as FEATURE_NAMES
        let columns: [Vec<Option<f64>>; FEATURE_COUNT] = [
            rolling_mean(values, 5),
            rolling_mean(values, 10),
            rolling_mean(values, 20),
            volatility.clone(),
            pct_change(&observed, 5),
            pct_change(&observed, 10),
            ema5,
            ema10,
            macd,
            dow_sin,
            dow_cos,
            dom_sin,
            dom_cos,
            diff(values, 1),
            diff(values, 5),
            rolling_max(values, 5),
            rolling_min(values, 5),
            pct_change(&volatility, 1),
        ];
        let filled: Vec<Vec<f64>> = columns.into_iter().map(fill_column).collect();

        let features = (0..values.len())
            .map(|i| {
                let mut row = [0.0; FEATURE_COUNT];
                for (slot, column) in row.iter_mut().zip(&filled) {
                    *slot = column[i];
                }
                FeatureVector::from_array(row)
            })
            .collect();

        Ok(FeatureFrame {
            dates: dates.to_vec(),
            values: values.to_vec(),
            features,
        })
    }
}
