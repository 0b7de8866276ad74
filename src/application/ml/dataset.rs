use crate::application::ml::feature_engineer::{FeatureEngineer, FeatureFrame};
use crate::domain::errors::ForecastError;
use crate::domain::ml::feature_registry::{input_column_names, input_row};
use crate::domain::ml::numeric::log_delta;
use crate::domain::series::HistoricalSeries;
use chrono::NaiveDate;
use tracing::{info, warn};

/// Longest feature lookback (MA20); the series must also cover this.
pub const MIN_FEATURE_LOOKBACK: usize = 20;

/// One supervised example: trailing window + features -> next log change.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSample {
    pub input: Vec<f64>,
    pub target: f64,
    pub label_date: NaiveDate,
}

/// Chronologically ordered training samples.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub samples: Vec<TrainingSample>,
    pub window_size: usize,
    pub feature_names: Vec<String>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn num_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn inputs(&self) -> Vec<Vec<f64>> {
        self.samples.iter().map(|s| s.input.clone()).collect()
    }

    pub fn targets(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.target).collect()
    }

    pub fn label_dates(&self) -> Vec<NaiveDate> {
        self.samples.iter().map(|s| s.label_date).collect()
    }
}

/// Slices a feature frame into sliding-window samples.
#[derive(Debug, Clone, Copy)]
pub struct DatasetBuilder {
    window_size: usize,
}

impl DatasetBuilder {
    pub fn new(window_size: usize) -> Result<Self, ForecastError> {
        if window_size == 0 {
            return Err(ForecastError::invalid("window_size must be positive"));
        }
        Ok(Self { window_size })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// The series must be strictly longer than this.
    pub fn min_required_rows(&self) -> usize {
        self.window_size.max(MIN_FEATURE_LOOKBACK) + 1
    }

    pub fn build_from_series(&self, series: &HistoricalSeries) -> Result<Dataset, ForecastError> {
        self.check_length(series.len())?;
        let frame = FeatureEngineer::compute(series)?;
        self.build(&frame)
    }

    pub fn build(&self, frame: &FeatureFrame) -> Result<Dataset, ForecastError> {
        self.check_length(frame.len())?;

        let w = self.window_size;
        let samples: Vec<TrainingSample> = (0..frame.len() - w)
            .map(|i| {
                let last = i + w - 1;
                TrainingSample {
                    input: input_row(&frame.values[i..=last], &frame.features[last]),
                    target: log_delta(frame.values[last], frame.values[last + 1]),
                    label_date: frame.dates[last + 1],
                }
            })
            .collect();

        info!(
            "DatasetBuilder: built {} samples (window {}) from {} rows",
            samples.len(),
            w,
            frame.len()
        );

        Ok(Dataset {
            samples,
            window_size: w,
            feature_names: input_column_names(w),
        })
    }

    fn check_length(&self, rows: usize) -> Result<(), ForecastError> {
        let required = self.min_required_rows();
        if rows <= required {
            warn!(
                "DatasetBuilder: series too short ({} rows, need more than {})",
                rows, required
            );
            return Err(ForecastError::InsufficientData {
                required,
                actual: rows,
            });
        }
        Ok(())
    }
}
