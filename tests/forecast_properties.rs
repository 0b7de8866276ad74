use chrono::{Datelike, NaiveDate};
use volforecast::application::ml::dataset::DatasetBuilder;
use volforecast::application::ml::forecaster::Forecaster;
use volforecast::application::ml::predictor::DeltaPredictor;
use volforecast::application::ml::scaler::StandardScaler;
use volforecast::application::ml::trainer::TrainedModel;
use volforecast::domain::errors::ForecastError;
use volforecast::domain::ml::feature_registry::FEATURE_COUNT;
use volforecast::domain::series::{HistoricalSeries, business_days_after};

struct FixedDelta(f64);

impl DeltaPredictor for FixedDelta {
    fn predict(&self, _features: &[f64]) -> Result<f64, ForecastError> {
        Ok(self.0)
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

fn linear_series() -> HistoricalSeries {
    let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let values: Vec<f64> = (0..40).map(|i| 10.0 + i as f64).collect();
    HistoricalSeries::business_daily(start, &values).unwrap()
}

fn fixed_model(series: &HistoricalSeries, window: usize, delta: f64) -> TrainedModel<FixedDelta> {
    let dataset = DatasetBuilder::new(window)
        .unwrap()
        .build_from_series(series)
        .unwrap();
    let scaler = StandardScaler::fit(&dataset.inputs()).unwrap();
    TrainedModel::new(FixedDelta(delta), scaler, window).unwrap()
}

#[test]
fn test_dataset_length_and_label_dates() {
    let series = linear_series();
    for window in [5, 10, 15] {
        let dataset = DatasetBuilder::new(window)
            .unwrap()
            .build_from_series(&series)
            .unwrap();
        assert_eq!(dataset.len(), series.len() - window);
        assert_eq!(dataset.num_features(), window + FEATURE_COUNT);

        let labels = dataset.label_dates();
        assert!(labels.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(labels[0], series.dates()[window]);
        assert_eq!(*labels.last().unwrap(), series.last_date());
    }
}

#[test]
fn test_linear_series_scenario() {
    let series = linear_series();
    let dataset = DatasetBuilder::new(10)
        .unwrap()
        .build_from_series(&series)
        .unwrap();
    assert_eq!(dataset.len(), 30);

    let targets = dataset.targets();
    assert!((targets[0] - (20.0f64.ln() - 19.0f64.ln())).abs() < 1e-12);
    assert!((targets[1] - 0.04879).abs() < 1e-5);

    let forecaster = Forecaster::new(5, 10).unwrap();
    let predictions = forecaster
        .forecast(&fixed_model(&series, 10, 0.0), &series)
        .unwrap();
    assert_eq!(predictions.values(), vec![49.0; 5]);
}

#[test]
fn test_zero_delta_round_trip_is_exact() {
    let start = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
    let values: Vec<f64> = (0..45)
        .map(|i| 17.3 + (i as f64 * 0.7).sin() * 4.1)
        .collect();
    let series = HistoricalSeries::business_daily(start, &values).unwrap();
    let last = *values.last().unwrap();

    let predictions = Forecaster::new(6, 8)
        .unwrap()
        .forecast(&fixed_model(&series, 8, 0.0), &series)
        .unwrap();
    assert!(predictions.values().iter().all(|v| *v == last));
}

#[test]
fn test_prediction_dates_are_business_days() {
    let series = linear_series();
    let predictions = Forecaster::new(10, 10)
        .unwrap()
        .forecast(&fixed_model(&series, 10, 0.02), &series)
        .unwrap();
    let dates = predictions.dates();

    assert_eq!(dates, business_days_after(series.last_date(), 10));
    assert!(dates.iter().all(|d| d.weekday().num_days_from_monday() < 5));
    assert!(dates.windows(2).all(|w| w[0] < w[1]));
    assert!(dates[0] > series.last_date());
}

#[test]
fn test_predictions_never_negative() {
    let series = linear_series();
    for delta in [-0.5, -50.0, -1e6] {
        let predictions = Forecaster::new(7, 10)
            .unwrap()
            .forecast(&fixed_model(&series, 10, delta), &series)
            .unwrap();
        assert!(predictions.values().iter().all(|v| *v >= 0.0 && v.is_finite()));
    }
}

#[test]
fn test_short_series_insufficient_then_mean_fallback() {
    let start = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
    let series = HistoricalSeries::business_daily(start, &[20.0, 22.0, 24.0, 26.0, 28.0]).unwrap();

    let err = DatasetBuilder::new(20)
        .unwrap()
        .build_from_series(&series)
        .unwrap_err();
    assert!(matches!(err, ForecastError::InsufficientData { .. }));

    let predictions = Forecaster::new(15, 20)
        .unwrap()
        .forecast_or_fallback::<FixedDelta>(None, &series)
        .unwrap();
    assert_eq!(predictions.values(), vec![24.0; 15]);
    assert!(predictions.is_fallback());
}

#[test]
fn test_non_positive_value_gives_finite_targets() {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let mut values: Vec<f64> = (0..35).map(|i| 12.0 + (i % 4) as f64).collect();
    values[22] = 0.0;
    let series = HistoricalSeries::business_daily(start, &values).unwrap();

    let dataset = DatasetBuilder::new(5)
        .unwrap()
        .build_from_series(&series)
        .unwrap();
    assert!(dataset.targets().iter().all(|t| t.is_finite()));
    assert!(dataset.inputs().iter().flatten().all(|x| x.is_finite()));
}

#[test]
fn test_mismatched_row_width_aborts_prediction() {
    let series = linear_series();
    let model = fixed_model(&series, 10, 0.0);
    let err = model.predict_delta(&[1.0; 7]).unwrap_err();
    assert_eq!(
        err,
        ForecastError::ScalerMismatch {
            expected: 10 + FEATURE_COUNT,
            actual: 7
        }
    );
}
