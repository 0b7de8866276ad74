use chrono::NaiveDate;
use std::sync::Arc;
use volforecast::application::ml::forecaster::Forecaster;
use volforecast::application::ml::search::SearchSpace;
use volforecast::application::ml::service::{ForecastService, NoopDiagnostics};
use volforecast::application::ml::trainer::TrainerConfig;
use volforecast::domain::errors::ForecastError;
use volforecast::domain::series::{FallbackReason, HistoricalSeries, PredictionSource};
use volforecast::infrastructure::{csv_loader, model_store};

fn small_config(seed: u64) -> TrainerConfig {
    TrainerConfig {
        search_space: SearchSpace {
            num_leaves: vec![4, 8],
            learning_rate: vec![0.05, 0.1],
            n_estimators: vec![20, 40],
            min_child_samples: vec![3, 5],
            min_split_gain: vec![0.0],
            reg_alpha: vec![0.0, 0.1],
            reg_lambda: vec![0.0, 1.0],
        },
        search_iterations: 4,
        cv_folds: 3,
        seed,
        validation_fraction: 0.2,
    }
}

fn wavy_series(n: usize) -> HistoricalSeries {
    let start = NaiveDate::from_ymd_opt(2023, 9, 1).unwrap();
    let values: Vec<f64> = (0..n)
        .map(|i| {
            let t = i as f64;
            20.0 + 3.0 * (t * 0.3).sin() + 1.5 * (t * 0.07).cos() + (i % 3) as f64 * 0.2
        })
        .collect();
    HistoricalSeries::business_daily(start, &values).unwrap()
}

fn service(window: usize, horizon: usize, seed: u64) -> ForecastService {
    ForecastService::new(window, horizon, small_config(seed), Arc::new(NoopDiagnostics)).unwrap()
}

#[test]
fn test_train_and_forecast_pipeline() {
    let series = wavy_series(90);
    let outcome = service(10, 15, 42).run(&series).unwrap();

    assert_eq!(outcome.predictions.len(), 15);
    assert!(matches!(
        outcome.predictions.source(),
        PredictionSource::Model { .. }
    ));
    assert!(outcome.predictions.values().iter().all(|v| v.is_finite() && *v >= 0.0));

    let report = outcome.report.unwrap();
    assert_eq!(report.n_samples, 80);
    assert_eq!(report.trials.len(), 4);
    assert!(report.holdout.is_some());
    assert_eq!(report.feature_importances.len(), 10 + 18);
    assert!(
        report
            .feature_importances
            .windows(2)
            .all(|w| w[0].importance >= w[1].importance)
    );

    let summary = outcome.summary.unwrap();
    assert!(!summary.is_fallback);
    assert_eq!(summary.last_predicted, *outcome.predictions.values().last().unwrap());
}

#[test]
fn test_same_seed_same_forecast() {
    let series = wavy_series(70);
    let a = service(8, 10, 7).run(&series).unwrap();
    let b = service(8, 10, 7).run(&series).unwrap();

    assert_eq!(a.predictions, b.predictions);
    assert_eq!(a.report, b.report);
}

#[test]
fn test_same_model_same_forecast() {
    let series = wavy_series(70);
    let svc = service(8, 10, 3);
    let (model, _) = svc.train(&series).unwrap();

    let first = svc.forecast(Some(&model), &series).unwrap();
    let second = svc.forecast(Some(&model), &series).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_short_series_falls_back_to_mean() {
    let start = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
    let series = HistoricalSeries::business_daily(start, &[20.0, 22.0, 24.0, 26.0, 28.0]).unwrap();
    let outcome = service(20, 15, 42).run(&series).unwrap();

    assert_eq!(outcome.predictions.values(), vec![24.0; 15]);
    assert_eq!(
        outcome.predictions.source(),
        &PredictionSource::HistoricalMean {
            reason: FallbackReason::InsufficientData {
                required: 21,
                actual: 5
            }
        }
    );
    assert!(outcome.report.is_none());
    assert!(outcome.summary.unwrap().is_fallback);
}

#[test]
fn test_persisted_model_forecasts_identically() {
    let series = wavy_series(70);
    let svc = service(8, 6, 11);
    let (model, _) = svc.train(&series).unwrap();
    let direct = svc.forecast(Some(&model), &series).unwrap();

    let path = std::env::temp_dir().join(format!("volforecast_it_{}.json", std::process::id()));
    model_store::save_model(&model, &path).unwrap();
    let loaded = model_store::load_model(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    let reloaded = svc.forecast(Some(&loaded), &series).unwrap();
    assert_eq!(direct.dates(), reloaded.dates());
    for (a, b) in direct.values().iter().zip(reloaded.values()) {
        assert!((a - b).abs() < 1e-9);
    }

    let wider = Forecaster::new(6, 12).unwrap();
    assert_eq!(
        wider.forecast(&loaded, &series).unwrap_err(),
        ForecastError::WindowMismatch {
            trained: 8,
            requested: 12
        }
    );
}

#[test]
fn test_csv_series_feeds_pipeline() {
    let mut csv = String::from("date,value\n");
    let series = wavy_series(60);
    for (i, obs) in series.observations().iter().enumerate() {
        // Leave a couple of gaps
        if i == 17 || i == 40 {
            csv.push_str(&format!("{},\n", obs.date));
        } else {
            csv.push_str(&format!("{},{}\n", obs.date, obs.value.unwrap()));
        }
    }

    let loaded = csv_loader::read_series(csv.as_bytes()).unwrap();
    assert_eq!(loaded.len(), 60);
    let outcome = service(10, 5, 1).run(&loaded).unwrap();
    assert_eq!(outcome.predictions.len(), 5);

    let mut out = Vec::new();
    csv_loader::write_predictions(&mut out, &outcome.predictions).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), 6);
    assert!(text.starts_with("date,value,source\n"));
}
