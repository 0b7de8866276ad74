use crate::application::ml::service::DiagnosticsSink;
use crate::application::ml::trainer::TrainingReport;
use crate::domain::series::FallbackReason;
use serde::Serialize;
use tracing::{info, warn};

/// Compact view of a training run for JSON output.
#[derive(Debug, Serialize)]
pub struct TrainingSnapshot {
    pub timestamp: String,
    pub version: String,
    pub n_samples: usize,
    pub cv_score: f64,
    pub in_sample_mse: f64,
    pub in_sample_r2: f64,
    pub holdout_mse: Option<f64>,
    pub holdout_r2: Option<f64>,
    pub trials: usize,
    pub failed_trials: usize,
    pub top_features: Vec<(String, f64)>,
}

impl TrainingSnapshot {
    pub fn from_report(report: &TrainingReport, top_n: usize) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            n_samples: report.n_samples,
            cv_score: report.cv_score,
            in_sample_mse: report.in_sample.mse,
            in_sample_r2: report.in_sample.r2,
            holdout_mse: report.holdout.map(|m| m.mse),
            holdout_r2: report.holdout.map(|m| m.r2),
            trials: report.trials.len(),
            failed_trials: report.trials.iter().filter(|t| t.score.is_none()).count(),
            top_features: report
                .feature_importances
                .iter()
                .take(top_n)
                .map(|f| (f.name.clone(), f.importance))
                .collect(),
        }
    }
}

/// Logs diagnostics as structured `tracing` records.
pub struct TracingDiagnostics {
    top_features: usize,
}

impl TracingDiagnostics {
    pub fn new(top_features: usize) -> Self {
        Self { top_features }
    }
}

impl Default for TracingDiagnostics {
    fn default() -> Self {
        Self::new(5)
    }
}

impl DiagnosticsSink for TracingDiagnostics {
    fn on_training_complete(&self, report: &TrainingReport) {
        info!(
            n_samples = report.n_samples,
            cv_score = report.cv_score,
            in_sample_mse = report.in_sample.mse,
            in_sample_r2 = report.in_sample.r2,
            num_leaves = report.best_params.num_leaves,
            learning_rate = report.best_params.learning_rate,
            n_estimators = report.best_params.n_estimators,
            "Training complete"
        );
        if let Some(holdout) = report.holdout {
            info!(mse = holdout.mse, r2 = holdout.r2, "Holdout evaluation");
        }

        let snapshot = TrainingSnapshot::from_report(report, self.top_features);
        match serde_json::to_string(&snapshot) {
            Ok(json) => info!("TRAINING_JSON:{}", json),
            Err(e) => warn!("Failed to serialize training snapshot: {}", e),
        }
    }

    fn on_fallback(&self, reason: &FallbackReason, value: f64) {
        warn!(?reason, value, "Forecast fell back to historical mean");
    }
}
