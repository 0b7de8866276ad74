use thiserror::Error;

/// Errors raised by the forecasting engine.
///
/// `InsufficientData` and `ModelTrainingFailed` are recoverable: the forecast
/// service absorbs them into a constant fallback. Everything else aborts.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ForecastError {
    #[error("Insufficient data: need more than {required} rows, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Model training failed: {samples} samples available, at least {required} required")]
    ModelTrainingFailed { samples: usize, required: usize },

    #[error("Scaler mismatch: fitted on {expected} features, got {actual}")]
    ScalerMismatch { expected: usize, actual: usize },

    #[error("Window mismatch: model trained with window {trained}, requested {requested}")]
    WindowMismatch { trained: usize, requested: usize },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Prediction failed: {reason}")]
    PredictionFailed { reason: String },
}

impl ForecastError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        ForecastError::InvalidInput {
            reason: reason.into(),
        }
    }

    /// True for data/training insufficiency, which callers may absorb.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ForecastError::InsufficientData { .. } | ForecastError::ModelTrainingFailed { .. }
        )
    }
}
