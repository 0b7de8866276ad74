use crate::domain::errors::ForecastError;

/// Regressor predicting the next log change from one standardized input row.
pub trait DeltaPredictor: Send + Sync {
    fn predict(&self, features: &[f64]) -> Result<f64, ForecastError>;

    /// Get model name/type
    fn name(&self) -> &str;
}
