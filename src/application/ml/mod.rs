pub mod cross_validation;
pub mod dataset;
pub mod feature_engineer;
pub mod forecaster;
pub mod gbm;
pub mod predictor;
pub mod scaler;
pub mod search;
pub mod service;
pub mod summary;
pub mod trainer;
