// Feature engineering, training and recursive forecasting
pub mod ml;
