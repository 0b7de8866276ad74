//! Configuration module for volforecast.
//!
//! Run parameters come from environment variables (optionally a `.env` file),
//! the hyperparameter grid from an optional TOML file.

mod forecast_config;

pub use forecast_config::{ForecastEnvConfig, load_search_space, parse_search_space};
