//! Forecast configuration parsing from environment variables.

use crate::application::ml::search::SearchSpace;
use crate::application::ml::trainer::TrainerConfig;
use anyhow::{Context, Result};
use std::env;
use std::path::Path;
use std::str::FromStr;

/// Forecast environment configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastEnvConfig {
    pub window_size: usize,
    pub horizon: usize,
    pub validation_fraction: f64,
    pub seed: u64,
    pub cv_folds: usize,
    pub search_iterations: usize,
}

impl Default for ForecastEnvConfig {
    fn default() -> Self {
        Self {
            window_size: 20,
            horizon: 15,
            validation_fraction: 0.2,
            seed: 42,
            cv_folds: 3,
            search_iterations: 20,
        }
    }
}

impl ForecastEnvConfig {
    /// Reads `FORECAST_*` variables. Missing or malformed values keep defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            window_size: parse_or("FORECAST_WINDOW_SIZE", defaults.window_size),
            horizon: parse_or("FORECAST_HORIZON", defaults.horizon),
            validation_fraction: parse_or(
                "FORECAST_VALIDATION_FRACTION",
                defaults.validation_fraction,
            ),
            seed: parse_or("FORECAST_SEED", defaults.seed),
            cv_folds: parse_or("FORECAST_CV_FOLDS", defaults.cv_folds),
            search_iterations: parse_or("FORECAST_SEARCH_ITERATIONS", defaults.search_iterations),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            anyhow::bail!("FORECAST_WINDOW_SIZE must be > 0");
        }
        if self.horizon == 0 {
            anyhow::bail!("FORECAST_HORIZON must be > 0");
        }
        if self.cv_folds < 2 {
            anyhow::bail!("FORECAST_CV_FOLDS must be >= 2, got {}", self.cv_folds);
        }
        if self.search_iterations == 0 {
            anyhow::bail!("FORECAST_SEARCH_ITERATIONS must be > 0");
        }
        if !(0.0..1.0).contains(&self.validation_fraction) {
            anyhow::bail!(
                "FORECAST_VALIDATION_FRACTION must be in [0, 1), got {}",
                self.validation_fraction
            );
        }
        Ok(())
    }

    pub fn to_trainer_config(&self, search_space: SearchSpace) -> TrainerConfig {
        TrainerConfig {
            search_space,
            search_iterations: self.search_iterations,
            cv_folds: self.cv_folds,
            seed: self.seed,
            validation_fraction: self.validation_fraction,
        }
    }
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Parses a search space from TOML text. Omitted dimensions keep the default grid.
pub fn parse_search_space(text: &str) -> Result<SearchSpace> {
    #[derive(serde::Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Partial {
        num_leaves: Option<Vec<usize>>,
        learning_rate: Option<Vec<f64>>,
        n_estimators: Option<Vec<usize>>,
        min_child_samples: Option<Vec<usize>>,
        min_split_gain: Option<Vec<f64>>,
        reg_alpha: Option<Vec<f64>>,
        reg_lambda: Option<Vec<f64>>,
    }

    let partial: Partial = toml::from_str(text).context("Failed to parse search space TOML")?;
    let defaults = SearchSpace::default();
    let space = SearchSpace {
        num_leaves: partial.num_leaves.unwrap_or(defaults.num_leaves),
        learning_rate: partial.learning_rate.unwrap_or(defaults.learning_rate),
        n_estimators: partial.n_estimators.unwrap_or(defaults.n_estimators),
        min_child_samples: partial.min_child_samples.unwrap_or(defaults.min_child_samples),
        min_split_gain: partial.min_split_gain.unwrap_or(defaults.min_split_gain),
        reg_alpha: partial.reg_alpha.unwrap_or(defaults.reg_alpha),
        reg_lambda: partial.reg_lambda.unwrap_or(defaults.reg_lambda),
    };
    space
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid search space: {}", e))?;
    Ok(space)
}

pub fn load_search_space(path: &Path) -> Result<SearchSpace> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read search space file {}", path.display()))?;
    parse_search_space(&text)
}
