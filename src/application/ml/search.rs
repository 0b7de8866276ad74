use super::gbm::GbmParams;
use crate::domain::errors::ForecastError;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Hyperparameter grid sampled by the randomized search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    pub num_leaves: Vec<usize>,
    pub learning_rate: Vec<f64>,
    pub n_estimators: Vec<usize>,
    pub min_child_samples: Vec<usize>,
    pub min_split_gain: Vec<f64>,
    pub reg_alpha: Vec<f64>,
    pub reg_lambda: Vec<f64>,
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self {
            num_leaves: vec![15, 31, 63, 127],
            learning_rate: vec![0.005, 0.01, 0.05, 0.1, 0.2],
            n_estimators: vec![200, 500, 1000, 1500],
            min_child_samples: vec![3, 5, 10, 20],
            min_split_gain: vec![0.0, 0.01, 0.05],
            reg_alpha: vec![0.0, 0.1, 1.0],
            reg_lambda: vec![0.0, 0.1, 1.0],
        }
    }
}

impl SearchSpace {
    fn dimensions(&self) -> [usize; 7] {
        [
            self.num_leaves.len(),
            self.learning_rate.len(),
            self.n_estimators.len(),
            self.min_child_samples.len(),
            self.min_split_gain.len(),
            self.reg_alpha.len(),
            self.reg_lambda.len(),
        ]
    }

    pub fn validate(&self) -> Result<(), ForecastError> {
        if self.dimensions().contains(&0) {
            return Err(ForecastError::invalid(
                "every search space dimension needs at least one value",
            ));
        }
        if self.num_leaves.iter().any(|&l| l < 2) {
            return Err(ForecastError::invalid("num_leaves values must be >= 2"));
        }
        if self.learning_rate.iter().any(|&r| r <= 0.0) {
            return Err(ForecastError::invalid("learning_rate values must be > 0"));
        }
        Ok(())
    }

    /// Number of distinct configurations in the grid.
    pub fn size(&self) -> usize {
        self.dimensions().iter().product()
    }

    /// Decodes a flat grid index (mixed radix, last dimension fastest).
    pub fn params_at(&self, index: usize) -> GbmParams {
        let dims = self.dimensions();
        let mut digits = [0usize; 7];
        let mut rest = index;
        for (digit, &dim) in digits.iter_mut().zip(dims.iter()).rev() {
            *digit = rest % dim;
            rest /= dim;
        }
        let [leaves, rate, estimators, child, gain, alpha, lambda] = digits;
        GbmParams {
            num_leaves: self.num_leaves[leaves],
            learning_rate: self.learning_rate[rate],
            n_estimators: self.n_estimators[estimators],
            min_child_samples: self.min_child_samples[child],
            min_split_gain: self.min_split_gain[gain],
            reg_alpha: self.reg_alpha[alpha],
            reg_lambda: self.reg_lambda[lambda],
        }
    }

    /// Draws up to `n_iter` distinct configurations, reproducibly for `seed`.
    /// A grid smaller than the budget is enumerated in full.
    pub fn sample(&self, n_iter: usize, seed: u64) -> Vec<GbmParams> {
        let total = self.size();
        let indices: Vec<usize> = if n_iter >= total {
            (0..total).collect()
        } else {
            let mut rng = StdRng::seed_from_u64(seed);
            rand::seq::index::sample(&mut rng, total, n_iter).into_vec()
        };
        indices
            .into_iter()
            .map(|i| self.params_at(i))
            .collect()
    }
}
