use crate::domain::errors::ForecastError;
use std::ops::Range;

/// One fold: train on `train`, validate on `test`, with `test` strictly later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Range<usize>,
    pub test: Range<usize>,
}

/// Expanding-window time series split.
///
/// The samples are cut into `n_splits + 1` consecutive blocks; fold `k`
/// trains on blocks `0..=k` and validates on block `k + 1`. Any remainder
/// goes to the first training block. Nothing is shuffled.
#[derive(Debug, Clone, Copy)]
pub struct TimeSeriesSplit {
    n_splits: usize,
}

impl TimeSeriesSplit {
    pub fn new(n_splits: usize) -> Result<Self, ForecastError> {
        if n_splits < 2 {
            return Err(ForecastError::invalid(format!(
                "cross-validation needs at least 2 folds, got {}",
                n_splits
            )));
        }
        Ok(Self { n_splits })
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    pub fn split(&self, n_samples: usize) -> Result<Vec<Fold>, ForecastError> {
        let test_size = n_samples / (self.n_splits + 1);
        if test_size == 0 {
            return Err(ForecastError::invalid(format!(
                "{} samples cannot be split into {} folds",
                n_samples, self.n_splits
            )));
        }

        let first_test = n_samples - self.n_splits * test_size;
        Ok((0..self.n_splits)
            .map(|k| {
                let start = first_test + k * test_size;
                Fold {
                    train: 0..start,
                    test: start..start + test_size,
                }
            })
            .collect())
    }
}

/// Chronological holdout: the first `1 - fraction` trains, the tail validates.
/// Returns `None` when either side would be empty.
pub fn holdout_split(n_samples: usize, fraction: f64) -> Option<Fold> {
    if !(fraction > 0.0 && fraction < 1.0) {
        return None;
    }
    let test_len = (n_samples as f64 * fraction).ceil() as usize;
    let split = n_samples.checked_sub(test_len)?;
    (split > 0 && test_len > 0).then(|| Fold {
        train: 0..split,
        test: split..n_samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folds_are_time_ordered() {
        let folds = TimeSeriesSplit::new(3).unwrap().split(30).unwrap();

        assert_eq!(folds.len(), 3);
        assert_eq!(folds[0], Fold { train: 0..9, test: 9..16 });
        assert_eq!(folds[2].test, 23..30);
        for fold in &folds {
            assert!(fold.train.end <= fold.test.start);
            assert_eq!(fold.train.start, 0);
        }
    }

    #[test]
    fn test_too_few_samples() {
        assert!(TimeSeriesSplit::new(3).unwrap().split(3).is_err());
        assert!(TimeSeriesSplit::new(1).is_err());
    }

    #[test]
    fn test_holdout_split() {
        assert_eq!(
            holdout_split(30, 0.2),
            Some(Fold {
                train: 0..24,
                test: 24..30
            })
        );
        assert_eq!(holdout_split(30, 0.0), None);
        assert_eq!(holdout_split(1, 0.5), None);
    }
}
