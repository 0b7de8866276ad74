use crate::domain::errors::ForecastError;
use serde::{Deserialize, Serialize};

/// Per-column standardization, fitted once and then frozen.
///
/// Uses the population standard deviation; constant columns get a scale of 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self, ForecastError> {
        let first = rows
            .first()
            .ok_or_else(|| ForecastError::invalid("cannot fit scaler on zero rows"))?;
        let width = first.len();
        if let Some(bad) = rows.iter().find(|r| r.len() != width) {
            return Err(ForecastError::ScalerMismatch {
                expected: width,
                actual: bad.len(),
            });
        }

        let n = rows.len() as f64;
        let mut means = vec![0.0; width];
        for row in rows {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v;
            }
        }
        means.iter_mut().for_each(|m| *m /= n);

        let mut scales = vec![0.0; width];
        for row in rows {
            for ((s, v), m) in scales.iter_mut().zip(row).zip(&means) {
                *s += (v - m).powi(2);
            }
        }
        for s in scales.iter_mut() {
            let std = (*s / n).sqrt();
            *s = if std > f64::EPSILON { std } else { 1.0 };
        }

        Ok(Self { means, scales })
    }

    pub fn n_features(&self) -> usize {
        self.means.len()
    }

    /// Never pads or truncates: a length mismatch is an error.
    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>, ForecastError> {
        if row.len() != self.means.len() {
            return Err(ForecastError::ScalerMismatch {
                expected: self.means.len(),
                actual: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(v, (m, s))| (v - m) / s)
            .collect())
    }

    pub fn transform_all(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ForecastError> {
        rows.iter().map(|r| self.transform(r)).collect()
    }
}
