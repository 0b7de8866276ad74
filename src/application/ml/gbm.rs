//! Gradient-boosted regression trees with leaf-wise growth.
//!
//! Squared-error objective: gradients are `pred - y`, hessians are 1.
//! Each tree grows by repeatedly splitting the leaf with the largest gain
//! until `num_leaves` is reached. Leaf outputs use L1 soft-thresholding
//! and L2 shrinkage of the gradient sum.

use super::predictor::DeltaPredictor;
use crate::domain::errors::ForecastError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Gains at or below this are treated as rounding noise.
const GAIN_EPSILON: f64 = 1e-10;

/// GBM hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbmParams {
    /// Maximum leaves per tree
    pub num_leaves: usize,
    /// Shrinkage applied to every leaf output
    pub learning_rate: f64,
    /// Number of boosting rounds
    pub n_estimators: usize,
    /// Minimum samples on each side of a split
    pub min_child_samples: usize,
    /// Minimum gain required to split
    pub min_split_gain: f64,
    /// L1 regularization on leaf outputs
    pub reg_alpha: f64,
    /// L2 regularization on leaf outputs
    pub reg_lambda: f64,
}

impl Default for GbmParams {
    fn default() -> Self {
        Self {
            num_leaves: 31,
            learning_rate: 0.1,
            n_estimators: 100,
            min_child_samples: 20,
            min_split_gain: 0.0,
            reg_alpha: 0.0,
            reg_lambda: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

struct PendingLeaf {
    node: usize,
    indices: Vec<usize>,
    split: Option<SplitCandidate>,
}

fn soft_threshold(g: f64, alpha: f64) -> f64 {
    if g > alpha {
        g - alpha
    } else if g < -alpha {
        g + alpha
    } else {
        0.0
    }
}

/// Fitted gradient-boosted regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    params: GbmParams,
    base_score: f64,
    trees: Vec<Tree>,
    n_features: usize,
    split_counts: Vec<usize>,
}

impl GradientBoostingRegressor {
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: GbmParams) -> Result<Self, ForecastError> {
        if x.is_empty() || x.len() != y.len() {
            return Err(ForecastError::invalid(format!(
                "GBM fit needs matching non-empty inputs: {} rows, {} targets",
                x.len(),
                y.len()
            )));
        }
        let n_features = x[0].len();
        if x.iter().any(|r| r.len() != n_features) {
            return Err(ForecastError::invalid("GBM fit: ragged feature matrix"));
        }
        if params.num_leaves < 2 || params.learning_rate <= 0.0 {
            return Err(ForecastError::invalid(format!(
                "GBM params out of range: {:?}",
                params
            )));
        }

        let n = x.len();
        let base_score = y.iter().sum::<f64>() / n as f64;
        let mut predictions = vec![base_score; n];
        let mut model = Self {
            trees: Vec::with_capacity(params.n_estimators),
            params,
            base_score,
            n_features,
            split_counts: vec![0; n_features],
        };

        for _ in 0..model.params.n_estimators {
            let gradients: Vec<f64> = predictions.iter().zip(y).map(|(p, t)| p - t).collect();
            let tree = model.grow_tree(x, &gradients, (0..n).collect());
            for (p, row) in predictions.iter_mut().zip(x) {
                *p += tree.predict(row);
            }
            model.trees.push(tree);
        }

        Ok(model)
    }

    fn leaf_output(&self, indices: &[usize], gradients: &[f64]) -> f64 {
        if indices.is_empty() {
            return 0.0;
        }
        let g: f64 = indices.iter().map(|&i| gradients[i]).sum();
        let h = indices.len() as f64;
        -soft_threshold(g, self.params.reg_alpha) / (h + self.params.reg_lambda)
            * self.params.learning_rate
    }

    fn leaf_score(&self, g: f64, h: f64) -> f64 {
        let t = soft_threshold(g, self.params.reg_alpha);
        t * t / (h + self.params.reg_lambda)
    }

    fn best_split(
        &self,
        x: &[Vec<f64>],
        gradients: &[f64],
        indices: &[usize],
    ) -> Option<SplitCandidate> {
        let min_child = self.params.min_child_samples.max(1);
        if indices.len() < 2 * min_child {
            return None;
        }

        let g_total: f64 = indices.iter().map(|&i| gradients[i]).sum();
        let h_total = indices.len() as f64;
        let parent = self.leaf_score(g_total, h_total);

        let mut best: Option<(usize, usize, f64, f64)> = None; // feature, position, threshold, gain
        let mut sorted = indices.to_vec();

        for feature in 0..self.n_features {
            sorted.sort_by(|&a, &b| {
                x[a][feature]
                    .partial_cmp(&x[b][feature])
                    .unwrap_or(Ordering::Equal)
            });

            let mut g_left = 0.0;
            for pos in 0..sorted.len() - 1 {
                g_left += gradients[sorted[pos]];
                let n_left = pos + 1;
                let n_right = sorted.len() - n_left;
                if n_left < min_child {
                    continue;
                }
                if n_right < min_child {
                    break;
                }

                let here = x[sorted[pos]][feature];
                let next = x[sorted[pos + 1]][feature];
                if here >= next {
                    continue;
                }

                let gain = self.leaf_score(g_left, n_left as f64)
                    + self.leaf_score(g_total - g_left, n_right as f64)
                    - parent;
                if gain > self.params.min_split_gain + GAIN_EPSILON
                    && best.is_none_or(|(_, _, _, best_gain)| gain > best_gain)
                {
                    // Adjacent floats can round the midpoint up to `next`
                    let mid = (here + next) / 2.0;
                    let threshold = if mid < next { mid } else { here };
                    best = Some((feature, pos, threshold, gain));
                }
            }
        }

        let (feature, _, threshold, gain) = best?;
        let (left, right): (Vec<usize>, Vec<usize>) =
            indices.iter().partition(|&&i| x[i][feature] <= threshold);
        Some(SplitCandidate {
            feature,
            threshold,
            gain,
            left,
            right,
        })
    }

    fn grow_tree(&mut self, x: &[Vec<f64>], gradients: &[f64], rows: Vec<usize>) -> Tree {
        let mut nodes = vec![Node::Leaf {
            value: self.leaf_output(&rows, gradients),
        }];
        let split = self.best_split(x, gradients, &rows);
        let mut leaves = vec![PendingLeaf {
            node: 0,
            indices: rows,
            split,
        }];
        let mut n_leaves = 1;

        while n_leaves < self.params.num_leaves {
            let chosen = leaves
                .iter()
                .enumerate()
                .filter_map(|(i, leaf)| leaf.split.as_ref().map(|s| (i, s.gain)))
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
                .map(|(i, _)| i);
            let Some(chosen) = chosen else { break };

            let leaf = leaves.swap_remove(chosen);
            let Some(split) = leaf.split else { break };

            let left_node = nodes.len();
            nodes.push(Node::Leaf {
                value: self.leaf_output(&split.left, gradients),
            });
            let right_node = nodes.len();
            nodes.push(Node::Leaf {
                value: self.leaf_output(&split.right, gradients),
            });
            nodes[leaf.node] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left: left_node,
                right: right_node,
            };
            self.split_counts[split.feature] += 1;
            n_leaves += 1;

            for (node, indices) in [(left_node, split.left), (right_node, split.right)] {
                let split = self.best_split(x, gradients, &indices);
                leaves.push(PendingLeaf {
                    node,
                    indices,
                    split,
                });
            }
        }

        Tree { nodes }
    }

    pub fn params(&self) -> &GbmParams {
        &self.params
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Split-count importance per input column.
    pub fn feature_importances(&self) -> Vec<f64> {
        self.split_counts.iter().map(|&c| c as f64).collect()
    }

    pub fn predict_row(&self, row: &[f64]) -> Result<f64, ForecastError> {
        if row.len() != self.n_features {
            return Err(ForecastError::PredictionFailed {
                reason: format!(
                    "expected {} features, got {}",
                    self.n_features,
                    row.len()
                ),
            });
        }
        Ok(self.base_score + self.trees.iter().map(|t| t.predict(row)).sum::<f64>())
    }

    pub fn predict_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, ForecastError> {
        rows.iter().map(|r| self.predict_row(r)).collect()
    }
}

impl DeltaPredictor for GradientBoostingRegressor {
    fn predict(&self, features: &[f64]) -> Result<f64, ForecastError> {
        self.predict_row(features)
    }

    fn name(&self) -> &str {
        "Gradient Boosted Trees"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let y: Vec<f64> = (0..40).map(|i| if i < 20 { -1.0 } else { 1.0 }).collect();
        (x, y)
    }

    #[test]
    fn test_learns_step_function() {
        let (x, y) = step_data();
        let params = GbmParams {
            num_leaves: 4,
            n_estimators: 50,
            min_child_samples: 3,
            learning_rate: 0.2,
            ..Default::default()
        };
        let model = GradientBoostingRegressor::fit(&x, &y, params).unwrap();

        assert!(model.predict_row(&[5.0, 1.0]).unwrap() < -0.9);
        assert!(model.predict_row(&[35.0, 1.0]).unwrap() > 0.9);
        // Only the first column carries signal
        let importances = model.feature_importances();
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn test_constant_target_predicts_mean() {
        let x: Vec<Vec<f64>> = (0..15).map(|i| vec![i as f64]).collect();
        let y = vec![0.25; 15];
        let model = GradientBoostingRegressor::fit(&x, &y, GbmParams::default()).unwrap();

        assert!((model.predict_row(&[3.0]).unwrap() - 0.25).abs() < 1e-12);
        assert_eq!(model.feature_importances(), vec![0.0]);
    }

    #[test]
    fn test_min_child_samples_blocks_splits() {
        let (x, y) = step_data();
        let params = GbmParams {
            min_child_samples: 25,
            n_estimators: 5,
            ..Default::default()
        };
        let model = GradientBoostingRegressor::fit(&x, &y, params).unwrap();
        assert_eq!(model.feature_importances().iter().sum::<f64>(), 0.0);
    }

    #[test]
    fn test_strong_l1_zeroes_updates() {
        let (x, y) = step_data();
        let params = GbmParams {
            reg_alpha: 1e6,
            min_child_samples: 3,
            n_estimators: 5,
            ..Default::default()
        };
        let model = GradientBoostingRegressor::fit(&x, &y, params).unwrap();
        assert_eq!(model.predict_row(&[0.0, 0.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = step_data();
        let params = GbmParams {
            n_estimators: 20,
            min_child_samples: 2,
            ..Default::default()
        };
        let a = GradientBoostingRegressor::fit(&x, &y, params.clone()).unwrap();
        let b = GradientBoostingRegressor::fit(&x, &y, params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_adjacent_float_split_keeps_both_children() {
        // Midpoint of a and its successor rounds up to the successor
        for a in [1.0000000000000002_f64, 3.0000000000000004, 0.10000000000000002, 7.500000000000001] {
            let b = f64::from_bits(a.to_bits() + 1);
            assert_eq!((a + b) / 2.0, b);

            let x = vec![vec![a], vec![a], vec![b], vec![b]];
            let y = vec![0.0, 0.0, 1.0, 1.0];
            let params = GbmParams {
                num_leaves: 2,
                min_child_samples: 1,
                n_estimators: 1,
                learning_rate: 1.0,
                ..Default::default()
            };
            let model = GradientBoostingRegressor::fit(&x, &y, params).unwrap();

            let low = model.predict_row(&[a]).unwrap();
            let high = model.predict_row(&[b]).unwrap();
            assert!((low - 0.0).abs() < 1e-12, "a = {a}: {low}");
            assert!((high - 1.0).abs() < 1e-12, "a = {a}: {high}");
            assert!(model.predict_row(&[2.0 * a]).unwrap().is_finite());
        }
    }

    #[test]
    fn test_wrong_width_rejected() {
        let (x, y) = step_data();
        let model = GradientBoostingRegressor::fit(&x, &y, GbmParams::default()).unwrap();
        assert!(model.predict_row(&[1.0]).is_err());
    }
}
