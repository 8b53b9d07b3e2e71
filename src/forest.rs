//! Bootstrap-aggregated regression trees.
//!
//! A small CART ensemble: each tree is grown to purity on a bootstrap
//! resample, splits chosen by minimising the summed squared error of
//! the two children. Predictions average the per-tree leaf values.
//! Trees serialize with serde so a fitted forest can be persisted as
//! JSON and reloaded exactly.

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

/// Number of input features: hour, day-of-week, weather.
pub const FEATURE_COUNT: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    root: Node,
}

impl RegressionTree {
    fn fit(samples: &[[f64; FEATURE_COUNT]], targets: &[f64], indices: Vec<usize>) -> Self {
        Self {
            root: build_node(samples, targets, indices),
        }
    }

    pub fn predict(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if x[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }
}

fn build_node(samples: &[[f64; FEATURE_COUNT]], targets: &[f64], indices: Vec<usize>) -> Node {
    let mean = indices.iter().map(|&i| targets[i]).sum::<f64>() / indices.len() as f64;

    let pure = indices.iter().all(|&i| targets[i] == targets[indices[0]]);
    if indices.len() < 2 || pure {
        return Node::Leaf { value: mean };
    }

    let Some((feature, threshold)) = best_split(samples, targets, &indices) else {
        return Node::Leaf { value: mean };
    };

    let (left, right): (Vec<usize>, Vec<usize>) = indices
        .into_iter()
        .partition(|&i| samples[i][feature] <= threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(build_node(samples, targets, left)),
        right: Box::new(build_node(samples, targets, right)),
    }
}

/// Exhaustive best split over all features: sort by feature value and
/// scan boundaries between distinct values, tracking left/right sums
/// so each candidate's squared error is O(1).
fn best_split(
    samples: &[[f64; FEATURE_COUNT]],
    targets: &[f64],
    indices: &[usize],
) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64, f64)> = None;

    for feature in 0..FEATURE_COUNT {
        let mut pairs: Vec<(f64, f64)> = indices
            .iter()
            .map(|&i| (samples[i][feature], targets[i]))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let total_sum: f64 = pairs.iter().map(|p| p.1).sum();
        let total_sq: f64 = pairs.iter().map(|p| p.1 * p.1).sum();
        let n = pairs.len();

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for k in 0..n - 1 {
            left_sum += pairs[k].1;
            left_sq += pairs[k].1 * pairs[k].1;
            if pairs[k].0 == pairs[k + 1].0 {
                continue;
            }
            let n_left = (k + 1) as f64;
            let n_right = (n - k - 1) as f64;
            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / n_left)
                + (right_sq - right_sum * right_sum / n_right);
            if best.is_none_or(|(_, _, best_sse)| sse < best_sse) {
                let threshold = (pairs[k].0 + pairs[k + 1].0) / 2.0;
                best = Some((feature, threshold, sse));
            }
        }
    }

    best.map(|(feature, threshold, _)| (feature, threshold))
}

/// An ensemble of [`RegressionTree`]s fitted on bootstrap resamples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionForest {
    trees: Vec<RegressionTree>,
}

impl RegressionForest {
    /// Fit `n_estimators` trees. The bootstrap draws come from a seeded
    /// RNG, so a fixed seed gives a reproducible forest for the same
    /// training data.
    pub fn fit(
        samples: &[[f64; FEATURE_COUNT]],
        targets: &[f64],
        n_estimators: usize,
        seed: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let trees = (0..n_estimators)
            .map(|_| {
                let indices: Vec<usize> = (0..samples.len())
                    .map(|_| rng.gen_range(0..samples.len()))
                    .collect();
                RegressionTree::fit(samples, targets, indices)
            })
            .collect();
        Self { trees }
    }

    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    pub fn predict(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        let sum: f64 = self.trees.iter().map(|tree| tree.predict(x)).sum();
        sum / self.trees.len() as f64
    }

    /// Coefficient of determination (R^2) on a held-out set.
    pub fn score(&self, samples: &[[f64; FEATURE_COUNT]], targets: &[f64]) -> f64 {
        if targets.is_empty() {
            return 0.0;
        }
        let mean = targets.iter().sum::<f64>() / targets.len() as f64;
        let mut ss_res = 0.0;
        let mut ss_tot = 0.0;
        for (x, &y) in samples.iter().zip(targets) {
            let predicted = self.predict(x);
            ss_res += (y - predicted) * (y - predicted);
            ss_tot += (y - mean) * (y - mean);
        }
        if ss_tot == 0.0 {
            0.0
        } else {
            1.0 - ss_res / ss_tot
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Vec<[f64; FEATURE_COUNT]>, Vec<f64>) {
        // Piecewise target on the first feature, ignoring the others.
        let mut samples = Vec::new();
        let mut targets = Vec::new();
        for i in 0..200 {
            let x0 = (i % 20) as f64;
            samples.push([x0, (i % 7) as f64, (i % 3) as f64]);
            targets.push(if x0 < 10.0 { 5.0 } else { 50.0 });
        }
        (samples, targets)
    }

    #[test]
    fn learns_a_step_function() {
        let (samples, targets) = step_data();
        let forest = RegressionForest::fit(&samples, &targets, 20, 42);
        assert!(forest.predict(&[3.0, 1.0, 0.0]) < 15.0);
        assert!(forest.predict(&[15.0, 1.0, 0.0]) > 40.0);
    }

    #[test]
    fn fixed_seed_reproduces_the_forest() {
        let (samples, targets) = step_data();
        let a = RegressionForest::fit(&samples, &targets, 10, 7);
        let b = RegressionForest::fit(&samples, &targets, 10, 7);
        for hour in 0..20 {
            let x = [hour as f64, 2.0, 1.0];
            assert_eq!(a.predict(&x), b.predict(&x));
        }
    }

    #[test]
    fn score_is_high_on_learnable_data() {
        let (samples, targets) = step_data();
        let forest = RegressionForest::fit(&samples, &targets, 20, 42);
        assert!(forest.score(&samples, &targets) > 0.9);
    }

    #[test]
    fn serialization_round_trip_is_exact() {
        let (samples, targets) = step_data();
        let forest = RegressionForest::fit(&samples, &targets, 5, 1);
        let json = serde_json::to_string(&forest).unwrap();
        let restored: RegressionForest = serde_json::from_str(&json).unwrap();
        for i in 0..20 {
            let x = [i as f64, 3.0, 2.0];
            assert_eq!(forest.predict(&x), restored.predict(&x));
        }
    }
}
