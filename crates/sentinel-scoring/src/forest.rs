//! A minimal isolation forest: an ensemble of randomized binary
//! partition trees whose average path length to isolate a point is
//! converted into an anomaly score in `[0, 1]`, 1 meaning "isolated
//! quickly, therefore anomalous".

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const EULER_GAMMA: f64 = 0.5772156649015329;

enum Node {
    Internal {
        feature: usize,
        split_value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    External {
        size: usize,
    },
}

/// Average path length of an unsuccessful search in a binary search
/// tree over `n` points — the standard isolation-forest normalization
/// constant.
fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        0.0
    } else if n == 2 {
        1.0
    } else {
        let n = n as f64;
        2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
    }
}

fn build_tree(data: &[&[f64]], depth: usize, max_depth: usize, rng: &mut StdRng) -> Node {
    if depth >= max_depth || data.len() <= 1 {
        return Node::External { size: data.len() };
    }
    let n_features = data[0].len();

    for _ in 0..n_features {
        let feature = rng.gen_range(0..n_features);
        let (min, max) = data
            .iter()
            .map(|row| row[feature])
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        if (max - min).abs() < f64::EPSILON {
            continue;
        }
        let split_value = rng.gen_range(min..max);
        let left: Vec<&[f64]> = data.iter().filter(|row| row[feature] < split_value).copied().collect();
        let right: Vec<&[f64]> = data
            .iter()
            .filter(|row| row[feature] >= split_value)
            .copied()
            .collect();
        if left.is_empty() || right.is_empty() {
            continue;
        }
        return Node::Internal {
            feature,
            split_value,
            left: Box::new(build_tree(&left, depth + 1, max_depth, rng)),
            right: Box::new(build_tree(&right, depth + 1, max_depth, rng)),
        };
    }
    // couldn't find a useful split on any feature: treat as isolated.
    Node::External { size: data.len() }
}

fn path_length(point: &[f64], node: &Node, depth: usize) -> f64 {
    match node {
        Node::External { size } => depth as f64 + average_path_length(*size),
        Node::Internal {
            feature,
            split_value,
            left,
            right,
        } => {
            if point[*feature] < *split_value {
                path_length(point, left, depth + 1)
            } else {
                path_length(point, right, depth + 1)
            }
        }
    }
}

pub struct IsolationForest {
    trees: Vec<Node>,
    subsample_size: usize,
}

impl IsolationForest {
    /// Fits `n_estimators` trees, each over a random subsample of
    /// `subsample_size` rows from `data`, using a fixed seed so the
    /// forest's shape (and therefore its scores) is reproducible
    /// across process restarts.
    pub fn fit(data: &[Vec<f64>], n_estimators: usize, subsample_size: usize, seed: u64) -> Self {
        let subsample_size = subsample_size.min(data.len());
        let max_depth = (subsample_size.max(2) as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(seed);

        let trees = (0..n_estimators)
            .map(|_| {
                let sample: Vec<&[f64]> = (0..subsample_size)
                    .map(|_| {
                        let idx = rng.gen_range(0..data.len());
                        data[idx].as_slice()
                    })
                    .collect();
                build_tree(&sample, 0, max_depth, &mut rng)
            })
            .collect();

        IsolationForest { trees, subsample_size }
    }

    /// Anomaly score in `[0, 1]`; values near 1 mean the point was
    /// isolated in very few splits (anomalous), values near 0.5 mean
    /// it behaved like the bulk of the training distribution.
    pub fn score(&self, point: &[f64]) -> f64 {
        let avg_path: f64 =
            self.trees.iter().map(|t| path_length(point, t, 0)).sum::<f64>() / self.trees.len() as f64;
        let c = average_path_length(self.subsample_size);
        if c <= 0.0 {
            return 0.5;
        }
        2f64.powf(-avg_path / c)
    }
}
