use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

pub(crate) const N_FEATURES: usize = 3;

#[derive(Debug, Clone)]
pub(crate) struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split.
    pub max_features: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Node {
    feature_idx: Option<usize>,
    threshold: Option<f64>,
    /// Majority class at this node; the prediction for leaves.
    label: u8,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

impl Node {
    fn leaf(label: u8) -> Self {
        Self {
            feature_idx: None,
            threshold: None,
            label,
            left: None,
            right: None,
        }
    }

    fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}

/// Binary classification tree over the three-column feature vector.
/// Splits minimize gini impurity over midpoint thresholds of a seeded
/// random feature subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ClassificationTree {
    root: Node,
}

impl ClassificationTree {
    pub(crate) fn fit(
        features: &[[f64; N_FEATURES]],
        labels: &[u8],
        params: &TreeParams,
    ) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let indices: Vec<usize> = (0..labels.len()).collect();
        let root = build(features, labels, &indices, 0, params, &mut rng);
        Self { root }
    }

    pub(crate) fn predict_one(&self, x: &[f64; N_FEATURES]) -> u8 {
        let mut node = &self.root;
        while !node.is_leaf() {
            let feature_idx = node.feature_idx.expect("split node has a feature");
            let threshold = node.threshold.expect("split node has a threshold");
            node = if x[feature_idx] <= threshold {
                node.left.as_ref().expect("split node has a left child")
            } else {
                node.right.as_ref().expect("split node has a right child")
            };
        }
        node.label
    }
}

fn build(
    features: &[[f64; N_FEATURES]],
    labels: &[u8],
    indices: &[usize],
    depth: usize,
    params: &TreeParams,
    rng: &mut ChaCha8Rng,
) -> Node {
    let impurity = gini(labels, indices);

    if depth >= params.max_depth
        || indices.len() < params.min_samples_split
        || impurity < 1e-10
    {
        return Node::leaf(majority(labels, indices));
    }

    match best_split(features, labels, indices, impurity, params, rng) {
        Some((feature_idx, threshold, left_idx, right_idx)) => {
            if left_idx.len() < params.min_samples_leaf
                || right_idx.len() < params.min_samples_leaf
            {
                return Node::leaf(majority(labels, indices));
            }

            let left = build(features, labels, &left_idx, depth + 1, params, rng);
            let right = build(features, labels, &right_idx, depth + 1, params, rng);

            Node {
                feature_idx: Some(feature_idx),
                threshold: Some(threshold),
                label: majority(labels, indices),
                left: Some(Box::new(left)),
                right: Some(Box::new(right)),
            }
        }
        None => Node::leaf(majority(labels, indices)),
    }
}

type Split = (usize, f64, Vec<usize>, Vec<usize>);

fn best_split(
    features: &[[f64; N_FEATURES]],
    labels: &[u8],
    indices: &[usize],
    parent_impurity: f64,
    params: &TreeParams,
    rng: &mut ChaCha8Rng,
) -> Option<Split> {
    let mut feature_indices: Vec<usize> = (0..N_FEATURES).collect();
    feature_indices.shuffle(rng);
    feature_indices.truncate(params.max_features.max(1));

    let mut best_gain = 0.0;
    let mut best: Option<Split> = None;

    for &feature_idx in &feature_indices {
        let mut values: Vec<f64> = indices.iter().map(|&i| features[i][feature_idx]).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        values.dedup();

        for window in values.windows(2) {
            let threshold = (window[0] + window[1]) / 2.0;

            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .partition(|&&i| features[i][feature_idx] <= threshold);

            if left_idx.is_empty() || right_idx.is_empty() {
                continue;
            }

            let n_left = left_idx.len() as f64;
            let n_right = right_idx.len() as f64;
            let weighted = (n_left * gini(labels, &left_idx)
                + n_right * gini(labels, &right_idx))
                / (n_left + n_right);

            let gain = parent_impurity - weighted;
            if gain > best_gain {
                best_gain = gain;
                best = Some((feature_idx, threshold, left_idx, right_idx));
            }
        }
    }

    best
}

fn gini(labels: &[u8], indices: &[usize]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }

    let n = indices.len() as f64;
    let positives = indices.iter().filter(|&&i| labels[i] == 1).count() as f64;
    let p = positives / n;

    2.0 * p * (1.0 - p)
}

fn majority(labels: &[u8], indices: &[usize]) -> u8 {
    let positives = indices.iter().filter(|&&i| labels[i] == 1).count();
    (positives * 2 > indices.len()) as u8
}
