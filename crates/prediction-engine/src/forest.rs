use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::tree::{ClassificationTree, TreeParams, N_FEATURES};

/// Random forest configuration. The defaults are the fixed hyperparameters
/// of the analysis flow: 100 trees, seed 42.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

/// Bagged ensemble of classification trees voting on next-day direction.
/// Tree i is seeded with `config.seed + i`, so repeated fits on identical
/// input produce identical forests regardless of thread scheduling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionForest {
    n_trees: usize,
    trees: Vec<ClassificationTree>,
}

impl DirectionForest {
    pub fn fit(features: &[[f64; 3]], labels: &[u8], config: &ForestConfig) -> Self {
        // sqrt(n_features) per split, the classification convention.
        let max_features = (N_FEATURES as f64).sqrt().ceil() as usize;

        let trees: Vec<ClassificationTree> = (0..config.n_trees)
            .into_par_iter()
            .map(|i| {
                let seed = config.seed.wrapping_add(i as u64);
                let (sample_features, sample_labels) = bootstrap(features, labels, seed);

                let params = TreeParams {
                    max_depth: config.max_depth,
                    min_samples_split: config.min_samples_split,
                    min_samples_leaf: config.min_samples_leaf,
                    max_features,
                    seed,
                };

                ClassificationTree::fit(&sample_features, &sample_labels, &params)
            })
            .collect();

        Self {
            n_trees: config.n_trees,
            trees,
        }
    }

    /// Majority vote over the ensemble. Ties resolve to 0.
    pub fn predict_one(&self, x: &[f64; 3]) -> u8 {
        let positives = self.trees.iter().filter(|t| t.predict_one(x) == 1).count();
        (positives * 2 > self.trees.len()) as u8
    }

    /// Fraction of trees voting 1.
    pub fn predict_proba_one(&self, x: &[f64; 3]) -> f64 {
        if self.trees.is_empty() {
            return 0.5;
        }
        self.trees.iter().filter(|t| t.predict_one(x) == 1).count() as f64
            / self.trees.len() as f64
    }

    pub fn n_trees(&self) -> usize {
        self.n_trees
    }
}

/// Sample-with-replacement of the training set, seeded per tree.
fn bootstrap(
    features: &[[f64; 3]],
    labels: &[u8],
    seed: u64,
) -> (Vec<[f64; 3]>, Vec<u8>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let n = labels.len();

    let mut sample_features = Vec::with_capacity(n);
    let mut sample_labels = Vec::with_capacity(n);
    for _ in 0..n {
        let i = rng.gen_range(0..n);
        sample_features.push(features[i]);
        sample_labels.push(labels[i]);
    }

    (sample_features, sample_labels)
}
