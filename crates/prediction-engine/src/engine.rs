use market_core::{Direction, FeatureRow, MarketError};

use crate::forest::{DirectionForest, ForestConfig};
use crate::store::ModelStore;

/// Facade over the forest and its on-disk artifact.
///
/// The analysis flow retrains from scratch on every request over the whole
/// available history (no incremental update, no train/test split) and
/// persists the result unconditionally. Prediction always reads the
/// persisted artifact, so a standalone predict call before any training
/// reports the typed not-trained outcome instead of faulting.
pub struct PredictionEngine {
    config: ForestConfig,
    store: ModelStore,
}

impl PredictionEngine {
    pub fn new(store: ModelStore) -> Self {
        Self {
            config: ForestConfig::default(),
            store,
        }
    }

    pub fn with_config(store: ModelStore, config: ForestConfig) -> Self {
        Self { config, store }
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Fit on every usable row, labels included for the most recent row
    /// that still carries a defined target, then overwrite the artifact.
    pub fn train(&self, rows: &[FeatureRow]) -> Result<DirectionForest, MarketError> {
        if rows.is_empty() {
            return Err(MarketError::InsufficientData(
                "no usable feature rows to fit on".to_string(),
            ));
        }

        let features: Vec<[f64; 3]> = rows.iter().map(|r| r.features()).collect();
        let labels: Vec<u8> = rows.iter().map(|r| r.target).collect();

        let model = DirectionForest::fit(&features, &labels, &self.config);
        self.store.save(&model)?;

        tracing::debug!(
            rows = rows.len(),
            trees = model.n_trees(),
            "retrained direction model"
        );

        Ok(model)
    }

    /// Direction for one feature vector, read from the persisted model.
    pub fn predict(&self, row: &FeatureRow) -> Result<Direction, MarketError> {
        let model = self.store.load()?.ok_or(MarketError::ModelUnavailable)?;

        Ok(match model.predict_one(&row.features()) {
            1 => Direction::Rise,
            _ => Direction::FallOrStable,
        })
    }
}
