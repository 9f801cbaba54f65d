use market_core::MarketError;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::forest::DirectionForest;

const DEFAULT_MODEL_PATH: &str = "models/direction_forest.json";

/// Filesystem repository for the single model artifact. Every save
/// overwrites the previous artifact; writes are serialized and go through
/// a temp file in the same directory followed by a rename, so a
/// concurrent load never observes a partially written model.
#[derive(Debug)]
pub struct ModelStore {
    path: PathBuf,
    write_lock: std::sync::Mutex<()>,
}

impl ModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: std::sync::Mutex::new(()),
        }
    }

    pub fn from_env() -> Self {
        let path = std::env::var("MODEL_PATH").unwrap_or_else(|_| DEFAULT_MODEL_PATH.to_string());
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The persisted model, or `None` when nothing has been trained yet.
    pub fn load(&self) -> Result<Option<DirectionForest>, MarketError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let file = File::open(&self.path).map_err(|e| MarketError::Storage(e.to_string()))?;
        let model = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| MarketError::Storage(e.to_string()))?;
        Ok(Some(model))
    }

    pub fn save(&self, model: &DirectionForest) -> Result<(), MarketError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| MarketError::Storage(e.to_string()))?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        let file = File::create(&tmp).map_err(|e| MarketError::Storage(e.to_string()))?;
        serde_json::to_writer(BufWriter::new(file), model)
            .map_err(|e| MarketError::Storage(e.to_string()))?;

        fs::rename(&tmp, &self.path).map_err(|e| MarketError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::{DirectionForest, ForestConfig};

    fn tiny_model() -> DirectionForest {
        let features = vec![[0.1, 1.0, 0.01], [-0.1, 0.9, 0.02], [0.2, 1.1, 0.03]];
        let labels = vec![1, 0, 1];
        DirectionForest::fit(
            &features,
            &labels,
            &ForestConfig {
                n_trees: 5,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_load_without_artifact_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("model.json"));

        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("model.json"));

        let model = tiny_model();
        store.save(&model).unwrap();

        let loaded = store.load().unwrap().expect("artifact present");
        assert_eq!(loaded, model);
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("nested/deeper/model.json"));

        store.save(&tiny_model()).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_save_overwrites_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("model.json"));

        store.save(&tiny_model()).unwrap();

        let features = vec![[0.3, 1.2, 0.04], [-0.3, 0.8, 0.05]];
        let labels = vec![0, 1];
        let replacement = DirectionForest::fit(
            &features,
            &labels,
            &ForestConfig {
                n_trees: 3,
                ..Default::default()
            },
        );
        store.save(&replacement).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.n_trees(), 3);
    }
}
