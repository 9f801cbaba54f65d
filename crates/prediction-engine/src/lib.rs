mod engine;
mod forest;
mod store;
mod tree;

pub use engine::PredictionEngine;
pub use forest::{DirectionForest, ForestConfig};
pub use store::ModelStore;
