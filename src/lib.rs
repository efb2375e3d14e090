pub mod classifier;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod labels;
pub mod storage;
pub mod types;

pub use classifier::{interpret_prediction, Prediction, PredictionClient};
pub use config::Config;
pub use error::{ErrorKind, PicAFruitError, Result};
pub use history::{HistoryFilter, HistoryStore};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use types::{Condition, ScanResult, Settings};
