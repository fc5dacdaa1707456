use crate::{
    DEFAULT_CACHE_LINE_SIZE, DEFAULT_DATASET_PATH, ELAPSED_TIME_LINE, IntensityConfig,
    StoreConfig,
};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings of one analysis run, loadable from a json file. Every field is
/// optional in the file and falls back to its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Dataset to append the measurement record to
    pub dataset_path: PathBuf,
    /// Cache line size in bytes
    pub cache_line_size: u64,
    /// 1-based line of the raw report holding the elapsed time
    pub elapsed_time_line: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from(DEFAULT_DATASET_PATH),
            cache_line_size: DEFAULT_CACHE_LINE_SIZE,
            elapsed_time_line: ELAPSED_TIME_LINE,
        }
    }
}

impl AnalysisConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_slice(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn intensity(&self) -> IntensityConfig {
        IntensityConfig {
            cache_line_size: self.cache_line_size,
        }
    }

    pub fn store(&self) -> StoreConfig {
        StoreConfig {
            path: self.dataset_path.clone(),
        }
    }
}
