//! Configuration for segmentation runs.

use crate::kmeans::{
    KMeansConfig, DEFAULT_MAX_ITER, DEFAULT_N_CLUSTERS, DEFAULT_N_INIT, DEFAULT_SEED,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main configuration, read from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding activity.csv, sleep.csv and heart_rate.csv
    pub data_dir: PathBuf,

    /// Directory the report files are written to
    pub output_dir: PathBuf,

    /// Number of clusters
    pub n_clusters: usize,

    /// Seed for every random choice in clustering
    pub random_state: u64,

    /// Independent k-means restarts
    pub n_init: usize,

    /// Iteration cap per restart
    pub max_iter: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("reports"),
            n_clusters: DEFAULT_N_CLUSTERS,
            random_state: DEFAULT_SEED,
            n_init: DEFAULT_N_INIT,
            max_iter: DEFAULT_MAX_ITER,
        }
    }
}

impl Config {
    /// Load configuration from a file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse configuration from JSON text.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Save configuration as pretty JSON, creating the parent directory.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Partitioner parameters
    pub fn clustering(&self) -> KMeansConfig {
        KMeansConfig::new(self.n_clusters)
            .with_seed(self.random_state)
            .with_n_init(self.n_init)
            .with_max_iter(self.max_iter)
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
