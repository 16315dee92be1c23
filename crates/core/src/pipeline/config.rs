//! Configuration for the pipeline module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the job pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Jobs allowed to fetch or transcode at the same time.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_jobs: usize,

    /// Admitted jobs allowed to wait for a slot.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    /// Root for per-job workspaces.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Where finished artifacts are delivered.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// How long finished jobs and their artifacts are kept.
    #[serde(default = "default_retention")]
    pub result_retention_secs: u64,
}

fn default_max_concurrent() -> usize {
    num_cpus::get().max(1)
}

fn default_queue_depth() -> usize {
    16
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("temp")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_retention() -> u64 {
    3600 // 1 hour
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent(),
            queue_depth: default_queue_depth(),
            temp_dir: default_temp_dir(),
            data_dir: default_data_dir(),
            result_retention_secs: default_retention(),
        }
    }
}

impl PipelineConfig {
    /// Sets the concurrency limit and queue depth.
    pub fn with_limits(mut self, max_concurrent_jobs: usize, queue_depth: usize) -> Self {
        self.max_concurrent_jobs = max_concurrent_jobs;
        self.queue_depth = queue_depth;
        self
    }

    /// Sets the temp and data directories.
    pub fn with_dirs(mut self, temp_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self.data_dir = data_dir.into();
        self
    }

    /// Jobs that may be admitted at once, running or queued.
    pub fn capacity(&self) -> usize {
        self.max_concurrent_jobs + self.queue_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert!(config.max_concurrent_jobs >= 1);
        assert_eq!(config.queue_depth, 16);
        assert_eq!(config.temp_dir, PathBuf::from("temp"));
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.result_retention_secs, 3600);
    }

    #[test]
    fn test_config_builder() {
        let config = PipelineConfig::default()
            .with_limits(2, 3)
            .with_dirs("/tmp/t", "/tmp/d");
        assert_eq!(config.capacity(), 5);
        assert_eq!(config.temp_dir, PathBuf::from("/tmp/t"));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/d"));
    }
}
