//! Node configuration
//!
//! Both roles can run from CLI flags alone; a TOML file (`--config`) carries
//! the same fields for deployments that prefer checked-in settings. Files
//! are written atomically (temp file + rename).

use crate::errors::{NodeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

pub const DEFAULT_MASTER_PORT: u16 = 2551;
pub const DEFAULT_WORKER_PORT: u16 = 2553;

/// Tuning parameters owned by the master and pushed to workers at init.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MasterConfig {
    /// Expected group size
    pub total_workers: usize,
    /// Length of the vector being reduced
    pub data_size: usize,
    /// Maximum elements per wire chunk
    pub max_chunk_size: usize,
    /// Last round the master will start
    pub max_round: i64,
    /// Fraction of workers required to init the group and advance rounds
    pub th_allreduce: f64,
    /// Fraction of peers whose scatters trigger a chunk reduction
    pub th_reduce: f64,
    /// Fraction of peers whose reduced chunks complete a round
    pub th_complete: f64,
    /// Rounds a worker may lag behind the newest started round
    pub max_lag: usize,
}

impl Default for MasterConfig {
    fn default() -> Self {
        let total_workers = 2;
        Self {
            total_workers,
            data_size: total_workers * 5,
            max_chunk_size: 2,
            max_round: 100,
            th_allreduce: 1.0,
            th_reduce: 0.9,
            th_complete: 0.8,
            max_lag: 1,
        }
    }
}

impl MasterConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, &toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.total_workers == 0 {
            return Err(NodeError::Config("total_workers must be positive".to_string()));
        }
        if self.data_size == 0 {
            return Err(NodeError::Config("data_size must be positive".to_string()));
        }
        if self.max_chunk_size == 0 {
            return Err(NodeError::Config("max_chunk_size must be positive".to_string()));
        }
        if self.max_round < 0 {
            return Err(NodeError::Config("max_round must be non-negative".to_string()));
        }
        for (name, th) in [
            ("th_allreduce", self.th_allreduce),
            ("th_reduce", self.th_reduce),
            ("th_complete", self.th_complete),
        ] {
            if !(th > 0.0 && th <= 1.0) {
                return Err(NodeError::Config(format!(
                    "{} must be in (0, 1], got {}",
                    name, th
                )));
            }
        }
        Ok(())
    }
}

/// Settings for the worker launcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Address of the master to register with
    pub master: SocketAddr,
    /// Vector length the local data source produces; must match the
    /// master's `data_size` or the worker fails fatally at the first fetch
    pub source_data_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            master: SocketAddr::from(([127, 0, 0, 1], DEFAULT_MASTER_PORT)),
            source_data_size: 10,
        }
    }
}

impl WorkerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, &toml::to_string_pretty(self)?)
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let temp_path = path.with_extension("toml.tmp");
    fs::write(&temp_path, contents)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_defaults() {
        let config = MasterConfig::default();
        assert_eq!(config.total_workers, 2);
        assert_eq!(config.data_size, 10);
        assert_eq!(config.max_chunk_size, 2);
        assert_eq!(config.max_round, 100);
        assert_eq!(config.th_allreduce, 1.0);
        assert_eq!(config.th_reduce, 0.9);
        assert_eq!(config.th_complete, 0.8);
        assert_eq!(config.max_lag, 1);
        assert!(config.validate().is_ok());

        let worker = WorkerConfig::default();
        assert_eq!(worker.source_data_size, 10);
        assert_eq!(worker.master.port(), DEFAULT_MASTER_PORT);
    }

    #[test]
    fn test_validation_rejects_bad_thresholds() {
        let mut config = MasterConfig::default();
        config.th_reduce = 0.0;
        assert!(config.validate().is_err());

        config.th_reduce = 1.5;
        assert!(config.validate().is_err());

        config.th_reduce = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_sizes() {
        let mut config = MasterConfig::default();
        config.data_size = 0;
        assert!(config.validate().is_err());

        config = MasterConfig::default();
        config.max_chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let dir = std::env::temp_dir().join("quorumsum-config-test");
        let path = dir.join("master.toml");

        let mut config = MasterConfig::default();
        config.total_workers = 4;
        config.data_size = 20;
        config.save(&path).unwrap();

        let loaded = MasterConfig::load(&path).unwrap();
        assert_eq!(config, loaded);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: MasterConfig = toml::from_str("total_workers = 8").unwrap();
        assert_eq!(config.total_workers, 8);
        assert_eq!(config.max_round, 100);
        assert_eq!(config.th_complete, 0.8);
    }
}
