// src/config/subsystems/clustering.rs

use serde::{Serialize, Deserialize};
use log::LevelFilter;
use crate::error::{Error, Result};
use crate::config::FromIni;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexBackend {
    RTree,
    BruteForce,
}

impl IndexBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexBackend::RTree => "rtree",
            IndexBackend::BruteForce => "brute_force",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim_matches('"').to_lowercase().as_str() {
            "rtree" | "r-tree" => Some(Self::RTree),
            "brute_force" | "bruteforce" | "naive" => Some(Self::BruteForce),
            _ => None,
        }
    }
}

impl Default for IndexBackend {
    fn default() -> Self {
        Self::RTree
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Maximum gap in meters for two features to share a cluster.
    pub tolerance_m: f64,
    pub index: IndexBackend,
    /// Run projection and candidate verification on the rayon pool.
    pub parallel: bool,
    pub log_level: String,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            tolerance_m: 0.5,
            index: IndexBackend::RTree,
            parallel: false,
            log_level: "info".to_string(),
        }
    }
}

impl FromIni for ClusteringConfig {
    fn from_ini_section(&mut self, _section_name: &str, key: &str, value: &str) -> Option<Result<()>> {
        match key {
            "tolerance_m" => {
                match value.parse::<f64>() {
                    Ok(tolerance) if tolerance.is_finite() && tolerance >= 0.0 => {
                        self.tolerance_m = tolerance;
                        Some(Ok(()))
                    },
                    _ => Some(Err(Error::Config(
                        format!("Invalid tolerance_m (must be a finite number >= 0): {}", value)
                    ))),
                }
            },
            "index" => {
                match IndexBackend::from_str(value) {
                    Some(index) => {
                        self.index = index;
                        Some(Ok(()))
                    },
                    None => Some(Err(Error::Config(
                        format!("Invalid index (must be rtree or brute_force): {}", value)
                    ))),
                }
            },
            "parallel" => {
                match value.parse::<bool>() {
                    Ok(val) => {
                        self.parallel = val;
                        Some(Ok(()))
                    },
                    Err(_) => Some(Err(Error::Config(
                        format!("Invalid parallel (must be true or false): {}", value)
                    ))),
                }
            },
            "log_level" => {
                self.log_level = value.trim_matches('"').to_string();
                Some(Ok(()))
            },
            _ => None,
        }
    }
}

impl ClusteringConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.tolerance_m.is_finite() || self.tolerance_m < 0.0 {
            return Err(Error::InvalidTolerance(self.tolerance_m));
        }
        Ok(())
    }

    pub fn get_log_level(&self) -> LevelFilter {
        match self.log_level.trim().to_lowercase().as_str() {
            "error" => LevelFilter::Error,
            "warn" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "debug" => LevelFilter::Debug,
            "trace" => LevelFilter::Trace,
            "none" | "off" => LevelFilter::Off,
            _ => LevelFilter::Info,
        }
    }
}
