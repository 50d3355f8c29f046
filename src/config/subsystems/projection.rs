// src/config/subsystems/projection.rs

use serde::{Serialize, Deserialize};
use crate::crs::Crs;
use crate::error::{Error, Result};
use crate::config::FromIni;

/// Which metric CRS the proximity graph compares geometries in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceCrs {
    /// The most common per-feature metric CRS, ties to the smallest EPSG code.
    MostFrequent,
    /// Always this UTM EPSG code.
    Fixed(u32),
}

impl ReferenceCrs {
    pub fn from_str(s: &str) -> Option<Self> {
        let value = s.trim_matches('"').trim();
        match value.to_lowercase().as_str() {
            "most_frequent" | "majority" => Some(Self::MostFrequent),
            _ => Crs::parse(value)
                .ok()
                .filter(|crs| crs.is_metric())
                .map(|crs| Self::Fixed(crs.epsg())),
        }
    }
}

impl Default for ReferenceCrs {
    fn default() -> Self {
        Self::MostFrequent
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionConfig {
    pub geometry_column: String,
    pub source_crs: String,
    pub reference_crs: ReferenceCrs,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            geometry_column: "geometry".to_string(),
            source_crs: "EPSG:4326".to_string(),
            reference_crs: ReferenceCrs::MostFrequent,
        }
    }
}

impl FromIni for ProjectionConfig {
    fn from_ini_section(&mut self, _section_name: &str, key: &str, value: &str) -> Option<Result<()>> {
        match key {
            "geometry_column" => {
                self.geometry_column = value.trim_matches('"').to_string();
                Some(Ok(()))
            },
            "source_crs" => {
                self.source_crs = value.trim_matches('"').to_string();
                Some(Ok(()))
            },
            "reference_crs" => {
                match ReferenceCrs::from_str(value) {
                    Some(reference) => {
                        self.reference_crs = reference;
                        Some(Ok(()))
                    },
                    None => Some(Err(Error::Config(
                        format!("Invalid reference_crs (must be most_frequent or a UTM EPSG code): {}", value)
                    ))),
                }
            },
            _ => None,
        }
    }
}

impl ProjectionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.geometry_column.is_empty() {
            return Err(Error::Config("geometry_column must not be empty".to_string()));
        }
        if let ReferenceCrs::Fixed(code) = self.reference_crs {
            let crs = Crs::from_epsg(code)
                .map_err(|e| Error::Config(format!("reference_crs: {}", e)))?;
            if !crs.is_metric() {
                return Err(Error::Config(
                    format!("reference_crs must be a UTM zone, got {}", crs)
                ));
            }
        }
        Ok(())
    }
}
