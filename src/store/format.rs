use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// File formats used for stage outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreFormat {
    /// Parquet tables with GeoParquet geometries (requires the parquet feature).
    Parquet,
    /// CSV tables with GeoJSON geometries.
    GeoJson,
}

impl StoreFormat {
    /// Get file extension for attribute tables.
    pub fn data_extension(&self) -> &'static str {
        match self {
            Self::Parquet => "parquet",
            Self::GeoJson => "csv",
        }
    }

    /// Get file extension for geometry files.
    pub fn geometry_extension(&self) -> &'static str {
        match self {
            Self::Parquet => "geoparquet",
            Self::GeoJson => "geojson",
        }
    }
}

impl Default for StoreFormat {
    /// Parquet if available, otherwise GeoJSON.
    fn default() -> Self {
        #[cfg(feature = "parquet")]
        {
            Self::Parquet
        }
        #[cfg(not(feature = "parquet"))]
        {
            Self::GeoJson
        }
    }
}

impl FromStr for StoreFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "parquet" => Ok(StoreFormat::Parquet),
            "geojson" | "csv" => Ok(StoreFormat::GeoJson),
            _ => Err(anyhow!("Unknown store format: {}. Expected 'parquet' or 'geojson'", s)),
        }
    }
}
