use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

/// Building cleaning parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Buildings smaller than this (m²) are merged into a neighbour or dropped.
    pub min_area: f64,
    /// Buildings with circular compactness below this are merged or dropped.
    pub min_compactness: f64,
    /// Fill holes inside buildings.
    pub islands: bool,
    /// Number of merge passes.
    pub loops: usize,
    /// Inward shrink used by the tessellation input checks (m).
    pub shrink: f64,
    /// EPSG code of the input files.
    pub input_epsg: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self { min_area: 10.0, min_compactness: 0.2, islands: true, loops: 2, shrink: 0.4, input_epsg: 4326 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TessellationConfig {
    /// Buffer around buildings limiting the tessellation (m).
    pub limit: f64,
    /// Maximum spacing of generator points along building outlines (m).
    pub segment: f64,
    /// Inward shrink of generator points (m).
    pub shrink: f64,
}

impl Default for TessellationConfig {
    fn default() -> Self {
        Self { limit: 100.0, segment: 2.0, shrink: 0.4 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadsConfig {
    /// Accepted values of the `class` attribute; empty accepts every road.
    pub classes: Vec<String>,
    /// Required value of the `subtype` attribute when the attribute exists; empty disables the filter.
    pub subtype: String,
    /// Maximum distance for a building's nearest street (m).
    pub nearest_max_distance: f64,
    /// Maximum extension of dangling road ends (m).
    pub extend_tolerance: f64,
    /// Spacing of road orientation samples (m).
    pub orientation_interval: f64,
    /// Road attribute holding the surface type.
    pub surface_field: String,
}

impl Default for RoadsConfig {
    fn default() -> Self {
        Self {
            classes: [
                "living_street", "motorway", "primary", "residential", "secondary",
                "service", "tertiary", "trunk", "unclassified", "unknown",
            ].into_iter().map(String::from).collect(),
            subtype: "road".into(),
            nearest_max_distance: 500.0,
            extend_tolerance: 40.0,
            orientation_interval: 10.0,
            surface_field: "surface".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContiguityConfig {
    /// Distance within which cells count as touching (m).
    pub tolerance: f64,
    /// Order of the neighbourhood used by the `lt*` metrics.
    pub order: usize,
    /// Whether the `ltbIBD` and `ltcBuA` neighbourhoods include the lower orders.
    /// `ltcWRB` always does.
    pub include_lower: bool,
}

impl Default for ContiguityConfig {
    fn default() -> Self {
        Self { tolerance: 1e-6, order: 3, include_lower: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Side of generated grid cells (m).
    pub cell_size: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { cell_size: 100.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    pub ks: Vec<usize>,
    pub seed: u64,
    pub max_iter: usize,
    pub tolerance: f64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self { ks: vec![6, 8, 10], seed: 7, max_iter: 300, tolerance: 1e-4 }
    }
}

/// Cluster labels that mark informal or substandard morphology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Which `k` of the clustering runs the model reads.
    pub k: usize,
    pub isl_clusters: Vec<u32>,
    pub sds_clusters: Vec<u32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self { k: 10, isl_clusters: vec![], sds_clusters: vec![] }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadAccessConfig {
    /// Surface value counted as paved. Matching roads get `paved = 1`, and near
    /// paved roads give the best access level `ra = 0`.
    pub paved_value: String,
    /// Maximum distance to the nearest road (m).
    pub max_distance: f64,
    /// Mean buildings-in-between at or above which a cell has no direct access.
    pub threshold: f64,
}

impl Default for RoadAccessConfig {
    fn default() -> Self {
        Self { paved_value: "paved".into(), max_distance: 500.0, threshold: 2.0 }
    }
}

/// Pipeline configuration. Every field has a default, so an empty JSON object is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub preprocess: PreprocessConfig,
    pub tessellation: TessellationConfig,
    pub roads: RoadsConfig,
    pub contiguity: ContiguityConfig,
    pub grid: GridConfig,
    pub clustering: ClusteringConfig,
    pub model: ModelConfig,
    pub road_access: RoadAccessConfig,
}

impl Config {
    /// Load a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("[config] Failed to read {}", path.display()))?;
        let config: Self = serde_json::from_slice(&bytes)
            .with_context(|| format!("[config] Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.tessellation.segment > 0.0, "[config] tessellation.segment must be positive");
        ensure!(self.tessellation.limit > 0.0, "[config] tessellation.limit must be positive");
        ensure!(self.grid.cell_size > 0.0, "[config] grid.cell_size must be positive");
        ensure!(self.roads.orientation_interval > 0.0, "[config] roads.orientation_interval must be positive");
        ensure!(self.contiguity.order >= 1, "[config] contiguity.order must be at least 1");
        ensure!(self.clustering.ks.iter().all(|&k| k >= 1), "[config] clustering.ks must be positive");
        Ok(())
    }
}
