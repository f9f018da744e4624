use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::store::{StageSource, StoreFormat};

pub(crate) const MANIFEST: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct FileHash {
    pub sha256: String,
}

/// Record of what a store holds: CRS, format, per-collection counts and file hashes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Manifest {
    pub version: String,
    /// EPSG code of stored geometries, once known.
    pub crs: Option<u32>,
    pub format: StoreFormat,
    pub counts: BTreeMap<String, usize>,
    pub files: BTreeMap<String, FileHash>,
}

impl Manifest {
    pub(crate) fn new(format: StoreFormat) -> Self {
        Self { version: "1".into(), crs: None, format, counts: BTreeMap::new(), files: BTreeMap::new() }
    }

    /// Read the manifest from a StageSource, if one exists.
    pub(crate) fn from_source(src: &dyn StageSource) -> Result<Option<Self>> {
        if !src.has(MANIFEST) { return Ok(None) }
        let bytes = src.get(MANIFEST).context("Failed to read manifest.json")?;
        let manifest = serde_json::from_slice(&bytes).context("Failed to parse manifest.json")?;
        Ok(Some(manifest))
    }

    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).context("Failed to serialize manifest.json")
    }
}
