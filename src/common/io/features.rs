use std::path::Path;

use anyhow::{bail, Context, Result};
use geo::{Geometry, LineString, MultiPolygon};
use serde_json::{Map, Value};

use crate::common::{extension, require_file_exists};
use super::{geojson::read_geojson_bytes, shp::read_shapefile};

/// Vector features read from an input file: one geometry and one property map per feature.
#[derive(Debug, Clone, Default)]
pub struct Features {
    geometries: Vec<Geometry<f64>>,
    properties: Vec<Map<String, Value>>,
}

impl Features {
    pub fn new(geometries: Vec<Geometry<f64>>, properties: Vec<Map<String, Value>>) -> Self {
        let mut properties = properties;
        properties.resize_with(geometries.len(), Map::new);
        Self { geometries, properties }
    }

    /// Features with geometries only.
    pub fn from_geometries(geometries: Vec<Geometry<f64>>) -> Self {
        Self::new(geometries, vec![])
    }

    /// Read features from a GeoJSON, shapefile or (Geo)Parquet file.
    pub fn read(path: &Path) -> Result<Self> {
        require_file_exists(path)?;
        let items = match extension(path).as_str() {
            "geojson" | "json" => {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("[io::features] Failed to read {}", path.display()))?;
                read_geojson_bytes(&bytes)
                    .with_context(|| format!("[io::features] Failed to parse {}", path.display()))?
            }
            "shp" => read_shapefile(path)?,
            #[cfg(feature = "parquet")]
            "parquet" | "geoparquet" => {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("[io::features] Failed to read {}", path.display()))?;
                read_wkb_parquet_bytes(&bytes)
                    .with_context(|| format!("[io::features] Failed to parse {}", path.display()))?
            }
            other => bail!("[io::features] Unsupported input format '.{other}' for {}", path.display()),
        };

        let (geometries, properties) = items.into_iter().unzip();
        Ok(Self { geometries, properties })
    }

    #[inline] pub fn len(&self) -> usize { self.geometries.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.geometries.is_empty() }

    #[inline] pub fn geometries(&self) -> &[Geometry<f64>] { &self.geometries }

    /// Property `key` of feature `idx` as a string; numbers are formatted, null is `None`.
    pub fn property_str(&self, idx: usize, key: &str) -> Option<String> {
        match self.properties.get(idx)?.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Whether any feature carries property `key`.
    pub fn has_property(&self, key: &str) -> bool {
        self.properties.iter().any(|props| props.contains_key(key))
    }

    /// Areal geometries with the index of their feature; other geometry types are skipped.
    pub fn polygons(&self) -> Vec<(usize, MultiPolygon<f64>)> {
        self.geometries.iter().enumerate()
            .filter_map(|(i, geometry)| match geometry {
                Geometry::Polygon(p) => Some((i, MultiPolygon::new(vec![p.clone()]))),
                Geometry::MultiPolygon(mp) => Some((i, mp.clone())),
                Geometry::Rect(r) => Some((i, MultiPolygon::new(vec![r.to_polygon()]))),
                _ => None,
            })
            .collect()
    }

    /// Linear geometries exploded into single lines, with the index of their feature.
    pub fn lines(&self) -> Vec<(usize, LineString<f64>)> {
        self.geometries.iter().enumerate()
            .flat_map(|(i, geometry)| {
                let parts = match geometry {
                    Geometry::LineString(ls) => vec![ls.clone()],
                    Geometry::MultiLineString(ml) => ml.0.clone(),
                    Geometry::Line(l) => vec![LineString::from(vec![l.start, l.end])],
                    _ => vec![],
                };
                parts.into_iter().filter(|ls| ls.0.len() >= 2).map(move |ls| (i, ls))
            })
            .collect()
    }
}

/// Read a Parquet file whose `geometry` column holds WKB (GeoParquet 1.x encoding).
/// Remaining columns that can be cast to strings become properties.
#[cfg(feature = "parquet")]
fn read_wkb_parquet_bytes(bytes: &[u8]) -> Result<Vec<(Geometry<f64>, Map<String, Value>)>> {
    use polars::prelude::DataType;

    use super::{parquet::read_parquet_bytes, wkb::read_wkb};

    let df = read_parquet_bytes(bytes)?;
    let geometry = df.column("geometry")
        .context("[io::features] Parquet input has no 'geometry' column")?;
    let geometry = geometry.as_materialized_series().binary()
        .context("[io::features] 'geometry' column is not WKB binary")?;

    let columns = df.get_columns().iter()
        .filter(|col| col.name().as_str() != "geometry")
        .filter_map(|col| col.cast(&DataType::String).ok().map(|s| (col.name().to_string(), s)))
        .collect::<Vec<_>>();

    let mut items = Vec::with_capacity(df.height());
    for (row, wkb) in geometry.into_iter().enumerate() {
        let Some(wkb) = wkb else { continue };
        let mut props = Map::new();
        for (name, col) in &columns {
            let value = col.str()?.get(row)
                .map_or(Value::Null, |s| Value::String(s.to_string()));
            props.insert(name.clone(), value);
        }
        items.push((read_wkb(wkb)?, props));
    }
    Ok(items)
}
