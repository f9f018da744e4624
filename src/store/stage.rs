use std::path::Path;

use anyhow::{bail, Context, Result};
use geo::{Geometry, LineString, MultiPolygon};
use polars::frame::DataFrame;
use tracing::debug;

use crate::{
    common::{io::{read_csv_bytes, read_geojson_bytes, write_csv_bytes, write_geojson_bytes}, sha256_hex},
    graph::Graph,
    store::{manifest::{FileHash, Manifest, MANIFEST}, DiskStore, MemStore, StageBackend, StoreFormat},
};

/// Stage outputs persisted through a [`StageBackend`], with a manifest of
/// counts and file hashes kept in sync on every write.
///
/// Collections are stored as `geom/{name}.{geometry ext}` plus
/// `data/{name}.{data ext}`, plain tables as `data/{name}.{data ext}`, and
/// graphs as `graph/{name}.csr.bin`.
pub struct Store {
    backend: Box<dyn StageBackend>,
    manifest: Manifest,
}

impl Store {
    /// Open a store over `backend`. An existing manifest is reused and must agree on `format`.
    pub fn open(backend: impl StageBackend + 'static, format: StoreFormat) -> Result<Self> {
        #[cfg(not(feature = "parquet"))]
        if format == StoreFormat::Parquet {
            bail!("[store] Parquet format requires the 'parquet' feature");
        }

        let manifest = match Manifest::from_source(&backend)? {
            Some(manifest) if manifest.format != format => bail!(
                "[store] existing store uses format {:?}, requested {:?}", manifest.format, format
            ),
            Some(manifest) => manifest,
            None => Manifest::new(format),
        };
        Ok(Self { backend: Box::new(backend), manifest })
    }

    /// Open (or create) a store in directory `root`.
    pub fn disk(root: &Path, format: StoreFormat) -> Result<Self> {
        crate::common::ensure_dir_exists(root)?;
        Self::open(DiskStore::new(root), format)
    }

    /// A fresh in-memory store.
    pub fn memory(format: StoreFormat) -> Result<Self> {
        Self::open(MemStore::new(), format)
    }

    #[inline] pub fn format(&self) -> StoreFormat { self.manifest.format }

    /// EPSG code of the stored geometries, once set.
    #[inline] pub fn crs(&self) -> Option<u32> { self.manifest.crs }

    pub fn set_crs(&mut self, epsg: u32) -> Result<()> {
        self.manifest.crs = Some(epsg);
        self.save_manifest()
    }

    /// Row count recorded for collection or table `name`.
    pub fn count(&self, name: &str) -> Option<usize> { self.manifest.counts.get(name).copied() }

    /// SHA-256 recorded for the file at `rel`.
    pub fn file_hash(&self, rel: &str) -> Option<&str> {
        self.manifest.files.get(rel).map(|f| f.sha256.as_str())
    }

    fn geometry_path(&self, name: &str) -> String {
        format!("geom/{name}.{}", self.format().geometry_extension())
    }

    fn table_path(&self, name: &str) -> String {
        format!("data/{name}.{}", self.format().data_extension())
    }

    fn graph_path(name: &str) -> String { format!("graph/{name}.csr.bin") }

    fn save_manifest(&mut self) -> Result<()> {
        let bytes = self.manifest.to_bytes()?;
        self.backend.put(MANIFEST, &bytes)
    }

    /// Write `bytes` at `rel` and record its hash.
    fn write(&mut self, rel: &str, bytes: &[u8]) -> Result<()> {
        self.backend.put(rel, bytes).with_context(|| format!("[store] Failed to write {rel}"))?;
        self.manifest.files.insert(rel.to_string(), FileHash { sha256: sha256_hex(bytes) });
        debug!(file = rel, bytes = bytes.len(), "stage file written");
        Ok(())
    }

    fn table_bytes(&self, df: &DataFrame) -> Result<Vec<u8>> {
        match self.format() {
            #[cfg(feature = "parquet")]
            StoreFormat::Parquet => crate::common::io::write_parquet_bytes(df),
            #[cfg(not(feature = "parquet"))]
            StoreFormat::Parquet => bail!("[store] Parquet format requires the 'parquet' feature"),
            StoreFormat::GeoJson => write_csv_bytes(df),
        }
    }

    fn read_table_bytes(&self, bytes: &[u8]) -> Result<DataFrame> {
        match self.format() {
            #[cfg(feature = "parquet")]
            StoreFormat::Parquet => crate::common::io::read_parquet_bytes(bytes),
            #[cfg(not(feature = "parquet"))]
            StoreFormat::Parquet => bail!("[store] Parquet format requires the 'parquet' feature"),
            StoreFormat::GeoJson => read_csv_bytes(bytes),
        }
    }

    fn put_collection(&mut self, name: &str, geometry: Vec<u8>, table: &DataFrame, count: usize) -> Result<()> {
        if table.height() != count {
            bail!("[store] {name}: table has {} rows for {count} geometries", table.height());
        }
        let data = self.table_bytes(table)?;
        self.write(&self.geometry_path(name), &geometry)?;
        self.write(&self.table_path(name), &data)?;
        self.manifest.counts.insert(name.to_string(), count);
        self.save_manifest()
    }

    /// Whether both files of collection `name` exist.
    pub fn has_collection(&self, name: &str) -> bool {
        self.backend.has(&self.geometry_path(name)) && self.backend.has(&self.table_path(name))
    }

    /// Persist areal geometries with one attribute row per shape.
    pub fn put_polygons(&mut self, name: &str, shapes: &[MultiPolygon<f64>], table: &DataFrame) -> Result<()> {
        let bytes = match self.format() {
            #[cfg(feature = "parquet")]
            StoreFormat::Parquet => crate::common::io::write_polygons_geoparquet_bytes(shapes)?,
            #[cfg(not(feature = "parquet"))]
            StoreFormat::Parquet => bail!("[store] Parquet format requires the 'parquet' feature"),
            StoreFormat::GeoJson => write_geojson_bytes(
                &shapes.iter().cloned().map(Geometry::MultiPolygon).collect::<Vec<_>>(), &[],
            )?,
        };
        self.put_collection(name, bytes, table, shapes.len())
    }

    /// Load areal geometries and their attribute table.
    pub fn get_polygons(&self, name: &str) -> Result<(Vec<MultiPolygon<f64>>, DataFrame)> {
        let bytes = self.backend.get(&self.geometry_path(name))?;
        let shapes = match self.format() {
            #[cfg(feature = "parquet")]
            StoreFormat::Parquet => crate::common::io::read_polygons_geoparquet_bytes(&bytes)?,
            #[cfg(not(feature = "parquet"))]
            StoreFormat::Parquet => bail!("[store] Parquet format requires the 'parquet' feature"),
            StoreFormat::GeoJson => read_geojson_bytes(&bytes)?.into_iter()
                .map(|(geometry, _)| match geometry {
                    Geometry::MultiPolygon(mp) => Ok(mp),
                    Geometry::Polygon(p) => Ok(MultiPolygon::new(vec![p])),
                    other => bail!("[store] {name}: expected polygons, found {other:?}"),
                })
                .collect::<Result<Vec<_>>>()?,
        };
        let table = self.get_table(name)?;
        if table.height() != shapes.len() {
            bail!("[store] {name}: table has {} rows for {} geometries", table.height(), shapes.len());
        }
        Ok((shapes, table))
    }

    /// Persist line geometries with one attribute row per line.
    pub fn put_lines(&mut self, name: &str, lines: &[LineString<f64>], table: &DataFrame) -> Result<()> {
        let bytes = match self.format() {
            #[cfg(feature = "parquet")]
            StoreFormat::Parquet => crate::common::io::write_lines_geoparquet_bytes(lines)?,
            #[cfg(not(feature = "parquet"))]
            StoreFormat::Parquet => bail!("[store] Parquet format requires the 'parquet' feature"),
            StoreFormat::GeoJson => write_geojson_bytes(
                &lines.iter().cloned().map(Geometry::LineString).collect::<Vec<_>>(), &[],
            )?,
        };
        self.put_collection(name, bytes, table, lines.len())
    }

    /// Load line geometries and their attribute table.
    pub fn get_lines(&self, name: &str) -> Result<(Vec<LineString<f64>>, DataFrame)> {
        let bytes = self.backend.get(&self.geometry_path(name))?;
        let lines = match self.format() {
            #[cfg(feature = "parquet")]
            StoreFormat::Parquet => crate::common::io::read_lines_geoparquet_bytes(&bytes)?,
            #[cfg(not(feature = "parquet"))]
            StoreFormat::Parquet => bail!("[store] Parquet format requires the 'parquet' feature"),
            StoreFormat::GeoJson => read_geojson_bytes(&bytes)?.into_iter()
                .map(|(geometry, _)| match geometry {
                    Geometry::LineString(ls) => Ok(ls),
                    other => bail!("[store] {name}: expected lines, found {other:?}"),
                })
                .collect::<Result<Vec<_>>>()?,
        };
        let table = self.get_table(name)?;
        if table.height() != lines.len() {
            bail!("[store] {name}: table has {} rows for {} geometries", table.height(), lines.len());
        }
        Ok((lines, table))
    }

    pub fn has_table(&self, name: &str) -> bool { self.backend.has(&self.table_path(name)) }

    /// Persist a plain attribute table, e.g. `metrics/sdbAre`.
    pub fn put_table(&mut self, name: &str, table: &DataFrame) -> Result<()> {
        let bytes = self.table_bytes(table)?;
        self.write(&self.table_path(name), &bytes)?;
        self.manifest.counts.insert(name.to_string(), table.height());
        self.save_manifest()
    }

    pub fn get_table(&self, name: &str) -> Result<DataFrame> {
        let rel = self.table_path(name);
        let bytes = self.backend.get(&rel)?;
        self.read_table_bytes(&bytes).with_context(|| format!("[store] Failed to decode {rel}"))
    }

    pub fn has_graph(&self, name: &str) -> bool { self.backend.has(&Self::graph_path(name)) }

    pub fn put_graph(&mut self, name: &str, graph: &Graph) -> Result<()> {
        let bytes = graph.to_csr_bytes()?;
        self.write(&Self::graph_path(name), &bytes)?;
        self.save_manifest()
    }

    pub fn get_graph(&self, name: &str) -> Result<Graph> {
        let rel = Self::graph_path(name);
        Graph::from_csr_bytes(&self.backend.get(&rel)?).with_context(|| format!("[store] Failed to decode {rel}"))
    }

    /// Remove every recorded file whose path starts with one of `prefixes`
    /// (e.g. `"data/metrics/"`, `"graph/"`), along with matching counts.
    pub fn invalidate(&mut self, prefixes: &[&str]) -> Result<usize> {
        let stale = self.manifest.files.keys()
            .filter(|rel| prefixes.iter().any(|p| rel.starts_with(p)))
            .cloned()
            .collect::<Vec<_>>();
        for rel in &stale {
            self.backend.remove(rel)?;
            self.manifest.files.remove(rel);
        }
        self.manifest.counts.retain(|name, _| {
            !prefixes.iter().any(|p| format!("data/{name}.").starts_with(p) || format!("geom/{name}.").starts_with(p))
        });
        if !stale.is_empty() {
            debug!(files = stale.len(), "stale stage files removed");
        }
        self.save_manifest()?;
        Ok(stale.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use polars::prelude::*;

    use crate::common::u32_column;

    fn square(x: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![(x: x, y: 0.0), (x: x + 1.0, y: 0.0), (x: x + 1.0, y: 1.0), (x: x, y: 1.0), (x: x, y: 0.0)]])
    }

    fn stores() -> Vec<Store> {
        let mut stores = vec![Store::memory(StoreFormat::GeoJson).unwrap()];
        #[cfg(feature = "parquet")]
        stores.push(Store::memory(StoreFormat::Parquet).unwrap());
        stores
    }

    #[test]
    fn polygons_and_tables_round_trip() {
        for mut store in stores() {
            let shapes = vec![square(0.0), square(5.0)];
            let table = df!("uID" => [0u32, 1]).unwrap();
            assert!(!store.has_collection("buildings"));
            store.put_polygons("buildings", &shapes, &table).unwrap();
            assert!(store.has_collection("buildings"));
            assert_eq!(store.count("buildings"), Some(2));

            let (back, back_table) = store.get_polygons("buildings").unwrap();
            assert_eq!(back, shapes);
            assert_eq!(u32_column(&back_table, "uID").unwrap(), vec![0, 1]);

            let ext = store.format().data_extension();
            assert!(store.file_hash(&format!("data/buildings.{ext}")).is_some());
        }
    }

    #[test]
    fn lines_and_graphs_round_trip() {
        for mut store in stores() {
            let lines = vec![LineString::from(vec![(0.0, 0.0), (3.0, 4.0)])];
            store.put_lines("roads", &lines, &df!("nID" => [0u32]).unwrap()).unwrap();
            assert_eq!(store.get_lines("roads").unwrap().0, lines);

            let graph = Graph::from_adjacencies(&[vec![1], vec![0, 2], vec![1]]);
            store.put_graph("queen_1", &graph).unwrap();
            assert!(store.has_graph("queen_1"));
            assert_eq!(store.get_graph("queen_1").unwrap(), graph);
        }
    }

    #[test]
    fn mismatched_rows_are_rejected() {
        let mut store = Store::memory(StoreFormat::GeoJson).unwrap();
        let table = df!("uID" => [0u32, 1, 2]).unwrap();
        assert!(store.put_polygons("buildings", &[square(0.0)], &table).is_err());
    }

    #[test]
    fn invalidate_removes_prefixed_files() {
        let mut store = Store::memory(StoreFormat::GeoJson).unwrap();
        store.put_table("metrics/sdbAre", &df!("uID" => [0u32], "sdbAre" => [1.0]).unwrap()).unwrap();
        store.put_table("grid_metrics", &df!("grid_id" => [1u32]).unwrap()).unwrap();
        store.put_graph("queen_1", &Graph::from_adjacencies(&[vec![]])).unwrap();

        assert_eq!(store.invalidate(&["data/metrics/", "graph/"]).unwrap(), 2);
        assert!(!store.has_table("metrics/sdbAre"));
        assert!(!store.has_graph("queen_1"));
        assert!(store.has_table("grid_metrics"));
        assert_eq!(store.count("metrics/sdbAre"), None);
        assert_eq!(store.count("grid_metrics"), Some(1));
    }

    #[test]
    fn invalidate_collection_drops_its_count() {
        let mut store = Store::memory(StoreFormat::GeoJson).unwrap();
        store.put_polygons("grid", &[square(0.0)], &df!("grid_id" => [1u32]).unwrap()).unwrap();
        store.put_polygons("grid_metrics", &[square(0.0)], &df!("grid_id" => [1u32]).unwrap()).unwrap();

        assert_eq!(store.invalidate(&["geom/grid.", "data/grid."]).unwrap(), 2);
        assert!(!store.has_collection("grid"));
        assert_eq!(store.count("grid"), None);
        assert!(store.has_collection("grid_metrics"));
        assert_eq!(store.count("grid_metrics"), Some(1));
    }

    #[test]
    fn disk_store_reopens_with_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let mut store = Store::disk(tmp.path(), StoreFormat::GeoJson).unwrap();
            store.set_crs(32632).unwrap();
            store.put_table("grid_metrics", &df!("grid_id" => [1u32, 2]).unwrap()).unwrap();
        }
        assert!(tmp.path().join("manifest.json").exists());

        let store = Store::disk(tmp.path(), StoreFormat::GeoJson).unwrap();
        assert_eq!(store.crs(), Some(32632));
        assert_eq!(store.count("grid_metrics"), Some(2));
        #[cfg(feature = "parquet")]
        assert!(Store::disk(tmp.path(), StoreFormat::Parquet).is_err());
    }
}
