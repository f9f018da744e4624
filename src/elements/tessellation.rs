use ahash::{AHashMap, AHashSet};
use anyhow::{bail, Result};
use polars::prelude::*;
use tracing::{info, warn};

use crate::{
    common::{opt_u32_column, u32_column},
    config::TessellationConfig,
    elements::{Buildings, Element},
    geom::{algorithm::voronoi_regions, Geometries},
    store::Store,
};

/// Morphological tessellation cells keyed by the `uID` of their building.
#[derive(Debug, Clone)]
pub struct Tessellation {
    geoms: Geometries,
    uid: Vec<u32>,
    bid: Vec<Option<u32>>,
}

impl Tessellation {
    pub fn new(geoms: Geometries, uid: Vec<u32>, bid: Vec<Option<u32>>) -> Result<Self> {
        if uid.len() != geoms.len() || bid.len() != geoms.len() {
            bail!("[tessellation] id columns do not match {} cells", geoms.len());
        }
        Ok(Self { geoms, uid, bid })
    }

    #[inline] pub fn len(&self) -> usize { self.geoms.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.geoms.is_empty() }

    #[inline] pub fn geoms(&self) -> &Geometries { &self.geoms }

    #[inline] pub fn uids(&self) -> &[u32] { &self.uid }

    #[inline] pub fn bids(&self) -> &[Option<u32>] { &self.bid }

    pub fn set_bids(&mut self, bid: Vec<Option<u32>>) {
        debug_assert_eq!(bid.len(), self.len());
        self.bid = bid;
    }

    pub fn to_frame(&self) -> Result<DataFrame> {
        Ok(df!("uID" => &self.uid, "bID" => &self.bid)?)
    }
}

impl Element for Tessellation {
    const NAME: &'static str = "tessellation";

    fn save_as(&self, store: &mut Store, name: &str) -> Result<()> {
        store.put_polygons(name, self.geoms.shapes(), &self.to_frame()?)
    }

    fn load_from(store: &Store, name: &str) -> Result<Self> {
        let (shapes, df) = store.get_polygons(name)?;
        let epsg = store.crs().unwrap_or_default();
        Self::new(Geometries::new(shapes, epsg), u32_column(&df, "uID")?, opt_u32_column(&df, "bID")?)
    }
}

/// Outcome of checking a tessellation against its buildings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Verification {
    /// Buildings that received no cell.
    pub excluded: Vec<u32>,
    /// Buildings whose cell has several parts.
    pub multipart: Vec<u32>,
}

/// Voronoi tessellation of the inward-shrunk, densified building outlines,
/// with each cell dissolved per building and bounded to `config.limit` around it.
pub fn morphological_tessellation(buildings: &Buildings, config: &TessellationConfig) -> Result<(Tessellation, Verification)> {
    let regions = voronoi_regions(buildings.geoms().shapes(), config.shrink, config.segment, config.limit);

    let mut verification = Verification::default();
    let mut shapes = Vec::with_capacity(regions.len());
    let mut uid = Vec::with_capacity(regions.len());
    for (region, &id) in regions.into_iter().zip(buildings.uids()) {
        match region {
            Some(cell) if !cell.0.is_empty() => {
                if cell.0.len() > 1 { verification.multipart.push(id) }
                shapes.push(cell);
                uid.push(id);
            }
            _ => verification.excluded.push(id),
        }
    }

    if !verification.excluded.is_empty() {
        warn!(count = verification.excluded.len(), "buildings excluded from the tessellation");
    }
    if !verification.multipart.is_empty() {
        warn!(count = verification.multipart.len(), "multipart tessellation cells");
    }
    info!(cells = shapes.len(), "morphological tessellation");

    let n = uid.len();
    let tessellation = Tessellation::new(Geometries::new(shapes, buildings.epsg()), uid, vec![None; n])?;
    Ok((tessellation, verification))
}

/// uIDs found on one side of the alignment only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignReport {
    pub buildings_only: usize,
    pub tessellation_only: usize,
    pub duplicate_cells: usize,
}

/// Restrict buildings and cells to their common uIDs, dropping duplicate cells,
/// so that both are sorted by uID and correspond 1:1.
pub fn align(buildings: &Buildings, tessellation: &Tessellation) -> (Buildings, Tessellation, AlignReport) {
    let building_ids = buildings.uids().iter().copied().collect::<AHashSet<_>>();

    let mut cell_of = AHashMap::with_capacity(tessellation.len());
    let mut duplicate_cells = 0;
    for (i, &id) in tessellation.uids().iter().enumerate() {
        if cell_of.contains_key(&id) { duplicate_cells += 1 } else { cell_of.insert(id, i); }
    }

    let mut common = buildings.uids().iter().enumerate()
        .filter_map(|(i, id)| cell_of.get(id).map(|&c| (*id, i, c)))
        .collect::<Vec<_>>();
    common.sort_unstable_by_key(|&(id, _, _)| id);
    common.dedup_by_key(|&mut (id, _, _)| id);

    let report = AlignReport {
        buildings_only: building_ids.len() - common.len(),
        tessellation_only: cell_of.len() - common.len(),
        duplicate_cells,
    };
    info!(
        buildings_only = report.buildings_only,
        tessellation_only = report.tessellation_only,
        duplicate_cells = report.duplicate_cells,
        "aligned buildings and tessellation",
    );

    let building_idx = common.iter().map(|&(_, b, _)| b).collect::<Vec<_>>();
    let aligned_buildings = buildings.select(&building_idx);

    let cells = common.iter().map(|&(_, _, c)| tessellation.geoms().shape(c).clone()).collect();
    let aligned_tessellation = Tessellation {
        geoms: Geometries::new(cells, tessellation.geoms().epsg()),
        uid: common.iter().map(|&(id, _, _)| id).collect(),
        bid: common.iter().map(|&(_, _, c)| tessellation.bids()[c]).collect(),
    };

    (aligned_buildings, aligned_tessellation, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Area, Contains, MultiPolygon};

    fn rect(x: f64, y: f64, w: f64, h: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![(x: x, y: y), (x: x + w, y: y), (x: x + w, y: y + h), (x: x, y: y + h), (x: x, y: y)]])
    }

    fn row() -> Buildings {
        Buildings::new(Geometries::new((0..3).map(|i| rect(i as f64 * 20.0, 0.0, 10.0, 10.0)).collect(), 32632))
    }

    #[test]
    fn every_building_gets_a_cell_containing_it() {
        let buildings = row();
        let (tess, verification) = morphological_tessellation(&buildings, &TessellationConfig::default()).unwrap();
        assert_eq!(verification, Verification::default());
        assert_eq!(tess.uids(), &[0, 1, 2]);
        for i in 0..3 {
            assert!(tess.geoms().shape(i).contains(buildings.geoms().shape(i)));
        }
        // Cells do not overlap: total area equals the area of their union.
        let total = tess.geoms().shapes().iter().map(|s| s.unsigned_area()).sum::<f64>();
        assert!((total - tess.geoms().union().unsigned_area()).abs() < 1e-6 * total);
    }

    #[test]
    fn align_keeps_common_ids_sorted() {
        let buildings = row();
        let cells = Geometries::new(vec![rect(40.0, 0.0, 10.0, 10.0), rect(0.0, 0.0, 10.0, 10.0), rect(0.0, 0.0, 9.0, 9.0), rect(90.0, 0.0, 1.0, 1.0)], 32632);
        let tess = Tessellation::new(cells, vec![2, 0, 0, 7], vec![None; 4]).unwrap();

        let (b, t, report) = align(&buildings, &tess);
        assert_eq!(b.uids(), &[0, 2]);
        assert_eq!(t.uids(), &[0, 2]);
        assert_eq!(t.geoms().shape(0).unsigned_area(), 100.0);
        assert_eq!(report, AlignReport { buildings_only: 1, tessellation_only: 1, duplicate_cells: 1 });
    }
}
