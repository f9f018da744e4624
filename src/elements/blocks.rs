use ahash::AHashMap;
use anyhow::{bail, Result};
use geo::{InteriorPoint, Line, Point};
use polars::prelude::*;
use tracing::{debug, info};

use crate::{
    common::u32_column,
    elements::{Buildings, Element, Roads, Tessellation},
    geom::{algorithm::union_all, Geometries},
    graph::{connected_components, queen},
    store::Store,
};

/// Urban blocks keyed by `bID`.
#[derive(Debug, Clone)]
pub struct Blocks {
    geoms: Geometries,
    bid: Vec<u32>,
}

impl Blocks {
    pub fn new(geoms: Geometries, bid: Vec<u32>) -> Result<Self> {
        if bid.len() != geoms.len() {
            bail!("[blocks] {} ids for {} blocks", bid.len(), geoms.len());
        }
        Ok(Self { geoms, bid })
    }

    #[inline] pub fn len(&self) -> usize { self.geoms.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.geoms.is_empty() }

    #[inline] pub fn geoms(&self) -> &Geometries { &self.geoms }

    #[inline] pub fn bids(&self) -> &[u32] { &self.bid }
}

impl Element for Blocks {
    const NAME: &'static str = "blocks";

    fn save_as(&self, store: &mut Store, name: &str) -> Result<()> {
        store.put_polygons(name, self.geoms.shapes(), &df!("bID" => &self.bid)?)
    }

    fn load_from(store: &Store, name: &str) -> Result<Self> {
        let (shapes, df) = store.get_polygons(name)?;
        Self::new(Geometries::new(shapes, store.crs().unwrap_or_default()), u32_column(&df, "bID")?)
    }
}

/// Point standing for a cell when testing whether a road separates two cells:
/// the interior point of its building, or of the cell itself.
fn anchors(tessellation: &Tessellation, buildings: &Buildings) -> Vec<Option<Point<f64>>> {
    let building_of = buildings.uids().iter().enumerate()
        .map(|(i, &uid)| (uid, i))
        .collect::<AHashMap<_, _>>();

    tessellation.uids().iter().enumerate()
        .map(|(c, uid)| match building_of.get(uid) {
            Some(&b) => buildings.geoms().shape(b).interior_point(),
            None => tessellation.geoms().shape(c).interior_point(),
        })
        .collect()
}

/// Blocks as groups of contiguous tessellation cells not separated by a road.
///
/// Two queen-contiguous cells stay connected unless the segment joining their
/// anchors crosses a road. Each connected component becomes a block whose
/// geometry is the union of its cells; blocks are numbered `bID = 0..m` in
/// order of their first cell.
pub fn generate_blocks(tessellation: &Tessellation, roads: &Roads, buildings: &Buildings, tolerance: f64) -> Result<Blocks> {
    let anchors = anchors(tessellation, buildings);
    let contiguity = queen(tessellation.geoms(), tolerance);

    let graph = contiguity.filter_edges(|a, b| match (anchors[a], anchors[b]) {
        (Some(p), Some(q)) => !roads.lines().any_intersects(&Line::new(p.0, q.0)),
        _ => true,
    });
    debug!(removed = (contiguity.edge_count() - graph.edge_count()) / 2, "adjacencies cut by roads");

    let (count, labels) = connected_components(&graph);
    let mut members = vec![Vec::new(); count];
    for (cell, &label) in labels.iter().enumerate() {
        members[label as usize].push(tessellation.geoms().shape(cell).clone());
    }

    let shapes = members.into_iter().map(union_all).collect::<Vec<_>>();
    info!(blocks = shapes.len(), "generated blocks");
    Blocks::new(Geometries::new(shapes, tessellation.geoms().epsg()), (0..count as u32).collect())
}

/// Give every cell the `bID` of the block containing it, and every building the
/// `bID` of its cell. Buildings without a cell take the nearest block.
pub fn assign_blocks(buildings: &mut Buildings, tessellation: &mut Tessellation, blocks: &Blocks) {
    let cell_bids = tessellation.geoms().shapes().iter()
        .map(|cell| {
            let point = cell.interior_point()?;
            blocks.geoms().containing(&point).map(|b| blocks.bids()[b])
        })
        .collect::<Vec<_>>();

    let by_uid = tessellation.uids().iter().copied().zip(cell_bids.iter().copied()).collect::<AHashMap<_, _>>();
    let building_bids = buildings.uids().iter().enumerate()
        .map(|(i, uid)| match by_uid.get(uid) {
            Some(&bid) => bid,
            None => blocks.geoms().nearest(buildings.geoms().shape(i), f64::MAX).map(|(b, _)| blocks.bids()[b]),
        })
        .collect::<Vec<_>>();

    let unassigned = building_bids.iter().filter(|b| b.is_none()).count();
    if unassigned > 0 {
        debug!(unassigned, "buildings without a block");
    }

    tessellation.set_bids(cell_bids);
    buildings.set_bids(building_bids);
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, LineString, MultiPolygon};

    fn rect(x: f64, y: f64, w: f64, h: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![(x: x, y: y), (x: x + w, y: y), (x: x + w, y: y + h), (x: x, y: y + h), (x: x, y: y)]])
    }

    /// Four 10x10 cells in a row, each with a 4x4 building in its middle.
    fn layout() -> (Buildings, Tessellation) {
        let buildings = Buildings::new(Geometries::new((0..4).map(|i| rect(i as f64 * 10.0 + 3.0, 3.0, 4.0, 4.0)).collect(), 32632));
        let cells = Geometries::new((0..4).map(|i| rect(i as f64 * 10.0, 0.0, 10.0, 10.0)).collect(), 32632);
        let tessellation = Tessellation::new(cells, vec![0, 1, 2, 3], vec![None; 4]).unwrap();
        (buildings, tessellation)
    }

    #[test]
    fn road_between_cells_splits_blocks() {
        let (mut buildings, mut tessellation) = layout();
        let roads = Roads::new(vec![LineString::from(vec![(20.0, -5.0), (20.0, 15.0)])], vec![None]).unwrap();

        let blocks = generate_blocks(&tessellation, &roads, &buildings, 1e-6).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks.bids(), &[0, 1]);

        assign_blocks(&mut buildings, &mut tessellation, &blocks);
        assert_eq!(tessellation.bids(), &[Some(0), Some(0), Some(1), Some(1)]);
        assert_eq!(buildings.bids(), tessellation.bids());
    }

    #[test]
    fn no_roads_gives_one_block() {
        let (buildings, tessellation) = layout();
        let roads = Roads::new(vec![], vec![]).unwrap();
        let blocks = generate_blocks(&tessellation, &roads, &buildings, 1e-6).unwrap();
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn building_without_cell_takes_nearest_block() {
        let (buildings, tessellation) = layout();
        let roads = Roads::new(vec![LineString::from(vec![(20.0, -5.0), (20.0, 15.0)])], vec![None]).unwrap();
        let blocks = generate_blocks(&tessellation, &roads, &buildings, 1e-6).unwrap();

        let shapes = [buildings.geoms().shapes(), &[rect(45.0, 3.0, 2.0, 2.0)]].concat();
        let mut extra = Buildings::with_ids(Geometries::new(shapes, 32632), vec![0, 1, 2, 3, 9], vec![None; 5], vec![None; 5]).unwrap();
        let mut tessellation = tessellation;
        assign_blocks(&mut extra, &mut tessellation, &blocks);
        assert_eq!(extra.bids()[4], Some(1));
    }
}
