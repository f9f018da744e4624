use anyhow::{bail, Result};
use geo::{Area, Contains, Intersects, MultiPolygon};
use polars::prelude::*;
use tracing::{debug, info};

use crate::{
    common::{io::Features, opt_u32_column, u32_column},
    config::PreprocessConfig,
    crs::Projector,
    elements::{check_tessellation_input, Element, Roi},
    geom::{algorithm::{circular_compactness, explode, fill_holes, repair, shape_distance, shared_boundary_length, union_all, unique_indices}, Geometries},
    store::Store,
};

/// Building footprints keyed by `uID`, with the `nID` of their nearest street
/// and the `bID` of their block once known.
#[derive(Debug, Clone)]
pub struct Buildings {
    geoms: Geometries,
    uid: Vec<u32>,
    nid: Vec<Option<u32>>,
    bid: Vec<Option<u32>>,
}

impl Buildings {
    /// Buildings numbered `uID = 0..n` in input order.
    pub fn new(geoms: Geometries) -> Self {
        let n = geoms.len();
        Self { geoms, uid: (0..n as u32).collect(), nid: vec![None; n], bid: vec![None; n] }
    }

    pub fn with_ids(geoms: Geometries, uid: Vec<u32>, nid: Vec<Option<u32>>, bid: Vec<Option<u32>>) -> Result<Self> {
        let n = geoms.len();
        if uid.len() != n || nid.len() != n || bid.len() != n {
            bail!("[buildings] id columns do not match {n} geometries");
        }
        Ok(Self { geoms, uid, nid, bid })
    }

    #[inline] pub fn len(&self) -> usize { self.geoms.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.geoms.is_empty() }

    #[inline] pub fn geoms(&self) -> &Geometries { &self.geoms }

    #[inline] pub fn uids(&self) -> &[u32] { &self.uid }

    #[inline] pub fn nids(&self) -> &[Option<u32>] { &self.nid }

    #[inline] pub fn bids(&self) -> &[Option<u32>] { &self.bid }

    #[inline] pub fn epsg(&self) -> u32 { self.geoms.epsg() }

    pub fn set_nids(&mut self, nid: Vec<Option<u32>>) {
        debug_assert_eq!(nid.len(), self.len());
        self.nid = nid;
    }

    pub fn set_bids(&mut self, bid: Vec<Option<u32>>) {
        debug_assert_eq!(bid.len(), self.len());
        self.bid = bid;
    }

    /// Buildings at the given positions, keeping their ids.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            geoms: Geometries::new(indices.iter().map(|&i| self.geoms.shape(i).clone()).collect(), self.epsg()),
            uid: indices.iter().map(|&i| self.uid[i]).collect(),
            nid: indices.iter().map(|&i| self.nid[i]).collect(),
            bid: indices.iter().map(|&i| self.bid[i]).collect(),
        }
    }

    /// Attribute table (`uID`, `nID`, `bID`).
    pub fn to_frame(&self) -> Result<DataFrame> {
        Ok(df!(
            "uID" => &self.uid,
            "nID" => &self.nid,
            "bID" => &self.bid,
        )?)
    }
}

impl Element for Buildings {
    const NAME: &'static str = "buildings";

    fn save_as(&self, store: &mut Store, name: &str) -> Result<()> {
        store.put_polygons(name, self.geoms.shapes(), &self.to_frame()?)
    }

    fn load_from(store: &Store, name: &str) -> Result<Self> {
        let (shapes, df) = store.get_polygons(name)?;
        let epsg = store.crs().unwrap_or_default();
        Self::with_ids(
            Geometries::new(shapes, epsg),
            u32_column(&df, "uID")?,
            opt_u32_column(&df, "nID")?,
            opt_u32_column(&df, "bID")?,
        )
    }
}

/// Minimal union-find used to group merged buildings.
struct Groups(Vec<usize>);

impl Groups {
    fn new(n: usize) -> Self { Self((0..n).collect()) }

    fn find(&mut self, mut i: usize) -> usize {
        while self.0[i] != i {
            self.0[i] = self.0[self.0[i]];
            i = self.0[i];
        }
        i
    }

    fn join(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb { self.0[ra.max(rb)] = ra.min(rb) }
    }
}

/// One cleaning pass: absorb islands into their enclosing building, merge small
/// or non-compact buildings into the touching neighbour sharing the longest
/// boundary, and drop small buildings that touch nothing.
fn merge_pass(shapes: Vec<MultiPolygon<f64>>, config: &PreprocessConfig, epsg: u32) -> Vec<MultiPolygon<f64>> {
    let shapes = if config.islands {
        shapes.into_iter()
            .map(|shape| MultiPolygon::new(shape.0.iter().map(fill_holes).collect()))
            .collect()
    } else {
        shapes
    };
    let geoms = Geometries::new(shapes, epsg);
    let n = geoms.len();

    let mut groups = Groups::new(n);
    let mut dropped = vec![false; n];

    if config.islands {
        for i in 0..n {
            let island = geoms.candidates(i, 0.0)
                .find(|&j| geoms.shape(j).unsigned_area() > geoms.shape(i).unsigned_area()
                    && geoms.shape(j).contains(geoms.shape(i)));
            if let Some(j) = island { groups.join(i, j) }
        }
    }

    for i in 0..n {
        let shape = geoms.shape(i);
        let area = shape.unsigned_area();
        let small = area < config.min_area;
        if !small && circular_compactness(shape) >= config.min_compactness { continue }

        let target = geoms.candidates(i, 0.0)
            .filter(|&j| shape_distance(shape, geoms.shape(j)) == 0.0)
            .map(|j| (j, shared_boundary_length(shape, geoms.shape(j), 1e-6)))
            .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)));

        match target {
            Some((j, _)) => groups.join(i, j),
            None if small => dropped[i] = true,
            None => {}
        }
    }

    let mut members: Vec<Vec<usize>> = vec![vec![]; n];
    for i in 0..n {
        if !dropped[i] {
            let root = groups.find(i);
            members[root].push(i);
        }
    }
    let merged = members.iter().filter(|m| m.len() > 1).count();
    let removed = dropped.iter().filter(|&&d| d).count();
    debug!(merged, removed, "building merge pass");

    members.into_iter()
        .filter(|m| !m.is_empty())
        .map(|m| match m.as_slice() {
            [only] => geoms.shape(*only).clone(),
            _ => union_all(m.iter().map(|&i| geoms.shape(i).clone()).collect()),
        })
        .collect()
}

/// Clean raw building footprints into the tessellation-ready `Buildings` of `roi`.
///
/// Buildings are reprojected to the UTM zone of the region and kept when they
/// intersect it. Duplicates are dropped and the rest repaired and exploded.
/// Then `config.loops` merge passes run, and finally every building that
/// would collapse, split or overlap during tessellation is removed.
/// Survivors are numbered `uID = 0..n`.
pub fn preprocess_buildings(features: &Features, roi: &Roi, config: &PreprocessConfig) -> Result<Buildings> {
    let projector = Projector::new(config.input_epsg, roi.epsg())?;
    let shapes = features.polygons().into_iter()
        .map(|(_, shape)| projector.geometry(&shape))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .filter(|shape| shape.intersects(roi.shape()))
        .collect::<Vec<_>>();
    info!(buildings = shapes.len(), epsg = roi.epsg(), "processing buildings");

    let unique = unique_indices(&shapes);
    info!(duplicates = shapes.len() - unique.len(), "duplicate geometries in buildings");

    let mut shapes = unique.into_iter()
        .map(|i| repair(&shapes[i]))
        .filter(|shape| !shape.0.is_empty())
        .flat_map(|shape| explode(shape).map(|polygon| MultiPolygon::new(vec![polygon])).collect::<Vec<_>>())
        .collect::<Vec<_>>();

    for _ in 0..config.loops {
        shapes = merge_pass(shapes, config, roi.epsg());
    }
    let shapes = shapes.into_iter()
        .flat_map(|shape| explode(shape).map(|polygon| MultiPolygon::new(vec![polygon])).collect::<Vec<_>>())
        .collect::<Vec<_>>();

    let geoms = Geometries::new(shapes, roi.epsg());
    let flagged = check_tessellation_input(&geoms, config.shrink)?.flagged();
    info!(dropped = flagged.len(), "buildings failing tessellation checks");

    let keep = (0..geoms.len()).filter(|i| flagged.binary_search(i).is_err()).collect::<Vec<_>>();
    let shapes = keep.into_iter().map(|i| geoms.shape(i).clone()).collect();
    Ok(Buildings::new(Geometries::new(shapes, roi.epsg())))
}
