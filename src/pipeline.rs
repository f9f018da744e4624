//! Stage sequencing with cached outputs.

use std::{collections::BTreeSet, fmt, path::{Path, PathBuf}, str::FromStr};

use anyhow::{anyhow, bail, Result};
use geo::MultiPolygon;
use polars::prelude::DataFrame;
use tracing::{info, info_span};

use crate::{
    aggregate::{aggregate_morphometrics, aggregate_road_access},
    cluster::cluster_grid,
    common::io::Features,
    config::{Config, RoadsConfig},
    elements::{
        align, assign_blocks, extend_lines, generate_blocks, generate_grid, morphological_tessellation,
        nearest_street, preprocess_buildings, preprocess_roads, Blocks, Buildings, Element, Grid, Roads,
        Roi, Tessellation,
    },
    model::{morphological_informality, road_access_deprivation},
    morph::{Morphometrics, COMBINED},
    road_access::{road_access, RoadAccess},
    store::Store,
};

const ALIGNED_BUILDINGS: &str = "buildings_aligned";
const EXTENDED_ROADS: &str = "roads_extended";
const ACCESS_ROADS: &str = "access_roads";
const GRID_MORPHOMETRICS: &str = "grid_morphometrics";
const CLUSTERS: &str = "clusters";
const ELBOW: &str = "elbow";
const INFORMALITY: &str = "informality";
const GRID_ROAD_ACCESS: &str = "grid_road_access";
const ROAD_ACCESS_DEPRIVATION: &str = "road_access_deprivation";

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Preprocess,
    Tessellate,
    Blocks,
    Morphometrics,
    Aggregate,
    Cluster,
    Classify,
    RoadAccess,
}

impl Stage {
    /// Stages of the morphological informality chain.
    pub const INFORMALITY: [Stage; 7] = [
        Stage::Preprocess, Stage::Tessellate, Stage::Blocks, Stage::Morphometrics,
        Stage::Aggregate, Stage::Cluster, Stage::Classify,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Preprocess => "preprocess",
            Stage::Tessellate => "tessellate",
            Stage::Blocks => "blocks",
            Stage::Morphometrics => "morphometrics",
            Stage::Aggregate => "aggregate",
            Stage::Cluster => "cluster",
            Stage::Classify => "classify",
            Stage::RoadAccess => "road-access",
        }
    }

    /// Store path prefixes of everything the stage writes.
    fn outputs(&self) -> Vec<String> {
        let collections: &[&str] = match self {
            Stage::Preprocess => &[Roi::NAME, Buildings::NAME, Roads::NAME],
            Stage::Tessellate => &[Tessellation::NAME, ALIGNED_BUILDINGS],
            Stage::Blocks => &[Blocks::NAME, EXTENDED_ROADS],
            Stage::Morphometrics => &[COMBINED],
            Stage::Aggregate => &[Grid::NAME, GRID_MORPHOMETRICS],
            Stage::Cluster => &[CLUSTERS, ELBOW],
            Stage::Classify => &[INFORMALITY],
            Stage::RoadAccess => &[ACCESS_ROADS, RoadAccess::NAME, GRID_ROAD_ACCESS, ROAD_ACCESS_DEPRIVATION],
        };
        let mut prefixes = collections.iter()
            .flat_map(|name| [format!("geom/{name}."), format!("data/{name}.")])
            .collect::<Vec<_>>();
        if *self == Stage::Morphometrics {
            prefixes.extend(["data/metrics/".to_string(), "graph/".to_string()]);
        }
        prefixes
    }

    /// Stages whose cached outputs depend on this one.
    fn downstream(&self) -> Vec<Stage> {
        let mut stages = Stage::INFORMALITY.into_iter().filter(|s| s > self).collect::<Vec<_>>();
        if matches!(self, Stage::Preprocess | Stage::Aggregate) {
            stages.push(Stage::RoadAccess);
        }
        stages
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Stage::INFORMALITY.into_iter().chain([Stage::RoadAccess])
            .find(|stage| stage.name() == s)
            .ok_or_else(|| anyhow!("Unknown stage: {s}"))
    }
}

/// Input files. Only the inputs of the stages that actually run are required.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    pub roi: Option<PathBuf>,
    pub buildings: Option<PathBuf>,
    pub roads: Option<PathBuf>,
    /// Existing analysis grid; a regular grid is generated when absent.
    pub grid: Option<PathBuf>,
}

/// Grid cells with one row of attributes each.
#[derive(Debug, Clone)]
pub struct GridLayer {
    pub shapes: Vec<MultiPolygon<f64>>,
    pub table: DataFrame,
}

/// Runs the stages over a [`Store`], loading a stage's cached outputs instead
/// of recomputing them. Forced stages lose their cached outputs, and those of
/// every stage depending on them, before the first stage runs. Recomputing a
/// stage drops the cached outputs of every stage depending on it.
pub struct Pipeline {
    store: Store,
    config: Config,
    inputs: Inputs,
    force: BTreeSet<Stage>,
}

impl Pipeline {
    pub fn new(store: Store, config: Config, inputs: Inputs) -> Self {
        Self { store, config, inputs, force: BTreeSet::new() }
    }

    /// Recompute `stages` and everything downstream of them, even when their
    /// outputs are cached.
    pub fn force(mut self, stages: &[Stage]) -> Self {
        self.force.extend(stages);
        self
    }

    #[inline] pub fn store(&self) -> &Store { &self.store }

    #[inline] pub fn config(&self) -> &Config { &self.config }

    pub fn into_store(self) -> Store { self.store }

    /// Run the morphological informality chain end to end.
    pub fn run(&mut self) -> Result<GridLayer> {
        self.classify()
    }

    /// Run a single stage, together with whatever it needs that is not cached.
    pub fn run_stage(&mut self, stage: Stage) -> Result<()> {
        match stage {
            Stage::Preprocess => self.preprocess().map(drop),
            Stage::Tessellate => self.tessellate().map(drop),
            Stage::Blocks => self.blocks().map(drop),
            Stage::Morphometrics => self.morphometrics().map(drop),
            Stage::Aggregate => self.aggregate().map(drop),
            Stage::Cluster => self.cluster().map(drop),
            Stage::Classify => self.classify().map(drop),
            Stage::RoadAccess => self.road_access().map(drop),
        }
    }

    fn cached(&mut self, name: &str) -> Result<bool> {
        self.apply_force()?;
        Ok(self.store.has_collection(name))
    }

    /// Drops the outputs of the forced stages and their downstream stages.
    /// Runs once; later cache misses carry the recompute down the chain.
    fn apply_force(&mut self) -> Result<()> {
        if self.force.is_empty() {
            return Ok(());
        }
        let forced = std::mem::take(&mut self.force);
        let stages = forced.iter()
            .flat_map(|stage| std::iter::once(*stage).chain(stage.downstream()))
            .collect::<BTreeSet<_>>();
        let prefixes = stages.iter().flat_map(Stage::outputs).collect::<Vec<_>>();
        let prefixes = prefixes.iter().map(String::as_str).collect::<Vec<_>>();
        let removed = self.store.invalidate(&prefixes)?;
        info!(forced = ?forced, removed, "dropped outputs of forced stages");
        Ok(())
    }

    /// Called before a stage writes fresh outputs.
    fn invalidate_downstream(&mut self, stage: Stage) -> Result<()> {
        let prefixes = stage.downstream().iter().flat_map(Stage::outputs).collect::<Vec<_>>();
        let prefixes = prefixes.iter().map(String::as_str).collect::<Vec<_>>();
        let removed = self.store.invalidate(&prefixes)?;
        if removed > 0 {
            info!(%stage, removed, "dropped stale downstream outputs");
        }
        Ok(())
    }

    fn input(path: &Option<PathBuf>, what: &str) -> Result<Features> {
        match path {
            Some(path) => read_input(path, what),
            None => bail!("[pipeline] the {what} input file is required"),
        }
    }

    fn roads_input(&self, config: &RoadsConfig, roi: &Roi) -> Result<Roads> {
        match &self.inputs.roads {
            Some(path) => preprocess_roads(&read_input(path, "roads")?, roi, config, self.config.preprocess.input_epsg),
            None => {
                info!("no roads input; continuing without roads");
                Roads::new(vec![], vec![])
            }
        }
    }

    /// Region of interest, cleaned buildings with their nearest street, and cleaned roads.
    pub fn preprocess(&mut self) -> Result<(Roi, Buildings, Roads)> {
        if self.cached(Buildings::NAME)? {
            return Ok((Roi::load(&self.store)?, Buildings::load(&self.store)?, Roads::load(&self.store)?));
        }
        let _span = info_span!("preprocess").entered();

        let roi = Roi::from_features(&Self::input(&self.inputs.roi, "roi")?, self.config.preprocess.input_epsg)?;
        let features = Self::input(&self.inputs.buildings, "buildings")?;
        let mut buildings = preprocess_buildings(&features, &roi, &self.config.preprocess)?;
        let roads = self.roads_input(&self.config.roads, &roi)?;
        buildings.set_nids(nearest_street(buildings.geoms(), &roads, self.config.roads.nearest_max_distance));

        self.invalidate_downstream(Stage::Preprocess)?;
        self.store.set_crs(roi.epsg())?;
        roi.save(&mut self.store)?;
        buildings.save(&mut self.store)?;
        roads.save(&mut self.store)?;
        info!(buildings = buildings.len(), roads = roads.len(), epsg = roi.epsg(), "preprocessed");
        Ok((roi, buildings, roads))
    }

    /// Buildings and tessellation cells aligned 1:1 by uID.
    pub fn tessellate(&mut self) -> Result<(Buildings, Tessellation)> {
        if self.cached(Tessellation::NAME)? {
            return Ok((Buildings::load_from(&self.store, ALIGNED_BUILDINGS)?, Tessellation::load(&self.store)?));
        }
        let (_, buildings, _) = self.preprocess()?;
        let _span = info_span!("tessellate").entered();

        let (tessellation, _) = morphological_tessellation(&buildings, &self.config.tessellation)?;
        let (buildings, tessellation, _) = align(&buildings, &tessellation);

        self.invalidate_downstream(Stage::Tessellate)?;
        buildings.save_as(&mut self.store, ALIGNED_BUILDINGS)?;
        tessellation.save(&mut self.store)?;
        Ok((buildings, tessellation))
    }

    /// Blocks, with `bID` assigned to the aligned buildings and cells.
    pub fn blocks(&mut self) -> Result<(Buildings, Tessellation, Blocks)> {
        if self.cached(Blocks::NAME)? {
            let (buildings, tessellation) = self.tessellate()?;
            return Ok((buildings, tessellation, Blocks::load(&self.store)?));
        }
        let (_, _, roads) = self.preprocess()?;
        let (mut buildings, mut tessellation) = self.tessellate()?;
        let _span = info_span!("blocks").entered();

        let extended = extend_lines(&roads, self.config.roads.extend_tolerance, tessellation.geoms(), buildings.geoms())?;
        let blocks = generate_blocks(&tessellation, &extended, &buildings, self.config.contiguity.tolerance)?;
        assign_blocks(&mut buildings, &mut tessellation, &blocks);

        self.invalidate_downstream(Stage::Blocks)?;
        extended.save_as(&mut self.store, EXTENDED_ROADS)?;
        blocks.save(&mut self.store)?;
        buildings.save_as(&mut self.store, ALIGNED_BUILDINGS)?;
        tessellation.save(&mut self.store)?;
        Ok((buildings, tessellation, blocks))
    }

    /// Every morphometric character, one row per uID.
    pub fn morphometrics(&mut self) -> Result<DataFrame> {
        self.apply_force()?;
        if self.store.has_table(COMBINED) {
            return self.store.get_table(COMBINED);
        }
        let (buildings, tessellation, _) = self.blocks()?;
        let (_, _, roads) = self.preprocess()?;
        let _span = info_span!("morphometrics").entered();

        self.invalidate_downstream(Stage::Morphometrics)?;
        let roads = (!roads.is_empty()).then_some(&roads);
        let mut morph = Morphometrics::new(&mut self.store, &buildings, &tessellation, roads, &self.config.contiguity)?;
        morph.all()?;
        if roads.is_some() {
            morph.road_orientation(self.config.roads.orientation_interval)?;
        }
        morph.combine()
    }

    /// The analysis grid: read from the grid input, or generated over the ROI.
    pub fn grid(&mut self) -> Result<Grid> {
        if self.cached(Grid::NAME)? {
            return Grid::load(&self.store);
        }
        let (roi, _, _) = self.preprocess()?;
        let grid = match &self.inputs.grid {
            Some(path) => Grid::from_features(&read_input(path, "grid")?, self.config.preprocess.input_epsg, roi.epsg())?,
            None => generate_grid(&roi, self.config.grid.cell_size)?,
        };
        grid.save(&mut self.store)?;
        Ok(grid)
    }

    fn layer(&self, name: &str) -> Result<GridLayer> {
        let (shapes, table) = self.store.get_polygons(name)?;
        Ok(GridLayer { shapes, table })
    }

    fn save_layer(&mut self, name: &str, shapes: Vec<MultiPolygon<f64>>, table: DataFrame) -> Result<GridLayer> {
        self.store.put_polygons(name, &shapes, &table)?;
        Ok(GridLayer { shapes, table })
    }

    /// Morphometric summaries per grid cell.
    pub fn aggregate(&mut self) -> Result<GridLayer> {
        if self.cached(GRID_MORPHOMETRICS)? {
            return self.layer(GRID_MORPHOMETRICS);
        }
        let metrics = self.morphometrics()?;
        let (buildings, tessellation, _) = self.blocks()?;
        let grid = self.grid()?;
        let _span = info_span!("aggregate").entered();

        let stats = aggregate_morphometrics(&buildings, &tessellation, &metrics, &grid)?;
        self.invalidate_downstream(Stage::Aggregate)?;
        stats.save(&mut self.store, &grid, GRID_MORPHOMETRICS)?;
        self.layer(GRID_MORPHOMETRICS)
    }

    /// Grid summaries with the cluster labels of every run.
    pub fn cluster(&mut self) -> Result<GridLayer> {
        if self.cached(CLUSTERS)? {
            return self.layer(CLUSTERS);
        }
        let GridLayer { shapes, table } = self.aggregate()?;
        let _span = info_span!("cluster").entered();

        let clustering = cluster_grid(&table, &self.config.clustering)?;
        self.invalidate_downstream(Stage::Cluster)?;
        self.store.put_table(ELBOW, &clustering.elbow)?;
        self.save_layer(CLUSTERS, shapes, clustering.labels)
    }

    /// Morphological informality per grid cell.
    pub fn classify(&mut self) -> Result<GridLayer> {
        if self.cached(INFORMALITY)? {
            return self.layer(INFORMALITY);
        }
        let GridLayer { shapes, table } = self.cluster()?;
        let _span = info_span!("classify").entered();

        let mi = morphological_informality(&table, &self.config.model)?;
        self.save_layer(INFORMALITY, shapes, mi)
    }

    /// Road access deprivation per grid cell. Every road edge counts here,
    /// whatever its class.
    pub fn road_access(&mut self) -> Result<GridLayer> {
        if self.cached(ROAD_ACCESS_DEPRIVATION)? {
            return self.layer(ROAD_ACCESS_DEPRIVATION);
        }
        if self.inputs.roads.is_none() {
            bail!("[pipeline] road access requires the roads input file");
        }
        let (roi, buildings, _) = self.preprocess()?;
        let grid = self.grid()?;
        let _span = info_span!("road_access").entered();

        let all_roads = RoadsConfig { classes: vec![], subtype: String::new(), ..self.config.roads.clone() };
        let roads = self.roads_input(&all_roads, &roi)?;
        let access = road_access(&buildings, &roads, &self.config.road_access);
        let stats = aggregate_road_access(&buildings, &access, &grid)?;
        let ra = road_access_deprivation(stats.table(), self.config.road_access.threshold)?;

        roads.save_as(&mut self.store, ACCESS_ROADS)?;
        access.save(&mut self.store)?;
        stats.save(&mut self.store, &grid, GRID_ROAD_ACCESS)?;
        let GridLayer { shapes, .. } = self.layer(GRID_ROAD_ACCESS)?;
        self.save_layer(ROAD_ACCESS_DEPRIVATION, shapes, ra)
    }
}

fn read_input(path: &Path, what: &str) -> Result<Features> {
    info!(path = %path.display(), "reading {what}");
    Features::read(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_round_trip() {
        for stage in Stage::INFORMALITY.into_iter().chain([Stage::RoadAccess]) {
            assert_eq!(stage.to_string().parse::<Stage>().unwrap(), stage);
        }
        assert!("tessellation".parse::<Stage>().is_err());
    }

    #[test]
    fn downstream_stages() {
        assert_eq!(Stage::Cluster.downstream(), vec![Stage::Classify]);
        assert!(Stage::Preprocess.downstream().contains(&Stage::RoadAccess));
        assert!(Stage::Classify.downstream().is_empty());
        assert!(Stage::Morphometrics.outputs().contains(&"graph/".to_string()));
    }

    #[test]
    fn missing_inputs_are_reported() {
        let store = Store::memory(crate::store::StoreFormat::GeoJson).unwrap();
        let mut pipeline = Pipeline::new(store, Config::default(), Inputs::default());
        let err = pipeline.preprocess().unwrap_err();
        assert!(err.to_string().contains("roi"), "{err}");
        assert!(pipeline.road_access().is_err());
    }
}
