use std::collections::BTreeMap;

use ahash::AHashMap;
use anyhow::{anyhow, bail, ensure, Context, Result};
use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    common::{f64_column, u32_column},
    config::ContiguityConfig,
    elements::{Buildings, Roads, Tessellation},
    graph::{connected_components, higher_order, queen, Graph},
    morph::{
        metric::Metric,
        neighbourhood::{
            alignment, blocks_count, covered_area, label_ratio, log_floor,
            mean_interbuilding_distance, neighbour_distance, weighted_neighbours,
        },
        primary::{
            areas, corner_distance_deviations, elongations, orientations, ratio, rectangularity,
            street_alignment,
        },
        street::{road_orientation, street_orientations},
    },
    store::Store,
};

/// Table holding every metric side by side.
pub const COMBINED: &str = "morphometrics";

/// Table holding the road orientation samples.
pub const ROAD_ORIENTATION: &str = "metrics/strOri";

const BUILDING_QUEEN: &str = "building_queen";

fn metric_table(metric: Metric) -> String { format!("metrics/{}", metric.code()) }

/// Cumulative neighbourhoods are `queen_{k}`; order `k` alone is `queen_{k}_exact`.
fn queen_name(order: usize, include_lower: bool) -> String {
    if include_lower || order == 1 { format!("queen_{order}") } else { format!("queen_{order}_exact") }
}

/// Computes morphometric characters of aligned buildings and cells, caching
/// each metric and each contiguity graph in the store.
///
/// Buildings and cells must correspond 1:1 by position, so that node `i` of
/// every graph and row `i` of every metric refer to the same `uID`.
pub struct Morphometrics<'a> {
    store: &'a mut Store,
    buildings: &'a Buildings,
    tessellation: &'a Tessellation,
    roads: Option<&'a Roads>,
    contiguity: ContiguityConfig,
    force: bool,
    values: BTreeMap<Metric, Vec<Option<f64>>>,
    graphs: AHashMap<String, Graph>,
}

impl<'a> Morphometrics<'a> {
    pub fn new(
        store: &'a mut Store,
        buildings: &'a Buildings,
        tessellation: &'a Tessellation,
        roads: Option<&'a Roads>,
        contiguity: &ContiguityConfig,
    ) -> Result<Self> {
        ensure!(
            buildings.uids() == tessellation.uids(),
            "[morphometrics] buildings and tessellation are not aligned ({} vs {} uIDs)",
            buildings.len(), tessellation.len(),
        );
        Ok(Self {
            store,
            buildings,
            tessellation,
            roads,
            contiguity: contiguity.clone(),
            force: false,
            values: BTreeMap::new(),
            graphs: AHashMap::new(),
        })
    }

    /// Recompute metrics and graphs even when the store already holds them.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Values of `metric` per uID, computing its dependencies first.
    pub fn compute(&mut self, metric: Metric) -> Result<&[Option<f64>]> {
        self.ensure(metric)?;
        self.value(metric)
    }

    /// Compute every metric. `strAli` is skipped when no roads are available.
    pub fn all(&mut self) -> Result<()> {
        for metric in Metric::ALL {
            if metric == Metric::StrAli && self.roads.is_none() {
                warn!("no roads: skipping {metric}");
                continue;
            }
            self.ensure(metric)?;
        }
        Ok(())
    }

    /// Merge every computed metric into one table keyed by uID and save it.
    pub fn combine(&mut self) -> Result<DataFrame> {
        let mut columns = vec![Column::new("uID".into(), self.buildings.uids())];
        for (metric, values) in &self.values {
            columns.push(Column::new(metric.code().into(), values));
        }
        let df = DataFrame::new(columns)?;
        self.store.put_table(COMBINED, &df)?;
        info!(metrics = self.values.len(), rows = df.height(), "combined morphometrics");
        Ok(df)
    }

    /// Road orientation samples, cached like the other metrics.
    pub fn road_orientation(&mut self, interval: f64) -> Result<DataFrame> {
        if !self.force && self.store.has_table(ROAD_ORIENTATION) {
            return self.store.get_table(ROAD_ORIENTATION);
        }
        let Some(roads) = self.roads else { bail!("[morphometrics] strOri requires roads") };
        let df = road_orientation(roads, interval)?;
        self.store.put_table(ROAD_ORIENTATION, &df)?;
        debug!(samples = df.height(), "computed strOri");
        Ok(df)
    }

    fn value(&self, metric: Metric) -> Result<&[Option<f64>]> {
        self.values.get(&metric)
            .map(Vec::as_slice)
            .ok_or_else(|| anyhow!("[morphometrics] {metric} has not been computed"))
    }

    fn ensure(&mut self, metric: Metric) -> Result<()> {
        if self.values.contains_key(&metric) { return Ok(()) }
        for &dependency in metric.dependencies() {
            self.ensure(dependency)?;
        }

        if !self.force {
            if let Some(values) = self.load(metric)? {
                debug!(%metric, "loaded cached metric");
                self.values.insert(metric, values);
                return Ok(());
            }
        }

        self.prepare_graphs(metric)?;
        let values = self.calculate(metric)?;
        let missing = values.iter().filter(|v| v.is_none()).count();
        if missing > 0 {
            debug!(%metric, missing, "metric has missing values");
        }

        let df = df!("uID" => self.buildings.uids(), metric.code() => &values)?;
        self.store.put_table(&metric_table(metric), &df)?;
        info!(%metric, "computed metric");
        self.values.insert(metric, values);
        Ok(())
    }

    /// Cached values, provided they cover exactly the current uIDs.
    fn load(&self, metric: Metric) -> Result<Option<Vec<Option<f64>>>> {
        let name = metric_table(metric);
        if !self.store.has_table(&name) { return Ok(None) }

        let df = self.store.get_table(&name)?;
        let uids = u32_column(&df, "uID").with_context(|| format!("[morphometrics] reading {name}"))?;
        if uids != self.buildings.uids() {
            warn!(%metric, "cached metric does not match the buildings; recomputing");
            return Ok(None);
        }
        Ok(Some(f64_column(&df, metric.code())?))
    }

    fn prepare_graphs(&mut self, metric: Metric) -> Result<()> {
        let order = self.contiguity.order;
        match metric {
            Metric::MtbAli | Metric::MtbNdi | Metric::MtcWne | Metric::MdcAre => self.graph(1, true)?,
            Metric::LtbIbd => {
                self.graph(1, true)?;
                self.graph(order, self.contiguity.include_lower)?;
            }
            Metric::LtcBua => {
                self.graph(order, self.contiguity.include_lower)?;
                self.building_graph()?;
            }
            Metric::LtcWrb => self.graph(order, true)?,
            _ => {}
        }
        Ok(())
    }

    /// Queen contiguity of the cells of order `order`, with or without the lower orders.
    fn graph(&mut self, order: usize, include_lower: bool) -> Result<()> {
        let name = queen_name(order, include_lower);
        if self.graphs.contains_key(&name) { return Ok(()) }

        let graph = if !self.force && self.store.has_graph(&name) {
            self.store.get_graph(&name)?
        } else {
            let graph = if order == 1 {
                queen(self.tessellation.geoms(), self.contiguity.tolerance)
            } else {
                self.graph(1, true)?;
                higher_order(self.cached_graph(&queen_name(1, true))?, order, include_lower)
            };
            self.store.put_graph(&name, &graph)?;
            graph
        };

        if graph.node_count() != self.tessellation.len() {
            bail!("[morphometrics] graph {name} has {} nodes for {} cells", graph.node_count(), self.tessellation.len());
        }
        debug!(%name, edges = graph.edge_count(), "contiguity graph ready");
        self.graphs.insert(name, graph);
        Ok(())
    }

    /// Queen contiguity of the buildings themselves.
    fn building_graph(&mut self) -> Result<()> {
        if self.graphs.contains_key(BUILDING_QUEEN) { return Ok(()) }
        let graph = if !self.force && self.store.has_graph(BUILDING_QUEEN) {
            self.store.get_graph(BUILDING_QUEEN)?
        } else {
            let graph = queen(self.buildings.geoms(), self.contiguity.tolerance);
            self.store.put_graph(BUILDING_QUEEN, &graph)?;
            graph
        };
        if graph.node_count() != self.buildings.len() {
            bail!("[morphometrics] building graph has {} nodes for {} buildings", graph.node_count(), self.buildings.len());
        }
        self.graphs.insert(BUILDING_QUEEN.to_string(), graph);
        Ok(())
    }

    fn cached_graph(&self, name: &str) -> Result<&Graph> {
        self.graphs.get(name).ok_or_else(|| anyhow!("[morphometrics] graph {name} is not loaded"))
    }

    fn calculate(&self, metric: Metric) -> Result<Vec<Option<f64>>> {
        let buildings = self.buildings.geoms();
        let cells = self.tessellation.geoms();
        let first = || self.cached_graph(&queen_name(1, true));
        let higher = |include_lower| self.cached_graph(&queen_name(self.contiguity.order, include_lower));
        let lower = self.contiguity.include_lower;

        Ok(match metric {
            Metric::SdbAre => areas(buildings),
            Metric::SsbElo => elongations(buildings),
            Metric::SsbCcd => corner_distance_deviations(buildings),
            Metric::StbOri => orientations(buildings),
            Metric::SdcAre => areas(cells),
            Metric::SscEri => rectangularity(cells),
            Metric::StcOri => orientations(cells),
            Metric::SicCar => ratio(self.value(Metric::SdbAre)?, self.value(Metric::SdcAre)?),
            Metric::MtbAli => alignment(self.value(Metric::StbOri)?, first()?),
            Metric::MtbNdi => neighbour_distance(buildings, first()?),
            Metric::MtbNdiLog => log_floor(self.value(Metric::MtbNdi)?),
            Metric::MtcWne => weighted_neighbours(cells, first()?),
            Metric::MdcAre => covered_area(self.value(Metric::SdcAre)?, first()?),
            Metric::LtbIbd => mean_interbuilding_distance(buildings, first()?, higher(lower)?),
            Metric::LtcBua => {
                let (_, structures) = connected_components(self.cached_graph(BUILDING_QUEEN)?);
                label_ratio(&structures, higher(lower)?)
            }
            Metric::LtcWrb => blocks_count(self.tessellation.bids(), self.value(Metric::SdcAre)?, higher(true)?),
            Metric::StrAli => {
                let Some(roads) = self.roads else { bail!("[morphometrics] {metric} requires roads") };
                street_alignment(self.value(Metric::StbOri)?, self.buildings.nids(), &street_orientations(roads))
            }
        })
    }
}
