use ahash::AHashMap;
use anyhow::{Context, Result};
use geo::{Area, BooleanOps};
use polars::prelude::*;
use tracing::{info, warn};

use crate::{
    aggregate::{group_by_cell, stats::{entropy, mean, median, sample_std}, GridStats},
    common::{f64_column, u32_column},
    elements::{Buildings, Grid, Tessellation},
    geom::Geometries,
    morph::Metric,
};

/// Metrics summarised by their median per grid cell.
pub const MEDIAN_METRICS: [Metric; 13] = [
    Metric::SdbAre, Metric::SsbElo, Metric::SsbCcd, Metric::MtbAli, Metric::MtbNdi,
    Metric::LtbIbd, Metric::LtcBua, Metric::SdcAre, Metric::SscEri, Metric::SicCar,
    Metric::MtcWne, Metric::MdcAre, Metric::LtcWrb,
];

/// Metrics summarised by their spread (std and entropy) per grid cell.
pub const VARIATION_METRICS: [Metric; 2] = [Metric::StbOri, Metric::StcOri];

/// Total and largest area of the intersections of `shapes` with grid cell `cell`.
fn intersected_areas(grid: &Geometries, cell: usize, shapes: &Geometries, keep: &[bool]) -> (f64, f64) {
    let cell_shape = grid.shape(cell);
    shapes.intersecting(cell_shape).into_iter()
        .filter(|&i| keep[i])
        .map(|i| cell_shape.intersection(shapes.shape(i)).unsigned_area())
        .fold((0.0, 0.0), |(sum, max), a| (sum + a, f64::max(max, a)))
}

/// Summarise building metrics per grid cell.
///
/// `metrics` holds one row per building (`uID` plus one column per metric code).
/// Buildings join the cell containing their centroid, and those missing any of
/// the aggregated metrics are left out of the cell's summaries. The intersected
/// areas `sum_sdbAre`, `max_sdbAre` and `sum_sdcAre` cover every building and cell.
pub fn aggregate_morphometrics(
    buildings: &Buildings,
    tessellation: &Tessellation,
    metrics: &DataFrame,
    grid: &Grid,
) -> Result<GridStats> {
    let row_of = u32_column(metrics, "uID")?.into_iter()
        .enumerate()
        .map(|(row, uid)| (uid, row))
        .collect::<AHashMap<_, _>>();

    let aggregated = MEDIAN_METRICS.iter().chain(&VARIATION_METRICS).copied().collect::<Vec<_>>();
    let columns = aggregated.iter()
        .map(|m| f64_column(metrics, m.code()).with_context(|| format!("[aggregate] metric {m} is missing")))
        .collect::<Result<Vec<_>>>()?;

    // values[b][k]: metric k of building b, when all are present.
    let values = buildings.uids().iter()
        .map(|uid| {
            let row = *row_of.get(uid)?;
            columns.iter().map(|c| c[row]).collect::<Option<Vec<f64>>>()
        })
        .collect::<Vec<_>>();
    let complete = values.iter().map(Option::is_some).collect::<Vec<_>>();
    let dropped = complete.iter().filter(|c| !**c).count();
    if dropped > 0 {
        warn!(dropped, "buildings with missing metrics left out of the cell summaries");
    }

    let groups = group_by_cell(&buildings.geoms().centroids(), grid.geoms(), |i| complete[i]);
    let all_buildings = vec![true; buildings.len()];
    let all_cells = vec![true; tessellation.len()];

    let mut grid_id = Vec::with_capacity(groups.len());
    let mut bcount = Vec::with_capacity(groups.len());
    let mut medians = vec![Vec::with_capacity(groups.len()); MEDIAN_METRICS.len()];
    let mut stds = vec![Vec::with_capacity(groups.len()); VARIATION_METRICS.len()];
    let mut entropies = vec![Vec::with_capacity(groups.len()); VARIATION_METRICS.len()];
    let (mut mn_area, mut sum_area, mut max_area, mut sum_cell_area) = (vec![], vec![], vec![], vec![]);

    for (cell, members) in &groups {
        let sample = |k: usize| members.iter().filter_map(|&b| values[b].as_ref().map(|v| v[k])).collect::<Vec<_>>();

        grid_id.push(grid.ids()[*cell]);
        bcount.push(members.len() as u32);
        for (k, column) in medians.iter_mut().enumerate() {
            column.push(median(&sample(k)));
        }
        for (j, (std, ent)) in stds.iter_mut().zip(entropies.iter_mut()).enumerate() {
            let spread = sample(MEDIAN_METRICS.len() + j);
            std.push(sample_std(&spread));
            ent.push(entropy(&spread));
        }
        mn_area.push(mean(&sample(0)));

        let (sum, max) = intersected_areas(grid.geoms(), *cell, buildings.geoms(), &all_buildings);
        sum_area.push(sum);
        max_area.push(max);
        sum_cell_area.push(intersected_areas(grid.geoms(), *cell, tessellation.geoms(), &all_cells).0);
    }

    let mut columns = vec![Column::new("grid_id".into(), &grid_id)];
    for (metric, column) in MEDIAN_METRICS.iter().zip(&medians) {
        columns.push(Column::new(format!("md_{}", metric.code()).into(), column));
    }
    for (metric, column) in VARIATION_METRICS.iter().zip(&stds) {
        columns.push(Column::new(format!("sd_{}", metric.code()).into(), column));
    }
    for (metric, column) in VARIATION_METRICS.iter().zip(&entropies) {
        columns.push(Column::new(format!("entropy_{}", metric.code()).into(), column));
    }
    columns.push(Column::new("bcount".into(), &bcount));
    columns.push(Column::new("mn_sdbAre".into(), &mn_area));
    columns.push(Column::new("sum_sdbAre".into(), &sum_area));
    columns.push(Column::new("max_sdbAre".into(), &max_area));
    columns.push(Column::new("sum_sdcAre".into(), &sum_cell_area));
    for (metric, column) in VARIATION_METRICS.iter().zip(&entropies) {
        let normalised = column.iter().zip(&bcount)
            .map(|(e, &n)| e / (n as f64).ln_1p())
            .collect::<Vec<_>>();
        columns.push(Column::new(format!("nentropy_{}", metric.code()).into(), normalised));
    }

    let table = DataFrame::new(columns)?;
    info!(cells = table.height(), buildings = buildings.len() - dropped, "aggregated morphometrics");
    Ok(GridStats { cells: groups.into_iter().map(|(c, _)| c).collect(), table })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};

    fn rect(x: f64, y: f64, w: f64, h: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![(x: x, y: y), (x: x + w, y: y), (x: x + w, y: y + h), (x: x, y: y + h), (x: x, y: y)]])
    }

    fn metrics(uids: &[u32], areas: &[Option<f64>], orientations: &[f64]) -> DataFrame {
        let mut columns = vec![Column::new("uID".into(), uids)];
        for metric in MEDIAN_METRICS {
            let values = if metric == Metric::SdbAre { areas.to_vec() } else { vec![Some(1.0); uids.len()] };
            columns.push(Column::new(metric.code().into(), values));
        }
        for metric in VARIATION_METRICS {
            columns.push(Column::new(metric.code().into(), orientations));
        }
        DataFrame::new(columns).unwrap()
    }

    #[test]
    fn cell_statistics() {
        // Three buildings in the first 100 m cell, one straddling into the second, none in the third.
        let shapes = vec![rect(10.0, 10.0, 10.0, 10.0), rect(40.0, 10.0, 10.0, 20.0), rect(60.0, 60.0, 10.0, 10.0), rect(95.0, 50.0, 20.0, 10.0)];
        let buildings = Buildings::new(Geometries::new(shapes.clone(), 32632));
        let tessellation = Tessellation::new(Geometries::new(shapes, 32632), vec![0, 1, 2, 3], vec![None; 4]).unwrap();
        let grid = Grid::new(Geometries::new(vec![rect(0.0, 0.0, 100.0, 100.0), rect(100.0, 0.0, 100.0, 100.0), rect(200.0, 0.0, 100.0, 100.0)], 32632));

        let df = metrics(&[0, 1, 2, 3], &[Some(100.0), Some(200.0), None, Some(200.0)], &[0.0, 10.0, 10.0, 20.0]);
        let stats = aggregate_morphometrics(&buildings, &tessellation, &df, &grid).unwrap();
        let table = stats.table();

        // Building 2 is dropped; building 3's centroid lies in the second cell.
        assert_eq!(stats.len(), 2);
        assert_eq!(u32_column(table, "grid_id").unwrap(), vec![1, 2]);
        assert_eq!(u32_column(table, "bcount").unwrap(), vec![2, 1]);
        assert_eq!(f64_column(table, "md_sdbAre").unwrap(), vec![Some(150.0), Some(200.0)]);
        assert_eq!(f64_column(table, "mn_sdbAre").unwrap(), vec![Some(150.0), Some(200.0)]);
        assert_eq!(f64_column(table, "sd_stbOri").unwrap()[1], Some(0.0));
        assert_eq!(f64_column(table, "entropy_stbOri").unwrap(), vec![Some(1.0), Some(0.0)]);

        // Intersected areas count building 2 despite its missing metric.
        let sum = f64_column(table, "sum_sdbAre").unwrap();
        let max = f64_column(table, "max_sdbAre").unwrap();
        assert!((sum[0].unwrap() - 450.0).abs() < 1e-6, "{sum:?}");
        assert!((max[0].unwrap() - 200.0).abs() < 1e-6);
        assert!((sum[1].unwrap() - 150.0).abs() < 1e-6);
        let cells = f64_column(table, "sum_sdcAre").unwrap();
        assert!((cells[0].unwrap() - 450.0).abs() < 1e-6);

        let nentropy = f64_column(table, "nentropy_stbOri").unwrap();
        assert!((nentropy[0].unwrap() - 1.0 / 3f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn missing_metric_column_is_an_error() {
        let buildings = Buildings::new(Geometries::new(vec![rect(0.0, 0.0, 1.0, 1.0)], 32632));
        let tessellation = Tessellation::new(buildings.geoms().clone(), vec![0], vec![None]).unwrap();
        let grid = Grid::new(Geometries::new(vec![rect(0.0, 0.0, 10.0, 10.0)], 32632));
        let df = df!("uID" => [0u32], "sdbAre" => [1.0]).unwrap();
        assert!(aggregate_morphometrics(&buildings, &tessellation, &df, &grid).is_err());
    }
}
