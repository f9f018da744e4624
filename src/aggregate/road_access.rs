use anyhow::{ensure, Result};
use polars::prelude::*;
use tracing::info;

use crate::{
    aggregate::{group_by_cell, stats::{mean, mode}, GridStats},
    elements::{Buildings, Grid},
    road_access::RoadAccess,
};

/// `mean_buildings_in_between` and `mode_paved` per grid cell, over the
/// buildings that reached a road.
pub fn aggregate_road_access(buildings: &Buildings, access: &RoadAccess, grid: &Grid) -> Result<GridStats> {
    ensure!(
        buildings.uids() == access.uids(),
        "[aggregate] road access rows do not match the buildings",
    );
    let reached = |i: usize| access.buildings_in_between()[i].is_some();
    let groups = group_by_cell(&buildings.geoms().centroids(), grid.geoms(), reached);

    let mut grid_id = Vec::with_capacity(groups.len());
    let mut mean_between = Vec::with_capacity(groups.len());
    let mut mode_paved = Vec::with_capacity(groups.len());
    for (cell, members) in &groups {
        let between = members.iter().filter_map(|&b| access.buildings_in_between()[b]).map(f64::from).collect::<Vec<_>>();
        grid_id.push(grid.ids()[*cell]);
        mean_between.push(mean(&between));
        mode_paved.push(mode(members.iter().filter_map(|&b| access.paved()[b])));
    }

    let table = df!(
        "grid_id" => grid_id,
        "mean_buildings_in_between" => mean_between,
        "mode_paved" => mode_paved,
    )?;
    info!(cells = table.height(), "aggregated road access");
    Ok(GridStats { cells: groups.into_iter().map(|(c, _)| c).collect(), table })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{common::{f64_column, opt_u32_column}, config::RoadAccessConfig, elements::Roads, geom::Geometries, road_access::road_access};
    use geo::{polygon, LineString, MultiPolygon};

    fn rect(x: f64, y: f64, w: f64, h: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![(x: x, y: y), (x: x + w, y: y), (x: x + w, y: y + h), (x: x, y: y + h), (x: x, y: y)]])
    }

    #[test]
    fn mean_and_mode_per_cell() {
        let shapes = vec![rect(10.0, 5.0, 10.0, 10.0), rect(10.0, 20.0, 10.0, 10.0), rect(10.0, 35.0, 10.0, 10.0), rect(150.0, 5.0, 10.0, 10.0)];
        let buildings = Buildings::new(Geometries::new(shapes, 32632));
        let roads = Roads::new(
            vec![LineString::from(vec![(0.0, 0.0), (100.0, 0.0)]), LineString::from(vec![(100.0, 0.0), (200.0, 0.0)])],
            vec![Some("paved".into()), Some("unpaved".into())],
        ).unwrap();
        let access = road_access(&buildings, &roads, &RoadAccessConfig::default());
        let grid = Grid::new(Geometries::new(vec![rect(0.0, 0.0, 100.0, 100.0), rect(100.0, 0.0, 100.0, 100.0)], 32632));

        let stats = aggregate_road_access(&buildings, &access, &grid).unwrap();
        let table = stats.table();
        assert_eq!(f64_column(table, "mean_buildings_in_between").unwrap(), vec![Some(1.0), Some(0.0)]);
        assert_eq!(opt_u32_column(table, "mode_paved").unwrap(), vec![Some(1), Some(0)]);
    }
}
