//! Aggregation of per-building values onto the analysis grid.

mod morphometrics;
mod road_access;
mod stats;

pub use morphometrics::{aggregate_morphometrics, MEDIAN_METRICS, VARIATION_METRICS};
pub use road_access::aggregate_road_access;

use anyhow::Result;
use geo::Point;
use polars::prelude::*;

use crate::{elements::Grid, geom::Geometries, store::Store};

/// Statistics for the grid cells that received at least one building, in grid order.
#[derive(Debug, Clone)]
pub struct GridStats {
    cells: Vec<usize>,
    table: DataFrame,
}

impl GridStats {
    #[inline] pub fn table(&self) -> &DataFrame { &self.table }

    #[inline] pub fn len(&self) -> usize { self.cells.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.cells.is_empty() }

    /// Persist the table together with the geometry of its grid cells.
    pub fn save(&self, store: &mut Store, grid: &Grid, name: &str) -> Result<()> {
        let shapes = self.cells.iter().map(|&c| grid.geoms().shape(c).clone()).collect::<Vec<_>>();
        store.put_polygons(name, &shapes, &self.table)
    }
}

/// Groups of building indices per grid cell, for cells containing at least one
/// centroid. A centroid on a shared edge joins the first matching cell.
fn group_by_cell(centroids: &[Point<f64>], grid: &Geometries, keep: impl Fn(usize) -> bool) -> Vec<(usize, Vec<usize>)> {
    let mut members = vec![Vec::new(); grid.len()];
    for (i, point) in centroids.iter().enumerate() {
        if !keep(i) { continue }
        if let Some(&cell) = grid.intersecting(point).first() {
            members[cell].push(i);
        }
    }
    members.into_iter().enumerate().filter(|(_, m)| !m.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};

    fn square(x: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![(x: x, y: 0.0), (x: x + 10.0, y: 0.0), (x: x + 10.0, y: 10.0), (x: x, y: 10.0), (x: x, y: 0.0)]])
    }

    #[test]
    fn centroids_join_first_matching_cell() {
        let grid = Geometries::new(vec![square(0.0), square(10.0), square(20.0)], 32632);
        let points = [Point::new(5.0, 5.0), Point::new(10.0, 5.0), Point::new(25.0, 5.0), Point::new(50.0, 5.0)];
        let groups = group_by_cell(&points, &grid, |_| true);
        assert_eq!(groups, vec![(0, vec![0, 1]), (2, vec![2])]);

        let groups = group_by_cell(&points, &grid, |i| i != 2);
        assert_eq!(groups, vec![(0, vec![0, 1])]);
    }
}
