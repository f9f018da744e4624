use anyhow::Result;
use geo::Relate;

use crate::{geom::{algorithm::{shape_distance, shared_boundary_length}, Geometries}, graph::Graph};

/// Queen contiguity: shapes whose boundaries touch (or lie within `tolerance`).
pub fn queen(geoms: &Geometries, tolerance: f64) -> Graph {
    let mut adjacencies = vec![Vec::new(); geoms.len()];
    for i in 0..geoms.len() {
        let mut candidates = geoms.candidates(i, tolerance).filter(|&j| j > i).collect::<Vec<_>>();
        candidates.sort_unstable();

        for j in candidates {
            if shape_distance(geoms.shape(i), geoms.shape(j)) <= tolerance {
                adjacencies[i].push(j as u32);
                adjacencies[j].push(i as u32);
            }
        }
    }
    adjacencies.iter_mut().for_each(|row| row.sort_unstable());
    Graph::from_adjacencies(&adjacencies)
}

/// Rook contiguity: shapes sharing a boundary segment of positive length.
/// With `tolerance` > 0, segments within the tolerance count as shared.
pub fn rook(geoms: &Geometries, tolerance: f64) -> Result<Graph> {
    let mut adjacencies = vec![Vec::new(); geoms.len()];
    for i in 0..geoms.len() {
        let mut candidates = geoms.candidates(i, tolerance).filter(|&j| j > i).collect::<Vec<_>>();
        candidates.sort_unstable();

        for j in candidates {
            let (a, b) = (geoms.shape(i), geoms.shape(j));
            let shared = if tolerance > 0.0 {
                shared_boundary_length(a, b, tolerance) > 0.0 || shared_boundary_length(b, a, tolerance) > 0.0
            } else {
                // touches, and boundary/boundary has dimension 1 (index 4 of DE-9IM)
                let im = a.relate(b);
                im.is_touches() && im.matches("****1****")?
            };
            if shared {
                adjacencies[i].push(j as u32);
                adjacencies[j].push(i as u32);
            }
        }
    }
    adjacencies.iter_mut().for_each(|row| row.sort_unstable());
    Ok(Graph::from_adjacencies(&adjacencies))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};

    fn square(x: f64, y: f64, s: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x, y: y), (x: x + s, y: y), (x: x + s, y: y + s), (x: x, y: y + s), (x: x, y: y),
        ]])
    }

    /// 2x2 lattice of unit squares plus one detached square.
    fn lattice() -> Geometries {
        Geometries::new(vec![
            square(0.0, 0.0, 1.0), square(1.0, 0.0, 1.0),
            square(0.0, 1.0, 1.0), square(1.0, 1.0, 1.0),
            square(5.0, 5.0, 1.0),
        ], 32632)
    }

    #[test]
    fn queen_includes_corner_neighbours() {
        let graph = queen(&lattice(), 0.0);
        assert_eq!(graph.edges(0).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(graph.degree(4), 0);
    }

    #[test]
    fn rook_excludes_corner_neighbours() {
        let graph = rook(&lattice(), 0.0).unwrap();
        assert_eq!(graph.edges(0).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(graph.edges(3).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn queen_tolerance_bridges_small_gaps() {
        let geoms = Geometries::new(vec![square(0.0, 0.0, 1.0), square(1.05, 0.0, 1.0)], 32632);
        assert_eq!(queen(&geoms, 0.0).edge_count(), 0);
        assert_eq!(queen(&geoms, 0.1).edge_count(), 2);
        assert_eq!(rook(&geoms, 0.1).unwrap().edge_count(), 2);
    }
}
