//! Characters computed over contiguity neighbourhoods.
//!
//! Graphs are indexed like the element collections: node `i` is building `i`
//! and cell `i` (buildings and cells are aligned 1:1).

use ahash::AHashSet;

use crate::{
    geom::{algorithm::{perimeter, shape_distance}, Geometries},
    graph::Graph,
    morph::primary::finite,
};

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64).and_then(finite)
}

/// Mean absolute difference between a value and the values of its neighbours.
pub(crate) fn alignment(values: &[Option<f64>], graph: &Graph) -> Vec<Option<f64>> {
    (0..graph.node_count())
        .map(|i| {
            let own = values[i]?;
            mean(graph.edges(i).filter_map(|j| values[j]).map(|v| (v - own).abs()))
        })
        .collect()
}

/// Mean distance from each shape to the shapes of its neighbours.
pub(crate) fn neighbour_distance(geoms: &Geometries, graph: &Graph) -> Vec<Option<f64>> {
    (0..graph.node_count())
        .map(|i| mean(graph.edges(i).map(|j| shape_distance(geoms.shape(i), geoms.shape(j)))))
        .collect()
}

/// Natural log, with non-positive values mapped to 0 and results floored at -5.
pub(crate) fn log_floor(values: &[Option<f64>]) -> Vec<Option<f64>> {
    values.iter()
        .map(|v| v.map(|v| if v <= 0.0 { 0.0 } else { v.ln().max(-5.0) }))
        .collect()
}

/// Number of neighbours divided by the perimeter of the shape.
pub(crate) fn weighted_neighbours(geoms: &Geometries, graph: &Graph) -> Vec<Option<f64>> {
    (0..graph.node_count())
        .map(|i| {
            let p = perimeter(geoms.shape(i));
            (p > 0.0).then(|| graph.degree(i) as f64 / p)
        })
        .collect()
}

/// Sum of a value over a node and its neighbours.
pub(crate) fn covered_area(areas: &[Option<f64>], graph: &Graph) -> Vec<Option<f64>> {
    (0..graph.node_count())
        .map(|i| std::iter::once(i).chain(graph.edges(i)).map(|j| areas[j]).sum())
        .collect()
}

/// For each node, the mean building distance over first-order edges whose
/// both ends lie within the node's higher-order neighbourhood.
pub(crate) fn mean_interbuilding_distance(geoms: &Geometries, first: &Graph, higher: &Graph) -> Vec<Option<f64>> {
    let distances = (0..first.node_count())
        .map(|i| first.edges(i).map(|j| shape_distance(geoms.shape(i), geoms.shape(j))).collect::<Vec<_>>())
        .collect::<Vec<_>>();

    (0..higher.node_count())
        .map(|i| {
            let vicinity = std::iter::once(i).chain(higher.edges(i)).collect::<AHashSet<_>>();
            mean(vicinity.iter().flat_map(|&a| {
                first.edges(a).zip(&distances[a])
                    .filter(|(b, _)| vicinity.contains(b))
                    .map(|(_, &d)| d)
            }))
        })
        .collect()
}

/// Distinct labels within a node's neighbourhood (itself included) over its size.
pub(crate) fn label_ratio(labels: &[u32], higher: &Graph) -> Vec<Option<f64>> {
    (0..higher.node_count())
        .map(|i| {
            let vicinity = std::iter::once(i).chain(higher.edges(i)).collect::<Vec<_>>();
            let distinct = vicinity.iter().map(|&j| labels[j]).collect::<AHashSet<_>>();
            Some(distinct.len() as f64 / vicinity.len() as f64)
        })
        .collect()
}

/// Distinct block ids within a node's neighbourhood over the total area of that neighbourhood.
pub(crate) fn blocks_count(bids: &[Option<u32>], areas: &[Option<f64>], higher: &Graph) -> Vec<Option<f64>> {
    (0..higher.node_count())
        .map(|i| {
            let vicinity = std::iter::once(i).chain(higher.edges(i)).collect::<Vec<_>>();
            let blocks = vicinity.iter().filter_map(|&j| bids[j]).collect::<AHashSet<_>>();
            let area = vicinity.iter().map(|&j| areas[j]).sum::<Option<f64>>()?;
            (area > 0.0).then(|| blocks.len() as f64 / area)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};

    fn square(x: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![(x: x, y: 0.0), (x: x + 10.0, y: 0.0), (x: x + 10.0, y: 10.0), (x: x, y: 10.0), (x: x, y: 0.0)]])
    }

    /// Path 0 - 1 - 2 - 3, plus isolated node 4.
    fn path() -> Graph {
        Graph::from_adjacencies(&[vec![1], vec![0, 2], vec![1, 3], vec![2], vec![]])
    }

    #[test]
    fn alignment_and_isolated_nodes() {
        let values = [Some(10.0), Some(20.0), Some(40.0), None, Some(5.0)];
        assert_eq!(alignment(&values, &path()), vec![Some(10.0), Some(15.0), Some(20.0), None, None]);
    }

    #[test]
    fn distances_between_spaced_squares() {
        // Squares 10 wide with 5 m gaps.
        let geoms = Geometries::new((0..5).map(|i| square(i as f64 * 15.0)).collect(), 32632);
        let nd = neighbour_distance(&geoms, &path());
        assert_eq!(nd[0], Some(5.0));
        assert_eq!(nd[4], None);

        let log = log_floor(&[Some(0.0), Some(1.0), Some(1e-9), None]);
        assert_eq!(log[0], Some(0.0));
        assert_eq!(log[1], Some(0.0));
        assert_eq!(log[2], Some(-5.0));
        assert_eq!(log[3], None);
    }

    #[test]
    fn neighbour_weights_and_covered_area() {
        let geoms = Geometries::new((0..5).map(|i| square(i as f64 * 10.0)).collect(), 32632);
        let graph = path();
        assert_eq!(weighted_neighbours(&geoms, &graph)[1], Some(2.0 / 40.0));
        let areas = vec![Some(100.0); 5];
        assert_eq!(covered_area(&areas, &graph), vec![Some(200.0), Some(300.0), Some(300.0), Some(200.0), Some(100.0)]);
    }

    #[test]
    fn interbuilding_distance_within_vicinity() {
        let geoms = Geometries::new((0..5).map(|i| square(i as f64 * 15.0)).collect(), 32632);
        let first = path();
        let higher = crate::graph::higher_order(&first, 1, true);
        let ibd = mean_interbuilding_distance(&geoms, &first, &higher);
        assert_eq!(ibd[1], Some(5.0));
        assert_eq!(ibd[4], None);
    }

    #[test]
    fn ratios_over_neighbourhoods() {
        let higher = crate::graph::higher_order(&path(), 3, true);
        // Structures: {0, 1} joined, 2 and 3 alone.
        assert_eq!(label_ratio(&[0, 0, 1, 2, 3], &higher)[0], Some(3.0 / 4.0));

        let bids = [Some(0), Some(0), Some(1), None, Some(2)];
        let areas = [Some(100.0); 5];
        assert_eq!(blocks_count(&bids, &areas, &higher)[0], Some(2.0 / 400.0));
        assert_eq!(blocks_count(&bids, &areas, &higher)[4], Some(1.0 / 100.0));
    }
}
