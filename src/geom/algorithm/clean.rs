use ahash::AHashSet;
use geo::{algorithm::orient::Direction, Area, BooleanOps, Coord, LineString, MultiPolygon, Orient, Polygon};

/// Rotate a closed ring so that it starts at its lexicographically smallest coordinate.
fn rotate_ring(ring: &LineString<f64>) -> Vec<Coord<f64>> {
    let mut coords = ring.0.clone();
    if coords.len() > 1 && coords.first() == coords.last() { coords.pop(); }

    let start = coords.iter().enumerate()
        .min_by(|(_, a), (_, b)| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)))
        .map(|(i, _)| i)
        .unwrap_or(0);
    coords.rotate_left(start);
    coords
}

/// Canonical form of a polygon: exterior counter-clockwise, holes clockwise,
/// every ring starting at its smallest vertex, holes sorted.
pub(crate) fn normalize(polygon: &Polygon<f64>) -> Polygon<f64> {
    let oriented = polygon.orient(Direction::Default);
    let close = |mut coords: Vec<Coord<f64>>| {
        if let Some(&first) = coords.first() { coords.push(first) }
        LineString::new(coords)
    };

    let mut holes = oriented.interiors().iter().map(rotate_ring).collect::<Vec<_>>();
    holes.sort_by(|a, b| {
        let (a, b) = (a.first(), b.first());
        a.map(|c| (c.x, c.y)).partial_cmp(&b.map(|c| (c.x, c.y))).unwrap_or(std::cmp::Ordering::Equal)
    });

    Polygon::new(close(rotate_ring(oriented.exterior())), holes.into_iter().map(close).collect())
}

/// Hashable key of a normalized shape; equal keys mean identical geometries.
fn geometry_key(shape: &MultiPolygon<f64>) -> Vec<(u64, u64)> {
    const RING_END: (u64, u64) = (u64::MAX, u64::MAX);
    const PART_END: (u64, u64) = (u64::MAX, 0);

    shape.0.iter()
        .flat_map(|polygon| {
            let normalized = normalize(polygon);
            std::iter::once(normalized.exterior())
                .chain(normalized.interiors())
                .flat_map(|ring| ring.0.iter().map(|c| (c.x.to_bits(), c.y.to_bits())).chain([RING_END]))
                .chain([PART_END])
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Indices of the first occurrence of every distinct geometry.
pub(crate) fn unique_indices(shapes: &[MultiPolygon<f64>]) -> Vec<usize> {
    let mut seen = AHashSet::with_capacity(shapes.len());
    shapes.iter().enumerate()
        .filter(|(_, shape)| seen.insert(geometry_key(shape)))
        .map(|(i, _)| i)
        .collect()
}

/// Repair self-intersections and ring orientation by self-union.
pub(crate) fn repair(shape: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    shape.union(&MultiPolygon::new(vec![]))
}

/// Split a multipolygon into its non-empty parts.
pub(crate) fn explode(shape: MultiPolygon<f64>) -> impl Iterator<Item = Polygon<f64>> {
    shape.0.into_iter().filter(|polygon| polygon.unsigned_area() > 0.0)
}

/// Remove all holes from a polygon.
#[inline]
pub(crate) fn fill_holes(polygon: &Polygon<f64>) -> Polygon<f64> {
    Polygon::new(polygon.exterior().clone(), vec![])
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn reversed_and_rotated_rings_are_duplicates() {
        let a = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0), (x: 0.0, y: 0.0)];
        let b = polygon![(x: 1.0, y: 1.0), (x: 1.0, y: 0.0), (x: 0.0, y: 0.0), (x: 0.0, y: 1.0), (x: 1.0, y: 1.0)];
        let c = polygon![(x: 5.0, y: 0.0), (x: 6.0, y: 0.0), (x: 6.0, y: 1.0), (x: 5.0, y: 0.0)];
        let shapes = [a, b, c].map(|p| MultiPolygon::new(vec![p]));
        assert_eq!(unique_indices(&shapes), vec![0, 2]);
    }

    #[test]
    fn bowtie_is_repaired_into_two_parts() {
        let bowtie = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0), (x: 2.0, y: 2.0), (x: 2.0, y: 0.0), (x: 0.0, y: 2.0), (x: 0.0, y: 0.0),
        ]]);
        let parts = explode(repair(&bowtie)).collect::<Vec<_>>();
        assert_eq!(parts.len(), 2);
        let area = parts.iter().map(|p| p.unsigned_area()).sum::<f64>();
        assert!((area - 2.0).abs() < 1e-9);
    }

    #[test]
    fn holes_are_filled() {
        let with_hole = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.0)]),
            vec![LineString::from(vec![(1.0, 1.0), (2.0, 1.0), (2.0, 2.0), (1.0, 1.0)])],
        );
        assert_eq!(fill_holes(&with_hole).unsigned_area(), 16.0);
    }
}
