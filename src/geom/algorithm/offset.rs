use geo::{BooleanOps, ConvexHull, Coord, CoordsIter, MultiPoint, MultiPolygon, Point, Polygon};

/// Number of vertices used to approximate a circle.
const ARC_SEGMENTS: usize = 32;

/// Convex hull of `shape` grown by `distance` (Minkowski sum with an arc-approximated disc).
pub(crate) fn convex_offset(shape: &MultiPolygon<f64>, distance: f64) -> Polygon<f64> {
    let disc = (0..ARC_SEGMENTS)
        .map(|k| {
            let theta = std::f64::consts::TAU * k as f64 / ARC_SEGMENTS as f64;
            Coord { x: distance * theta.cos(), y: distance * theta.sin() }
        })
        .collect::<Vec<_>>();

    let hull = shape.convex_hull();
    let points = hull.exterior_coords_iter()
        .flat_map(|c| disc.iter().map(move |d| Point::from(c + *d)))
        .collect::<Vec<_>>();
    MultiPoint::new(points).convex_hull()
}

/// Union of many shapes by balanced pairwise merging.
pub(crate) fn union_all(mut shapes: Vec<MultiPolygon<f64>>) -> MultiPolygon<f64> {
    if shapes.is_empty() { return MultiPolygon::new(vec![]) }
    while shapes.len() > 1 {
        shapes = shapes.chunks(2)
            .map(|pair| match pair {
                [a, b] => a.union(b),
                [a] => a.clone(),
                _ => MultiPolygon::new(vec![]),
            })
            .collect();
    }
    shapes.pop().unwrap_or_else(|| MultiPolygon::new(vec![]))
}
