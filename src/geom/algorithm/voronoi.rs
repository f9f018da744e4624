use geo::{algorithm::orient::Direction, Contains, Coord, InteriorPoint, LineString, MultiPolygon, Orient, Point, Polygon};
use rstar::{primitives::GeomWithData, RTree};

use super::{distance::coord_distance, lines::densify, offset::{convex_offset, union_all}};

type Generator = GeomWithData<[f64; 2], usize>;

/// Points along the exterior of `polygon`, spaced at most `segment` apart and
/// moved `shrink` inwards. Points that do not end up strictly inside are dropped;
/// when none survive the polygon's interior point is used instead.
pub(crate) fn generator_points(polygon: &Polygon<f64>, shrink: f64, segment: f64) -> Vec<Coord<f64>> {
    let oriented = polygon.orient(Direction::Default);
    let mut ring = densify(&oriented.exterior().0, segment);
    ring.pop(); // Remove the duplicate closing coord.
    let n = ring.len();
    if n < 3 { return polygon.interior_point().map(|p| vec![p.0]).unwrap_or_default() }

    let points = (0..n)
        .filter_map(|k| {
            if shrink <= 0.0 { return Some(ring[k]) }
            let tangent = ring[(k + 1) % n] - ring[(k + n - 1) % n];
            let length = tangent.x.hypot(tangent.y);
            if length == 0.0 { return None }
            // Exterior rings run counter-clockwise, so the interior is on the left.
            let inward = Coord { x: -tangent.y / length, y: tangent.x / length };
            Some(ring[k] + inward * shrink)
        })
        .filter(|c| shrink <= 0.0 || polygon.contains(&Point::from(*c)))
        .collect::<Vec<_>>();

    if points.is_empty() {
        polygon.interior_point().map(|p| vec![p.0]).unwrap_or_default()
    } else {
        points
    }
}

/// Clip a convex polygon (open ring) to the half-plane of points closer to `p` than to `q`.
fn clip(cell: &[Coord<f64>], p: Coord<f64>, q: Coord<f64>) -> Vec<Coord<f64>> {
    let normal = q - p;
    let mid = Coord { x: (p.x + q.x) / 2.0, y: (p.y + q.y) / 2.0 };
    let side = |c: Coord<f64>| (c.x - mid.x) * normal.x + (c.y - mid.y) * normal.y;

    let mut out = Vec::with_capacity(cell.len() + 1);
    for (k, &a) in cell.iter().enumerate() {
        let b = cell[(k + 1) % cell.len()];
        let (sa, sb) = (side(a), side(b));
        if sa <= 0.0 { out.push(a) }
        if (sa < 0.0 && sb > 0.0) || (sa > 0.0 && sb < 0.0) {
            let t = sa / (sa - sb);
            out.push(Coord { x: a.x + t * (b.x - a.x), y: a.y + t * (b.y - a.y) });
        }
    }
    out
}

#[inline]
fn radius(cell: &[Coord<f64>], p: Coord<f64>) -> f64 {
    cell.iter().map(|c| coord_distance(*c, p)).fold(0.0, f64::max)
}

/// Voronoi region of every shape: the area closer to its generator points than to
/// those of any other shape, limited to `limit` around the shape's convex hull.
/// Shapes without generator points get `None`.
pub(crate) fn voronoi_regions(shapes: &[MultiPolygon<f64>], shrink: f64, segment: f64, limit: f64) -> Vec<Option<MultiPolygon<f64>>> {
    let generators = shapes.iter()
        .map(|shape| shape.0.iter()
            .flat_map(|polygon| generator_points(polygon, shrink, segment))
            .collect::<Vec<_>>())
        .collect::<Vec<_>>();

    let tree = RTree::bulk_load(
        generators.iter().enumerate()
            .flat_map(|(owner, points)| points.iter().map(move |c| Generator::new([c.x, c.y], owner)))
            .collect()
    );

    shapes.iter().zip(&generators).enumerate()
        .map(|(i, (shape, points))| {
            if points.is_empty() { return None }
            let mut bound = convex_offset(shape, limit).exterior().0.clone();
            bound.pop();

            let cells = points.iter()
                .filter_map(|&p| {
                    let mut cell = bound.clone();
                    let mut reach = radius(&cell, p);
                    for other in tree.nearest_neighbor_iter(&[p.x, p.y]) {
                        if other.data == i { continue }
                        let q = Coord { x: other.geom()[0], y: other.geom()[1] };
                        let d = coord_distance(p, q);
                        if d / 2.0 > reach { break }
                        if d == 0.0 { continue }

                        cell = clip(&cell, p, q);
                        if cell.len() < 3 { return None }
                        reach = radius(&cell, p);
                    }

                    let mut ring = cell;
                    ring.push(ring[0]);
                    Some(MultiPolygon::new(vec![Polygon::new(LineString::new(ring), vec![])]))
                })
                .collect::<Vec<_>>();

            let region = union_all(cells);
            (!region.0.is_empty()).then_some(region)
        })
        .collect()
}
