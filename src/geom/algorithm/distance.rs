use geo::{Coord, Intersects, Line, LineString, MultiPolygon, Polygon};

/// Euclidean distance between two coordinates.
#[inline]
pub(crate) fn coord_distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// Distance from `p` to the closed segment `line`, with the closest point on it.
pub(crate) fn closest_on_segment(p: Coord<f64>, line: &Line<f64>) -> (f64, Coord<f64>) {
    let d = line.delta();
    let len2 = d.x * d.x + d.y * d.y;
    if len2 == 0.0 { return (coord_distance(p, line.start), line.start) }

    let t = (((p.x - line.start.x) * d.x + (p.y - line.start.y) * d.y) / len2).clamp(0.0, 1.0);
    let q = Coord { x: line.start.x + t * d.x, y: line.start.y + t * d.y };
    (coord_distance(p, q), q)
}

/// Distance from `p` to the closed segment `line`.
#[inline]
pub(crate) fn point_segment_distance(p: Coord<f64>, line: &Line<f64>) -> f64 {
    closest_on_segment(p, line).0
}

/// Distance between two closed segments.
pub(crate) fn segment_distance(a: &Line<f64>, b: &Line<f64>) -> f64 {
    if a.intersects(b) { return 0.0 }
    point_segment_distance(a.start, b)
        .min(point_segment_distance(a.end, b))
        .min(point_segment_distance(b.start, a))
        .min(point_segment_distance(b.end, a))
}

/// Distance from `p` to a line string, with the closest point on it.
pub(crate) fn closest_on_line_string(p: Coord<f64>, line_string: &LineString<f64>) -> Option<(f64, Coord<f64>)> {
    line_string.lines()
        .map(|line| closest_on_segment(p, &line))
        .min_by(|a, b| a.0.total_cmp(&b.0))
}

/// All boundary segments of a polygon (exterior and holes).
pub(crate) fn polygon_segments(polygon: &Polygon<f64>) -> impl Iterator<Item = Line<f64>> + '_ {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .flat_map(|ring| ring.lines())
}

/// All boundary segments of a multipolygon.
pub(crate) fn multi_polygon_segments(shape: &MultiPolygon<f64>) -> impl Iterator<Item = Line<f64>> + '_ {
    shape.0.iter().flat_map(polygon_segments)
}

/// Euclidean distance between two areal shapes; zero when they intersect.
pub(crate) fn shape_distance(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> f64 {
    if a.intersects(b) { return 0.0 }

    let segments = multi_polygon_segments(b).collect::<Vec<_>>();
    multi_polygon_segments(a)
        .flat_map(|sa| segments.iter().map(move |sb| segment_distance(&sa, sb)))
        .fold(f64::INFINITY, f64::min)
}

/// Total length of a line string.
#[inline]
pub(crate) fn line_string_length(line_string: &LineString<f64>) -> f64 {
    line_string.lines().map(|line| line.dx().hypot(line.dy())).sum()
}

/// Total boundary length of a shape, including holes.
pub(crate) fn perimeter(shape: &MultiPolygon<f64>) -> f64 {
    shape.0.iter()
        .flat_map(|polygon| std::iter::once(polygon.exterior()).chain(polygon.interiors()))
        .map(line_string_length)
        .sum()
}

/// Length of the boundary of `a` that runs within `tol` of the boundary of `b`.
/// A segment counts when its endpoints and midpoint all lie within `tol`.
pub(crate) fn shared_boundary_length(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>, tol: f64) -> f64 {
    let others = multi_polygon_segments(b).collect::<Vec<_>>();
    let near = |p: Coord<f64>| others.iter().any(|line| point_segment_distance(p, line) <= tol);

    multi_polygon_segments(a)
        .filter(|line| {
            let mid = Coord { x: (line.start.x + line.end.x) / 2.0, y: (line.start.y + line.end.y) / 2.0 };
            near(line.start) && near(line.end) && near(mid)
        })
        .map(|line| line.dx().hypot(line.dy()))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, polygon};

    fn square(x: f64, y: f64, s: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x, y: y), (x: x + s, y: y), (x: x + s, y: y + s), (x: x, y: y + s), (x: x, y: y),
        ]])
    }

    #[test]
    fn point_to_segment_projects_inside_and_clamps_outside() {
        let line = Line::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 10.0, y: 0.0 });
        let (d, q) = closest_on_segment(coord! { x: 5.0, y: 3.0 }, &line);
        assert_eq!(d, 3.0);
        assert_eq!(q, coord! { x: 5.0, y: 0.0 });

        let (d, q) = closest_on_segment(coord! { x: 13.0, y: 4.0 }, &line);
        assert_eq!(d, 5.0);
        assert_eq!(q, coord! { x: 10.0, y: 0.0 });
    }

    #[test]
    fn crossing_segments_have_zero_distance() {
        let a = Line::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 2.0, y: 2.0 });
        let b = Line::new(coord! { x: 0.0, y: 2.0 }, coord! { x: 2.0, y: 0.0 });
        assert_eq!(segment_distance(&a, &b), 0.0);
    }

    #[test]
    fn distance_between_separated_squares() {
        let a = square(0.0, 0.0, 10.0);
        let b = square(13.0, 0.0, 10.0);
        assert!((shape_distance(&a, &b) - 3.0).abs() < 1e-12);
        assert_eq!(shape_distance(&a, &square(5.0, 5.0, 10.0)), 0.0);
    }

    #[test]
    fn perimeter_includes_holes() {
        let shell = square(0.0, 0.0, 10.0);
        assert_eq!(perimeter(&shell), 40.0);

        let with_hole = MultiPolygon::new(vec![Polygon::new(
            shell.0[0].exterior().clone(),
            vec![square(4.0, 4.0, 2.0).0[0].exterior().clone()],
        )]);
        assert_eq!(perimeter(&with_hole), 48.0);
    }

    #[test]
    fn shared_boundary_of_touching_squares() {
        let a = square(0.0, 0.0, 10.0);
        let b = square(10.0, 2.0, 4.0);
        // only the right edge of `a` runs along `b`, and only partially: the
        // right edge is a single 10 m segment whose endpoints are not near `b`.
        assert_eq!(shared_boundary_length(&a, &b, 1e-6), 0.0);
        // `b`'s left edge lies entirely on `a`'s right edge.
        assert!((shared_boundary_length(&b, &a, 1e-6) - 4.0).abs() < 1e-12);
    }
}
