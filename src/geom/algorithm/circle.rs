use geo::{ConvexHull, Coord, MultiPoint, Point};

use super::distance::coord_distance;

const EPS: f64 = 1e-9;

#[inline]
fn inside(center: Coord<f64>, radius: f64, p: Coord<f64>) -> bool {
    coord_distance(center, p) <= radius * (1.0 + EPS) + EPS
}

fn circle_two(a: Coord<f64>, b: Coord<f64>) -> (Coord<f64>, f64) {
    let center = Coord { x: (a.x + b.x) / 2.0, y: (a.y + b.y) / 2.0 };
    (center, coord_distance(center, a))
}

/// Circumcircle of three points; falls back to the widest pair when collinear.
fn circle_three(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>) -> (Coord<f64>, f64) {
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    if d.abs() < EPS {
        return [circle_two(a, b), circle_two(a, c), circle_two(b, c)].into_iter()
            .max_by(|x, y| x.1.total_cmp(&y.1))
            .unwrap_or((a, 0.0));
    }

    let (a2, b2, c2) = (a.x * a.x + a.y * a.y, b.x * b.x + b.y * b.y, c.x * c.x + c.y * c.y);
    let center = Coord {
        x: (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d,
        y: (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d,
    };
    (center, coord_distance(center, a))
}

/// Minimum enclosing circle (center, radius) of a set of coordinates.
/// Runs the incremental Welzl construction on the convex hull vertices only.
pub(crate) fn enclosing_circle(coords: impl IntoIterator<Item = Coord<f64>>) -> Option<(Coord<f64>, f64)> {
    let points = MultiPoint::new(coords.into_iter().map(Point::from).collect());
    if points.0.is_empty() { return None }

    let mut hull = points.convex_hull().exterior().0.clone();
    hull.pop();
    if hull.is_empty() { hull.push(points.0[0].0) }

    let mut circle = (hull[0], 0.0);
    for i in 1..hull.len() {
        if inside(circle.0, circle.1, hull[i]) { continue }
        circle = (hull[i], 0.0);
        for j in 0..i {
            if inside(circle.0, circle.1, hull[j]) { continue }
            circle = circle_two(hull[i], hull[j]);
            for k in 0..j {
                if !inside(circle.0, circle.1, hull[k]) {
                    circle = circle_three(hull[i], hull[j], hull[k]);
                }
            }
        }
    }
    Some(circle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    #[test]
    fn square_circle_is_circumscribed() {
        let (center, radius) = enclosing_circle([
            coord! { x: 0.0, y: 0.0 }, coord! { x: 2.0, y: 0.0 },
            coord! { x: 2.0, y: 2.0 }, coord! { x: 0.0, y: 2.0 },
        ]).unwrap();
        assert!((center.x - 1.0).abs() < 1e-9 && (center.y - 1.0).abs() < 1e-9);
        assert!((radius - 2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn interior_points_do_not_grow_circle() {
        let (_, radius) = enclosing_circle([
            coord! { x: -1.0, y: 0.0 }, coord! { x: 1.0, y: 0.0 },
            coord! { x: 0.0, y: 0.5 }, coord! { x: 0.1, y: -0.2 },
        ]).unwrap();
        assert!((radius - 1.0).abs() < 1e-9);
    }

    #[test]
    fn empty_input_has_no_circle() {
        assert!(enclosing_circle(std::iter::empty()).is_none());
    }
}
