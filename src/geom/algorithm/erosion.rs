use std::collections::VecDeque;

use geo::{BoundingRect, Contains, Coord, Point, Polygon};

use super::distance::{point_segment_distance, polygon_segments};

/// Number of separate parts left after shrinking `polygon` inwards by `shrink`:
/// 0 when it collapses, more than 1 when it splits.
///
/// The eroded region is sampled on a regular grid (at most 48 cells along the
/// longer side, never finer than `shrink`); parts are 8-connected groups of
/// samples lying deeper than `shrink` inside the polygon.
pub(crate) fn erosion_parts(polygon: &Polygon<f64>, shrink: f64) -> usize {
    let Some(rect) = polygon.bounding_rect() else { return 0 };
    let spacing = (rect.width().max(rect.height()) / 48.0).max(shrink);
    if spacing <= 0.0 { return 1 }

    let nx = ((rect.width() / spacing).ceil() as usize).max(1);
    let ny = ((rect.height() / spacing).ceil() as usize).max(1);
    let step = Coord { x: rect.width() / nx as f64, y: rect.height() / ny as f64 };
    let segments = polygon_segments(polygon).collect::<Vec<_>>();

    let deep = (0..ny)
        .flat_map(|j| (0..nx).map(move |i| (i, j)))
        .map(|(i, j)| {
            let c = Coord {
                x: rect.min().x + (i as f64 + 0.5) * step.x,
                y: rect.min().y + (j as f64 + 0.5) * step.y,
            };
            polygon.contains(&Point::from(c))
                && segments.iter().map(|s| point_segment_distance(c, s)).fold(f64::INFINITY, f64::min) > shrink
        })
        .collect::<Vec<_>>();

    let mut seen = vec![false; deep.len()];
    let mut parts = 0;
    for start in 0..deep.len() {
        if !deep[start] || seen[start] { continue }
        parts += 1;
        seen[start] = true;
        let mut queue = VecDeque::from([start]);
        while let Some(k) = queue.pop_front() {
            let (i, j) = ((k % nx) as isize, (k / nx) as isize);
            for (di, dj) in [(-1, -1), (0, -1), (1, -1), (-1, 0), (1, 0), (-1, 1), (0, 1), (1, 1)] {
                let (a, b) = (i + di, j + dj);
                if a < 0 || b < 0 || a >= nx as isize || b >= ny as isize { continue }
                let n = b as usize * nx + a as usize;
                if deep[n] && !seen[n] {
                    seen[n] = true;
                    queue.push_back(n);
                }
            }
        }
    }
    parts
}
