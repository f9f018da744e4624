use geo::{Coord, Line, LineString};

use super::{distance::{coord_distance, line_string_length}, shape::{azimuth, cardinal_deviation}};

/// Insert vertices so that no segment of the ring or line is longer than `max_segment`.
/// The output keeps every original vertex.
pub(crate) fn densify(coords: &[Coord<f64>], max_segment: f64) -> Vec<Coord<f64>> {
    let mut out = Vec::with_capacity(coords.len());
    for window in coords.windows(2) {
        let (a, b) = (window[0], window[1]);
        out.push(a);

        let length = coord_distance(a, b);
        let pieces = (length / max_segment).ceil() as usize;
        for k in 1..pieces {
            let t = k as f64 / pieces as f64;
            out.push(Coord { x: a.x + t * (b.x - a.x), y: a.y + t * (b.y - a.y) });
        }
    }
    out.extend(coords.last().copied());
    out
}

/// Points every `interval` along the line (starting at its first vertex) paired
/// with the azimuth of the segment they lie on.
pub(crate) fn sample_with_direction(line_string: &LineString<f64>, interval: f64) -> Vec<(Coord<f64>, f64)> {
    let segments = line_string.lines().filter(|l| l.dx() != 0.0 || l.dy() != 0.0).collect::<Vec<Line<f64>>>();
    if segments.is_empty() || interval <= 0.0 { return vec![] }

    let total = line_string_length(line_string);
    let count = (total / interval).floor() as usize;

    let mut out = Vec::with_capacity(count + 1);
    let (mut segment, mut start) = (0, 0.0);
    for k in 0..=count {
        let offset = k as f64 * interval;
        while segment + 1 < segments.len() {
            let length = segments[segment].dx().hypot(segments[segment].dy());
            if offset <= start + length { break }
            start += length;
            segment += 1;
        }

        let line = segments[segment];
        let length = line.dx().hypot(line.dy());
        let t = ((offset - start) / length).clamp(0.0, 1.0);
        let point = Coord { x: line.start.x + t * line.dx(), y: line.start.y + t * line.dy() };
        out.push((point, azimuth(line.start, line.end)));
    }
    out
}

/// Orientation of a line from its first to its last vertex, folded to 0–45 degrees.
pub(crate) fn line_orientation(line_string: &LineString<f64>) -> f64 {
    match (line_string.0.first(), line_string.0.last()) {
        (Some(&a), Some(&b)) if a != b => cardinal_deviation(azimuth(a, b)),
        _ => f64::NAN,
    }
}

/// Unit direction of the last segment of a line, pointing out of its end.
pub(crate) fn end_direction(line_string: &LineString<f64>) -> Option<Coord<f64>> {
    let coords = &line_string.0;
    let end = *coords.last()?;
    let before = coords.iter().rev().skip(1).find(|c| **c != end)?;
    let length = coord_distance(*before, end);
    Some(Coord { x: (end.x - before.x) / length, y: (end.y - before.y) / length })
}
