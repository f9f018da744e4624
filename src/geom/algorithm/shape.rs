use geo::{Area, Centroid, Coord, CoordsIter, MinimumRotatedRect, MultiPolygon, Polygon};

use super::{circle::enclosing_circle, distance::{coord_distance, perimeter}};

/// Azimuth of the segment a→b in degrees, measured clockwise from north, in (0, 180].
pub(crate) fn azimuth(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let angle = (b.x - a.x).atan2(b.y - a.y).to_degrees();
    if angle > 0.0 { angle } else { angle + 180.0 }
}

/// Fold an axis direction in degrees to its deviation from the nearest cardinal direction (0–45).
#[inline]
pub(crate) fn cardinal_deviation(angle: f64) -> f64 {
    let d = angle.rem_euclid(90.0);
    d.min(90.0 - d)
}

/// Side lengths of a (rotated) rectangle polygon, with the first corner's two edges.
fn rect_axes(rect: &Polygon<f64>) -> Option<(Coord<f64>, Coord<f64>, Coord<f64>)> {
    let coords = rect.exterior().coords().copied().collect::<Vec<_>>();
    (coords.len() >= 4).then(|| (coords[0], coords[1], coords[3]))
}

/// Shape descriptors derived from the minimum rotated rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RectDescriptor {
    pub long: f64,
    pub short: f64,
    /// Azimuth of the long axis in (0, 180].
    pub azimuth: f64,
    pub area: f64,
    pub perimeter: f64,
}

/// Minimum rotated rectangle descriptors of a shape.
pub(crate) fn rect_descriptor(shape: &MultiPolygon<f64>) -> Option<RectDescriptor> {
    let rect = shape.minimum_rotated_rect()?;
    let (a, b, d) = rect_axes(&rect)?;
    let (ab, ad) = (coord_distance(a, b), coord_distance(a, d));
    let (long, short, azimuth) = if ad <= ab { (ab, ad, azimuth(a, b)) } else { (ad, ab, azimuth(a, d)) };

    Some(RectDescriptor {
        long,
        short,
        azimuth,
        area: rect.unsigned_area(),
        perimeter: 2.0 * (long + short),
    })
}

/// Orientation of the long axis as deviation from cardinal directions (0–45 degrees).
pub(crate) fn orientation(shape: &MultiPolygon<f64>) -> f64 {
    rect_descriptor(shape)
        .map(|r| cardinal_deviation(r.azimuth))
        .unwrap_or(f64::NAN)
}

/// Elongation: short over long side of the minimum rotated rectangle (0–1).
pub(crate) fn elongation(shape: &MultiPolygon<f64>) -> f64 {
    match rect_descriptor(shape) {
        Some(r) if r.long > 0.0 => r.short / r.long,
        _ => f64::NAN,
    }
}

/// Equivalent rectangular index: sqrt(area / rect area) · (rect perimeter / perimeter).
pub(crate) fn equivalent_rectangular_index(shape: &MultiPolygon<f64>) -> f64 {
    let Some(r) = rect_descriptor(shape) else { return f64::NAN };
    let (area, perim) = (shape.unsigned_area(), perimeter(shape));
    if r.area <= 0.0 || perim <= 0.0 { return f64::NAN }
    (area / r.area).sqrt() * (r.perimeter / perim)
}

/// Area over the area of the minimum enclosing circle (1 for a disc).
pub(crate) fn circular_compactness(shape: &MultiPolygon<f64>) -> f64 {
    let Some((_, radius)) = enclosing_circle(shape.exterior_coords_iter()) else { return f64::NAN };
    if radius <= 0.0 { return 0.0 }
    shape.unsigned_area() / (std::f64::consts::PI * radius * radius)
}

/// Vertices of the exterior rings whose interior angle deviates from a straight
/// line by more than `tolerance` degrees.
pub(crate) fn corners(shape: &MultiPolygon<f64>, tolerance: f64) -> Vec<Coord<f64>> {
    let mut out = Vec::new();
    for polygon in &shape.0 {
        let mut ring = polygon.exterior().coords().copied().collect::<Vec<_>>();
        ring.pop(); // Remove the duplicate closing coord.
        let n = ring.len();
        if n < 3 { continue }

        for i in 0..n {
            let (prev, here, next) = (ring[(i + n - 1) % n], ring[i], ring[(i + 1) % n]);
            let (a, b) = (prev - here, next - here);
            let (na, nb) = (a.x.hypot(a.y), b.x.hypot(b.y));
            if na == 0.0 || nb == 0.0 { continue }

            let cosine = ((a.x * b.x + a.y * b.y) / (na * nb)).clamp(-1.0, 1.0);
            if cosine.acos().to_degrees() <= 180.0 - tolerance {
                out.push(here);
            }
        }
    }
    out
}

/// Mean and population standard deviation of centroid-to-corner distances.
pub(crate) fn centroid_corner_distance(shape: &MultiPolygon<f64>) -> (f64, f64) {
    let Some(centroid) = shape.centroid() else { return (f64::NAN, f64::NAN) };
    let distances = corners(shape, 10.0).into_iter()
        .map(|corner| coord_distance(centroid.0, corner))
        .collect::<Vec<_>>();
    if distances.is_empty() { return (f64::NAN, f64::NAN) }

    let n = distances.len() as f64;
    let mean = distances.iter().sum::<f64>() / n;
    let var = distances.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}
