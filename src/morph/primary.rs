//! Characters of single shapes.

use ahash::AHashMap;
use geo::{Area, MultiPolygon};

use crate::geom::{
    algorithm::{centroid_corner_distance, elongation, equivalent_rectangular_index, orientation},
    Geometries,
};

/// Values that are not finite become missing.
#[inline]
pub(crate) fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

fn per_shape(geoms: &Geometries, f: impl Fn(&MultiPolygon<f64>) -> f64) -> Vec<Option<f64>> {
    geoms.shapes().iter().map(|shape| finite(f(shape))).collect()
}

pub(crate) fn areas(geoms: &Geometries) -> Vec<Option<f64>> {
    per_shape(geoms, |shape| shape.unsigned_area())
}

pub(crate) fn elongations(geoms: &Geometries) -> Vec<Option<f64>> {
    per_shape(geoms, elongation)
}

pub(crate) fn corner_distance_deviations(geoms: &Geometries) -> Vec<Option<f64>> {
    per_shape(geoms, |shape| centroid_corner_distance(shape).1)
}

pub(crate) fn orientations(geoms: &Geometries) -> Vec<Option<f64>> {
    per_shape(geoms, orientation)
}

pub(crate) fn rectangularity(geoms: &Geometries) -> Vec<Option<f64>> {
    per_shape(geoms, equivalent_rectangular_index)
}

/// Element-wise `a / b`; missing when either side is missing or `b` is zero.
pub(crate) fn ratio(a: &[Option<f64>], b: &[Option<f64>]) -> Vec<Option<f64>> {
    a.iter().zip(b)
        .map(|(a, b)| match (a, b) {
            (Some(a), Some(b)) if *b != 0.0 => finite(a / b),
            _ => None,
        })
        .collect()
}

/// Absolute difference between each building's orientation and that of its
/// street; 45 when the building has no street.
pub(crate) fn street_alignment(
    orientations: &[Option<f64>],
    streets: &[Option<u32>],
    street_orientation: &AHashMap<u32, f64>,
) -> Vec<Option<f64>> {
    orientations.iter().zip(streets)
        .map(|(orientation, street)| {
            let orientation = (*orientation)?;
            match street.and_then(|nid| street_orientation.get(&nid)) {
                Some(s) => finite((orientation - s).abs()),
                None => Some(45.0),
            }
        })
        .collect()
}
