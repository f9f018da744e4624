use geo::Rect;
use rstar::{PointDistance, RTreeObject, AABB};

/// A bounding box in an R-tree, associated with a geometry by index.
#[derive(Debug, Clone)]
pub(crate) struct BoundingBox {
    idx: usize, // Index of corresponding geometry in its collection
    bbox: Rect<f64>,
}

impl BoundingBox {
    pub(crate) fn new(idx: usize, bbox: Rect<f64>) -> Self {
        Self { idx, bbox }
    }

    /// Get the index of the corresponding geometry.
    #[inline] pub(crate) fn idx(&self) -> usize { self.idx }
}

impl RTreeObject for BoundingBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.bbox.min().into(), self.bbox.max().into())
    }
}

/// Envelope of `rect` grown by `pad` on every side.
#[inline]
pub(crate) fn padded_envelope(rect: &Rect<f64>, pad: f64) -> AABB<[f64; 2]> {
    AABB::from_corners(
        [rect.min().x - pad, rect.min().y - pad],
        [rect.max().x + pad, rect.max().y + pad],
    )
}

impl PointDistance for BoundingBox {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let (min, max) = (self.bbox.min(), self.bbox.max());
        let dx = (min.x - point[0]).max(point[0] - max.x).max(0.0);
        let dy = (min.y - point[1]).max(point[1] - max.y).max(0.0);
        dx * dx + dy * dy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    #[test]
    fn distance_to_box() {
        let bbox = BoundingBox::new(0, Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 2.0, y: 1.0 }));
        assert_eq!(bbox.distance_2(&[1.0, 0.5]), 0.0);
        assert_eq!(bbox.distance_2(&[5.0, 0.5]), 9.0);
        assert_eq!(bbox.distance_2(&[5.0, 5.0]), 25.0);
        assert_eq!(bbox.distance_2(&[-1.0, -1.0]), 2.0);
    }
}
