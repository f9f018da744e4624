use geo::{BoundingRect, Centroid, Contains, Coord, Intersects, LineString, MultiPolygon, Point, Rect};
use rstar::{RTree, AABB};

use crate::geom::{algorithm::{closest_on_line_string, multi_polygon_segments, segment_distance, shape_distance, union_all}, bbox::{padded_envelope, BoundingBox}};

fn envelope_of(shape: Option<Rect<f64>>) -> Rect<f64> {
    shape.unwrap_or_else(|| Rect::new(Coord { x: f64::NAN, y: f64::NAN }, Coord { x: f64::NAN, y: f64::NAN }))
}

fn merge_bounds(rects: impl Iterator<Item = Rect<f64>>) -> Option<Rect<f64>> {
    rects.reduce(|a, b| Rect::new(
        Coord { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
        Coord { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
    ))
}

/// A collection of areal shapes with an R-tree over their bounding boxes.
#[derive(Debug, Clone)]
pub struct Geometries {
    shapes: Vec<MultiPolygon<f64>>,
    rtree: RTree<BoundingBox>,
    epsg: u32,
}

impl Geometries {
    /// Construct a Geometries object from a vector of MultiPolygons.
    pub fn new(shapes: Vec<MultiPolygon<f64>>, epsg: u32) -> Self {
        Self {
            rtree: RTree::bulk_load(
                shapes.iter().enumerate()
                    .map(|(i, shape)| BoundingBox::new(i, envelope_of(shape.bounding_rect())))
                    .collect()
            ),
            shapes,
            epsg,
        }
    }

    /// Get the number of shapes.
    #[inline] pub fn len(&self) -> usize { self.shapes.len() }

    /// Check if there are no shapes.
    #[inline] pub fn is_empty(&self) -> bool { self.shapes.is_empty() }

    /// Get a reference to the list of shapes.
    #[inline] pub fn shapes(&self) -> &[MultiPolygon<f64>] { &self.shapes }

    /// Get the shape at `idx`.
    #[inline] pub fn shape(&self, idx: usize) -> &MultiPolygon<f64> { &self.shapes[idx] }

    /// EPSG code of the coordinates.
    #[inline] pub fn epsg(&self) -> u32 { self.epsg }

    /// Consume the collection, returning the shapes.
    #[inline] pub fn into_shapes(self) -> Vec<MultiPolygon<f64>> { self.shapes }

    /// Query the R-tree for bounding boxes intersecting the given envelope.
    #[inline]
    pub(crate) fn query(&self, envelope: &AABB<[f64; 2]>) -> impl Iterator<Item = &BoundingBox> {
        self.rtree.locate_in_envelope_intersecting(envelope)
    }

    /// Indices of shapes whose bounding box lies within `pad` of the bounding box of shape `idx`.
    pub(crate) fn candidates(&self, idx: usize, pad: f64) -> impl Iterator<Item = usize> + '_ {
        let envelope = padded_envelope(&envelope_of(self.shapes[idx].bounding_rect()), pad);
        self.rtree.locate_in_envelope_intersecting(&envelope)
            .map(BoundingBox::idx)
            .filter(move |&j| j != idx)
    }

    /// Compute the bounding rectangle of all shapes.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        merge_bounds(self.shapes.iter().filter_map(|shape| shape.bounding_rect()))
    }

    /// Compute the centroids of all shapes.
    pub fn centroids(&self) -> Vec<Point<f64>> {
        self.shapes.iter()
            .map(|shape| shape.centroid().unwrap_or(Point::new(f64::NAN, f64::NAN)))
            .collect()
    }

    /// Compute the union of all shapes into a single MultiPolygon.
    pub fn union(&self) -> MultiPolygon<f64> {
        union_all(self.shapes.clone())
    }

    /// Index of the first shape containing `point`.
    pub fn containing(&self, point: &Point<f64>) -> Option<usize> {
        let envelope = AABB::from_point([point.x(), point.y()]);
        let mut hits = self.query(&envelope).map(BoundingBox::idx).collect::<Vec<_>>();
        hits.sort_unstable();
        hits.into_iter().find(|&i| self.shapes[i].contains(point))
    }

    /// Indices of all shapes intersecting `geometry`, in ascending order.
    pub fn intersecting<G>(&self, geometry: &G) -> Vec<usize>
    where
        G: BoundingRect<f64> + Intersects<MultiPolygon<f64>>,
        G::Output: Into<Option<Rect<f64>>>,
    {
        let Some(rect) = geometry.bounding_rect().into() else { return vec![] };
        let mut hits = self.query(&padded_envelope(&rect, 0.0))
            .map(BoundingBox::idx)
            .filter(|&i| geometry.intersects(&self.shapes[i]))
            .collect::<Vec<_>>();
        hits.sort_unstable();
        hits
    }

    /// Nearest shape to `shape` within `max_distance` (ties go to the lower index).
    pub fn nearest(&self, shape: &MultiPolygon<f64>, max_distance: f64) -> Option<(usize, f64)> {
        let rect = shape.bounding_rect()?;
        self.query(&padded_envelope(&rect, max_distance))
            .map(|bbox| (bbox.idx(), shape_distance(shape, &self.shapes[bbox.idx()])))
            .filter(|&(_, d)| d <= max_distance)
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
    }
}

/// A collection of line strings with an R-tree over their bounding boxes.
#[derive(Debug, Clone)]
pub struct Polylines {
    lines: Vec<LineString<f64>>,
    rtree: RTree<BoundingBox>,
}

impl Polylines {
    pub fn new(lines: Vec<LineString<f64>>) -> Self {
        Self {
            rtree: RTree::bulk_load(
                lines.iter().enumerate()
                    .map(|(i, line)| BoundingBox::new(i, envelope_of(line.bounding_rect())))
                    .collect()
            ),
            lines,
        }
    }

    #[inline] pub fn len(&self) -> usize { self.lines.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.lines.is_empty() }

    #[inline] pub fn lines(&self) -> &[LineString<f64>] { &self.lines }

    #[inline] pub fn line(&self, idx: usize) -> &LineString<f64> { &self.lines[idx] }

    pub fn bounds(&self) -> Option<Rect<f64>> {
        merge_bounds(self.lines.iter().filter_map(|line| line.bounding_rect()))
    }

    /// Nearest line to `point` within `max_distance`, with the distance and the
    /// closest point on that line. Ties go to the lower index.
    pub fn nearest(&self, point: Coord<f64>, max_distance: f64) -> Option<(usize, f64, Coord<f64>)> {
        let mut best: Option<(usize, f64, Coord<f64>)> = None;
        for (bbox, d2) in self.rtree.nearest_neighbor_iter_with_distance_2(&[point.x, point.y]) {
            let bound = best.map_or(max_distance, |b| b.1);
            if d2.sqrt() > bound { break }

            let Some((d, q)) = closest_on_line_string(point, &self.lines[bbox.idx()]) else { continue };
            let better = match best {
                None => d <= max_distance,
                Some((i, bd, _)) => d < bd || (d == bd && bbox.idx() < i),
            };
            if better { best = Some((bbox.idx(), d, q)) }
        }
        best
    }

    /// Nearest line to an areal shape within `max_distance` (ties go to the lower index).
    pub fn nearest_to_shape(&self, shape: &MultiPolygon<f64>, max_distance: f64) -> Option<(usize, f64)> {
        let rect = shape.bounding_rect()?;
        let segments = multi_polygon_segments(shape).collect::<Vec<_>>();
        self.rtree.locate_in_envelope_intersecting(&padded_envelope(&rect, max_distance))
            .map(|bbox| {
                let line = &self.lines[bbox.idx()];
                let d = if shape.intersects(line) { 0.0 } else {
                    line.lines()
                        .flat_map(|l| segments.iter().map(move |s| segment_distance(&l, s)))
                        .fold(f64::INFINITY, f64::min)
                };
                (bbox.idx(), d)
            })
            .filter(|&(_, d)| d <= max_distance)
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
    }

    /// Whether any line intersects `geometry`.
    pub fn any_intersects<G>(&self, geometry: &G) -> bool
    where
        G: BoundingRect<f64> + Intersects<LineString<f64>>,
        G::Output: Into<Option<Rect<f64>>>,
    {
        let Some(rect) = geometry.bounding_rect().into() else { return false };
        self.rtree.locate_in_envelope_intersecting(&padded_envelope(&rect, 0.0))
            .any(|bbox| geometry.intersects(&self.lines[bbox.idx()]))
    }

    /// Indices of lines intersecting `geometry`, in ascending order.
    pub fn intersecting<G>(&self, geometry: &G) -> Vec<usize>
    where
        G: BoundingRect<f64> + Intersects<LineString<f64>>,
        G::Output: Into<Option<Rect<f64>>>,
    {
        let Some(rect) = geometry.bounding_rect().into() else { return vec![] };
        let mut hits = self.rtree.locate_in_envelope_intersecting(&padded_envelope(&rect, 0.0))
            .map(BoundingBox::idx)
            .filter(|&i| geometry.intersects(&self.lines[i]))
            .collect::<Vec<_>>();
        hits.sort_unstable();
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, polygon, Line};

    fn square(x: f64, y: f64, s: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x, y: y), (x: x + s, y: y), (x: x + s, y: y + s), (x: x, y: y + s), (x: x, y: y),
        ]])
    }

    fn grid() -> Geometries {
        Geometries::new((0..3).flat_map(|i| (0..3).map(move |j| square(i as f64 * 10.0, j as f64 * 10.0, 10.0))).collect(), 32632)
    }

    #[test]
    fn bounds_and_centroids() {
        let geoms = grid();
        assert_eq!(geoms.len(), 9);
        let bounds = geoms.bounds().unwrap();
        assert_eq!(bounds.min(), coord! { x: 0.0, y: 0.0 });
        assert_eq!(bounds.max(), coord! { x: 30.0, y: 30.0 });
        assert_eq!(geoms.centroids()[4], Point::new(15.0, 15.0));
    }

    #[test]
    fn containing_returns_first_match() {
        let geoms = grid();
        assert_eq!(geoms.containing(&Point::new(15.0, 15.0)), Some(4));
        assert_eq!(geoms.containing(&Point::new(45.0, 15.0)), None);
        // On a shared edge neither square strictly contains the point.
        assert_eq!(geoms.containing(&Point::new(10.0, 15.0)), None);
    }

    #[test]
    fn union_dissolves_grid() {
        let union = grid().union();
        assert_eq!(union.0.len(), 1);
    }

    #[test]
    fn nearest_shape_within_distance() {
        let geoms = grid();
        let target = square(35.0, 12.0, 2.0);
        let (idx, d) = geoms.nearest(&target, 10.0).unwrap();
        assert_eq!(idx, 7);
        assert!((d - 5.0).abs() < 1e-12);
        assert!(geoms.nearest(&target, 4.0).is_none());
    }

    #[test]
    fn nearest_line_and_projection() {
        let lines = Polylines::new(vec![
            LineString::from(vec![(0.0, 0.0), (100.0, 0.0)]),
            LineString::from(vec![(0.0, 50.0), (100.0, 50.0)]),
        ]);
        let (idx, d, q) = lines.nearest(coord! { x: 30.0, y: 40.0 }, 500.0).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(d, 10.0);
        assert_eq!(q, coord! { x: 30.0, y: 50.0 });
        assert!(lines.nearest(coord! { x: 30.0, y: 400.0 }, 100.0).is_none());

        let crossing = Line::new(coord! { x: 5.0, y: -1.0 }, coord! { x: 5.0, y: 1.0 });
        assert!(lines.any_intersects(&crossing));
        assert_eq!(lines.intersecting(&crossing), vec![0]);
    }

    #[test]
    fn nearest_line_to_shape() {
        let lines = Polylines::new(vec![
            LineString::from(vec![(0.0, -5.0), (100.0, -5.0)]),
            LineString::from(vec![(0.0, 20.0), (100.0, 20.0)]),
        ]);
        let (idx, d) = lines.nearest_to_shape(&square(10.0, 0.0, 10.0), 50.0).unwrap();
        assert_eq!(idx, 0);
        assert!((d - 5.0).abs() < 1e-12);
        assert!(lines.nearest_to_shape(&square(10.0, 60.0, 10.0), 5.0).is_none());
    }
}
