use std::path::Path;

use anyhow::{Context, Result};
use geo::{Coord, Geometry, LineString, MultiLineString, MultiPolygon, Point, Polygon};
use serde_json::{Map, Value};
use shapefile::{dbase::{FieldValue, Record}, Reader, Shape};

/// Signed area of a closed coordinate list (negative for clockwise rings).
fn signed_area(pts: &[Coord<f64>]) -> f64 {
    pts.windows(2).map(|w| w[0].x * w[1].y - w[1].x * w[0].y).sum::<f64>() / 2.0
}

fn closed_ring(points: impl Iterator<Item = Coord<f64>>) -> LineString<f64> {
    let mut ring = LineString::new(points.collect());
    ring.close();
    ring
}

/// Convert shapefile rings into polygons. Shapefile exteriors run clockwise and
/// each is followed by its holes.
fn rings_to_multi_polygon(rings: Vec<LineString<f64>>) -> MultiPolygon<f64> {
    let mut polygons = Vec::new();
    let mut exterior: Option<LineString<f64>> = None;
    let mut holes = Vec::new();

    for ring in rings {
        if signed_area(&ring.0) < 0.0 {
            if let Some(previous) = exterior.take() {
                polygons.push(Polygon::new(previous, std::mem::take(&mut holes)));
            }
            exterior = Some(ring);
        } else {
            holes.push(ring);
        }
    }
    if let Some(previous) = exterior {
        polygons.push(Polygon::new(previous, holes));
    }
    MultiPolygon::new(polygons)
}

/// Convert a shapefile shape into a geometry; unsupported or null shapes give `None`.
pub(crate) fn shape_to_geometry(shape: &Shape) -> Option<Geometry<f64>> {
    let xy = |x: f64, y: f64| Coord { x, y };
    Some(match shape {
        Shape::Point(p) => Geometry::Point(Point::new(p.x, p.y)),
        Shape::PointZ(p) => Geometry::Point(Point::new(p.x, p.y)),
        Shape::Polyline(line) => Geometry::MultiLineString(MultiLineString::new(line.parts().iter()
            .map(|part| LineString::new(part.iter().map(|p| xy(p.x, p.y)).collect()))
            .collect())),
        Shape::PolylineZ(line) => Geometry::MultiLineString(MultiLineString::new(line.parts().iter()
            .map(|part| LineString::new(part.iter().map(|p| xy(p.x, p.y)).collect()))
            .collect())),
        Shape::Polygon(polygon) => Geometry::MultiPolygon(rings_to_multi_polygon(polygon.rings().iter()
            .map(|ring| closed_ring(ring.points().iter().map(|p| xy(p.x, p.y))))
            .collect())),
        Shape::PolygonZ(polygon) => Geometry::MultiPolygon(rings_to_multi_polygon(polygon.rings().iter()
            .map(|ring| closed_ring(ring.points().iter().map(|p| xy(p.x, p.y))))
            .collect())),
        _ => return None,
    })
}

fn field_to_json(value: FieldValue) -> Value {
    match value {
        FieldValue::Character(Some(s)) | FieldValue::Memo(s) => Value::String(s.trim().to_string()),
        FieldValue::Numeric(Some(n)) | FieldValue::Double(n) => Value::from(n),
        FieldValue::Float(Some(f)) => Value::from(f as f64),
        FieldValue::Integer(i) => Value::from(i),
        FieldValue::Logical(Some(b)) => Value::Bool(b),
        _ => Value::Null,
    }
}

fn record_to_properties(record: Record) -> Map<String, Value> {
    record.into_iter().map(|(name, value)| (name, field_to_json(value))).collect()
}

/// Read all shapes with their attribute records from a `.shp` file.
pub(crate) fn read_shapefile(path: &Path) -> Result<Vec<(Geometry<f64>, Map<String, Value>)>> {
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("[io::shp] Failed to open shapefile: {}", path.display()))?;

    let mut items = Vec::new();
    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result.context("[io::shp] Error reading shape+record")?;
        if let Some(geometry) = shape_to_geometry(&shape) {
            items.push((geometry, record_to_properties(record)));
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;

    #[test]
    fn clockwise_rings_are_exteriors() {
        let exterior = closed_ring([(0.0, 0.0), (0.0, 4.0), (4.0, 4.0), (4.0, 0.0)].into_iter().map(|(x, y)| Coord { x, y }));
        let hole = closed_ring([(1.0, 1.0), (2.0, 1.0), (2.0, 2.0), (1.0, 2.0)].into_iter().map(|(x, y)| Coord { x, y }));
        let second = closed_ring([(10.0, 0.0), (10.0, 1.0), (11.0, 1.0), (11.0, 0.0)].into_iter().map(|(x, y)| Coord { x, y }));

        let shape = rings_to_multi_polygon(vec![exterior, hole, second]);
        assert_eq!(shape.0.len(), 2);
        assert_eq!(shape.0[0].interiors().len(), 1);
        assert_eq!(shape.unsigned_area(), 16.0 - 1.0 + 1.0);
    }
}
