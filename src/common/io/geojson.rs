use anyhow::{anyhow, bail, Context, Result};
use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use serde_json::{json, Map, Value};

fn ring_to_json(ring: &LineString<f64>) -> Vec<Vec<f64>> {
    ring.coords().map(|c| vec![c.x, c.y]).collect()
}

fn polygon_to_json(polygon: &Polygon<f64>) -> Vec<Vec<Vec<f64>>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(ring_to_json)
        .collect()
}

/// Convert a geometry into a GeoJSON geometry object.
pub(crate) fn geometry_to_json(geometry: &Geometry<f64>) -> Result<Value> {
    Ok(match geometry {
        Geometry::Point(p) => json!({ "type": "Point", "coordinates": [p.x(), p.y()] }),
        Geometry::LineString(ls) => json!({ "type": "LineString", "coordinates": ring_to_json(ls) }),
        Geometry::Polygon(p) => json!({ "type": "Polygon", "coordinates": polygon_to_json(p) }),
        Geometry::MultiPoint(mp) => json!({
            "type": "MultiPoint",
            "coordinates": mp.0.iter().map(|p| vec![p.x(), p.y()]).collect::<Vec<_>>(),
        }),
        Geometry::MultiLineString(ml) => json!({
            "type": "MultiLineString",
            "coordinates": ml.0.iter().map(ring_to_json).collect::<Vec<_>>(),
        }),
        Geometry::MultiPolygon(mp) => json!({
            "type": "MultiPolygon",
            "coordinates": mp.0.iter().map(polygon_to_json).collect::<Vec<_>>(),
        }),
        other => bail!("[io::geojson] Unsupported geometry for GeoJSON output: {other:?}"),
    })
}

/// Write a FeatureCollection; `properties[i]` becomes the properties of feature `i`.
pub(crate) fn write_geojson_bytes(geometries: &[Geometry<f64>], properties: &[Map<String, Value>]) -> Result<Vec<u8>> {
    let features = geometries.iter().enumerate()
        .map(|(idx, geometry)| Ok(json!({
            "type": "Feature",
            "geometry": geometry_to_json(geometry)?,
            "properties": properties.get(idx).cloned().unwrap_or_default(),
        })))
        .collect::<Result<Vec<Value>>>()?;

    let feature_collection = json!({
        "type": "FeatureCollection",
        "features": features,
    });

    serde_json::to_vec(&feature_collection).context("[io::geojson] Failed to serialize GeoJSON to bytes")
}

fn parse_coord(value: &Value) -> Result<Coord<f64>> {
    let pair = value.as_array().ok_or_else(|| anyhow!("[io::geojson] Invalid position: expected an array"))?;
    let (Some(x), Some(y)) = (pair.first().and_then(Value::as_f64), pair.get(1).and_then(Value::as_f64)) else {
        bail!("[io::geojson] Invalid position: expected two numbers")
    };
    Ok(Coord { x, y })
}

fn as_array<'a>(value: &'a Value, what: &str) -> Result<&'a Vec<Value>> {
    value.as_array().ok_or_else(|| anyhow!("[io::geojson] Invalid {what}: expected an array"))
}

fn parse_line(value: &Value) -> Result<LineString<f64>> {
    as_array(value, "line")?.iter().map(parse_coord).collect::<Result<Vec<_>>>().map(LineString::new)
}

/// Parse a ring and make sure it is closed.
fn parse_ring(value: &Value) -> Result<LineString<f64>> {
    let mut ring = parse_line(value)?;
    ring.close();
    Ok(ring)
}

fn parse_polygon(value: &Value) -> Result<Polygon<f64>> {
    let rings = as_array(value, "polygon")?.iter().map(parse_ring).collect::<Result<Vec<_>>>()?;
    let mut rings = rings.into_iter();
    let exterior = rings.next().ok_or_else(|| anyhow!("[io::geojson] Invalid polygon: missing exterior ring"))?;
    Ok(Polygon::new(exterior, rings.collect()))
}

/// Parse a GeoJSON geometry object.
pub(crate) fn geometry_from_json(value: &Value) -> Result<Geometry<f64>> {
    let coords = &value["coordinates"];
    Ok(match value["type"].as_str() {
        Some("Point") => Geometry::Point(Point::from(parse_coord(coords)?)),
        Some("LineString") => Geometry::LineString(parse_line(coords)?),
        Some("Polygon") => Geometry::Polygon(parse_polygon(coords)?),
        Some("MultiPoint") => Geometry::MultiPoint(MultiPoint::new(
            as_array(coords, "multipoint")?.iter().map(|c| parse_coord(c).map(Point::from)).collect::<Result<_>>()?)),
        Some("MultiLineString") => Geometry::MultiLineString(MultiLineString::new(
            as_array(coords, "multilinestring")?.iter().map(parse_line).collect::<Result<_>>()?)),
        Some("MultiPolygon") => Geometry::MultiPolygon(MultiPolygon::new(
            as_array(coords, "multipolygon")?.iter().map(parse_polygon).collect::<Result<_>>()?)),
        other => bail!("[io::geojson] Unsupported geometry type: {other:?}"),
    })
}

/// Read features from GeoJSON bytes. Features without a geometry are skipped.
pub(crate) fn read_geojson_bytes(bytes: &[u8]) -> Result<Vec<(Geometry<f64>, Map<String, Value>)>> {
    let value: Value = serde_json::from_slice(bytes).context("[io::geojson] Failed to parse GeoJSON bytes")?;

    let features = match value["type"].as_str() {
        Some("FeatureCollection") => as_array(&value["features"], "features")?.clone(),
        Some("Feature") => vec![value],
        _ => vec![json!({ "type": "Feature", "geometry": value, "properties": {} })],
    };

    features.iter()
        .filter(|feature| feature["geometry"].is_object())
        .map(|feature| Ok((
            geometry_from_json(&feature["geometry"])?,
            feature["properties"].as_object().cloned().unwrap_or_default(),
        )))
        .collect()
}
