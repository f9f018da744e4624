use anyhow::{anyhow, bail, Context, Result};
use geo::{Coord, MapCoords, Rect};
use proj4rs::{proj::Proj as Proj4, transform::transform};

/// EPSG code of WGS84 longitude/latitude.
pub const WGS84: u32 = 4326;

/// Pick the WGS84 UTM zone covering the center of a lon/lat bounding box.
/// Returns 326zz in the northern hemisphere and 327zz in the southern one.
pub fn utm_epsg(bounds: &Rect<f64>) -> u32 {
    let center = bounds.center();
    let zone = (((center.x + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60) as u32;
    if center.y >= 0.0 { 32600 + zone } else { 32700 + zone }
}

/// True for EPSG codes of the WGS84 UTM zones.
#[inline]
pub fn is_utm(epsg: u32) -> bool {
    matches!(epsg, 32601..=32660 | 32701..=32760)
}

/// PROJ.4 definition for the CRS codes handled here.
fn proj4_string(epsg: u32) -> Result<String> {
    match epsg {
        WGS84 => Ok("+proj=longlat +datum=WGS84 +no_defs +type=crs".into()),
        32601..=32660 => Ok(format!("+proj=utm +zone={} +datum=WGS84 +units=m +no_defs +type=crs", epsg - 32600)),
        32701..=32760 => Ok(format!("+proj=utm +zone={} +south +datum=WGS84 +units=m +no_defs +type=crs", epsg - 32700)),
        _ => bail!("[crs] unsupported EPSG code {epsg} (expected 4326 or a WGS84 UTM zone)"),
    }
}

/// Coordinate transformation between two of the supported CRSs.
pub struct Projector {
    from: Proj4,
    to: Proj4,
    from_epsg: u32,
    to_epsg: u32,
}

impl Projector {
    pub fn new(from_epsg: u32, to_epsg: u32) -> Result<Self> {
        let build = |epsg: u32| -> Result<Proj4> {
            let proj_string = proj4_string(epsg)?;
            Proj4::from_proj_string(&proj_string)
                .map_err(|e| anyhow!("{e:?}"))
                .with_context(|| format!("failed to build PROJ.4: {proj_string}"))
        };

        Ok(Self { from: build(from_epsg)?, to: build(to_epsg)?, from_epsg, to_epsg })
    }

    #[inline] pub fn from_epsg(&self) -> u32 { self.from_epsg }

    #[inline] pub fn to_epsg(&self) -> u32 { self.to_epsg }

    /// Identity projections skip the transform entirely.
    #[inline] fn is_identity(&self) -> bool { self.from_epsg == self.to_epsg }

    /// Transform a single coordinate (degrees in/out for lon/lat, metres for UTM).
    pub fn coord(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        if self.is_identity() { return Ok(coord) }

        let geographic_in = self.from_epsg == WGS84;
        let geographic_out = self.to_epsg == WGS84;

        let mut point = if geographic_in {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };
        transform(&self.from, &self.to, &mut point)
            .map_err(|e| anyhow!("CRS transform failed for ({}, {}): {e:?}", coord.x, coord.y))?;

        Ok(if geographic_out {
            Coord { x: point.0.to_degrees(), y: point.1.to_degrees() }
        } else {
            Coord { x: point.0, y: point.1 }
        })
    }

    /// Transform every coordinate of a geometry.
    pub fn geometry<G>(&self, geometry: &G) -> Result<G>
    where
        G: MapCoords<f64, f64, Output = G> + Clone,
    {
        if self.is_identity() { return Ok(geometry.clone()) }
        geometry.try_map_coords(|coord| self.coord(coord))
    }

    /// Transform a slice of geometries.
    pub fn geometries<G>(&self, geometries: &[G]) -> Result<Vec<G>>
    where
        G: MapCoords<f64, f64, Output = G> + Clone,
    {
        geometries.iter().map(|geometry| self.geometry(geometry)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    #[test]
    fn utm_zone_for_kano_is_32n() {
        // Kano, Nigeria (~8.52E, 12.0N)
        let bounds = Rect::new(coord! { x: 8.4, y: 11.9 }, coord! { x: 8.6, y: 12.1 });
        assert_eq!(utm_epsg(&bounds), 32632);
    }

    #[test]
    fn utm_zone_for_southern_hemisphere() {
        // Kinshasa (~15.3E, 4.3S)
        let bounds = Rect::new(coord! { x: 15.2, y: -4.4 }, coord! { x: 15.4, y: -4.2 });
        assert_eq!(utm_epsg(&bounds), 32733);
    }

    #[test]
    fn utm_zone_is_clamped_at_antimeridian() {
        let bounds = Rect::new(coord! { x: 179.9, y: 1.0 }, coord! { x: 180.0, y: 2.0 });
        assert_eq!(utm_epsg(&bounds), 32660);
    }

    #[test]
    fn unsupported_epsg_is_rejected() {
        assert!(Projector::new(3857, WGS84).is_err());
        assert!(is_utm(32632));
        assert!(!is_utm(4326));
    }

    #[test]
    fn projection_round_trip_is_stable() {
        let forward = Projector::new(WGS84, 32632).unwrap();
        let inverse = Projector::new(32632, WGS84).unwrap();

        let lonlat = coord! { x: 8.52, y: 12.0 };
        let utm = forward.coord(lonlat).unwrap();

        // Zone 32 central meridian is 9E; Kano sits just west of it.
        assert!(utm.x > 400_000.0 && utm.x < 500_000.0, "easting {}", utm.x);
        assert!(utm.y > 1_300_000.0 && utm.y < 1_340_000.0, "northing {}", utm.y);

        let back = inverse.coord(utm).unwrap();
        assert!((back.x - lonlat.x).abs() < 1e-7);
        assert!((back.y - lonlat.y).abs() < 1e-7);
    }

    #[test]
    fn identity_projection_returns_input() {
        let projector = Projector::new(32632, 32632).unwrap();
        let c = coord! { x: 1.0, y: 2.0 };
        assert_eq!(projector.coord(c).unwrap(), c);
    }
}
