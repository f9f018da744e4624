use anyhow::{bail, Result};
use geo::{BoundingRect, MultiPolygon};
use polars::prelude::*;

use crate::{
    common::{io::Features, u32_column},
    crs::{utm_epsg, Projector, WGS84},
    elements::Element,
    geom::algorithm::union_all,
    store::Store,
};

/// Region of interest: its outline in lon/lat and in the local UTM zone.
#[derive(Debug, Clone)]
pub struct Roi {
    lonlat: MultiPolygon<f64>,
    shape: MultiPolygon<f64>,
    epsg: u32,
}

impl Roi {
    /// Build the region from the areal features of `features`, given in `input_epsg`.
    /// The UTM zone is picked from the centre of the lon/lat bounds.
    pub fn from_features(features: &Features, input_epsg: u32) -> Result<Self> {
        let polygons = features.polygons().into_iter().map(|(_, shape)| shape).collect::<Vec<_>>();
        if polygons.is_empty() { bail!("[roi] region of interest has no polygon features") }

        let lonlat = Projector::new(input_epsg, WGS84)?.geometry(&union_all(polygons))?;
        Self::from_lonlat(lonlat)
    }

    /// Build the region from a lon/lat outline.
    pub fn from_lonlat(lonlat: MultiPolygon<f64>) -> Result<Self> {
        let Some(bounds) = lonlat.bounding_rect() else { bail!("[roi] region of interest is empty") };
        let epsg = utm_epsg(&bounds);
        let shape = Projector::new(WGS84, epsg)?.geometry(&lonlat)?;
        Ok(Self { lonlat, shape, epsg })
    }

    /// Outline in lon/lat.
    #[inline] pub fn lonlat(&self) -> &MultiPolygon<f64> { &self.lonlat }

    /// Outline in the UTM zone.
    #[inline] pub fn shape(&self) -> &MultiPolygon<f64> { &self.shape }

    /// EPSG code of the UTM zone.
    #[inline] pub fn epsg(&self) -> u32 { self.epsg }
}

impl Element for Roi {
    const NAME: &'static str = "roi";

    fn save_as(&self, store: &mut Store, name: &str) -> Result<()> {
        store.put_polygons(name, std::slice::from_ref(&self.shape), &df!("epsg" => [self.epsg])?)
    }

    /// The stored outline is in UTM; the lon/lat outline is recovered by inverse projection.
    fn load_from(store: &Store, name: &str) -> Result<Self> {
        let (shapes, df) = store.get_polygons(name)?;
        let epsg = u32_column(&df, "epsg")?;
        let ([shape], &[epsg]) = (shapes.as_slice(), epsg.as_slice()) else {
            bail!("[roi] '{name}' must hold exactly one outline");
        };
        let lonlat = Projector::new(epsg, WGS84)?.geometry(shape)?;
        Ok(Self { lonlat, shape: shape.clone(), epsg })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Area, Geometry};

    #[test]
    fn roi_in_kano_projects_to_zone_32n() {
        let square = polygon![(x: 8.50, y: 12.00), (x: 8.51, y: 12.00), (x: 8.51, y: 12.01), (x: 8.50, y: 12.01), (x: 8.50, y: 12.00)];
        let roi = Roi::from_features(&Features::from_geometries(vec![Geometry::Polygon(square)]), WGS84).unwrap();
        assert_eq!(roi.epsg(), 32632);
        // ~1.09 km x 1.1 km
        let area = roi.shape().unsigned_area();
        assert!(area > 1.1e6 && area < 1.3e6, "area {area}");
    }

    #[test]
    fn roi_round_trips_through_store() {
        let square = polygon![(x: 8.50, y: 12.00), (x: 8.51, y: 12.00), (x: 8.51, y: 12.01), (x: 8.50, y: 12.01), (x: 8.50, y: 12.00)];
        let roi = Roi::from_lonlat(MultiPolygon::new(vec![square])).unwrap();
        let mut store = Store::memory(crate::store::StoreFormat::GeoJson).unwrap();
        roi.save(&mut store).unwrap();

        let loaded = Roi::load(&store).unwrap();
        assert_eq!(loaded.epsg(), 32632);
        assert!((loaded.shape().unsigned_area() - roi.shape().unsigned_area()).abs() < 1e-3);
        let bounds = loaded.lonlat().bounding_rect().unwrap();
        assert!((bounds.min().x - 8.50).abs() < 1e-7 && (bounds.max().y - 12.01).abs() < 1e-7);
    }

    #[test]
    fn roi_without_polygons_is_rejected() {
        let features = Features::from_geometries(vec![Geometry::Point(geo::Point::new(8.5, 12.0))]);
        assert!(Roi::from_features(&features, WGS84).is_err());
    }
}
