//! Road access of individual buildings.

use anyhow::Result;
use geo::{Centroid, Line};
use polars::prelude::*;
use tracing::{debug, info};

use crate::{
    common::{f64_column, opt_u32_column, u32_column},
    config::RoadAccessConfig,
    elements::{Buildings, Element, Roads},
    store::Store,
};

/// Per-building road access: the nearest road, how many buildings stand
/// between the building and that road, and whether the road is paved.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadAccess {
    uid: Vec<u32>,
    nid: Vec<Option<u32>>,
    distance: Vec<Option<f64>>,
    buildings_in_between: Vec<Option<u32>>,
    paved: Vec<Option<u32>>,
}

impl RoadAccess {
    #[inline] pub fn len(&self) -> usize { self.uid.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.uid.is_empty() }

    #[inline] pub fn uids(&self) -> &[u32] { &self.uid }

    #[inline] pub fn nids(&self) -> &[Option<u32>] { &self.nid }

    #[inline] pub fn distances(&self) -> &[Option<f64>] { &self.distance }

    #[inline] pub fn buildings_in_between(&self) -> &[Option<u32>] { &self.buildings_in_between }

    #[inline] pub fn paved(&self) -> &[Option<u32>] { &self.paved }

    pub fn to_frame(&self) -> Result<DataFrame> {
        Ok(df!(
            "uID" => &self.uid,
            "nID" => &self.nid,
            "distance" => &self.distance,
            "buildings_in_between" => &self.buildings_in_between,
            "paved" => &self.paved,
        )?)
    }
}

impl Element for RoadAccess {
    const NAME: &'static str = "road_access";

    fn save_as(&self, store: &mut Store, name: &str) -> Result<()> {
        store.put_table(name, &self.to_frame()?)
    }

    fn load_from(store: &Store, name: &str) -> Result<Self> {
        let df = store.get_table(name)?;
        Ok(Self {
            uid: u32_column(&df, "uID")?,
            nid: opt_u32_column(&df, "nID")?,
            distance: f64_column(&df, "distance")?,
            buildings_in_between: opt_u32_column(&df, "buildings_in_between")?,
            paved: opt_u32_column(&df, "paved")?,
        })
    }
}

/// For every building, draw the straight line from its centroid to the closest
/// point of the nearest road within `config.max_distance` and count the other
/// buildings it crosses. Buildings without a road in range get no values.
pub fn road_access(buildings: &Buildings, roads: &Roads, config: &RoadAccessConfig) -> RoadAccess {
    let n = buildings.len();
    let mut access = RoadAccess {
        uid: buildings.uids().to_vec(),
        nid: Vec::with_capacity(n),
        distance: Vec::with_capacity(n),
        buildings_in_between: Vec::with_capacity(n),
        paved: Vec::with_capacity(n),
    };

    for (i, shape) in buildings.geoms().shapes().iter().enumerate() {
        let nearest = shape.centroid()
            .and_then(|c| roads.lines().nearest(c.0, config.max_distance).map(|hit| (c, hit)));
        let Some((centroid, (road, distance, point))) = nearest else {
            access.nid.push(None);
            access.distance.push(None);
            access.buildings_in_between.push(None);
            access.paved.push(None);
            continue;
        };

        let path = Line::new(centroid.0, point);
        let crossed = buildings.geoms().intersecting(&path).into_iter().filter(|&j| j != i).count();
        let paved = roads.surfaces()[road].as_deref() == Some(config.paved_value.as_str());

        access.nid.push(Some(roads.nids()[road]));
        access.distance.push(Some(distance));
        access.buildings_in_between.push(Some(crossed as u32));
        access.paved.push(Some(paved as u32));
    }

    let unreachable = access.nid.iter().filter(|n| n.is_none()).count();
    if unreachable > 0 {
        debug!(unreachable, max_distance = config.max_distance, "buildings without a road in range");
    }
    info!(buildings = n, "road access computed");
    access
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Geometries;
    use geo::{polygon, LineString, MultiPolygon};

    fn rect(x: f64, y: f64, w: f64, h: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![(x: x, y: y), (x: x + w, y: y), (x: x + w, y: y + h), (x: x, y: y + h), (x: x, y: y)]])
    }

    #[test]
    fn counts_buildings_between_centroid_and_road() {
        // Road along y = 0; a column of three buildings north of it and one far away.
        let shapes = vec![rect(0.0, 5.0, 10.0, 10.0), rect(0.0, 20.0, 10.0, 10.0), rect(0.0, 35.0, 10.0, 10.0), rect(0.0, 900.0, 10.0, 10.0)];
        let buildings = Buildings::new(Geometries::new(shapes, 32632));
        let roads = Roads::new(
            vec![LineString::from(vec![(-50.0, 0.0), (50.0, 0.0)]), LineString::from(vec![(200.0, -50.0), (200.0, 50.0)])],
            vec![Some("paved".into()), Some("unpaved".into())],
        ).unwrap();

        let access = road_access(&buildings, &roads, &RoadAccessConfig::default());
        assert_eq!(access.nids(), &[Some(0), Some(0), Some(0), None]);
        assert_eq!(access.buildings_in_between(), &[Some(0), Some(1), Some(2), None]);
        assert_eq!(access.paved(), &[Some(1), Some(1), Some(1), None]);
        assert_eq!(access.distances()[0], Some(10.0));
    }

    #[test]
    fn unpaved_and_missing_surfaces() {
        let buildings = Buildings::new(Geometries::new(vec![rect(0.0, 5.0, 10.0, 10.0), rect(100.0, 5.0, 10.0, 10.0)], 32632));
        let roads = Roads::new(
            vec![LineString::from(vec![(-10.0, 0.0), (20.0, 0.0)]), LineString::from(vec![(90.0, 0.0), (120.0, 0.0)])],
            vec![Some("unpaved".into()), None],
        ).unwrap();
        let access = road_access(&buildings, &roads, &RoadAccessConfig::default());
        assert_eq!(access.paved(), &[Some(0), Some(0)]);
    }

    #[test]
    fn table_round_trip_through_store() {
        let buildings = Buildings::new(Geometries::new(vec![rect(0.0, 5.0, 10.0, 10.0)], 32632));
        let roads = Roads::new(vec![LineString::from(vec![(-10.0, 0.0), (20.0, 0.0)])], vec![None]).unwrap();
        let access = road_access(&buildings, &roads, &RoadAccessConfig::default());

        let mut store = Store::memory(crate::store::StoreFormat::GeoJson).unwrap();
        access.save(&mut store).unwrap();
        assert_eq!(RoadAccess::load(&store).unwrap(), access);
    }
}
