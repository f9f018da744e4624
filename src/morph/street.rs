//! Road orientation characters.

use ahash::AHashMap;
use anyhow::Result;
use polars::prelude::*;

use crate::{
    elements::Roads,
    geom::algorithm::{cardinal_deviation, line_orientation, sample_with_direction},
};

/// Orientation (0 to 45 degrees) of every road edge, by `nID`. Closed or
/// degenerate edges have no orientation.
pub(crate) fn street_orientations(roads: &Roads) -> AHashMap<u32, f64> {
    roads.lines().lines().iter().zip(roads.nids())
        .map(|(line, &nid)| (nid, line_orientation(line)))
        .filter(|(_, orientation)| orientation.is_finite())
        .collect()
}

/// `strOri`: points every `interval` metres along each road, with the deviation
/// of the road's local direction from the cardinal directions.
pub fn road_orientation(roads: &Roads, interval: f64) -> Result<DataFrame> {
    let (mut nid, mut x, mut y, mut value) = (Vec::new(), Vec::new(), Vec::new(), Vec::new());
    for (line, &id) in roads.lines().lines().iter().zip(roads.nids()) {
        for (point, azimuth) in sample_with_direction(line, interval) {
            nid.push(id);
            x.push(point.x);
            y.push(point.y);
            value.push(cardinal_deviation(azimuth));
        }
    }
    Ok(df!("nID" => nid, "x" => x, "y" => y, "strOri" => value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::LineString;

    fn roads() -> Roads {
        Roads::new(vec![
            LineString::from(vec![(0.0, 0.0), (25.0, 0.0)]),
            LineString::from(vec![(0.0, 0.0), (10.0, 10.0), (20.0, 20.0)]),
            LineString::from(vec![(0.0, 0.0), (5.0, 5.0), (0.0, 0.0)]),
        ], vec![None; 3]).unwrap()
    }

    #[test]
    fn orientations_by_edge() {
        let orientations = street_orientations(&roads());
        assert!(orientations[&0].abs() < 1e-9);
        assert!((orientations[&1] - 45.0).abs() < 1e-9);
        assert!(!orientations.contains_key(&2));
    }

    #[test]
    fn samples_every_interval() {
        let df = road_orientation(&roads(), 10.0).unwrap();
        let first = df.column("nID").unwrap().u32().unwrap()
            .into_no_null_iter().filter(|&n| n == 0).count();
        // 25 m edge: samples at 0, 10 and 20 m.
        assert_eq!(first, 3);
        let values = df.column("strOri").unwrap().f64().unwrap();
        assert!(values.into_no_null_iter().all(|v| (0.0..=45.0).contains(&v)));
    }
}
