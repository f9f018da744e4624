use ahash::AHashMap;
use anyhow::{bail, Result};
use geo::{
    algorithm::line_intersection::{line_intersection, LineIntersection},
    Coord, Intersects, Line, LineString,
};
use polars::prelude::*;
use tracing::{debug, info};

use crate::{
    common::{io::Features, opt_str_column, u32_column},
    config::RoadsConfig,
    crs::Projector,
    elements::{Element, Roi},
    geom::{algorithm::{coord_distance, end_direction}, Geometries, Polylines},
    store::Store,
};

/// Road edges keyed by `nID`, with their surface attribute when present.
#[derive(Debug, Clone)]
pub struct Roads {
    lines: Polylines,
    nid: Vec<u32>,
    surface: Vec<Option<String>>,
}

impl Roads {
    /// Roads numbered `nID = 0..n`.
    pub fn new(lines: Vec<LineString<f64>>, surface: Vec<Option<String>>) -> Result<Self> {
        if surface.len() != lines.len() {
            bail!("[roads] {} surface values for {} edges", surface.len(), lines.len());
        }
        let n = lines.len() as u32;
        Ok(Self { lines: Polylines::new(lines), nid: (0..n).collect(), surface })
    }

    #[inline] pub fn len(&self) -> usize { self.lines.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.lines.is_empty() }

    #[inline] pub fn lines(&self) -> &Polylines { &self.lines }

    #[inline] pub fn nids(&self) -> &[u32] { &self.nid }

    #[inline] pub fn surfaces(&self) -> &[Option<String>] { &self.surface }

    pub fn to_frame(&self) -> Result<DataFrame> {
        Ok(df!("nID" => &self.nid, "surface" => &self.surface)?)
    }
}

impl Element for Roads {
    const NAME: &'static str = "roads";

    fn save_as(&self, store: &mut Store, name: &str) -> Result<()> {
        store.put_lines(name, self.lines.lines(), &self.to_frame()?)
    }

    fn load_from(store: &Store, name: &str) -> Result<Self> {
        let (lines, df) = store.get_lines(name)?;
        let nid = u32_column(&df, "nID")?;
        let surface = opt_str_column(&df, "surface")?;
        if nid.len() != lines.len() {
            bail!("[roads] {} ids for {} edges", nid.len(), lines.len());
        }
        Ok(Self { lines: Polylines::new(lines), nid, surface })
    }
}

type NodeKey = (u64, u64);

#[inline]
fn node_key(c: Coord<f64>) -> NodeKey { (c.x.to_bits(), c.y.to_bits()) }

/// Edge ends incident to every node.
fn incidence(lines: &[LineString<f64>]) -> AHashMap<NodeKey, Vec<(usize, bool)>> {
    let mut nodes: AHashMap<NodeKey, Vec<(usize, bool)>> = AHashMap::new();
    for (i, line) in lines.iter().enumerate() {
        let (Some(&first), Some(&last)) = (line.0.first(), line.0.last()) else { continue };
        nodes.entry(node_key(first)).or_default().push((i, true));
        nodes.entry(node_key(last)).or_default().push((i, false));
    }
    nodes
}

/// Merge edges that meet at nodes of degree two.
///
/// Returns each merged line with the index of its first source edge; merged
/// edges inherit the attributes of that edge. Closed chains of degree-two
/// nodes become a single ring.
pub fn remove_false_nodes(lines: &[LineString<f64>]) -> Vec<(LineString<f64>, usize)> {
    let nodes = incidence(lines);
    let is_false = |c: Coord<f64>| nodes.get(&node_key(c)).is_some_and(|ends| ends.len() == 2 && ends[0].0 != ends[1].0);

    let mut used = vec![false; lines.len()];
    let mut out = Vec::new();

    // Walk forward from edge `first` through false nodes, appending edges.
    let walk = |first: usize, reversed: bool, used: &mut Vec<bool>| -> LineString<f64> {
        used[first] = true;
        let mut coords = lines[first].0.clone();
        if reversed { coords.reverse() }
        loop {
            let Some(&end) = coords.last() else { break };
            if !is_false(end) { break }
            let Some(ends) = nodes.get(&node_key(end)) else { break };
            let Some(&(next, at_start)) = ends.iter().find(|(e, _)| !used[*e]) else { break };
            used[next] = true;
            let mut more = lines[next].0.clone();
            if !at_start { more.reverse() }
            coords.extend(more.into_iter().skip(1));
        }
        LineString::new(coords)
    };

    for i in 0..lines.len() {
        if used[i] || lines[i].0.len() < 2 { continue }
        let (first, last) = (lines[i].0[0], lines[i].0[lines[i].0.len() - 1]);
        match (is_false(first), is_false(last)) {
            (true, true) => continue,
            (true, false) => out.push((walk(i, true, &mut used), i)),
            _ => out.push((walk(i, false, &mut used), i)),
        }
    }
    // Whatever is left forms closed chains.
    for i in 0..lines.len() {
        if used[i] || lines[i].0.len() < 2 { continue }
        out.push((walk(i, false, &mut used), i));
    }
    out.sort_by_key(|&(_, i)| i);
    out
}

/// Select, reproject, clip and simplify road edges for `roi`.
///
/// Features are kept when their `subtype` matches (if that attribute exists)
/// and their `class` is allowed. Lines are reprojected to the UTM zone of the
/// region, kept when they intersect it and exploded. False nodes are removed,
/// and edges are numbered `nID = 0..n`.
pub fn preprocess_roads(features: &Features, roi: &Roi, config: &RoadsConfig, input_epsg: u32) -> Result<Roads> {
    let check_subtype = !config.subtype.is_empty() && features.has_property("subtype");
    let accepted = |idx: usize| {
        let subtype_ok = !check_subtype || features.property_str(idx, "subtype").as_deref() == Some(config.subtype.as_str());
        let class_ok = config.classes.is_empty()
            || features.property_str(idx, "class").is_some_and(|c| config.classes.contains(&c));
        subtype_ok && class_ok
    };

    let projector = Projector::new(input_epsg, roi.epsg())?;
    let mut lines = Vec::new();
    let mut source = Vec::new();
    for (idx, line) in features.lines() {
        if !accepted(idx) { continue }
        let line = projector.geometry(&line)?;
        if line.intersects(roi.shape()) {
            lines.push(line);
            source.push(idx);
        }
    }
    info!(edges = lines.len(), "processing roads");

    let merged = remove_false_nodes(&lines);
    debug!(before = lines.len(), after = merged.len(), "false nodes removed");

    let (lines, surface) = merged.into_iter()
        .map(|(line, first)| (line, features.property_str(source[first], &config.surface_field)))
        .unzip();
    Roads::new(lines, surface)
}

/// `nID` of the road nearest to each building within `max_distance`.
pub fn nearest_street(buildings: &Geometries, roads: &Roads, max_distance: f64) -> Vec<Option<u32>> {
    buildings.shapes().iter()
        .map(|shape| roads.lines().nearest_to_shape(shape, max_distance).map(|(i, _)| roads.nids()[i]))
        .collect()
}

/// First point where the segment `ray` meets one of `candidates`, beyond its start.
fn first_hit(ray: &Line<f64>, candidates: impl Iterator<Item = Line<f64>>) -> Option<Coord<f64>> {
    candidates
        .filter_map(|segment| match line_intersection(*ray, segment)? {
            LineIntersection::SinglePoint { intersection, .. } => Some(intersection),
            LineIntersection::Collinear { intersection } => {
                [intersection.start, intersection.end].into_iter()
                    .min_by(|a, b| coord_distance(ray.start, *a).total_cmp(&coord_distance(ray.start, *b)))
            }
        })
        .map(|c| (coord_distance(ray.start, c), c))
        .filter(|&(d, _)| d > 1e-9)
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| c)
}

/// Extend dangling road ends along their final direction by up to `tolerance`
/// when the extension reaches another road or a boundary of `target` without
/// crossing any shape of `barrier`.
pub fn extend_lines(roads: &Roads, tolerance: f64, target: &Geometries, barrier: &Geometries) -> Result<Roads> {
    let lines = roads.lines().lines();
    let nodes = incidence(lines);
    let dangling = |c: Coord<f64>| nodes.get(&node_key(c)).is_some_and(|ends| ends.len() == 1);

    let boundaries = Polylines::new(
        target.shapes().iter()
            .flat_map(|shape| shape.0.iter())
            .flat_map(|polygon| std::iter::once(polygon.exterior().clone()).chain(polygon.interiors().iter().cloned()))
            .collect(),
    );

    let reach = |line: &LineString<f64>, own: usize| -> Option<Coord<f64>> {
        let start = *line.0.last()?;
        if !dangling(start) { return None }
        let direction = end_direction(line)?;
        let ray = Line::new(start, start + direction * tolerance);

        let road_segments = roads.lines().intersecting(&ray).into_iter()
            .filter(|&j| j != own)
            .flat_map(|j| lines[j].lines());
        let boundary_segments = boundaries.intersecting(&ray).into_iter()
            .flat_map(|j| boundaries.line(j).lines());
        let hit = first_hit(&ray, road_segments.chain(boundary_segments))?;

        let extension = Line::new(start, hit);
        barrier.intersecting(&extension).is_empty().then_some(hit)
    };

    let mut extended = 0;
    let out = lines.iter().enumerate()
        .map(|(i, line)| {
            let mut coords = line.0.clone();
            if let Some(hit) = reach(line, i) {
                coords.push(hit);
                extended += 1;
            }
            let reversed = LineString::new(line.0.iter().rev().copied().collect());
            if let Some(hit) = reach(&reversed, i) {
                coords.insert(0, hit);
                extended += 1;
            }
            LineString::new(coords)
        })
        .collect::<Vec<_>>();
    debug!(extended, "dangling road ends extended");

    Ok(Roads { lines: Polylines::new(out), nid: roads.nids().to_vec(), surface: roads.surfaces().to_vec() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, polygon, Geometry, MultiPolygon};
    use serde_json::{json, Map};

    fn ls(coords: &[(f64, f64)]) -> LineString<f64> { LineString::from(coords.to_vec()) }

    fn rect(x: f64, y: f64, w: f64, h: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![(x: x, y: y), (x: x + w, y: y), (x: x + w, y: y + h), (x: x, y: y + h), (x: x, y: y)]])
    }

    #[test]
    fn false_nodes_are_merged() {
        // a-b-c is a chain through a degree-2 node; d branches at c.
        let lines = vec![
            ls(&[(0.0, 0.0), (10.0, 0.0)]),
            ls(&[(20.0, 0.0), (10.0, 0.0)]),
            ls(&[(20.0, 0.0), (30.0, 0.0)]),
            ls(&[(20.0, 0.0), (20.0, 10.0)]),
        ];
        let merged = remove_false_nodes(&lines);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0], (ls(&[(0.0, 0.0), (10.0, 0.0), (20.0, 0.0)]), 0));
        assert_eq!(merged[1].1, 2);
        assert_eq!(merged[2].1, 3);
    }

    #[test]
    fn closed_chain_becomes_one_ring() {
        let lines = vec![
            ls(&[(0.0, 0.0), (10.0, 0.0)]),
            ls(&[(10.0, 0.0), (10.0, 10.0)]),
            ls(&[(10.0, 10.0), (0.0, 0.0)]),
        ];
        let merged = remove_false_nodes(&lines);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].0.0.len(), 4);
    }

    #[test]
    fn roads_are_filtered_by_class_and_subtype() {
        let roi = Roi::from_lonlat(MultiPolygon::new(vec![polygon![
            (x: 8.50, y: 12.00), (x: 8.51, y: 12.00), (x: 8.51, y: 12.01), (x: 8.50, y: 12.01), (x: 8.50, y: 12.00),
        ]])).unwrap();
        let props = |class: &str, subtype: &str| {
            let mut m = Map::new();
            m.insert("class".into(), json!(class));
            m.insert("subtype".into(), json!(subtype));
            m.insert("surface".into(), json!("paved"));
            m
        };
        let road = Geometry::LineString(ls(&[(8.501, 12.005), (8.509, 12.005)]));
        let features = Features::new(
            vec![road.clone(), road.clone(), road],
            vec![props("residential", "road"), props("footway", "road"), props("residential", "rail")],
        );

        let roads = preprocess_roads(&features, &roi, &RoadsConfig::default(), 4326).unwrap();
        assert_eq!(roads.len(), 1);
        assert_eq!(roads.nids(), &[0]);
        assert_eq!(roads.surfaces()[0].as_deref(), Some("paved"));

        let all = RoadsConfig { classes: vec![], subtype: String::new(), ..Default::default() };
        // Identical edges meet at degree-3 nodes and stay separate.
        assert_eq!(preprocess_roads(&features, &roi, &all, 4326).unwrap().len(), 3);
    }

    #[test]
    fn nearest_street_respects_distance() {
        let roads = Roads::new(vec![ls(&[(0.0, 0.0), (100.0, 0.0)])], vec![None]).unwrap();
        let buildings = Geometries::new(vec![rect(10.0, 5.0, 5.0, 5.0), rect(10.0, 900.0, 5.0, 5.0)], 32632);
        assert_eq!(nearest_street(&buildings, &roads, 500.0), vec![Some(0), None]);
    }

    #[test]
    fn dangling_end_extends_to_crossing_road_unless_blocked() {
        let roads = Roads::new(vec![
            ls(&[(0.0, 0.0), (0.0, 50.0)]),
            ls(&[(-100.0, 80.0), (100.0, 80.0)]),
        ], vec![None, None]).unwrap();
        let empty = Geometries::new(vec![], 32632);

        let extended = extend_lines(&roads, 40.0, &empty, &empty).unwrap();
        assert_eq!(extended.lines().line(0).0.last(), Some(&coord! { x: 0.0, y: 80.0 }));
        // Road 1's ends point away from everything and stay put.
        assert_eq!(extended.lines().line(1), roads.lines().line(1));

        let wall = Geometries::new(vec![rect(-5.0, 60.0, 10.0, 5.0)], 32632);
        let blocked = extend_lines(&roads, 40.0, &empty, &wall).unwrap();
        assert_eq!(blocked.lines().line(0), roads.lines().line(0));

        let short = extend_lines(&roads, 20.0, &empty, &empty).unwrap();
        assert_eq!(short.lines().line(0), roads.lines().line(0));
    }
}
