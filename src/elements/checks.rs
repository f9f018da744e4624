use anyhow::Result;
use geo::Relate;
use tracing::debug;

use crate::geom::{algorithm::erosion_parts, Geometries};

/// Buildings that would break a morphological tessellation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TessellationCheck {
    /// Shapes that vanish when shrunk inwards.
    pub collapse: Vec<usize>,
    /// Shapes that fall apart into several pieces when shrunk inwards.
    pub split: Vec<usize>,
    /// Shapes whose interiors overlap another shape.
    pub overlap: Vec<usize>,
}

impl TessellationCheck {
    /// Sorted union of all flagged indices.
    pub fn flagged(&self) -> Vec<usize> {
        let mut all = [&self.collapse[..], &self.split[..], &self.overlap[..]].concat();
        all.sort_unstable();
        all.dedup();
        all
    }
}

/// Flag shapes that collapse or split under an inward shrink of `shrink`,
/// and every shape of an overlapping pair.
pub fn check_tessellation_input(geoms: &Geometries, shrink: f64) -> Result<TessellationCheck> {
    let mut check = TessellationCheck::default();

    for (i, shape) in geoms.shapes().iter().enumerate() {
        let parts = shape.0.iter().map(|polygon| erosion_parts(polygon, shrink)).sum::<usize>();
        match parts {
            0 => check.collapse.push(i),
            1 => {}
            _ => check.split.push(i),
        }
    }

    let mut overlapping = vec![false; geoms.len()];
    for i in 0..geoms.len() {
        for j in geoms.candidates(i, 0.0).filter(|&j| j > i) {
            // Interiors meet and each has interior outside the other.
            if geoms.shape(i).relate(geoms.shape(j)).matches("2*2***2**")? {
                overlapping[i] = true;
                overlapping[j] = true;
            }
        }
    }
    check.overlap = (0..geoms.len()).filter(|&i| overlapping[i]).collect();

    debug!(
        collapse = check.collapse.len(),
        split = check.split.len(),
        overlap = check.overlap.len(),
        "tessellation input check",
    );
    Ok(check)
}
