use anyhow::{bail, Result};
use geo::{BoundingRect, Coord, Intersects, MultiPolygon, Rect};
use polars::prelude::*;
use tracing::info;

use crate::{
    common::{io::Features, u32_column},
    crs::Projector,
    elements::{Element, Roi},
    geom::Geometries,
    store::Store,
};

/// Analysis grid keyed by `grid_id`, numbered from 1.
#[derive(Debug, Clone)]
pub struct Grid {
    geoms: Geometries,
    grid_id: Vec<u32>,
}

impl Grid {
    /// Cells numbered `grid_id = 1..=n` in order.
    pub fn new(geoms: Geometries) -> Self {
        let n = geoms.len() as u32;
        Self { geoms, grid_id: (1..=n).collect() }
    }

    /// Read an existing grid, reprojected to `epsg`.
    pub fn from_features(features: &Features, input_epsg: u32, epsg: u32) -> Result<Self> {
        let projector = Projector::new(input_epsg, epsg)?;
        let shapes = features.polygons().into_iter()
            .map(|(_, shape)| projector.geometry(&shape))
            .collect::<Result<Vec<_>>>()?;
        if shapes.is_empty() { bail!("[grid] grid file has no polygon features") }
        info!(cells = shapes.len(), "grid loaded");
        Ok(Self::new(Geometries::new(shapes, epsg)))
    }

    #[inline] pub fn len(&self) -> usize { self.geoms.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.geoms.is_empty() }

    #[inline] pub fn geoms(&self) -> &Geometries { &self.geoms }

    #[inline] pub fn ids(&self) -> &[u32] { &self.grid_id }
}

impl Element for Grid {
    const NAME: &'static str = "grid";

    fn save_as(&self, store: &mut Store, name: &str) -> Result<()> {
        store.put_polygons(name, self.geoms.shapes(), &df!("grid_id" => &self.grid_id)?)
    }

    fn load_from(store: &Store, name: &str) -> Result<Self> {
        let (shapes, df) = store.get_polygons(name)?;
        let grid_id = u32_column(&df, "grid_id")?;
        if grid_id.len() != shapes.len() {
            bail!("[grid] {} ids for {} cells", grid_id.len(), shapes.len());
        }
        Ok(Self { geoms: Geometries::new(shapes, store.crs().unwrap_or_default()), grid_id })
    }
}

/// Regular square grid of `cell_size` covering `roi`, anchored at the lower-left
/// corner of its bounds. Cells not touching the region are skipped; the rest are
/// numbered row by row from the south-west.
pub fn generate_grid(roi: &Roi, cell_size: f64) -> Result<Grid> {
    if cell_size <= 0.0 { bail!("[grid] cell size must be positive, got {cell_size}") }
    let Some(bounds) = roi.shape().bounding_rect() else { bail!("[grid] region of interest is empty") };

    let nx = (bounds.width() / cell_size).ceil().max(1.0) as usize;
    let ny = (bounds.height() / cell_size).ceil().max(1.0) as usize;
    let origin = bounds.min();

    let shapes = (0..ny)
        .flat_map(|j| (0..nx).map(move |i| (i, j)))
        .map(|(i, j)| {
            let min = Coord { x: origin.x + i as f64 * cell_size, y: origin.y + j as f64 * cell_size };
            Rect::new(min, Coord { x: min.x + cell_size, y: min.y + cell_size })
        })
        .map(|cell| cell.to_polygon())
        .filter(|cell| roi.shape().intersects(cell))
        .map(|cell| MultiPolygon::new(vec![cell]))
        .collect::<Vec<_>>();

    info!(cells = shapes.len(), cell_size, "grid generated");
    Ok(Grid::new(Geometries::new(shapes, roi.epsg())))
}
