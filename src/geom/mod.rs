pub(crate) mod algorithm;
mod bbox;
mod geom;

pub use geom::{Geometries, Polylines};
