mod csv;
mod features;
mod geojson;
#[cfg(feature = "parquet")]
mod geoparquet;
#[cfg(feature = "parquet")]
mod parquet;
mod shp;
mod wkb;

pub(crate) use csv::*;
pub use features::Features;
pub(crate) use geojson::*;
#[cfg(feature = "parquet")]
pub(crate) use geoparquet::*;
#[cfg(feature = "parquet")]
pub(crate) use parquet::*;
