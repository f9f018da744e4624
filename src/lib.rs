#![doc = "Urban form indicators from building footprints: morphological informality and road access deprivation"]
mod common;
mod geom;
mod graph;

pub mod aggregate;
pub mod cluster;
pub mod config;
pub mod crs;
pub mod elements;
pub mod model;
pub mod morph;
pub mod pipeline;
pub mod road_access;
pub mod store;

#[doc(inline)]
pub use common::io::Features;

#[doc(inline)]
pub use geom::{Geometries, Polylines};

#[doc(inline)]
pub use graph::{connected_components, higher_order, queen, rook, subset_components, Graph};

#[doc(inline)]
pub use config::Config;

#[doc(inline)]
pub use pipeline::{GridLayer, Inputs, Pipeline, Stage};

#[doc(inline)]
pub use store::{Store, StoreFormat};
