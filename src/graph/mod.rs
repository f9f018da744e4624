mod components;
mod contiguity;
mod graph;
mod io;
mod order;

pub use components::{connected_components, subset_components};
pub use contiguity::{queen, rook};
pub use graph::Graph;
pub use order::higher_order;
