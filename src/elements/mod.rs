mod blocks;
mod buildings;
mod checks;
mod grid;
mod roads;
mod roi;
mod tessellation;

use anyhow::Result;

use crate::store::Store;

pub use blocks::{assign_blocks, generate_blocks, Blocks};
pub use buildings::{preprocess_buildings, Buildings};
pub use checks::{check_tessellation_input, TessellationCheck};
pub use grid::{generate_grid, Grid};
pub use roads::{extend_lines, nearest_street, preprocess_roads, remove_false_nodes, Roads};
pub use roi::Roi;
pub use tessellation::{align, morphological_tessellation, AlignReport, Tessellation, Verification};

/// An urban form element collection that can be persisted in a [`Store`].
pub trait Element: Sized {
    /// Collection name inside the store.
    const NAME: &'static str;

    fn save_as(&self, store: &mut Store, name: &str) -> Result<()>;

    fn load_from(store: &Store, name: &str) -> Result<Self>;

    fn save(&self, store: &mut Store) -> Result<()> {
        self.save_as(store, Self::NAME)
    }

    fn load(store: &Store) -> Result<Self> {
        Self::load_from(store, Self::NAME)
    }
}
