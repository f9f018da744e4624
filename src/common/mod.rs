mod frame;
mod fs;
mod hash;
pub(crate) mod io;

pub(crate) use frame::*;
pub(crate) use fs::*;
pub(crate) use hash::*;
