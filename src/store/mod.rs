mod format;
mod manifest;
mod source;
mod stage;

pub use format::StoreFormat;
pub use source::{DiskStore, MemStore, StageBackend, StageSink, StageSource};
pub use stage::Store;
