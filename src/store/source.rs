use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};

/// Read-only access to stage files by store-relative path, e.g.
/// "geom/buildings.geoparquet", "graph/queen_1.csr.bin", "manifest.json".
pub trait StageSource: Send + Sync {
    fn get(&self, rel: &str) -> Result<Arc<[u8]>>;
    fn has(&self, rel: &str) -> bool;
}

/// Write access to stage files by store-relative path.
pub trait StageSink: Send + Sync {
    fn put(&mut self, rel: &str, bytes: &[u8]) -> Result<()>;
    fn remove(&mut self, rel: &str) -> Result<()>;
}

/// A store backend that can both read and write.
pub trait StageBackend: StageSource + StageSink {}

impl<T: StageSource + StageSink> StageBackend for T {}

/// Directory-backed stage store.
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    fn full(&self, rel: &str) -> PathBuf { self.root.join(rel) }
}

impl StageSource for DiskStore {
    fn get(&self, rel: &str) -> Result<Arc<[u8]>> {
        let path = self.full(rel);
        let bytes = std::fs::read(&path)
            .with_context(|| format!("[store] Failed to read {}", path.display()))?;
        Ok(Arc::from(bytes))
    }

    fn has(&self, rel: &str) -> bool { self.full(rel).exists() }
}

impl StageSink for DiskStore {
    fn put(&mut self, rel: &str, bytes: &[u8]) -> Result<()> {
        let path = self.full(rel);
        if let Some(parent) = path.parent() {
            crate::common::ensure_dir_exists(parent)?;
        }
        std::fs::write(&path, bytes)
            .with_context(|| format!("[store] Failed to write {}", path.display()))
    }

    fn remove(&mut self, rel: &str) -> Result<()> {
        let path = self.full(rel);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("[store] Failed to remove {}", path.display()))?;
        }
        Ok(())
    }
}

/// In-memory stage store, keyed by store-relative path.
#[derive(Default, Clone)]
pub struct MemStore {
    files: BTreeMap<String, Arc<[u8]>>,
}

impl MemStore {
    pub fn new() -> Self { Self::default() }

    /// Relative paths of all stored files.
    pub fn paths(&self) -> impl Iterator<Item = &str> { self.files.keys().map(String::as_str) }
}

impl StageSource for MemStore {
    fn get(&self, rel: &str) -> Result<Arc<[u8]>> {
        self.files.get(rel).cloned()
            .ok_or_else(|| anyhow!("[store] missing stage file: {rel}"))
    }

    fn has(&self, rel: &str) -> bool { self.files.contains_key(rel) }
}

impl StageSink for MemStore {
    fn put(&mut self, rel: &str, bytes: &[u8]) -> Result<()> {
        self.files.insert(rel.to_string(), Arc::from(bytes.to_vec()));
        Ok(())
    }

    fn remove(&mut self, rel: &str) -> Result<()> {
        self.files.remove(rel);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &mut dyn StageBackend) {
        assert!(!store.has("data/a.csv"));
        store.put("data/a.csv", b"x,y\n1,2\n").unwrap();
        assert!(store.has("data/a.csv"));
        assert_eq!(&*store.get("data/a.csv").unwrap(), b"x,y\n1,2\n");
        store.remove("data/a.csv").unwrap();
        assert!(!store.has("data/a.csv"));
        assert!(store.get("data/a.csv").is_err());
        store.remove("data/a.csv").unwrap();
    }

    #[test]
    fn memory_store_put_get_remove() {
        exercise(&mut MemStore::new());
    }

    #[test]
    fn disk_store_put_get_remove() {
        let tmp = tempfile::tempdir().unwrap();
        exercise(&mut DiskStore::new(tmp.path()));
    }
}
