//! Store façade: owns the key-path root and the metadata KV, and routes
//! the small capability set external callers need (write-by-key,
//! read-each, count, purge, meta-get, meta-put, close) as plain inherent
//! methods — no trait-object hierarchy, per the REDESIGN in spec.md §9.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::error;

use crate::durability::DurabilityPolicy;
use crate::keystore::Key;
use crate::metastore::MetaStore;
use crate::stats::Stats;
use crate::Result;

/// The append-only, content-addressed, per-key object store.
///
/// Construction does not touch the filesystem; call [`Store::initialize`]
/// once before first use. `initialize` is idempotent and safe to call more
/// than once (e.g. from multiple HTTP handlers racing at startup).
pub struct Store {
    root: PathBuf,
    durability: DurabilityPolicy,
    meta: MetaStore,
    stats: Arc<Stats>,
    initialized: AtomicBool,
}

impl Store {
    /// Opens the metadata store and prepares (without yet creating
    /// directories) a façade rooted at `root`.
    ///
    /// # Errors
    ///
    /// Propagates any error opening the metadata KV.
    pub fn open(root: impl Into<PathBuf>, durability: DurabilityPolicy) -> Result<Self> {
        let root = root.into();
        let meta = MetaStore::open(root.join("metakvstore.bolt"))?;
        Ok(Self {
            root,
            durability,
            meta,
            stats: Arc::new(Stats::new()),
            initialized: AtomicBool::new(false),
        })
    }

    /// One-shot idempotent initialization: ensures the key root exists.
    pub fn initialize(&self) -> Result<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        std::fs::create_dir_all(self.keys_root())?;
        Ok(())
    }

    fn keys_root(&self) -> PathBuf {
        self.root.join("keys")
    }

    /// A handle to this façade's write/error counters, for a stats driver
    /// to tick and log.
    pub fn stats(&self) -> Arc<Stats> {
        self.stats.clone()
    }

    /// Appends `payload` under the logical key `name`, incrementing the
    /// writes counter on success or the errors counter on failure.
    pub fn write_to_key(&self, name: &str, payload: &[u8]) -> Result<()> {
        let key = Key::open(&self.keys_root(), name, self.durability);
        match key.append(payload) {
            Ok(()) => {
                self.stats.writes.count();
                Ok(())
            }
            Err(e) => {
                self.stats.errors.count();
                error!("write_to_key({name}): {e}");
                Err(e)
            }
        }
    }

    /// Invokes `f` once per record stored under `name`, in append order.
    pub fn read_each_from_key(
        &self,
        name: &str,
        f: impl FnMut(&mut dyn Read) -> Result<()>,
    ) -> Result<()> {
        let key = Key::open(&self.keys_root(), name, self.durability);
        key.read_each(f)
    }

    /// The number of records stored under `name`.
    pub fn get_count_from_key(&self, name: &str) -> Result<u64> {
        let key = Key::open(&self.keys_root(), name, self.durability);
        key.count()
    }

    /// Reads a metadata value. A missing key returns `Ok(None)`.
    pub fn get_meta(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.meta.get(key)
    }

    /// Writes a metadata value.
    pub fn put_meta(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.meta.put(key, value)
    }

    /// Recursively removes the store's root directory. The store is
    /// unusable afterward; non-cancellable.
    pub fn purge(&self) -> Result<()> {
        if self.root.exists() {
            std::fs::remove_dir_all(&self.root)?;
        }
        Ok(())
    }

    /// Closes the metadata KV. Idempotent.
    pub fn close(&self) -> Result<()> {
        self.meta.close()
    }

    /// The configured store root, for diagnostics.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> Store {
        let store = Store::open(dir.path(), DurabilityPolicy::Never).unwrap();
        store.initialize().unwrap();
        store
    }

    #[test]
    fn write_then_read_each_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.write_to_key("k", b"hello world, this is long enough to gzip").unwrap();

        assert_eq!(store.get_count_from_key("k").unwrap(), 1);

        let mut seen = Vec::new();
        store
            .read_each_from_key("k", |r| {
                let mut buf = Vec::new();
                r.read_to_end(&mut buf)?;
                seen.push(buf);
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec![b"hello world, this is long enough to gzip".to_vec()]);
    }

    #[test]
    fn meta_round_trips_and_missing_key_is_none() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        assert_eq!(store.get_meta(b"missing").unwrap(), None);
        store.put_meta(b"k", b"v").unwrap();
        assert_eq!(store.get_meta(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn purge_removes_root() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.write_to_key("k", b"v").unwrap();

        store.purge().unwrap();
        assert!(!dir.path().join("keys").exists());
    }

    #[test]
    fn initialize_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path(), DurabilityPolicy::Never).unwrap();
        store.initialize().unwrap();
        store.initialize().unwrap();
        assert!(dir.path().join("keys").exists());
    }
}
