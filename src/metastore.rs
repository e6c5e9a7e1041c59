//! Metadata KV: a small, persistent, transactional `bytes -> bytes` map
//! used for checkpoints and other durable side state.
//!
//! The spec treats its backing engine as a black box with transactional
//! `Put`/`Get`/`Close`. This crate's `MetaStore` wraps `sled::Db` exactly
//! the way the teacher's `SledKvsEngine` does, scoped to a single named
//! tree (`"metakv"`) rather than the whole keyspace, standing in for the
//! original's named bolt bucket.

use std::path::Path;

use sled::Tree;

use crate::Result;

/// Reserved metadata key under which the ingestion consumer's last
/// committed stream offset is stored, little-endian encoded.
pub const KAFKA_LAST_OFFSET_KEY: &str = "kafka.lastoffset";

const BUCKET_NAME: &str = "metakv";

/// A persistent, transactional bytes-to-bytes metadata store.
pub struct MetaStore {
    tree: Tree,
    db: sled::Db,
}

impl MetaStore {
    /// Opens (creating if absent) the metadata store at `path`, backed by
    /// the `"metakv"` tree of an embedded `sled::Db`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)?;
        let tree = db.open_tree(BUCKET_NAME)?;
        Ok(Self { tree, db })
    }

    /// Reads `key`. A missing key returns `Ok(None)`, not an error.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.tree.get(key)?.map(|ivec| ivec.to_vec()))
    }

    /// Writes `value` under `key`, flushing before returning so the write
    /// is crash-safe.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.tree.insert(key, value)?;
        self.tree.flush()?;
        Ok(())
    }

    /// Closes the store. Idempotent: `sled::Db` is reference-counted and
    /// safely droppable more than once via repeated `flush`.
    pub fn close(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Reads the checkpointed Kafka offset, if any has been persisted.
    pub fn kafka_last_offset(&self) -> Result<Option<i64>> {
        match self.get(KAFKA_LAST_OFFSET_KEY.as_bytes())? {
            Some(bytes) if bytes.len() == 8 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes);
                Ok(Some(i64::from_le_bytes(buf)))
            }
            _ => Ok(None),
        }
    }

    /// Persists `offset` as the checkpointed Kafka offset.
    pub fn put_kafka_last_offset(&self, offset: i64) -> Result<()> {
        self.put(KAFKA_LAST_OFFSET_KEY.as_bytes(), &offset.to_le_bytes())
    }
}
