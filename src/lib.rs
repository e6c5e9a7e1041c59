#![deny(missing_docs)]

//! An append-only, content-addressed, per-key object store.
//!
//! A caller supplies a logical key name and an opaque byte payload; the
//! store persists the payload as an immutable record under that key,
//! deduplicates by content hash, preserves append order, and lets readers
//! iterate all records written to a key. The on-disk layout is
//! content-addressed per key (`keystore`), with a separate write-ahead-log
//! variant (`txlog`) available as an alternate write path, a transactional
//! metadata store (`metastore`) for checkpoints, and an ingestion consumer
//! (`consumer`) that drains a Kafka partition into the store.

mod blobgen;
mod consumer;
mod durability;
mod error;
mod fluentio;
mod http;
mod keyname;
mod keystore;
mod metastore;
mod stats;
mod store;
mod txlog;

pub use blobgen::{generate_blob, generate_blobs};
pub use consumer::KafkaConsumer;
pub use durability::DurabilityPolicy;
pub use error::{AstoreError, Result};
pub use http::routes;
pub use keyname::HashableKey;
pub use keystore::{Key, MAX_CONTENT_FILE_SIZE, MAX_HASH_LOG_SIZE, MIN_GZ_SIZE};
pub use metastore::{MetaStore, KAFKA_LAST_OFFSET_KEY};
pub use stats::{Counter, Stats};
pub use store::Store;
pub use txlog::KeyTxLog;
