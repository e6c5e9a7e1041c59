//! Ingestion consumer: drains an ordered, partitioned message stream and
//! appends each message to the store, checkpointing the last committed
//! stream offset so consumption resumes exactly where it left off.

mod kafka;

pub use kafka::KafkaConsumer;
