use std::io;
use thiserror::Error;

/// Error type for astore operations.
#[derive(Error, Debug)]
pub enum AstoreError {
    /// IO error from file or network operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Embedded metadata store error.
    #[error("metadata store error: {0}")]
    Sled(#[from] sled::Error),

    /// Kafka client error from the ingestion consumer.
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// Payload exceeded `MAX_CONTENT_FILE_SIZE`.
    #[error("content size ({size}) is greater than the maximum ({max})")]
    PayloadTooLarge {
        /// Size of the rejected payload.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// A WAL append was given a zero-length payload.
    #[error("empty payloads are not allowed")]
    EmptyPayload,

    /// A per-key hash log is at or would cross `MAX_HASH_LOG_SIZE`.
    #[error("reached the max hash log size: {0}")]
    HashLogFull(u64),

    /// A WAL block's magic number didn't match.
    #[error("invalid content block; magic {found:#X} doesn't match magic number: {expected:#X}")]
    InvalidBlock {
        /// Magic number found on disk.
        found: u32,
        /// Expected magic number.
        expected: u32,
    },

    /// Fewer bytes were written than requested.
    #[error("short write: expected {expected}, wrote {actual}")]
    ShortWrite {
        /// Bytes that should have been written.
        expected: usize,
        /// Bytes actually written.
        actual: usize,
    },

    /// Sentinel returned by `KeyTxLog::rotate` when `writing/tx.log` does not
    /// exist. Not exceptional: callers are expected to handle it gracefully.
    #[error("tx log file is missing")]
    MissingTxLog,

    /// A hash-log line referenced a content file that is no longer present.
    #[error("content file missing for hash log entry: {0}")]
    OrphanHashLogEntry(String),

    /// HTTP boundary: request carried no content-type or an unsupported one.
    #[error("missing or invalid Content-Type. Request content type must be application/json")]
    InvalidContentType,

    /// HTTP boundary: append only accepts POST requests.
    #[error("append only accepts POST requests")]
    InvalidMethod,

    /// HTTP boundary: missing 'key' in the request URL.
    #[error("missing 'key' in the request URL")]
    MissingKey,

    /// HTTP boundary: request had an empty body.
    #[error("request must have a body")]
    EmptyBody,

    /// HTTP boundary: requested resource does not exist.
    #[error("404 resource not found")]
    NotFound,

    /// Catch-all for conditions reported as plain strings (mirrors the
    /// teacher's `StringError` for messages relayed from elsewhere).
    #[error("{0}")]
    StringError(String),
}

/// Result type alias for astore operations.
pub type Result<T> = std::result::Result<T, AstoreError>;
