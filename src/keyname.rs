//! Hashable key: the 160-bit SHA-1 fingerprint of a caller-supplied logical
//! key name, used both as a filesystem path component and as the in-block
//! key field of the transaction log.

use sha1::{Digest, Sha1};

/// A 40-character uppercase hex SHA-1 fingerprint of a logical key name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashableKey {
    raw: [u8; 20],
}

impl HashableKey {
    /// Computes the fingerprint of `name`. The empty string is a valid
    /// input and produces a valid fingerprint.
    pub fn fingerprint(name: &str) -> Self {
        let mut raw = [0u8; 20];
        raw.copy_from_slice(&sha1_digest(name.as_bytes()));
        Self { raw }
    }

    /// Builds a fingerprint directly from its raw 20 bytes, e.g. when
    /// decoding a transaction-log block header.
    pub fn from_raw(raw: [u8; 20]) -> Self {
        Self { raw }
    }

    /// The raw 20-byte digest, as stored in the WAL block header.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.raw
    }

    /// The 40-character uppercase hex text form, used as a path component.
    pub fn as_hex(&self) -> String {
        hex_upper(&self.raw)
    }
}

/// Renders `bytes` as uppercase hex.
pub fn hex_upper(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02X}", b));
    }
    s
}

/// The raw 20-byte SHA-1 digest of `bytes`.
pub fn sha1_digest(bytes: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut raw = [0u8; 20];
    raw.copy_from_slice(&digest);
    raw
}

/// The 40-character uppercase hex SHA-1 digest of `bytes`, used for content
/// record identifiers.
pub fn sha1_hex_upper(bytes: &[u8]) -> String {
    hex_upper(&sha1_digest(bytes))
}
