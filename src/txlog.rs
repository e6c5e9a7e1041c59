//! Transaction log: a single write-ahead log shared across all keys, with
//! atomic-rename rotation from the active `writing/tx.log` slot to
//! immutable, time-sortable segments under `reading/`.

use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crc::{Crc, CRC_64_GO_ISO};

use crate::error::AstoreError;
use crate::keyname::HashableKey;
use crate::Result;

/// Magic number at the head of every transaction-log block.
pub const BLOCK_MAGIC: u32 = 0xff00_ff00;

/// Size in bytes of a block header: magic(4) + crc64(8) + key_sha1(20) +
/// length(8).
const HEADER_LEN: usize = 4 + 8 + 20 + 8;

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_GO_ISO);

/// Shared write-ahead log. Writers are serialized by an internal mutex so
/// headers and payloads are never interleaved by concurrent appends.
pub struct KeyTxLog {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl KeyTxLog {
    /// Initializes the WAL directory layout under `root`, idempotently:
    /// creates `writing/` and `reading/` if absent, creates an empty
    /// `writing/tx.log` if absent, then validates that all paths exist and
    /// are owner read+write. Validation failure is fatal to construction.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let writing_dir = root.join("writing");
        let reading_dir = root.join("reading");
        fs::create_dir_all(&writing_dir)?;
        fs::create_dir_all(&reading_dir)?;

        let tx_log = writing_dir.join("tx.log");
        if !tx_log.exists() {
            OpenOptions::new().create(true).write(true).open(&tx_log)?;
        }

        for path in [&writing_dir, &reading_dir, &tx_log] {
            let meta = fs::metadata(path)?;
            let mode = meta.permissions().mode();
            if mode & 0o600 != 0o600 {
                return Err(AstoreError::StringError(format!(
                    "{} is not owner read+write",
                    path.display()
                )));
            }
        }

        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    fn tx_log_path(&self) -> PathBuf {
        self.root.join("writing").join("tx.log")
    }

    fn reading_dir(&self) -> PathBuf {
        self.root.join("reading")
    }

    /// Appends one block — a 40-byte little-endian header followed by
    /// `payload` — to `writing/tx.log`.
    ///
    /// # Errors
    ///
    /// `EmptyPayload` if `payload` is empty; `ShortWrite` if fewer bytes
    /// were written than intended.
    pub fn append(&self, key_name: &str, payload: &[u8]) -> Result<()> {
        if payload.is_empty() {
            return Err(AstoreError::EmptyPayload);
        }

        let _guard = self.write_lock.lock().unwrap();

        let mut file = OpenOptions::new().create(true).append(true).open(self.tx_log_path())?;

        let mut block = Vec::with_capacity(HEADER_LEN + payload.len());
        block.extend_from_slice(&BLOCK_MAGIC.to_le_bytes());
        let checksum = CRC64.checksum(payload);
        block.extend_from_slice(&checksum.to_le_bytes());
        block.extend_from_slice(HashableKey::fingerprint(key_name).as_bytes());
        block.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        block.extend_from_slice(payload);

        let expected = block.len();
        let written = file.write(&block)?;
        if written != expected {
            return Err(AstoreError::ShortWrite {
                expected,
                actual: written,
            });
        }
        file.flush()?;

        Ok(())
    }

    /// Renames `writing/tx.log` to a time-stamped segment under
    /// `reading/`, returning the new path.
    ///
    /// # Errors
    ///
    /// Returns the sentinel `MissingTxLog` if the active log does not
    /// exist — a normal condition after a prior rotation with no
    /// intervening append, not an exceptional one.
    pub fn rotate(&self) -> Result<PathBuf> {
        let _guard = self.write_lock.lock().unwrap();

        let src = self.tx_log_path();
        if !src.exists() {
            return Err(AstoreError::MissingTxLog);
        }

        let now = chrono::Utc::now();
        let name = format!("tx-{}.log", now.format("%Y%m%dT%H%M%S%.9fZ"));
        let dest = self.reading_dir().join(name);
        fs::rename(&src, &dest)?;

        Ok(dest)
    }

    /// Walks blocks in `segment` from start to EOF, invoking
    /// `callback(key_fingerprint, limited_reader)` for each. EOF is not an
    /// error. The callback must fully consume its reader.
    ///
    /// # Errors
    ///
    /// `InvalidBlock` if a block's magic number does not match.
    pub fn read_log(
        &self,
        segment: &Path,
        mut callback: impl FnMut(HashableKey, &mut dyn Read) -> Result<()>,
    ) -> Result<()> {
        let mut file = std::fs::File::open(segment)?;

        loop {
            let mut header = [0u8; HEADER_LEN];
            match read_exact_or_eof(&mut file, &mut header)? {
                false => return Ok(()),
                true => {}
            }

            let magic = u32::from_le_bytes(header[0..4].try_into().unwrap());
            if magic != BLOCK_MAGIC {
                return Err(AstoreError::InvalidBlock {
                    found: magic,
                    expected: BLOCK_MAGIC,
                });
            }

            let mut key_raw = [0u8; 20];
            key_raw.copy_from_slice(&header[12..32]);
            let key = HashableKey::from_raw(key_raw);

            let length = u64::from_le_bytes(header[32..40].try_into().unwrap());
            let mut limited = (&mut file).take(length);
            callback(key, &mut limited)?;

            // Drain anything the callback left unread so the next header
            // lines up, matching the "hard upper bound" contract.
            std::io::copy(&mut limited, &mut std::io::sink())?;
        }
    }
}

/// Reads exactly `buf.len()` bytes, or reports a clean EOF (`Ok(false)`) if
/// zero bytes were available at the start of the read.
fn read_exact_or_eof(file: &mut std::fs::File, buf: &mut [u8]) -> Result<bool> {
    let mut total = 0;
    while total < buf.len() {
        let n = file.read(&mut buf[total..])?;
        if n == 0 {
            if total == 0 {
                return Ok(false);
            }
            return Err(AstoreError::ShortWrite {
                expected: buf.len(),
                actual: total,
            });
        }
        total += n;
    }
    Ok(true)
}
