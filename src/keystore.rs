//! Per-key store: content-hashing, deduplicating append path for a single
//! logical key, plus the per-key hash log that is the authoritative read
//! order.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use flate2::bufread::GzDecoder;

use crate::durability::DurabilityPolicy;
use crate::error::AstoreError;
use crate::fluentio::FluentWriter;
use crate::keyname::{sha1_hex_upper, HashableKey};
use crate::Result;

/// Payloads larger than this are rejected with `PayloadTooLarge`.
pub const MAX_CONTENT_FILE_SIZE: usize = 500 * 1024;

/// Payloads at or above this size are stored gzip-compressed.
pub const MIN_GZ_SIZE: usize = 160;

/// The per-key hash log is not allowed to grow past this size.
pub const MAX_HASH_LOG_SIZE: u64 = 41 * 1024 * 1024;

/// Append-only, content-addressed store for a single logical key.
///
/// Content files live under `<dir>/data/<CONTENT-SHA1>.{gz,bin}`; the hash
/// log at `<dir>/txlog` is a newline-separated list of those file names, in
/// append order, and is the sole authority for read order.
pub struct Key {
    name: String,
    dir: PathBuf,
    durability: DurabilityPolicy,
    /// Cached hash-log lines, loaded lazily on first `count` or `read_each`.
    cached_lines: Mutex<Option<Vec<String>>>,
}

impl Key {
    /// Opens (without yet creating any directory) the per-key store for
    /// `name`, rooted at `<keys_root>/<fan-out>/<fingerprint>`.
    pub fn open(keys_root: &Path, name: &str, durability: DurabilityPolicy) -> Self {
        let fp = HashableKey::fingerprint(name);
        let hex = fp.as_hex();
        let dir = keys_root
            .join(&hex[0..1])
            .join(&hex[1..2])
            .join(&hex[2..3])
            .join(&hex);
        Self {
            name: name.to_owned(),
            dir,
            durability,
            cached_lines: Mutex::new(None),
        }
    }

    /// The original, pre-fingerprint key name.
    pub fn key_name(&self) -> &str {
        &self.name
    }

    fn data_dir(&self) -> PathBuf {
        self.dir.join("data")
    }

    fn hash_log_path(&self) -> PathBuf {
        self.dir.join("txlog")
    }

    /// Appends `payload` under this key.
    ///
    /// # Errors
    ///
    /// Returns `PayloadTooLarge` if `payload` exceeds
    /// [`MAX_CONTENT_FILE_SIZE`], `HashLogFull` if the hash log has reached
    /// [`MAX_HASH_LOG_SIZE`], or an IO error from the underlying
    /// filesystem. A content file that already exists (same content SHA-1)
    /// is treated as success without writing anything (idempotent dedup).
    pub fn append(&self, payload: &[u8]) -> Result<()> {
        if payload.len() > MAX_CONTENT_FILE_SIZE {
            return Err(AstoreError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_CONTENT_FILE_SIZE,
            });
        }

        let data_dir = self.data_dir();
        fs::create_dir_all(&data_dir)?;

        let content_hash = sha1_hex_upper(payload);
        let ext = if payload.len() >= MIN_GZ_SIZE { "gz" } else { "bin" };
        let file_name = format!("{content_hash}.{ext}");
        let data_file = data_dir.join(&file_name);

        match self.create_content_file(&data_file, payload, ext) {
            Ok(true) => {}
            // The content file already exists: dedup. No hash-log line is
            // appended and no error is raised.
            Ok(false) => return Ok(()),
            Err(e) => return Err(e),
        }

        self.append_hash_log_line(&file_name)
    }

    /// Creates the content file using `O_CREAT|O_EXCL` semantics so a
    /// concurrent writer racing on the same content hash observes `EEXIST`
    /// rather than silently truncating. Returns `Ok(true)` if this call
    /// created the file, `Ok(false)` if it already existed.
    fn create_content_file(&self, path: &Path, payload: &[u8], ext: &str) -> Result<bool> {
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);

        let file = match options.open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let writer = FluentWriter::from_file(file);
        let writer = if ext == "gz" { writer.gzip() } else { writer };
        writer
            .write(payload)
            .flush()
            .sync(self.durability.fsync_enabled())
            .close()?;

        Ok(true)
    }

    /// Appends a single line to the hash log, guarded by
    /// [`MAX_HASH_LOG_SIZE`]. The size check reads the file's current size
    /// via `stat` before writing; a single record that straddles the
    /// boundary is permitted, matching the original's behavior.
    fn append_hash_log_line(&self, file_name: &str) -> Result<()> {
        let path = self.hash_log_path();

        let mut options = OpenOptions::new();
        options.create(true).append(true);

        let mut latched: Option<AstoreError> = None;
        let writer = FluentWriter::open(&path, &options).stat(|meta| {
            if meta.len() >= MAX_HASH_LOG_SIZE {
                Err(AstoreError::HashLogFull(MAX_HASH_LOG_SIZE))
            } else {
                Ok(())
            }
        });
        let line = format!("{file_name}\n");
        let result = writer
            .write(line.as_bytes())
            .flush()
            .sync(self.durability.fsync_enabled())
            .close();

        if let Err(e) = result {
            latched = Some(e);
        }

        let mut cache = self.cached_lines.lock().unwrap();
        if latched.is_none() {
            if let Some(lines) = cache.as_mut() {
                lines.push(file_name.to_owned());
            }
        }
        drop(cache);

        match latched {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Loads (and caches) the hash-log lines. A missing hash log yields an
    /// empty list, not an error.
    fn load_lines(&self) -> Result<Vec<String>> {
        let mut cache = self.cached_lines.lock().unwrap();
        if let Some(lines) = cache.as_ref() {
            return Ok(lines.clone());
        }

        let lines = match File::open(self.hash_log_path()) {
            Ok(file) => BufReader::new(file)
                .lines()
                .collect::<std::io::Result<Vec<String>>>()?
                .into_iter()
                .filter(|l| !l.is_empty())
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        *cache = Some(lines.clone());
        Ok(lines)
    }

    /// Returns the number of records appended to this key. Cached after the
    /// first call; a missing hash log reports `0`.
    pub fn count(&self) -> Result<u64> {
        Ok(self.load_lines()?.len() as u64)
    }

    /// Invokes `callback` once per record, in hash-log (append) order. The
    /// reader passed to `callback` transparently unwraps gzip for `.gz`
    /// content files. The callback must fully consume its reader; a missing
    /// content file for a hash-log entry is a fatal read error.
    pub fn read_each(&self, mut callback: impl FnMut(&mut dyn Read) -> Result<()>) -> Result<()> {
        let lines = self.load_lines()?;
        let data_dir = self.data_dir();

        for line in lines {
            let path = data_dir.join(&line);
            let file = File::open(&path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    AstoreError::OrphanHashLogEntry(line.clone())
                } else {
                    e.into()
                }
            })?;

            if line.ends_with(".gz") {
                let mut decoder = GzDecoder::new(BufReader::new(file));
                callback(&mut decoder)?;
            } else {
                let mut reader = BufReader::new(file);
                callback(&mut reader)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn open_key(root: &Path, name: &str) -> Key {
        Key::open(&root.join("keys"), name, DurabilityPolicy::Never)
    }

    fn read_all(key: &Key) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        key.read_each(|r| {
            let mut buf = Vec::new();
            r.read_to_end(&mut buf)?;
            out.push(buf);
            Ok(())
        })
        .unwrap();
        out
    }

    #[test]
    fn small_payload_is_stored_uncompressed() {
        let dir = TempDir::new().unwrap();
        let key = open_key(dir.path(), "the key");
        let payload = br#"{"foo":"bar"}"#;
        key.append(payload).unwrap();

        assert_eq!(key.count().unwrap(), 1);
        let records = read_all(&key);
        assert_eq!(records, vec![payload.to_vec()]);

        let content_hash = sha1_hex_upper(payload);
        assert!(key.data_dir().join(format!("{content_hash}.bin")).exists());
    }

    #[test]
    fn large_payload_is_gzip_compressed() {
        let dir = TempDir::new().unwrap();
        let key = open_key(dir.path(), "k");
        let payload = vec![b'a'; 200];
        key.append(&payload).unwrap();

        let content_hash = sha1_hex_upper(&payload);
        assert!(key.data_dir().join(format!("{content_hash}.gz")).exists());

        let records = read_all(&key);
        assert_eq!(records, vec![payload]);
    }

    #[test]
    fn duplicate_append_is_idempotent_and_order_preserving() {
        let dir = TempDir::new().unwrap();
        let key = open_key(dir.path(), "k");
        let x = vec![b'a'; 200];
        let y = vec![b'b'; 200];

        key.append(&x).unwrap();
        key.append(&x).unwrap();
        key.append(&y).unwrap();

        assert_eq!(key.count().unwrap(), 2);
        assert_eq!(read_all(&key), vec![x, y]);
    }

    #[test]
    fn oversized_payload_is_rejected_without_side_effects() {
        let dir = TempDir::new().unwrap();
        let key = open_key(dir.path(), "k");
        let payload = vec![0u8; MAX_CONTENT_FILE_SIZE + 1];

        let err = key.append(&payload).unwrap_err();
        assert!(matches!(err, AstoreError::PayloadTooLarge { .. }));
        assert!(!key.dir.exists());
    }

    #[test]
    fn count_with_no_writes_is_zero() {
        let dir = TempDir::new().unwrap();
        let key = open_key(dir.path(), "never written");
        assert_eq!(key.count().unwrap(), 0);
    }

    #[test]
    fn fingerprint_never_leaks_key_name_into_path() {
        let dir = TempDir::new().unwrap();
        let key = open_key(dir.path(), "super-secret-name");
        key.append(b"hi there").unwrap();
        assert!(!key.dir.to_string_lossy().contains("super-secret-name"));
    }
}
