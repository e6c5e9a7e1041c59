//! Fluent write pipeline: chain "open -> write -> flush -> fsync -> close"
//! while latching the first error and guaranteeing the file descriptor is
//! released on every path, including error paths.

use std::fs::{File, Metadata, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::AstoreError;
use crate::Result;

/// Either a plain buffered writer or one wrapped in a gzip encoder.
///
/// Closing the gzip branch must finish the compressed stream before the
/// underlying file is closed, or the double-close in the plain branch is
/// avoided entirely since there is nothing to close but the file itself.
enum Inner {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

/// A scoped, fluent wrapper around a single file handle.
///
/// Every method is a no-op once an error has been latched; `close` always
/// runs and returns the first error encountered (or a fresh close error if
/// none was latched).
pub struct FluentWriter {
    err: Option<AstoreError>,
    file_for_sync: Option<File>,
    inner: Option<Inner>,
}

impl FluentWriter {
    /// Opens `path` with the given options and wraps it in a buffered writer.
    pub fn open(path: &Path, options: &OpenOptions) -> Self {
        match options.open(path) {
            Ok(file) => Self::from_file(file),
            Err(e) => Self {
                err: Some(e.into()),
                file_for_sync: None,
                inner: None,
            },
        }
    }

    /// Wraps an already-opened file, e.g. one created with
    /// `OpenOptions::create_new` to enforce `O_CREAT|O_EXCL` semantics
    /// before entering the fluent chain.
    pub fn from_file(file: File) -> Self {
        match file.try_clone() {
            Ok(sync_handle) => Self {
                err: None,
                file_for_sync: Some(sync_handle),
                inner: Some(Inner::Plain(BufWriter::new(file))),
            },
            Err(e) => Self {
                err: Some(e.into()),
                file_for_sync: None,
                inner: None,
            },
        }
    }

    /// Wraps the buffered writer in a gzip encoder. Must be called before
    /// any `write` calls; intended for use immediately after `open`.
    pub fn gzip(mut self) -> Self {
        if self.err.is_some() {
            return self;
        }
        if let Some(Inner::Plain(w)) = self.inner.take() {
            self.inner = Some(Inner::Gzip(GzEncoder::new(w, Compression::default())));
        }
        self
    }

    /// Writes `buf`. A no-op if a previous call generated an error.
    pub fn write(mut self, buf: &[u8]) -> Self {
        if self.err.is_some() {
            return self;
        }
        let result = match self.inner.as_mut() {
            Some(Inner::Plain(w)) => w.write_all(buf),
            Some(Inner::Gzip(w)) => w.write_all(buf),
            None => Ok(()),
        };
        if let Err(e) = result {
            self.err = Some(e.into());
        }
        self
    }

    /// Flushes the buffered writer. A no-op if a previous call generated an
    /// error.
    pub fn flush(mut self) -> Self {
        if self.err.is_some() {
            return self;
        }
        let result = match self.inner.as_mut() {
            Some(Inner::Plain(w)) => w.flush(),
            Some(Inner::Gzip(w)) => w.flush(),
            None => Ok(()),
        };
        if let Err(e) = result {
            self.err = Some(e.into());
        }
        self
    }

    /// Calls `fsync` on the underlying file if `enabled` is true. A no-op if
    /// `enabled` is false or a previous call generated an error.
    pub fn sync(mut self, enabled: bool) -> Self {
        if !enabled || self.err.is_some() {
            return self;
        }
        if let Some(f) = self.file_for_sync.as_ref() {
            if let Err(e) = f.sync_all() {
                self.err = Some(e.into());
            }
        }
        self
    }

    /// Stats the opened file and passes the metadata to `cb`. Processing
    /// halts if `cb` returns an error.
    pub fn stat(mut self, cb: impl FnOnce(Metadata) -> Result<()>) -> Self {
        if self.err.is_some() {
            return self;
        }
        let meta = match self.file_for_sync.as_ref() {
            Some(f) => f.metadata(),
            None => return self,
        };
        match meta {
            Ok(meta) => {
                if let Err(e) = cb(meta) {
                    self.err = Some(e);
                }
            }
            Err(e) => self.err = Some(e.into()),
        }
        self
    }

    /// Closes the gzip encoder (if any) and the underlying file, returning
    /// the first error latched during the chain, or a fresh close error.
    ///
    /// Must be the last call in the chain. The gzip encoder is finished and
    /// dropped before the file handle is released, so there is never a
    /// double close.
    pub fn close(mut self) -> Result<()> {
        let close_result = match self.inner.take() {
            Some(Inner::Plain(w)) => w.into_inner().map(|_| ()).map_err(|e| e.into_error().into()),
            Some(Inner::Gzip(w)) => w
                .finish()
                .map_err(AstoreError::from)
                .and_then(|bw| bw.into_inner().map(|_| ()).map_err(|e| e.into_error().into())),
            None => Ok(()),
        };
        self.file_for_sync = None;

        match (self.err.take(), close_result) {
            (Some(e), _) => Err(e),
            (None, Err(e)) => Err(e),
            (None, Ok(())) => Ok(()),
        }
    }
}
