//! # Memory-Mapped File Windows
//!
//! This module implements `FileMapper`, the low-level building block every
//! table file sits on. A mapper presents a growable, mutable byte window
//! over a regular file: the window is always the contiguous prefix
//! `[0, len)`, and `len` is kept a whole multiple of the mapper's logical
//! block size.
//!
//! ## Design Philosophy
//!
//! Traditional engines copy page data between kernel buffers and a
//! user-space cache. Mapping the file into the address space removes that
//! copy; the OS page cache does the caching and write-back.
//!
//! ## Safety Model
//!
//! A mapped region becomes invalid when the file is grown and remapped.
//! Instead of runtime schemes (hazard pointers, epochs, refcounts), the
//! borrow checker enforces the invalidation rule at compile time:
//!
//! ```text
//! bytes(&self) -> &[u8]          // immutable borrow of self
//! bytes_mut(&mut self) -> &mut [u8]
//! grow(&mut self)                // exclusive borrow
//! ```
//!
//! No slice obtained before a `grow()` can survive it. Callers that need a
//! stable handle across growth keep byte *offsets*, never references, and
//! re-derive the slice after any operation that may grow.
//!
//! ## Growth
//!
//! Files extend by exactly one logical block per grow: flush the current
//! mapping, `set_len` the file (the filesystem zero-fills the new bytes),
//! remap `[0, new_len)`. The logical block size is captured from the
//! process-wide knob at construction, so a later `set_logical_block_size`
//! never changes an open mapper's granularity.
//!
//! Growth is additionally serialized by a per-mapper mutex; `try_grow`
//! fails fast instead of waiting when the lock is contended.
//!
//! ## Failure Semantics
//!
//! Mapping failures, extension failures, and a target that is not a
//! regular file are FATAL ([`StorageError`] with `ErrorLevel::Fatal`).

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};
use memmap2::MmapMut;
use parking_lot::Mutex;

use crate::config;
use crate::error::StorageError;

#[derive(Debug)]
struct MapperInner {
    file: File,
    mmap: MmapMut,
    len: usize,
    block_size: u32,
    path: PathBuf,
}

impl MapperInner {
    fn map(file: &File, path: &Path) -> Result<MmapMut> {
        // SAFETY: the file is opened read-write by this process and table
        // files are not modified externally while mapped. The mapping's
        // lifetime is tied to MapperInner, and all access goes through
        // bytes()/bytes_mut() which are bounded by the mapped length.
        unsafe {
            MmapMut::map_mut(file).map_err(|e| {
                StorageError::MapFailed {
                    path: path.to_path_buf(),
                    source: e,
                }
                .into()
            })
        }
    }

    fn grow(&mut self) -> Result<()> {
        self.mmap
            .flush()
            .wrap_err("failed to flush mapping before grow")?;

        let new_len = self.len + self.block_size as usize;
        self.file
            .set_len(new_len as u64)
            .map_err(|e| StorageError::ExtendFailed {
                path: self.path.clone(),
                source: e,
            })?;

        // SAFETY: grow() holds &mut self, so no slice into the old mapping
        // exists; the old mapping is dropped when the new one is assigned.
        self.mmap = Self::map(&self.file, &self.path)?;
        self.len = new_len;

        tracing::debug!(path = %self.path.display(), len = new_len, "grew mapped file by one block");
        Ok(())
    }
}

impl Drop for MapperInner {
    fn drop(&mut self) {
        let _ = self.mmap.flush();
    }
}

/// A growable read-write byte window over a regular file.
#[derive(Debug)]
pub struct FileMapper {
    grow_lock: Mutex<()>,
    inner: MapperInner,
}

impl FileMapper {
    /// Opens `path`, creating it at one logical block if absent.
    ///
    /// An existing target must be a regular file. The whole file is mapped
    /// read-write, shared. The logical block size is captured from the
    /// process-wide knob at this point.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let block_size = config::logical_block_size();

        match std::fs::metadata(&path) {
            Ok(meta) if !meta.is_file() => {
                return Err(StorageError::NotRegularFile { path }.into());
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e)
                    .wrap_err_with(|| format!("failed to stat '{}'", path.display()));
            }
        }

        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o644);
        }
        let file = options
            .open(&path)
            .wrap_err_with(|| format!("failed to open '{}'", path.display()))?;

        let mut len = file
            .metadata()
            .wrap_err_with(|| format!("failed to stat '{}'", path.display()))?
            .len() as usize;

        if len == 0 {
            file.set_len(block_size as u64)
                .map_err(|e| StorageError::ExtendFailed {
                    path: path.clone(),
                    source: e,
                })?;
            len = block_size as usize;
        }

        let mmap = MapperInner::map(&file, &path)?;

        Ok(Self {
            grow_lock: Mutex::new(()),
            inner: MapperInner {
                file,
                mmap,
                len,
                block_size,
                path,
            },
        })
    }

    /// The full mapped window.
    pub fn bytes(&self) -> &[u8] {
        &self.inner.mmap[..self.inner.len]
    }

    /// The full mapped window, writable.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        let len = self.inner.len;
        &mut self.inner.mmap[..len]
    }

    /// Current mapped length in bytes.
    pub fn len(&self) -> usize {
        self.inner.len
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }

    /// Logical block size captured at construction.
    pub fn block_size(&self) -> u32 {
        self.inner.block_size
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Appends one logical block to the file and remaps.
    ///
    /// Every slice previously obtained from this mapper is invalidated;
    /// the borrow checker enforces re-derivation.
    pub fn grow(&mut self) -> Result<()> {
        let _guard = self.grow_lock.lock();
        self.inner.grow()
    }

    /// Non-blocking [`grow`](Self::grow): returns `Ok(false)` without
    /// growing when another grow holds the lock.
    pub fn try_grow(&mut self) -> Result<bool> {
        match self.grow_lock.try_lock() {
            Some(_guard) => {
                self.inner.grow()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Flushes dirty pages to disk (msync).
    pub fn sync(&self) -> Result<()> {
        self.inner
            .mmap
            .flush()
            .wrap_err_with(|| format!("failed to sync '{}'", self.inner.path.display()))
    }

    /// Hints the kernel to fault in `[offset, offset + len)` ahead of use.
    pub fn prefetch(&self, offset: usize, len: usize) {
        if offset >= self.inner.len {
            return;
        }
        let len = len.min(self.inner.len - offset);

        #[cfg(unix)]
        // SAFETY: the range is clamped to the mapped window above, and
        // MADV_WILLNEED is advisory; it never invalidates the mapping.
        unsafe {
            libc::madvise(
                self.inner.mmap.as_ptr().add(offset) as *mut libc::c_void,
                len,
                libc::MADV_WILLNEED,
            );
        }
        #[cfg(not(unix))]
        let _ = len;
    }

    /// Flushes and closes the mapper.
    ///
    /// Dropping has the same effect; this form surfaces the flush error.
    pub fn close(self) -> Result<()> {
        self.sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        (dir, path)
    }

    #[test]
    fn open_creates_missing_file_at_one_block() {
        let (_dir, path) = temp_path("fresh.dat");

        let mapper = FileMapper::open(&path).unwrap();

        assert_eq!(mapper.len(), 65536);
        assert_eq!(mapper.block_size(), 65536);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 65536);
    }

    #[test]
    fn fresh_file_is_zero_filled() {
        let (_dir, path) = temp_path("zero.dat");

        let mapper = FileMapper::open(&path).unwrap();

        assert!(mapper.bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn grow_appends_exactly_one_block() {
        let (_dir, path) = temp_path("grow.dat");
        let mut mapper = FileMapper::open(&path).unwrap();

        mapper.grow().unwrap();

        assert_eq!(mapper.len(), 131072);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 131072);
    }

    #[test]
    fn writes_survive_grow_and_reopen() {
        let (_dir, path) = temp_path("persist.dat");

        {
            let mut mapper = FileMapper::open(&path).unwrap();
            mapper.bytes_mut()[..4].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
            mapper.grow().unwrap();
            assert_eq!(&mapper.bytes()[..4], &[0xde, 0xad, 0xbe, 0xef]);
        }

        let mapper = FileMapper::open(&path).unwrap();
        assert_eq!(mapper.len(), 131072);
        assert_eq!(&mapper.bytes()[..4], &[0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn open_rejects_non_regular_file() {
        let dir = tempfile::tempdir().unwrap();

        let report = FileMapper::open(dir.path()).unwrap_err();

        let err = report.downcast_ref::<StorageError>().unwrap();
        assert!(matches!(err, StorageError::NotRegularFile { .. }));
    }

    #[test]
    fn try_grow_succeeds_when_uncontended() {
        let (_dir, path) = temp_path("trygrow.dat");
        let mut mapper = FileMapper::open(&path).unwrap();

        assert!(mapper.try_grow().unwrap());
        assert_eq!(mapper.len(), 131072);
    }

    #[test]
    fn sync_flushes_without_error() {
        let (_dir, path) = temp_path("sync.dat");
        let mut mapper = FileMapper::open(&path).unwrap();

        mapper.bytes_mut()[0] = 42;
        mapper.sync().unwrap();
    }
}
