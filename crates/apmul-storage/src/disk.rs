//! Disk-backed word files.
//!
//! Files live in the configured temp directory under deterministic,
//! collision-free names (process id + atomic counter) and are removed
//! when the backing is dropped. Words are stored little-endian.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::StorageError;

const WORD_BYTES: u64 = 8;

static FILE_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_file_path(dir: &Path) -> PathBuf {
    let counter = FILE_COUNTER.fetch_add(1, Ordering::Relaxed);
    dir.join(format!("apmul-{}-{counter}.dat", std::process::id()))
}

/// A fixed-size word file.
#[derive(Debug)]
pub struct DiskFile {
    file: File,
    path: PathBuf,
    len: usize,
}

impl DiskFile {
    /// Create a zero-filled file of `len` words in `dir`.
    pub fn create(dir: &Path, len: usize) -> Result<Self, StorageError> {
        let path = next_file_path(dir);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;
        file.set_len(len as u64 * WORD_BYTES)?;
        tracing::debug!(path = %path.display(), words = len, "created disk-backed store");
        Ok(Self { file, path, len })
    }

    /// Number of words in the file.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Grow or shrink to `len` words; new space reads as zero.
    pub fn resize(&mut self, len: usize) -> Result<(), StorageError> {
        self.file.set_len(len as u64 * WORD_BYTES)?;
        self.len = len;
        Ok(())
    }

    /// Read `dst.len()` words starting at word `offset`.
    pub fn read_into(&mut self, offset: usize, dst: &mut [u64]) -> Result<(), StorageError> {
        self.file
            .seek(SeekFrom::Start(offset as u64 * WORD_BYTES))?;
        let mut bytes = vec![0u8; dst.len() * 8];
        self.file.read_exact(&mut bytes)?;
        for (word, chunk) in dst.iter_mut().zip(bytes.chunks_exact(8)) {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            *word = u64::from_le_bytes(raw);
        }
        Ok(())
    }

    /// Write `src.len()` words starting at word `offset`.
    pub fn write_from(&mut self, offset: usize, src: &[u64]) -> Result<(), StorageError> {
        self.file
            .seek(SeekFrom::Start(offset as u64 * WORD_BYTES))?;
        let mut bytes = Vec::with_capacity(src.len() * 8);
        for word in src {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        self.file.write_all(&bytes)?;
        Ok(())
    }
}

impl Drop for DiskFile {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), %err, "failed to remove temp file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_words() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = DiskFile::create(dir.path(), 16).unwrap();
        let data: Vec<u64> = (0..8).map(|i| i * 1000 + 7).collect();
        f.write_from(4, &data).unwrap();
        let mut back = vec![0u64; 8];
        f.read_into(4, &mut back).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn new_space_reads_zero() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = DiskFile::create(dir.path(), 4).unwrap();
        f.resize(8).unwrap();
        let mut back = vec![1u64; 8];
        f.read_into(0, &mut back).unwrap();
        assert_eq!(back, vec![0u64; 8]);
    }

    #[test]
    fn file_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path;
        {
            let f = DiskFile::create(dir.path(), 4).unwrap();
            path = f.path.clone();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn names_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let a = DiskFile::create(dir.path(), 1).unwrap();
        let b = DiskFile::create(dir.path(), 1).unwrap();
        assert_ne!(a.path, b.path);
    }
}
