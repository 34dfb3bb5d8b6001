//! The segment store: a fixed-size word sequence with memory or disk
//! backing and range-checked window/cursor access.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::access::{AccessMode, ArrayAccess, Plan};
use crate::cursor::WordCursor;
use crate::disk::DiskFile;
use crate::StorageError;

/// Construction-time settings for stores.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    /// Stores at or below this many bytes are memory-backed; larger ones
    /// go to disk.
    pub memory_threshold: usize,
    /// Directory for disk-backed store files.
    pub temp_dir: PathBuf,
    /// Words per streamed I/O block (cursors and store-to-store copies).
    pub block_size: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            memory_threshold: 64 << 20,
            temp_dir: std::env::temp_dir(),
            block_size: 1 << 16,
        }
    }
}

pub(crate) enum Medium {
    Memory(Vec<u64>),
    Disk(DiskFile),
}

impl Medium {
    pub(crate) fn len(&self) -> usize {
        match self {
            Medium::Memory(v) => v.len(),
            Medium::Disk(f) => f.len(),
        }
    }

    pub(crate) fn resize(&mut self, len: usize) -> Result<(), StorageError> {
        match self {
            Medium::Memory(v) => {
                v.resize(len, 0);
                Ok(())
            }
            Medium::Disk(f) => f.resize(len),
        }
    }

    pub(crate) fn read_into(&mut self, offset: usize, dst: &mut [u64]) -> Result<(), StorageError> {
        match self {
            Medium::Memory(v) => {
                dst.copy_from_slice(&v[offset..offset + dst.len()]);
                Ok(())
            }
            Medium::Disk(f) => f.read_into(offset, dst),
        }
    }

    pub(crate) fn write_from(&mut self, offset: usize, src: &[u64]) -> Result<(), StorageError> {
        match self {
            Medium::Memory(v) => {
                v[offset..offset + src.len()].copy_from_slice(src);
                Ok(())
            }
            Medium::Disk(f) => f.write_from(offset, src),
        }
    }
}

pub(crate) struct Backing {
    pub(crate) medium: Mutex<Medium>,
    pub(crate) block_size: usize,
}

/// A sequence of digit words with a fixed logical size.
///
/// Cloning (and [`DataStore::subsequence`]) produces views that share
/// the same backing; internal parallel chunks of one operation may hold
/// windows into disjoint ranges concurrently, while sharing a store
/// across logical operations requires external synchronization.
#[derive(Clone)]
pub struct DataStore {
    backing: Arc<Backing>,
    offset: usize,
    len: usize,
    view: bool,
}

/// Chooses memory or disk backing by store size.
#[derive(Debug, Clone, Default)]
pub struct StoreBuilder {
    settings: StorageSettings,
}

impl StoreBuilder {
    /// Builder over the given settings.
    #[must_use]
    pub fn new(settings: StorageSettings) -> Self {
        Self { settings }
    }

    /// Create a zero-filled store of `size` words, disk-backed when the
    /// byte size exceeds the configured memory threshold.
    pub fn create(&self, size: usize) -> Result<DataStore, StorageError> {
        if size.saturating_mul(8) <= self.settings.memory_threshold {
            Ok(DataStore::memory_with_block(size, self.settings.block_size))
        } else {
            tracing::debug!(words = size, "store exceeds memory threshold, backing with disk");
            DataStore::disk(size, &self.settings)
        }
    }
}

impl DataStore {
    /// A memory-backed store of `size` zero words.
    #[must_use]
    pub fn memory(size: usize) -> Self {
        Self::memory_with_block(size, StorageSettings::default().block_size)
    }

    fn memory_with_block(size: usize, block_size: usize) -> Self {
        Self {
            backing: Arc::new(Backing {
                medium: Mutex::new(Medium::Memory(vec![0; size])),
                block_size,
            }),
            offset: 0,
            len: size,
            view: false,
        }
    }

    /// A disk-backed store of `size` zero words.
    pub fn disk(size: usize, settings: &StorageSettings) -> Result<Self, StorageError> {
        let file = DiskFile::create(&settings.temp_dir, size)?;
        Ok(Self {
            backing: Arc::new(Backing {
                medium: Mutex::new(Medium::Disk(file)),
                block_size: settings.block_size,
            }),
            offset: 0,
            len: size,
            view: false,
        })
    }

    /// A memory-backed store initialized from a word slice.
    #[must_use]
    pub fn from_words(words: &[u64]) -> Self {
        let store = Self::memory(words.len());
        store
            .backing
            .medium
            .lock()
            .write_from(0, words)
            .expect("memory write cannot fail");
        store
    }

    /// Logical size in words.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the store holds no words.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the backing medium is a disk file.
    #[must_use]
    pub fn is_disk_backed(&self) -> bool {
        matches!(*self.backing.medium.lock(), Medium::Disk(_))
    }

    /// Whether two handles denote the same words of the same backing.
    #[must_use]
    pub fn same_range(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.backing, &other.backing)
            && self.offset == other.offset
            && self.len == other.len
    }

    /// Resize the store. Only the root store can be resized; views
    /// borrow their range from the root.
    pub fn set_size(&mut self, size: usize) -> Result<(), StorageError> {
        if self.view {
            return Err(StorageError::SizeMismatch(
                "cannot resize a subsequence view".into(),
            ));
        }
        self.backing.medium.lock().resize(size)?;
        self.len = size;
        Ok(())
    }

    /// A view of `length` words starting at `offset`, sharing this
    /// store's backing.
    pub fn subsequence(&self, offset: usize, length: usize) -> Result<Self, StorageError> {
        self.check_range(offset, length)?;
        Ok(Self {
            backing: Arc::clone(&self.backing),
            offset: self.offset + offset,
            len: length,
            view: true,
        })
    }

    fn check_range(&self, offset: usize, length: usize) -> Result<(), StorageError> {
        if offset.checked_add(length).map_or(true, |end| end > self.len) {
            return Err(StorageError::Range {
                offset,
                length,
                size: self.len,
            });
        }
        Ok(())
    }

    /// A linear window of `length` words at `offset`.
    pub fn array(
        &self,
        mode: AccessMode,
        offset: usize,
        length: usize,
    ) -> Result<ArrayAccess, StorageError> {
        self.check_range(offset, length)?;
        ArrayAccess::open(
            Arc::clone(&self.backing),
            self.offset + offset,
            mode,
            Plan::Linear { length },
        )
    }

    /// A rectangular window: all `rows` rows of columns
    /// `[start_column, start_column + columns)`, where the store is
    /// shaped as a `rows x (len / rows)` row-major matrix.
    pub fn matrix_array(
        &self,
        mode: AccessMode,
        start_column: usize,
        columns: usize,
        rows: usize,
    ) -> Result<ArrayAccess, StorageError> {
        let stride = self.matrix_stride(start_column, columns, rows)?;
        ArrayAccess::open(
            Arc::clone(&self.backing),
            self.offset,
            mode,
            Plan::Matrix {
                start_column,
                columns,
                rows,
                stride,
                transposed: false,
            },
        )
    }

    /// Like [`DataStore::matrix_array`], but the window buffer holds the
    /// block pre-transposed (column-major).
    pub fn transposed_array(
        &self,
        mode: AccessMode,
        start_column: usize,
        columns: usize,
        rows: usize,
    ) -> Result<ArrayAccess, StorageError> {
        let stride = self.matrix_stride(start_column, columns, rows)?;
        ArrayAccess::open(
            Arc::clone(&self.backing),
            self.offset,
            mode,
            Plan::Matrix {
                start_column,
                columns,
                rows,
                stride,
                transposed: true,
            },
        )
    }

    fn matrix_stride(
        &self,
        start_column: usize,
        columns: usize,
        rows: usize,
    ) -> Result<usize, StorageError> {
        if rows == 0 || self.len % rows != 0 {
            return Err(StorageError::Shape {
                size: self.len,
                rows,
            });
        }
        let Some(block) = columns.checked_mul(rows) else {
            return Err(StorageError::Overflow { columns, rows });
        };
        if block > isize::MAX as usize {
            return Err(StorageError::Overflow { columns, rows });
        }
        let stride = self.len / rows;
        if start_column.checked_add(columns).map_or(true, |end| end > stride) {
            return Err(StorageError::Range {
                offset: start_column,
                length: columns,
                size: stride,
            });
        }
        Ok(stride)
    }

    /// A buffered cursor over `[start, end)`.
    pub fn cursor(
        &self,
        mode: AccessMode,
        start: usize,
        end: usize,
    ) -> Result<WordCursor, StorageError> {
        if start > end {
            return Err(StorageError::Range {
                offset: start,
                length: 0,
                size: end,
            });
        }
        self.check_range(start, end - start)?;
        WordCursor::open(
            Arc::clone(&self.backing),
            self.offset + start,
            self.offset + end,
            mode,
        )
    }

    /// Copy all of `src` into the front of this store in bounded blocks,
    /// without materializing either side.
    pub fn copy_from(&self, src: &DataStore) -> Result<(), StorageError> {
        if src.len() > self.len {
            return Err(StorageError::SizeMismatch(format!(
                "cannot copy {} words into a store of {}",
                src.len(),
                self.len
            )));
        }
        let block = self.backing.block_size.max(1);
        let mut buf = vec![0u64; block.min(src.len())];
        let mut done = 0;
        while done < src.len() {
            let chunk = block.min(src.len() - done);
            src.backing
                .medium
                .lock()
                .read_into(src.offset + done, &mut buf[..chunk])?;
            self.backing
                .medium
                .lock()
                .write_from(self.offset + done, &buf[..chunk])?;
            done += chunk;
        }
        Ok(())
    }

    /// Read the whole store into a vector. Intended for small results
    /// and tests.
    pub fn to_vec(&self) -> Result<Vec<u64>, StorageError> {
        let access = self.array(AccessMode::Read, 0, self.len)?;
        let words = access.words().to_vec();
        access.close()?;
        Ok(words)
    }
}

impl std::fmt::Debug for DataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStore")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .field("view", &self.view)
            .field("disk", &self.is_disk_backed())
            .finish()
    }
}
