//! Array windows: transient handles over a contiguous or rectangular
//! block of words, flushed back to the backing medium on close.

use std::sync::Arc;

use crate::store::Backing;
use crate::StorageError;

/// How a window or cursor touches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Read existing data; modifications are discarded.
    Read,
    /// Overwrite; existing data is not read (the buffer starts zeroed).
    Write,
    /// Read existing data and flush modifications on close.
    ReadWrite,
}

impl AccessMode {
    pub(crate) fn reads(self) -> bool {
        matches!(self, AccessMode::Read | AccessMode::ReadWrite)
    }

    pub(crate) fn writes(self) -> bool {
        matches!(self, AccessMode::Write | AccessMode::ReadWrite)
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Plan {
    Linear {
        length: usize,
    },
    Matrix {
        start_column: usize,
        columns: usize,
        rows: usize,
        stride: usize,
        transposed: bool,
    },
}

/// An exclusively-held buffer over a block of store words.
///
/// Must be closed exactly once; for write modes that is when the data
/// reaches the backing medium. Dropping an unclosed write window still
/// flushes, but reports failures only as a log warning — use
/// [`ArrayAccess::close`] on every path that must observe errors.
pub struct ArrayAccess {
    backing: Arc<Backing>,
    base: usize,
    buf: Vec<u64>,
    plan: Plan,
    mode: AccessMode,
    closed: bool,
}

impl ArrayAccess {
    pub(crate) fn open(
        backing: Arc<Backing>,
        base: usize,
        mode: AccessMode,
        plan: Plan,
    ) -> Result<Self, StorageError> {
        let size = match plan {
            Plan::Linear { length } => length,
            Plan::Matrix { columns, rows, .. } => columns * rows,
        };
        let mut access = Self {
            backing,
            base,
            buf: vec![0; size],
            plan,
            mode,
            closed: false,
        };
        if mode.reads() {
            access.fill()?;
        }
        Ok(access)
    }

    fn fill(&mut self) -> Result<(), StorageError> {
        let mut medium = self.backing.medium.lock();
        match self.plan {
            Plan::Linear { .. } => medium.read_into(self.base, &mut self.buf),
            Plan::Matrix {
                start_column,
                columns,
                rows,
                stride,
                transposed,
            } => {
                let mut row = vec![0u64; columns];
                for r in 0..rows {
                    medium.read_into(self.base + r * stride + start_column, &mut row)?;
                    if transposed {
                        for (c, &w) in row.iter().enumerate() {
                            self.buf[c * rows + r] = w;
                        }
                    } else {
                        self.buf[r * columns..(r + 1) * columns].copy_from_slice(&row);
                    }
                }
                Ok(())
            }
        }
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        let mut medium = self.backing.medium.lock();
        match self.plan {
            Plan::Linear { .. } => medium.write_from(self.base, &self.buf),
            Plan::Matrix {
                start_column,
                columns,
                rows,
                stride,
                transposed,
            } => {
                let mut row = vec![0u64; columns];
                for r in 0..rows {
                    if transposed {
                        for (c, w) in row.iter_mut().enumerate() {
                            *w = self.buf[c * rows + r];
                        }
                    } else {
                        row.copy_from_slice(&self.buf[r * columns..(r + 1) * columns]);
                    }
                    medium.write_from(self.base + r * stride + start_column, &row)?;
                }
                Ok(())
            }
        }
    }

    /// The buffered words.
    #[must_use]
    pub fn words(&self) -> &[u64] {
        &self.buf
    }

    /// The buffered words, mutable.
    pub fn words_mut(&mut self) -> &mut [u64] {
        &mut self.buf
    }

    /// Number of buffered words.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Release the window, flushing modified data for write modes.
    pub fn close(mut self) -> Result<(), StorageError> {
        self.closed = true;
        if self.mode.writes() {
            self.flush()
        } else {
            Ok(())
        }
    }
}

impl Drop for ArrayAccess {
    fn drop(&mut self) {
        if !self.closed && self.mode.writes() {
            if let Err(err) = self.flush() {
                tracing::warn!(%err, "array window dropped without close; flush failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DataStore;

    #[test]
    fn read_mode_discards_changes() {
        let store = DataStore::from_words(&[1, 2, 3]);
        let mut access = store.array(AccessMode::Read, 0, 3).unwrap();
        access.words_mut()[0] = 99;
        access.close().unwrap();
        assert_eq!(store.to_vec().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn write_mode_starts_zeroed() {
        let store = DataStore::from_words(&[1, 2, 3]);
        let access = store.array(AccessMode::Write, 0, 2).unwrap();
        assert_eq!(access.words(), &[0, 0]);
        access.close().unwrap();
        assert_eq!(store.to_vec().unwrap(), vec![0, 0, 3]);
    }

    #[test]
    fn drop_without_close_still_flushes() {
        let store = DataStore::from_words(&[1, 2]);
        {
            let mut access = store.array(AccessMode::ReadWrite, 0, 2).unwrap();
            access.words_mut()[1] = 42;
        }
        assert_eq!(store.to_vec().unwrap(), vec![1, 42]);
    }
}
