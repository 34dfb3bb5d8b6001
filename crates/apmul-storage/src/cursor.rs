//! Buffered word cursors for forward iteration over a store range.

use std::sync::Arc;

use crate::access::AccessMode;
use crate::store::Backing;
use crate::StorageError;

/// A forward cursor over `[start, end)` with block-buffered I/O.
///
/// The cursor is positioned on a word as long as [`WordCursor::has_word`]
/// is true; `word`/`set_word` act on the current position and
/// [`WordCursor::advance`] moves forward, flushing and refilling the
/// buffer at block boundaries. Must be closed to surface flush errors.
pub struct WordCursor {
    backing: Arc<Backing>,
    mode: AccessMode,
    pos: usize,
    end: usize,
    buf: Vec<u64>,
    buf_start: usize,
    dirty: bool,
    closed: bool,
}

impl WordCursor {
    pub(crate) fn open(
        backing: Arc<Backing>,
        start: usize,
        end: usize,
        mode: AccessMode,
    ) -> Result<Self, StorageError> {
        let mut cursor = Self {
            backing,
            mode,
            pos: start,
            end,
            buf: Vec::new(),
            buf_start: start,
            dirty: false,
            closed: false,
        };
        cursor.refill()?;
        Ok(cursor)
    }

    fn refill(&mut self) -> Result<(), StorageError> {
        let block = self.backing.block_size.max(1);
        let len = block.min(self.end - self.pos);
        self.buf_start = self.pos;
        self.buf.resize(len, 0);
        if len > 0 && self.mode.reads() {
            self.backing
                .medium
                .lock()
                .read_into(self.buf_start, &mut self.buf)?;
        } else {
            self.buf.fill(0);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        if self.dirty && !self.buf.is_empty() {
            self.backing
                .medium
                .lock()
                .write_from(self.buf_start, &self.buf)?;
            self.dirty = false;
        }
        Ok(())
    }

    /// Whether the cursor is positioned on a word.
    #[must_use]
    pub fn has_word(&self) -> bool {
        self.pos < self.end
    }

    /// The word at the current position.
    #[must_use]
    pub fn word(&self) -> u64 {
        debug_assert!(self.has_word());
        self.buf[self.pos - self.buf_start]
    }

    /// Replace the word at the current position.
    pub fn set_word(&mut self, word: u64) {
        debug_assert!(self.has_word());
        let idx = self.pos - self.buf_start;
        self.buf[idx] = word;
        self.dirty = true;
    }

    /// Move to the next word, crossing block boundaries as needed.
    pub fn advance(&mut self) -> Result<(), StorageError> {
        self.pos += 1;
        if self.pos - self.buf_start >= self.buf.len() && self.pos < self.end {
            if self.mode.writes() {
                self.flush()?;
            }
            self.refill()?;
        }
        Ok(())
    }

    /// Release the cursor, flushing modified data for write modes.
    pub fn close(mut self) -> Result<(), StorageError> {
        self.closed = true;
        if self.mode.writes() {
            self.flush()
        } else {
            Ok(())
        }
    }
}

impl Drop for WordCursor {
    fn drop(&mut self) {
        if !self.closed && self.mode.writes() {
            if let Err(err) = self.flush() {
                tracing::warn!(%err, "cursor dropped without close; flush failed");
            }
        }
    }
}
