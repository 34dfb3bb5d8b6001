//! # apmul-storage
//!
//! A uniform abstraction over a fixed-size sequence of digit words,
//! backed either by an in-memory vector or a disk file chosen at
//! construction time. Call sites never branch on the backing: linear
//! windows, matrix-shaped (optionally transposed) windows and buffered
//! cursors behave identically for both, and write-mode handles flush
//! back to the backing medium when closed.

pub mod access;
pub mod cursor;
mod disk;
pub mod store;

pub use access::{AccessMode, ArrayAccess};
pub use cursor::WordCursor;
pub use store::{DataStore, StorageSettings, StoreBuilder};

/// Error type for storage operations. All variants are fatal to the
/// call; none is retried.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Offset/length outside the store bounds.
    #[error("range out of bounds: offset {offset} + length {length} > size {size}")]
    Range {
        /// Requested starting offset.
        offset: usize,
        /// Requested length.
        length: usize,
        /// Store size.
        size: usize,
    },

    /// A rectangular request exceeds addressable limits.
    #[error("matrix block {columns} x {rows} is not addressable")]
    Overflow {
        /// Requested column count.
        columns: usize,
        /// Requested row count.
        rows: usize,
    },

    /// Matrix shape does not divide the store.
    #[error("store of size {size} has no {rows}-row matrix shape")]
    Shape {
        /// Store size.
        size: usize,
        /// Requested row count.
        rows: usize,
    },

    /// Size change or copy attempted with incompatible sizes.
    #[error("size mismatch: {0}")]
    SizeMismatch(String),

    /// Disk I/O failure; never falls back to memory.
    #[error("storage I/O error")]
    Io(#[from] std::io::Error),
}
