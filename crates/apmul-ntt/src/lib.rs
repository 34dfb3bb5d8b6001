//! # apmul-ntt
//!
//! Forward and inverse fast number-theoretic transforms over the three
//! working moduli, with strategy selection by transform size: a direct
//! in-memory transform, a six-step matrix decomposition for sizes past
//! the cache threshold, a two-pass variant streaming through disk-backed
//! storage, and a factor-3 wrapper admitting lengths `3 * 2^k`. The
//! matrix engine (blocked transposition and row permutation) lives here
//! as well.

pub mod factor3;
pub mod fnt;
pub mod matrix;
pub mod six_step;
pub mod strategy;
pub mod tables;
pub mod two_pass;

pub use matrix::Matrix;
pub use strategy::{transform_length, Ntt, NttSettings, TransformKind};

use apmul_exec::runner::RunError;

/// Error type for transform operations.
#[derive(Debug, thiserror::Error)]
pub enum NttError {
    /// Transform length above what the modulus set supports — a fatal
    /// configuration error, never retried.
    #[error("transform length {length} exceeds the supported maximum {max}")]
    LengthExceeded {
        /// Requested length.
        length: u64,
        /// Largest supported length.
        max: u64,
    },

    /// Store length is not a valid transform length for this call.
    #[error("store length {actual} is not the transform length {expected}")]
    LengthMismatch {
        /// Actual store length.
        actual: usize,
        /// Required length.
        expected: usize,
    },

    /// Length is neither a power of two nor three times one.
    #[error("invalid transform length {0}")]
    InvalidLength(usize),

    /// Underlying storage failure.
    #[error(transparent)]
    Storage(#[from] apmul_storage::StorageError),

    /// Underlying arithmetic failure.
    #[error(transparent)]
    Math(#[from] apmul_math::MathError),

    /// The transform was cancelled mid-flight.
    #[error("transform cancelled")]
    Cancelled,
}

impl From<RunError<NttError>> for NttError {
    fn from(err: RunError<NttError>) -> Self {
        match err {
            RunError::Cancelled => NttError::Cancelled,
            RunError::Task(inner) => inner,
        }
    }
}
