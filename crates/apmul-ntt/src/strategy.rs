//! Transform strategy selection and the public transform entry points.

use std::sync::Arc;

use apmul_exec::{CancellationToken, ParallelRunner};
use apmul_math::{ModMath, MAX_TRANSFORM_LENGTH};
use apmul_storage::{AccessMode, DataStore};

use crate::matrix::Matrix;
use crate::tables::TwiddleCache;
use crate::{fnt, NttError};

/// Size thresholds steering transform-strategy choice.
#[derive(Debug, Clone)]
pub struct NttSettings {
    /// L1 data cache size in bytes (matrix transpose block sizing).
    pub cache_l1: usize,
    /// L2 cache size in bytes; transforms at or below it run directly
    /// in one array.
    pub cache_l2: usize,
    /// Memory threshold in bytes; transforms at or below it use the
    /// in-memory six-step decomposition, larger ones stream two-pass.
    pub memory_threshold: usize,
    /// Minimum words per scheduled chunk.
    pub min_batch: usize,
}

impl Default for NttSettings {
    fn default() -> Self {
        Self {
            cache_l1: 32 << 10,
            cache_l2: 4 << 20,
            memory_threshold: 64 << 20,
            min_batch: 1 << 10,
        }
    }
}

/// The closed set of power-of-two transform strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    /// Whole transform in one in-memory array.
    Direct,
    /// Matrix decomposition, in memory.
    SixStep,
    /// Matrix decomposition streamed through backing storage.
    TwoPass,
}

/// Forward/inverse number-theoretic transforms over segment stores.
pub struct Ntt {
    pub(crate) settings: NttSettings,
    pub(crate) runner: Arc<ParallelRunner>,
    pub(crate) matrix: Matrix,
    pub(crate) tables: TwiddleCache,
}

/// The required transform length for a convolution of `size` result
/// words: the smallest `2^k` or `3 * 2^(k-1)` at or above it.
pub fn transform_length(size: usize) -> Result<usize, NttError> {
    let pow2 = size
        .checked_next_power_of_two()
        .ok_or(NttError::LengthExceeded {
            length: size as u64,
            max: MAX_TRANSFORM_LENGTH,
        })?;
    let length = if pow2 >= 4 && 3 * (pow2 / 4) >= size {
        3 * (pow2 / 4)
    } else {
        pow2
    };
    if length as u64 > MAX_TRANSFORM_LENGTH {
        return Err(NttError::LengthExceeded {
            length: length as u64,
            max: MAX_TRANSFORM_LENGTH,
        });
    }
    Ok(length.max(1))
}

/// Power-of-two part of a valid transform length, and whether the
/// factor-3 wrapper applies.
pub(crate) fn split_length(length: usize) -> Result<(usize, bool), NttError> {
    if length as u64 > MAX_TRANSFORM_LENGTH {
        return Err(NttError::LengthExceeded {
            length: length as u64,
            max: MAX_TRANSFORM_LENGTH,
        });
    }
    if length >= 3 && length % 3 == 0 && (length / 3).is_power_of_two() {
        Ok((length / 3, true))
    } else if length > 0 && length.is_power_of_two() {
        Ok((length, false))
    } else {
        Err(NttError::InvalidLength(length))
    }
}

impl Ntt {
    /// A transform engine over the given thresholds and worker pool.
    #[must_use]
    pub fn new(settings: NttSettings, runner: Arc<ParallelRunner>) -> Self {
        let matrix = Matrix::new(settings.cache_l1);
        Self {
            settings,
            runner,
            matrix,
            tables: TwiddleCache::new(),
        }
    }

    /// Pure strategy choice for a power-of-two length. Boundaries are
    /// inclusive on the cheaper side.
    #[must_use]
    pub fn kind_for(&self, length: usize) -> TransformKind {
        let bytes = length.saturating_mul(8);
        if length < 4 || bytes <= self.settings.cache_l2 {
            TransformKind::Direct
        } else if bytes <= self.settings.memory_threshold {
            TransformKind::SixStep
        } else {
            TransformKind::TwoPass
        }
    }

    /// Forward-transform the whole store in place under the modulus at
    /// `modulus_index`. The store length must be a valid transform
    /// length (`2^k` or `3 * 2^k`).
    pub fn transform(
        &self,
        store: &DataStore,
        modulus_index: usize,
        token: &CancellationToken,
    ) -> Result<(), NttError> {
        let (pow2, factor3) = split_length(store.len())?;
        tracing::debug!(
            length = store.len(),
            modulus_index,
            factor3,
            kind = ?self.kind_for(pow2),
            "forward transform"
        );
        if factor3 {
            self.factor3_forward(store, modulus_index, token)
        } else {
            self.forward_pow2(store, modulus_index, token)
        }
    }

    /// Inverse-transform the whole store in place, scaling every element
    /// by `1 / total_length`. `total_length` must equal the store (and
    /// original transform) length.
    pub fn inverse_transform(
        &self,
        store: &DataStore,
        modulus_index: usize,
        total_length: usize,
        token: &CancellationToken,
    ) -> Result<(), NttError> {
        if store.len() != total_length {
            return Err(NttError::LengthMismatch {
                actual: store.len(),
                expected: total_length,
            });
        }
        let (_, factor3) = split_length(store.len())?;
        if factor3 {
            self.factor3_inverse_unscaled(store, modulus_index, token)?;
        } else {
            self.inverse_pow2_unscaled(store, modulus_index, token)?;
        }

        let mm = ModMath::new(modulus_index);
        let factor = mm.inverse(total_length as u64 % mm.modulus())?;
        self.scale_store(store, modulus_index, factor, token)
    }

    pub(crate) fn forward_pow2(
        &self,
        store: &DataStore,
        modulus_index: usize,
        token: &CancellationToken,
    ) -> Result<(), NttError> {
        let n = store.len();
        match self.kind_for(n) {
            TransformKind::Direct => {
                let mut access = store.array(AccessMode::ReadWrite, 0, n)?;
                let table = self.tables.powers(modulus_index, n, false)?;
                fnt::forward(&ModMath::new(modulus_index), access.words_mut(), &table);
                access.close()?;
                Ok(())
            }
            TransformKind::SixStep => {
                let mut access = store.array(AccessMode::ReadWrite, 0, n)?;
                self.six_step_forward(access.words_mut(), modulus_index, token)?;
                access.close()?;
                Ok(())
            }
            TransformKind::TwoPass => self.two_pass_forward(store, modulus_index, token),
        }
    }

    pub(crate) fn inverse_pow2_unscaled(
        &self,
        store: &DataStore,
        modulus_index: usize,
        token: &CancellationToken,
    ) -> Result<(), NttError> {
        let n = store.len();
        match self.kind_for(n) {
            TransformKind::Direct => {
                let mut access = store.array(AccessMode::ReadWrite, 0, n)?;
                let table = self.tables.powers(modulus_index, n, true)?;
                fnt::inverse(&ModMath::new(modulus_index), access.words_mut(), &table);
                access.close()?;
                Ok(())
            }
            TransformKind::SixStep => {
                let mut access = store.array(AccessMode::ReadWrite, 0, n)?;
                self.six_step_inverse_unscaled(access.words_mut(), modulus_index, token)?;
                access.close()?;
                Ok(())
            }
            TransformKind::TwoPass => self.two_pass_inverse_unscaled(store, modulus_index, token),
        }
    }

    /// Multiply every store element by `factor`, in bounded batches.
    pub(crate) fn scale_store(
        &self,
        store: &DataStore,
        modulus_index: usize,
        factor: u64,
        token: &CancellationToken,
    ) -> Result<(), NttError> {
        let mm = ModMath::new(modulus_index);
        let budget = self.budget_words().max(1);
        let mut offset = 0;
        while offset < store.len() {
            if token.is_cancelled() {
                return Err(NttError::Cancelled);
            }
            let len = budget.min(store.len() - offset);
            let mut access = store.array(AccessMode::ReadWrite, offset, len)?;
            self.runner
                .run_chunks(
                    access.words_mut(),
                    self.settings.min_batch,
                    token,
                    |_, piece| {
                        fnt::scale(&mm, piece, factor);
                        Ok::<(), NttError>(())
                    },
                )
                .map_err(NttError::from)?;
            access.close()?;
            offset += len;
        }
        Ok(())
    }

    /// Words a streaming pass may hold in memory at once.
    pub(crate) fn budget_words(&self) -> usize {
        (self.settings.memory_threshold / 8).max(self.settings.min_batch.max(64))
    }

    /// The `n1 x n2` split of a power-of-two length, `n1 <= n2 <= 2*n1`.
    pub(crate) fn split_dimensions(n: usize) -> (usize, usize) {
        debug_assert!(n.is_power_of_two());
        let log = n.trailing_zeros() as usize;
        let n1 = 1usize << (log / 2);
        (n1, n / n1)
    }
}
