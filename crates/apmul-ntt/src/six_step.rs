//! Six-step transform: the one-dimensional transform reshaped as an
//! `n1 x n2` matrix held in memory.
//!
//! Forward: transpose, length-`n1` row transforms with `w^(i*j)`
//! twiddles, transpose, length-`n2` row transforms. The final
//! transpose is elided; the inverse reverses the exact step sequence,
//! so transformed data stays in a fixed permutation of frequency order,
//! which element-wise products preserve.

use apmul_exec::CancellationToken;
use apmul_math::ModMath;

use crate::strategy::Ntt;
use crate::{fnt, NttError};

impl Ntt {
    pub(crate) fn six_step_forward(
        &self,
        data: &mut [u64],
        modulus_index: usize,
        token: &CancellationToken,
    ) -> Result<(), NttError> {
        let n = data.len();
        let (n1, n2) = Self::split_dimensions(n);
        let mm = ModMath::new(modulus_index);
        let w = mm.root_of_unity(n as u64)?;
        let table_n1 = self.tables.powers(modulus_index, n1, false)?;
        let table_n2 = self.tables.powers(modulus_index, n2, false)?;

        self.matrix.transpose(data, n1, n2);

        // n2 rows of length n1: transform, then twiddle row i by w^(i*j).
        let rows_per_chunk = (self.settings.min_batch / n1).max(1);
        self.runner
            .run_chunks(data, rows_per_chunk * n1, token, |chunk_index, piece| {
                let first_row = chunk_index * rows_per_chunk;
                for (r, row) in piece.chunks_mut(n1).enumerate() {
                    fnt::forward(&mm, row, &table_n1);
                    twiddle_row(&mm, row, w, first_row + r);
                }
                Ok::<(), NttError>(())
            })
            .map_err(NttError::from)?;

        self.matrix.transpose(data, n2, n1);

        // n1 rows of length n2.
        let rows_per_chunk = (self.settings.min_batch / n2).max(1);
        self.runner
            .run_chunks(data, rows_per_chunk * n2, token, |_, piece| {
                for row in piece.chunks_mut(n2) {
                    fnt::forward(&mm, row, &table_n2);
                }
                Ok::<(), NttError>(())
            })
            .map_err(NttError::from)
    }

    pub(crate) fn six_step_inverse_unscaled(
        &self,
        data: &mut [u64],
        modulus_index: usize,
        token: &CancellationToken,
    ) -> Result<(), NttError> {
        let n = data.len();
        let (n1, n2) = Self::split_dimensions(n);
        let mm = ModMath::new(modulus_index);
        let w_inv = mm.inverse(mm.root_of_unity(n as u64)?)?;
        let table_n1 = self.tables.powers(modulus_index, n1, true)?;
        let table_n2 = self.tables.powers(modulus_index, n2, true)?;

        let rows_per_chunk = (self.settings.min_batch / n2).max(1);
        self.runner
            .run_chunks(data, rows_per_chunk * n2, token, |_, piece| {
                for row in piece.chunks_mut(n2) {
                    fnt::inverse(&mm, row, &table_n2);
                }
                Ok::<(), NttError>(())
            })
            .map_err(NttError::from)?;

        self.matrix.transpose(data, n1, n2);

        // Undo the forward row step: inverse twiddle first, then the
        // inverse transform.
        let rows_per_chunk = (self.settings.min_batch / n1).max(1);
        self.runner
            .run_chunks(data, rows_per_chunk * n1, token, |chunk_index, piece| {
                let first_row = chunk_index * rows_per_chunk;
                for (r, row) in piece.chunks_mut(n1).enumerate() {
                    twiddle_row(&mm, row, w_inv, first_row + r);
                    fnt::inverse(&mm, row, &table_n1);
                }
                Ok::<(), NttError>(())
            })
            .map_err(NttError::from)?;

        self.matrix.transpose(data, n2, n1);
        Ok(())
    }
}

/// Multiply `row[j]` by `w^(row_index * j)`.
pub(crate) fn twiddle_row(mm: &ModMath, row: &mut [u64], w: u64, row_index: usize) {
    let wi = mm.pow(w, row_index as u64);
    let mut acc = 1u64;
    for word in row {
        *word = mm.mul(*word, acc);
        acc = mm.mul(acc, wi);
    }
}
