//! Factor-3 transform: wraps the power-of-two strategies to admit
//! transform lengths `3 * 2^k`.
//!
//! The sequence is treated as three contiguous blocks of length
//! `m = n / 3`. A 3-point butterfly across positions `(i, i+m, i+2m)`
//! with twiddles `w^i`, `w^(2i)` and the cube root of unity `w^m`
//! precedes three independent power-of-two sub-transforms; the inverse
//! runs the sub-transforms backwards and then the inverse butterflies.

use apmul_exec::CancellationToken;
use apmul_math::ModMath;
use apmul_storage::{AccessMode, DataStore};

use crate::strategy::Ntt;
use crate::NttError;

impl Ntt {
    pub(crate) fn factor3_forward(
        &self,
        store: &DataStore,
        modulus_index: usize,
        token: &CancellationToken,
    ) -> Result<(), NttError> {
        let n = store.len();
        let m = n / 3;
        let mm = ModMath::new(modulus_index);
        let w = mm.root_of_unity(n as u64)?;
        let zeta = mm.pow(w, m as u64);

        self.butterfly_pass(store, m, token, |range, d0, d1, d2| {
            let w2 = mm.mul(w, w);
            let mut wi = mm.pow(w, range.start as u64);
            let mut w2i = mm.pow(w2, range.start as u64);
            let zeta2 = mm.mul(zeta, zeta);
            for i in 0..range.len() {
                let (a, b, c) = (d0[i], d1[i], d2[i]);
                let u0 = mm.add(a, mm.add(b, c));
                let u1 = mm.add(a, mm.add(mm.mul(b, zeta), mm.mul(c, zeta2)));
                let u2 = mm.add(a, mm.add(mm.mul(b, zeta2), mm.mul(c, zeta)));
                d0[i] = u0;
                d1[i] = mm.mul(u1, wi);
                d2[i] = mm.mul(u2, w2i);
                wi = mm.mul(wi, w);
                w2i = mm.mul(w2i, w2);
            }
        })?;

        for block in 0..3 {
            let sub = store.subsequence(block * m, m)?;
            self.forward_pow2(&sub, modulus_index, token)?;
        }
        Ok(())
    }

    pub(crate) fn factor3_inverse_unscaled(
        &self,
        store: &DataStore,
        modulus_index: usize,
        token: &CancellationToken,
    ) -> Result<(), NttError> {
        let n = store.len();
        let m = n / 3;
        let mm = ModMath::new(modulus_index);
        let w = mm.root_of_unity(n as u64)?;
        let w_inv = mm.inverse(w)?;
        let zeta = mm.pow(w, m as u64);

        for block in 0..3 {
            let sub = store.subsequence(block * m, m)?;
            self.inverse_pow2_unscaled(&sub, modulus_index, token)?;
        }

        // The 1/3 of the inverse butterfly folds into the caller's
        // single 1/n scale.
        self.butterfly_pass(store, m, token, |range, d0, d1, d2| {
            let w2_inv = mm.mul(w_inv, w_inv);
            let mut wi = mm.pow(w_inv, range.start as u64);
            let mut w2i = mm.pow(w2_inv, range.start as u64);
            let zeta2 = mm.mul(zeta, zeta);
            for i in 0..range.len() {
                let u0 = d0[i];
                let u1 = mm.mul(d1[i], wi);
                let u2 = mm.mul(d2[i], w2i);
                let a = mm.add(u0, mm.add(u1, u2));
                let b = mm.add(u0, mm.add(mm.mul(u1, zeta2), mm.mul(u2, zeta)));
                let c = mm.add(u0, mm.add(mm.mul(u1, zeta), mm.mul(u2, zeta2)));
                d0[i] = a;
                d1[i] = b;
                d2[i] = c;
                wi = mm.mul(wi, w_inv);
                w2i = mm.mul(w2i, w2_inv);
            }
        })
    }

    // Stream the three length-m blocks through windows in bounded,
    // parallel batches and apply `op` to aligned ranges.
    fn butterfly_pass<F>(
        &self,
        store: &DataStore,
        m: usize,
        token: &CancellationToken,
        op: F,
    ) -> Result<(), NttError>
    where
        F: Fn(std::ops::Range<usize>, &mut [u64], &mut [u64], &mut [u64]) + Sync,
    {
        let batch = (self.budget_words() / 3).max(1);
        self.runner
            .run(m, self.settings.min_batch.min(batch), token, |range| {
                let len = range.len();
                let mut a0 = store.array(AccessMode::ReadWrite, range.start, len)?;
                let mut a1 = store.array(AccessMode::ReadWrite, m + range.start, len)?;
                let mut a2 = store.array(AccessMode::ReadWrite, 2 * m + range.start, len)?;
                op(
                    range,
                    a0.words_mut(),
                    a1.words_mut(),
                    a2.words_mut(),
                );
                a0.close()?;
                a1.close()?;
                a2.close()?;
                Ok::<(), NttError>(())
            })
            .map_err(NttError::from)
    }
}
