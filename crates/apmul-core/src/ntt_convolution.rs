//! Three-modulus NTT convolution.
//!
//! Digit words are below the radix base, which is below every working
//! modulus, so operands enter each modular domain unchanged. Per
//! modulus: forward-transform both operands (one transform when
//! squaring), multiply element-wise, inverse-transform; the three
//! modular results go to the carry-CRT engine for recombination.

use std::sync::Arc;

use apmul_exec::{CancellationToken, ParallelRunner};
use apmul_math::{ModMath, MODULUS_COUNT};
use apmul_ntt::{transform_length, Ntt};
use apmul_storage::{AccessMode, DataStore, StoreBuilder};

use crate::carry_crt::CarryCrt;
use crate::convolution::{check_result_size, ConvolutionStrategy};
use crate::ApmulError;

/// O(n log n) convolution through the transform engine.
pub struct NttConvolution {
    ntt: Arc<Ntt>,
    carry_crt: Arc<CarryCrt>,
    storage: StoreBuilder,
    runner: Arc<ParallelRunner>,
    min_batch: usize,
}

impl NttConvolution {
    /// An NTT strategy over the given transform and recombination
    /// engines.
    #[must_use]
    pub fn new(
        ntt: Arc<Ntt>,
        carry_crt: Arc<CarryCrt>,
        storage: StoreBuilder,
        runner: Arc<ParallelRunner>,
        min_batch: usize,
    ) -> Self {
        Self {
            ntt,
            carry_crt,
            storage,
            runner,
            min_batch: min_batch.max(1),
        }
    }

    // The operand zero-padded to the transform length.
    fn padded_copy(&self, operand: &DataStore, length: usize) -> Result<DataStore, ApmulError> {
        let store = self.storage.create(length)?;
        store.subsequence(0, operand.len())?.copy_from(operand)?;
        Ok(store)
    }

    // dst[i] = dst[i] * src[i] under one modulus, streamed in parallel
    // batches.
    fn pointwise_multiply(
        &self,
        dst: &DataStore,
        src: &DataStore,
        modulus_index: usize,
        token: &CancellationToken,
    ) -> Result<(), ApmulError> {
        let mm = ModMath::new(modulus_index);
        self.runner
            .run(dst.len(), self.min_batch, token, |range| {
                let len = range.len();
                let mut d = dst.array(AccessMode::ReadWrite, range.start, len)?;
                let s = src.array(AccessMode::Read, range.start, len)?;
                for (a, &b) in d.words_mut().iter_mut().zip(s.words()) {
                    *a = mm.mul(*a, b);
                }
                d.close()?;
                s.close()?;
                Ok::<(), ApmulError>(())
            })
            .map_err(ApmulError::from)
    }

    // dst[i] = dst[i]^2 under one modulus.
    fn pointwise_square(
        &self,
        dst: &DataStore,
        modulus_index: usize,
        token: &CancellationToken,
    ) -> Result<(), ApmulError> {
        let mm = ModMath::new(modulus_index);
        self.runner
            .run(dst.len(), self.min_batch, token, |range| {
                let len = range.len();
                let mut d = dst.array(AccessMode::ReadWrite, range.start, len)?;
                for a in d.words_mut() {
                    *a = mm.mul(*a, *a);
                }
                d.close()?;
                Ok::<(), ApmulError>(())
            })
            .map_err(ApmulError::from)
    }
}

impl ConvolutionStrategy for NttConvolution {
    fn convolute(
        &self,
        x: &DataStore,
        y: &DataStore,
        result_size: usize,
        token: &CancellationToken,
    ) -> Result<DataStore, ApmulError> {
        check_result_size(x, y, result_size)?;
        if token.is_cancelled() {
            return Err(ApmulError::Cancelled);
        }
        let length = transform_length(result_size)?;
        let squaring = x.same_range(y);
        tracing::debug!(result_size, length, squaring, "ntt convolution");

        let mut residues = Vec::with_capacity(MODULUS_COUNT);
        for modulus_index in 0..MODULUS_COUNT {
            let fx = self.padded_copy(x, length)?;
            self.ntt.transform(&fx, modulus_index, token)?;

            if squaring {
                self.pointwise_square(&fx, modulus_index, token)?;
            } else {
                let fy = self.padded_copy(y, length)?;
                self.ntt.transform(&fy, modulus_index, token)?;
                self.pointwise_multiply(&fx, &fy, modulus_index, token)?;
            }

            self.ntt
                .inverse_transform(&fx, modulus_index, length, token)?;
            residues.push(fx);
        }

        self.carry_crt
            .carry_crt(&residues[0], &residues[1], &residues[2], result_size, token)
    }

    fn name(&self) -> &'static str {
        "NTT"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BuilderRegistry, Context, SchoolbookConvolution};

    fn builders() -> Arc<crate::Builders> {
        BuilderRegistry::new(Context::default())
            .unwrap()
            .for_radix(10)
            .unwrap()
    }

    #[test]
    fn matches_schoolbook() {
        let b = builders();
        let token = CancellationToken::new();
        let x = DataStore::from_words(&(1..=30u64).collect::<Vec<_>>());
        let y = DataStore::from_words(&(5..=40u64).collect::<Vec<_>>());
        let rsize = x.len() + y.len();

        let via_ntt = b.ntt_convolution.convolute(&x, &y, rsize, &token).unwrap();
        let via_schoolbook = b.schoolbook.convolute(&x, &y, rsize, &token).unwrap();
        assert_eq!(
            via_ntt.to_vec().unwrap(),
            via_schoolbook.to_vec().unwrap()
        );
    }

    #[test]
    fn squaring_detected_through_shared_backing() {
        let b = builders();
        let token = CancellationToken::new();
        let x = DataStore::from_words(&(1..=20u64).collect::<Vec<_>>());
        let rsize = 2 * x.len();

        let squared = b.ntt_convolution.convolute(&x, &x, rsize, &token).unwrap();
        let reference = b.schoolbook.convolute(&x, &x.subsequence(0, x.len()).unwrap(), rsize, &token).unwrap();
        assert_eq!(squared.to_vec().unwrap(), reference.to_vec().unwrap());
    }

    #[test]
    fn max_digit_words_survive() {
        let base = apmul_math::RadixInfo::for_radix(10).unwrap().base;
        let b = builders();
        let token = CancellationToken::new();
        let x = DataStore::from_words(&vec![base - 1; 16]);
        let rsize = 32;
        let got = b.ntt_convolution.convolute(&x, &x, rsize, &token).unwrap();
        let want = SchoolbookConvolution::new(base, StoreBuilder::default())
            .convolute(&x, &x.subsequence(0, 16).unwrap(), rsize, &token)
            .unwrap();
        assert_eq!(got.to_vec().unwrap(), want.to_vec().unwrap());
    }
}
