//! Schoolbook convolution: quadratic multiply-add with no allocation
//! beyond the result. Used for small operands and as the recursion
//! floor of Karatsuba.

use apmul_exec::CancellationToken;
use apmul_math::base::base_multiply_add;
use apmul_storage::{AccessMode, DataStore, StoreBuilder};

use crate::convolution::{check_result_size, ConvolutionStrategy};
use crate::ApmulError;

/// O(n^2) multiply-add convolution in the radix base.
pub struct SchoolbookConvolution {
    base: u64,
    storage: StoreBuilder,
}

impl SchoolbookConvolution {
    /// A schoolbook strategy for the given radix base.
    #[must_use]
    pub fn new(base: u64, storage: StoreBuilder) -> Self {
        Self { base, storage }
    }

    /// Multiply two word slices, least significant word first.
    pub(crate) fn multiply_slices(&self, x: &[u64], y: &[u64]) -> Vec<u64> {
        let mut out = vec![0u64; x.len() + y.len()];
        for (j, &yj) in y.iter().enumerate() {
            let carry = base_multiply_add(self.base, x, yj, 0, &mut out[j..j + x.len()]);
            // The word above the window is untouched by earlier rounds.
            out[j + x.len()] = carry;
        }
        out
    }
}

impl ConvolutionStrategy for SchoolbookConvolution {
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

        let xs = x.array(AccessMode::Read, 0, x.len())?;
        let ys = y.array(AccessMode::Read, 0, y.len())?;
        let product = self.multiply_slices(xs.words(), ys.words());
        xs.close()?;
        ys.close()?;

        let result = self.storage.create(result_size)?;
        let mut out = result.array(AccessMode::Write, 0, result_size)?;
        out.words_mut().copy_from_slice(&product);
        out.close()?;
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "Schoolbook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apmul_math::RadixInfo;

    fn schoolbook() -> SchoolbookConvolution {
        let base = RadixInfo::for_radix(10).unwrap().base;
        SchoolbookConvolution::new(base, StoreBuilder::default())
    }

    #[test]
    fn single_words() {
        let s = schoolbook();
        assert_eq!(s.multiply_slices(&[7], &[6]), vec![42, 0]);
    }

    #[test]
    fn carries_between_words() {
        let s = schoolbook();
        let base = RadixInfo::for_radix(10).unwrap().base;
        // (base - 1)^2 = base^2 - 2*base + 1
        assert_eq!(
            s.multiply_slices(&[base - 1], &[base - 1]),
            vec![1, base - 2]
        );
    }

    #[test]
    fn matches_long_multiplication() {
        let s = schoolbook();
        // (2 + 3 B)(4 + 5 B) = 8 + 22 B + 15 B^2
        assert_eq!(s.multiply_slices(&[2, 3], &[4, 5]), vec![8, 22, 15, 0]);
    }

    #[test]
    fn store_round_trip() {
        let s = schoolbook();
        let token = CancellationToken::new();
        let x = DataStore::from_words(&[2, 3]);
        let y = DataStore::from_words(&[4, 5]);
        let result = s.convolute(&x, &y, 4, &token).unwrap();
        assert_eq!(result.to_vec().unwrap(), vec![8, 22, 15, 0]);
    }

    #[test]
    fn cancelled_before_start() {
        let s = schoolbook();
        let token = CancellationToken::new();
        token.cancel();
        let x = DataStore::from_words(&[1]);
        let y = DataStore::from_words(&[1]);
        assert!(matches!(
            s.convolute(&x, &y, 2, &token),
            Err(ApmulError::Cancelled)
        ));
    }
}
