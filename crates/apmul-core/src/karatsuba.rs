//! Karatsuba convolution: recursive split with three half-size products
//! per level, falling back to schoolbook below a cutoff.

use apmul_exec::CancellationToken;
use apmul_storage::{AccessMode, DataStore, StoreBuilder};

use crate::convolution::{check_result_size, ConvolutionStrategy};
use crate::{ApmulError, SchoolbookConvolution};

/// O(n^1.585) divide-and-conquer convolution in the radix base.
pub struct KaratsubaConvolution {
    base: u64,
    cutoff: usize,
    schoolbook: SchoolbookConvolution,
    storage: StoreBuilder,
}

impl KaratsubaConvolution {
    /// A Karatsuba strategy falling back to schoolbook at or below
    /// `cutoff` words.
    #[must_use]
    pub fn new(base: u64, cutoff: usize, storage: StoreBuilder) -> Self {
        Self {
            base,
            cutoff: cutoff.max(1),
            schoolbook: SchoolbookConvolution::new(base, storage.clone()),
            storage,
        }
    }

    /// Multiply two word slices, least significant word first.
    pub(crate) fn multiply_slices(
        &self,
        x: &[u64],
        y: &[u64],
        token: &CancellationToken,
    ) -> Result<Vec<u64>, ApmulError> {
        if token.is_cancelled() {
            return Err(ApmulError::Cancelled);
        }
        let short = x.len().min(y.len());
        let long = x.len().max(y.len());
        if short <= self.cutoff {
            return Ok(self.schoolbook.multiply_slices(x, y));
        }

        let half = long.div_ceil(2);
        if short <= half {
            // One operand too short to split: multiply against the
            // halves of the longer one.
            let (a, b) = if x.len() >= y.len() { (x, y) } else { (y, x) };
            let lo = self.multiply_slices(&a[..half], b, token)?;
            let hi = self.multiply_slices(&a[half..], b, token)?;
            let mut out = vec![0u64; x.len() + y.len()];
            add_into(self.base, &mut out, 0, &lo);
            add_into(self.base, &mut out, half, &hi);
            return Ok(out);
        }

        let (x0, x1) = x.split_at(half);
        let (y0, y1) = y.split_at(half);

        let z0 = self.multiply_slices(x0, y0, token)?;
        let z2 = self.multiply_slices(x1, y1, token)?;

        let sx = add_halves(self.base, x0, x1);
        let sy = add_halves(self.base, y0, y1);
        let mut z1 = self.multiply_slices(&sx, &sy, token)?;
        subtract_in_place(self.base, &mut z1, &z0);
        subtract_in_place(self.base, &mut z1, &z2);

        let mut out = vec![0u64; x.len() + y.len()];
        add_into(self.base, &mut out, 0, &z0);
        add_into(self.base, &mut out, half, &z1);
        add_into(self.base, &mut out, 2 * half, &z2);
        Ok(out)
    }
}

impl ConvolutionStrategy for KaratsubaConvolution {
    fn convolute(
        &self,
        x: &DataStore,
        y: &DataStore,
        result_size: usize,
        token: &CancellationToken,
    ) -> Result<DataStore, ApmulError> {
        check_result_size(x, y, result_size)?;
        let xs = x.array(AccessMode::Read, 0, x.len())?;
        let ys = y.array(AccessMode::Read, 0, y.len())?;
        let product = self.multiply_slices(xs.words(), ys.words(), token)?;
        xs.close()?;
        ys.close()?;

        let result = self.storage.create(result_size)?;
        let mut out = result.array(AccessMode::Write, 0, result_size)?;
        out.words_mut().copy_from_slice(&product);
        out.close()?;
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "Karatsuba"
    }
}

/// `dst[offset..] += src` with carry propagation. The value is known to
/// fit: a carry never ripples past the end of `dst`.
#[allow(clippy::cast_possible_truncation)]
fn add_into(base: u64, dst: &mut [u64], offset: usize, src: &[u64]) {
    let mut carry = 0u64;
    let mut pos = offset;
    for &word in src {
        if pos >= dst.len() {
            debug_assert!(word == 0 && carry == 0);
            return;
        }
        let value = u128::from(dst[pos]) + u128::from(word) + u128::from(carry);
        dst[pos] = (value % u128::from(base)) as u64;
        carry = (value / u128::from(base)) as u64;
        pos += 1;
    }
    while carry > 0 && pos < dst.len() {
        let value = u128::from(dst[pos]) + u128::from(carry);
        dst[pos] = (value % u128::from(base)) as u64;
        carry = (value / u128::from(base)) as u64;
        pos += 1;
    }
    debug_assert_eq!(carry, 0);
}

/// `dst -= src` in place; `src` never exceeds `dst` in value.
fn subtract_in_place(base: u64, dst: &mut [u64], src: &[u64]) {
    let mut borrow = 0u64;
    for pos in 0..dst.len() {
        let sub = src.get(pos).copied().unwrap_or(0) + borrow;
        if dst[pos] >= sub {
            dst[pos] -= sub;
            borrow = 0;
        } else {
            dst[pos] = dst[pos] + base - sub;
            borrow = 1;
        }
    }
    debug_assert_eq!(borrow, 0);
}

/// Sum of the two halves of a split operand, one word wider than the
/// longer half.
fn add_halves(base: u64, lo: &[u64], hi: &[u64]) -> Vec<u64> {
    debug_assert!(hi.len() <= lo.len());
    let mut out = vec![0u64; lo.len() + 1];
    let mut carry = 0u64;
    for i in 0..lo.len() {
        let sum = lo[i] + hi.get(i).copied().unwrap_or(0) + carry;
        if sum >= base {
            out[i] = sum - base;
            carry = 1;
        } else {
            out[i] = sum;
            carry = 0;
        }
    }
    out[lo.len()] = carry;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use apmul_math::RadixInfo;
    use proptest::prelude::*;

    fn karatsuba(cutoff: usize) -> KaratsubaConvolution {
        let base = RadixInfo::for_radix(10).unwrap().base;
        KaratsubaConvolution::new(base, cutoff, StoreBuilder::default())
    }

    fn schoolbook_reference(x: &[u64], y: &[u64]) -> Vec<u64> {
        let base = RadixInfo::for_radix(10).unwrap().base;
        SchoolbookConvolution::new(base, StoreBuilder::default()).multiply_slices(x, y)
    }

    #[test]
    fn matches_schoolbook_on_even_split() {
        let k = karatsuba(1);
        let token = CancellationToken::new();
        let x: Vec<u64> = (1..=8).collect();
        let y: Vec<u64> = (11..=18).collect();
        assert_eq!(
            k.multiply_slices(&x, &y, &token).unwrap(),
            schoolbook_reference(&x, &y)
        );
    }

    #[test]
    fn matches_schoolbook_on_odd_lengths() {
        let k = karatsuba(2);
        let token = CancellationToken::new();
        let x: Vec<u64> = (1..=7).collect();
        let y: Vec<u64> = (3..=11).collect();
        assert_eq!(
            k.multiply_slices(&x, &y, &token).unwrap(),
            schoolbook_reference(&x, &y)
        );
    }

    #[test]
    fn handles_very_unbalanced_operands() {
        let k = karatsuba(2);
        let token = CancellationToken::new();
        let x: Vec<u64> = (1..=40).collect();
        let y: Vec<u64> = vec![9, 8, 7];
        assert_eq!(
            k.multiply_slices(&x, &y, &token).unwrap(),
            schoolbook_reference(&x, &y)
        );
    }

    #[test]
    fn carries_at_base_boundary() {
        let base = RadixInfo::for_radix(10).unwrap().base;
        let k = karatsuba(1);
        let token = CancellationToken::new();
        let x = vec![base - 1; 6];
        let y = vec![base - 1; 6];
        assert_eq!(
            k.multiply_slices(&x, &y, &token).unwrap(),
            schoolbook_reference(&x, &y)
        );
    }

    #[test]
    fn cancellation_propagates() {
        let k = karatsuba(1);
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            k.multiply_slices(&[1, 2, 3, 4], &[5, 6, 7, 8], &token),
            Err(ApmulError::Cancelled)
        ));
    }

    proptest! {
        #[test]
        fn agrees_with_schoolbook(
            x in proptest::collection::vec(0u64..100_000_000_000_000_000, 1..40),
            y in proptest::collection::vec(0u64..100_000_000_000_000_000, 1..40),
        ) {
            let k = karatsuba(3);
            let token = CancellationToken::new();
            prop_assert_eq!(
                k.multiply_slices(&x, &y, &token).unwrap(),
                schoolbook_reference(&x, &y)
            );
        }
    }
}
