//! Three-word values and CRT recombination.
//!
//! A convolution result element is the sum of up to `n` digit products
//! and therefore needs up to three words; it is reconstructed from its
//! three modular residues with Garner's mixed-radix algorithm using
//! precomputed coefficients. All operations are branch-minimal and
//! correct across the full unsigned word range.

use std::cmp::Ordering;

use crate::modulus::ModMath;

const MASK: u128 = u64::MAX as u128;

/// A 3-word unsigned value, most significant word first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Word3 {
    /// Most significant word.
    pub hi: u64,
    /// Middle word.
    pub mid: u64,
    /// Least significant word.
    pub lo: u64,
}

impl Word3 {
    /// Zero value.
    pub const ZERO: Self = Self {
        hi: 0,
        mid: 0,
        lo: 0,
    };

    /// Widen a 2-word value.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_u128(v: u128) -> Self {
        Self {
            hi: 0,
            mid: (v >> 64) as u64,
            lo: v as u64,
        }
    }

    /// Narrow to 2 words; `None` when the high word is occupied.
    #[must_use]
    pub fn to_u128(self) -> Option<u128> {
        if self.hi != 0 {
            None
        } else {
            Some((u128::from(self.mid) << 64) | u128::from(self.lo))
        }
    }

    /// `(hi, lo) * w`, a 2-word by 1-word product widened to 3 words.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn mul_2x1(hi: u64, lo: u64, w: u64) -> Self {
        let low = u128::from(lo) * u128::from(w);
        let high = u128::from(hi) * u128::from(w);
        let mid = (low >> 64) + (high & MASK);
        Self {
            hi: ((high >> 64) + (mid >> 64)) as u64,
            mid: mid as u64,
            lo: low as u64,
        }
    }

    /// Wrapping 3-word addition.
    #[must_use]
    pub fn add(self, other: Self) -> Self {
        let (lo, c0) = self.lo.overflowing_add(other.lo);
        let (mid, c1) = self.mid.overflowing_add(other.mid);
        let (mid, c2) = mid.overflowing_add(u64::from(c0));
        let hi = self
            .hi
            .wrapping_add(other.hi)
            .wrapping_add(u64::from(c1) + u64::from(c2));
        Self { hi, mid, lo }
    }

    /// Wrapping 3-word subtraction.
    #[must_use]
    pub fn sub(self, other: Self) -> Self {
        let (lo, b0) = self.lo.overflowing_sub(other.lo);
        let (mid, b1) = self.mid.overflowing_sub(other.mid);
        let (mid, b2) = mid.overflowing_sub(u64::from(b0));
        let hi = self
            .hi
            .wrapping_sub(other.hi)
            .wrapping_sub(u64::from(b1) + u64::from(b2));
        Self { hi, mid, lo }
    }

    /// Lexicographic comparison, most significant word first.
    #[must_use]
    pub fn compare(self, other: Self) -> Ordering {
        (self.hi, self.mid, self.lo).cmp(&(other.hi, other.mid, other.lo))
    }

    /// Divide by a single word, returning quotient and remainder.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn div_rem(self, divisor: u64) -> (Self, u64) {
        debug_assert!(divisor > 0);
        let hi_q = self.hi / divisor;
        let mut rem = self.hi % divisor;
        let v = (u128::from(rem) << 64) | u128::from(self.mid);
        let mid_q = (v / u128::from(divisor)) as u64;
        rem = (v % u128::from(divisor)) as u64;
        let v = (u128::from(rem) << 64) | u128::from(self.lo);
        let lo_q = (v / u128::from(divisor)) as u64;
        rem = (v % u128::from(divisor)) as u64;
        (
            Self {
                hi: hi_q,
                mid: mid_q,
                lo: lo_q,
            },
            rem,
        )
    }
}

/// Garner recombination of residues modulo the three working primes.
#[derive(Debug, Clone, Copy)]
pub struct CrtMath {
    mm1: ModMath,
    mm2: ModMath,
    m0: u64,
    // (M0 * M1) as a 2-word value.
    m0m1_hi: u64,
    m0m1_lo: u64,
    // Precomputed Garner coefficients, generated offline.
    m0_inv_m1: u64,
    m01_inv_m2: u64,
    m0_mod_m2: u64,
}

/// `(M0)^-1 mod M1`.
const M0_INV_M1: u64 = 2_302_113_465_772_272_308;
/// `(M0 * M1)^-1 mod M2`.
const M01_INV_M2: u64 = 4_081_593_460_734_893_023;
/// `M0 mod M2`.
const M0_MOD_M2: u64 = 9_710_886_696_517_632;
/// `M0 * M1`, high and low words.
const M0M1_HI: u64 = 1_149_405_742_088_847_360;
const M0M1_LO: u64 = 9_209_298_288_019_243_009;

impl CrtMath {
    /// Recombination context for the fixed modulus set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mm1: ModMath::new(1),
            mm2: ModMath::new(2),
            m0: crate::MODULUS[0],
            m0m1_hi: M0M1_HI,
            m0m1_lo: M0M1_LO,
            m0_inv_m1: M0_INV_M1,
            m01_inv_m2: M01_INV_M2,
            m0_mod_m2: M0_MOD_M2,
        }
    }

    /// The unique value below `M0 * M1 * M2` with the given residues.
    ///
    /// Mixed-radix form: `v = r0 + t1 * M0 + t2 * M0 * M1` with
    /// `t1 = (r1 - r0) / M0 (mod M1)` and
    /// `t2 = (r2 - v01) / (M0 * M1) (mod M2)`.
    #[must_use]
    pub fn combine(&self, r0: u64, r1: u64, r2: u64) -> Word3 {
        let m1 = self.mm1.modulus();
        let m2 = self.mm2.modulus();
        // r0 < M0 < 2 * M1 and < 2 * M2: one conditional subtract reduces.
        let r0_m1 = if r0 >= m1 { r0 - m1 } else { r0 };
        let r0_m2 = if r0 >= m2 { r0 - m2 } else { r0 };

        let t1 = self.mm1.mul(self.mm1.sub(r1, r0_m1), self.m0_inv_m1);
        let v01 = u128::from(r0) + u128::from(t1) * u128::from(self.m0);

        let t1_m2 = if t1 >= m2 { t1 - m2 } else { t1 };
        let v01_m2 = self
            .mm2
            .add(r0_m2, self.mm2.mul(t1_m2, self.m0_mod_m2));
        let t2 = self.mm2.mul(self.mm2.sub(r2, v01_m2), self.m01_inv_m2);

        Word3::from_u128(v01).add(Word3::mul_2x1(self.m0m1_hi, self.m0m1_lo, t2))
    }
}

impl Default for CrtMath {
    fn default() -> Self {
        Self::new()
    }
}
