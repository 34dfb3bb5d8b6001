//! In-array butterfly passes.
//!
//! Forward transforms run decimation-in-frequency butterflies and end
//! with the index scramble; inverse transforms scramble first and run
//! decimation-in-time butterflies with inverse root powers. Inverse
//! passes do not scale — the owning strategy divides by the total
//! transform length once, at the end.

use apmul_math::ModMath;

/// Forward transform of `data` in place. `table` holds the first
/// `n / 2` powers of a root of unity of order `n = data.len()`.
pub fn forward(mm: &ModMath, data: &mut [u64], table: &[u64]) {
    let n = data.len();
    if n <= 1 {
        return;
    }
    debug_assert!(n.is_power_of_two());
    debug_assert_eq!(table.len(), n / 2);

    let mut half = n / 2;
    while half >= 1 {
        let step = n / (2 * half);
        for start in (0..n).step_by(2 * half) {
            for j in 0..half {
                let a = data[start + j];
                let b = data[start + j + half];
                data[start + j] = mm.add(a, b);
                data[start + j + half] = mm.mul(mm.sub(a, b), table[j * step]);
            }
        }
        half /= 2;
    }
    scramble(data);
}

/// Inverse transform of `data` in place, without the `1/n` scale.
/// `table` holds inverse root powers.
pub fn inverse(mm: &ModMath, data: &mut [u64], table: &[u64]) {
    let n = data.len();
    if n <= 1 {
        return;
    }
    debug_assert!(n.is_power_of_two());
    debug_assert_eq!(table.len(), n / 2);

    scramble(data);
    let mut half = 1;
    while half < n {
        let step = n / (2 * half);
        for start in (0..n).step_by(2 * half) {
            for j in 0..half {
                let a = data[start + j];
                let b = mm.mul(data[start + j + half], table[j * step]);
                data[start + j] = mm.add(a, b);
                data[start + j + half] = mm.sub(a, b);
            }
        }
        half *= 2;
    }
}

/// Multiply every element by `factor`.
pub fn scale(mm: &ModMath, data: &mut [u64], factor: u64) {
    for word in data {
        *word = mm.mul(*word, factor);
    }
}

/// Bit-reversal permutation.
fn scramble(data: &mut [u64]) {
    let n = data.len();
    let mut j = 0;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j ^= bit;
        if i < j {
            data.swap(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::TwiddleCache;
    use apmul_math::MODULUS;

    fn round_trip(modulus_index: usize, n: usize) {
        let cache = TwiddleCache::new();
        let mm = ModMath::new(modulus_index);
        let fwd = cache.powers(modulus_index, n, false).unwrap();
        let inv = cache.powers(modulus_index, n, true).unwrap();

        let mut data: Vec<u64> = (0..n as u64)
            .map(|i| (i * 2_654_435_761 + 1) % MODULUS[modulus_index])
            .collect();
        let original = data.clone();

        forward(&mm, &mut data, &fwd);
        inverse(&mm, &mut data, &inv);
        let n_inv = mm.inverse(n as u64 % mm.modulus()).unwrap();
        scale(&mm, &mut data, n_inv);

        assert_eq!(data, original, "modulus {modulus_index}, n {n}");
    }

    #[test]
    fn round_trips_small_sizes() {
        for modulus_index in 0..3 {
            for n in [2usize, 4, 8, 64, 256] {
                round_trip(modulus_index, n);
            }
        }
    }

    #[test]
    fn sequential_values_round_trip_length_1024() {
        // Length-1024 sequence of sequential integers under each modulus.
        for modulus_index in 0..3 {
            let cache = TwiddleCache::new();
            let mm = ModMath::new(modulus_index);
            let fwd = cache.powers(modulus_index, 1024, false).unwrap();
            let inv = cache.powers(modulus_index, 1024, true).unwrap();
            let mut data: Vec<u64> = (0..1024).collect();
            let original = data.clone();
            forward(&mm, &mut data, &fwd);
            inverse(&mm, &mut data, &inv);
            let n_inv = mm.inverse(1024).unwrap();
            scale(&mm, &mut data, n_inv);
            assert_eq!(data, original);
        }
    }

    #[test]
    fn forward_convolution_theorem() {
        // Pointwise products in the transform domain give the cyclic
        // convolution after inversion.
        let n = 8usize;
        let cache = TwiddleCache::new();
        let mm = ModMath::new(0);
        let fwd = cache.powers(0, n, false).unwrap();
        let inv = cache.powers(0, n, true).unwrap();

        let x: Vec<u64> = vec![1, 2, 3, 4, 0, 0, 0, 0];
        let y: Vec<u64> = vec![5, 6, 7, 8, 0, 0, 0, 0];
        let mut reference = vec![0u64; n];
        for i in 0..n {
            for j in 0..n {
                let k = (i + j) % n;
                reference[k] = mm.add(reference[k], mm.mul(x[i], y[j]));
            }
        }

        let mut fx = x.clone();
        let mut fy = y.clone();
        forward(&mm, &mut fx, &fwd);
        forward(&mm, &mut fy, &fwd);
        let mut fz: Vec<u64> = fx.iter().zip(&fy).map(|(&a, &b)| mm.mul(a, b)).collect();
        inverse(&mm, &mut fz, &inv);
        let n_inv = mm.inverse(n as u64).unwrap();
        scale(&mm, &mut fz, n_inv);

        assert_eq!(fz, reference);
    }

    #[test]
    fn single_element_is_identity() {
        let mm = ModMath::new(0);
        let mut data = vec![42u64];
        forward(&mm, &mut data, &[1]);
        assert_eq!(data, vec![42]);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn random_data_round_trips(
                log_n in 1u32..10,
                seed: u64,
                modulus_index in 0usize..3,
            ) {
                let n = 1usize << log_n;
                let cache = TwiddleCache::new();
                let mm = ModMath::new(modulus_index);
                let fwd = cache.powers(modulus_index, n, false).unwrap();
                let inv = cache.powers(modulus_index, n, true).unwrap();

                let mut data: Vec<u64> = (0..n as u64)
                    .map(|i| i.wrapping_mul(seed | 1) % MODULUS[modulus_index])
                    .collect();
                let original = data.clone();

                forward(&mm, &mut data, &fwd);
                inverse(&mm, &mut data, &inv);
                let n_inv = mm.inverse(n as u64).unwrap();
                scale(&mm, &mut data, n_inv);
                prop_assert_eq!(data, original);
            }
        }
    }
}
