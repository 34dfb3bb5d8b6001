//! The matrix engine: cache-blocked transposition and power-of-two row
//! permutation over in-memory word buffers.
//!
//! Rectangular transposes (one dimension double the other) are built
//! from square-block transposes plus the half/double-width row
//! permutations, which is also how the transform strategies reshape
//! one-dimensional data without a full copy of both shapes.

/// Matrix operations tuned to a block size derived from the L1 cache.
#[derive(Debug, Clone, Copy)]
pub struct Matrix {
    block: usize,
}

impl Matrix {
    /// A matrix engine whose transpose tiles fit the given L1 cache
    /// size (bytes). Two tiles of `block^2` words must fit at once.
    #[must_use]
    pub fn new(cache_l1: usize) -> Self {
        let words = (cache_l1 / 16).max(16);
        let mut block = 1usize;
        while block * block * 4 <= words {
            block *= 2;
        }
        Self {
            block: block.max(4),
        }
    }

    /// Transpose an `n1 x n2` row-major matrix into `n2 x n1`.
    ///
    /// `n1` and `n2` must be powers of two, equal or one double the
    /// other.
    pub fn transpose(&self, data: &mut [u64], n1: usize, n2: usize) {
        debug_assert_eq!(data.len(), n1 * n2);
        debug_assert!(n1.is_power_of_two() && n2.is_power_of_two());
        debug_assert!(n1 == n2 || n1 == 2 * n2 || n2 == 2 * n1);

        if n1 == n2 {
            self.transpose_square_block(data, 0, n1, n1);
        } else if n2 == 2 * n1 {
            // [A | B] -> [A^T; B^T]: transpose both square halves in
            // place, then split each row into its halves.
            self.transpose_square_block(data, 0, n1, n2);
            self.transpose_square_block(data, n1, n1, n2);
            permute_to_half_width(data, n1, n2);
        } else {
            // [C; D] -> [C^T | D^T]: join row pairs, then transpose the
            // square halves in place.
            permute_to_double_width(data, n1, n2);
            self.transpose_square_block(data, 0, n2, n1);
            self.transpose_square_block(data, n2, n2, n1);
        }
    }

    /// Transpose only the leading `n1 x n1` block of an `n1 x n2`
    /// matrix, leaving the rest untouched.
    pub fn transpose_square(&self, data: &mut [u64], n1: usize, n2: usize) {
        debug_assert_eq!(data.len(), n1 * n2);
        debug_assert!(n1 <= n2);
        self.transpose_square_block(data, 0, n1, n2);
    }

    // In-place transpose of the square block of side `side` starting at
    // column `start_column` of a row-major matrix with `stride` columns.
    fn transpose_square_block(&self, data: &mut [u64], start_column: usize, side: usize, stride: usize) {
        if side <= self.block {
            Self::transpose_plain(data, start_column, side, stride);
            return;
        }
        let block = self.block;
        let mut bi = 0;
        while bi < side {
            // Diagonal tile.
            for i in bi..bi + block {
                for j in bi + 1..bi + block {
                    if j > i {
                        data.swap(i * stride + start_column + j, j * stride + start_column + i);
                    }
                }
            }
            // Off-diagonal tile pairs.
            let mut bj = bi + block;
            while bj < side {
                for i in bi..bi + block {
                    for j in bj..bj + block {
                        data.swap(i * stride + start_column + j, j * stride + start_column + i);
                    }
                }
                bj += block;
            }
            bi += block;
        }
    }

    // Unblocked path for matrices that fit in one cache level.
    fn transpose_plain(data: &mut [u64], start_column: usize, side: usize, stride: usize) {
        for i in 0..side {
            for j in i + 1..side {
                data.swap(i * stride + start_column + j, j * stride + start_column + i);
            }
        }
    }
}

/// Reinterpret an `n1 x n2` matrix as `n1/2 x 2*n2` by moving the lower
/// half of the rows to the right of the upper half.
pub fn permute_to_double_width(data: &mut [u64], n1: usize, n2: usize) {
    debug_assert_eq!(data.len(), n1 * n2);
    debug_assert!(n1 % 2 == 0);
    let half = n1 / 2;
    let scratch = data.to_vec();
    for i in 0..half {
        data[i * 2 * n2..i * 2 * n2 + n2].copy_from_slice(&scratch[i * n2..(i + 1) * n2]);
        data[i * 2 * n2 + n2..(i + 1) * 2 * n2]
            .copy_from_slice(&scratch[(half + i) * n2..(half + i + 1) * n2]);
    }
}

/// Inverse of [`permute_to_double_width`]: reinterpret `n1 x n2` as
/// `2*n1 x n2/2`.
pub fn permute_to_half_width(data: &mut [u64], n1: usize, n2: usize) {
    debug_assert_eq!(data.len(), n1 * n2);
    debug_assert!(n2 % 2 == 0);
    let half = n2 / 2;
    let scratch = data.to_vec();
    for i in 0..n1 {
        data[i * half..(i + 1) * half].copy_from_slice(&scratch[i * n2..i * n2 + half]);
        data[(n1 + i) * half..(n1 + i + 1) * half]
            .copy_from_slice(&scratch[i * n2 + half..(i + 1) * n2]);
    }
}
