//! Cached root-of-unity power tables.
//!
//! A transform of length `n` consumes the first `n / 2` powers of a
//! root of unity of order `n`. Tables are cached per (modulus,
//! length, direction) so repeated transforms of one convolution share
//! them.

use std::collections::HashMap;
use std::sync::Arc;

use apmul_math::{MathError, ModMath};
use parking_lot::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TableKey {
    modulus_index: usize,
    length: usize,
    inverse: bool,
}

/// Cache of root-power tables.
#[derive(Default)]
pub struct TwiddleCache {
    tables: RwLock<HashMap<TableKey, Arc<Vec<u64>>>>,
}

impl TwiddleCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Powers `w^0 .. w^(length/2 - 1)` of a root of unity of order
    /// `length` (its inverse for inverse transforms).
    pub fn powers(
        &self,
        modulus_index: usize,
        length: usize,
        inverse: bool,
    ) -> Result<Arc<Vec<u64>>, MathError> {
        let key = TableKey {
            modulus_index,
            length,
            inverse,
        };
        if let Some(table) = self.tables.read().get(&key) {
            return Ok(Arc::clone(table));
        }

        let mm = ModMath::new(modulus_index);
        let mut w = mm.root_of_unity(length as u64)?;
        if inverse {
            w = mm.inverse(w)?;
        }
        let count = (length / 2).max(1);
        let mut table = Vec::with_capacity(count);
        let mut acc = 1u64;
        for _ in 0..count {
            table.push(acc);
            acc = mm.mul(acc, w);
        }

        let table = Arc::new(table);
        self.tables
            .write()
            .entry(key)
            .or_insert_with(|| Arc::clone(&table));
        Ok(table)
    }
}
