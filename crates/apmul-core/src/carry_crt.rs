//! Carry-CRT engine: recombines the three modular convolution results
//! into radix digits, block by block.
//!
//! The CRT step is pure per-element recombination and runs blocks in
//! parallel, each block assuming a zero incoming carry and reporting
//! its overflow. The carry step is the one serial dependency chain in
//! the pipeline: overflows thread from the least significant block
//! upward, rippling inside a block and joining the block's own overflow
//! when they spill past its end.

use std::sync::Arc;

use apmul_exec::{CancellationToken, ParallelRunner};
use apmul_math::{CrtMath, Word3};
use apmul_storage::{AccessMode, DataStore, StoreBuilder};

use crate::ApmulError;

/// Block-wise CRT recombination and carry propagation.
pub struct CarryCrt {
    crt: CrtMath,
    base: u64,
    block: usize,
    storage: StoreBuilder,
    runner: Arc<ParallelRunner>,
}

impl CarryCrt {
    /// An engine emitting digits in the given base, processing
    /// `block`-word blocks.
    #[must_use]
    pub fn new(base: u64, block: usize, storage: StoreBuilder, runner: Arc<ParallelRunner>) -> Self {
        Self {
            crt: CrtMath::new(),
            base,
            block: block.max(1),
            storage,
            runner,
        }
    }

    /// Recombine three modular results into `result_size` digits.
    pub fn carry_crt(
        &self,
        mod0: &DataStore,
        mod1: &DataStore,
        mod2: &DataStore,
        result_size: usize,
        token: &CancellationToken,
    ) -> Result<DataStore, ApmulError> {
        let result = self.storage.create(result_size)?;
        let blocks = result_size.div_ceil(self.block);
        let overflows: Vec<parking_lot::Mutex<u128>> =
            (0..blocks).map(|_| parking_lot::Mutex::new(0)).collect();

        // CRT step: order-independent across blocks.
        self.runner
            .run(blocks, 1, token, |range| {
                for b in range {
                    let start = b * self.block;
                    let end = (start + self.block).min(result_size);
                    let overflow = self.crt(mod0, mod1, mod2, &result, start, end)?;
                    *overflows[b].lock() = overflow;
                }
                Ok::<(), ApmulError>(())
            })
            .map_err(ApmulError::from)?;

        // Carry step: strictly serial in block order.
        let mut carry = 0u128;
        for b in 0..blocks {
            if token.is_cancelled() {
                return Err(ApmulError::Cancelled);
            }
            let start = b * self.block;
            let end = (start + self.block).min(result_size);
            let leftover = self.carry(&result, start, end, carry)?;
            carry = *overflows[b].lock() + leftover;
        }
        if carry != 0 {
            return Err(ApmulError::Internal("carry past the final result block"));
        }
        Ok(result)
    }

    /// CRT step for one block: recombine each element, emit its digit,
    /// and return the block's two-word overflow (computed with a zero
    /// incoming carry).
    pub fn crt(
        &self,
        mod0: &DataStore,
        mod1: &DataStore,
        mod2: &DataStore,
        result: &DataStore,
        start: usize,
        end: usize,
    ) -> Result<u128, ApmulError> {
        let len = end - start;
        let r0 = mod0.array(AccessMode::Read, start, len)?;
        let r1 = mod1.array(AccessMode::Read, start, len)?;
        let r2 = mod2.array(AccessMode::Read, start, len)?;
        let mut out = result.array(AccessMode::Write, start, len)?;

        let mut carry = 0u128;
        for i in 0..len {
            let value = self
                .crt
                .combine(r0.words()[i], r1.words()[i], r2.words()[i])
                .add(Word3::from_u128(carry));
            let (quotient, digit) = value.div_rem(self.base);
            out.words_mut()[i] = digit;
            carry = quotient
                .to_u128()
                .ok_or(ApmulError::Internal("carry exceeds two words"))?;
        }

        out.close()?;
        r0.close()?;
        r1.close()?;
        r2.close()?;
        Ok(carry)
    }

    /// Carry step for one block: apply the previous block's carry,
    /// rippling through the block's digits, and return whatever spills
    /// past its end.
    pub fn carry(
        &self,
        result: &DataStore,
        start: usize,
        end: usize,
        carry_in: u128,
    ) -> Result<u128, ApmulError> {
        if carry_in == 0 {
            return Ok(0);
        }
        let mut access = result.array(AccessMode::ReadWrite, start, end - start)?;
        let mut carry = carry_in;
        for digit in access.words_mut() {
            if carry == 0 {
                break;
            }
            let value = u128::from(*digit) + carry;
            *digit = (value % u128::from(self.base)) as u64;
            carry = value / u128::from(self.base);
        }
        access.close()?;
        Ok(carry)
    }
}
