//! # apmul-math
//!
//! Word-level arithmetic for the apmul convolution engine: modular
//! arithmetic over the three fixed NTT primes, digit-radix ("base")
//! arithmetic with carry propagation, and the 3-word arithmetic used
//! to recombine modular convolution results via the Chinese Remainder
//! Theorem.

pub mod base;
pub mod modulus;
pub mod radix;
pub mod word3;

// Re-exports
pub use modulus::{ModMath, MAX_TRANSFORM_LENGTH, MODULUS, MODULUS_COUNT, PRIMITIVE_ROOT};
pub use radix::RadixInfo;
pub use word3::{CrtMath, Word3};

/// Error type for word-level arithmetic.
#[derive(Debug, thiserror::Error)]
pub enum MathError {
    /// Radix outside the supported 2..=36 range.
    #[error("unsupported radix: {0}")]
    UnsupportedRadix(u32),

    /// The value has no exact modular inverse.
    #[error("value has no exact inverse modulo {modulus}")]
    NotInvertible {
        /// Modulus under which inversion was attempted.
        modulus: u64,
    },

    /// Requested root-of-unity order is not available for the modulus set.
    #[error("no root of unity of order {order} modulo {modulus}")]
    InvalidOrder {
        /// Requested order.
        order: u64,
        /// Modulus for which the root was requested.
        modulus: u64,
    },
}
