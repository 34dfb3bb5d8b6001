//! # apmul-core
//!
//! The convolution engine: strategy selection between schoolbook,
//! Karatsuba and 3-modulus NTT convolution, the carry-CRT recombination
//! of modular results, the per-radix strategy factory, and the process
//! configuration read at the start of each operation.

pub mod builder;
pub mod carry_crt;
pub mod context;
pub mod convolution;
pub mod karatsuba;
pub mod ntt_convolution;
pub mod schoolbook;

// Re-exports
pub use builder::{BuilderRegistry, Builders};
pub use carry_crt::CarryCrt;
pub use context::Context;
pub use convolution::{AdaptiveConvolution, ConvolutionStrategy};
pub use karatsuba::KaratsubaConvolution;
pub use ntt_convolution::NttConvolution;
pub use schoolbook::SchoolbookConvolution;

use apmul_exec::CancellationToken;
use apmul_math::RadixInfo;
use apmul_ntt::NttError;
use apmul_storage::DataStore;

/// Error type for convolution operations.
#[derive(Debug, thiserror::Error)]
pub enum ApmulError {
    /// Invalid configuration or operand; reported immediately, never
    /// retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// Underlying arithmetic failure.
    #[error(transparent)]
    Math(#[from] apmul_math::MathError),

    /// Underlying storage failure.
    #[error(transparent)]
    Storage(#[from] apmul_storage::StorageError),

    /// Underlying transform failure.
    #[error(transparent)]
    Ntt(NttError),

    /// The operation was cancelled; partial results are discarded.
    #[error("operation cancelled")]
    Cancelled,

    /// An internal invariant was violated.
    #[error("internal invariant violated: {0}")]
    Internal(&'static str),
}

impl From<NttError> for ApmulError {
    fn from(err: NttError) -> Self {
        match err {
            NttError::Cancelled => ApmulError::Cancelled,
            other => ApmulError::Ntt(other),
        }
    }
}

impl From<apmul_exec::runner::RunError<ApmulError>> for ApmulError {
    fn from(err: apmul_exec::runner::RunError<ApmulError>) -> Self {
        match err {
            apmul_exec::runner::RunError::Cancelled => ApmulError::Cancelled,
            apmul_exec::runner::RunError::Task(inner) => inner,
        }
    }
}

/// The multiplication engine façade: operands enter as digit sequences
/// (or segment stores) at a given radix and the product comes back the
/// same way, with the pipeline assembled by the strategy factory.
pub struct ApmulEngine {
    registry: BuilderRegistry,
}

impl ApmulEngine {
    /// An engine over the given configuration.
    pub fn new(context: Context) -> Result<Self, ApmulError> {
        Ok(Self {
            registry: BuilderRegistry::new(context)?,
        })
    }

    /// The engine's strategy registry.
    #[must_use]
    pub fn registry(&self) -> &BuilderRegistry {
        &self.registry
    }

    /// Multiply two digit sequences (least significant word first, every
    /// word below the radix base). The product has
    /// `x.len() + y.len()` words; a zero leading word is not trimmed.
    pub fn multiply(&self, x: &[u64], y: &[u64], radix: u32) -> Result<Vec<u64>, ApmulError> {
        let token = CancellationToken::new();
        let builders = self.registry.for_radix(radix)?;
        validate_digits(x, builders.radix)?;
        validate_digits(y, builders.radix)?;
        let sx = DataStore::from_words(x);
        let sy = DataStore::from_words(y);
        let product = self.multiply_stores(&sx, &sy, radix, &token)?;
        Ok(product.to_vec()?)
    }

    /// Square a digit sequence, reusing one forward transform per
    /// modulus on the NTT path.
    pub fn square(&self, x: &[u64], radix: u32) -> Result<Vec<u64>, ApmulError> {
        let token = CancellationToken::new();
        let builders = self.registry.for_radix(radix)?;
        validate_digits(x, builders.radix)?;
        let sx = DataStore::from_words(x);
        let product = self.multiply_stores(&sx, &sx, radix, &token)?;
        Ok(product.to_vec()?)
    }

    /// Multiply two operand stores, honoring `token` at every
    /// suspension point.
    pub fn multiply_stores(
        &self,
        x: &DataStore,
        y: &DataStore,
        radix: u32,
        token: &CancellationToken,
    ) -> Result<DataStore, ApmulError> {
        if x.is_empty() || y.is_empty() {
            return Err(ApmulError::Config("operands must be non-empty".into()));
        }
        let builders = self.registry.for_radix(radix)?;
        let result_size = x.len() + y.len();
        builders
            .convolution
            .convolute(x, y, result_size, token)
    }
}

fn validate_digits(digits: &[u64], radix: RadixInfo) -> Result<(), ApmulError> {
    if let Some(word) = digits.iter().find(|&&w| w >= radix.base) {
        return Err(ApmulError::Config(format!(
            "digit word {word} is not below the radix-{} base {}",
            radix.radix, radix.base
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiply_small_decimal() {
        let engine = ApmulEngine::new(Context::default().normalize()).unwrap();
        // 12345 * 67890 = 838102050, single words in base 10^17
        let product = engine.multiply(&[12345], &[67890], 10).unwrap();
        assert_eq!(product, vec![838_102_050, 0]);
    }

    #[test]
    fn multiply_rejects_oversized_digits() {
        let engine = ApmulEngine::new(Context::default().normalize()).unwrap();
        let base = apmul_math::RadixInfo::for_radix(10).unwrap().base;
        assert!(matches!(
            engine.multiply(&[base], &[1], 10),
            Err(ApmulError::Config(_))
        ));
    }

    #[test]
    fn multiply_rejects_empty_operands() {
        let engine = ApmulEngine::new(Context::default().normalize()).unwrap();
        assert!(matches!(
            engine.multiply(&[], &[1], 10),
            Err(ApmulError::Config(_))
        ));
    }

    #[test]
    fn square_matches_multiply() {
        let engine = ApmulEngine::new(Context::default().normalize()).unwrap();
        let x: Vec<u64> = vec![987_654_321, 123_456_789, 555];
        assert_eq!(
            engine.square(&x, 10).unwrap(),
            engine.multiply(&x, &x, 10).unwrap()
        );
    }

    #[test]
    fn unsupported_radix_is_config_error() {
        let engine = ApmulEngine::new(Context::default().normalize()).unwrap();
        assert!(engine.multiply(&[1], &[1], 49).is_err());
    }
}
