//! Convolution strategy interface and size-based selection.

use std::sync::Arc;

use apmul_exec::CancellationToken;
use apmul_storage::DataStore;

use crate::{ApmulError, KaratsubaConvolution, NttConvolution, SchoolbookConvolution};

/// Narrow interface for convolution strategies.
pub trait ConvolutionStrategy: Send + Sync {
    /// Convolve two digit sequences into a store of `result_size`
    /// words. `result_size` must equal `x.len() + y.len()`; the leading
    /// word may be zero and is not trimmed.
    fn convolute(
        &self,
        x: &DataStore,
        y: &DataStore,
        result_size: usize,
        token: &CancellationToken,
    ) -> Result<DataStore, ApmulError>;

    /// The name of this strategy.
    fn name(&self) -> &'static str;
}

pub(crate) fn check_result_size(
    x: &DataStore,
    y: &DataStore,
    result_size: usize,
) -> Result<(), ApmulError> {
    if result_size != x.len() + y.len() {
        return Err(ApmulError::Config(format!(
            "result size {result_size} does not match operand sizes {} + {}",
            x.len(),
            y.len()
        )));
    }
    Ok(())
}

/// Adaptive strategy: schoolbook below the Karatsuba threshold,
/// Karatsuba below the NTT threshold, 3-modulus NTT above.
pub struct AdaptiveConvolution {
    karatsuba_threshold: usize,
    ntt_threshold: usize,
    schoolbook: Arc<SchoolbookConvolution>,
    karatsuba: Arc<KaratsubaConvolution>,
    ntt: Arc<NttConvolution>,
}

impl AdaptiveConvolution {
    /// An adaptive dispatcher over the three concrete strategies.
    #[must_use]
    pub fn new(
        karatsuba_threshold: usize,
        ntt_threshold: usize,
        schoolbook: Arc<SchoolbookConvolution>,
        karatsuba: Arc<KaratsubaConvolution>,
        ntt: Arc<NttConvolution>,
    ) -> Self {
        Self {
            karatsuba_threshold,
            ntt_threshold,
            schoolbook,
            karatsuba,
            ntt,
        }
    }

    fn select(&self, x: &DataStore, y: &DataStore) -> &dyn ConvolutionStrategy {
        let short = x.len().min(y.len());
        let long = x.len().max(y.len());
        if short <= self.karatsuba_threshold {
            self.schoolbook.as_ref()
        } else if long <= self.ntt_threshold {
            self.karatsuba.as_ref()
        } else {
            self.ntt.as_ref()
        }
    }
}

impl ConvolutionStrategy for AdaptiveConvolution {
    fn convolute(
        &self,
        x: &DataStore,
        y: &DataStore,
        result_size: usize,
        token: &CancellationToken,
    ) -> Result<DataStore, ApmulError> {
        let strategy = self.select(x, y);
        tracing::debug!(
            x_len = x.len(),
            y_len = y.len(),
            strategy = strategy.name(),
            "convolution strategy selected"
        );
        strategy.convolute(x, y, result_size, token)
    }

    fn name(&self) -> &'static str {
        "Adaptive"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BuilderRegistry, Context};

    fn registry() -> BuilderRegistry {
        BuilderRegistry::new(Context {
            karatsuba_threshold: 4,
            ntt_threshold: 16,
            ..Context::default()
        })
        .unwrap()
    }

    #[test]
    fn selection_follows_thresholds() {
        let builders = registry().for_radix(10).unwrap();
        let adaptive = AdaptiveConvolution::new(
            4,
            16,
            Arc::clone(&builders.schoolbook),
            Arc::clone(&builders.karatsuba),
            Arc::clone(&builders.ntt_convolution),
        );
        let small = DataStore::memory(4);
        let medium = DataStore::memory(10);
        let large = DataStore::memory(100);
        assert_eq!(adaptive.select(&small, &medium).name(), "Schoolbook");
        assert_eq!(adaptive.select(&medium, &medium).name(), "Karatsuba");
        assert_eq!(adaptive.select(&medium, &large).name(), "NTT");
    }

    #[test]
    fn result_size_must_match() {
        let builders = registry().for_radix(10).unwrap();
        let token = CancellationToken::new();
        let x = DataStore::from_words(&[1, 2]);
        let y = DataStore::from_words(&[3]);
        assert!(matches!(
            builders.convolution.convolute(&x, &y, 5, &token),
            Err(ApmulError::Config(_))
        ));
    }
}
