//! The strategy factory: per-radix builder bundles for every pipeline
//! component, cached and globally overridable.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use apmul_exec::ParallelRunner;
use apmul_math::RadixInfo;
use apmul_ntt::{Matrix, Ntt};
use apmul_storage::StoreBuilder;

use crate::{
    AdaptiveConvolution, ApmulError, CarryCrt, Context, ConvolutionStrategy,
    KaratsubaConvolution, NttConvolution, SchoolbookConvolution,
};

/// The assembled component set for one radix. Every builder is a pure
/// factory over (radix, size); none holds mutable cross-call state.
pub struct Builders {
    /// Digit constants for the radix.
    pub radix: RadixInfo,
    /// The size-adaptive convolution entry point.
    pub convolution: Arc<dyn ConvolutionStrategy>,
    /// Schoolbook strategy (forced-selection access).
    pub schoolbook: Arc<SchoolbookConvolution>,
    /// Karatsuba strategy (forced-selection access).
    pub karatsuba: Arc<KaratsubaConvolution>,
    /// 3-modulus NTT strategy (forced-selection access).
    pub ntt_convolution: Arc<NttConvolution>,
    /// The transform engine.
    pub ntt: Arc<Ntt>,
    /// The matrix engine.
    pub matrix: Matrix,
    /// The carry-CRT engine.
    pub carry_crt: Arc<CarryCrt>,
    /// Store factory (memory/disk by size).
    pub storage: StoreBuilder,
    /// The shared worker pool.
    pub execution: Arc<ParallelRunner>,
}

/// Registry of per-radix builder bundles.
///
/// Bundles are built on first use and cached; [`BuilderRegistry::install`]
/// substitutes an alternate bundle (for example an accelerator-backed
/// transform stack) without touching any call site.
pub struct BuilderRegistry {
    context: Context,
    runner: Arc<ParallelRunner>,
    cache: RwLock<HashMap<u32, Arc<Builders>>>,
}

impl BuilderRegistry {
    /// A registry over the given configuration.
    pub fn new(context: Context) -> Result<Self, ApmulError> {
        let context = context.normalize();
        let runner = Arc::new(
            ParallelRunner::new(context.processors)
                .map_err(|err| ApmulError::Config(err.to_string()))?,
        );
        Ok(Self {
            context,
            runner,
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// The configuration the registry builds against.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// The builder bundle for a radix, building and caching on first
    /// use.
    pub fn for_radix(&self, radix: u32) -> Result<Arc<Builders>, ApmulError> {
        if let Some(builders) = self.cache.read().get(&radix) {
            return Ok(Arc::clone(builders));
        }
        let builders = Arc::new(self.build(radix)?);
        self.cache
            .write()
            .entry(radix)
            .or_insert_with(|| Arc::clone(&builders));
        Ok(builders)
    }

    /// Substitute the bundle used for a radix.
    pub fn install(&self, radix: u32, builders: Arc<Builders>) {
        self.cache.write().insert(radix, builders);
    }

    fn build(&self, radix: u32) -> Result<Builders, ApmulError> {
        let info = RadixInfo::for_radix(radix)?;
        let storage = StoreBuilder::new(self.context.storage_settings());
        let ntt = Arc::new(Ntt::new(
            self.context.ntt_settings(),
            Arc::clone(&self.runner),
        ));
        let matrix = Matrix::new(self.context.cache_l1);
        let carry_crt = Arc::new(CarryCrt::new(
            info.base,
            self.context.block_size,
            storage.clone(),
            Arc::clone(&self.runner),
        ));

        let schoolbook = Arc::new(SchoolbookConvolution::new(info.base, storage.clone()));
        let karatsuba = Arc::new(KaratsubaConvolution::new(
            info.base,
            self.context.karatsuba_threshold,
            storage.clone(),
        ));
        let ntt_convolution = Arc::new(NttConvolution::new(
            Arc::clone(&ntt),
            Arc::clone(&carry_crt),
            storage.clone(),
            Arc::clone(&self.runner),
            self.context.min_batch,
        ));
        let convolution = Arc::new(AdaptiveConvolution::new(
            self.context.karatsuba_threshold,
            self.context.ntt_threshold,
            Arc::clone(&schoolbook),
            Arc::clone(&karatsuba),
            Arc::clone(&ntt_convolution),
        ));

        Ok(Builders {
            radix: info,
            convolution,
            schoolbook,
            karatsuba,
            ntt_convolution,
            ntt,
            matrix,
            carry_crt,
            storage,
            execution: Arc::clone(&self.runner),
        })
    }
}
