//! Process configuration.
//!
//! One explicit object carries every tunable the pipeline reads:
//! memory threshold, cache sizes, processor count, temp-file location
//! and strategy thresholds. It is read once at the start of an
//! operation and never consulted mid-flight, so changing a context
//! between operations is safe while sharing one across threads needs no
//! locking.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ApmulError;
use apmul_ntt::NttSettings;
use apmul_storage::StorageSettings;

/// Default schoolbook/Karatsuba crossover in words.
pub const DEFAULT_KARATSUBA_THRESHOLD: usize = 32;
/// Default Karatsuba/NTT crossover in words.
pub const DEFAULT_NTT_THRESHOLD: usize = 1024;

/// Configuration for one logical operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    /// Bytes a single operation may hold in memory; larger working sets
    /// spill to disk-backed stores and streaming transform variants.
    pub memory_threshold: usize,
    /// L1 data cache size in bytes.
    pub cache_l1: usize,
    /// L2 cache size in bytes.
    pub cache_l2: usize,
    /// Worker pool size; 0 means one per available CPU.
    pub processors: usize,
    /// Directory for disk-backed store files.
    pub temp_dir: PathBuf,
    /// Words per streamed I/O block.
    pub block_size: usize,
    /// Operand words below which schoolbook multiplication is used.
    pub karatsuba_threshold: usize,
    /// Operand words below which Karatsuba is used; NTT above.
    pub ntt_threshold: usize,
    /// Minimum words per scheduled parallel chunk.
    pub min_batch: usize,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            memory_threshold: detected_memory_threshold(),
            cache_l1: 32 << 10,
            cache_l2: 4 << 20,
            processors: 0,
            temp_dir: std::env::temp_dir(),
            block_size: 1 << 16,
            karatsuba_threshold: DEFAULT_KARATSUBA_THRESHOLD,
            ntt_threshold: DEFAULT_NTT_THRESHOLD,
            min_batch: 1 << 10,
        }
    }
}

impl Context {
    /// Apply defaults where values are zero.
    #[must_use]
    pub fn normalize(mut self) -> Self {
        if self.memory_threshold == 0 {
            self.memory_threshold = detected_memory_threshold();
        }
        if self.processors == 0 {
            self.processors = std::thread::available_parallelism().map_or(1, usize::from);
        }
        if self.karatsuba_threshold == 0 {
            self.karatsuba_threshold = DEFAULT_KARATSUBA_THRESHOLD;
        }
        if self.ntt_threshold == 0 {
            self.ntt_threshold = DEFAULT_NTT_THRESHOLD;
        }
        if self.block_size == 0 {
            self.block_size = 1 << 16;
        }
        if self.min_batch == 0 {
            self.min_batch = 1 << 10;
        }
        self
    }

    /// Load a context from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ApmulError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| ApmulError::Config(format!("cannot read {}: {err}", path.display())))?;
        let context: Self = serde_json::from_str(&raw)
            .map_err(|err| ApmulError::Config(format!("cannot parse {}: {err}", path.display())))?;
        Ok(context.normalize())
    }

    /// Save the context as JSON.
    pub fn save(&self, path: &Path) -> Result<(), ApmulError> {
        let raw = serde_json::to_string_pretty(self)
            .map_err(|err| ApmulError::Config(format!("cannot serialize context: {err}")))?;
        std::fs::write(path, raw)
            .map_err(|err| ApmulError::Config(format!("cannot write {}: {err}", path.display())))
    }

    /// Storage-facing settings.
    #[must_use]
    pub fn storage_settings(&self) -> StorageSettings {
        StorageSettings {
            memory_threshold: self.memory_threshold,
            temp_dir: self.temp_dir.clone(),
            block_size: self.block_size,
        }
    }

    /// Transform-facing settings.
    #[must_use]
    pub fn ntt_settings(&self) -> NttSettings {
        NttSettings {
            cache_l1: self.cache_l1,
            cache_l2: self.cache_l2,
            memory_threshold: self.memory_threshold,
            min_batch: self.min_batch,
        }
    }
}

/// A quarter of detected system memory, clamped to a sane range.
fn detected_memory_threshold() -> usize {
    let mut system = sysinfo::System::new();
    system.refresh_memory();
    let total = usize::try_from(system.total_memory()).unwrap_or(usize::MAX);
    (total / 4).clamp(64 << 20, 4 << 30)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_fills_zeroes() {
        let context = Context {
            memory_threshold: 0,
            processors: 0,
            karatsuba_threshold: 0,
            ntt_threshold: 0,
            block_size: 0,
            min_batch: 0,
            ..Context::default()
        }
        .normalize();
        assert!(context.memory_threshold > 0);
        assert!(context.processors > 0);
        assert_eq!(context.karatsuba_threshold, DEFAULT_KARATSUBA_THRESHOLD);
        assert_eq!(context.ntt_threshold, DEFAULT_NTT_THRESHOLD);
    }

    #[test]
    fn round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.json");
        let context = Context {
            memory_threshold: 123_456,
            processors: 3,
            ..Context::default()
        };
        context.save(&path).unwrap();
        let loaded = Context::load(&path).unwrap();
        assert_eq!(loaded.memory_threshold, 123_456);
        assert_eq!(loaded.processors, 3);
    }

    #[test]
    fn settings_views_copy_fields() {
        let context = Context::default().normalize();
        assert_eq!(
            context.storage_settings().memory_threshold,
            context.memory_threshold
        );
        assert_eq!(context.ntt_settings().cache_l2, context.cache_l2);
    }
}
