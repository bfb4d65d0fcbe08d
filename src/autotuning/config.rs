//! Auto-tuning configuration

use super::SearchType;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Array extents used by the synthetic timing kernels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelSizes {
    /// Length of the 1D arrays
    pub one_d: usize,
    /// Side of the square 2D arrays
    pub two_d: usize,
    /// Side of the cubic 3D arrays
    pub three_d: usize,
}

impl Default for KernelSizes {
    fn default() -> Self {
        Self {
            one_d: 500,
            two_d: 300,
            three_d: 64,
        }
    }
}

/// Configuration for the auto-tuner
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TuningConfig {
    /// Compiler to use
    pub compiler: String,

    /// Compiler flags
    pub compiler_flags: Vec<String>,

    /// Limit for each compile and each run
    pub timeout: Duration,

    /// Smallest tile size to consider
    pub min_tile: usize,

    /// Largest tile size to consider
    pub max_tile: usize,

    /// Timing kernel array extents
    pub sizes: KernelSizes,

    /// Untimed passes before measuring
    pub warmup_passes: usize,

    /// Timed passes, one sample each
    pub timed_passes: usize,

    /// Search strategy
    pub search_strategy: SearchType,

    /// Parent directory for per-candidate scratch directories
    pub work_dir: Option<PathBuf>,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            compiler: "g++".to_string(),
            compiler_flags: vec!["-O3".to_string(), "-std=c++17".to_string()],
            timeout: Duration::from_secs(10),
            min_tile: 8,
            max_tile: 1024,
            sizes: KernelSizes::default(),
            warmup_passes: 1,
            timed_passes: 1,
            search_strategy: SearchType::Exhaustive,
            work_dir: None,
        }
    }
}

impl TuningConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set compiler
    pub fn compiler(mut self, compiler: &str) -> Self {
        self.compiler = compiler.to_string();
        self
    }

    /// Replace the compiler flags
    pub fn flags<S: Into<String>>(mut self, flags: impl IntoIterator<Item = S>) -> Self {
        self.compiler_flags = flags.into_iter().map(Into::into).collect();
        self
    }

    /// Set per-step timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the tile size range
    pub fn tile_range(mut self, min: usize, max: usize) -> Self {
        self.min_tile = min;
        self.max_tile = max;
        self
    }

    /// Set search strategy
    pub fn search(mut self, strategy: SearchType) -> Self {
        self.search_strategy = strategy;
        self
    }

    /// Set number of timed passes
    pub fn timed_passes(mut self, passes: usize) -> Self {
        self.timed_passes = passes.max(1);
        self
    }

    /// Set scratch directory parent
    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    /// Quick tuning preset (fast but less thorough)
    pub fn quick() -> Self {
        Self {
            min_tile: 16,
            max_tile: 256,
            timeout: Duration::from_secs(5),
            search_strategy: SearchType::Bisection,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TuningConfig::default();
        assert_eq!(config.compiler, "g++");
        assert_eq!(config.compiler_flags, vec!["-O3", "-std=c++17"]);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!((config.min_tile, config.max_tile), (8, 1024));
        assert_eq!(config.search_strategy, SearchType::Exhaustive);
    }

    #[test]
    fn test_builder() {
        let config = TuningConfig::new()
            .compiler("clang++")
            .flags(["-O2"])
            .tile_range(16, 64)
            .timed_passes(0)
            .search(SearchType::Bisection);
        assert_eq!(config.compiler, "clang++");
        assert_eq!(config.compiler_flags, vec!["-O2"]);
        assert_eq!(config.max_tile, 64);
        assert_eq!(config.timed_passes, 1);
        assert_eq!(TuningConfig::quick().search_strategy, SearchType::Bisection);
    }
}
