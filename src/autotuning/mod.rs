//! Empirical tile-size auto-tuning.
//!
//! Each candidate tile size is scored by a [`CostModel`]. The default model,
//! [`BenchmarkRunner`], writes a small timing program for the candidate,
//! compiles it and reads back the elapsed microseconds. A [`SearchStrategy`]
//! picks which candidates to measure.
//!
//! # Example
//!
//! ```ignore
//! use parloop::analysis::Dimensionality;
//! use parloop::autotuning::{AutoTuner, TuningConfig};
//!
//! let mut tuner = AutoTuner::new(TuningConfig::default());
//! let tiles = tuner.tune(Dimensionality::TwoD);
//! println!("tile size {} ({:?})", tiles.tile_size, tiles.method);
//! ```

mod config;
mod kernel;
mod results;
mod runner;
mod search;

pub use config::{KernelSizes, TuningConfig};
pub use kernel::TimingKernel;
pub use results::{CandidateResult, TuningResults};
pub use runner::{BenchmarkResult, BenchmarkRunner};
pub use search::{BisectionSearch, ExhaustiveSearch, SearchStrategy};

use crate::analysis::Dimensionality;
use crate::utils::errors::TuningError;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Result type for a single candidate measurement
pub type TuningResult<T> = Result<T, TuningError>;

/// Tile sizes tried in addition to the powers of two.
pub const CURATED_TILE_SIZES: [usize; 11] = [16, 32, 48, 64, 96, 128, 192, 256, 384, 512, 768];

/// Search type
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    /// Measure every candidate
    #[default]
    Exhaustive,
    /// Bisect over the sorted candidates
    Bisection,
}

/// Scores one tile-size candidate.
///
/// A failing candidate is reported as [`BenchmarkResult::failed`], never as an
/// error.
pub trait CostModel {
    /// Measure `tile_size` for loops of shape `dims`.
    fn measure(&mut self, dims: Dimensionality, tile_size: usize) -> BenchmarkResult;
}

impl<F> CostModel for F
where
    F: FnMut(Dimensionality, usize) -> BenchmarkResult,
{
    fn measure(&mut self, dims: Dimensionality, tile_size: usize) -> BenchmarkResult {
        self(dims, tile_size)
    }
}

impl CostModel for BenchmarkRunner {
    fn measure(&mut self, dims: Dimensionality, tile_size: usize) -> BenchmarkResult {
        match self.benchmark(dims, tile_size) {
            Ok(result) => result,
            Err(e) => {
                debug!("tile {} failed: {}", tile_size, e);
                BenchmarkResult::failed()
            }
        }
    }
}

/// Sorted candidate tile sizes within `[min, max]`: the powers of two plus
/// [`CURATED_TILE_SIZES`].
pub fn candidate_tile_sizes(min: usize, max: usize) -> Vec<usize> {
    let mut sizes: Vec<usize> = std::iter::successors(Some(1usize), |p| p.checked_mul(2))
        .take_while(|&p| p <= max)
        .chain(CURATED_TILE_SIZES)
        .filter(|&s| s >= min && s <= max)
        .collect();
    sizes.sort_unstable();
    sizes.dedup();
    sizes
}

/// Fixed tile size used when no candidate could be measured.
pub fn heuristic_tile_size(dims: Dimensionality) -> usize {
    match dims {
        Dimensionality::Scalar => 1,
        Dimensionality::OneD => 256,
        Dimensionality::TwoD => 64,
        Dimensionality::ThreeD | Dimensionality::ND(_) => 32,
    }
}

/// How a tile size was chosen
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TuningMethod {
    /// Fastest measured candidate
    Empirical,
    /// Every candidate failed; fixed fallback by dimensionality
    Heuristic,
    /// Scalar loops are not tiled
    NotApplicable,
}

/// One measured candidate
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateTiming {
    /// Tile size
    pub tile_size: usize,
    /// Median time in microseconds, `None` if the candidate failed
    pub time_us: Option<f64>,
}

/// Tile size selected for one loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileConfiguration {
    /// Loop access shape the search ran for
    pub dimensionality: Dimensionality,
    /// Selected tile size, 1 for scalar loops
    pub tile_size: usize,
    /// Time of the selected candidate in microseconds
    pub measured_time: Option<f64>,
    /// Candidates in measurement order
    pub candidates_tried: Vec<usize>,
    /// Per-candidate outcome
    pub measurements: Vec<CandidateTiming>,
    /// Selection method
    pub method: TuningMethod,
}

impl TileConfiguration {
    /// The configuration for a loop with no array accesses.
    pub fn not_applicable() -> Self {
        Self {
            dimensionality: Dimensionality::Scalar,
            tile_size: 1,
            measured_time: None,
            candidates_tried: vec![],
            measurements: vec![],
            method: TuningMethod::NotApplicable,
        }
    }
}

/// Drives a search strategy over the candidate tile sizes.
pub struct AutoTuner<C = BenchmarkRunner> {
    /// Tuning configuration
    config: TuningConfig,
    /// Search strategy
    strategy: Box<dyn SearchStrategy>,
    /// Candidate scorer
    cost: C,
    /// Results of the last search
    results: TuningResults,
}

impl AutoTuner<BenchmarkRunner> {
    /// Create a tuner that compiles and times real kernels
    pub fn new(config: TuningConfig) -> Self {
        let runner = BenchmarkRunner::new(config.clone());
        Self::with_cost_model(config, runner)
    }
}

impl<C: CostModel> AutoTuner<C> {
    /// Create a tuner with a custom cost model
    pub fn with_cost_model(config: TuningConfig, cost: C) -> Self {
        let strategy: Box<dyn SearchStrategy> = match config.search_strategy {
            SearchType::Exhaustive => Box::new(ExhaustiveSearch::new()),
            SearchType::Bisection => Box::new(BisectionSearch::new()),
        };
        Self {
            config,
            strategy,
            cost,
            results: TuningResults::new(),
        }
    }

    /// Replace the search strategy
    pub fn with_strategy(mut self, strategy: Box<dyn SearchStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &TuningConfig {
        &self.config
    }

    /// Tune over the configured tile range.
    pub fn tune(&mut self, dims: Dimensionality) -> TileConfiguration {
        let (min, max) = (self.config.min_tile, self.config.max_tile);
        self.optimal_tile_size(dims, min, max)
    }

    /// Pick the fastest tile size in `[min, max]` for loops of shape `dims`.
    pub fn optimal_tile_size(&mut self, dims: Dimensionality, min: usize, max: usize) -> TileConfiguration {
        self.results = TuningResults::new();
        if dims.is_scalar() {
            return TileConfiguration::not_applicable();
        }

        let candidates = candidate_tile_sizes(min, max);
        info!(
            "tuning {} loop over {} candidates ({} search)",
            dims,
            candidates.len(),
            self.strategy.name()
        );

        self.strategy.reset();
        while let Some(tile) = self.strategy.next(&candidates, &self.results) {
            if self.results.contains(tile) {
                break;
            }
            let result = self.cost.measure(dims, tile);
            if result.executed {
                debug!("tile {:>4}: {:.3} us", tile, result.median_time);
            } else {
                debug!("tile {:>4}: failed", tile);
            }
            self.results.add(tile, result);
        }

        let measurements: Vec<CandidateTiming> = self
            .results
            .all()
            .iter()
            .map(|r| CandidateTiming {
                tile_size: r.tile_size,
                time_us: r.result.executed.then_some(r.result.median_time),
            })
            .collect();
        let candidates_tried = measurements.iter().map(|m| m.tile_size).collect();

        let (tile_size, measured_time, method) = match self.results.best() {
            Some(best) => (best.tile_size, Some(best.result.median_time), TuningMethod::Empirical),
            None => {
                let fallback = heuristic_tile_size(dims);
                warn!(
                    "no tile-size candidate could be measured for {} loop, using {}",
                    dims, fallback
                );
                (fallback, None, TuningMethod::Heuristic)
            }
        };

        TileConfiguration {
            dimensionality: dims,
            tile_size,
            measured_time,
            candidates_tried,
            measurements,
            method,
        }
    }

    /// Results of the last search
    pub fn results(&self) -> &TuningResults {
        &self.results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valley(center: f64) -> impl FnMut(Dimensionality, usize) -> BenchmarkResult {
        move |_, tile| BenchmarkResult::from_times(vec![(tile as f64 - center).abs() + 10.0])
    }

    #[test]
    fn test_candidates() {
        assert_eq!(
            candidate_tile_sizes(8, 1024),
            vec![8, 16, 32, 48, 64, 96, 128, 192, 256, 384, 512, 768, 1024]
        );
        assert_eq!(candidate_tile_sizes(40, 100), vec![48, 64, 96]);
        assert!(candidate_tile_sizes(100, 10).is_empty());
    }

    #[test]
    fn test_scalar_is_not_measured() {
        let mut calls = 0;
        let cost = |_: Dimensionality, _: usize| {
            calls += 1;
            BenchmarkResult::from_times(vec![1.0])
        };
        let mut tuner = AutoTuner::with_cost_model(TuningConfig::default(), cost);
        let tiles = tuner.tune(Dimensionality::Scalar);
        assert_eq!(tiles.tile_size, 1);
        assert_eq!(tiles.method, TuningMethod::NotApplicable);
        assert!(tiles.measurements.is_empty());
        drop(tuner);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_picks_fastest() {
        let mut tuner = AutoTuner::with_cost_model(TuningConfig::default(), valley(100.0));
        let tiles = tuner.tune(Dimensionality::OneD);
        assert_eq!(tiles.tile_size, 96);
        assert_eq!(tiles.method, TuningMethod::Empirical);
        assert_eq!(tiles.measured_time, Some(14.0));
        assert_eq!(tiles.candidates_tried, candidate_tile_sizes(8, 1024));
    }

    #[test]
    fn test_failed_candidates_are_skipped() {
        let cost = |_: Dimensionality, tile: usize| {
            if tile < 512 {
                BenchmarkResult::failed()
            } else {
                BenchmarkResult::from_times(vec![tile as f64])
            }
        };
        let mut tuner = AutoTuner::with_cost_model(TuningConfig::default(), cost);
        let tiles = tuner.tune(Dimensionality::TwoD);
        assert_eq!(tiles.tile_size, 512);
        assert_eq!(tiles.measurements[0].time_us, None);
    }

    #[test]
    fn test_all_failed_falls_back() {
        let cost = |_: Dimensionality, _: usize| BenchmarkResult::failed();
        let mut tuner = AutoTuner::with_cost_model(TuningConfig::default(), cost);
        for (dims, expected) in [
            (Dimensionality::OneD, 256),
            (Dimensionality::TwoD, 64),
            (Dimensionality::ThreeD, 32),
            (Dimensionality::ND(4), 32),
        ] {
            let tiles = tuner.tune(dims);
            assert_eq!(tiles.tile_size, expected);
            assert_eq!(tiles.method, TuningMethod::Heuristic);
            assert_eq!(tiles.measured_time, None);
        }
    }

    #[test]
    fn test_bisection_measures_fewer() {
        let config = TuningConfig::default().search(SearchType::Bisection);
        let mut tuner = AutoTuner::with_cost_model(config, valley(200.0));
        let tiles = tuner.tune(Dimensionality::OneD);
        assert_eq!(tiles.tile_size, 192);
        assert!(tuner.results().len() < candidate_tile_sizes(8, 1024).len());
    }

    #[test]
    fn test_method_serializes_kebab_case() {
        let json = serde_json::to_string(&TuningMethod::NotApplicable).unwrap();
        assert_eq!(json, "\"not-applicable\"");
    }
}
