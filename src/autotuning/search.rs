//! Search strategies for auto-tuning

use super::TuningResults;

/// Trait for search strategies
pub trait SearchStrategy: Send {
    /// Get the next tile size to try from the sorted `candidates`
    fn next(&mut self, candidates: &[usize], results: &TuningResults) -> Option<usize>;

    /// Reset the search
    fn reset(&mut self);

    /// Get name of the strategy
    fn name(&self) -> &str;
}

/// Exhaustive search - try every candidate in order
#[derive(Debug, Default)]
pub struct ExhaustiveSearch {
    /// Current index in the candidate list
    index: usize,
}

impl ExhaustiveSearch {
    /// Start at the first candidate.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SearchStrategy for ExhaustiveSearch {
    fn next(&mut self, candidates: &[usize], _results: &TuningResults) -> Option<usize> {
        let next = candidates.get(self.index).copied();
        self.index += 1;
        next
    }

    fn reset(&mut self) {
        self.index = 0;
    }

    fn name(&self) -> &str {
        "exhaustive"
    }
}

/// Bisection over the sorted candidates, assuming time is unimodal in tile
/// size. Compares neighbours at the midpoint and keeps the half holding the
/// faster one, so it measures about `2 log2(n)` candidates.
#[derive(Debug, Default)]
pub struct BisectionSearch {
    /// Current candidate index window, inclusive
    window: Option<(usize, usize)>,
}

impl BisectionSearch {
    /// Start over the full candidate range.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SearchStrategy for BisectionSearch {
    fn next(&mut self, candidates: &[usize], results: &TuningResults) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        let (mut lo, mut hi) = self.window.unwrap_or((0, candidates.len() - 1));

        let next = loop {
            if lo >= hi {
                let last = candidates[lo];
                break (!results.contains(last)).then_some(last);
            }
            let mid = (lo + hi) / 2;
            let (a, b) = (candidates[mid], candidates[mid + 1]);
            let Some(ta) = results.time(a) else {
                break Some(a);
            };
            let Some(tb) = results.time(b) else {
                break Some(b);
            };
            if ta <= tb {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        };

        self.window = Some((lo, hi));
        next
    }

    fn reset(&mut self) {
        self.window = None;
    }

    fn name(&self) -> &str {
        "bisection"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autotuning::BenchmarkResult;

    fn drive(strategy: &mut dyn SearchStrategy, candidates: &[usize], cost: impl Fn(usize) -> f64) -> TuningResults {
        let mut results = TuningResults::new();
        while let Some(tile) = strategy.next(candidates, &results) {
            if results.contains(tile) {
                continue;
            }
            results.add(tile, BenchmarkResult::from_times(vec![cost(tile)]));
        }
        results
    }

    #[test]
    fn test_exhaustive_search() {
        let mut search = ExhaustiveSearch::new();
        let results = drive(&mut search, &[8, 16, 32], |t| t as f64);
        assert_eq!(results.len(), 3);
        search.reset();
        assert_eq!(search.next(&[8], &results), Some(8));
        assert_eq!(search.name(), "exhaustive");
    }

    #[test]
    fn test_bisection_finds_valley() {
        let candidates: Vec<usize> = vec![8, 16, 32, 48, 64, 96, 128, 192, 256, 384, 512, 768, 1024];
        let mut search = BisectionSearch::new();
        let results = drive(&mut search, &candidates, |t| (t as f64 - 96.0).abs() + 1.0);
        assert_eq!(results.best().map(|r| r.tile_size), Some(96));
        assert!(results.len() < candidates.len());
    }

    #[test]
    fn test_bisection_edges() {
        let mut search = BisectionSearch::new();
        let results = drive(&mut search, &[8, 16, 32, 64], |t| t as f64);
        assert_eq!(results.best().map(|r| r.tile_size), Some(8));

        let mut search = BisectionSearch::new();
        let results = drive(&mut search, &[8, 16, 32, 64], |t| 1000.0 / t as f64);
        assert_eq!(results.best().map(|r| r.tile_size), Some(64));

        let mut search = BisectionSearch::new();
        assert_eq!(search.next(&[], &TuningResults::new()), None);
        let results = drive(&mut search, &[32], |_| 1.0);
        assert_eq!(results.len(), 1);
    }
}
