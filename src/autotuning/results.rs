//! Auto-tuning results tracking

use super::BenchmarkResult;

/// Results from auto-tuning
#[derive(Clone, Debug, Default)]
pub struct TuningResults {
    /// Results in measurement order
    results: Vec<CandidateResult>,
}

/// Result for a single tile size
#[derive(Clone, Debug)]
pub struct CandidateResult {
    /// The tile size
    pub tile_size: usize,
    /// Benchmark result
    pub result: BenchmarkResult,
}

impl TuningResults {
    /// Create empty results
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a result
    pub fn add(&mut self, tile_size: usize, result: BenchmarkResult) {
        self.results.push(CandidateResult { tile_size, result });
    }

    /// Check if a tile size has been tested
    pub fn contains(&self, tile_size: usize) -> bool {
        self.results.iter().any(|r| r.tile_size == tile_size)
    }

    /// Get result for a tile size
    pub fn get(&self, tile_size: usize) -> Option<&BenchmarkResult> {
        self.results
            .iter()
            .find(|r| r.tile_size == tile_size)
            .map(|r| &r.result)
    }

    /// Median time of a tested tile size; infinite if it failed.
    pub fn time(&self, tile_size: usize) -> Option<f64> {
        self.get(tile_size).map(|r| r.median_time)
    }

    /// Get the fastest successful candidate
    pub fn best(&self) -> Option<&CandidateResult> {
        self.results
            .iter()
            .filter(|r| r.result.executed)
            .min_by(|a, b| a.result.median_time.total_cmp(&b.result.median_time))
    }

    /// Get successful results sorted by performance
    pub fn sorted(&self) -> Vec<&CandidateResult> {
        let mut sorted: Vec<_> = self.results.iter().filter(|r| r.result.executed).collect();
        sorted.sort_by(|a, b| a.result.median_time.total_cmp(&b.result.median_time));
        sorted
    }

    /// Get number of tile sizes tested
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Get all results
    pub fn all(&self) -> &[CandidateResult] {
        &self.results
    }

    /// Export results to CSV format
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();
        csv.push_str("tile_size,median_us,min_us,max_us,std_dev\n");

        for r in &self.results {
            if r.result.executed {
                csv.push_str(&format!(
                    "{},{:.3},{:.3},{:.3},{:.3}\n",
                    r.tile_size,
                    r.result.median_time,
                    r.result.min_time,
                    r.result.max_time,
                    r.result.std_dev
                ));
            } else {
                csv.push_str(&format!("{},failed,,,\n", r.tile_size));
            }
        }

        csv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_results() {
        let mut results = TuningResults::new();
        results.add(32, BenchmarkResult::from_times(vec![1.0, 1.1, 1.2]));
        results.add(64, BenchmarkResult::from_times(vec![0.8, 0.9, 1.0]));
        results.add(128, BenchmarkResult::failed());

        assert_eq!(results.len(), 3);
        assert!(results.contains(32));
        assert!(!results.contains(16));
        assert_eq!(results.time(128), Some(f64::INFINITY));
        assert_eq!(results.time(16), None);

        let best = results.best().unwrap();
        assert_eq!(best.tile_size, 64);
        let order: Vec<usize> = results.sorted().iter().map(|r| r.tile_size).collect();
        assert_eq!(order, vec![64, 32]);
    }

    #[test]
    fn test_csv() {
        let mut results = TuningResults::new();
        results.add(16, BenchmarkResult::from_times(vec![2.0]));
        results.add(32, BenchmarkResult::failed());
        let csv = results.to_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "tile_size,median_us,min_us,max_us,std_dev");
        assert_eq!(lines[1], "16,2.000,2.000,2.000,0.000");
        assert_eq!(lines[2], "32,failed,,,");
    }

    #[test]
    fn test_all_failed_has_no_best() {
        let mut results = TuningResults::new();
        results.add(8, BenchmarkResult::failed());
        assert!(results.best().is_none());
        assert!(results.sorted().is_empty());
    }
}
