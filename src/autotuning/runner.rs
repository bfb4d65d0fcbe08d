//! Benchmark runner for auto-tuning

use super::kernel::TimingKernel;
use super::{TuningConfig, TuningResult};
use crate::analysis::Dimensionality;
use crate::utils::errors::TuningError;
use crate::utils::process::{run_with_timeout, StdinSource};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::fs;
use std::process::Command;
use tempfile::TempDir;

/// Compiles and runs timing kernels for tile-size candidates
pub struct BenchmarkRunner {
    /// Configuration
    config: TuningConfig,
    /// Counter for unique file names
    counter: usize,
}

/// Result of a benchmark run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Individual run times in microseconds
    pub times: Vec<f64>,
    /// Median time
    pub median_time: f64,
    /// Minimum time
    pub min_time: f64,
    /// Maximum time
    pub max_time: f64,
    /// Standard deviation
    pub std_dev: f64,
    /// Whether compilation succeeded
    pub compiled: bool,
    /// Whether execution succeeded
    pub executed: bool,
}

impl BenchmarkResult {
    /// Create a new result from times
    pub fn from_times(times: Vec<f64>) -> Self {
        if times.is_empty() {
            return Self {
                compiled: true,
                ..Self::failed()
            };
        }

        let mut sorted = times.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let median_time = sorted[sorted.len() / 2];
        let min_time = sorted[0];
        let max_time = sorted[sorted.len() - 1];

        let mean = times.iter().sum::<f64>() / times.len() as f64;
        let variance = times.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / times.len() as f64;
        let std_dev = variance.sqrt();

        Self {
            times,
            median_time,
            min_time,
            max_time,
            std_dev,
            compiled: true,
            executed: true,
        }
    }

    /// Create a failed result
    pub fn failed() -> Self {
        Self {
            times: vec![],
            median_time: f64::INFINITY,
            min_time: f64::INFINITY,
            max_time: f64::INFINITY,
            std_dev: 0.0,
            compiled: false,
            executed: false,
        }
    }
}

/// Parse one elapsed time per non-empty stdout line.
pub(crate) fn parse_times(stdout: &str) -> TuningResult<Vec<f64>> {
    let times = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| {
            l.parse::<f64>()
                .map_err(|_| TuningError::BenchmarkFailed(format!("unparsable timing output `{}`", l)))
        })
        .collect::<TuningResult<Vec<f64>>>()?;
    if times.is_empty() {
        return Err(TuningError::BenchmarkFailed("no timing output".to_string()));
    }
    if let Some(bad) = times.iter().find(|t| !t.is_finite() || **t < 0.0) {
        return Err(TuningError::BenchmarkFailed(format!("invalid time {}", bad)));
    }
    Ok(times)
}

impl BenchmarkRunner {
    /// Create a new runner
    pub fn new(config: TuningConfig) -> Self {
        Self { config, counter: 0 }
    }

    /// Get the configuration
    pub fn config(&self) -> &TuningConfig {
        &self.config
    }

    /// Benchmark one tile size.
    ///
    /// The kernel source and binary live in a scratch directory that is
    /// removed when this returns.
    pub fn benchmark(&mut self, dims: Dimensionality, tile_size: usize) -> TuningResult<BenchmarkResult> {
        self.counter += 1;
        let scratch = self.scratch_dir()?;
        let base_name = format!("tune_{}_{}", tile_size, self.counter);
        let source = scratch.path().join(format!("{}.cpp", base_name));
        let exe = scratch.path().join(&base_name);

        // Step 1: Generate the timing kernel
        let kernel = TimingKernel::new(dims, tile_size, &self.config);
        fs::write(&source, kernel.render())?;

        // Step 2: Compile
        let mut compile = Command::new(&self.config.compiler);
        compile
            .args(&self.config.compiler_flags)
            .arg(&source)
            .arg("-o")
            .arg(&exe);
        let output = run_with_timeout(&mut compile, StdinSource::Null, self.config.timeout)?;
        if !output.success() {
            return Err(TuningError::CompilationFailed(output.stderr));
        }

        // Step 3: Run
        let output = run_with_timeout(&mut Command::new(&exe), StdinSource::Null, self.config.timeout)?;
        if !output.success() {
            return Err(TuningError::BenchmarkFailed(format!(
                "exited with {}",
                output.status
            )));
        }
        let times = parse_times(&output.stdout)?;
        trace!("tile {} -> {:?} us", tile_size, times);

        Ok(BenchmarkResult::from_times(times))
    }

    fn scratch_dir(&self) -> TuningResult<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("parloop_tune_");
        let dir = match &self.config.work_dir {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        debug!("scratch directory {}", dir.path().display());
        Ok(dir)
    }
}
