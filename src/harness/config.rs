//! Measurement harness configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Toolchain and output settings for [`super::Harness`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Compiler to use
    pub compiler: String,

    /// Compiler flags for every build
    pub compiler_flags: Vec<String>,

    /// Extra flag for programs using the OpenMP runtime
    pub openmp_flag: String,

    /// Time limit for compilation
    pub compile_timeout: Duration,

    /// Resource-usage reporter, e.g. `/usr/bin/time`
    pub timer_command: String,

    /// Arguments to the timer
    pub timer_args: Vec<String>,

    /// Instruction profiler, e.g. `valgrind`
    pub profiler_command: String,

    /// Arguments to the profiler
    pub profiler_args: Vec<String>,

    /// Time limit for one profiled run
    pub run_timeout: Duration,

    /// Directory receiving the result CSV files
    pub results_dir: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            compiler: "g++".to_string(),
            compiler_flags: vec!["-O2".to_string()],
            openmp_flag: "-fopenmp".to_string(),
            compile_timeout: Duration::from_secs(60),
            timer_command: "/usr/bin/time".to_string(),
            timer_args: vec!["-v".to_string()],
            profiler_command: "valgrind".to_string(),
            profiler_args: vec!["--tool=callgrind".to_string()],
            run_timeout: Duration::from_secs(300),
            results_dir: PathBuf::from("Results"),
        }
    }
}

impl HarnessConfig {
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

    /// Set the results directory
    pub fn results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = dir.into();
        self
    }

    /// Set the per-run time limit
    pub fn run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    /// Name of the CSV file for a serial or parallel measurement.
    pub fn results_file(&self, parallel: bool) -> PathBuf {
        let name = if parallel {
            "ResultsParallel.csv"
        } else {
            "ResultsSerial.csv"
        };
        self.results_dir.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_results_file() {
        let config = HarnessConfig::default().results_dir("/tmp/out");
        assert_eq!(config.results_file(true), PathBuf::from("/tmp/out/ResultsParallel.csv"));
        assert_eq!(config.results_file(false), PathBuf::from("/tmp/out/ResultsSerial.csv"));
    }

    #[test]
    fn test_builder() {
        let config = HarnessConfig::new().compiler("clang++").flags(["-O3", "-march=native"]);
        assert_eq!(config.compiler, "clang++");
        assert_eq!(config.compiler_flags.len(), 2);
        assert_eq!(config.openmp_flag, "-fopenmp");
    }
}
