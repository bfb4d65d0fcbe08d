//! Error types for the parallelizer.
//!
//! Errors are organized by the subsystem that produces them. Most analysis
//! outcomes (unsafe dependencies, unsupported loop shapes) are reported as
//! data and never surface here.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum ParloopError {
    /// Error while rewriting a loop
    #[error("Transformation error: {0}")]
    Transform(#[from] TransformError),

    /// Error while tuning tile sizes
    #[error("Tuning error: {0}")]
    Tuning(#[from] TuningError),

    /// Error while measuring a program
    #[error("Measurement error: {0}")]
    Harness(#[from] HarnessError),

    /// Error while running an external tool
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error while rewriting loop text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// The loop header could not be split into init/condition/increment
    #[error("Malformed loop header `{header}`: {reason}")]
    Format {
        /// Header text as found in the source
        header: String,
        /// What was wrong with it
        reason: String,
    },

    /// No loop was found in the given text
    #[error("No loop found in text")]
    NoLoop,
}

impl TransformError {
    /// Build a [`TransformError::Format`].
    pub fn format(header: impl Into<String>, reason: impl Into<String>) -> Self {
        TransformError::Format {
            header: header.into(),
            reason: reason.into(),
        }
    }
}

/// Error while benchmarking a tile-size candidate.
///
/// The autotuner never propagates these; a failing candidate is recorded as
/// an infinite time and the sweep continues.
#[derive(Error, Debug)]
pub enum TuningError {
    /// Candidate program failed to compile
    #[error("Compilation failed: {0}")]
    CompilationFailed(String),

    /// Candidate program failed to run or printed garbage
    #[error("Benchmark failed: {0}")]
    BenchmarkFailed(String),

    /// Candidate exceeded its time limit
    #[error("Timeout exceeded after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<ProcessError> for TuningError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::TimedOut { limit, .. } => TuningError::Timeout(limit),
            ProcessError::Spawn { source, .. } | ProcessError::Io(source) => TuningError::IoError(source),
        }
    }
}

/// Error raised by the measurement harness.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// The program under measurement does not compile
    #[error("Compilation of {source_file} failed:\n{stderr}")]
    Compilation {
        /// Source file handed to the compiler
        source_file: PathBuf,
        /// Compiler diagnostics
        stderr: String,
    },

    /// A single profiled run failed
    #[error("Run on {input} failed: {reason}")]
    RunFailed {
        /// Fixture file fed on stdin
        input: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// Invalid harness arguments
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// External tool could not be run
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error while running an external process.
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The program could not be started
    #[error("Failed to spawn `{program}`: {source}")]
    Spawn {
        /// Program name
        program: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// The program was killed after exceeding its time limit
    #[error("`{program}` timed out after {limit:?}")]
    TimedOut {
        /// Program name
        program: String,
        /// Limit that was exceeded
        limit: Duration,
    },

    /// I/O error while talking to the child
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type using ParloopError.
pub type Result<T> = std::result::Result<T, ParloopError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_display() {
        let err = TransformError::format("for (;;)", "missing control variable");
        assert_eq!(
            err.to_string(),
            "Malformed loop header `for (;;)`: missing control variable"
        );
    }

    #[test]
    fn test_error_conversion() {
        let err: ParloopError = TransformError::NoLoop.into();
        assert!(matches!(err, ParloopError::Transform(TransformError::NoLoop)));
    }

    #[test]
    fn test_timeout_maps_to_tuning_timeout() {
        let err = ProcessError::TimedOut {
            program: "g++".to_string(),
            limit: Duration::from_secs(10),
        };
        let tuning: TuningError = err.into();
        assert!(matches!(tuning, TuningError::Timeout(d) if d == Duration::from_secs(10)));
    }
}
