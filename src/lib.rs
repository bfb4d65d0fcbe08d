//! # parloop - heuristic loop parallelizer and tile-size autotuner
//!
//! Takes C++ text containing loops and, for each loop:
//! - classifies its variables as shared, private or reduction
//! - screens it for loop-carried dependences and I/O
//! - emits an OpenMP `parallel for` directive with a thread plan
//! - normalizes and tiles it, with a tile size picked by timing small
//!   benchmark programs
//!
//! A separate measurement harness compiles whole programs and profiles them
//! over directories of input fixtures.
//!
//! ## Architecture
//!
//! ```text
//! Source → Frontend → Analysis → CodeGen ─┐
//!                         └──→ Transform ─┴→ Report
//!                                  ↑
//!                             AutoTuning
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use parloop::prelude::*;
//!
//! let source = "for (int i = 0; i < n; i++) { c[i] = a[i] + b[i]; }";
//! let mut pipeline = Pipeline::new(PipelineConfig::default());
//! let report = pipeline.transform(&TransformRequest::new(source, 8));
//! println!("{}", report.render_text());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod autotuning;
pub mod codegen;
pub mod frontend;
pub mod harness;
pub mod pipeline;
pub mod transform;
pub mod utils;

// Re-export commonly used types
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::analysis::{
        analyze_dependencies, classify, dimensionality, has_io, score, ComplexityScore, DependencyVerdict,
        Dimensionality, VariableClassification,
    };
    pub use crate::autotuning::{AutoTuner, BenchmarkResult, CostModel, TileConfiguration, TuningConfig};
    pub use crate::codegen::{annotate, balance, choose_thread_plan, rewrite_break_return, ThreadPlan};
    pub use crate::frontend::{extract_loops, LoopBlock};
    pub use crate::harness::{Harness, HarnessConfig, MeasurementRecord};
    pub use crate::pipeline::{LoopOutcome, Pipeline, PipelineConfig, TransformRequest, TransformationReport};
    pub use crate::transform::{normalize, tile, LoopTransform};
    pub use crate::utils::errors::{HarnessError, ParloopError, ProcessError, TransformError, TuningError};
}

pub use utils::errors::{ParloopError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
