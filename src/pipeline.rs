//! Per-loop transformation pipeline.
//!
//! ```text
//! source ──format──▶ extract ──▶ for each loop:
//!     normalize ▶ score ▶ plan threads ▶ classify
//!       ├─ I/O        ──▶ not parallel
//!       └─ dependence ──▶ unsafe: not parallel
//!                         safe:   annotate (or rewrite early exits) ▶ balance
//!     non-scalar access ▶ tune tile size ▶ tile normalized loop ▶ format
//! ```
//!
//! Every loop ends up in the report, whatever happened to it.

use crate::analysis::{classify, dimensionality, has_io, score, screen};
use crate::analysis::{ComplexityScore, DependencyVerdict, Dimensionality, VariableClassification};
use crate::autotuning::{AutoTuner, BenchmarkRunner, CostModel, TileConfiguration, TuningConfig};
use crate::codegen::{
    annotate, balance, choose_thread_plan, rewrite_break_return, Annotation, NonParallelReason, ThreadPlan,
};
use crate::frontend::{extract_loops, LoopBlock};
use crate::transform::{normalize, tile};
use crate::utils::format::{Formatter, FormatterConfig};
use crate::utils::pretty::indent;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Default audit file name.
pub const DEFAULT_AUDIT_FILE: &str = "P_code.json";

/// Input to [`Pipeline::transform`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformRequest {
    /// Source text containing loops
    pub source: String,
    /// Processor description; recorded, not used
    pub core_type_hint: Option<String>,
    /// Memory size description; recorded, not used
    pub ram_size_hint: Option<String>,
    /// Processors available to the parallel program
    pub processor_count: usize,
}

impl TransformRequest {
    /// Request for `source` on `processor_count` processors.
    pub fn new(source: impl Into<String>, processor_count: usize) -> Self {
        Self {
            source: source.into(),
            core_type_hint: None,
            ram_size_hint: None,
            processor_count,
        }
    }

    /// Attach hardware hints.
    pub fn hints(mut self, core_type: Option<String>, ram_size: Option<String>) -> Self {
        self.core_type_hint = core_type;
        self.ram_size_hint = ram_size;
        self
    }
}

/// Pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Tile-size tuning
    pub tuning: TuningConfig,
    /// External formatter
    pub formatter: FormatterConfig,
    /// Where the JSON report is written, if anywhere
    pub audit_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tuning: TuningConfig::default(),
            formatter: FormatterConfig::default(),
            audit_path: Some(PathBuf::from(DEFAULT_AUDIT_FILE)),
        }
    }
}

impl PipelineConfig {
    /// Set the tuning configuration
    pub fn tuning(mut self, tuning: TuningConfig) -> Self {
        self.tuning = tuning;
        self
    }

    /// Set the formatter configuration
    pub fn formatter(mut self, formatter: FormatterConfig) -> Self {
        self.formatter = formatter;
        self
    }

    /// Set or clear the audit file
    pub fn audit_path(mut self, path: Option<PathBuf>) -> Self {
        self.audit_path = path;
        self
    }
}

/// What happened to one loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LoopOutcome {
    /// The loop performs stream I/O
    NotParallelDueToIo,
    /// A loop-carried dependence was found
    NotParallelDueToDependency {
        /// Block-relative line of the offending statement
        line: usize,
    },
    /// The loop was annotated
    Parallel {
        /// Loop text under its directive
        directive_text: String,
        /// The same with a dynamic schedule and thread count
        balanced_text: String,
        /// Plan the balanced text uses
        thread_plan: ThreadPlan,
    },
}

impl LoopOutcome {
    /// Whether the loop was annotated.
    pub fn is_parallel(&self) -> bool {
        matches!(self, LoopOutcome::Parallel { .. })
    }

    /// Balanced loop text, or the reason it stays serial.
    pub fn text(&self) -> String {
        match self {
            LoopOutcome::NotParallelDueToIo => NonParallelReason::Io.to_string(),
            LoopOutcome::NotParallelDueToDependency { line } => {
                NonParallelReason::Dependency { line: *line }.to_string()
            }
            LoopOutcome::Parallel { balanced_text, .. } => balanced_text.clone(),
        }
    }
}

impl From<NonParallelReason> for LoopOutcome {
    fn from(reason: NonParallelReason) -> Self {
        match reason {
            NonParallelReason::Io => LoopOutcome::NotParallelDueToIo,
            NonParallelReason::Dependency { line } => LoopOutcome::NotParallelDueToDependency { line },
        }
    }
}

/// Everything computed for one loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopReport {
    /// Position in the source, starting at 1
    pub index: usize,
    /// The extracted loop
    pub block: LoopBlock,
    /// Zero-based unit-stride form, when it differs from the original
    pub normalized: Option<String>,
    /// Data-sharing classification
    pub variables: VariableClassification,
    /// Dependence screening result; absent for I/O loops
    pub dependency: Option<DependencyVerdict>,
    /// Complexity score
    pub complexity: ComplexityScore,
    /// Unbalanced thread plan
    pub thread_plan: ThreadPlan,
    /// Deepest array access
    pub dimensionality: Dimensionality,
    /// Parallelization outcome
    pub outcome: LoopOutcome,
    /// Tile-size selection for non-scalar loops
    pub tiling: Option<TileConfiguration>,
    /// Tiled form of the normalized loop
    pub tiled: Option<String>,
}

/// Ordered per-loop results of one transform request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationReport {
    /// Processors the plans were made for
    pub processor_count: usize,
    /// Echoed from the request
    pub core_type_hint: Option<String>,
    /// Echoed from the request
    pub ram_size_hint: Option<String>,
    /// One entry per loop, in source order
    pub loops: Vec<LoopReport>,
}

impl TransformationReport {
    /// Pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable summary.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for report in &self.loops {
            out.push_str(&format!(
                "=== Loop {} (line {}, {}) ===\n",
                report.index, report.block.line, report.dimensionality
            ));
            out.push_str(&format!(
                "complexity: {:.1} (class {})\n",
                report.complexity.raw_score, report.complexity.class
            ));
            out.push_str(&indent(&report.outcome.text(), 2));
            out.push('\n');
            if let (Some(tiles), Some(tiled)) = (&report.tiling, &report.tiled) {
                out.push_str(&format!("tile size: {} ({:?})\n", tiles.tile_size, tiles.method));
                out.push_str(&indent(tiled.trim_end(), 2));
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }
}

/// Drives analysis, code generation and tiling over a source text.
pub struct Pipeline<C = BenchmarkRunner> {
    config: PipelineConfig,
    formatter: Formatter,
    tuner: AutoTuner<C>,
}

impl Pipeline<BenchmarkRunner> {
    /// Pipeline that tunes with real benchmark builds.
    pub fn new(config: PipelineConfig) -> Self {
        let tuner = AutoTuner::new(config.tuning.clone());
        Self::with_tuner(config, tuner)
    }
}

impl<C: CostModel> Pipeline<C> {
    /// Pipeline with a custom tile-size cost model.
    pub fn with_cost_model(config: PipelineConfig, cost: C) -> Self {
        let tuner = AutoTuner::with_cost_model(config.tuning.clone(), cost);
        Self::with_tuner(config, tuner)
    }

    fn with_tuner(config: PipelineConfig, tuner: AutoTuner<C>) -> Self {
        Self {
            formatter: Formatter::new(config.formatter.clone()),
            config,
            tuner,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Analyze and rewrite every loop in the request's source.
    ///
    /// The report is also written to the audit file when one is configured.
    pub fn transform(&mut self, request: &TransformRequest) -> TransformationReport {
        let source = self.formatter.format(&request.source);
        let blocks = extract_loops(&source);
        info!("found {} loop blocks", blocks.len());

        // Tuning depends only on dimensionality.
        let mut tile_cache: HashMap<Dimensionality, TileConfiguration> = HashMap::new();
        let loops = blocks
            .into_iter()
            .enumerate()
            .map(|(i, block)| self.process_loop(i + 1, block, request.processor_count, &mut tile_cache))
            .collect();

        let report = TransformationReport {
            processor_count: request.processor_count,
            core_type_hint: request.core_type_hint.clone(),
            ram_size_hint: request.ram_size_hint.clone(),
            loops,
        };
        self.write_audit(&report);
        report
    }

    fn process_loop(
        &mut self,
        index: usize,
        block: LoopBlock,
        processor_count: usize,
        tile_cache: &mut HashMap<Dimensionality, TileConfiguration>,
    ) -> LoopReport {
        let normalized_text = normalize(&block);
        let complexity = score(&block);
        let thread_plan = choose_thread_plan(complexity.class, processor_count, &block);
        let variables = classify(&block);
        let dims = dimensionality(&block);

        let (dependency, outcome) = if has_io(&block) {
            (None, LoopOutcome::NotParallelDueToIo)
        } else {
            let verdict = screen(&block);
            let outcome = match verdict.conflict_line() {
                Some(line) => LoopOutcome::NotParallelDueToDependency { line },
                None => parallel_outcome(&block, &variables, &verdict, thread_plan),
            };
            (Some(verdict), outcome)
        };
        debug!("loop {}: {:?}", index, outcome);

        let (tiling, tiled) = if dims.is_scalar() {
            (None, None)
        } else {
            let tiles = tile_cache
                .entry(dims)
                .or_insert_with(|| self.tuner.tune(dims))
                .clone();
            let target = LoopBlock::from_text(&normalized_text).unwrap_or_else(|| block.clone());
            let tiled = self.formatter.format(&tile(&target, tiles.tile_size));
            (Some(tiles), Some(tiled))
        };

        LoopReport {
            index,
            normalized: (normalized_text != block.text).then_some(normalized_text),
            block,
            variables,
            dependency,
            complexity,
            thread_plan,
            dimensionality: dims,
            outcome,
            tiling,
            tiled,
        }
    }

    fn write_audit(&self, report: &TransformationReport) {
        let Some(path) = &self.config.audit_path else {
            return;
        };
        let written = report
            .to_json()
            .map_err(std::io::Error::from)
            .and_then(|json| fs::write(path, json));
        match written {
            Ok(()) => debug!("wrote {}", path.display()),
            Err(e) => warn!("could not write audit file {}: {}", path.display(), e),
        }
    }
}

fn parallel_outcome(
    block: &LoopBlock,
    variables: &VariableClassification,
    verdict: &DependencyVerdict,
    plan: ThreadPlan,
) -> LoopOutcome {
    let rewritten = if block.has_early_exit() {
        match rewrite_break_return(block) {
            Ok(text) => Some(text),
            Err(e) => {
                debug!("early-exit rewrite failed, annotating as is: {}", e);
                None
            }
        }
    } else {
        None
    };

    let directive_text = match rewritten {
        Some(text) => text,
        None => match annotate(block, variables, verdict, &plan) {
            Annotation::Parallel { text, .. } => text,
            Annotation::NotParallelizable(reason) => return reason.into(),
        },
    };
    let balanced_text = balance(&directive_text, plan.thread_count);
    LoopOutcome::Parallel {
        directive_text,
        balanced_text,
        thread_plan: plan.balanced(),
    }
}
