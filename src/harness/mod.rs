//! Measurement harness.
//!
//! Compiles a complete program once, runs it under the profiler for every
//! fixture input, averages the counters over repeated runs and writes one
//! CSV row per fixture.
//!
//! The toolchain sits behind the [`Compiler`] and [`Profiler`] traits, so
//! tests can run the harness without `g++` or `valgrind`.

mod config;
mod counters;
mod fixtures;
mod record;

pub use config::HarnessConfig;
pub use counters::{parse_clock, ResourceCounters};
pub use fixtures::{
    detect_input_shape, fixture_files, fixture_id, select_fixture_dir, Fixture, InputShape, FALLBACK_DIRS,
};
pub use record::{to_csv, write_csv, MeasurementRecord, CSV_COLUMNS};

use crate::utils::errors::HarnessError;
use crate::utils::format::{Formatter, FormatterConfig};
use crate::utils::process::{run_with_timeout, StdinSource};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Builds an executable from a source file.
pub trait Compiler {
    /// Compile `source` into `output`, linking the OpenMP runtime if
    /// `parallel` is set.
    fn compile(&self, source: &Path, output: &Path, parallel: bool) -> HarnessResult<()>;
}

/// Runs an executable on one input and reports its resource usage.
pub trait Profiler {
    /// Profile `executable` with `input` on stdin.
    fn profile(&self, executable: &Path, input: &Path) -> HarnessResult<ResourceCounters>;
}

/// `g++` (or any compatible driver).
#[derive(Debug, Clone, Default)]
pub struct GccCompiler {
    config: HarnessConfig,
}

impl GccCompiler {
    /// Create a compiler from the harness settings.
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }
}

impl Compiler for GccCompiler {
    fn compile(&self, source: &Path, output: &Path, parallel: bool) -> HarnessResult<()> {
        let mut cmd = Command::new(&self.config.compiler);
        cmd.arg(source).arg("-o").arg(output).args(&self.config.compiler_flags);
        if parallel {
            cmd.arg(&self.config.openmp_flag);
        }
        let out = run_with_timeout(&mut cmd, StdinSource::Null, self.config.compile_timeout)?;
        if !out.success() {
            return Err(HarnessError::Compilation {
                source_file: source.to_path_buf(),
                stderr: out.stderr,
            });
        }
        debug!("compiled {} in {:?}", output.display(), out.elapsed);
        Ok(())
    }
}

/// `/usr/bin/time -v valgrind --tool=callgrind`.
#[derive(Debug, Clone, Default)]
pub struct ValgrindProfiler {
    config: HarnessConfig,
}

impl ValgrindProfiler {
    /// Create a profiler from the harness settings.
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }
}

impl Profiler for ValgrindProfiler {
    fn profile(&self, executable: &Path, input: &Path) -> HarnessResult<ResourceCounters> {
        // callgrind drops its output file in the working directory.
        let scratch = tempfile::Builder::new().prefix("parloop_profile_").tempdir()?;
        let mut cmd = Command::new(&self.config.timer_command);
        cmd.args(&self.config.timer_args)
            .arg(&self.config.profiler_command)
            .args(&self.config.profiler_args)
            .arg(executable)
            .current_dir(scratch.path());
        let out = run_with_timeout(&mut cmd, StdinSource::File(input.to_path_buf()), self.config.run_timeout)?;
        if !out.success() {
            debug!("{} exited with {}", executable.display(), out.status);
        }
        Ok(ResourceCounters::parse(&out.stdout, &out.stderr))
    }
}

/// Serial and parallel measurements of the same program.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Fixture directory used for the parallel program
    pub parallel_inputs: Option<PathBuf>,
    /// Rows for the parallel program
    pub parallel: Vec<MeasurementRecord>,
    /// Fixture directory used for the serial program
    pub serial_inputs: Option<PathBuf>,
    /// Rows for the serial program
    pub serial: Vec<MeasurementRecord>,
}

/// Compiles, profiles and tabulates programs over fixture inputs.
pub struct Harness<C = GccCompiler, P = ValgrindProfiler> {
    config: HarnessConfig,
    compiler: C,
    profiler: P,
    formatter: Formatter,
}

impl Harness<GccCompiler, ValgrindProfiler> {
    /// Harness using the configured real toolchain.
    pub fn new(config: HarnessConfig) -> Self {
        let compiler = GccCompiler::new(config.clone());
        let profiler = ValgrindProfiler::new(config.clone());
        Self::with_tools(config, compiler, profiler)
    }
}

impl<C: Compiler, P: Profiler> Harness<C, P> {
    /// Harness with custom tools.
    pub fn with_tools(config: HarnessConfig, compiler: C, profiler: P) -> Self {
        Self {
            config,
            compiler,
            profiler,
            formatter: Formatter::default(),
        }
    }

    /// Set the formatter used by [`Harness::compare`].
    pub fn with_formatter(mut self, config: FormatterConfig) -> Self {
        self.formatter = Formatter::new(config);
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Measure `program_source` on every fixture in `input_directory`.
    ///
    /// A missing directory yields no rows. The rows are also written to
    /// `ResultsParallel.csv` or `ResultsSerial.csv` in the results directory.
    pub fn measure(
        &self,
        program_source: &str,
        use_parallel_runtime: bool,
        input_directory: Option<&Path>,
        runs_per_input: usize,
    ) -> HarnessResult<Vec<MeasurementRecord>> {
        if runs_per_input == 0 {
            return Err(HarnessError::InvalidConfig("runs per input must be at least 1".to_string()));
        }

        let build = tempfile::Builder::new().prefix("parloop_measure_").tempdir()?;
        let source = build.path().join("program.cpp");
        let executable = build.path().join("program");
        fs::write(&source, program_source)?;
        self.compiler.compile(&source, &executable, use_parallel_runtime)?;

        let records = match input_directory.filter(|d| d.is_dir()) {
            Some(dir) => self.measure_fixtures(&executable, dir, runs_per_input)?,
            None => {
                warn!(
                    "input directory {} does not exist, no measurements taken",
                    input_directory.map_or_else(|| "<none>".to_string(), |d| d.display().to_string())
                );
                Vec::new()
            }
        };

        let csv = self.config.results_file(use_parallel_runtime);
        write_csv(&csv, &records)?;
        info!("wrote {} rows to {}", records.len(), csv.display());
        Ok(records)
    }

    fn measure_fixtures(
        &self,
        executable: &Path,
        dir: &Path,
        runs: usize,
    ) -> HarnessResult<Vec<MeasurementRecord>> {
        let fixtures = fixture_files(dir)?;
        info!("measuring {} fixtures in {}", fixtures.len(), dir.display());

        let records = fixtures
            .into_iter()
            .map(|fixture| {
                let samples: Vec<ResourceCounters> = (0..runs)
                    .map(|run| {
                        debug!("{} run {}/{}", fixture.name, run + 1, runs);
                        self.profiler.profile(executable, &fixture.path).unwrap_or_else(|e| {
                            warn!("run {} on {} failed: {}", run + 1, fixture.name, e);
                            ResourceCounters::default()
                        })
                    })
                    .collect();
                MeasurementRecord {
                    input_file: fixture.name,
                    input_id: fixture.id,
                    runs,
                    counters: ResourceCounters::mean(&samples),
                }
            })
            .collect();
        Ok(records)
    }

    /// Measure a parallel program against its serial original.
    ///
    /// The parallel source gets the OpenMP header and a `tile_size` constant
    /// prepended. Each program reads fixtures matching its own input shape.
    pub fn compare(
        &self,
        parallel_source: &str,
        serial_source: &str,
        fixtures_root: &Path,
        runs: usize,
        tile_size: usize,
    ) -> HarnessResult<Comparison> {
        let parallel_program = self.formatter.format(&format!(
            "#include <omp.h>\nconst int tile_size = {};\n{}",
            tile_size, parallel_source
        ));
        let serial_program = self.formatter.format(serial_source);

        let parallel_inputs = select_fixture_dir(fixtures_root, &parallel_program);
        let parallel = self.measure(&parallel_program, true, parallel_inputs.as_deref(), runs)?;
        let serial_inputs = select_fixture_dir(fixtures_root, &serial_program);
        let serial = self.measure(&serial_program, false, serial_inputs.as_deref(), runs)?;

        Ok(Comparison {
            parallel_inputs,
            parallel,
            serial_inputs,
            serial,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct CopyCompiler {
        seen: RefCell<Vec<(String, bool)>>,
    }

    impl Compiler for CopyCompiler {
        fn compile(&self, source: &Path, output: &Path, parallel: bool) -> HarnessResult<()> {
            let text = fs::read_to_string(source)?;
            self.seen.borrow_mut().push((text, parallel));
            fs::copy(source, output)?;
            Ok(())
        }
    }

    struct RejectingCompiler;

    impl Compiler for RejectingCompiler {
        fn compile(&self, source: &Path, _output: &Path, _parallel: bool) -> HarnessResult<()> {
            Err(HarnessError::Compilation {
                source_file: source.to_path_buf(),
                stderr: "error: expected ';'".to_string(),
            })
        }
    }

    /// Reports the run number as user time and fails every third run.
    struct CountingProfiler {
        runs: RefCell<usize>,
    }

    impl Profiler for CountingProfiler {
        fn profile(&self, _executable: &Path, input: &Path) -> HarnessResult<ResourceCounters> {
            let mut runs = self.runs.borrow_mut();
            *runs += 1;
            if *runs % 3 == 0 {
                return Err(HarnessError::RunFailed {
                    input: input.to_path_buf(),
                    reason: "timed out".to_string(),
                });
            }
            Ok(ResourceCounters {
                user_time: *runs as f64,
                ..Default::default()
            })
        }
    }

    fn harness(results: &Path) -> Harness<CopyCompiler, CountingProfiler> {
        Harness::with_tools(
            HarnessConfig::default().results_dir(results),
            CopyCompiler {
                seen: RefCell::new(vec![]),
            },
            CountingProfiler { runs: RefCell::new(0) },
        )
        .with_formatter(FormatterConfig::disabled())
    }

    #[test]
    fn test_failed_runs_count_as_zero() {
        let results = tempfile::tempdir().unwrap();
        let inputs = tempfile::tempdir().unwrap();
        fs::write(inputs.path().join("input_1.txt"), "3\n1 2 3\n").unwrap();

        let rows = harness(results.path())
            .measure("int main() {}", false, Some(inputs.path()), 3)
            .unwrap();
        assert_eq!(rows.len(), 1);
        // Runs report 1, 2 and a failure.
        assert_eq!(rows[0].counters.user_time, 1.0);
        assert_eq!(rows[0].runs, 3);
        assert!(results.path().join("ResultsSerial.csv").exists());
    }

    #[test]
    fn test_zero_runs_rejected() {
        let results = tempfile::tempdir().unwrap();
        let err = harness(results.path()).measure("", true, None, 0).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidConfig(_)));
    }

    #[test]
    fn test_compile_failure_is_fatal() {
        let results = tempfile::tempdir().unwrap();
        let harness = Harness::with_tools(
            HarnessConfig::default().results_dir(results.path()),
            RejectingCompiler,
            CountingProfiler { runs: RefCell::new(0) },
        );
        let err = harness.measure("int main(", true, None, 1).unwrap_err();
        assert!(matches!(err, HarnessError::Compilation { .. }));
        assert!(!results.path().join("ResultsParallel.csv").exists());
    }

    #[test]
    fn test_compare_prepends_prelude() {
        let results = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let one_d = root.path().join("1 D Array");
        fs::create_dir(&one_d).unwrap();
        fs::write(one_d.join("input_4.txt"), "1\n5\n").unwrap();

        let program = "int main() { for (int i = 0; i < n; i++) cin >> a[i]; }";
        let harness = harness(results.path());
        let cmp = harness.compare(program, program, root.path(), 1, 64).unwrap();

        assert_eq!(cmp.parallel_inputs.as_deref(), Some(one_d.as_path()));
        assert_eq!(cmp.parallel[0].input_id, 4);
        assert_eq!(cmp.serial.len(), 1);

        let seen = harness.compiler.seen.borrow();
        assert!(seen[0].0.starts_with("#include <omp.h>\nconst int tile_size = 64;\n"));
        assert!(seen[0].1);
        assert_eq!(seen[1].0, program);
        assert!(!seen[1].1);
        assert!(results.path().join("ResultsParallel.csv").exists());
        assert!(results.path().join("ResultsSerial.csv").exists());
    }
}
