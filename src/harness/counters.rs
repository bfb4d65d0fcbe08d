//! Resource-usage counters from `/usr/bin/time -v` and callgrind output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static INSTRUCTION_REFS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"I\s+refs:\s+([\d,]+)").expect("valid regex"));
static USER_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"User time \(seconds\):\s+([\d.]+)").expect("valid regex"));
static SYSTEM_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"System time \(seconds\):\s+([\d.]+)").expect("valid regex"));
static CPU_PERCENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Percent of CPU this job got:\s+(\d+)%").expect("valid regex"));
static ELAPSED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Elapsed \(wall clock\) time.*?:\s+([\d:.]+)").expect("valid regex"));
static MAX_RSS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Maximum resident set size \(kbytes\):\s+(\d+)").expect("valid regex"));
static MAJOR_FAULTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Major \(requiring I/O\) page faults:\s+(\d+)").expect("valid regex"));
static MINOR_FAULTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Minor \(reclaiming a frame\) page faults:\s+(\d+)").expect("valid regex"));
static VOLUNTARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Voluntary context switches:\s+(\d+)").expect("valid regex"));
static INVOLUNTARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Involuntary context switches:\s+(\d+)").expect("valid regex"));
static FS_INPUTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"File system inputs:\s+(\d+)").expect("valid regex"));
static FS_OUTPUTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"File system outputs:\s+(\d+)").expect("valid regex"));

/// Counters of one profiled run, or the mean of several.
///
/// A counter missing from the tool output reads as zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceCounters {
    /// Instructions executed, from callgrind
    pub instruction_refs: f64,
    /// User CPU seconds
    pub user_time: f64,
    /// System CPU seconds
    pub system_time: f64,
    /// CPU utilization percent
    pub cpu_percent: f64,
    /// Wall-clock seconds
    pub elapsed_time: f64,
    /// Peak resident set size in KB
    pub max_rss_kb: f64,
    /// Page faults that required I/O
    pub major_faults: f64,
    /// Page faults served without I/O
    pub minor_faults: f64,
    /// Voluntary context switches
    pub voluntary_switches: f64,
    /// Involuntary context switches
    pub involuntary_switches: f64,
    /// Blocks read from the file system
    pub fs_inputs: f64,
    /// Blocks written to the file system
    pub fs_outputs: f64,
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn number(re: &Regex, text: &str) -> f64 {
    capture(re, text)
        .and_then(|s| s.replace(',', "").parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Seconds from `ss.ss`, `m:ss.ss` or `h:mm:ss`.
pub fn parse_clock(s: &str) -> Option<f64> {
    let parts = s
        .split(':')
        .map(|p| p.parse::<f64>().ok())
        .collect::<Option<Vec<f64>>>()?;
    match parts.as_slice() {
        [s] => Some(*s),
        [m, s] => Some(m * 60.0 + s),
        [h, m, s] => Some(h * 3600.0 + m * 60.0 + s),
        _ => None,
    }
}

impl ResourceCounters {
    /// Parse the combined output of `time -v valgrind --tool=callgrind`.
    ///
    /// Both tools write their summaries to stderr; stdout is searched for the
    /// instruction count as well.
    pub fn parse(stdout: &str, stderr: &str) -> Self {
        let instruction_refs = match capture(&INSTRUCTION_REFS, stderr) {
            Some(_) => number(&INSTRUCTION_REFS, stderr),
            None => number(&INSTRUCTION_REFS, stdout),
        };
        Self {
            instruction_refs,
            user_time: number(&USER_TIME, stderr),
            system_time: number(&SYSTEM_TIME, stderr),
            cpu_percent: number(&CPU_PERCENT, stderr),
            elapsed_time: capture(&ELAPSED, stderr)
                .and_then(|s| parse_clock(&s))
                .unwrap_or(0.0),
            max_rss_kb: number(&MAX_RSS, stderr),
            major_faults: number(&MAJOR_FAULTS, stderr),
            minor_faults: number(&MINOR_FAULTS, stderr),
            voluntary_switches: number(&VOLUNTARY, stderr),
            involuntary_switches: number(&INVOLUNTARY, stderr),
            fs_inputs: number(&FS_INPUTS, stderr),
            fs_outputs: number(&FS_OUTPUTS, stderr),
        }
    }

    /// Counters in CSV column order.
    pub fn values(&self) -> [f64; 12] {
        [
            self.instruction_refs,
            self.user_time,
            self.system_time,
            self.cpu_percent,
            self.elapsed_time,
            self.max_rss_kb,
            self.major_faults,
            self.minor_faults,
            self.voluntary_switches,
            self.involuntary_switches,
            self.fs_inputs,
            self.fs_outputs,
        ]
    }

    fn from_values(v: [f64; 12]) -> Self {
        Self {
            instruction_refs: v[0],
            user_time: v[1],
            system_time: v[2],
            cpu_percent: v[3],
            elapsed_time: v[4],
            max_rss_kb: v[5],
            major_faults: v[6],
            minor_faults: v[7],
            voluntary_switches: v[8],
            involuntary_switches: v[9],
            fs_inputs: v[10],
            fs_outputs: v[11],
        }
    }

    /// Field-wise mean; zero for no samples.
    pub fn mean(samples: &[ResourceCounters]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let mut sums = [0.0; 12];
        for sample in samples {
            for (sum, v) in sums.iter_mut().zip(sample.values()) {
                *sum += v;
            }
        }
        let n = samples.len() as f64;
        Self::from_values(sums.map(|s| s / n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIME_OUTPUT: &str = "\
\tCommand being timed: \"valgrind --tool=callgrind ./program\"
\tUser time (seconds): 1.25
\tSystem time (seconds): 0.04
\tPercent of CPU this job got: 98%
\tElapsed (wall clock) time (h:mm:ss or m:ss): 0:01.31
\tMaximum resident set size (kbytes): 104512
\tMajor (requiring I/O) page faults: 0
\tMinor (reclaiming a frame) page faults: 25803
\tVoluntary context switches: 3
\tInvoluntary context switches: 17
\tFile system inputs: 8
\tFile system outputs: 312
";

    #[test]
    fn test_parse_time_output() {
        let stderr = format!("==123== Events    : Ir\n==123== I   refs:      2,345,678\n{}", TIME_OUTPUT);
        let c = ResourceCounters::parse("", &stderr);
        assert_eq!(c.instruction_refs, 2_345_678.0);
        assert_eq!(c.user_time, 1.25);
        assert_eq!(c.cpu_percent, 98.0);
        assert!((c.elapsed_time - 1.31).abs() < 1e-9);
        assert_eq!(c.max_rss_kb, 104_512.0);
        assert_eq!(c.minor_faults, 25_803.0);
        assert_eq!(c.involuntary_switches, 17.0);
        assert_eq!(c.fs_outputs, 312.0);
    }

    #[test]
    fn test_missing_counters_are_zero() {
        let c = ResourceCounters::parse("I refs: 10", "garbage");
        assert_eq!(c.instruction_refs, 10.0);
        assert_eq!(c.user_time, 0.0);
        assert_eq!(ResourceCounters::parse("", ""), ResourceCounters::default());
    }

    #[test]
    fn test_parse_clock() {
        assert_eq!(parse_clock("2.5"), Some(2.5));
        assert_eq!(parse_clock("1:02.5"), Some(62.5));
        assert_eq!(parse_clock("1:00:03"), Some(3603.0));
        assert_eq!(parse_clock("x:1"), None);
    }

    #[test]
    fn test_mean() {
        let a = ResourceCounters {
            user_time: 1.0,
            max_rss_kb: 100.0,
            ..Default::default()
        };
        let b = ResourceCounters {
            user_time: 3.0,
            max_rss_kb: 300.0,
            ..Default::default()
        };
        let m = ResourceCounters::mean(&[a, b]);
        assert_eq!(m.user_time, 2.0);
        assert_eq!(m.max_rss_kb, 200.0);
        assert_eq!(ResourceCounters::mean(&[]), ResourceCounters::default());
    }
}
