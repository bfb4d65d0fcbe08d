//! Per-fixture measurement rows and their CSV form.

use super::counters::ResourceCounters;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// CSV header, in column order.
pub const CSV_COLUMNS: [&str; 14] = [
    "Input File",
    "Input ID",
    "Instruction References (I refs)",
    "User Time (s)",
    "System Time (s)",
    "CPU Usage (%)",
    "Elapsed Time (s)",
    "Max RSS (KB)",
    "Major Page Faults",
    "Minor Page Faults",
    "Voluntary Context Switches",
    "Involuntary Context Switches",
    "File System Inputs",
    "File System Outputs",
];

/// Counter columns printed with two decimals; the rest are rounded to whole counts.
const FRACTIONAL: [bool; 12] = [
    false, true, true, true, true, false, false, false, false, false, false, false,
];

/// Mean counters of one fixture over repeated runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    /// Fixture file name
    pub input_file: String,
    /// Numeric identity from the file name
    pub input_id: u64,
    /// Number of runs averaged
    pub runs: usize,
    /// Mean counters
    #[serde(flatten)]
    pub counters: ResourceCounters,
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

impl MeasurementRecord {
    /// One CSV line, without the newline.
    pub fn to_csv_row(&self) -> String {
        let mut fields = vec![csv_field(&self.input_file), self.input_id.to_string()];
        for (value, fractional) in self.counters.values().into_iter().zip(FRACTIONAL) {
            fields.push(if fractional {
                format!("{:.2}", value)
            } else {
                format!("{}", value.round() as u64)
            });
        }
        fields.join(",")
    }
}

/// Render `records` as CSV with a header line.
pub fn to_csv(records: &[MeasurementRecord]) -> String {
    let mut csv = CSV_COLUMNS.join(",");
    csv.push('\n');
    for record in records {
        csv.push_str(&record.to_csv_row());
        csv.push('\n');
    }
    csv
}

/// Write `records` to `path`, creating its directory.
pub fn write_csv(path: &Path, records: &[MeasurementRecord]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, to_csv(records))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_format() {
        let record = MeasurementRecord {
            input_file: "input_3.txt".to_string(),
            input_id: 3,
            runs: 2,
            counters: ResourceCounters {
                instruction_refs: 1500.5,
                user_time: 0.126,
                cpu_percent: 99.0,
                max_rss_kb: 2048.0,
                ..Default::default()
            },
        };
        assert_eq!(
            record.to_csv_row(),
            "input_3.txt,3,1501,0.13,0.00,99.00,0.00,2048,0,0,0,0,0,0"
        );
    }

    #[test]
    fn test_mean_counts_round_to_nearest() {
        let runs = [
            ResourceCounters { max_rss_kb: 1.0, ..Default::default() },
            ResourceCounters { max_rss_kb: 2.0, ..Default::default() },
        ];
        let record = MeasurementRecord {
            input_file: "input_1.txt".to_string(),
            input_id: 1,
            runs: 2,
            counters: ResourceCounters::mean(&runs),
        };
        let row = record.to_csv_row();
        assert_eq!(row.split(',').nth(7), Some("2"));
    }

    #[test]
    fn test_header_only() {
        let csv = to_csv(&[]);
        assert_eq!(csv.lines().count(), 1);
        assert!(csv.starts_with("Input File,Input ID,Instruction References (I refs),"));
    }

    #[test]
    fn test_quoting() {
        assert_eq!(csv_field("a,b.txt"), "\"a,b.txt\"");
        assert_eq!(csv_field("plain.txt"), "plain.txt");
    }
}
