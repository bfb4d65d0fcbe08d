//! `clang-format` boundary.
//!
//! Formatting is cosmetic: any failure degrades to the unformatted text.

use crate::utils::process::{run_with_timeout, StdinSource};
use log::warn;
use serde::{Deserialize, Serialize};
use std::process::Command;
use std::time::Duration;

/// Settings for the external formatter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatterConfig {
    /// Formatter executable
    pub command: String,
    /// Value passed as `--style=`
    pub style: String,
    /// When false, text passes through untouched
    pub enabled: bool,
    /// Time limit per invocation
    pub timeout: Duration,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            command: "clang-format".to_string(),
            style: "LLVM".to_string(),
            enabled: true,
            timeout: Duration::from_secs(10),
        }
    }
}

impl FormatterConfig {
    /// A configuration that never invokes the formatter.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Set the style name.
    pub fn style(mut self, style: &str) -> Self {
        self.style = style.to_string();
        self
    }
}

/// Formats C++ text through `clang-format`.
#[derive(Debug, Clone, Default)]
pub struct Formatter {
    config: FormatterConfig,
}

impl Formatter {
    /// Create a formatter.
    pub fn new(config: FormatterConfig) -> Self {
        Self { config }
    }

    /// Format `code`, returning it unchanged if the formatter is unavailable.
    pub fn format(&self, code: &str) -> String {
        if !self.config.enabled || code.trim().is_empty() {
            return code.to_string();
        }

        let mut cmd = Command::new(&self.config.command);
        cmd.arg(format!("--style={}", self.config.style));

        match run_with_timeout(
            &mut cmd,
            StdinSource::Bytes(code.as_bytes().to_vec()),
            self.config.timeout,
        ) {
            Ok(out) if out.success() => out.stdout,
            Ok(out) => {
                warn!(
                    "{} exited with {}, keeping unformatted text: {}",
                    self.config.command,
                    out.status,
                    out.stderr.trim()
                );
                code.to_string()
            }
            Err(e) => {
                warn!("{} unavailable, keeping unformatted text: {}", self.config.command, e);
                code.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_is_identity() {
        let f = Formatter::new(FormatterConfig::disabled());
        let code = "for(int i=0;i<n;i++){a[i]=0;}";
        assert_eq!(f.format(code), code);
    }

    #[test]
    fn test_missing_tool_degrades() {
        let f = Formatter::new(FormatterConfig {
            command: "no-such-clang-format-binary".to_string(),
            ..Default::default()
        });
        let code = "int x=1;";
        assert_eq!(f.format(code), code);
    }
}
