//! Utility modules shared by every stage.
//!
//! - Error types
//! - Source spans
//! - Code emission helpers
//! - External process execution
//! - The `clang-format` boundary

pub mod errors;
pub mod format;
pub mod location;
pub mod pretty;
pub mod process;

// Re-exports
pub use errors::*;
pub use format::{Formatter, FormatterConfig};
pub use location::{SourceLocation, Span};
pub use pretty::CodeFormatter;
pub use process::{run_with_timeout, ProcessOutput, StdinSource};
