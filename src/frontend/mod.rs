//! Frontend: lexing, loop extraction and header decomposition.
//!
//! There is no parser for full C++. The lexer produces a lossless token
//! stream and every later stage works on bracket-aware token ranges:
//!
//! ```text
//! source ──lex──▶ tokens ──extract──▶ LoopBlock* ──header──▶ CanonicalLoop?
//! ```

pub mod extract;
pub mod header;
pub mod lexer;
pub mod structure;
pub mod token;

// Re-exports
pub use extract::{extract_loops, LoopBlock, LoopTokens};
pub use header::{CanonicalLoop, Comparator, LoopHeader, Step};
pub use lexer::{tokenize, Lexer};
pub use structure::Statement;
pub use token::{Token, TokenKind};
