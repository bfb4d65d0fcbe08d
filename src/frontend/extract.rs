//! Structural loop extraction.
//!
//! A single left-to-right pass over the token stream finds every outermost
//! `for` loop. Loops nested inside a found loop stay part of its text.

use crate::frontend::lexer::tokenize;
use crate::frontend::structure::{self, Statement};
use crate::frontend::token::{Token, TokenKind};
use log::debug;
use serde::{Deserialize, Serialize};

/// One `for` loop lifted out of a larger source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopBlock {
    /// Exact source text from `for` through the end of the body
    pub text: String,
    /// Byte offset of `for` in the source
    pub start: usize,
    /// Byte offset one past the end of the body
    pub end: usize,
    /// Line of the `for` keyword (1-indexed)
    pub line: usize,
    /// Number of unclosed `{` before the loop
    pub depth: usize,
    /// Byte length of `for (...)` within `text`
    header_len: usize,
}

impl LoopBlock {
    /// Parse the first loop found in `text`.
    pub fn from_text(text: &str) -> Option<LoopBlock> {
        extract_loops(text).into_iter().next()
    }

    /// `for (...)`
    pub fn header(&self) -> &str {
        &self.text[..self.header_len]
    }

    /// Text between the header parentheses.
    pub fn header_inner(&self) -> &str {
        let header = self.header();
        match (header.find('('), header.rfind(')')) {
            (Some(open), Some(close)) if open < close => &header[open + 1..close],
            _ => "",
        }
    }

    /// Everything after the header, including leading whitespace.
    pub fn body(&self) -> &str {
        &self.text[self.header_len..]
    }

    /// Tokens of this block. Lines are relative to the block (first line is 1).
    pub fn tokens(&self) -> Vec<Token> {
        tokenize(&self.text)
    }

    /// Number of loop headers in the block, the outer one included.
    pub fn loop_count(&self) -> usize {
        structure::loop_headers(&self.tokens()).len()
    }

    /// Whether the block contains `break` or `return`.
    pub fn has_early_exit(&self) -> bool {
        self.tokens()
            .iter()
            .any(|t| matches!(t.kind, TokenKind::Break | TokenKind::Return))
    }
}

/// A tokenized view of a loop block.
pub struct LoopTokens<'a> {
    /// The block
    pub block: &'a LoopBlock,
    /// Its tokens
    pub tokens: Vec<Token>,
    /// Index of the outer header's `)`
    pub header_close: usize,
}

impl<'a> LoopTokens<'a> {
    /// Tokenize `block`. Returns `None` if the block does not start with a
    /// well-formed header.
    pub fn new(block: &'a LoopBlock) -> Option<Self> {
        let tokens = block.tokens();
        let site = structure::header_at(&tokens, 0)?;
        Some(Self {
            block,
            header_close: site.close,
            tokens,
        })
    }

    /// Tokens after the outer header.
    pub fn body(&self) -> &[Token] {
        &self.tokens[self.header_close + 1..]
    }

    /// Statements of the body, inner headers split into clauses.
    ///
    /// Ranges index into [`LoopTokens::body`].
    pub fn body_statements(&self) -> Vec<Statement> {
        structure::statements(self.body())
    }

    /// Source text of a statement returned by [`LoopTokens::body_statements`].
    pub fn statement_text(&self, stmt: &Statement) -> &str {
        stmt.text(self.body(), &self.block.text)
    }
}

/// Extract every outermost `for` loop from `source`, in source order.
///
/// Never fails. Headers without two `;` separators are skipped and scanning
/// resumes at the next token; an unterminated body runs to end of input.
pub fn extract_loops(source: &str) -> Vec<LoopBlock> {
    let tokens = tokenize(source);
    let mut blocks = Vec::new();
    let mut depth = 0usize;
    let mut k = 0;

    while k < tokens.len() {
        let tok = &tokens[k];
        match tok.kind {
            TokenKind::LeftBrace => depth += 1,
            TokenKind::RightBrace => depth = depth.saturating_sub(1),
            TokenKind::For => {
                if let (Some(site), Some(end)) =
                    (structure::header_at(&tokens, k), structure::loop_end(&tokens, k))
                {
                    let start = tok.span.start;
                    let stop = tokens[end].span.end;
                    blocks.push(LoopBlock {
                        text: source[start..stop].to_string(),
                        start,
                        end: stop,
                        line: tok.span.line,
                        depth,
                        header_len: tokens[site.close].span.end - start,
                    });
                    k = end + 1;
                    continue;
                }
            }
            _ => {}
        }
        k += 1;
    }

    debug!("extracted {} loop block(s)", blocks.len());
    blocks
}
