//! Heuristic complexity scoring.
//!
//! The score only drives thread-count scaling, so it is a plain weighted
//! token count rather than a cost model.

use crate::frontend::structure::{loop_headers, matching};
use crate::frontend::token::{Token, TokenKind};
use crate::frontend::LoopBlock;
use serde::{Deserialize, Serialize};

const LARGE_LITERAL: i64 = 1_000_000;

/// Score of one loop block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplexityScore {
    /// Weighted sum before rounding
    pub raw_score: f64,
    /// Rounded score
    pub score: i64,
    /// Ordinal class, 1 (simplest) to 5
    pub class: u8,
}

impl ComplexityScore {
    /// Build from a raw score.
    pub fn from_raw(raw_score: f64) -> Self {
        let score = raw_score.round() as i64;
        Self {
            raw_score,
            score,
            class: class_for(score),
        }
    }
}

/// Class for a rounded score: thresholds 20/30/40/50.
pub fn class_for(score: i64) -> u8 {
    match score {
        s if s > 50 => 5,
        s if s > 40 => 4,
        s if s > 30 => 3,
        s if s > 20 => 2,
        _ => 1,
    }
}

fn operator_weight(tok: &Token) -> f64 {
    if tok.is_step() {
        1.5
    } else if tok.is_compound_assignment() {
        let base = &tok.lexeme[..tok.lexeme.len() - 1];
        let class = match base {
            "+" | "-" | "*" | "/" | "%" => 2.0,
            _ => 1.0,
        };
        class + 1.0
    } else if tok.is_assignment() {
        1.0
    } else if tok.is_arithmetic() {
        2.0
    } else if tok.is_bitwise() {
        1.0
    } else {
        0.0
    }
}

fn literal_weight(tok: &Token) -> f64 {
    match tok.int_value() {
        Some(v) if v <= LARGE_LITERAL => -(v as f64) * 0.42,
        Some(v) => v as f64 * 0.2,
        None => 0.0,
    }
}

fn is_structural(line: &str) -> bool {
    let line = line.trim_start();
    line.is_empty() || line.starts_with("for") || line.starts_with('{') || line.starts_with('}')
}

/// Score `block`.
pub fn score(block: &LoopBlock) -> ComplexityScore {
    let tokens = block.tokens();
    let mut raw = 0.0;

    let headers = loop_headers(&tokens);
    if let Some(outer) = headers.first() {
        let commas = tokens[outer.open..outer.close]
            .iter()
            .filter(|t| t.kind == TokenKind::Comma)
            .count();
        raw += commas as f64 + 1.0;
    }
    raw += 2.0 * headers.len() as f64;

    for (k, tok) in tokens.iter().enumerate() {
        match tok.kind {
            TokenKind::Integer => raw += literal_weight(tok),
            TokenKind::Operator => raw += operator_weight(tok),
            TokenKind::Identifier => {
                let next = tokens.get(k + 1).map(|t| t.kind);
                match next {
                    Some(TokenKind::LeftParen) => {
                        let close = matching(&tokens, k + 1).unwrap_or(tokens.len() - 1);
                        let indexed_arg = tokens[k + 1..=close]
                            .iter()
                            .any(|t| t.kind == TokenKind::LeftBracket);
                        raw += if indexed_arg { 3.0 } else { 1.0 };
                    }
                    Some(TokenKind::LeftBracket) => raw += 2.0,
                    _ => raw += 1.0,
                }
            }
            _ => {}
        }
    }

    raw += block.text.lines().filter(|l| !is_structural(l)).count() as f64;
    ComplexityScore::from_raw(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn score_src(src: &str) -> ComplexityScore {
        score(&LoopBlock::from_text(src).unwrap())
    }

    #[test]
    fn test_thresholds() {
        assert_eq!(class_for(0), 1);
        assert_eq!(class_for(20), 1);
        assert_eq!(class_for(21), 2);
        assert_eq!(class_for(31), 3);
        assert_eq!(class_for(41), 4);
        assert_eq!(class_for(51), 5);
        assert_eq!(class_for(-7), 1);
    }

    #[test]
    fn test_elementwise_score() {
        // header 1 + 2, identifiers 6 (i) + 1 (n) + 6 (c, a, b)
        // operators: = 1, = 1, ++ 1.5, + 2
        let s = score_src("for (int i = 0; i < n; i++) { c[i] = a[i] + b[i]; }");
        assert!((s.raw_score - 21.5).abs() < 1e-9);
        assert_eq!(s.score, 22);
        assert_eq!(s.class, 2);
    }

    #[test]
    fn test_literals_pull_down() {
        let small = score_src("for (int i = 0; i < 100; i++) a[i] = 0;");
        let symbolic = score_src("for (int i = 0; i < n; i++) a[i] = 0;");
        assert!(small.raw_score < symbolic.raw_score);
        let huge = score_src("for (long i = 0; i < 20000000; i++) a[i] = 0;");
        assert!(huge.class == 5);
    }

    #[test]
    fn test_nesting_adds_up() {
        let flat = score_src("for (int i = 0; i < n; i++) c[i] = a[i] * b[i];");
        let nested = score_src(
            "for (int i = 0; i < n; i++)\n  for (int j = 0; j < n; j++)\n    for (int k = 0; k < n; k++)\n      c[i][j] += a[i][k] * b[k][j];",
        );
        assert!(nested.raw_score > flat.raw_score);
        assert!(nested.class >= flat.class);
    }

    #[test]
    fn test_calls() {
        let indexed = score_src("for (int i = 0; i < n; i++) s += f(a[i]);");
        let scalar = score_src("for (int i = 0; i < n; i++) s += f(x);");
        // f(a[i]) is 3 + 2 + 1, f(x) is 1 + 1
        assert!((indexed.raw_score - scalar.raw_score - 4.0).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_class_monotone(a in -100.0f64..200.0, b in -100.0f64..200.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(ComplexityScore::from_raw(lo).class <= ComplexityScore::from_raw(hi).class);
        }
    }
}
