//! Array access shape and I/O inspection.

use crate::frontend::structure::{loop_headers, subscripts};
use crate::frontend::token::{Token, TokenKind};
use crate::frontend::{CanonicalLoop, LoopBlock, LoopHeader};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest subscript rank used anywhere in a loop block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Dimensionality {
    /// No array accesses
    Scalar,
    /// `a[i]`
    OneD,
    /// `a[i][j]`
    TwoD,
    /// `a[i][j][k]`
    ThreeD,
    /// Four or more subscripts
    ND(usize),
}

impl Dimensionality {
    /// From a subscript count.
    pub fn from_rank(rank: usize) -> Self {
        match rank {
            0 => Dimensionality::Scalar,
            1 => Dimensionality::OneD,
            2 => Dimensionality::TwoD,
            3 => Dimensionality::ThreeD,
            n => Dimensionality::ND(n),
        }
    }

    /// Number of subscripts.
    pub fn rank(&self) -> usize {
        match self {
            Dimensionality::Scalar => 0,
            Dimensionality::OneD => 1,
            Dimensionality::TwoD => 2,
            Dimensionality::ThreeD => 3,
            Dimensionality::ND(n) => *n,
        }
    }

    /// Whether the block touches arrays at all.
    pub fn is_scalar(&self) -> bool {
        matches!(self, Dimensionality::Scalar)
    }
}

impl fmt::Display for Dimensionality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimensionality::Scalar => write!(f, "scalar"),
            n => write!(f, "{}D", n.rank()),
        }
    }
}

/// Subscript rank of the deepest array access in `tokens`.
pub fn dimensionality_of(tokens: &[Token]) -> Dimensionality {
    let rank = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| t.kind == TokenKind::Identifier)
        .map(|(k, _)| subscripts(tokens, k + 1).len())
        .max()
        .unwrap_or(0);
    Dimensionality::from_rank(rank)
}

/// Subscript rank of the deepest array access in `block`.
pub fn dimensionality(block: &LoopBlock) -> Dimensionality {
    dimensionality_of(&block.tokens())
}

const STREAMS: &[&str] = &["cin", "cout", "cerr", "clog"];
const IO_CALLS: &[&str] = &[
    "printf", "scanf", "fprintf", "fscanf", "getline", "puts", "gets", "getchar", "putchar",
];

/// Whether `tokens` contain stream I/O or a C stdio call.
pub fn has_io_tokens(tokens: &[Token]) -> bool {
    tokens.iter().enumerate().any(|(k, t)| {
        if t.kind != TokenKind::Identifier {
            return false;
        }
        let next = tokens.get(k + 1);
        let stream = STREAMS.contains(&t.lexeme.as_str())
            && next.map(|n| n.is_op("<<") || n.is_op(">>")).unwrap_or(false);
        let call = IO_CALLS.contains(&t.lexeme.as_str())
            && next.map(|n| n.kind == TokenKind::LeftParen).unwrap_or(false);
        stream || call
    })
}

/// Whether `block` performs I/O.
pub fn has_io(block: &LoopBlock) -> bool {
    has_io_tokens(&block.tokens())
}

/// Control variables of every loop header in `block`, outermost first.
pub fn loop_index_names(block: &LoopBlock) -> Vec<String> {
    let tokens = block.tokens();
    let mut names = Vec::new();
    for site in loop_headers(&tokens) {
        let inner = &block.text[tokens[site.open].span.end..tokens[site.close].span.start];
        let name = LoopHeader::parse(inner).and_then(|h| h.control_var());
        if let Some(name) = name {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

/// Trip count of the outer loop when its bounds are literals.
pub fn literal_trip_count(block: &LoopBlock) -> Option<i64> {
    CanonicalLoop::parse(block.header_inner())?.literal_trip_count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(src: &str) -> LoopBlock {
        LoopBlock::from_text(src).unwrap()
    }

    #[test]
    fn test_dimensionality() {
        assert_eq!(dimensionality(&block("for (i = 0; i < n; i++) s += i;")), Dimensionality::Scalar);
        assert_eq!(dimensionality(&block("for (i = 0; i < n; i++) a[i] = 0;")), Dimensionality::OneD);
        assert_eq!(
            dimensionality(&block("for (i = 0; i < n; i++) for (j = 0; j < n; j++) a[i][j] = b[j];")),
            Dimensionality::TwoD
        );
        assert_eq!(
            dimensionality(&block("for (i = 0; i < n; i++) t[i][j][k][l] = 0;")),
            Dimensionality::ND(4)
        );
        // Nested subscripts are not extra dimensions.
        assert_eq!(dimensionality(&block("for (i = 0; i < n; i++) a[idx[i]] = 0;")), Dimensionality::OneD);
    }

    #[test]
    fn test_display() {
        assert_eq!(Dimensionality::Scalar.to_string(), "scalar");
        assert_eq!(Dimensionality::ThreeD.to_string(), "3D");
    }

    #[test]
    fn test_io_detection() {
        assert!(has_io(&block("for (i = 0; i < n; i++) cin >> a[i];")));
        assert!(has_io(&block("for (i = 0; i < n; i++) std::cout << a[i];")));
        assert!(has_io(&block("for (i = 0; i < n; i++) { printf(\"%d\", a[i]); }")));
        assert!(!has_io(&block("for (i = 0; i < n; i++) a[i] = b[i] << 2;")));
    }

    #[test]
    fn test_index_names() {
        let b = block("for (int i = 0; i < n; i++) { for (int j = 0; j < m; j++) c[i][j] = 0; for (j = 0; j < m; j++) d[j] = 1; }");
        assert_eq!(loop_index_names(&b), vec!["i".to_string(), "j".to_string()]);
    }

    #[test]
    fn test_literal_trip_count() {
        assert_eq!(literal_trip_count(&block("for (int i = 0; i < 50; i++) a[i] = 0;")), Some(50));
        assert_eq!(literal_trip_count(&block("for (int i = 0; i < n; i++) a[i] = 0;")), None);
    }
}
