//! Conservative loop-carried dependence screening.
//!
//! The check is syntactic and deliberately over-approximate: a loop is
//! declared unsafe on the first statement that shows any of
//!
//! - a subscript of the form `v ± k` with a nonzero literal `k`
//! - an indexed access where no subscript mentions a loop index
//! - a second plain assignment to the same scalar
//!
//! Loops rejected here may well be parallel; loops accepted here have none of
//! the patterns above.

use crate::analysis::variables::find_assignment;
use crate::frontend::structure::{self, subscripts};
use crate::frontend::token::{Token, TokenKind};
use crate::frontend::{LoopBlock, LoopTokens};
use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Pattern that made a loop unsafe to parallelize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hazard {
    /// `a[i - 1]`, `a[j + 2]`
    OffsetIndex,
    /// `a[0]`, `a[k]` with `k` not a loop index
    UnrelatedIndex,
    /// A scalar assigned with `=` more than once
    ScalarRewrite,
}

impl fmt::Display for Hazard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hazard::OffsetIndex => write!(f, "offset subscript"),
            Hazard::UnrelatedIndex => write!(f, "subscript independent of loop indices"),
            Hazard::ScalarRewrite => write!(f, "scalar reassigned"),
        }
    }
}

/// Result of dependence screening.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum DependencyVerdict {
    /// No hazardous pattern found
    Safe,
    /// First hazardous statement
    Unsafe {
        /// Line of the statement, relative to the block (first line is 1)
        line: usize,
        /// Statement text
        statement: String,
        /// What was found
        hazard: Hazard,
    },
}

impl DependencyVerdict {
    /// No hazard was found.
    pub fn is_safe(&self) -> bool {
        matches!(self, DependencyVerdict::Safe)
    }

    /// Line of the offending statement, if any.
    pub fn conflict_line(&self) -> Option<usize> {
        match self {
            DependencyVerdict::Safe => None,
            DependencyVerdict::Unsafe { line, .. } => Some(*line),
        }
    }
}

fn nonzero_int(tok: &Token) -> bool {
    tok.int_value().map(|v| v != 0).unwrap_or(false)
}

/// `v ± k` or `k + v` inside a subscript.
fn has_offset(group: &[Token]) -> bool {
    group.windows(3).any(|w| {
        let additive = w[1].is_op("+") || w[1].is_op("-");
        (w[0].kind == TokenKind::Identifier && additive && nonzero_int(&w[2]))
            || (nonzero_int(&w[0]) && w[1].is_op("+") && w[2].kind == TokenKind::Identifier)
    })
}

fn mentions_index(group: &[Token], index_names: &HashSet<&str>) -> bool {
    group
        .iter()
        .any(|t| t.kind == TokenKind::Identifier && index_names.contains(t.lexeme.as_str()))
}

/// Subscript groups of the access whose name is at `k`, as token slices.
fn access_groups(toks: &[Token], k: usize) -> Vec<&[Token]> {
    subscripts(toks, k + 1)
        .into_iter()
        .map(|(open, close)| &toks[open + 1..close])
        .collect()
}

fn is_access(toks: &[Token], k: usize) -> bool {
    toks[k].kind == TokenKind::Identifier
        && toks.get(k + 1).map(|t| t.kind == TokenKind::LeftBracket).unwrap_or(false)
}

fn unrelated(groups: &[&[Token]], index_names: &HashSet<&str>) -> bool {
    !groups.is_empty() && !groups.iter().any(|g| mentions_index(g, index_names))
}

/// Screen the body of `block` for loop-carried dependences.
///
/// `index_names` are the control variables of every loop in the block.
pub fn analyze_dependencies(block: &LoopBlock, index_names: &[String]) -> DependencyVerdict {
    let index_names: HashSet<&str> = index_names.iter().map(String::as_str).collect();
    let all_tokens;
    let lt = LoopTokens::new(block);
    let body: &[Token] = match &lt {
        Some(lt) => lt.body(),
        None => {
            all_tokens = block.tokens();
            &all_tokens
        }
    };

    let mut assigned: HashSet<&str> = HashSet::new();
    for stmt in structure::statements(body) {
        let toks = stmt.tokens(body);
        let unsafe_at = |hazard: Hazard| {
            let statement = stmt.text(body, &block.text).to_string();
            trace!("line {}: {} in `{}`", stmt.line, hazard, statement);
            DependencyVerdict::Unsafe {
                line: stmt.line,
                statement,
                hazard,
            }
        };

        let offset = (0..toks.len())
            .filter(|&k| is_access(toks, k))
            .any(|k| access_groups(toks, k).iter().any(|g| has_offset(g)));
        if offset {
            return unsafe_at(Hazard::OffsetIndex);
        }

        let Some(asg) = find_assignment(toks) else {
            continue;
        };
        if asg.indexed && unrelated(&access_groups(toks, asg.target), &index_names) {
            return unsafe_at(Hazard::UnrelatedIndex);
        }
        let rhs_unrelated = (asg.op + 1..toks.len())
            .filter(|&k| is_access(toks, k))
            .any(|k| unrelated(&access_groups(toks, k), &index_names));
        if rhs_unrelated {
            return unsafe_at(Hazard::UnrelatedIndex);
        }

        let target = toks[asg.target].lexeme.as_str();
        let plain = !asg.indexed && toks[asg.op].lexeme == "=";
        if plain && !index_names.contains(target) && !assigned.insert(target) {
            return unsafe_at(Hazard::ScalarRewrite);
        }
    }
    DependencyVerdict::Safe
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::access::loop_index_names;

    fn verdict(src: &str) -> DependencyVerdict {
        let block = LoopBlock::from_text(src).unwrap();
        let names = loop_index_names(&block);
        analyze_dependencies(&block, &names)
    }

    #[test]
    fn test_elementwise_is_safe() {
        assert!(verdict("for (int i = 0; i < n; i++) { c[i] = a[i] + b[i]; }").is_safe());
    }

    #[test]
    fn test_offset_subscript() {
        let v = verdict("for (int i = 1; i < n; i++) {\n  a[i] = a[i - 1] + 1;\n}");
        assert_eq!(v.conflict_line(), Some(2));
        match v {
            DependencyVerdict::Unsafe { hazard, statement, .. } => {
                assert_eq!(hazard, Hazard::OffsetIndex);
                assert_eq!(statement, "a[i] = a[i - 1] + 1");
            }
            DependencyVerdict::Safe => panic!("expected unsafe"),
        }
    }

    #[test]
    fn test_zero_offset_is_fine() {
        assert!(verdict("for (int i = 0; i < n; i++) a[i + 0] = b[i];").is_safe());
    }

    #[test]
    fn test_unrelated_subscripts() {
        let v = verdict("for (int i = 0; i < n; i++) a[0] = b[i];");
        assert!(matches!(v, DependencyVerdict::Unsafe { hazard: Hazard::UnrelatedIndex, .. }));
        let v = verdict("for (int i = 0; i < n; i++) a[i] = b[k];");
        assert!(matches!(v, DependencyVerdict::Unsafe { hazard: Hazard::UnrelatedIndex, .. }));
    }

    #[test]
    fn test_matrix_multiply_is_safe() {
        let src = "for (int i = 0; i < n; i++)\n  for (int j = 0; j < n; j++)\n    for (int k = 0; k < n; k++)\n      c[i][j] += a[i][k] * b[k][j];";
        assert!(verdict(src).is_safe());
    }

    #[test]
    fn test_scalar_rewrite_line() {
        let v = verdict("for (int i = 0; i < n; i++) {\n  t = a[i];\n  b[i] = t;\n  t = c[i];\n}");
        assert_eq!(v.conflict_line(), Some(4));
        assert!(matches!(v, DependencyVerdict::Unsafe { hazard: Hazard::ScalarRewrite, .. }));
    }

    #[test]
    fn test_repeated_inner_headers_are_not_rewrites() {
        let src = "for (int i = 0; i < n; i++) { for (j = 0; j < m; j++) a[i][j] = 0; for (j = 0; j < m; j++) b[i][j] = 1; }";
        assert!(verdict(src).is_safe());
    }

    #[test]
    fn test_accumulation_is_safe() {
        assert!(verdict("for (int i = 0; i < n; i++) s += a[i];").is_safe());
    }

    #[test]
    fn test_serialized_tag() {
        let json = serde_json::to_string(&DependencyVerdict::Safe).unwrap();
        assert_eq!(json, r#"{"verdict":"safe"}"#);
    }
}
