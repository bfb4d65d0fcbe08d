//! Loop normalization.
//!
//! ```text
//! for (int i = lo; i <= hi; i++) a[i] = 0;
//! ```
//! becomes
//! ```text
//! for (int i_norm = 0; i_norm < (hi - lo) + 1; i_norm++) a[(lo + i_norm)] = 0;
//! ```

use crate::frontend::header::{difference_expr, offset_expr, parenthesize};
use crate::frontend::token::{Token, TokenKind};
use crate::frontend::{CanonicalLoop, Comparator, LoopBlock, LoopTokens};
use crate::transform::LoopTransform;
use log::trace;

/// Suffix of the normalized control variable.
pub const NORM_SUFFIX: &str = "_norm";

/// Whether `tokens` assign to or step `var`.
fn writes_var(tokens: &[Token], var: &str) -> bool {
    tokens.iter().enumerate().any(|(k, t)| {
        if !t.is_ident(var) || !is_reference(tokens, k) {
            return false;
        }
        let next = tokens.get(k + 1);
        let prev = k.checked_sub(1).and_then(|p| tokens.get(p));
        next.map(|n| n.is_assignment() || n.is_step()).unwrap_or(false)
            || prev.map(|p| p.is_step()).unwrap_or(false)
    })
}

fn is_reference(tokens: &[Token], k: usize) -> bool {
    let prev = k.checked_sub(1).and_then(|p| tokens.get(p));
    let next = tokens.get(k + 1);
    let member = prev
        .map(|p| p.is_op(".") || p.is_op("->") || p.is_op("::"))
        .unwrap_or(false);
    let call = next.map(|n| n.kind == TokenKind::LeftParen).unwrap_or(false);
    !member && !call
}

/// Rewrite `block` to start at zero with a unit stride.
///
/// Loops that already start at `0`, loops with a non-unit or descending
/// step, and loops whose body writes the control variable come back
/// unchanged.
pub fn normalize(block: &LoopBlock) -> String {
    let unchanged = || block.text.clone();

    let Some(canonical) = CanonicalLoop::parse(block.header_inner()) else {
        return unchanged();
    };
    if !canonical.is_unit_ascending() || canonical.start.trim() == "0" {
        return unchanged();
    }
    let Some(lt) = LoopTokens::new(block) else {
        return unchanged();
    };
    let body = lt.body();
    if writes_var(body, &canonical.var) {
        trace!("{} is written in the body; not normalizing", canonical.var);
        return unchanged();
    }

    let bound = match canonical.comparator {
        Comparator::Less => difference_expr(&canonical.end, &canonical.start),
        Comparator::LessEqual => {
            offset_expr(&difference_expr(&canonical.end, &canonical.start), 1)
        }
        _ => return unchanged(),
    };
    let norm = format!("{}{}", canonical.var, NORM_SUFFIX);
    let substitute = format!("({} + {})", parenthesize(&canonical.start), norm);

    let mut out = format!(
        "for ({} {} = 0; {} < {}; {}++)",
        canonical.type_or_int(),
        norm,
        norm,
        bound,
        norm
    );
    let mut cursor = block.header().len();
    for (k, tok) in body.iter().enumerate() {
        if tok.is_ident(&canonical.var) && is_reference(body, k) {
            out.push_str(&block.text[cursor..tok.span.start]);
            out.push_str(&substitute);
            cursor = tok.span.end;
        }
    }
    out.push_str(&block.text[cursor..]);
    out
}

/// [`normalize`] as a [`LoopTransform`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl LoopTransform for Normalizer {
    fn apply(&self, block: &LoopBlock) -> String {
        normalize(block)
    }

    fn name(&self) -> &str {
        "normalize"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(src: &str) -> String {
        normalize(&LoopBlock::from_text(src).unwrap())
    }

    #[test]
    fn test_shift_to_zero() {
        assert_eq!(
            norm("for (int i = 1; i < n; i++) { a[i] = b[i] + i; }"),
            "for (int i_norm = 0; i_norm < n - 1; i_norm++) { a[(1 + i_norm)] = b[(1 + i_norm)] + (1 + i_norm); }"
        );
    }

    #[test]
    fn test_inclusive_bound() {
        assert_eq!(
            norm("for (long k = lo; k <= hi; ++k) s += v[k];"),
            "for (long k_norm = 0; k_norm < (hi - lo) + 1; k_norm++) s += v[(lo + k_norm)];"
        );
        assert_eq!(
            norm("for (int i = 2; i <= 10; i++) a[i] = 0;"),
            "for (int i_norm = 0; i_norm < 9; i_norm++) a[(2 + i_norm)] = 0;"
        );
    }

    #[test]
    fn test_already_normalized_is_identity() {
        let src = "for (int i = 0; i < n; i++) a[i] = 0;";
        assert_eq!(norm(src), src);
        let once = norm("for (int i = 3; i < n; i++) a[i] = i;");
        assert_eq!(norm(&once), once);
    }

    #[test]
    fn test_unsupported_shapes_unchanged() {
        for src in [
            "for (int i = 1; i < n; i += 2) a[i] = 0;",
            "for (int i = n; i > 0; i--) a[i] = 0;",
            "for (int i = 1; i != n; i++) a[i] = 0;",
            "for (int i = 1; i < n; i++) { if (a[i]) i++; }",
            "for (auto x : v) s += x;\nfor (;;) {}",
        ] {
            if let Some(block) = LoopBlock::from_text(src) {
                assert_eq!(normalize(&block), block.text, "{}", src);
            }
        }
    }

    #[test]
    fn test_members_untouched() {
        assert_eq!(
            norm("for (int i = 1; i < n; i++) p.i = q[i];"),
            "for (int i_norm = 0; i_norm < n - 1; i_norm++) p.i = q[(1 + i_norm)];"
        );
    }

    #[test]
    fn test_as_transform() {
        let block = LoopBlock::from_text("for (int i = 1; i < n; i++) a[i] = 0;").unwrap();
        assert_eq!(Normalizer.apply(&block), normalize(&block));
        assert_eq!(Normalizer.name(), "normalize");
    }
}
