//! Loop header decomposition.
//!
//! Recognizes the canonical shape `for (T i = start; i <cmp> end; <step>)`.
//! Anything else is reported as `None` and callers leave the loop alone.

use crate::frontend::lexer::tokenize;
use crate::frontend::structure::split_top_level;
use crate::frontend::token::{Token, TokenKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three clauses of a `for` header, as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopHeader {
    /// Initialization clause
    pub init: String,
    /// Loop condition
    pub condition: String,
    /// Increment clause
    pub increment: String,
}

impl LoopHeader {
    /// Split the text between the header parentheses into its clauses.
    pub fn parse(inner: &str) -> Option<LoopHeader> {
        let tokens = tokenize(inner);
        let parts = split_top_level(&tokens, 0..tokens.len());
        if parts.len() != 3 {
            return None;
        }
        let clause = |range: std::ops::Range<usize>| -> String {
            match (tokens.get(range.start), range.end.checked_sub(1).and_then(|e| tokens.get(e))) {
                (Some(first), Some(last)) if !range.is_empty() => {
                    inner[first.span.start..last.span.end].to_string()
                }
                _ => String::new(),
            }
        };
        Some(LoopHeader {
            init: clause(parts[0].clone()),
            condition: clause(parts[1].clone()),
            increment: clause(parts[2].clone()),
        })
    }

    /// Name of the control variable, from the init clause or else the condition.
    pub fn control_var(&self) -> Option<String> {
        let init = tokenize(&self.init);
        if let Some(eq) = init.iter().position(|t| t.is_op("=")) {
            if let Some(var) = eq.checked_sub(1).and_then(|k| init.get(k)) {
                if var.kind == TokenKind::Identifier {
                    return Some(var.lexeme.clone());
                }
            }
        }
        tokenize(&self.condition)
            .into_iter()
            .find(|t| t.kind == TokenKind::Identifier)
            .map(|t| t.lexeme)
    }
}

/// Comparison in a canonical loop condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
    /// `!=`
    NotEqual,
}

impl Comparator {
    /// Parse an operator lexeme.
    pub fn from_op(op: &str) -> Option<Comparator> {
        match op {
            "<" => Some(Comparator::Less),
            "<=" => Some(Comparator::LessEqual),
            ">" => Some(Comparator::Greater),
            ">=" => Some(Comparator::GreaterEqual),
            "!=" => Some(Comparator::NotEqual),
            _ => None,
        }
    }

    /// The operator as written in C++.
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Less => "<",
            Comparator::LessEqual => "<=",
            Comparator::Greater => ">",
            Comparator::GreaterEqual => ">=",
            Comparator::NotEqual => "!=",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Increment clause of a canonical loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    /// `i++` or `++i`
    Increment,
    /// `i--` or `--i`
    Decrement,
    /// `i += k` or `i = i + k`
    AddAssign(String),
    /// `i -= k` or `i = i - k`
    SubAssign(String),
}

impl Step {
    /// Stride of exactly +1.
    pub fn is_unit_increment(&self) -> bool {
        match self {
            Step::Increment => true,
            Step::AddAssign(k) => k.trim() == "1",
            _ => false,
        }
    }
}

/// A loop of the form `for (T i = start; i <cmp> end; <step>)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalLoop {
    /// Declared type of the control variable, if declared in the header
    pub declared_type: Option<String>,
    /// Control variable
    pub var: String,
    /// Initial value expression
    pub start: String,
    /// Comparison in the condition
    pub comparator: Comparator,
    /// Bound expression
    pub end: String,
    /// Increment clause
    pub step: Step,
}

impl CanonicalLoop {
    /// Recognize a canonical loop from the text between header parentheses.
    pub fn parse(inner: &str) -> Option<CanonicalLoop> {
        Self::from_header(&LoopHeader::parse(inner)?)
    }

    /// Recognize a canonical loop from decomposed header clauses.
    pub fn from_header(header: &LoopHeader) -> Option<CanonicalLoop> {
        // init: [type...] var = start
        let init = tokenize(&header.init);
        let eq = init.iter().position(|t| t.is_op("="))?;
        let var_tok = init.get(eq.checked_sub(1)?)?;
        if var_tok.kind != TokenKind::Identifier {
            return None;
        }
        let var = var_tok.lexeme.clone();
        let declared_type = match init.first() {
            Some(first) if eq >= 2 => Some(header.init[first.span.start..init[eq - 2].span.end].to_string()),
            _ => None,
        };
        let start = rest_text(&header.init, &init, eq + 1)?;
        if init[eq + 1..].iter().any(|t| t.kind == TokenKind::Comma) {
            return None;
        }

        // condition: var <cmp> end
        let cond = tokenize(&header.condition);
        if !cond.first()?.is_ident(&var) {
            return None;
        }
        let cmp_tok = cond.get(1)?;
        if cmp_tok.kind != TokenKind::Operator {
            return None;
        }
        let comparator = Comparator::from_op(&cmp_tok.lexeme)?;
        let end = rest_text(&header.condition, &cond, 2)?;
        if cond[2..].iter().any(|t| t.is_op("&&") || t.is_op("||")) {
            return None;
        }

        let step = parse_step(&header.increment, &var)?;

        Some(CanonicalLoop {
            declared_type,
            var,
            start,
            comparator,
            end,
            step,
        })
    }

    /// Ascending loop with stride 1 and `<` or `<=`.
    pub fn is_unit_ascending(&self) -> bool {
        self.step.is_unit_increment()
            && matches!(self.comparator, Comparator::Less | Comparator::LessEqual)
    }

    /// Exclusive upper bound of a unit ascending loop.
    pub fn exclusive_end(&self) -> Option<String> {
        match self.comparator {
            Comparator::Less => Some(self.end.clone()),
            Comparator::LessEqual => Some(offset_expr(&self.end, 1)),
            _ => None,
        }
    }

    /// A value of the control variable that makes the condition false.
    pub fn terminal_value(&self) -> String {
        match self.comparator {
            Comparator::Less | Comparator::Greater | Comparator::NotEqual => self.end.clone(),
            Comparator::LessEqual => offset_expr(&self.end, 1),
            Comparator::GreaterEqual => offset_expr(&self.end, -1),
        }
    }

    /// Number of iterations when both bounds are integer literals.
    pub fn literal_trip_count(&self) -> Option<i64> {
        let start: i64 = self.start.trim().parse().ok()?;
        let end: i64 = self.end.trim().parse().ok()?;
        let span = match self.comparator {
            Comparator::Less | Comparator::NotEqual => end.checked_sub(start)?,
            Comparator::LessEqual => end.checked_sub(start)?.checked_add(1)?,
            Comparator::Greater => start.checked_sub(end)?,
            Comparator::GreaterEqual => start.checked_sub(end)?.checked_add(1)?,
        };
        Some(span.max(0))
    }

    /// Type to use when re-declaring the control variable.
    pub fn type_or_int(&self) -> &str {
        self.declared_type.as_deref().unwrap_or("int")
    }
}

fn rest_text(text: &str, tokens: &[Token], from: usize) -> Option<String> {
    let first = tokens.get(from)?;
    let last = tokens.last()?;
    Some(text[first.span.start..last.span.end].to_string())
}

fn parse_step(increment: &str, var: &str) -> Option<Step> {
    let toks = tokenize(increment);
    let lex: Vec<&str> = toks.iter().map(|t| t.lexeme.as_str()).collect();
    match lex.as_slice() {
        [v, "++"] | ["++", v] if *v == var => Some(Step::Increment),
        [v, "--"] | ["--", v] if *v == var => Some(Step::Decrement),
        [v, "+=", ..] if *v == var => Some(Step::AddAssign(rest_text(increment, &toks, 2)?)),
        [v, "-=", ..] if *v == var => Some(Step::SubAssign(rest_text(increment, &toks, 2)?)),
        [v, "=", w, "+", ..] if *v == var && *w == var => {
            Some(Step::AddAssign(rest_text(increment, &toks, 4)?))
        }
        [v, "=", w, "-", ..] if *v == var && *w == var => {
            Some(Step::SubAssign(rest_text(increment, &toks, 4)?))
        }
        _ => None,
    }
}

/// Whether `expr` is a single identifier or number.
pub fn is_atom(expr: &str) -> bool {
    let expr = expr.trim();
    !expr.is_empty() && expr.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

/// Wrap `expr` in parentheses unless it is atomic.
pub fn parenthesize(expr: &str) -> String {
    if is_atom(expr) {
        expr.trim().to_string()
    } else {
        format!("({})", expr.trim())
    }
}

/// `expr + delta`, folded when `expr` is an integer literal and the sum fits.
pub fn offset_expr(expr: &str, delta: i64) -> String {
    if let Some(v) = expr.trim().parse::<i64>().ok().and_then(|v| v.checked_add(delta)) {
        return v.to_string();
    }
    match delta {
        0 => expr.trim().to_string(),
        d if d > 0 => format!("{} + {}", parenthesize(expr), d),
        d => format!("{} - {}", parenthesize(expr), d.unsigned_abs()),
    }
}

/// `a - b`, folded when both are integer literals and the difference fits.
pub fn difference_expr(a: &str, b: &str) -> String {
    match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
        (Ok(x), Ok(y)) if x.checked_sub(y).is_some() => (x - y).to_string(),
        _ => format!("{} - {}", parenthesize(a), parenthesize(b)),
    }
}
