//! Variable classification for OpenMP data-sharing clauses.
//!
//! Every identifier referenced in a loop body lands in exactly one of
//! `shared`, `private` or `reduction`:
//!
//! - loop control variables and anything declared inside the block are private
//! - subscripted identifiers are shared (there is no alias analysis)
//! - scalars only ever updated by a self-accumulating pattern are reductions
//! - other scalars written in the body are private
//! - scalars that are only read are shared
//!
//! Identifiers that appear only in the outer loop header (such as the bound
//! `n` in `i < n`) are not referenced by the body and are not classified.

use crate::analysis::access::loop_index_names;
use crate::frontend::structure::{self, Statement};
use crate::frontend::token::{Token, TokenKind};
use crate::frontend::{LoopBlock, LoopTokens};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Reduction operator of an OpenMP `reduction` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReductionOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `min`
    Min,
    /// `max`
    Max,
}

impl ReductionOp {
    /// Operator spelling inside `reduction(op: ...)`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReductionOp::Add => "+",
            ReductionOp::Sub => "-",
            ReductionOp::Mul => "*",
            ReductionOp::BitAnd => "&",
            ReductionOp::BitOr => "|",
            ReductionOp::BitXor => "^",
            ReductionOp::Min => "min",
            ReductionOp::Max => "max",
        }
    }

    fn from_binary(op: &str) -> Option<Self> {
        match op {
            "+" => Some(ReductionOp::Add),
            "-" => Some(ReductionOp::Sub),
            "*" => Some(ReductionOp::Mul),
            "&" => Some(ReductionOp::BitAnd),
            "|" => Some(ReductionOp::BitOr),
            "^" => Some(ReductionOp::BitXor),
            _ => None,
        }
    }

    fn from_compound(op: &str) -> Option<Self> {
        Self::from_binary(op.strip_suffix('=')?)
    }
}

impl fmt::Display for ReductionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data-sharing classification of one loop block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableClassification {
    /// Shared across threads
    pub shared: BTreeSet<String>,
    /// One copy per thread
    pub private: BTreeSet<String>,
    /// Combined across threads with the given operator
    pub reduction: BTreeMap<String, ReductionOp>,
    /// Identifiers accessed with a subscript
    pub indexed: BTreeSet<String>,
    /// Identifiers declared inside the block, header included
    pub declared: BTreeSet<String>,
}

impl VariableClassification {
    /// Every classified identifier.
    pub fn referenced(&self) -> BTreeSet<&str> {
        self.shared
            .iter()
            .chain(self.private.iter())
            .chain(self.reduction.keys())
            .map(String::as_str)
            .collect()
    }

    /// Whether `shared`, `private` and `reduction` have no name in common.
    pub fn is_disjoint(&self) -> bool {
        let total = self.shared.len() + self.private.len() + self.reduction.len();
        self.referenced().len() == total
    }

    /// Private names to list in a clause. Block-scoped names are omitted.
    pub fn private_clause(&self) -> Vec<&str> {
        self.private
            .iter()
            .filter(|n| !self.declared.contains(*n))
            .map(String::as_str)
            .collect()
    }

    /// Shared names to list in a clause. Block-scoped names are omitted.
    pub fn shared_clause(&self) -> Vec<&str> {
        self.shared
            .iter()
            .filter(|n| !self.declared.contains(*n))
            .map(String::as_str)
            .collect()
    }

    /// Reduction names grouped by operator.
    pub fn reduction_clauses(&self) -> BTreeMap<ReductionOp, Vec<&str>> {
        let mut groups: BTreeMap<ReductionOp, Vec<&str>> = BTreeMap::new();
        for (name, op) in &self.reduction {
            if !self.declared.contains(name) {
                groups.entry(*op).or_default().push(name);
            }
        }
        groups
    }
}

/// How a statement writes a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteKind {
    /// `v = e` with no accumulation pattern
    Plain,
    /// Accumulation such as `v += e` or `v = max(v, e)`
    Reduction(ReductionOp),
    /// A compound update with no OpenMP reduction (`/=`, `<<=`, ...)
    Update,
}

/// The first top-level assignment in a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Assignment {
    /// Index of the target identifier
    pub target: usize,
    /// Index of the assignment operator
    pub op: usize,
    /// Whether the target carries subscripts
    pub indexed: bool,
}

/// Locate the first top-level assignment in `toks`.
pub(crate) fn find_assignment(toks: &[Token]) -> Option<Assignment> {
    let mut depth = 0i32;
    let op = toks.iter().position(|t| {
        match t.kind {
            TokenKind::LeftParen | TokenKind::LeftBracket => depth += 1,
            TokenKind::RightParen | TokenKind::RightBracket => depth -= 1,
            _ => {}
        }
        depth == 0 && t.is_assignment()
    })?;

    // Walk back over trailing subscripts to the target name.
    let mut k = op.checked_sub(1)?;
    let mut indexed = false;
    while toks[k].kind == TokenKind::RightBracket {
        let mut d = 0i32;
        loop {
            match toks[k].kind {
                TokenKind::RightBracket => d += 1,
                TokenKind::LeftBracket => d -= 1,
                _ => {}
            }
            if d == 0 {
                break;
            }
            k = k.checked_sub(1)?;
        }
        indexed = true;
        k = k.checked_sub(1)?;
    }
    (toks[k].kind == TokenKind::Identifier).then_some(Assignment { target: k, op, indexed })
}

/// Classify the write performed by an assignment.
pub(crate) fn write_kind(toks: &[Token], asg: &Assignment) -> WriteKind {
    let op = toks[asg.op].lexeme.as_str();
    if op != "=" {
        return match ReductionOp::from_compound(op) {
            Some(r) => WriteKind::Reduction(r),
            None => WriteKind::Update,
        };
    }
    if asg.indexed {
        return WriteKind::Plain;
    }

    let name = toks[asg.target].lexeme.as_str();
    let rhs: Vec<&str> = toks[asg.op + 1..].iter().map(|t| t.lexeme.as_str()).collect();
    let rhs = match rhs.as_slice() {
        ["std", "::", rest @ ..] => rest,
        all => all,
    };
    match rhs {
        [v, op, _, ..] if *v == name => match ReductionOp::from_binary(op) {
            Some(r) => WriteKind::Reduction(r),
            None => WriteKind::Plain,
        },
        ["min", "(", v, ",", ..] if *v == name => WriteKind::Reduction(ReductionOp::Min),
        ["max", "(", v, ",", ..] if *v == name => WriteKind::Reduction(ReductionOp::Max),
        _ => WriteKind::Plain,
    }
}

const NOT_VARIABLES: &[&str] = &["cin", "cout", "cerr", "clog", "endl", "NULL", "std"];

fn at_statement_start(tokens: &[Token], k: usize) -> bool {
    match k.checked_sub(1).and_then(|p| tokens.get(p)) {
        None => true,
        Some(prev) => matches!(
            prev.kind,
            TokenKind::Semicolon
                | TokenKind::LeftBrace
                | TokenKind::RightBrace
                | TokenKind::LeftParen
                | TokenKind::Else
                | TokenKind::Do
        ),
    }
}

/// Names declared in `tokens`, plus identifiers used as type names.
fn declarations(tokens: &[Token]) -> (BTreeSet<String>, BTreeSet<String>) {
    let mut declared = BTreeSet::new();
    let mut type_names = BTreeSet::new();
    let mut expect_declarator = false;
    let mut decl_depth: Option<i32> = None;
    let mut depth = 0i32;

    for (k, tok) in tokens.iter().enumerate() {
        match tok.kind {
            TokenKind::Type => {
                if !expect_declarator && at_statement_start(tokens, k) {
                    expect_declarator = true;
                    decl_depth = Some(depth);
                }
            }
            TokenKind::Identifier => {
                let next_is_ident = tokens
                    .get(k + 1)
                    .map(|t| t.kind == TokenKind::Identifier)
                    .unwrap_or(false);
                if expect_declarator {
                    if next_is_ident {
                        // `const myint x`: the identifier is part of the type.
                        type_names.insert(tok.lexeme.clone());
                    } else {
                        declared.insert(tok.lexeme.clone());
                        expect_declarator = false;
                    }
                } else if next_is_ident && at_statement_start(tokens, k) {
                    type_names.insert(tok.lexeme.clone());
                    expect_declarator = true;
                    decl_depth = Some(depth);
                }
            }
            TokenKind::Operator if expect_declarator && matches!(tok.lexeme.as_str(), "*" | "&" | "&&") => {}
            TokenKind::Comma => {
                if decl_depth == Some(depth) {
                    expect_declarator = true;
                }
            }
            TokenKind::Semicolon => {
                expect_declarator = false;
                decl_depth = None;
            }
            TokenKind::LeftParen | TokenKind::LeftBracket | TokenKind::LeftBrace => {
                depth += 1;
                expect_declarator = false;
            }
            TokenKind::RightParen | TokenKind::RightBracket | TokenKind::RightBrace => {
                depth -= 1;
                if decl_depth.map(|d| depth < d).unwrap_or(false) {
                    decl_depth = None;
                }
                expect_declarator = false;
            }
            _ => expect_declarator = false,
        }
    }
    (declared, type_names)
}

/// Whether the identifier at `k` names a variable (not a callee, member,
/// qualifier or type).
fn is_variable(tokens: &[Token], k: usize, type_names: &BTreeSet<String>) -> bool {
    let tok = &tokens[k];
    if tok.kind != TokenKind::Identifier
        || NOT_VARIABLES.contains(&tok.lexeme.as_str())
        || type_names.contains(&tok.lexeme)
    {
        return false;
    }
    let next = tokens.get(k + 1);
    let prev = k.checked_sub(1).and_then(|p| tokens.get(p));
    let callee = next.map(|t| t.kind == TokenKind::LeftParen).unwrap_or(false);
    let qualifier = next.map(|t| t.is_op("::")).unwrap_or(false);
    let member = prev
        .map(|t| t.is_op(".") || t.is_op("->") || t.is_op("::"))
        .unwrap_or(false);
    !(callee || qualifier || member)
}

/// Writes to scalars and indexed names, per statement.
fn collect_writes(body: &[Token], stmts: &[Statement]) -> BTreeMap<String, Vec<WriteKind>> {
    let mut writes: BTreeMap<String, Vec<WriteKind>> = BTreeMap::new();
    for stmt in stmts {
        let toks = stmt.tokens(body);
        if let Some(asg) = find_assignment(toks) {
            writes
                .entry(toks[asg.target].lexeme.clone())
                .or_default()
                .push(write_kind(toks, &asg));
        }
        for (k, tok) in toks.iter().enumerate() {
            if !tok.is_step() {
                continue;
            }
            let kind = if tok.lexeme == "++" {
                WriteKind::Reduction(ReductionOp::Add)
            } else {
                WriteKind::Reduction(ReductionOp::Sub)
            };
            let before = k.checked_sub(1).and_then(|p| toks.get(p));
            let after = toks.get(k + 1);
            let target = match (before, after) {
                (Some(b), _) if b.kind == TokenKind::Identifier => Some(b),
                (_, Some(a)) if a.kind == TokenKind::Identifier => Some(a),
                _ => None,
            };
            if let Some(t) = target {
                writes.entry(t.lexeme.clone()).or_default().push(kind);
            }
        }
    }
    writes
}

/// Classify every identifier referenced by the body of `block`.
pub fn classify(block: &LoopBlock) -> VariableClassification {
    let all_tokens = block.tokens();
    let (declared, type_names) = declarations(&all_tokens);
    let control = loop_index_names(block);

    let lt = LoopTokens::new(block);
    let body: &[Token] = match &lt {
        Some(lt) => lt.body(),
        None => &all_tokens,
    };
    let stmts = structure::statements(body);
    let writes = collect_writes(body, &stmts);

    let mut scalars = BTreeSet::new();
    let mut indexed = BTreeSet::new();
    for k in 0..body.len() {
        if !is_variable(body, k, &type_names) {
            continue;
        }
        let name = body[k].lexeme.clone();
        if body.get(k + 1).map(|t| t.kind == TokenKind::LeftBracket).unwrap_or(false) {
            indexed.insert(name);
        } else {
            scalars.insert(name);
        }
    }

    let mut result = VariableClassification {
        indexed: indexed.clone(),
        declared: declared.clone(),
        ..Default::default()
    };

    for name in &control {
        result.private.insert(name.clone());
    }
    for name in indexed.iter().chain(scalars.iter()) {
        if result.private.contains(name) || result.shared.contains(name) || result.reduction.contains_key(name) {
            continue;
        }
        if declared.contains(name) {
            result.private.insert(name.clone());
        } else if indexed.contains(name) {
            result.shared.insert(name.clone());
        } else {
            match writes.get(name).map(Vec::as_slice) {
                None | Some([]) => {
                    result.shared.insert(name.clone());
                }
                Some([WriteKind::Reduction(op), rest @ ..])
                    if rest.iter().all(|w| *w == WriteKind::Reduction(*op)) =>
                {
                    result.reduction.insert(name.clone(), *op);
                }
                Some(_) => {
                    result.private.insert(name.clone());
                }
            }
        }
    }
    result
}
