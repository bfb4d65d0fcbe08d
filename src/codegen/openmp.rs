//! OpenMP directive generation.

use crate::analysis::dependence::DependencyVerdict;
use crate::analysis::variables::VariableClassification;
use crate::analysis::has_io;
use crate::codegen::threads::ThreadPlan;
use crate::frontend::structure::{loops_and_switches, statement_end};
use crate::frontend::token::TokenKind;
use crate::frontend::{CanonicalLoop, LoopBlock, LoopHeader, LoopTokens};
use crate::utils::errors::TransformError;
use crate::utils::pretty::format_list;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of every non-parallelizable report text.
pub const NOT_PARALLELIZABLE: &str = "Not Parallelizable";

/// Shared variable carrying an early-exit return value.
pub const EXIT_SENTINEL: &str = "loop_exit_value";

/// Shared flag set when an iteration takes an early return.
pub const EXIT_FLAG: &str = "loop_exited";

static SCHEDULE_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"schedule\s*\([^)]*\)").expect("valid regex"));
static NUM_THREADS_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*num_threads\s*\([^)]*\)").expect("valid regex"));

/// Why a loop was left serial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum NonParallelReason {
    /// The loop reads or writes a stream
    Io,
    /// A loop-carried dependence was found at this block-relative line
    Dependency {
        /// Block-relative line of the offending statement
        line: usize,
    },
}

impl fmt::Display for NonParallelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NonParallelReason::Io => write!(f, "{}: loop performs I/O", NOT_PARALLELIZABLE),
            NonParallelReason::Dependency { line } => {
                write!(f, "{}: dependency at line {}", NOT_PARALLELIZABLE, line)
            }
        }
    }
}

/// Output of [`annotate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Annotation {
    /// Directive plus the loop it applies to
    Parallel {
        /// The `#pragma omp` line
        directive: String,
        /// Directive followed by the loop
        text: String,
    },
    /// The loop stays serial
    NotParallelizable(NonParallelReason),
}

impl Annotation {
    /// Report text: the annotated loop or the reason it was left alone.
    pub fn text(&self) -> String {
        match self {
            Annotation::Parallel { text, .. } => text.clone(),
            Annotation::NotParallelizable(reason) => reason.to_string(),
        }
    }

    /// Whether a directive was emitted.
    pub fn is_parallel(&self) -> bool {
        matches!(self, Annotation::Parallel { .. })
    }
}

/// `#pragma omp parallel for` with data-sharing clauses for `vars`.
pub fn directive(vars: &VariableClassification, plan: &ThreadPlan) -> String {
    let mut out = String::from("#pragma omp parallel for");
    let private = vars.private_clause();
    if !private.is_empty() {
        out.push_str(&format!(" private({})", format_list(private, ", ")));
    }
    let shared = vars.shared_clause();
    if !shared.is_empty() {
        out.push_str(&format!(" shared({})", format_list(shared, ", ")));
    }
    for (op, names) in vars.reduction_clauses() {
        out.push_str(&format!(" reduction({}: {})", op, format_list(names, ", ")));
    }
    out.push_str(&format!(" schedule({})", plan.schedule));
    out
}

/// Annotate `block` for parallel execution, or say why it cannot be.
pub fn annotate(
    block: &LoopBlock,
    vars: &VariableClassification,
    verdict: &DependencyVerdict,
    plan: &ThreadPlan,
) -> Annotation {
    if let Some(line) = verdict.conflict_line() {
        return Annotation::NotParallelizable(NonParallelReason::Dependency { line });
    }
    if has_io(block) {
        return Annotation::NotParallelizable(NonParallelReason::Io);
    }
    let directive = directive(vars, plan);
    let text = format!("{}\n{}", directive, block.text);
    Annotation::Parallel { directive, text }
}

/// Switch the first directive in `text` to a dynamic schedule with
/// `threads` threads. Non-parallelizable text is returned unchanged.
pub fn balance(text: &str, threads: usize) -> String {
    if text.starts_with(NOT_PARALLELIZABLE) {
        return text.to_string();
    }
    let clause = format!("schedule(dynamic) num_threads({})", threads);
    let mut done = false;
    let lines: Vec<String> = text
        .lines()
        .map(|line| {
            if done || !line.trim_start().starts_with("#pragma omp parallel for") {
                return line.to_string();
            }
            done = true;
            let line = NUM_THREADS_CLAUSE.replace_all(line, "");
            if SCHEDULE_CLAUSE.is_match(&line) {
                SCHEDULE_CLAUSE.replace(&line, clause.as_str()).into_owned()
            } else {
                format!("{} {}", line.trim_end(), clause)
            }
        })
        .collect();
    let mut out = lines.join("\n");
    if text.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Rewrite a loop containing `break` or `return` so that it can run under
/// a parallel directive.
///
/// Outer-level `break` forces the control variable to its terminal value.
/// `return` also raises a shared flag checked after the loop; `return x`
/// first stores `x` in a shared sentinel, which the guarded return yields.
pub fn rewrite_break_return(block: &LoopBlock) -> Result<String, TransformError> {
    let header = LoopHeader::parse(block.header_inner()).ok_or_else(|| {
        TransformError::format(block.header(), "expected init; condition; increment")
    })?;
    let var = header
        .control_var()
        .ok_or_else(|| TransformError::format(block.header(), "no control variable"))?;
    let canonical = CanonicalLoop::from_header(&header)
        .ok_or_else(|| TransformError::format(block.header(), "condition is not canonical"))?;
    let terminal = canonical.terminal_value();

    let lt = LoopTokens::new(block)
        .ok_or_else(|| TransformError::format(block.header(), "malformed header"))?;
    let body = lt.body();
    let inner_scopes = loops_and_switches(body);

    let mut edits: Vec<(usize, usize, String)> = Vec::new();
    let mut returns = false;
    let mut sentinel_type: Option<&str> = None;
    for (k, tok) in body.iter().enumerate() {
        match tok.kind {
            TokenKind::Break if !inner_scopes.iter().any(|r| r.contains(&k)) => {
                let end = statement_end(body, k);
                edits.push((tok.span.start, body[end].span.end, format!("{{ {} = {}; }}", var, terminal)));
            }
            TokenKind::Return => {
                returns = true;
                let end = statement_end(body, k);
                let valued = end > k + 1 && body[end].kind == TokenKind::Semicolon;
                let store = if valued {
                    if sentinel_type.is_none() {
                        let float = end == k + 2 && body[k + 1].kind == TokenKind::Float;
                        sentinel_type = Some(if float { "double" } else { "int" });
                    }
                    let expr = block.text[body[k + 1].span.start..body[end - 1].span.end].trim();
                    format!("{} = {}; ", EXIT_SENTINEL, expr)
                } else {
                    String::new()
                };
                edits.push((
                    tok.span.start,
                    body[end].span.end,
                    format!("{{ {}{} = true; {} = {}; }}", store, EXIT_FLAG, var, terminal),
                ));
            }
            _ => {}
        }
    }

    let mut loop_text = String::with_capacity(block.text.len());
    let mut cursor = 0;
    for (start, end, replacement) in &edits {
        if *start < cursor {
            continue;
        }
        loop_text.push_str(&block.text[cursor..*start]);
        loop_text.push_str(replacement);
        cursor = *end;
    }
    loop_text.push_str(&block.text[cursor..]);

    let mut out = String::new();
    let mut shared = Vec::new();
    if let Some(ty) = sentinel_type {
        out.push_str(&format!("{} {} = 0;\n", ty, EXIT_SENTINEL));
        shared.push(EXIT_SENTINEL);
    }
    if returns {
        out.push_str(&format!("bool {} = false;\n", EXIT_FLAG));
        shared.push(EXIT_FLAG);
    }
    out.push_str("#pragma omp parallel for");
    if !shared.is_empty() {
        out.push_str(&format!(" shared({})", format_list(shared, ", ")));
    }
    out.push('\n');
    out.push_str(&loop_text);
    match (returns, sentinel_type) {
        (true, Some(_)) => out.push_str(&format!("\nif ({}) return {};", EXIT_FLAG, EXIT_SENTINEL)),
        (true, None) => out.push_str(&format!("\nif ({}) return;", EXIT_FLAG)),
        _ => {}
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{classify, screen};
    use crate::codegen::threads::{choose_thread_plan, Schedule};

    fn block(src: &str) -> LoopBlock {
        LoopBlock::from_text(src).unwrap()
    }

    fn plan() -> ThreadPlan {
        ThreadPlan {
            thread_count: 4,
            schedule: Schedule::Static,
        }
    }

    #[test]
    fn test_elementwise_directive() {
        let b = block("for (int i = 0; i < n; i++) { c[i] = a[i] + b[i]; }");
        let ann = annotate(&b, &classify(&b), &screen(&b), &plan());
        match &ann {
            Annotation::Parallel { directive, text } => {
                assert_eq!(directive, "#pragma omp parallel for shared(a, b, c) schedule(static)");
                assert!(text.ends_with(&b.text));
            }
            other => panic!("expected parallel, got {:?}", other),
        }
    }

    #[test]
    fn test_reduction_and_private_clauses() {
        let b = block("for (i = 0; i < n; i++) { t = a[i] * 2; s += t; }");
        let d = directive(&classify(&b), &plan());
        assert_eq!(d, "#pragma omp parallel for private(i, t) shared(a) reduction(+: s) schedule(static)");
    }

    #[test]
    fn test_not_parallelizable() {
        let b = block("for (int i = 1; i < n; i++) { a[i] = a[i-1] + 1; }");
        let ann = annotate(&b, &classify(&b), &screen(&b), &plan());
        assert_eq!(ann, Annotation::NotParallelizable(NonParallelReason::Dependency { line: 1 }));
        assert!(ann.text().starts_with(NOT_PARALLELIZABLE));
        assert!(ann.text().contains("line 1"));

        let b = block("for (int i = 0; i < n; i++) cin >> a[i];");
        let ann = annotate(&b, &classify(&b), &screen(&b), &plan());
        assert_eq!(ann, Annotation::NotParallelizable(NonParallelReason::Io));
    }

    #[test]
    fn test_balance() {
        let text = "#pragma omp parallel for shared(a) schedule(static)\nfor (i = 0; i < n; i++) a[i] = 0;";
        let balanced = balance(text, 6);
        assert!(balanced.starts_with("#pragma omp parallel for shared(a) schedule(dynamic) num_threads(6)\n"));
        assert_eq!(balance(&balanced, 6), balanced);

        let no_schedule = "#pragma omp parallel for shared(x)\nfor (;;) {}";
        assert!(balance(no_schedule, 2).starts_with("#pragma omp parallel for shared(x) schedule(dynamic) num_threads(2)"));

        let serial = "Not Parallelizable: loop performs I/O";
        assert_eq!(balance(serial, 8), serial);
    }

    #[test]
    fn test_rewrite_return() {
        let b = block("for (int i = 0; i < n; i++) {\n  if (a[i] == key) return i;\n}");
        let out = rewrite_break_return(&b).unwrap();
        assert!(out.starts_with(
            "int loop_exit_value = 0;\nbool loop_exited = false;\n#pragma omp parallel for shared(loop_exit_value, loop_exited)\n"
        ));
        assert!(out.contains("if (a[i] == key) { loop_exit_value = i; loop_exited = true; i = n; }"));
        assert!(out.ends_with("\nif (loop_exited) return loop_exit_value;"));
    }

    #[test]
    fn test_rewrite_returns_minus_one() {
        let b = block("for (int i = 0; i < n; i++) if (a[i] < 0) return -1;");
        let out = rewrite_break_return(&b).unwrap();
        assert!(out.contains("{ loop_exit_value = -1; loop_exited = true; i = n; }"));
        assert!(out.ends_with("\nif (loop_exited) return loop_exit_value;"));
    }

    #[test]
    fn test_rewrite_void_return() {
        let b = block("for (int i = 0; i < n; i++) {\n  if (a[i] == key) return;\n  a[i] = 0;\n}");
        let out = rewrite_break_return(&b).unwrap();
        assert!(out.starts_with("bool loop_exited = false;\n#pragma omp parallel for shared(loop_exited)\n"));
        assert!(out.contains("if (a[i] == key) { loop_exited = true; i = n; }"));
        assert!(out.ends_with("\nif (loop_exited) return;"));
        assert!(!out.contains(EXIT_SENTINEL));
    }

    #[test]
    fn test_rewrite_break_only() {
        let b = block("for (int i = 0; i <= n; i++) {\n  for (int j = 0; j < m; j++) if (x) break;\n  if (a[i] < 0) break;\n}");
        let out = rewrite_break_return(&b).unwrap();
        assert!(out.starts_with("#pragma omp parallel for\nfor"));
        // The inner break belongs to the inner loop.
        assert!(out.contains("if (x) break;"));
        assert!(out.contains("if (a[i] < 0) { i = n + 1; }"));
        assert!(!out.contains("return"));
    }

    #[test]
    fn test_rewrite_float_sentinel() {
        let b = block("for (int i = 0; i < n; i++) if (v[i] < 0) return 0.5;");
        let out = rewrite_break_return(&b).unwrap();
        assert!(out.starts_with("double loop_exit_value = 0;"));
    }

    #[test]
    fn test_rewrite_rejects_odd_headers() {
        let b = block("for (i = 0; n > i; i++) if (a[i]) break;");
        assert!(matches!(rewrite_break_return(&b), Err(TransformError::Format { .. })));
        let b = block("for (;;) { break; }");
        assert!(rewrite_break_return(&b).is_err());
    }

    #[test]
    fn test_plan_feeds_schedule() {
        let b = block("for (int i = 0; i < n; i++) a[i] = b[i];");
        let p = choose_thread_plan(3, 8, &b).balanced();
        assert!(directive(&classify(&b), &p).ends_with("schedule(dynamic)"));
    }
}
