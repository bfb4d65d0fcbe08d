//! Bracket-aware navigation over token slices.
//!
//! Everything downstream of the lexer (extraction, classification, dependence
//! checks, rewriting) agrees on statement boundaries because it all goes
//! through these helpers.

use crate::frontend::token::{Token, TokenKind};
use std::ops::{Range, RangeInclusive};

/// A statement inside a loop body, as a range of token indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Token indices, excluding the terminating `;`
    pub range: Range<usize>,
    /// Line of the first token
    pub line: usize,
}

impl Statement {
    /// Tokens of this statement.
    pub fn tokens<'t>(&self, tokens: &'t [Token]) -> &'t [Token] {
        &tokens[self.range.clone()]
    }

    /// Source text of this statement.
    pub fn text<'s>(&self, tokens: &[Token], source: &'s str) -> &'s str {
        let toks = self.tokens(tokens);
        match (toks.first(), toks.last()) {
            (Some(first), Some(last)) => source.get(first.span.start..last.span.end).unwrap_or(""),
            _ => "",
        }
    }
}

/// Location of a `for` header inside a token slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderSite {
    /// Index of the `for` keyword
    pub keyword: usize,
    /// Index of `(`
    pub open: usize,
    /// Index of the matching `)`
    pub close: usize,
}

fn closer(kind: TokenKind) -> Option<TokenKind> {
    match kind {
        TokenKind::LeftParen => Some(TokenKind::RightParen),
        TokenKind::LeftBracket => Some(TokenKind::RightBracket),
        TokenKind::LeftBrace => Some(TokenKind::RightBrace),
        _ => None,
    }
}

/// Index of the bracket closing the one at `open`.
pub fn matching(tokens: &[Token], open: usize) -> Option<usize> {
    let open_kind = tokens.get(open)?.kind;
    let close_kind = closer(open_kind)?;
    let mut depth = 0usize;
    for (k, tok) in tokens.iter().enumerate().skip(open) {
        if tok.kind == open_kind {
            depth += 1;
        } else if tok.kind == close_kind {
            depth -= 1;
            if depth == 0 {
                return Some(k);
            }
        }
    }
    None
}

/// Split `tokens[range]` on `;` that are not nested in brackets.
pub fn split_top_level(tokens: &[Token], range: Range<usize>) -> Vec<Range<usize>> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = range.start;
    for k in range.clone() {
        match tokens[k].kind {
            TokenKind::LeftParen | TokenKind::LeftBracket | TokenKind::LeftBrace => depth += 1,
            TokenKind::RightParen | TokenKind::RightBracket | TokenKind::RightBrace => depth -= 1,
            TokenKind::Semicolon if depth == 0 => {
                parts.push(start..k);
                start = k + 1;
            }
            _ => {}
        }
    }
    parts.push(start..range.end);
    parts
}

/// Header of a `for` loop whose keyword is at `keyword`.
///
/// Headers without two top-level `;` (range-based or malformed loops) are
/// rejected.
pub fn header_at(tokens: &[Token], keyword: usize) -> Option<HeaderSite> {
    if tokens.get(keyword)?.kind != TokenKind::For {
        return None;
    }
    let open = keyword + 1;
    if tokens.get(open)?.kind != TokenKind::LeftParen {
        return None;
    }
    let close = matching(tokens, open)?;
    if split_top_level(tokens, open + 1..close).len() < 3 {
        return None;
    }
    Some(HeaderSite { keyword, open, close })
}

/// Every well-formed `for` header in `tokens`, outermost first.
pub fn loop_headers(tokens: &[Token]) -> Vec<HeaderSite> {
    (0..tokens.len())
        .filter_map(|k| header_at(tokens, k))
        .collect()
}

/// Index of the last token of the loop whose keyword is at `keyword`.
pub fn loop_end(tokens: &[Token], keyword: usize) -> Option<usize> {
    let site = header_at(tokens, keyword)?;
    let body = site.close + 1;
    if body >= tokens.len() {
        return None;
    }
    Some(statement_end(tokens, body))
}

/// Index of the last token of the statement starting at `start`.
///
/// Unterminated statements run to the end of the slice.
pub fn statement_end(tokens: &[Token], start: usize) -> usize {
    let last = tokens.len().saturating_sub(1);
    let Some(tok) = tokens.get(start) else {
        return last;
    };

    match tok.kind {
        TokenKind::LeftBrace => matching(tokens, start).unwrap_or(last),
        TokenKind::Semicolon => start,
        TokenKind::For => loop_end(tokens, start).unwrap_or_else(|| semicolon_end(tokens, start)),
        TokenKind::While | TokenKind::Switch => guarded_end(tokens, start),
        TokenKind::If => {
            let end = guarded_end(tokens, start);
            match tokens.get(end + 1) {
                Some(next) if next.kind == TokenKind::Else => {
                    if end + 2 <= last {
                        statement_end(tokens, end + 2)
                    } else {
                        end + 1
                    }
                }
                _ => end,
            }
        }
        TokenKind::Do => {
            if start + 1 > last {
                return last;
            }
            let body_end = statement_end(tokens, start + 1);
            if body_end + 1 > last {
                return last;
            }
            semicolon_end(tokens, body_end + 1)
        }
        _ => semicolon_end(tokens, start),
    }
}

/// `keyword ( ... ) statement`
fn guarded_end(tokens: &[Token], start: usize) -> usize {
    let last = tokens.len().saturating_sub(1);
    match tokens.get(start + 1) {
        Some(t) if t.kind == TokenKind::LeftParen => match matching(tokens, start + 1) {
            Some(close) if close < last => statement_end(tokens, close + 1),
            Some(close) => close,
            None => last,
        },
        _ => semicolon_end(tokens, start),
    }
}

fn semicolon_end(tokens: &[Token], start: usize) -> usize {
    let mut depth = 0i32;
    for (k, tok) in tokens.iter().enumerate().skip(start) {
        match tok.kind {
            TokenKind::LeftParen | TokenKind::LeftBracket | TokenKind::LeftBrace => depth += 1,
            TokenKind::RightParen | TokenKind::RightBracket | TokenKind::RightBrace => {
                depth -= 1;
                if depth < 0 {
                    // Closed an enclosing block without a `;`.
                    return k.saturating_sub(1).max(start);
                }
            }
            TokenKind::Semicolon if depth == 0 => return k,
            _ => {}
        }
    }
    tokens.len().saturating_sub(1)
}

/// Split a token slice into statements.
///
/// Each clause of a `for` header is its own statement, as is the condition
/// of an `if`, `while` or `switch`. Braces only delimit.
pub fn statements(tokens: &[Token]) -> Vec<Statement> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    let mut depth = 0i32;
    let mut k = 0;

    let push = |out: &mut Vec<Statement>, range: Range<usize>| {
        if !range.is_empty() {
            out.push(Statement {
                line: tokens[range.start].line(),
                range,
            });
        }
    };

    while k < tokens.len() {
        let tok = &tokens[k];
        let paren_next = tokens.get(k + 1).map(|t| t.kind == TokenKind::LeftParen).unwrap_or(false);

        match tok.kind {
            TokenKind::For | TokenKind::If | TokenKind::While | TokenKind::Switch
                if depth == 0 && paren_next =>
            {
                if let Some(s) = start.take() {
                    push(&mut out, s..k);
                }
                let Some(close) = matching(tokens, k + 1) else {
                    start = Some(k);
                    k += 1;
                    continue;
                };
                if tok.kind == TokenKind::For {
                    for clause in split_top_level(tokens, k + 2..close) {
                        push(&mut out, clause);
                    }
                } else {
                    push(&mut out, k + 2..close);
                }
                k = close + 1;
                continue;
            }
            TokenKind::Else | TokenKind::Do | TokenKind::Preprocessor if depth == 0 => {
                if let Some(s) = start.take() {
                    push(&mut out, s..k);
                }
            }
            TokenKind::LeftBrace | TokenKind::RightBrace if depth == 0 => {
                if let Some(s) = start.take() {
                    push(&mut out, s..k);
                }
            }
            TokenKind::Semicolon if depth == 0 => {
                if let Some(s) = start.take() {
                    push(&mut out, s..k);
                }
            }
            TokenKind::LeftParen | TokenKind::LeftBracket | TokenKind::LeftBrace => {
                start.get_or_insert(k);
                depth += 1;
            }
            TokenKind::RightParen | TokenKind::RightBracket | TokenKind::RightBrace => {
                start.get_or_insert(k);
                depth = (depth - 1).max(0);
            }
            _ => {
                start.get_or_insert(k);
            }
        }
        k += 1;
    }
    if let Some(s) = start {
        push(&mut out, s..tokens.len());
    }
    out
}

/// Token ranges of every loop and `switch` statement in `tokens`.
pub fn loops_and_switches(tokens: &[Token]) -> Vec<RangeInclusive<usize>> {
    tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| {
            matches!(t.kind, TokenKind::For | TokenKind::While | TokenKind::Do | TokenKind::Switch)
        })
        .map(|(k, _)| k..=statement_end(tokens, k))
        .collect()
}

/// Consecutive `[...]` groups starting at `k`, as (open, close) index pairs.
pub fn subscripts(tokens: &[Token], mut k: usize) -> Vec<(usize, usize)> {
    let mut groups = Vec::new();
    while let Some(tok) = tokens.get(k) {
        if tok.kind != TokenKind::LeftBracket {
            break;
        }
        match matching(tokens, k) {
            Some(close) => {
                groups.push((k, close));
                k = close + 1;
            }
            None => break,
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::tokenize;

    fn texts(source: &str) -> Vec<String> {
        let tokens = tokenize(source);
        statements(&tokens)
            .iter()
            .map(|s| s.text(&tokens, source).to_string())
            .collect()
    }

    #[test]
    fn test_matching() {
        let tokens = tokenize("f(a[(1)], b) + 1");
        assert_eq!(matching(&tokens, 1), Some(10));
        assert_eq!(matching(&tokens, 3), Some(7));
        assert_eq!(matching(&tokens, 0), None);
    }

    #[test]
    fn test_header_requires_two_semicolons() {
        assert!(header_at(&tokenize("for (int i = 0; i < n; i++) x++;"), 0).is_some());
        assert!(header_at(&tokenize("for (auto x : v) x++;"), 0).is_none());
        assert!(header_at(&tokenize("for (;;) {}"), 0).is_some());
    }

    #[test]
    fn test_loop_end_single_statement() {
        let tokens = tokenize("for (i = 0; i < n; i++) a[i] = 0; b = 1;");
        let end = loop_end(&tokens, 0).unwrap();
        assert_eq!(tokens[end].kind, TokenKind::Semicolon);
        assert_eq!(tokens[end + 1].lexeme, "b");
    }

    #[test]
    fn test_loop_end_nested_unbraced() {
        let tokens = tokenize("for (i = 0; i < n; i++) for (j = 0; j < m; j++) if (x) a = 1; else a = 2; z;");
        let end = loop_end(&tokens, 0).unwrap();
        assert_eq!(tokens[end + 1].lexeme, "z");
    }

    #[test]
    fn test_loop_end_unterminated_braces() {
        let tokens = tokenize("for (i = 0; i < n; i++) { a[i] = 0;");
        assert_eq!(loop_end(&tokens, 0), Some(tokens.len() - 1));
    }

    #[test]
    fn test_statements_split_headers() {
        let got = texts("for (int j = 0; j < m; j++) { c[j] = 0; if (x > 0) y = 1; }");
        assert_eq!(got, vec!["int j = 0", "j < m", "j++", "c[j] = 0", "x > 0", "y = 1"]);
    }

    #[test]
    fn test_subscripts() {
        let tokens = tokenize("a[i][j + 1] = 0");
        let groups = subscripts(&tokens, 1);
        assert_eq!(groups, vec![(1, 3), (4, 8)]);
    }
}
