//! Token types for C++ loop fragments.

use crate::utils::location::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A token in the source code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The source span
    pub span: Span,
    /// The lexeme (raw text)
    pub lexeme: String,
}

impl Token {
    /// Create a new token.
    pub fn new(kind: TokenKind, span: Span, lexeme: String) -> Self {
        Self { kind, span, lexeme }
    }

    /// Line of the first character (1-indexed).
    pub fn line(&self) -> usize {
        self.span.line
    }

    /// Check if this is an identifier with the given name.
    pub fn is_ident(&self, name: &str) -> bool {
        self.kind == TokenKind::Identifier && self.lexeme == name
    }

    /// Check if this is the operator `op`.
    pub fn is_op(&self, op: &str) -> bool {
        self.kind == TokenKind::Operator && self.lexeme == op
    }

    /// `=` or any compound assignment.
    pub fn is_assignment(&self) -> bool {
        self.kind == TokenKind::Operator && ASSIGNMENT_OPS.contains(&self.lexeme.as_str())
    }

    /// Compound assignment such as `+=`.
    pub fn is_compound_assignment(&self) -> bool {
        self.is_assignment() && self.lexeme != "="
    }

    /// `+ - * / %`
    pub fn is_arithmetic(&self) -> bool {
        self.kind == TokenKind::Operator
            && matches!(self.lexeme.as_str(), "+" | "-" | "*" | "/" | "%")
    }

    /// `& | ^ ~ << >>`
    pub fn is_bitwise(&self) -> bool {
        self.kind == TokenKind::Operator
            && matches!(self.lexeme.as_str(), "&" | "|" | "^" | "~" | "<<" | ">>")
    }

    /// `++` or `--`
    pub fn is_step(&self) -> bool {
        self.kind == TokenKind::Operator && matches!(self.lexeme.as_str(), "++" | "--")
    }

    /// `< <= > >= != ==`
    pub fn is_comparison(&self) -> bool {
        self.kind == TokenKind::Operator
            && matches!(self.lexeme.as_str(), "<" | "<=" | ">" | ">=" | "!=" | "==")
    }

    /// Parses an integer literal, ignoring `u`/`l` suffixes.
    pub fn int_value(&self) -> Option<i64> {
        if self.kind != TokenKind::Integer {
            return None;
        }
        let digits = self.lexeme.trim_end_matches(|c: char| matches!(c, 'u' | 'U' | 'l' | 'L'));
        let digits = digits.replace('\'', "");
        if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
            i64::from_str_radix(hex, 16).ok()
        } else {
            digits.parse().ok()
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self.kind, self.lexeme)
    }
}

/// Assignment operators, plain and compound.
pub const ASSIGNMENT_OPS: &[&str] = &[
    "=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<=", ">>=",
];

/// Multi-character operators, longest first.
pub(crate) const MULTI_CHAR_OPS: &[&str] = &[
    "<<=", ">>=", "->*", "...", "::", "->", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "==", "!=", "<=", ">=", "&&", "||", "<<", ">>", ".*",
];

/// The kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    // Literals
    /// Integer literal
    Integer,
    /// Floating-point literal
    Float,
    /// String literal
    String,
    /// Character literal
    Char,

    /// Identifier (variable, function, type alias, ...)
    Identifier,

    // Statement keywords
    /// `for`
    For,
    /// `while`
    While,
    /// `do`
    Do,
    /// `if`
    If,
    /// `else`
    Else,
    /// `switch`
    Switch,
    /// `return`
    Return,
    /// `break`
    Break,
    /// `continue`
    Continue,

    /// Built-in type names and declaration specifiers
    Type,
    /// Any other reserved word
    Keyword,

    // Delimiters
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `,`
    Comma,
    /// `;`
    Semicolon,

    /// Any other punctuation; the lexeme tells which
    Operator,
    /// A whole `#...` line
    Preprocessor,
    /// Character the lexer does not understand
    Unknown,
}

impl TokenKind {
    /// Check if this is a reserved word of any sort.
    pub fn is_keyword(&self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            For | While | Do | If | Else | Switch | Return | Break | Continue | Type | Keyword
        )
    }

    /// Check if this is a literal.
    pub fn is_literal(&self) -> bool {
        matches!(self, TokenKind::Integer | TokenKind::Float | TokenKind::String | TokenKind::Char)
    }

    /// Get the kind for a reserved word.
    pub fn keyword(s: &str) -> Option<TokenKind> {
        use TokenKind::*;
        let kind = match s {
            "for" => For,
            "while" => While,
            "do" => Do,
            "if" => If,
            "else" => Else,
            "switch" => Switch,
            "return" => Return,
            "break" => Break,
            "continue" => Continue,
            "int" | "long" | "short" | "char" | "float" | "double" | "bool" | "void"
            | "unsigned" | "signed" | "auto" | "const" | "static" | "register"
            | "volatile" | "size_t" => Type,
            "case" | "default" | "goto" | "sizeof" | "new" | "delete" | "true" | "false"
            | "nullptr" | "this" | "struct" | "class" | "typedef" | "using"
            | "namespace" | "template" | "typename" | "static_cast" | "const_cast"
            | "reinterpret_cast" | "dynamic_cast" | "operator" | "inline" | "extern" => Keyword,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(TokenKind::keyword("for"), Some(TokenKind::For));
        assert_eq!(TokenKind::keyword("double"), Some(TokenKind::Type));
        assert_eq!(TokenKind::keyword("sizeof"), Some(TokenKind::Keyword));
        assert_eq!(TokenKind::keyword("foobar"), None);
    }

    #[test]
    fn test_operator_classes() {
        let tok = |s: &str| Token::new(TokenKind::Operator, Span::default(), s.to_string());
        assert!(tok("+=").is_assignment());
        assert!(tok("+=").is_compound_assignment());
        assert!(!tok("==").is_assignment());
        assert!(tok("<<").is_bitwise());
        assert!(tok("%").is_arithmetic());
        assert!(tok("--").is_step());
        assert!(tok("!=").is_comparison());
    }

    #[test]
    fn test_int_value() {
        let tok = |s: &str| Token::new(TokenKind::Integer, Span::default(), s.to_string());
        assert_eq!(tok("42").int_value(), Some(42));
        assert_eq!(tok("100000000LL").int_value(), Some(100_000_000));
        assert_eq!(tok("0x10").int_value(), Some(16));
    }
}
