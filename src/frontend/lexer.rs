//! Lexer for C++ loop fragments.
//!
//! The lexer never fails. Anything it does not understand becomes an
//! [`TokenKind::Unknown`] token, unterminated comments run to end of input and
//! unterminated literals run to end of line. Whitespace and comments are
//! skipped, but every token keeps its byte span, so slicing the source between
//! two tokens reproduces the original text exactly.

use crate::frontend::token::{Token, TokenKind, MULTI_CHAR_OPS};
use crate::utils::location::{SourceLocation, Span};
use std::iter::Peekable;
use std::str::Chars;
use unicode_xid::UnicodeXID;

/// A lexer for tokenizing source code.
pub struct Lexer<'a> {
    /// The source text
    source: &'a str,
    /// Character iterator
    chars: Peekable<Chars<'a>>,
    /// Current byte offset
    offset: usize,
    /// Current line number (1-indexed)
    line: usize,
    /// Current column number (1-indexed)
    column: usize,
    /// Start of current token
    token_start: SourceLocation,
    /// Only whitespace seen since the last newline
    at_line_start: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().peekable(),
            offset: 0,
            line: 1,
            column: 1,
            token_start: SourceLocation::start(),
            at_line_start: true,
        }
    }

    fn current_location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column, self.offset)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.source[self.offset..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
            self.at_line_start = true;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn advance_while(&mut self, pred: impl Fn(char) -> bool) {
        while self.peek().map(&pred).unwrap_or(false) {
            self.advance();
        }
    }

    /// Skip whitespace and comments.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_next() == Some('/') => {
                    self.advance_while(|c| c != '\n');
                }
                Some('/') if self.peek_next() == Some('*') => {
                    self.advance();
                    self.advance();
                    loop {
                        match self.advance() {
                            Some('*') if self.peek() == Some('/') => {
                                self.advance();
                                break;
                            }
                            None => break,
                            _ => {}
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        let span = Span::from_locations(self.token_start, self.current_location());
        Token::new(kind, span, span.slice(self.source).to_string())
    }

    fn scan_number(&mut self) -> Token {
        let start = self.token_start.offset;
        let hex = self.source[start..].starts_with("0x") || self.source[start..].starts_with("0X");
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '\'' => {
                    let exponent = if hex { matches!(c, 'p' | 'P') } else { matches!(c, 'e' | 'E') };
                    self.advance();
                    if exponent && matches!(self.peek(), Some('+') | Some('-')) {
                        self.advance();
                    }
                }
                _ => break,
            }
        }

        let text = &self.source[start..self.offset];
        let is_float = text.contains('.')
            || (!hex && (text.contains('e') || text.contains('E') || text.ends_with(|c: char| c == 'f' || c == 'F')))
            || (hex && (text.contains('p') || text.contains('P')));
        if is_float {
            self.make_token(TokenKind::Float)
        } else {
            self.make_token(TokenKind::Integer)
        }
    }

    fn scan_identifier(&mut self) -> Token {
        self.advance_while(|c| c.is_xid_continue() || c == '_');
        let lexeme = &self.source[self.token_start.offset..self.offset];
        let kind = TokenKind::keyword(lexeme).unwrap_or(TokenKind::Identifier);
        self.make_token(kind)
    }

    /// Scan a quoted literal; the opening quote is already consumed.
    fn scan_quoted(&mut self, quote: char, kind: TokenKind) -> Token {
        loop {
            match self.peek() {
                Some('\\') => {
                    self.advance();
                    if self.peek() != Some('\n') {
                        self.advance();
                    }
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\n') | None => break,
                Some(_) => {
                    self.advance();
                }
            }
        }
        self.make_token(kind)
    }

    fn scan_preprocessor(&mut self) -> Token {
        loop {
            match self.peek() {
                Some('\\') if self.peek_next() == Some('\n') => {
                    self.advance();
                    self.advance();
                }
                Some('\n') | None => break,
                Some(_) => {
                    self.advance();
                }
            }
        }
        self.make_token(TokenKind::Preprocessor)
    }

    fn scan_punctuation(&mut self, c: char) -> Token {
        let rest = &self.source[self.token_start.offset..];
        if let Some(op) = MULTI_CHAR_OPS.iter().find(|op| rest.starts_with(**op)) {
            for _ in 1..op.len() {
                self.advance();
            }
            return self.make_token(TokenKind::Operator);
        }
        let kind = match c {
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '+' | '-' | '*' | '/' | '%' | '=' | '<' | '>' | '!' | '&' | '|' | '^' | '~' | '?'
            | ':' | '.' | '#' => TokenKind::Operator,
            _ => TokenKind::Unknown,
        };
        self.make_token(kind)
    }

    /// Scan the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Option<Token> {
        self.skip_trivia();
        self.token_start = self.current_location();
        let line_start = self.at_line_start;
        let c = self.advance()?;
        self.at_line_start = false;

        let token = match c {
            '#' if line_start => self.scan_preprocessor(),
            '"' => self.scan_quoted('"', TokenKind::String),
            '\'' => self.scan_quoted('\'', TokenKind::Char),
            c if c.is_ascii_digit() => self.scan_number(),
            '.' if self.peek().map(|n| n.is_ascii_digit()).unwrap_or(false) => self.scan_number(),
            c if c.is_xid_start() || c == '_' => self.scan_identifier(),
            c => self.scan_punctuation(c),
        };
        Some(token)
    }

    /// Collect all tokens into a vector.
    pub fn tokenize(self) -> Vec<Token> {
        self.collect()
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

/// Tokenize `source`.
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).tokenize()
}
