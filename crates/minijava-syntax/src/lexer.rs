//! Hand-written scanner for the MiniJava subset.
//!
//! Skips whitespace, `// line` and `/* block */` comments (block comments
//! terminate on the first `*/`). Identifiers are checked against the keyword
//! table; `System` followed immediately by `.out.println` collapses into the
//! single `KwPrintln` token. Integer literals are decimal and must fit in a
//! signed 64-bit value; overflow emits an error and yields `Invalid`.
//!
//! Lexing errors are reported through the shared [`DiagnosticSink`] and never
//! stop the scanner: it always terminates with exactly one `Eof` token.

use std::collections::VecDeque;

use crate::diagnostics::{Diagnostic, DiagnosticSink, SourceLocation, SourceSpan};
use crate::source::CharStream;
use crate::token::{keyword_kind, Token, TokenKind};

const PRINTLN_SUFFIX: &str = ".out.println";

pub struct Lexer<'a, 'd> {
    source: &'a str,
    chars: CharStream<'a>,
    sink: &'d mut dyn DiagnosticSink,
    lookahead: VecDeque<Token<'a>>,
    errors: usize,
}

impl<'a, 'd> Lexer<'a, 'd> {
    pub fn new(source: &'a str, sink: &'d mut dyn DiagnosticSink) -> Self {
        Lexer {
            source,
            chars: CharStream::new(source),
            sink,
            lookahead: VecDeque::new(),
            errors: 0,
        }
    }

    /// Consume and return the next token.
    pub fn next_token(&mut self) -> Token<'a> {
        match self.lookahead.pop_front() {
            Some(token) => token,
            None => self.lex_one(),
        }
    }

    /// Look `n` tokens ahead without consuming.
    pub fn peek(&mut self, n: usize) -> Token<'a> {
        while self.lookahead.len() <= n {
            let token = self.lex_one();
            self.lookahead.push_back(token);
        }
        self.lookahead[n]
    }

    pub fn eof(&mut self) -> bool {
        self.peek(0).kind == TokenKind::Eof
    }

    /// Number of lexical errors reported so far.
    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub(crate) fn into_sink(self) -> &'d mut dyn DiagnosticSink {
        self.sink
    }

    fn lex_one(&mut self) -> Token<'a> {
        self.skip_trivia();

        let begin = self.chars.location();
        if self.chars.eof() {
            return self.token(TokenKind::Eof, begin);
        }

        let ch = self.chars.peek(0);
        if ch.is_ascii_alphabetic() || ch == '_' {
            return self.lex_identifier(begin);
        }
        if ch.is_ascii_digit() {
            return self.lex_integer(begin);
        }

        self.chars.get();
        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LCurly,
            '}' => TokenKind::RCurly,
            '[' => TokenKind::LSquare,
            ']' => TokenKind::RSquare,
            ';' => TokenKind::Semi,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            '!' => TokenKind::Bang,
            '=' => {
                if self.chars.peek(0) == '=' {
                    self.chars.get();
                    TokenKind::EqEq
                } else {
                    TokenKind::Assign
                }
            }
            '&' => {
                if self.chars.peek(0) == '&' {
                    self.chars.get();
                    TokenKind::AndAnd
                } else {
                    return self.invalid(begin, format!("Unrecognized character '{ch}'."));
                }
            }
            '|' => {
                if self.chars.peek(0) == '|' {
                    self.chars.get();
                    TokenKind::OrOr
                } else {
                    return self.invalid(begin, format!("Unrecognized character '{ch}'."));
                }
            }
            _ => return self.invalid(begin, format!("Unrecognized character '{ch}'.")),
        };

        self.token(kind, begin)
    }

    fn lex_identifier(&mut self, begin: SourceLocation) -> Token<'a> {
        loop {
            let c = self.chars.peek(0);
            if !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            self.chars.get();
        }

        let text = self.lexeme(begin);
        if text == "System" && self.matches_println_suffix() {
            for _ in 0..PRINTLN_SUFFIX.len() {
                self.chars.get();
            }
            return self.token(TokenKind::KwPrintln, begin);
        }

        let kind = keyword_kind(text).unwrap_or(TokenKind::Identifier);
        self.token(kind, begin)
    }

    fn matches_println_suffix(&self) -> bool {
        PRINTLN_SUFFIX
            .chars()
            .enumerate()
            .all(|(i, expected)| self.chars.peek(i) == expected)
    }

    fn lex_integer(&mut self, begin: SourceLocation) -> Token<'a> {
        let mut value: Option<i64> = Some(0);
        while self.chars.peek(0).is_ascii_digit() {
            let digit = self.chars.get() as i64 - '0' as i64;
            value = value
                .and_then(|v| v.checked_mul(10))
                .and_then(|v| v.checked_add(digit));
        }

        match value {
            Some(v) => {
                let mut token = self.token(TokenKind::IntLiteral, begin);
                token.value = Some(v);
                token
            }
            None => {
                let lexeme = self.lexeme(begin);
                let message =
                    format!("Error: (line {}) Integer literal '{lexeme}' is too large.", begin.line);
                self.report(begin, message)
            }
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            let c = self.chars.peek(0);
            if c.is_ascii_whitespace() {
                self.chars.get();
                continue;
            }
            if c == '/' && self.chars.peek(1) == '/' {
                while !self.chars.eof() && self.chars.peek(0) != '\n' {
                    self.chars.get();
                }
                continue;
            }
            if c == '/' && self.chars.peek(1) == '*' {
                let begin = self.chars.location();
                self.chars.get();
                self.chars.get();
                loop {
                    if self.chars.eof() {
                        self.emit_error(begin, format!(
                            "Error: (line {}) Unterminated block comment.",
                            begin.line
                        ));
                        break;
                    }
                    if self.chars.peek(0) == '*' && self.chars.peek(1) == '/' {
                        self.chars.get();
                        self.chars.get();
                        break;
                    }
                    self.chars.get();
                }
                continue;
            }
            break;
        }
    }

    fn token(&self, kind: TokenKind, begin: SourceLocation) -> Token<'a> {
        Token {
            kind,
            lexeme: self.lexeme(begin),
            span: SourceSpan {
                begin,
                end: self.chars.location(),
            },
            value: None,
        }
    }

    fn lexeme(&self, begin: SourceLocation) -> &'a str {
        // Offsets are byte positions; a non-ASCII byte can land between char
        // boundaries, in which case the (Invalid) token gets no lexeme.
        self.source
            .get(begin.offset..self.chars.location().offset)
            .unwrap_or("")
    }

    fn invalid(&mut self, begin: SourceLocation, detail: String) -> Token<'a> {
        let message = format!("Error: (line {}) {detail}", begin.line);
        self.report(begin, message)
    }

    fn report(&mut self, begin: SourceLocation, message: String) -> Token<'a> {
        self.emit_error(begin, message);
        self.token(TokenKind::Invalid, begin)
    }

    fn emit_error(&mut self, begin: SourceLocation, message: String) {
        self.errors += 1;
        self.sink.emit(Diagnostic::error(
            message,
            SourceSpan {
                begin,
                end: self.chars.location(),
            },
        ));
    }
}
