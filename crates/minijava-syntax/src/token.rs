//! Token kinds and the token record produced by the lexer.

use serde::{Deserialize, Serialize};

use crate::diagnostics::SourceSpan;

/// Every token kind in the language, including the compound
/// `System.out.println` keyword and the `Eof`/`Invalid` sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    Eof,
    Invalid,

    Identifier,
    IntLiteral,

    KwPublic,
    KwStatic,
    KwVoid,
    KwMain,
    KwString,
    KwInt,
    KwBoolean,
    KwIf,
    KwElse,
    KwWhile,
    KwPrintln,
    KwLength,
    KwTrue,
    KwFalse,
    KwThis,
    KwNew,
    KwReturn,
    KwClass,

    LParen,
    RParen,
    LCurly,
    RCurly,
    LSquare,
    RSquare,
    Semi,
    Comma,
    Dot,

    Plus,
    Minus,
    Star,
    Slash,
    Assign,
    EqEq,
    Lt,
    Gt,
    AndAnd,
    OrOr,
    Bang,
}

impl TokenKind {
    /// Name used in syntax-error messages.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Eof => "end of file",
            TokenKind::Invalid => "invalid token",
            TokenKind::Identifier => "ID",
            TokenKind::IntLiteral => "INT_LITERAL",
            TokenKind::KwPublic => "PUBLIC",
            TokenKind::KwStatic => "STATIC",
            TokenKind::KwVoid => "VOID",
            TokenKind::KwMain => "MAIN",
            TokenKind::KwString => "STRING",
            TokenKind::KwInt => "INT",
            TokenKind::KwBoolean => "BOOL",
            TokenKind::KwIf => "IF",
            TokenKind::KwElse => "ELSE",
            TokenKind::KwWhile => "WHILE",
            TokenKind::KwPrintln => "PRINTLN",
            TokenKind::KwLength => "LENGTH",
            TokenKind::KwTrue => "TRUE",
            TokenKind::KwFalse => "FALSE",
            TokenKind::KwThis => "THIS",
            TokenKind::KwNew => "NEW",
            TokenKind::KwReturn => "RETURN",
            TokenKind::KwClass => "CLASS",
            TokenKind::LParen => "L_PAREN",
            TokenKind::RParen => "R_PAREN",
            TokenKind::LCurly => "L_CURLY",
            TokenKind::RCurly => "R_CURLY",
            TokenKind::LSquare => "L_SQUARE",
            TokenKind::RSquare => "R_SQUARE",
            TokenKind::Semi => "SEMI",
            TokenKind::Comma => "COMMA",
            TokenKind::Dot => "DOT",
            TokenKind::Plus => "PLUSOP",
            TokenKind::Minus => "MINUSOP",
            TokenKind::Star => "MULTOP",
            TokenKind::Slash => "DIVOP",
            TokenKind::Assign => "ASSIGN",
            TokenKind::EqEq => "EQ",
            TokenKind::Lt => "LT",
            TokenKind::Gt => "GT",
            TokenKind::AndAnd => "AND",
            TokenKind::OrOr => "OR",
            TokenKind::Bang => "NOT",
        }
    }
}

/// Maps reserved words to their token kinds; `None` for plain identifiers.
pub fn keyword_kind(ident: &str) -> Option<TokenKind> {
    let kind = match ident {
        "public" => TokenKind::KwPublic,
        "static" => TokenKind::KwStatic,
        "void" => TokenKind::KwVoid,
        "main" => TokenKind::KwMain,
        "String" => TokenKind::KwString,
        "int" => TokenKind::KwInt,
        "boolean" => TokenKind::KwBoolean,
        "if" => TokenKind::KwIf,
        "else" => TokenKind::KwElse,
        "while" => TokenKind::KwWhile,
        "length" => TokenKind::KwLength,
        "true" => TokenKind::KwTrue,
        "false" => TokenKind::KwFalse,
        "this" => TokenKind::KwThis,
        "new" => TokenKind::KwNew,
        "return" => TokenKind::KwReturn,
        "class" => TokenKind::KwClass,
        _ => return None,
    };
    Some(kind)
}

/// A lexed token: kind, the source slice it covers, its span, and the parsed
/// value for integer literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub span: SourceSpan,
    pub value: Option<i64>,
}

impl<'a> Token<'a> {
    pub fn line(&self) -> u32 {
        self.span.begin.line
    }
}
