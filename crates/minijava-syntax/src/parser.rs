//! Recursive-descent parser with Pratt precedence climbing for expressions.
//!
//! Declarations and statements are parsed by dedicated functions following
//! the grammar; expressions use binding powers derived from the precedence
//! table (`||` lowest, then `&&`, `==`, `<`/`>`, `+`/`-`, `*`/`/`, prefix
//! `!`, and postfix `.length` / `.method(args)` / `[index]` highest).
//!
//! The first syntax error terminates the parse: it is reported once through
//! the diagnostic sink and returned as a [`ParseError`]. `Invalid` tokens
//! produced by the lexer are dropped before parsing begins; their diagnostics
//! have already been emitted.

use thiserror::Error;

use crate::ast::{BinaryOp, ClassDecl, Expr, ExprKind, MainClass, MethodDecl, NodeId, Program,
    Statement, StatementKind, Type, VarDecl};
use crate::diagnostics::{Diagnostic, DiagnosticSink, SourceSpan};
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

/// What the parser was looking for when it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    ExpectedToken(TokenKind),
    ExpectedExpression,
    ExpectedStatement,
    ExpectedType,
}

/// The single fatal syntax error of a failed parse.
#[derive(Debug, Clone, Error)]
#[error("syntax error at line {line}: unexpected {found}, expecting {expected}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub found: &'static str,
    pub expected: &'static str,
    pub line: u32,
    pub span: SourceSpan,
}

/// Binding powers for infix binary operators: `(left, right)`, left < right
/// for left associativity.
fn infix_binding_power(kind: TokenKind) -> Option<(u8, u8, BinaryOp)> {
    let entry = match kind {
        TokenKind::OrOr => (1, 2, BinaryOp::Or),
        TokenKind::AndAnd => (3, 4, BinaryOp::And),
        TokenKind::EqEq => (5, 6, BinaryOp::Eq),
        TokenKind::Lt => (7, 8, BinaryOp::Lt),
        TokenKind::Gt => (7, 8, BinaryOp::Gt),
        TokenKind::Plus => (9, 10, BinaryOp::Add),
        TokenKind::Minus => (9, 10, BinaryOp::Sub),
        TokenKind::Star => (11, 12, BinaryOp::Mul),
        TokenKind::Slash => (11, 12, BinaryOp::Div),
        _ => return None,
    };
    Some(entry)
}

/// Right binding power of prefix `!`.
const NOT_BINDING_POWER: u8 = 13;
/// Left binding power of the postfix forms (`.`, `[`).
const POSTFIX_BINDING_POWER: u8 = 15;

pub struct Parser<'a, 'd> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    sink: &'d mut dyn DiagnosticSink,
    lexical_errors: usize,
    node_count: u32,
}

type Result<T> = std::result::Result<T, ParseError>;

impl<'a, 'd> Parser<'a, 'd> {
    /// Drains the lexer, dropping `Invalid` tokens, and takes over its sink.
    pub fn new(mut lexer: Lexer<'a, 'd>) -> Self {
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            if token.kind == TokenKind::Invalid {
                continue;
            }
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        let lexical_errors = lexer.error_count();
        Parser {
            tokens,
            pos: 0,
            sink: lexer.into_sink(),
            lexical_errors,
            node_count: 0,
        }
    }

    /// Errors the lexer reported while the token stream was drained.
    pub fn lexical_error_count(&self) -> usize {
        self.lexical_errors
    }

    /// Goal ::= MainClass ClassDecl* Eof
    pub fn parse_goal(&mut self) -> Result<Program> {
        let id = self.next_id();
        let main = self.parse_main_class()?;
        let mut classes = Vec::new();
        while self.peek(0).kind == TokenKind::KwClass {
            classes.push(self.parse_class_decl()?);
        }
        self.expect(TokenKind::Eof)?;
        Ok(Program { id, main, classes })
    }

    fn parse_main_class(&mut self) -> Result<MainClass> {
        let id = self.next_id();
        let line = self.peek(0).line();
        self.expect(TokenKind::KwPublic)?;
        self.expect(TokenKind::KwClass)?;
        let name = self.parse_identifier()?;
        self.expect(TokenKind::LCurly)?;
        self.expect(TokenKind::KwPublic)?;
        self.expect(TokenKind::KwStatic)?;
        self.expect(TokenKind::KwVoid)?;
        self.expect(TokenKind::KwMain)?;
        self.expect(TokenKind::LParen)?;
        self.expect(TokenKind::KwString)?;
        self.expect(TokenKind::LSquare)?;
        self.expect(TokenKind::RSquare)?;
        let arg_name = self.parse_identifier()?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::LCurly)?;
        let mut body = Vec::new();
        while self.peek(0).kind != TokenKind::RCurly {
            body.push(self.parse_statement()?);
        }
        self.expect(TokenKind::RCurly)?;
        self.expect(TokenKind::RCurly)?;
        Ok(MainClass {
            id,
            line,
            name,
            arg_name,
            body,
        })
    }

    /// ClassDecl ::= 'class' Id '{' VarDecl* MethodDecl* '}'
    fn parse_class_decl(&mut self) -> Result<ClassDecl> {
        let id = self.next_id();
        let line = self.peek(0).line();
        self.expect(TokenKind::KwClass)?;
        let name = self.parse_identifier()?;
        self.expect(TokenKind::LCurly)?;

        let mut fields = Vec::new();
        while self.starts_var_decl() {
            fields.push(self.parse_var_decl()?);
        }

        let mut methods = Vec::new();
        while self.peek(0).kind == TokenKind::KwPublic {
            methods.push(self.parse_method_decl()?);
        }

        self.expect(TokenKind::RCurly)?;
        Ok(ClassDecl {
            id,
            line,
            name,
            fields,
            methods,
        })
    }

    /// VarDecl ::= Type Id ';'
    fn parse_var_decl(&mut self) -> Result<VarDecl> {
        let id = self.next_id();
        let line = self.peek(0).line();
        let ty = self.parse_type()?;
        let name = self.parse_identifier()?;
        self.expect(TokenKind::Semi)?;
        Ok(VarDecl { id, line, ty, name })
    }

    /// A declaration begins with `int`, `boolean`, or two identifiers in a
    /// row (`ClassName var`).
    fn starts_var_decl(&mut self) -> bool {
        match self.peek(0).kind {
            TokenKind::KwInt | TokenKind::KwBoolean => true,
            TokenKind::Identifier => self.peek(1).kind == TokenKind::Identifier,
            _ => false,
        }
    }

    /// Type ::= 'int' '[' ']' | 'int' | 'boolean' | Id
    fn parse_type(&mut self) -> Result<Type> {
        match self.peek(0).kind {
            TokenKind::KwInt => {
                self.advance();
                if self.peek(0).kind == TokenKind::LSquare {
                    self.advance();
                    self.expect(TokenKind::RSquare)?;
                    Ok(Type::IntArray)
                } else {
                    Ok(Type::Int)
                }
            }
            TokenKind::KwBoolean => {
                self.advance();
                Ok(Type::Boolean)
            }
            TokenKind::Identifier => {
                let token = self.advance();
                Ok(Type::Class(token.lexeme.to_string()))
            }
            _ => Err(self.error(ParseErrorKind::ExpectedType, "a type")),
        }
    }

    /// MethodDecl ::= 'public' Type Id '(' Params? ')'
    ///                '{' VarDecl* Statement* 'return' Expr ';' '}'
    fn parse_method_decl(&mut self) -> Result<MethodDecl> {
        let id = self.next_id();
        let line = self.peek(0).line();
        self.expect(TokenKind::KwPublic)?;
        let return_type = self.parse_type()?;
        let name = self.parse_identifier()?;
        self.expect(TokenKind::LParen)?;

        let mut params = Vec::new();
        if self.peek(0).kind != TokenKind::RParen {
            loop {
                let param_id = self.next_id();
                let param_line = self.peek(0).line();
                let ty = self.parse_type()?;
                let param_name = self.parse_identifier()?;
                params.push(VarDecl {
                    id: param_id,
                    line: param_line,
                    ty,
                    name: param_name,
                });
                if !self.consume_if(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::LCurly)?;

        let mut locals = Vec::new();
        while self.starts_var_decl() {
            locals.push(self.parse_var_decl()?);
        }

        let mut body = Vec::new();
        while self.peek(0).kind != TokenKind::KwReturn {
            body.push(self.parse_statement()?);
        }

        self.expect(TokenKind::KwReturn)?;
        let return_expr = self.parse_expression(0)?;
        self.expect(TokenKind::Semi)?;
        self.expect(TokenKind::RCurly)?;

        Ok(MethodDecl {
            id,
            line,
            return_type,
            name,
            params,
            locals,
            body,
            return_expr,
        })
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        let id = self.next_id();
        let line = self.peek(0).line();
        let kind = match self.peek(0).kind {
            TokenKind::LCurly => {
                self.advance();
                let mut statements = Vec::new();
                while self.peek(0).kind != TokenKind::RCurly {
                    statements.push(self.parse_statement()?);
                }
                self.expect(TokenKind::RCurly)?;
                StatementKind::Block(statements)
            }
            TokenKind::KwIf => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let condition = self.parse_expression(0)?;
                self.expect(TokenKind::RParen)?;
                let then_branch = Box::new(self.parse_statement()?);
                if self.consume_if(TokenKind::KwElse) {
                    let else_branch = Box::new(self.parse_statement()?);
                    StatementKind::IfElse {
                        condition,
                        then_branch,
                        else_branch,
                    }
                } else {
                    StatementKind::If {
                        condition,
                        then_branch,
                    }
                }
            }
            TokenKind::KwWhile => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let condition = self.parse_expression(0)?;
                self.expect(TokenKind::RParen)?;
                let body = Box::new(self.parse_statement()?);
                StatementKind::While { condition, body }
            }
            TokenKind::KwPrintln => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let value = self.parse_expression(0)?;
                self.expect(TokenKind::RParen)?;
                self.expect(TokenKind::Semi)?;
                StatementKind::Print(value)
            }
            TokenKind::Identifier => {
                let name = self.advance().lexeme.to_string();
                if self.consume_if(TokenKind::LSquare) {
                    let index = self.parse_expression(0)?;
                    self.expect(TokenKind::RSquare)?;
                    self.expect(TokenKind::Assign)?;
                    let value = self.parse_expression(0)?;
                    self.expect(TokenKind::Semi)?;
                    StatementKind::ArrayAssign {
                        array: name,
                        index,
                        value,
                    }
                } else {
                    self.expect(TokenKind::Assign)?;
                    let value = self.parse_expression(0)?;
                    self.expect(TokenKind::Semi)?;
                    StatementKind::Assign { name, value }
                }
            }
            TokenKind::Semi => {
                self.advance();
                StatementKind::Empty
            }
            _ => return Err(self.error(ParseErrorKind::ExpectedStatement, "a statement")),
        };
        Ok(Statement { id, line, kind })
    }

    fn parse_expression(&mut self, min_bp: u8) -> Result<Expr> {
        let mut lhs = self.parse_prefix()?;

        loop {
            let kind = self.peek(0).kind;

            if matches!(kind, TokenKind::Dot | TokenKind::LSquare) {
                if POSTFIX_BINDING_POWER < min_bp {
                    break;
                }
                lhs = self.parse_postfix(lhs)?;
                continue;
            }

            let Some((left_bp, right_bp, op)) = infix_binding_power(kind) else {
                break;
            };
            if left_bp < min_bp {
                break;
            }

            self.advance();
            let rhs = self.parse_expression(right_bp)?;
            let id = self.next_id();
            let line = lhs.line;
            lhs = Expr {
                id,
                line,
                kind: ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            };
        }

        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<Expr> {
        let token = self.peek(0);
        let line = token.line();
        match token.kind {
            TokenKind::IntLiteral => {
                let token = self.advance();
                Ok(self.expr(line, ExprKind::IntLiteral(token.value.unwrap_or(0))))
            }
            TokenKind::KwTrue => {
                self.advance();
                Ok(self.expr(line, ExprKind::True))
            }
            TokenKind::KwFalse => {
                self.advance();
                Ok(self.expr(line, ExprKind::False))
            }
            TokenKind::KwThis => {
                self.advance();
                Ok(self.expr(line, ExprKind::This))
            }
            TokenKind::Identifier => {
                let token = self.advance();
                Ok(self.expr(line, ExprKind::Identifier(token.lexeme.to_string())))
            }
            TokenKind::Bang => {
                self.advance();
                let operand = self.parse_expression(NOT_BINDING_POWER)?;
                Ok(self.expr(line, ExprKind::Not(Box::new(operand))))
            }
            TokenKind::KwNew => {
                self.advance();
                if self.consume_if(TokenKind::KwInt) {
                    self.expect(TokenKind::LSquare)?;
                    let length = self.parse_expression(0)?;
                    self.expect(TokenKind::RSquare)?;
                    Ok(self.expr(line, ExprKind::NewIntArray(Box::new(length))))
                } else {
                    let name = self.parse_identifier()?;
                    self.expect(TokenKind::LParen)?;
                    self.expect(TokenKind::RParen)?;
                    Ok(self.expr(line, ExprKind::NewObject(name)))
                }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression(0)?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            _ => Err(self.error(ParseErrorKind::ExpectedExpression, "an expression")),
        }
    }

    /// `.length`, `.method(args)`, or `[index]` applied to `receiver`.
    fn parse_postfix(&mut self, receiver: Expr) -> Result<Expr> {
        let line = receiver.line;
        match self.advance().kind {
            TokenKind::Dot => {
                if self.consume_if(TokenKind::KwLength) {
                    Ok(self.expr(line, ExprKind::ArrayLength(Box::new(receiver))))
                } else {
                    let method = self.parse_identifier()?;
                    self.expect(TokenKind::LParen)?;
                    let mut args = Vec::new();
                    if self.peek(0).kind != TokenKind::RParen {
                        loop {
                            args.push(self.parse_expression(0)?);
                            if !self.consume_if(TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(TokenKind::RParen)?;
                    Ok(self.expr(
                        line,
                        ExprKind::Call {
                            receiver: Box::new(receiver),
                            method,
                            args,
                        },
                    ))
                }
            }
            TokenKind::LSquare => {
                let index = self.parse_expression(0)?;
                self.expect(TokenKind::RSquare)?;
                Ok(self.expr(
                    line,
                    ExprKind::ArrayAccess {
                        array: Box::new(receiver),
                        index: Box::new(index),
                    },
                ))
            }
            // parse_expression only dispatches here on Dot or LSquare
            _ => unreachable!("postfix called on a non-postfix token"),
        }
    }

    fn parse_identifier(&mut self) -> Result<String> {
        let token = self.expect(TokenKind::Identifier)?;
        Ok(token.lexeme.to_string())
    }

    fn expr(&mut self, line: u32, kind: ExprKind) -> Expr {
        Expr {
            id: self.next_id(),
            line,
            kind,
        }
    }

    fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.node_count);
        self.node_count += 1;
        id
    }

    fn peek(&self, n: usize) -> Token<'a> {
        let index = (self.pos + n).min(self.tokens.len() - 1);
        self.tokens[index]
    }

    fn advance(&mut self) -> Token<'a> {
        let token = self.peek(0);
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn consume_if(&mut self, kind: TokenKind) -> bool {
        if self.peek(0).kind == kind {
            self.advance();
            return true;
        }
        false
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token<'a>> {
        if self.peek(0).kind == kind {
            return Ok(self.advance());
        }
        Err(self.error(ParseErrorKind::ExpectedToken(kind), kind.describe()))
    }

    fn error(&mut self, kind: ParseErrorKind, expected: &'static str) -> ParseError {
        let found = self.peek(0);
        let error = ParseError {
            kind,
            found: found.kind.describe(),
            expected,
            line: found.line(),
            span: found.span,
        };
        self.sink.emit(Diagnostic::error(
            format!(
                "Syntax error at line {}: unexpected {}, expecting {}.",
                error.line, error.found, error.expected
            ),
            found.span,
        ));
        error
    }
}
