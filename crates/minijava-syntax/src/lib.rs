pub mod ast;
pub mod diagnostics;
pub mod graphviz;
pub mod lexer;
pub mod parser;
pub mod source;
pub mod token;

// Re-export commonly used types
pub use ast::{BinaryOp, ClassDecl, Expr, ExprKind, MainClass, MethodDecl, NodeId, Program,
    Statement, StatementKind, Type, VarDecl};
pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticSink, Severity, SourceLocation,
    SourceSpan, StreamSink};
pub use lexer::Lexer;
pub use parser::{ParseError, ParseErrorKind, Parser};
pub use source::{CharStream, SourceBuffer};
pub use token::{Token, TokenKind};
