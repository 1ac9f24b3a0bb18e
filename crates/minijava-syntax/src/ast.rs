//! Abstract syntax tree for the MiniJava subset.
//!
//! Ownership is a strict tree: every node exclusively owns its children.
//! Instead of node addresses, identity is a dense [`NodeId`] assigned by the
//! parser; the semantic passes key their side tables (inferred types, lowered
//! operands) off these ids.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identity of an AST node, unique within one parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The language's types. `Error` is the sentinel produced by the type checker
/// for subtrees that failed to check; `Void` is the nominal type of
/// statements and of the synthetic `main` method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Int,
    Boolean,
    IntArray,
    StringArray,
    Class(String),
    Void,
    Error,
}

impl Type {
    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    /// Scalar and array types that may appear in declarations without a
    /// matching class record.
    pub fn is_builtin(&self) -> bool {
        matches!(self, Type::Int | Type::Boolean | Type::IntArray)
    }

    /// Name of the class for class-typed values.
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Type::Class(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Boolean => write!(f, "boolean"),
            Type::IntArray => write!(f, "int[]"),
            Type::StringArray => write!(f, "String[]"),
            Type::Class(name) => write!(f, "{name}"),
            Type::Void => write!(f, "void"),
            Type::Error => write!(f, "<type-error>"),
        }
    }
}

/// Binary operators, lowest-precedence group first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Lt,
    Gt,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(self, BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div)
    }

    pub fn is_comparison(self) -> bool {
        matches!(self, BinaryOp::Lt | BinaryOp::Gt)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        };
        write!(f, "{symbol}")
    }
}

/// Whole program: the main class followed by the ordinary class declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub id: NodeId,
    pub main: MainClass,
    pub classes: Vec<ClassDecl>,
}

/// `public class Name { public static void main(String[] arg) { ... } }`
#[derive(Debug, Clone, PartialEq)]
pub struct MainClass {
    pub id: NodeId,
    pub line: u32,
    pub name: String,
    pub arg_name: String,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub id: NodeId,
    pub line: u32,
    pub name: String,
    pub fields: Vec<VarDecl>,
    pub methods: Vec<MethodDecl>,
}

/// A field, local, or parameter declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub id: NodeId,
    pub line: u32,
    pub ty: Type,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub id: NodeId,
    pub line: u32,
    pub return_type: Type,
    pub name: String,
    pub params: Vec<VarDecl>,
    pub locals: Vec<VarDecl>,
    pub body: Vec<Statement>,
    pub return_expr: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub id: NodeId,
    pub line: u32,
    pub kind: StatementKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Block(Vec<Statement>),
    If {
        condition: Expr,
        then_branch: Box<Statement>,
    },
    IfElse {
        condition: Expr,
        then_branch: Box<Statement>,
        else_branch: Box<Statement>,
    },
    While {
        condition: Expr,
        body: Box<Statement>,
    },
    Print(Expr),
    Assign {
        name: String,
        value: Expr,
    },
    ArrayAssign {
        array: String,
        index: Expr,
        value: Expr,
    },
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub line: u32,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    IntLiteral(i64),
    True,
    False,
    This,
    Identifier(String),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Not(Box<Expr>),
    ArrayAccess {
        array: Box<Expr>,
        index: Box<Expr>,
    },
    ArrayLength(Box<Expr>),
    NewIntArray(Box<Expr>),
    NewObject(String),
    Call {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
}
