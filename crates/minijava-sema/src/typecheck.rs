//! Syntax-directed type inference.
//!
//! Every visited node's type is recorded in the [`TypeInfo`] side table
//! (statements get their nominal `void`). A subtree that fails to check gets
//! the `Type::Error` sentinel, which propagates upward without producing
//! duplicate diagnostics: an operator whose operand already errored stays
//! silent.

use std::collections::HashMap;

use minijava_syntax::ast::{BinaryOp, ClassDecl, Expr, ExprKind, MainClass, MethodDecl, NodeId,
    Program, Statement, StatementKind, Type, VarDecl};
use minijava_syntax::diagnostics::{Diagnostic, DiagnosticSink, SourceSpan};

use crate::builder::SemanticPassResult;
use crate::scope::SymbolTable;

/// Side table mapping AST node identity to inferred type, written by the
/// checker and read by the IR generator.
#[derive(Debug, Clone, Default)]
pub struct TypeInfo {
    types: HashMap<NodeId, Type>,
}

impl TypeInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, id: NodeId, ty: Type) {
        self.types.insert(id, ty);
    }

    pub fn get(&self, id: NodeId) -> Option<&Type> {
        self.types.get(&id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Type-check the program, returning the filled side table and the error
/// count. The symbol table is only navigated, never extended.
pub fn check_types(
    program: &Program,
    table: &mut SymbolTable,
    sink: &mut dyn DiagnosticSink,
) -> (TypeInfo, SemanticPassResult) {
    table.reset();
    let mut checker = Checker {
        table,
        sink,
        info: TypeInfo::new(),
        errors: 0,
    };
    checker.program(program);
    let result = SemanticPassResult {
        error_count: checker.errors,
    };
    (checker.info, result)
}

struct Checker<'t, 'd> {
    table: &'t mut SymbolTable,
    sink: &'d mut dyn DiagnosticSink,
    info: TypeInfo,
    errors: usize,
}

impl Checker<'_, '_> {
    fn program(&mut self, program: &Program) {
        self.main_class(&program.main);
        for class in &program.classes {
            self.class(class);
        }
    }

    fn main_class(&mut self, main: &MainClass) {
        self.table.enter_class_scope(&main.name);
        self.table.enter_method_scope("main");

        let mut ty = Type::Void;
        for statement in &main.body {
            if self.statement(statement).is_error() {
                ty = Type::Error;
            }
        }
        self.remember(main.id, ty);

        self.table.exit_scope();
        self.table.exit_scope();
    }

    fn class(&mut self, class: &ClassDecl) {
        self.table.enter_class_scope(&class.name);

        let mut ty = Type::Void;
        for field in &class.fields {
            if self.var_decl(field).is_error() {
                ty = Type::Error;
            }
        }
        for method in &class.methods {
            if self.method(method).is_error() {
                ty = Type::Error;
            }
        }
        self.remember(class.id, ty);

        self.table.exit_scope();
    }

    fn var_decl(&mut self, decl: &VarDecl) -> Type {
        if !decl.ty.is_builtin() {
            let known = decl
                .ty
                .class_name()
                .is_some_and(|name| self.table.lookup_class(name).is_some());
            if !known {
                self.error(
                    decl.line,
                    format!(
                        "Unknown type '{}' for identifier '{}'.",
                        decl.ty, decl.name
                    ),
                );
                return self.remember(decl.id, Type::Error);
            }
        }
        self.remember(decl.id, decl.ty.clone())
    }

    fn method(&mut self, method: &MethodDecl) -> Type {
        self.table.enter_method_scope(&method.name);

        let mut valid = true;
        for param in &method.params {
            self.remember(param.id, param.ty.clone());
        }
        for local in &method.locals {
            if self.var_decl(local).is_error() {
                valid = false;
            }
        }
        for statement in &method.body {
            if self.statement(statement).is_error() {
                valid = false;
            }
        }

        let returned = self.expr(&method.return_expr);
        if returned.is_error() {
            valid = false;
        } else if valid && returned != method.return_type {
            self.error(
                method.line,
                format!(
                    "Return type '{}' in method '{}' does not match returned type '{}'.",
                    method.return_type, method.name, returned
                ),
            );
            valid = false;
        }

        self.table.exit_scope();

        if valid {
            self.remember(method.id, method.return_type.clone())
        } else {
            self.remember(method.id, Type::Error)
        }
    }

    fn statement(&mut self, statement: &Statement) -> Type {
        let line = statement.line;
        let ty = match &statement.kind {
            StatementKind::Block(statements) => {
                let mut ty = Type::Void;
                for child in statements {
                    if self.statement(child).is_error() {
                        ty = Type::Error;
                    }
                }
                ty
            }
            StatementKind::If {
                condition,
                then_branch,
            } => {
                let mut valid = self.condition(condition, line, "if");
                if self.statement(then_branch).is_error() {
                    valid = false;
                }
                void_or_error(valid)
            }
            StatementKind::IfElse {
                condition,
                then_branch,
                else_branch,
            } => {
                let mut valid = self.condition(condition, line, "if");
                if self.statement(then_branch).is_error() {
                    valid = false;
                }
                if self.statement(else_branch).is_error() {
                    valid = false;
                }
                void_or_error(valid)
            }
            StatementKind::While { condition, body } => {
                let mut valid = self.condition(condition, line, "while");
                if self.statement(body).is_error() {
                    valid = false;
                }
                void_or_error(valid)
            }
            StatementKind::Print(value) => void_or_error(!self.expr(value).is_error()),
            StatementKind::Assign { name, value } => {
                let lhs = self.resolve_identifier(name, line);
                let rhs = self.expr(value);
                let valid = if lhs.is_error() || rhs.is_error() {
                    false
                } else if lhs != rhs {
                    self.error(
                        line,
                        format!("Cannot assign type '{rhs}' to type '{lhs}'."),
                    );
                    false
                } else {
                    true
                };
                void_or_error(valid)
            }
            StatementKind::ArrayAssign {
                array,
                index,
                value,
            } => {
                let index_ty = self.expr(index);
                let array_ty = self.resolve_identifier(array, line);
                let value_ty = self.expr(value);

                let mut valid = true;
                if index_ty.is_error() {
                    valid = false;
                } else if index_ty != Type::Int {
                    self.error(
                        line,
                        format!("Invalid array index type '{index_ty}', expected type 'int'."),
                    );
                    valid = false;
                }
                if array_ty.is_error() {
                    valid = false;
                } else if array_ty != Type::IntArray {
                    self.error(
                        line,
                        format!("Invalid array type '{array_ty}', expected type 'int[]'."),
                    );
                    valid = false;
                }
                if value_ty.is_error() {
                    valid = false;
                } else if value_ty != Type::Int {
                    self.error(
                        line,
                        format!(
                            "Cannot assign value of type '{value_ty}', to array of type '{array_ty}'."
                        ),
                    );
                    valid = false;
                }
                void_or_error(valid)
            }
            StatementKind::Empty => Type::Void,
        };
        self.remember(statement.id, ty)
    }

    fn condition(&mut self, condition: &Expr, line: u32, construct: &str) -> bool {
        let ty = self.expr(condition);
        if ty.is_error() {
            return false;
        }
        if ty != Type::Boolean {
            self.error(
                line,
                format!("Condition for {construct}-statement of invalid type {ty}."),
            );
            return false;
        }
        true
    }

    fn expr(&mut self, expr: &Expr) -> Type {
        let line = expr.line;
        let ty = match &expr.kind {
            ExprKind::IntLiteral(_) => Type::Int,
            ExprKind::True | ExprKind::False => Type::Boolean,
            ExprKind::This => match self.table.lookup_variable("this") {
                Some(record) => record.ty.clone(),
                None => {
                    self.error(line, "Undeclared identifier this.".to_string());
                    Type::Error
                }
            },
            ExprKind::Identifier(name) => self.resolve_identifier(name, line),
            ExprKind::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs, line),
            ExprKind::Not(operand) => {
                let ty = self.expr(operand);
                if ty.is_error() {
                    Type::Error
                } else if ty == Type::Boolean {
                    Type::Boolean
                } else {
                    self.error(
                        line,
                        format!(
                            "Invalid type '{ty}' for negation operator, expected type 'boolean'."
                        ),
                    );
                    Type::Error
                }
            }
            ExprKind::ArrayAccess { array, index } => {
                let array_ty = self.expr(array);
                let index_ty = self.expr(index);
                if array_ty.is_error() || index_ty.is_error() {
                    Type::Error
                } else if index_ty != Type::Int {
                    self.error(
                        line,
                        format!("Invalid array index type '{index_ty}', expected type 'int'."),
                    );
                    Type::Error
                } else if array_ty != Type::IntArray {
                    self.error(
                        line,
                        format!("Invalid array type '{array_ty}', expected type 'int[]'."),
                    );
                    Type::Error
                } else {
                    Type::Int
                }
            }
            ExprKind::ArrayLength(array) => {
                let ty = self.expr(array);
                if ty.is_error() {
                    Type::Error
                } else if ty == Type::IntArray {
                    Type::Int
                } else {
                    self.error(
                        line,
                        format!("Invalid type '{ty}' for array length, expected type 'int[]'."),
                    );
                    Type::Error
                }
            }
            ExprKind::NewIntArray(length) => {
                let ty = self.expr(length);
                if ty.is_error() {
                    Type::Error
                } else if ty == Type::Int {
                    Type::IntArray
                } else {
                    self.error(
                        line,
                        format!("Invalid type '{ty}' for array length, expected type 'int'."),
                    );
                    Type::Error
                }
            }
            ExprKind::NewObject(name) => {
                if self.table.lookup_class(name).is_some() {
                    Type::Class(name.clone())
                } else {
                    self.error(line, format!("Unknown class '{name}'."));
                    Type::Error
                }
            }
            ExprKind::Call {
                receiver,
                method,
                args,
            } => self.call(receiver, method, args, line),
        };
        self.remember(expr.id, ty)
    }

    fn binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr, line: u32) -> Type {
        let lhs_ty = self.expr(lhs);
        let rhs_ty = self.expr(rhs);
        if lhs_ty.is_error() || rhs_ty.is_error() {
            return Type::Error;
        }

        if op.is_arithmetic() {
            if lhs_ty == Type::Int && rhs_ty == Type::Int {
                return Type::Int;
            }
            self.error(
                line,
                format!(
                    "{op} operation does not support operands of types '{lhs_ty}' and '{rhs_ty}'."
                ),
            );
            return Type::Error;
        }

        if op.is_comparison() {
            if lhs_ty == Type::Int && rhs_ty == Type::Int {
                return Type::Boolean;
            }
            self.error(
                line,
                format!(
                    "{op} operation does not support operands of types '{lhs_ty}' and '{rhs_ty}'."
                ),
            );
            return Type::Error;
        }

        if op.is_logical() {
            if lhs_ty == Type::Boolean && rhs_ty == Type::Boolean {
                return Type::Boolean;
            }
            self.error(
                line,
                format!(
                    "{op} operation does not support operands of types {lhs_ty} and {rhs_ty}."
                ),
            );
            return Type::Error;
        }

        // Equality: both int or both boolean.
        let same_integer = lhs_ty == Type::Int && rhs_ty == Type::Int;
        let same_boolean = lhs_ty == Type::Boolean && rhs_ty == Type::Boolean;
        if same_integer || same_boolean {
            return Type::Boolean;
        }
        self.error(
            line,
            format!(
                "Operator '==' does not support operands of types '{lhs_ty}' and '{rhs_ty}'."
            ),
        );
        Type::Error
    }

    fn call(&mut self, receiver: &Expr, method_name: &str, args: &[Expr], line: u32) -> Type {
        let receiver_ty = self.expr(receiver);
        if receiver_ty.is_error() {
            return Type::Error;
        }

        let class_name = receiver_ty.class_name().map(str::to_string);
        let class_known = class_name
            .as_deref()
            .is_some_and(|name| self.table.lookup_class(name).is_some());
        if !class_known {
            self.error(
                line,
                format!("Method '{method_name}' not declared for class '{receiver_ty}'."),
            );
            return Type::Error;
        }
        let class_name = class_name.unwrap_or_default();

        let Some(method) = self
            .table
            .method_in_class(&class_name, method_name)
            .cloned()
        else {
            self.error(
                line,
                format!("Method '{method_name}' not declared for class '{class_name}'."),
            );
            return Type::Error;
        };

        let mut valid = true;
        let argument_types: Vec<Type> = args.iter().map(|arg| self.expr(arg)).collect();

        if method.param_count() != argument_types.len() {
            self.error(
                line,
                format!(
                    "Method '{}' expects {} arguments, {} arguments given.",
                    method.name,
                    method.param_count(),
                    argument_types.len()
                ),
            );
            valid = false;
        }

        let comparable = method.params.len().min(argument_types.len());
        for position in 0..comparable {
            let arg_ty = &argument_types[position];
            if arg_ty.is_error() {
                valid = false;
                continue;
            }
            let param_ty = &method.params[position].ty;
            if param_ty != arg_ty {
                let number = position + 1;
                self.error(
                    line,
                    format!(
                        "Argument {number} of type '{arg_ty}' does not match parameter {number} of type '{param_ty}'."
                    ),
                );
                valid = false;
            }
        }

        if valid {
            method.return_type.clone()
        } else {
            Type::Error
        }
    }

    /// Identifier resolution order: variable, then class, then method.
    fn resolve_identifier(&mut self, name: &str, line: u32) -> Type {
        if let Some(variable) = self.table.lookup_variable(name) {
            return variable.ty.clone();
        }
        if let Some(class) = self.table.lookup_class(name) {
            return class.ty();
        }
        if let Some(method) = self.table.lookup_method(name) {
            return method.return_type.clone();
        }
        self.error(line, format!("Undeclared identifier {name}."));
        Type::Error
    }

    fn remember(&mut self, id: NodeId, ty: Type) -> Type {
        self.info.set(id, ty.clone());
        ty
    }

    fn error(&mut self, line: u32, detail: String) {
        self.errors += 1;
        self.sink.emit(Diagnostic::error(
            format!("Error: (line {line}) {detail}"),
            SourceSpan::for_line(line),
        ));
    }
}

fn void_or_error(valid: bool) -> Type {
    if valid {
        Type::Void
    } else {
        Type::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_symbol_table;
    use minijava_syntax::diagnostics::CollectingSink;
    use minijava_syntax::lexer::Lexer;
    use minijava_syntax::parser::Parser;

    fn check(source: &str) -> (Program, TypeInfo, CollectingSink, SemanticPassResult) {
        let mut sink = CollectingSink::new();
        let program = {
            let lexer = Lexer::new(source, &mut sink);
            Parser::new(lexer).parse_goal().expect("test source parses")
        };
        let mut table = SymbolTable::new();
        let build = build_symbol_table(&program, &mut table, &mut sink);
        assert!(build.ok(), "symbol table errors: {:?}", sink.diagnostics());
        let (info, result) = check_types(&program, &mut table, &mut sink);
        (program, info, sink, result)
    }

    fn wrap_method(body: &str) -> String {
        format!(
            "public class Main {{ public static void main(String[] args) {{ }} }}\
             class Host {{ int field; {body} }}"
        )
    }

    #[test]
    fn well_typed_program_checks_clean() {
        let source = wrap_method(
            "public int run(int n) {
                int r;
                boolean done;
                int[] xs;
                xs = new int[n];
                xs[0] = 1;
                done = false;
                r = 0;
                while (!done) {
                    r = r + xs[0] + xs.length + field;
                    done = r > 10;
                }
                if (r == 11) { r = this.run(0); } else { r = 0; }
                return r;
            }",
        );
        let (_, _, sink, result) = check(&source);
        assert!(result.ok(), "diagnostics: {:?}", sink.diagnostics());
    }

    #[test]
    fn every_expression_gets_a_type_entry() {
        let source = wrap_method("public int run(int n) { return n + 1 * 2; }");
        let (program, info, _, result) = check(&source);
        assert!(result.ok());

        fn count_exprs(expr: &Expr, info: &TypeInfo, seen: &mut usize) {
            assert!(info.get(expr.id).is_some(), "missing entry for {:?}", expr.kind);
            *seen += 1;
            match &expr.kind {
                ExprKind::Binary { lhs, rhs, .. } => {
                    count_exprs(lhs, info, seen);
                    count_exprs(rhs, info, seen);
                }
                ExprKind::Not(e) | ExprKind::ArrayLength(e) | ExprKind::NewIntArray(e) => {
                    count_exprs(e, info, seen)
                }
                ExprKind::ArrayAccess { array, index } => {
                    count_exprs(array, info, seen);
                    count_exprs(index, info, seen);
                }
                ExprKind::Call { receiver, args, .. } => {
                    count_exprs(receiver, info, seen);
                    for arg in args {
                        count_exprs(arg, info, seen);
                    }
                }
                _ => {}
            }
        }

        let mut seen = 0;
        count_exprs(&program.classes[0].methods[0].return_expr, &info, &mut seen);
        assert_eq!(seen, 5); // n, 1, 2, 1*2, n + (1*2)
    }

    #[test]
    fn undeclared_identifier_reports_with_line() {
        let source = wrap_method("public int f() { return q; }");
        let (_, _, sink, result) = check(&source);
        assert_eq!(result.error_count, 1);
        let message = &sink.diagnostics()[0].message;
        assert!(message.contains("Undeclared identifier q."), "{message}");
        assert!(message.starts_with("Error: (line "), "{message}");
    }

    #[test]
    fn arithmetic_on_boolean_is_rejected() {
        let source = wrap_method("public int f() { return 1 + true; }");
        let (_, _, sink, result) = check(&source);
        assert_eq!(result.error_count, 1);
        assert!(sink.diagnostics()[0]
            .message
            .contains("+ operation does not support operands of types 'int' and 'boolean'."));
    }

    #[test]
    fn error_operands_do_not_cascade() {
        // `q` is undeclared; the enclosing + and the return check stay silent.
        let source = wrap_method("public int f() { return q + 1; }");
        let (_, _, _, result) = check(&source);
        assert_eq!(result.error_count, 1);
    }

    #[test]
    fn condition_must_be_boolean() {
        let source = wrap_method("public int f() { if (1) { } else { } return 0; }");
        let (_, _, sink, result) = check(&source);
        assert_eq!(result.error_count, 1);
        assert!(sink.diagnostics()[0]
            .message
            .contains("Condition for if-statement of invalid type int."));
    }

    #[test]
    fn assignment_types_must_match() {
        let source = wrap_method("public int f() { field = true; return 0; }");
        let (_, _, sink, result) = check(&source);
        assert_eq!(result.error_count, 1);
        assert!(sink.diagnostics()[0]
            .message
            .contains("Cannot assign type 'boolean' to type 'int'."));
    }

    #[test]
    fn call_arity_and_types_are_checked() {
        let source = wrap_method(
            "public int f(int a, boolean b) { return 0; }
             public int g() { return this.f(1); }
             public int h() { return this.f(1, 2); }",
        );
        let (_, _, sink, result) = check(&source);
        assert_eq!(result.error_count, 2);
        let messages: Vec<_> = sink.diagnostics().iter().map(|d| d.message.as_str()).collect();
        assert!(messages
            .iter()
            .any(|m| m.contains("Method 'f' expects 2 arguments, 1 arguments given.")));
        assert!(messages.iter().any(|m| {
            m.contains("Argument 2 of type 'int' does not match parameter 2 of type 'boolean'.")
        }));
    }

    #[test]
    fn method_on_non_class_receiver_is_rejected() {
        let source = wrap_method("public int f() { return field.g(); }");
        let (_, _, sink, result) = check(&source);
        assert_eq!(result.error_count, 1);
        assert!(sink.diagnostics()[0]
            .message
            .contains("Method 'g' not declared for class 'int'."));
    }

    #[test]
    fn return_type_mismatch_is_reported() {
        let source = wrap_method("public boolean f() { return 1; }");
        let (_, _, sink, result) = check(&source);
        assert_eq!(result.error_count, 1);
        assert!(sink.diagnostics()[0]
            .message
            .contains("Return type 'boolean' in method 'f' does not match returned type 'int'."));
    }

    #[test]
    fn unknown_declared_type_is_reported() {
        let source = wrap_method("public int f() { Missing m; return 0; }");
        let (_, _, sink, result) = check(&source);
        assert_eq!(result.error_count, 1);
        assert!(sink.diagnostics()[0]
            .message
            .contains("Unknown type 'Missing' for identifier 'm'."));
    }

    #[test]
    fn equality_mixes_are_rejected() {
        let source = wrap_method("public boolean f() { return 1 == true; }");
        let (_, _, sink, result) = check(&source);
        assert_eq!(result.error_count, 1);
        assert!(sink.diagnostics()[0]
            .message
            .contains("Operator '==' does not support operands of types 'int' and 'boolean'."));
    }
}
