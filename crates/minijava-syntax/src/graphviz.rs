//! Graphviz rendering of the AST, written to `output/tree.dot` by the CLI.

use std::fmt::Write;

use crate::ast::{ClassDecl, Expr, ExprKind, MethodDecl, Program, Statement, StatementKind,
    VarDecl};

/// Renders the program as a `digraph` with one node per AST node.
pub fn ast_to_dot(program: &Program) -> String {
    let mut writer = DotWriter::default();
    let root = writer.node("Program");

    let main = writer.node(&format!("Main Class: {}", program.main.name));
    writer.edge(root, main);
    let args = writer.node(&format!("Argument: String[] {}", program.main.arg_name));
    writer.edge(main, args);
    for statement in &program.main.body {
        let child = writer.statement(statement);
        writer.edge(main, child);
    }

    for class in &program.classes {
        let child = writer.class(class);
        writer.edge(root, child);
    }

    format!("digraph {{\n{}}}\n", writer.out)
}

#[derive(Default)]
struct DotWriter {
    out: String,
    count: usize,
}

impl DotWriter {
    fn node(&mut self, label: &str) -> usize {
        let id = self.count;
        self.count += 1;
        let escaped = label.replace('"', "\\\"");
        let _ = writeln!(self.out, "n{id} [label=\"{escaped}\"];");
        id
    }

    fn edge(&mut self, from: usize, to: usize) {
        let _ = writeln!(self.out, "n{from} -> n{to};");
    }

    fn class(&mut self, class: &ClassDecl) -> usize {
        let id = self.node(&format!("Class: {}", class.name));
        for field in &class.fields {
            let child = self.var_decl("Field", field);
            self.edge(id, child);
        }
        for method in &class.methods {
            let child = self.method(method);
            self.edge(id, child);
        }
        id
    }

    fn var_decl(&mut self, role: &str, decl: &VarDecl) -> usize {
        self.node(&format!("{role}: {} {}", decl.ty, decl.name))
    }

    fn method(&mut self, method: &MethodDecl) -> usize {
        let id = self.node(&format!("Method: {} {}", method.return_type, method.name));
        for param in &method.params {
            let child = self.var_decl("Parameter", param);
            self.edge(id, child);
        }
        for local in &method.locals {
            let child = self.var_decl("Variable", local);
            self.edge(id, child);
        }
        for statement in &method.body {
            let child = self.statement(statement);
            self.edge(id, child);
        }
        let ret = self.node("Return");
        self.edge(id, ret);
        let value = self.expr(&method.return_expr);
        self.edge(ret, value);
        id
    }

    fn statement(&mut self, statement: &Statement) -> usize {
        match &statement.kind {
            StatementKind::Block(statements) => {
                let id = self.node("Block");
                for child in statements {
                    let node = self.statement(child);
                    self.edge(id, node);
                }
                id
            }
            StatementKind::If {
                condition,
                then_branch,
            } => {
                let id = self.node("If");
                let cond = self.expr(condition);
                self.edge(id, cond);
                let then_node = self.statement(then_branch);
                self.edge(id, then_node);
                id
            }
            StatementKind::IfElse {
                condition,
                then_branch,
                else_branch,
            } => {
                let id = self.node("IfElse");
                let cond = self.expr(condition);
                self.edge(id, cond);
                let then_node = self.statement(then_branch);
                self.edge(id, then_node);
                let else_node = self.statement(else_branch);
                self.edge(id, else_node);
                id
            }
            StatementKind::While { condition, body } => {
                let id = self.node("While");
                let cond = self.expr(condition);
                self.edge(id, cond);
                let body_node = self.statement(body);
                self.edge(id, body_node);
                id
            }
            StatementKind::Print(value) => {
                let id = self.node("Print");
                let child = self.expr(value);
                self.edge(id, child);
                id
            }
            StatementKind::Assign { name, value } => {
                let id = self.node(&format!("Assign: {name}"));
                let child = self.expr(value);
                self.edge(id, child);
                id
            }
            StatementKind::ArrayAssign {
                array,
                index,
                value,
            } => {
                let id = self.node(&format!("ArrayAssign: {array}"));
                let index_node = self.expr(index);
                self.edge(id, index_node);
                let value_node = self.expr(value);
                self.edge(id, value_node);
                id
            }
            StatementKind::Empty => self.node("Empty"),
        }
    }

    fn expr(&mut self, expr: &Expr) -> usize {
        match &expr.kind {
            ExprKind::IntLiteral(value) => self.node(&format!("Int: {value}")),
            ExprKind::True => self.node("true"),
            ExprKind::False => self.node("false"),
            ExprKind::This => self.node("this"),
            ExprKind::Identifier(name) => self.node(&format!("Id: {name}")),
            ExprKind::Binary { op, lhs, rhs } => {
                let id = self.node(&op.to_string());
                let left = self.expr(lhs);
                self.edge(id, left);
                let right = self.expr(rhs);
                self.edge(id, right);
                id
            }
            ExprKind::Not(operand) => {
                let id = self.node("!");
                let child = self.expr(operand);
                self.edge(id, child);
                id
            }
            ExprKind::ArrayAccess { array, index } => {
                let id = self.node("ArrayAccess");
                let array_node = self.expr(array);
                self.edge(id, array_node);
                let index_node = self.expr(index);
                self.edge(id, index_node);
                id
            }
            ExprKind::ArrayLength(array) => {
                let id = self.node("ArrayLength");
                let child = self.expr(array);
                self.edge(id, child);
                id
            }
            ExprKind::NewIntArray(length) => {
                let id = self.node("new int[]");
                let child = self.expr(length);
                self.edge(id, child);
                id
            }
            ExprKind::NewObject(name) => self.node(&format!("new {name}()")),
            ExprKind::Call {
                receiver,
                method,
                args,
            } => {
                let id = self.node(&format!("Call: {method}"));
                let receiver_node = self.expr(receiver);
                self.edge(id, receiver_node);
                for arg in args {
                    let arg_node = self.expr(arg);
                    self.edge(id, arg_node);
                }
                id
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    #[test]
    fn dot_output_is_a_digraph() {
        let source = "public class Main { public static void main(String[] args) {
            System.out.println(1 + 2);
        } }";
        let mut sink = CollectingSink::new();
        let lexer = Lexer::new(source, &mut sink);
        let program = Parser::new(lexer).parse_goal().unwrap();

        let dot = ast_to_dot(&program);
        assert!(dot.starts_with("digraph {"));
        assert!(dot.trim_end().ends_with('}'));
        assert!(dot.contains("Main Class: Main"));
        assert!(dot.contains("Print"));
        assert!(dot.contains("Int: 1"));
    }
}
