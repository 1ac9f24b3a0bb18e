//! Lowering from the typed AST to the CFG.
//!
//! Every expression evaluates to an [`Operand`]: an immediate for literals,
//! otherwise a fresh `_t<k>` temporary. Temporaries are registered in the
//! current method's scope so that variable enumeration later lists them next
//! to user locals. Receiver classes for method calls come from the
//! [`TypeInfo`] side table; the IR itself carries no types.
//!
//! Control flow lowers to the canonical shapes: `if` and `while` emit a
//! "jump-if-false" followed by an unconditional jump, `&&`/`||` become
//! four-block short-circuit diamonds writing 1 or 0 into a fresh boolean
//! temporary.

use minijava_sema::builder::SemanticPassResult;
use minijava_sema::scope::SymbolTable;
use minijava_sema::typecheck::TypeInfo;
use minijava_syntax::ast::{BinaryOp, ClassDecl, Expr, ExprKind, MainClass, MethodDecl, Program,
    Statement, StatementKind, Type};
use minijava_syntax::diagnostics::{Diagnostic, DiagnosticSink, SourceSpan};

use crate::cfg::{BlockId, Cfg};
use crate::tac::{Operand, Tac};

pub fn generate_ir(
    program: &Program,
    cfg: &mut Cfg,
    table: &mut SymbolTable,
    types: &TypeInfo,
    sink: &mut dyn DiagnosticSink,
) -> SemanticPassResult {
    table.reset();
    let mut generator = Generator {
        cfg,
        table,
        types,
        sink,
        errors: 0,
    };
    generator.main_class(&program.main);
    for class in &program.classes {
        generator.class(class);
    }
    SemanticPassResult {
        error_count: generator.errors,
    }
}

struct Generator<'c, 't, 'i, 'd> {
    cfg: &'c mut Cfg,
    table: &'t mut SymbolTable,
    types: &'i TypeInfo,
    sink: &'d mut dyn DiagnosticSink,
    errors: usize,
}

impl Generator<'_, '_, '_, '_> {
    fn main_class(&mut self, main: &MainClass) {
        self.table.enter_class_scope(&main.name);
        self.table.enter_method_scope("main");

        let root = self.cfg.add_method_root(&main.name, "main");
        self.cfg.set_current(root);
        for statement in &main.body {
            self.statement(statement);
        }

        self.table.exit_scope();
        self.table.exit_scope();
    }

    fn class(&mut self, class: &ClassDecl) {
        if self.table.lookup_class(&class.name).is_none() {
            self.error(
                class.line,
                format!("IR generation could not find class '{}'.", class.name),
            );
            return;
        }

        self.table.enter_class_scope(&class.name);
        for method in &class.methods {
            self.method(&class.name, method);
        }
        self.table.exit_scope();
    }

    fn method(&mut self, class_name: &str, method: &MethodDecl) {
        if self.table.lookup_method(&method.name).is_none() {
            self.error(
                method.line,
                format!("IR generation could not find method '{}'.", method.name),
            );
            return;
        }

        self.table.enter_method_scope(&method.name);

        let root = self.cfg.add_method_root(class_name, &method.name);
        self.cfg.set_current(root);
        for statement in &method.body {
            self.statement(statement);
        }
        let value = self.eval(&method.return_expr);
        self.cfg.add_instruction(Tac::Return { value });

        self.table.exit_scope();
    }

    fn statement(&mut self, statement: &Statement) {
        match &statement.kind {
            StatementKind::Block(statements) => {
                for child in statements {
                    self.statement(child);
                }
            }
            StatementKind::Assign { name, value } => {
                let value = self.eval(value);
                self.cfg.add_instruction(Tac::Copy {
                    result: name.clone(),
                    value,
                });
            }
            StatementKind::ArrayAssign {
                array,
                index,
                value,
            } => {
                let index = self.eval(index);
                let value = self.eval(value);
                self.cfg.add_instruction(Tac::ArrayStore {
                    array: array.clone(),
                    index,
                    value,
                });
            }
            StatementKind::Print(value) => {
                let value = self.eval(value);
                self.cfg.add_instruction(Tac::Print { value });
            }
            StatementKind::If {
                condition,
                then_branch,
            } => self.lower_if(condition, then_branch, None),
            StatementKind::IfElse {
                condition,
                then_branch,
                else_branch,
            } => self.lower_if(condition, then_branch, Some(else_branch)),
            StatementKind::While { condition, body } => self.lower_while(condition, body),
            StatementKind::Empty => {}
        }
    }

    fn lower_if(&mut self, condition: &Expr, then_branch: &Statement, else_branch: Option<&Statement>) {
        let then_block = self.cfg.new_block();
        let else_block = else_branch.map(|_| self.cfg.new_block());
        let join_block = self.cfg.new_block();

        let then_label = self.cfg.block_name(then_block).to_string();
        let join_label = self.cfg.block_name(join_block).to_string();
        // The false arm: the else block when there is one, otherwise the join.
        let false_block = else_block.unwrap_or(join_block);
        let false_label = self.cfg.block_name(false_block).to_string();

        let condition = self.eval(condition);
        self.cfg.add_instruction(Tac::CondJump {
            target: false_label,
            condition,
        });
        self.cfg.add_instruction(Tac::Jump { target: then_label });
        let entry = self.current_block();
        self.cfg.set_true_exit(entry, then_block);
        self.cfg.set_false_exit(entry, false_block);

        self.cfg.set_current(then_block);
        self.statement(then_branch);
        self.cfg.add_instruction(Tac::Jump {
            target: join_label.clone(),
        });
        let then_end = self.current_block();
        self.cfg.set_true_exit(then_end, join_block);

        if let (Some(else_block), Some(else_branch)) = (else_block, else_branch) {
            self.cfg.set_current(else_block);
            self.statement(else_branch);
            self.cfg.add_instruction(Tac::Jump { target: join_label });
            let else_end = self.current_block();
            self.cfg.set_true_exit(else_end, join_block);
        }

        self.cfg.set_current(join_block);
    }

    fn lower_while(&mut self, condition: &Expr, body: &Statement) {
        let header_block = self.cfg.new_block();
        let body_block = self.cfg.new_block();
        let join_block = self.cfg.new_block();

        let header_label = self.cfg.block_name(header_block).to_string();
        let body_label = self.cfg.block_name(body_block).to_string();
        let join_label = self.cfg.block_name(join_block).to_string();

        let entry = self.current_block();
        self.cfg.set_true_exit(entry, header_block);
        self.cfg.add_instruction(Tac::Jump {
            target: header_label.clone(),
        });

        self.cfg.set_current(header_block);
        let condition = self.eval(condition);
        // Condition evaluation may have opened new blocks; the conditional
        // exits belong to wherever it ended.
        let condition_block = self.current_block();
        self.cfg.add_instruction(Tac::CondJump {
            target: join_label,
            condition,
        });
        self.cfg.add_instruction(Tac::Jump { target: body_label });
        self.cfg.set_true_exit(condition_block, body_block);
        self.cfg.set_false_exit(condition_block, join_block);

        self.cfg.set_current(body_block);
        self.statement(body);
        self.cfg.add_instruction(Tac::Jump {
            target: header_label,
        });
        let body_end = self.current_block();
        self.cfg.set_true_exit(body_end, header_block);

        self.cfg.set_current(join_block);
    }

    fn eval(&mut self, expr: &Expr) -> Operand {
        match &expr.kind {
            ExprKind::IntLiteral(value) => Operand::Imm(*value),
            ExprKind::True => Operand::Imm(1),
            ExprKind::False => Operand::Imm(0),
            ExprKind::This => Operand::var("this"),
            ExprKind::Identifier(name) => Operand::var(name.clone()),
            ExprKind::Binary { op, lhs, rhs } => {
                if op.is_logical() {
                    self.short_circuit(*op, lhs, rhs)
                } else {
                    self.binary(*op, lhs, rhs)
                }
            }
            ExprKind::Not(operand) => {
                let value = self.eval(operand);
                let result = self.fresh_temp(Type::Boolean);
                self.cfg.add_instruction(Tac::Not {
                    result: result.clone(),
                    value,
                });
                Operand::Var(result)
            }
            ExprKind::ArrayAccess { array, index } => {
                let array = self.eval(array);
                let index = self.eval(index);
                let result = self.fresh_temp(Type::Int);
                self.cfg.add_instruction(Tac::ArrayAccess {
                    result: result.clone(),
                    array,
                    index,
                });
                Operand::Var(result)
            }
            ExprKind::ArrayLength(array) => {
                let result = self.fresh_temp(Type::Int);
                let array = self.eval(array);
                self.cfg.add_instruction(Tac::ArrayLength {
                    result: result.clone(),
                    array,
                });
                Operand::Var(result)
            }
            ExprKind::NewIntArray(length) => {
                let result = self.fresh_temp(Type::IntArray);
                let length = self.eval(length);
                self.cfg.add_instruction(Tac::NewArray {
                    result: result.clone(),
                    length,
                });
                Operand::Var(result)
            }
            ExprKind::NewObject(class_name) => {
                let result = self.fresh_temp(Type::Class(class_name.clone()));
                self.cfg.add_instruction(Tac::New {
                    result: result.clone(),
                    class_name: class_name.clone(),
                });
                Operand::Var(result)
            }
            ExprKind::Call {
                receiver,
                method,
                args,
            } => self.call(expr.line, receiver, method, args),
        }
    }

    fn binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Operand {
        let lhs = self.eval(lhs);
        let rhs = self.eval(rhs);
        let ty = if op.is_arithmetic() {
            Type::Int
        } else {
            Type::Boolean
        };
        let result = self.fresh_temp(ty);
        self.cfg.add_instruction(Tac::Binary {
            op,
            result: result.clone(),
            lhs,
            rhs,
        });
        Operand::Var(result)
    }

    /// `a && b` evaluates `b` only when `a` is true; `a || b` only when `a`
    /// is false. The result temporary is written 1 in the true arm and 0 in
    /// the false arm.
    fn short_circuit(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Operand {
        let lhs_value = self.eval(lhs);
        let result = self.fresh_temp(Type::Boolean);

        let rhs_block = self.cfg.new_block();
        let true_block = self.cfg.new_block();
        let false_block = self.cfg.new_block();
        let join_block = self.cfg.new_block();

        let rhs_label = self.cfg.block_name(rhs_block).to_string();
        let true_label = self.cfg.block_name(true_block).to_string();
        let false_label = self.cfg.block_name(false_block).to_string();
        let join_label = self.cfg.block_name(join_block).to_string();

        let entry = self.current_block();
        match op {
            BinaryOp::And => {
                // lhs false: short-circuit to the false arm.
                self.cfg.add_instruction(Tac::CondJump {
                    target: false_label.clone(),
                    condition: lhs_value,
                });
                self.cfg.add_instruction(Tac::Jump {
                    target: rhs_label,
                });
                self.cfg.set_true_exit(entry, rhs_block);
                self.cfg.set_false_exit(entry, false_block);
            }
            _ => {
                // lhs false: evaluate rhs; lhs true: short-circuit to true.
                self.cfg.add_instruction(Tac::CondJump {
                    target: rhs_label,
                    condition: lhs_value,
                });
                self.cfg.add_instruction(Tac::Jump {
                    target: true_label.clone(),
                });
                self.cfg.set_true_exit(entry, true_block);
                self.cfg.set_false_exit(entry, rhs_block);
            }
        }

        self.cfg.set_current(rhs_block);
        let rhs_value = self.eval(rhs);
        self.cfg.add_instruction(Tac::CondJump {
            target: false_label,
            condition: rhs_value,
        });
        self.cfg.add_instruction(Tac::Jump {
            target: true_label,
        });
        let rhs_end = self.current_block();
        self.cfg.set_true_exit(rhs_end, true_block);
        self.cfg.set_false_exit(rhs_end, false_block);

        self.cfg.set_current(true_block);
        self.cfg.add_instruction(Tac::Copy {
            result: result.clone(),
            value: Operand::Imm(1),
        });
        self.cfg.add_instruction(Tac::Jump {
            target: join_label.clone(),
        });
        self.cfg.set_true_exit(true_block, join_block);

        self.cfg.set_current(false_block);
        self.cfg.add_instruction(Tac::Copy {
            result: result.clone(),
            value: Operand::Imm(0),
        });
        self.cfg.add_instruction(Tac::Jump { target: join_label });
        self.cfg.set_true_exit(false_block, join_block);

        self.cfg.set_current(join_block);
        Operand::Var(result)
    }

    fn call(&mut self, line: u32, receiver: &Expr, method_name: &str, args: &[Expr]) -> Operand {
        let receiver_class = self
            .types
            .get(receiver.id)
            .and_then(|ty| ty.class_name())
            .map(str::to_string);
        let Some(class_name) = receiver_class else {
            self.error(
                line,
                format!("IR generation is missing the receiver class for call to '{method_name}'."),
            );
            return Operand::empty();
        };

        let Some(record) = self.table.method_in_class(&class_name, method_name).cloned() else {
            self.error(
                line,
                format!(
                    "IR generation could not find method '{class_name}.{method_name}'."
                ),
            );
            return Operand::empty();
        };

        let receiver = self.eval(receiver);
        for arg in args {
            let value = self.eval(arg);
            self.cfg.add_instruction(Tac::Param { value });
        }

        let result = self.fresh_temp(record.return_type.clone());
        self.cfg.add_instruction(Tac::Call {
            result: result.clone(),
            receiver,
            method: format!("{class_name}.{method_name}"),
            arg_count: args.len(),
        });
        Operand::Var(result)
    }

    /// Fresh temporary registered in the current method scope.
    fn fresh_temp(&mut self, ty: Type) -> String {
        let name = self.cfg.temp_name();
        self.table.add_variable(ty, &name);
        name
    }

    /// The construction cursor. Lowering always runs inside a method root,
    /// but recover with a fresh block rather than poisoning the graph.
    fn current_block(&mut self) -> BlockId {
        if let Some(current) = self.cfg.current() {
            return current;
        }
        let block = self.cfg.new_block();
        self.cfg.set_current(block);
        block
    }

    fn error(&mut self, line: u32, detail: String) {
        self.errors += 1;
        self.sink.emit(Diagnostic::error(
            format!("Error: (line {line}) {detail}"),
            SourceSpan::for_line(line),
        ));
    }
}
