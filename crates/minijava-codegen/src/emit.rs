//! Lowering from the CFG to the bytecode container.
//!
//! One `BytecodeMethod` per method root, labelled `ClassName.methodName`,
//! carrying the method scope's variables and the enclosing class's field
//! names, both in declaration order. Blocks are emitted depth-first, true
//! exit before false exit. The method's first block opens with one
//! `STORE <param>` per formal parameter in reverse order, so callers push
//! arguments left-to-right; the entry method's first block is closed with
//! `STOP` after all methods are emitted.

use std::collections::HashSet;

use thiserror::Error;

use minijava_bytecode::{BytecodeMethod, BytecodeMethodBlock, BytecodeProgram};
use minijava_ir::cfg::{BlockId, Cfg};
use minijava_ir::tac::{Operand, Tac};
use minijava_sema::scope::SymbolTable;
use minijava_syntax::ast::BinaryOp;

/// Emission fails only on upstream bugs: a method root whose scope or record
/// the symbol table cannot resolve.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("no scope recorded for method '{0}'")]
    MissingScope(String),

    #[error("no class record for '{0}'")]
    MissingClass(String),

    #[error("no method record for '{0}'")]
    MissingMethod(String),

    #[error("program has no entry method")]
    NoEntry,
}

pub fn emit_bytecode(cfg: &Cfg, table: &SymbolTable) -> Result<BytecodeProgram, EmitError> {
    let mut program = BytecodeProgram::new();

    for &root in cfg.roots() {
        emit_method(cfg, table, root, &mut program)?;
    }

    let entry_name = cfg
        .roots()
        .first()
        .map(|&root| cfg.block_name(root).to_string())
        .ok_or(EmitError::NoEntry)?;
    let entry_block = program
        .method_mut(&entry_name)
        .and_then(BytecodeMethod::first_block_mut)
        .ok_or(EmitError::NoEntry)?;
    entry_block.stop();

    Ok(program)
}

fn emit_method(
    cfg: &Cfg,
    table: &SymbolTable,
    root: BlockId,
    program: &mut BytecodeProgram,
) -> Result<(), EmitError> {
    let label = cfg.block_name(root).to_string();
    let (class_name, method_name) = label
        .split_once('.')
        .ok_or_else(|| EmitError::MissingScope(label.clone()))?;

    let scope = table
        .resolve_scope(class_name, method_name)
        .ok_or_else(|| EmitError::MissingScope(label.clone()))?;
    let variables = table.scope(scope).variable_names();

    let class = table
        .lookup_class(class_name)
        .ok_or_else(|| EmitError::MissingClass(class_name.to_string()))?;
    let field_variables: Vec<String> = class.fields.keys().cloned().collect();

    let parameters = table
        .method_in_class(class_name, method_name)
        .map(|record| record.param_names())
        .ok_or_else(|| EmitError::MissingMethod(label.clone()))?;

    let method = program.add_method(label.clone(), variables, field_variables);

    // Callers push arguments left-to-right; the callee pops them in reverse.
    let root_block = method.block_mut(&label);
    for parameter in parameters.iter().rev() {
        root_block.store(parameter);
    }

    let mut generated = HashSet::new();
    emit_block(cfg, root, method, &mut generated);
    Ok(())
}

fn emit_block(cfg: &Cfg, id: BlockId, method: &mut BytecodeMethod, generated: &mut HashSet<BlockId>) {
    if !generated.insert(id) {
        return;
    }

    let name = cfg.block_name(id).to_string();
    let block = method.block_mut(&name);
    for tac in cfg.block(id).instructions() {
        lower(tac, block);
    }

    if let Some(true_exit) = cfg.true_exit(id) {
        emit_block(cfg, true_exit, method, generated);
    }
    if let Some(false_exit) = cfg.false_exit(id) {
        emit_block(cfg, false_exit, method, generated);
    }
}

fn lower(tac: &Tac, block: &mut BytecodeMethodBlock) {
    match tac {
        Tac::Binary {
            op,
            result,
            lhs,
            rhs,
        } => {
            push(block, lhs);
            push(block, rhs);
            match op {
                BinaryOp::Add => block.add(),
                BinaryOp::Sub => block.subtract(),
                BinaryOp::Mul => block.multiply(),
                BinaryOp::Div => block.divide(),
                BinaryOp::Lt => block.less_than(),
                BinaryOp::Gt => block.greater_than(),
                BinaryOp::Eq => block.equal_to(),
                BinaryOp::And => block.and(),
                BinaryOp::Or => block.or(),
            };
            block.store(result);
        }
        Tac::Not { result, value } => {
            push(block, value);
            block.not().store(result);
        }
        Tac::Copy { result, value } => {
            push(block, value);
            block.store(result);
        }
        Tac::ArrayAccess {
            result,
            array,
            index,
        } => {
            push(block, array);
            push(block, index);
            block.array_load().store(result);
        }
        Tac::ArrayStore {
            array,
            index,
            value,
        } => {
            block.load(array);
            push(block, index);
            push(block, value);
            block.array_store();
        }
        Tac::ArrayLength { result, array } => {
            push(block, array);
            block.array_length().store(result);
        }
        Tac::New { result, class_name } => {
            block.new_object(class_name).store(result);
        }
        Tac::NewArray { result, length } => {
            push(block, length);
            block.new_array().store(result);
        }
        Tac::Jump { target } => {
            block.jump(target);
        }
        Tac::CondJump { target, condition } => {
            push(block, condition);
            block.cjump(target);
        }
        Tac::Param { value } => {
            push(block, value);
        }
        Tac::Call {
            result,
            receiver,
            method,
            ..
        } => {
            push(block, receiver);
            block.call(method).store(result);
        }
        Tac::Return { value } => {
            push(block, value);
            block.ret();
        }
        Tac::Print { value } => {
            push(block, value);
            block.print();
        }
    }
}

fn push(block: &mut BytecodeMethodBlock, operand: &Operand) {
    match operand {
        Operand::Imm(value) => block.constant(*value),
        Operand::Var(name) => block.load(name),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijava_bytecode::Opcode;
    use minijava_syntax::ast::Type;

    /// Hand-assemble a one-method CFG with matching scopes.
    fn tiny_setup() -> (Cfg, SymbolTable) {
        let mut table = SymbolTable::new();
        table.add_class("Main");
        table.enter_class_scope("Main");
        table.add_variable(Type::Class("Main".into()), "this");
        if let Some(class) = table.lookup_class_mut("Main") {
            class.fields.insert("this".into(), Type::Class("Main".into()));
        }
        table.add_method(Type::Void, "main");
        table.enter_method_scope("main");
        table.add_variable(Type::StringArray, "args");
        table.reset();

        let mut cfg = Cfg::new();
        let root = cfg.add_method_root("Main", "main");
        cfg.set_current(root);
        cfg.add_instruction(Tac::Print {
            value: Operand::Imm(7),
        });
        (cfg, table)
    }

    #[test]
    fn entry_method_gets_stop() {
        let (cfg, table) = tiny_setup();
        let program = emit_bytecode(&cfg, &table).unwrap();

        let main = program.entry().unwrap();
        assert_eq!(main.name(), "Main.main");
        assert_eq!(main.variables(), &["args".to_string()]);
        assert_eq!(main.field_variables(), &["this".to_string()]);

        let opcodes: Vec<Opcode> = main.instructions().map(|i| i.opcode()).collect();
        assert_eq!(opcodes, vec![Opcode::Const, Opcode::Print, Opcode::Stop]);
    }

    #[test]
    fn parameters_are_stored_in_reverse() {
        let mut table = SymbolTable::new();
        table.add_class("Foo");
        table.enter_class_scope("Foo");
        table.add_variable(Type::Class("Foo".into()), "this");
        if let Some(class) = table.lookup_class_mut("Foo") {
            class.fields.insert("this".into(), Type::Class("Foo".into()));
        }
        table.add_method(Type::Int, "add");
        table.enter_method_scope("add");
        table.add_variable(Type::Int, "a");
        table.add_variable(Type::Int, "b");
        if let Some(record) = table.lookup_method_mut("add") {
            record.params.push(minijava_sema::VariableRecord::new("a", Type::Int));
            record.params.push(minijava_sema::VariableRecord::new("b", Type::Int));
        }
        table.reset();

        let mut cfg = Cfg::new();
        let root = cfg.add_method_root("Foo", "add");
        cfg.set_current(root);
        cfg.add_instruction(Tac::Return {
            value: Operand::var("a"),
        });

        let program = emit_bytecode(&cfg, &table).unwrap();
        let add = program.method("Foo.add").unwrap();
        assert_eq!(add.variables(), &["a".to_string(), "b".to_string()]);
        let first: Vec<String> = add.blocks()[0]
            .instructions()
            .iter()
            .take(2)
            .map(|i| i.to_string())
            .collect();
        assert_eq!(first, vec!["ISTORE\tb", "ISTORE\ta"]);
    }
}
