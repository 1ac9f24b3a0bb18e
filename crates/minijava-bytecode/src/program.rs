//! The bytecode container: program → methods → labelled blocks.
//!
//! [`BytecodeMethodBlock`] exposes a fluent builder with one method per
//! opcode, so the emitter reads like the instruction sequence it produces:
//! `block.load("x").constant(1).add().store("y")`.
//!
//! The first method added is the program entry; its first block ends with
//! `STOP` while every other method returns to its caller through `RET`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::instruction::Instruction;
use crate::opcode::Opcode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BytecodeMethodBlock {
    name: String,
    instructions: Vec<Instruction>,
}

impl BytecodeMethodBlock {
    fn new(name: String) -> Self {
        BytecodeMethodBlock {
            name,
            instructions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn push_instruction(&mut self, instruction: Instruction) -> &mut Self {
        self.instructions.push(instruction);
        self
    }

    pub fn load(&mut self, name: impl Into<String>) -> &mut Self {
        self.push_instruction(Instruction::Str(Opcode::Load, name.into()))
    }

    pub fn constant(&mut self, value: i64) -> &mut Self {
        self.push_instruction(Instruction::Int(Opcode::Const, value))
    }

    pub fn store(&mut self, name: impl Into<String>) -> &mut Self {
        self.push_instruction(Instruction::Str(Opcode::Store, name.into()))
    }

    pub fn add(&mut self) -> &mut Self {
        self.push_instruction(Instruction::Stack(Opcode::Add))
    }

    pub fn subtract(&mut self) -> &mut Self {
        self.push_instruction(Instruction::Stack(Opcode::Sub))
    }

    pub fn multiply(&mut self) -> &mut Self {
        self.push_instruction(Instruction::Stack(Opcode::Mul))
    }

    pub fn divide(&mut self) -> &mut Self {
        self.push_instruction(Instruction::Stack(Opcode::Div))
    }

    pub fn less_than(&mut self) -> &mut Self {
        self.push_instruction(Instruction::Stack(Opcode::Lt))
    }

    pub fn greater_than(&mut self) -> &mut Self {
        self.push_instruction(Instruction::Stack(Opcode::Gt))
    }

    pub fn equal_to(&mut self) -> &mut Self {
        self.push_instruction(Instruction::Stack(Opcode::Eq))
    }

    pub fn and(&mut self) -> &mut Self {
        self.push_instruction(Instruction::Stack(Opcode::And))
    }

    pub fn or(&mut self) -> &mut Self {
        self.push_instruction(Instruction::Stack(Opcode::Or))
    }

    pub fn not(&mut self) -> &mut Self {
        self.push_instruction(Instruction::Stack(Opcode::Not))
    }

    pub fn jump(&mut self, target: impl Into<String>) -> &mut Self {
        self.push_instruction(Instruction::Str(Opcode::Jmp, target.into()))
    }

    pub fn cjump(&mut self, target: impl Into<String>) -> &mut Self {
        self.push_instruction(Instruction::Str(Opcode::Cjmp, target.into()))
    }

    pub fn call(&mut self, method: impl Into<String>) -> &mut Self {
        self.push_instruction(Instruction::Str(Opcode::Call, method.into()))
    }

    pub fn ret(&mut self) -> &mut Self {
        self.push_instruction(Instruction::Stack(Opcode::Ret))
    }

    pub fn print(&mut self) -> &mut Self {
        self.push_instruction(Instruction::Stack(Opcode::Print))
    }

    pub fn stop(&mut self) -> &mut Self {
        self.push_instruction(Instruction::Stack(Opcode::Stop))
    }

    pub fn new_object(&mut self, class_name: impl Into<String>) -> &mut Self {
        self.push_instruction(Instruction::Str(Opcode::New, class_name.into()))
    }

    pub fn new_array(&mut self) -> &mut Self {
        self.push_instruction(Instruction::Stack(Opcode::NewArray))
    }

    pub fn array_load(&mut self) -> &mut Self {
        self.push_instruction(Instruction::Stack(Opcode::ArrayLoad))
    }

    pub fn array_store(&mut self) -> &mut Self {
        self.push_instruction(Instruction::Stack(Opcode::ArrayStore))
    }

    pub fn array_length(&mut self) -> &mut Self {
        self.push_instruction(Instruction::Stack(Opcode::ArrayLength))
    }
}

/// One compiled method: its label, the local variable names of its scope
/// (parameters, user locals, IR temporaries, in declaration order), the
/// field names of its enclosing class, and its blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BytecodeMethod {
    name: String,
    variables: Vec<String>,
    field_variables: Vec<String>,
    blocks: Vec<BytecodeMethodBlock>,
}

impl BytecodeMethod {
    pub fn new(name: String, variables: Vec<String>, field_variables: Vec<String>) -> Self {
        BytecodeMethod {
            name,
            variables,
            field_variables,
            blocks: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn field_variables(&self) -> &[String] {
        &self.field_variables
    }

    pub fn blocks(&self) -> &[BytecodeMethodBlock] {
        &self.blocks
    }

    pub fn add_block(&mut self, name: impl Into<String>) -> &mut BytecodeMethodBlock {
        self.blocks.push(BytecodeMethodBlock::new(name.into()));
        let index = self.blocks.len() - 1;
        &mut self.blocks[index]
    }

    /// Find-or-create, like the emitter expects when it reaches a block by
    /// name before visiting it.
    pub fn block_mut(&mut self, name: &str) -> &mut BytecodeMethodBlock {
        if let Some(index) = self.blocks.iter().position(|block| block.name() == name) {
            return &mut self.blocks[index];
        }
        self.add_block(name)
    }

    pub fn block(&self, name: &str) -> Option<&BytecodeMethodBlock> {
        self.blocks.iter().find(|block| block.name() == name)
    }

    pub fn first_block_mut(&mut self) -> Option<&mut BytecodeMethodBlock> {
        self.blocks.first_mut()
    }

    /// Every instruction of every block, in listing order.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.blocks.iter().flat_map(|block| block.instructions())
    }
}

/// An ordered set of methods; the first is the entry point.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BytecodeProgram {
    methods: Vec<BytecodeMethod>,
}

impl BytecodeProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_method(
        &mut self,
        name: impl Into<String>,
        variables: Vec<String>,
        field_variables: Vec<String>,
    ) -> &mut BytecodeMethod {
        self.methods
            .push(BytecodeMethod::new(name.into(), variables, field_variables));
        let index = self.methods.len() - 1;
        &mut self.methods[index]
    }

    pub fn methods(&self) -> &[BytecodeMethod] {
        &self.methods
    }

    pub fn entry(&self) -> Option<&BytecodeMethod> {
        self.methods.first()
    }

    pub fn method(&self, name: &str) -> Option<&BytecodeMethod> {
        self.methods.iter().find(|method| method.name() == name)
    }

    pub fn method_mut(&mut self, name: &str) -> Option<&mut BytecodeMethod> {
        self.methods.iter_mut().find(|method| method.name() == name)
    }

    /// Every instruction of every method, used by tests inspecting the
    /// effect of IR passes.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.methods.iter().flat_map(|method| method.instructions())
    }
}

impl fmt::Display for BytecodeProgram {
    /// The `bytecode.txt` listing: methods, their blocks, one mnemonic per
    /// line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for method in &self.methods {
            writeln!(f, "method {}", method.name())?;
            for block in method.blocks() {
                writeln!(f, "\tblock {}", block.name())?;
                for instruction in block.instructions() {
                    writeln!(f, "\t\t{instruction}")?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fluent_builder_appends_in_order() {
        let mut program = BytecodeProgram::new();
        let method = program.add_method("Foo.run", vec!["x".into()], vec!["this".into()]);
        method
            .add_block("Foo.run")
            .load("x")
            .constant(1)
            .add()
            .store("x")
            .ret();

        let block = program.method("Foo.run").unwrap().block("Foo.run").unwrap();
        let opcodes: Vec<Opcode> = block.instructions().iter().map(|i| i.opcode()).collect();
        assert_eq!(
            opcodes,
            vec![Opcode::Load, Opcode::Const, Opcode::Add, Opcode::Store, Opcode::Ret]
        );
    }

    #[test]
    fn block_mut_creates_on_demand() {
        let mut program = BytecodeProgram::new();
        let method = program.add_method("A.m", vec![], vec![]);
        method.block_mut("block_0").constant(1);
        method.block_mut("block_0").constant(2);
        assert_eq!(method.blocks().len(), 1);
        assert_eq!(method.block("block_0").unwrap().instructions().len(), 2);
    }

    #[test]
    fn entry_is_the_first_method() {
        let mut program = BytecodeProgram::new();
        program.add_method("Main.main", vec![], vec![]);
        program.add_method("Foo.run", vec![], vec![]);
        assert_eq!(program.entry().unwrap().name(), "Main.main");
    }

    #[test]
    fn listing_mentions_methods_blocks_and_mnemonics() {
        let mut program = BytecodeProgram::new();
        let method = program.add_method("Main.main", vec![], vec![]);
        method.add_block("Main.main").constant(42).print().stop();

        let listing = program.to_string();
        assert_eq!(program.instructions().count(), 3);
        assert!(listing.contains("method Main.main"));
        assert!(listing.contains("\tblock Main.main"));
        assert!(listing.contains("ICONST\t42"));
        assert!(listing.contains("PRINT"));
        assert!(listing.contains("STOP"));
    }

    #[test]
    fn program_serde_round_trip() {
        let mut program = BytecodeProgram::new();
        let method = program.add_method("Main.main", vec!["args".into()], vec!["this".into()]);
        method.add_block("Main.main").constant(7).print().stop();

        let json = serde_json::to_string(&program).unwrap();
        let back: BytecodeProgram = serde_json::from_str(&json).unwrap();
        assert_eq!(program, back);
    }
}
