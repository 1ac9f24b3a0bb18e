//! The interpreter: activation records, heaps, and the dispatch loop.

use std::collections::{HashMap, HashSet};
use std::io::Write;

use indexmap::IndexMap;

use minijava_bytecode::{BytecodeProgram, Instruction, Opcode};

use crate::error::RuntimeError;

/// A heap-allocated object: its class and one slot per field.
#[derive(Debug)]
struct ObjectInstance {
    class_name: String,
    fields: HashMap<String, i64>,
}

/// A method as loaded into the VM: local names, enclosing-class field names,
/// and its blocks keyed by label.
#[derive(Debug)]
struct MethodImage {
    locals: Vec<String>,
    fields: Vec<String>,
    blocks: IndexMap<String, Vec<Instruction>>,
}

/// One frame of the activation stack.
#[derive(Debug)]
struct Activation {
    method: String,
    block: String,
    pc: usize,
    locals: HashMap<String, i64>,
    fields: HashSet<String>,
    this_ref: i64,
}

impl Activation {
    fn new(label: &str, image: &MethodImage) -> Self {
        Activation {
            method: label.to_string(),
            block: label.to_string(),
            pc: 0,
            locals: image.locals.iter().map(|name| (name.clone(), 0)).collect(),
            fields: image.fields.iter().cloned().collect(),
            this_ref: 0,
        }
    }

    fn jump(&mut self, block: String) {
        self.block = block;
        self.pc = 0;
    }
}

/// The stack machine. Object and array references are 1-based indices into
/// their grow-only heaps; 0 is the null reference.
#[derive(Debug)]
pub struct Vm {
    methods: IndexMap<String, MethodImage>,
    class_fields: HashMap<String, Vec<String>>,
    data: Vec<i64>,
    activations: Vec<Activation>,
    current: Activation,
    objects: Vec<ObjectInstance>,
    arrays: Vec<Vec<i64>>,
}

fn class_of_label(label: &str) -> &str {
    label.split_once('.').map(|(class, _)| class).unwrap_or(label)
}

impl Vm {
    /// Load a program. The first method is the entry point.
    pub fn new(program: &BytecodeProgram) -> Result<Self, RuntimeError> {
        let mut methods = IndexMap::new();
        for method in program.methods() {
            let mut blocks = IndexMap::new();
            for block in method.blocks() {
                blocks.insert(block.name().to_string(), block.instructions().to_vec());
            }
            methods.insert(
                method.name().to_string(),
                MethodImage {
                    locals: method.variables().to_vec(),
                    fields: method.field_variables().to_vec(),
                    blocks,
                },
            );
        }

        let mut class_fields: HashMap<String, Vec<String>> = HashMap::new();
        for (label, image) in &methods {
            let fields = class_fields
                .entry(class_of_label(label).to_string())
                .or_default();
            for field in &image.fields {
                if !fields.contains(field) {
                    fields.push(field.clone());
                }
            }
        }

        let entry = program
            .entry()
            .map(|method| method.name().to_string())
            .ok_or(RuntimeError::EmptyProgram)?;
        let current = methods
            .get(&entry)
            .map(|image| Activation::new(&entry, image))
            .ok_or(RuntimeError::EmptyProgram)?;

        Ok(Vm {
            methods,
            class_fields,
            data: Vec::new(),
            activations: Vec::new(),
            current,
            objects: Vec::new(),
            arrays: Vec::new(),
        })
    }

    /// Interpret until `STOP`, writing `println` output to `out`. Any trap
    /// aborts with the corresponding [`RuntimeError`].
    pub fn run(&mut self, out: &mut impl Write) -> Result<(), RuntimeError> {
        loop {
            let instruction = self.fetch()?;
            tracing::trace!(%instruction, block = %self.current.block, "step");
            match instruction {
                Instruction::Stack(Opcode::Stop) => return Ok(()),
                Instruction::Int(Opcode::Const, value) => self.push(value),
                Instruction::Str(Opcode::Load, name) => {
                    let value = self.load_variable(&name)?;
                    self.push(value);
                }
                Instruction::Str(Opcode::Store, name) => {
                    let value = self.pop()?;
                    self.store_variable(&name, value)?;
                }
                Instruction::Str(Opcode::Jmp, target) => self.current.jump(target),
                Instruction::Str(Opcode::Cjmp, target) => {
                    if self.pop()? == 0 {
                        self.current.jump(target);
                    }
                }
                Instruction::Str(Opcode::Call, label) => self.call(&label)?,
                Instruction::Str(Opcode::New, class_name) => {
                    let reference = self.allocate_object(&class_name);
                    self.push(reference);
                }
                Instruction::Stack(opcode) => self.stack_op(opcode, out)?,
                other => return Err(RuntimeError::MalformedInstruction(other.opcode())),
            }
        }
    }

    fn stack_op(&mut self, opcode: Opcode, out: &mut impl Write) -> Result<(), RuntimeError> {
        match opcode {
            Opcode::Add => {
                let a = self.pop()?;
                let b = self.pop()?;
                self.push(b.wrapping_add(a));
            }
            Opcode::Sub => {
                let a = self.pop()?;
                let b = self.pop()?;
                self.push(b.wrapping_sub(a));
            }
            Opcode::Mul => {
                let a = self.pop()?;
                let b = self.pop()?;
                self.push(b.wrapping_mul(a));
            }
            Opcode::Div => {
                let a = self.pop()?;
                let b = self.pop()?;
                if a == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                self.push(b.wrapping_div(a));
            }
            Opcode::Lt => {
                let a = self.pop()?;
                let b = self.pop()?;
                self.push(i64::from(b < a));
            }
            Opcode::Gt => {
                let a = self.pop()?;
                let b = self.pop()?;
                self.push(i64::from(b > a));
            }
            Opcode::Eq => {
                let a = self.pop()?;
                let b = self.pop()?;
                self.push(i64::from(a == b));
            }
            Opcode::And => {
                let a = self.pop()?;
                let b = self.pop()?;
                self.push(i64::from(a != 0 && b != 0));
            }
            Opcode::Or => {
                let a = self.pop()?;
                let b = self.pop()?;
                self.push(i64::from(a != 0 || b != 0));
            }
            Opcode::Not => {
                let a = self.pop()?;
                self.push(i64::from(a == 0));
            }
            Opcode::Ret => {
                self.current = self
                    .activations
                    .pop()
                    .ok_or(RuntimeError::ActivationUnderflow)?;
            }
            Opcode::Print => {
                let value = self.pop()?;
                writeln!(out, "{value}")?;
            }
            Opcode::NewArray => {
                let length = self.pop()?;
                if length < 0 {
                    return Err(RuntimeError::NegativeArrayLength(length));
                }
                self.arrays.push(vec![0; length as usize]);
                self.push(self.arrays.len() as i64);
            }
            Opcode::ArrayLoad => {
                let index = self.pop()?;
                let reference = self.pop()?;
                let array = self.array(reference)?;
                let length = array.len();
                if index < 0 || index as usize >= length {
                    return Err(RuntimeError::IndexOutOfBounds { index, length });
                }
                let value = array[index as usize];
                self.push(value);
            }
            Opcode::ArrayStore => {
                let value = self.pop()?;
                let index = self.pop()?;
                let reference = self.pop()?;
                let array = self.array_mut(reference)?;
                let length = array.len();
                if index < 0 || index as usize >= length {
                    return Err(RuntimeError::IndexOutOfBounds { index, length });
                }
                array[index as usize] = value;
            }
            Opcode::ArrayLength => {
                let reference = self.pop()?;
                let length = self.array(reference)?.len();
                self.push(length as i64);
            }
            // Parameterised opcodes cannot appear in a Stack instruction.
            Opcode::Load
            | Opcode::Const
            | Opcode::Store
            | Opcode::Jmp
            | Opcode::Cjmp
            | Opcode::Call
            | Opcode::New
            | Opcode::Stop => return Err(RuntimeError::MalformedInstruction(opcode)),
        }
        Ok(())
    }

    fn fetch(&mut self) -> Result<Instruction, RuntimeError> {
        let method = self
            .methods
            .get(&self.current.method)
            .ok_or_else(|| RuntimeError::UnknownMethod(self.current.method.clone()))?;
        let block = method
            .blocks
            .get(&self.current.block)
            .ok_or_else(|| RuntimeError::UnknownBlock(self.current.block.clone()))?;
        let instruction = block
            .get(self.current.pc)
            .ok_or_else(|| RuntimeError::PcOutOfBounds(self.current.block.clone()))?
            .clone();
        self.current.pc += 1;
        Ok(instruction)
    }

    /// `CALL` protocol: the receiver was pushed immediately before the call;
    /// it is popped here and becomes the callee's `this`.
    fn call(&mut self, label: &str) -> Result<(), RuntimeError> {
        let image = self
            .methods
            .get(label)
            .ok_or_else(|| RuntimeError::UnknownMethod(label.to_string()))?;
        let mut activation = Activation::new(label, image);
        activation.this_ref = self.pop()?;

        let caller = std::mem::replace(&mut self.current, activation);
        self.activations.push(caller);
        Ok(())
    }

    fn load_variable(&self, name: &str) -> Result<i64, RuntimeError> {
        if let Some(&value) = self.current.locals.get(name) {
            return Ok(value);
        }
        if self.current.fields.contains(name) {
            if name == "this" {
                return Ok(self.current.this_ref);
            }
            let this_ref = self.current.this_ref;
            if this_ref == 0 {
                return Err(RuntimeError::NullReceiver);
            }
            let object = self.object(this_ref)?;
            return object.fields.get(name).copied().ok_or_else(|| {
                RuntimeError::UnknownField(format!("{}.{name}", object.class_name))
            });
        }
        Err(RuntimeError::UnknownVariable(name.to_string()))
    }

    fn store_variable(&mut self, name: &str, value: i64) -> Result<(), RuntimeError> {
        if let Some(slot) = self.current.locals.get_mut(name) {
            *slot = value;
            return Ok(());
        }
        if self.current.fields.contains(name) {
            if name == "this" {
                self.current.this_ref = value;
                return Ok(());
            }
            let this_ref = self.current.this_ref;
            if this_ref == 0 {
                return Err(RuntimeError::NullReceiver);
            }
            let object = self.object_mut(this_ref)?;
            object.fields.insert(name.to_string(), value);
            return Ok(());
        }
        Err(RuntimeError::UnknownVariable(name.to_string()))
    }

    fn allocate_object(&mut self, class_name: &str) -> i64 {
        let mut fields = HashMap::new();
        if let Some(names) = self.class_fields.get(class_name) {
            for name in names {
                if name != "this" {
                    fields.insert(name.clone(), 0);
                }
            }
        }
        self.objects.push(ObjectInstance {
            class_name: class_name.to_string(),
            fields,
        });
        self.objects.len() as i64
    }

    fn object(&self, reference: i64) -> Result<&ObjectInstance, RuntimeError> {
        self.object_index(reference)
            .map(|index| &self.objects[index])
    }

    fn object_mut(&mut self, reference: i64) -> Result<&mut ObjectInstance, RuntimeError> {
        let index = self.object_index(reference)?;
        Ok(&mut self.objects[index])
    }

    fn object_index(&self, reference: i64) -> Result<usize, RuntimeError> {
        if reference <= 0 || reference as usize > self.objects.len() {
            return Err(RuntimeError::InvalidObjectReference(reference));
        }
        Ok(reference as usize - 1)
    }

    fn array(&self, reference: i64) -> Result<&Vec<i64>, RuntimeError> {
        self.array_index(reference).map(|index| &self.arrays[index])
    }

    fn array_mut(&mut self, reference: i64) -> Result<&mut Vec<i64>, RuntimeError> {
        let index = self.array_index(reference)?;
        Ok(&mut self.arrays[index])
    }

    fn array_index(&self, reference: i64) -> Result<usize, RuntimeError> {
        if reference <= 0 || reference as usize > self.arrays.len() {
            return Err(RuntimeError::InvalidArrayReference(reference));
        }
        Ok(reference as usize - 1)
    }

    fn push(&mut self, value: i64) {
        self.data.push(value);
    }

    fn pop(&mut self) -> Result<i64, RuntimeError> {
        self.data.pop().ok_or(RuntimeError::StackUnderflow)
    }

    /// Depth of the data stack; empty at `STOP` for well-formed programs.
    pub fn stack_depth(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_program(program: &BytecodeProgram) -> Result<String, RuntimeError> {
        let mut vm = Vm::new(program)?;
        let mut out = Vec::new();
        vm.run(&mut out)?;
        Ok(String::from_utf8(out).expect("decimal output"))
    }

    #[test]
    fn arithmetic_and_print() {
        let mut program = BytecodeProgram::new();
        program
            .add_method("Main.main", vec![], vec![])
            .add_block("Main.main")
            .constant(2)
            .constant(3)
            .add()
            .constant(4)
            .multiply()
            .print()
            .stop();
        assert_eq!(run_program(&program).unwrap(), "20\n");
    }

    #[test]
    fn subtraction_and_division_are_left_to_right() {
        let mut program = BytecodeProgram::new();
        program
            .add_method("Main.main", vec![], vec![])
            .add_block("Main.main")
            .constant(10)
            .constant(4)
            .subtract()
            .print()
            .constant(9)
            .constant(2)
            .divide()
            .print()
            .stop();
        assert_eq!(run_program(&program).unwrap(), "6\n4\n");
    }

    #[test]
    fn comparisons_and_logic() {
        let mut program = BytecodeProgram::new();
        program
            .add_method("Main.main", vec![], vec![])
            .add_block("Main.main")
            .constant(1)
            .constant(2)
            .less_than()
            .print()
            .constant(1)
            .constant(2)
            .greater_than()
            .print()
            .constant(3)
            .constant(3)
            .equal_to()
            .print()
            .constant(1)
            .constant(0)
            .and()
            .print()
            .constant(1)
            .constant(0)
            .or()
            .print()
            .constant(0)
            .not()
            .print()
            .stop();
        assert_eq!(run_program(&program).unwrap(), "1\n0\n1\n0\n1\n1\n");
    }

    #[test]
    fn locals_and_jumps() {
        let mut program = BytecodeProgram::new();
        let method = program.add_method("Main.main", vec!["i".into()], vec![]);
        // i = 0; while (i < 3) i = i + 1; print i
        method
            .add_block("Main.main")
            .constant(0)
            .store("i")
            .jump("header");
        method
            .add_block("header")
            .load("i")
            .constant(3)
            .less_than()
            .cjump("exit")
            .jump("body");
        method
            .add_block("body")
            .load("i")
            .constant(1)
            .add()
            .store("i")
            .jump("header");
        method.add_block("exit").load("i").print().stop();
        assert_eq!(run_program(&program).unwrap(), "3\n");
    }

    #[test]
    fn call_pops_receiver_and_returns_value() {
        let mut program = BytecodeProgram::new();
        let main = program.add_method("Main.main", vec!["_t0".into(), "_t1".into()], vec![]);
        // _t0 = new Foo(); print _t0.twice(21)
        main.add_block("Main.main")
            .new_object("Foo")
            .store("_t0")
            .constant(21)
            .load("_t0")
            .call("Foo.twice")
            .store("_t1")
            .load("_t1")
            .print()
            .stop();

        let twice = program.add_method(
            "Foo.twice",
            vec!["n".into(), "_t2".into()],
            vec!["this".into()],
        );
        twice
            .add_block("Foo.twice")
            .store("n")
            .load("n")
            .constant(2)
            .multiply()
            .store("_t2")
            .load("_t2")
            .ret();

        assert_eq!(run_program(&program).unwrap(), "42\n");
    }

    #[test]
    fn fields_live_on_the_object() {
        let mut program = BytecodeProgram::new();
        let main = program.add_method("Main.main", vec!["_t0".into(), "_t1".into()], vec![]);
        main.add_block("Main.main")
            .new_object("Counter")
            .store("_t0")
            .load("_t0")
            .call("Counter.bump")
            .store("_t1")
            .load("_t0")
            .call("Counter.bump")
            .store("_t1")
            .load("_t1")
            .print()
            .stop();

        let bump = program.add_method(
            "Counter.bump",
            vec![],
            vec!["this".into(), "count".into()],
        );
        bump.add_block("Counter.bump")
            .load("count")
            .constant(1)
            .add()
            .store("count")
            .load("count")
            .ret();

        assert_eq!(run_program(&program).unwrap(), "2\n");
    }

    #[test]
    fn arrays_allocate_load_store_length() {
        let mut program = BytecodeProgram::new();
        let main = program.add_method("Main.main", vec!["arr".into()], vec![]);
        main.add_block("Main.main")
            .constant(3)
            .new_array()
            .store("arr")
            .load("arr")
            .constant(2)
            .constant(30)
            .array_store()
            .load("arr")
            .array_length()
            .print()
            .load("arr")
            .constant(2)
            .array_load()
            .print()
            .stop();
        assert_eq!(run_program(&program).unwrap(), "3\n30\n");
    }

    #[test]
    fn out_of_bounds_access_faults() {
        let mut program = BytecodeProgram::new();
        program
            .add_method("Main.main", vec!["arr".into()], vec![])
            .add_block("Main.main")
            .constant(3)
            .new_array()
            .store("arr")
            .load("arr")
            .constant(3)
            .array_load()
            .print()
            .stop();
        assert!(matches!(
            run_program(&program),
            Err(RuntimeError::IndexOutOfBounds { index: 3, length: 3 })
        ));
    }

    #[test]
    fn division_by_zero_faults() {
        let mut program = BytecodeProgram::new();
        program
            .add_method("Main.main", vec![], vec![])
            .add_block("Main.main")
            .constant(1)
            .constant(0)
            .divide()
            .print()
            .stop();
        assert!(matches!(
            run_program(&program),
            Err(RuntimeError::DivisionByZero)
        ));
    }

    #[test]
    fn stack_underflow_faults() {
        let mut program = BytecodeProgram::new();
        program
            .add_method("Main.main", vec![], vec![])
            .add_block("Main.main")
            .add()
            .stop();
        assert!(matches!(
            run_program(&program),
            Err(RuntimeError::StackUnderflow)
        ));
    }

    #[test]
    fn unknown_variable_faults() {
        let mut program = BytecodeProgram::new();
        program
            .add_method("Main.main", vec![], vec![])
            .add_block("Main.main")
            .load("ghost")
            .print()
            .stop();
        assert!(matches!(
            run_program(&program),
            Err(RuntimeError::UnknownVariable(name)) if name == "ghost"
        ));
    }

    #[test]
    fn negative_array_length_faults() {
        let mut program = BytecodeProgram::new();
        program
            .add_method("Main.main", vec![], vec![])
            .add_block("Main.main")
            .constant(-1)
            .new_array()
            .stop();
        assert!(matches!(
            run_program(&program),
            Err(RuntimeError::NegativeArrayLength(-1))
        ));
    }

    #[test]
    fn stack_is_empty_at_stop_for_balanced_programs() {
        let mut program = BytecodeProgram::new();
        program
            .add_method("Main.main", vec![], vec![])
            .add_block("Main.main")
            .constant(5)
            .print()
            .stop();
        let mut vm = Vm::new(&program).unwrap();
        let mut out = Vec::new();
        vm.run(&mut out).unwrap();
        assert_eq!(vm.stack_depth(), 0);
    }

    #[test]
    fn empty_program_is_rejected() {
        let program = BytecodeProgram::new();
        assert!(matches!(
            Vm::new(&program),
            Err(RuntimeError::EmptyProgram)
        ));
    }
}
