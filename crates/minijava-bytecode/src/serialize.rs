//! The binary container format for `prog.bc`.
//!
//! Everything is little-endian. Counts are `u64`, `CONST` payloads `i64`,
//! opcodes one signed byte, strings a `u64` length followed by the bytes:
//!
//! ```text
//! program     := string  entry_name
//!                method  entry_method
//!                u64     other_method_count
//!                ( string method_name, method )*
//! method      := string_vec locals, string_vec fields,
//!                u64 block_count, ( string block_name, block )*
//! block       := u64 instruction_count, instruction*
//! instruction := i8 opcode, param?      -- string, i64, or absent
//! ```
//!
//! There is no magic number and no version field; this is a known
//! limitation of the format.

use std::io::{Read, Write};

use thiserror::Error;

use crate::instruction::Instruction;
use crate::opcode::{Opcode, ParamKind};
use crate::program::{BytecodeMethod, BytecodeProgram};

#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A byte that names no opcode.
    #[error("invalid opcode byte {0}")]
    InvalidOpcode(i8),

    /// A string that is not UTF-8.
    #[error("malformed string: {0}")]
    MalformedString(#[from] std::string::FromUtf8Error),

    /// An instruction whose parameter does not match its opcode's shape.
    #[error("instruction parameter does not match opcode {0:?}")]
    MalformedInstruction(Opcode),

    /// A program with no methods cannot name an entry.
    #[error("cannot serialize an empty program")]
    EmptyProgram,
}

pub struct Serializer<W: Write> {
    out: W,
}

impl<W: Write> Serializer<W> {
    pub fn new(out: W) -> Self {
        Serializer { out }
    }

    pub fn write_program(&mut self, program: &BytecodeProgram) -> Result<(), SerializeError> {
        let Some(entry) = program.entry() else {
            return Err(SerializeError::EmptyProgram);
        };

        self.write_string(entry.name())?;
        self.write_method(entry)?;

        let others = &program.methods()[1..];
        self.write_u64(others.len() as u64)?;
        for method in others {
            self.write_string(method.name())?;
            self.write_method(method)?;
        }
        Ok(())
    }

    fn write_method(&mut self, method: &BytecodeMethod) -> Result<(), SerializeError> {
        self.write_string_vec(method.variables())?;
        self.write_string_vec(method.field_variables())?;
        self.write_u64(method.blocks().len() as u64)?;
        for block in method.blocks() {
            self.write_string(block.name())?;
            self.write_u64(block.instructions().len() as u64)?;
            for instruction in block.instructions() {
                self.write_instruction(instruction)?;
            }
        }
        Ok(())
    }

    fn write_instruction(&mut self, instruction: &Instruction) -> Result<(), SerializeError> {
        let opcode = instruction.opcode();
        self.out.write_all(&[i8::from(opcode) as u8])?;
        match (opcode.param_kind(), instruction) {
            (ParamKind::None, Instruction::Stack(_)) => Ok(()),
            (ParamKind::Int, Instruction::Int(_, value)) => self.write_i64(*value),
            (ParamKind::Str, Instruction::Str(_, name)) => self.write_string(name),
            _ => Err(SerializeError::MalformedInstruction(opcode)),
        }
    }

    fn write_u64(&mut self, value: u64) -> Result<(), SerializeError> {
        self.out.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    fn write_i64(&mut self, value: i64) -> Result<(), SerializeError> {
        self.out.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    fn write_string(&mut self, value: &str) -> Result<(), SerializeError> {
        self.write_u64(value.len() as u64)?;
        self.out.write_all(value.as_bytes())?;
        Ok(())
    }

    fn write_string_vec(&mut self, values: &[String]) -> Result<(), SerializeError> {
        self.write_u64(values.len() as u64)?;
        for value in values {
            self.write_string(value)?;
        }
        Ok(())
    }
}

pub struct Deserializer<R: Read> {
    input: R,
}

impl<R: Read> Deserializer<R> {
    pub fn new(input: R) -> Self {
        Deserializer { input }
    }

    pub fn read_program(&mut self) -> Result<BytecodeProgram, SerializeError> {
        let mut program = BytecodeProgram::new();

        let entry_name = self.read_string()?;
        self.read_method(&mut program, entry_name)?;

        let other_count = self.read_u64()?;
        for _ in 0..other_count {
            let name = self.read_string()?;
            self.read_method(&mut program, name)?;
        }
        Ok(program)
    }

    fn read_method(
        &mut self,
        program: &mut BytecodeProgram,
        name: String,
    ) -> Result<(), SerializeError> {
        let variables = self.read_string_vec()?;
        let fields = self.read_string_vec()?;
        let method = program.add_method(name, variables, fields);

        let block_count = self.read_u64()?;
        for _ in 0..block_count {
            let block_name = self.read_string()?;
            let instruction_count = self.read_u64()?;
            let block = method.add_block(block_name);
            for _ in 0..instruction_count {
                let mut byte = [0u8; 1];
                self.input.read_exact(&mut byte)?;
                let raw = byte[0] as i8;
                let opcode =
                    Opcode::try_from(raw).map_err(|_| SerializeError::InvalidOpcode(raw))?;
                let instruction = match opcode.param_kind() {
                    ParamKind::None => Instruction::Stack(opcode),
                    ParamKind::Int => {
                        let mut buffer = [0u8; 8];
                        self.input.read_exact(&mut buffer)?;
                        Instruction::Int(opcode, i64::from_le_bytes(buffer))
                    }
                    ParamKind::Str => {
                        let mut length = [0u8; 8];
                        self.input.read_exact(&mut length)?;
                        let length = u64::from_le_bytes(length) as usize;
                        let mut bytes = vec![0u8; length];
                        self.input.read_exact(&mut bytes)?;
                        Instruction::Str(opcode, String::from_utf8(bytes)?)
                    }
                };
                block.push_instruction(instruction);
            }
        }
        Ok(())
    }

    fn read_u64(&mut self) -> Result<u64, SerializeError> {
        let mut buffer = [0u8; 8];
        self.input.read_exact(&mut buffer)?;
        Ok(u64::from_le_bytes(buffer))
    }

    fn read_string(&mut self) -> Result<String, SerializeError> {
        let length = self.read_u64()? as usize;
        let mut bytes = vec![0u8; length];
        self.input.read_exact(&mut bytes)?;
        Ok(String::from_utf8(bytes)?)
    }

    fn read_string_vec(&mut self) -> Result<Vec<String>, SerializeError> {
        let count = self.read_u64()?;
        let mut values = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            values.push(self.read_string()?);
        }
        Ok(values)
    }
}

impl BytecodeProgram {
    pub fn serialize(&self, out: impl Write) -> Result<(), SerializeError> {
        Serializer::new(out).write_program(self)
    }

    pub fn deserialize(input: impl Read) -> Result<Self, SerializeError> {
        Deserializer::new(input).read_program()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_program() -> BytecodeProgram {
        let mut program = BytecodeProgram::new();
        let main = program.add_method("Main.main", vec!["args".into()], vec!["this".into()]);
        main.add_block("Main.main")
            .constant(5)
            .load("_t0")
            .call("Foo.run")
            .store("_t0")
            .print()
            .stop();

        let run = program.add_method(
            "Foo.run",
            vec!["n".into(), "_t1".into()],
            vec!["this".into(), "count".into()],
        );
        run.add_block("Foo.run").store("n").load("n").ret();
        run.add_block("block_0").jump("Foo.run");
        program
    }

    #[test]
    fn round_trip_is_structural_identity() {
        let program = sample_program();
        let mut bytes = Vec::new();
        program.serialize(&mut bytes).unwrap();
        let back = BytecodeProgram::deserialize(bytes.as_slice()).unwrap();
        assert_eq!(program, back);
    }

    #[test]
    fn layout_starts_with_entry_name() {
        let program = sample_program();
        let mut bytes = Vec::new();
        program.serialize(&mut bytes).unwrap();

        // u64 length, little-endian, then the name bytes.
        assert_eq!(&bytes[0..8], &9u64.to_le_bytes());
        assert_eq!(&bytes[8..17], b"Main.main");
    }

    #[test]
    fn const_payload_is_i64_le() {
        let mut program = BytecodeProgram::new();
        program
            .add_method("M.m", vec![], vec![])
            .add_block("M.m")
            .constant(-2)
            .stop();
        let mut bytes = Vec::new();
        program.serialize(&mut bytes).unwrap();

        // Opcode byte 1 followed by the value, somewhere in the stream.
        let payload = (-2i64).to_le_bytes();
        assert!(bytes
            .windows(9)
            .any(|window| window[0] as i8 == i8::from(Opcode::Const) && window[1..] == payload));
    }

    #[test]
    fn truncated_input_is_an_io_error() {
        let program = sample_program();
        let mut bytes = Vec::new();
        program.serialize(&mut bytes).unwrap();
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(
            BytecodeProgram::deserialize(bytes.as_slice()),
            Err(SerializeError::Io(_))
        ));
    }

    #[test]
    fn unknown_opcode_byte_is_rejected() {
        let mut program = BytecodeProgram::new();
        program.add_method("M.m", vec![], vec![]).add_block("M.m").stop();
        let mut bytes = Vec::new();
        program.serialize(&mut bytes).unwrap();

        // Corrupt the STOP byte; 18 appears nowhere else in this container.
        let stop_at = bytes
            .iter()
            .position(|&b| b as i8 == i8::from(Opcode::Stop))
            .unwrap();
        bytes[stop_at] = 99;
        assert!(matches!(
            BytecodeProgram::deserialize(bytes.as_slice()),
            Err(SerializeError::InvalidOpcode(99))
        ));
    }

    #[test]
    fn empty_program_cannot_serialize() {
        let program = BytecodeProgram::new();
        let mut bytes = Vec::new();
        assert!(matches!(
            program.serialize(&mut bytes),
            Err(SerializeError::EmptyProgram)
        ));
    }

    #[test]
    fn mismatched_instruction_shape_is_rejected() {
        let mut program = BytecodeProgram::new();
        program
            .add_method("M.m", vec![], vec![])
            .add_block("M.m")
            .push_instruction(Instruction::Int(Opcode::Add, 1));
        let mut bytes = Vec::new();
        assert!(matches!(
            program.serialize(&mut bytes),
            Err(SerializeError::MalformedInstruction(Opcode::Add))
        ));
    }
}
