pub mod instruction;
pub mod opcode;
pub mod program;
pub mod serialize;

// Re-export commonly used types
pub use instruction::Instruction;
pub use opcode::{Opcode, ParamKind};
pub use program::{BytecodeMethod, BytecodeMethodBlock, BytecodeProgram};
pub use serialize::{Deserializer, SerializeError, Serializer};
