//! Property test: `deserialize(serialize(P))` is structurally identical to
//! `P` for arbitrary well-formed programs.

use proptest::prelude::*;

use minijava_bytecode::{BytecodeProgram, Instruction, Opcode, ParamKind};

fn arb_opcode() -> impl Strategy<Value = Opcode> {
    (0i8..=23).prop_map(|byte| Opcode::try_from(byte).expect("in range"))
}

fn arb_instruction() -> impl Strategy<Value = Instruction> {
    (arb_opcode(), any::<i64>(), "[A-Za-z_][A-Za-z0-9_.]{0,12}").prop_map(
        |(opcode, value, name)| match opcode.param_kind() {
            ParamKind::None => Instruction::Stack(opcode),
            ParamKind::Int => Instruction::Int(opcode, value),
            ParamKind::Str => Instruction::Str(opcode, name),
        },
    )
}

fn arb_names(max: usize) -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec("[a-z_][a-z0-9_]{0,8}", 0..max)
}

proptest! {
    #[test]
    fn serialize_round_trip(
        method_count in 1usize..4,
        blocks in proptest::collection::vec(
            proptest::collection::vec(arb_instruction(), 0..12),
            1..6,
        ),
        locals in arb_names(5),
        fields in arb_names(4),
    ) {
        let mut program = BytecodeProgram::new();
        for m in 0..method_count {
            let method = program.add_method(
                format!("Class{m}.method{m}"),
                locals.clone(),
                fields.clone(),
            );
            for (b, instructions) in blocks.iter().enumerate() {
                let block = method.add_block(format!("block_{m}_{b}"));
                for instruction in instructions {
                    block.push_instruction(instruction.clone());
                }
            }
        }

        let mut bytes = Vec::new();
        program.serialize(&mut bytes).unwrap();
        let back = BytecodeProgram::deserialize(bytes.as_slice()).unwrap();
        prop_assert_eq!(program, back);
    }
}
