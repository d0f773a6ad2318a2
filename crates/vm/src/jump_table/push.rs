//! Constant-pushing instructions.

use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::StackItem;
use num_bigint::BigInt;

pub(super) fn execute(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    use OpCode::*;
    let item = match instruction.opcode {
        PUSHINT8 | PUSHINT16 | PUSHINT32 | PUSHINT64 | PUSHINT128 | PUSHINT256 => {
            StackItem::Integer(BigInt::from_signed_bytes_le(&instruction.operand))
        }
        PUSHT => StackItem::from_bool(true),
        PUSHF => StackItem::from_bool(false),
        PUSHA => {
            let context = engine
                .current_context()
                .ok_or_else(|| VmError::invalid_operation("no current context"))?;
            let target = instruction.pointer as i64 + instruction.operand_i32()? as i64;
            if target < 0
                || target > context.script().len() as i64
                || !context.script().is_boundary(target as usize)?
            {
                return Err(VmError::InvalidJumpTarget { target });
            }
            StackItem::new_pointer(context.script().clone(), target as usize)
        }
        PUSHNULL => StackItem::Null,
        PUSHDATA1 | PUSHDATA2 | PUSHDATA4 => StackItem::from_bytes(instruction.operand.clone()),
        PUSHM1 => StackItem::from_int(-1),
        opcode => {
            // PUSH0 .. PUSH16 encode their value in the discriminant.
            let value = opcode as u8 - OpCode::PUSH0 as u8;
            StackItem::from_int(value)
        }
    };
    engine.push(item)
}

#[cfg(test)]
mod tests {
    use crate::execution_engine::ExecutionEngine;
    use crate::script::Script;
    use crate::vm_state::VMState;

    fn run(script: Vec<u8>) -> ExecutionEngine {
        let mut engine = ExecutionEngine::new();
        engine.load_script(Script::new(script).unwrap(), -1).unwrap();
        assert_eq!(engine.continue_execution(), VMState::Halt);
        engine
    }

    #[test]
    fn push_int_widths() {
        // PUSHINT8 -5; PUSHINT16 0x0200; PUSHM1; PUSH16
        let engine = run(vec![0x00, 0xfb, 0x01, 0x00, 0x02, 0x0f, 0x20]);
        let stack = engine.result_stack();
        assert_eq!(stack.peek(0).unwrap().try_integer().unwrap(), 16.into());
        assert_eq!(stack.peek(1).unwrap().try_integer().unwrap(), (-1).into());
        assert_eq!(stack.peek(2).unwrap().try_integer().unwrap(), 512.into());
        assert_eq!(stack.peek(3).unwrap().try_integer().unwrap(), (-5).into());
    }

    #[test]
    fn push_data_and_null() {
        // PUSHDATA1 2 "hi"; PUSHNULL; PUSHT
        let engine = run(vec![0x0c, 0x02, b'h', b'i', 0x0b, 0x08]);
        let stack = engine.result_stack();
        assert!(stack.peek(0).unwrap().as_bool());
        assert!(stack.peek(1).unwrap().is_null());
        assert_eq!(stack.peek(2).unwrap().try_bytes().unwrap(), b"hi");
    }

    #[test]
    fn pusha_validates_target() {
        // PUSHA +5 over a 5-byte script -> points at script end, valid.
        let engine = run(vec![0x0a, 0x05, 0x00, 0x00, 0x00]);
        assert_eq!(engine.result_stack().len(), 1);

        // PUSHA into the middle of its own operand faults.
        let mut engine = ExecutionEngine::new();
        engine
            .load_script(Script::new(vec![0x0a, 0x02, 0x00, 0x00, 0x00]).unwrap(), -1)
            .unwrap();
        assert_eq!(engine.continue_execution(), VMState::Fault);
    }
}
