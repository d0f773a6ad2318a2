//! Type-inspection instructions.

use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::{StackItem, StackItemType};

pub(super) fn execute(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    use OpCode::*;
    match instruction.opcode {
        ISNULL => {
            let item = engine.pop()?;
            engine.push(StackItem::from_bool(item.is_null()))
        }
        ISTYPE => {
            let target = StackItemType::try_from(instruction.operand_u8()?)?;
            if target == StackItemType::Any {
                return Err(VmError::invalid_operation("ISTYPE with type Any"));
            }
            let item = engine.pop()?;
            engine.push(StackItem::from_bool(item.item_type() == target))
        }
        CONVERT => {
            let target = StackItemType::try_from(instruction.operand_u8()?)?;
            let item = engine.pop()?;
            let converted = item.convert_to(target)?;
            engine.push(converted)
        }
        other => Err(VmError::invalid_operation(format!(
            "{other} is not a type instruction"
        ))),
    }
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
    fn isnull_distinguishes() {
        let engine = run(vec![0x0b, 0xd8]); // PUSHNULL ISNULL
        assert!(engine.result_stack().peek(0).unwrap().as_bool());
        let engine = run(vec![0x11, 0xd8]); // PUSH1 ISNULL
        assert!(!engine.result_stack().peek(0).unwrap().as_bool());
    }

    #[test]
    fn istype_checks_tag() {
        // PUSH1; ISTYPE Integer(0x21)
        let engine = run(vec![0x11, 0xd9, 0x21]);
        assert!(engine.result_stack().peek(0).unwrap().as_bool());
    }

    #[test]
    fn convert_int_to_bytestring() {
        // PUSH1; CONVERT ByteString(0x28)
        let engine = run(vec![0x11, 0xdb, 0x28]);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().try_bytes().unwrap(),
            vec![1]
        );
    }

    #[test]
    fn convert_unsupported_faults() {
        // PUSH1; CONVERT Array(0x40)
        let mut engine = ExecutionEngine::new();
        engine
            .load_script(Script::new(vec![0x11, 0xdb, 0x40]).unwrap(), -1)
            .unwrap();
        assert_eq!(engine.continue_execution(), VMState::Fault);
    }
}
