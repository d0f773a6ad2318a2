//! Bitwise and equality instructions.

use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::{check_integer, StackItem};

pub(super) fn execute(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    use OpCode::*;
    match instruction.opcode {
        INVERT => {
            let value = engine.pop()?.try_integer()?;
            engine.push(StackItem::Integer(!value))
        }
        AND => binary(engine, |a, b| a & b),
        OR => binary(engine, |a, b| a | b),
        XOR => binary(engine, |a, b| a ^ b),
        EQUAL => {
            let right = engine.pop()?;
            let left = engine.pop()?;
            let equal = left.equals(&right)?;
            engine.push(StackItem::from_bool(equal))
        }
        NOTEQUAL => {
            let right = engine.pop()?;
            let left = engine.pop()?;
            let equal = left.equals(&right)?;
            engine.push(StackItem::from_bool(!equal))
        }
        other => Err(VmError::invalid_operation(format!(
            "{other} is not a bitwise instruction"
        ))),
    }
}

fn binary(
    engine: &mut ExecutionEngine,
    op: impl Fn(num_bigint::BigInt, num_bigint::BigInt) -> num_bigint::BigInt,
) -> VmResult<()> {
    let right = engine.pop()?.try_integer()?;
    let left = engine.pop()?.try_integer()?;
    let result = op(left, right);
    check_integer(&result)?;
    engine.push(StackItem::Integer(result))
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
    fn xor_of_one_and_two() {
        // PUSH1 PUSH2 XOR = 3
        let engine = run(vec![0x11, 0x12, 0x93]);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().try_integer().unwrap(),
            3.into()
        );
    }

    #[test]
    fn equal_compares_spans() {
        // PUSH1; PUSHDATA1 0x01; EQUAL
        let engine = run(vec![0x11, 0x0c, 0x01, 0x01, 0x97]);
        assert!(engine.result_stack().peek(0).unwrap().as_bool());
    }

    #[test]
    fn invert_flips_bits() {
        // PUSH0 INVERT = -1
        let engine = run(vec![0x10, 0x90]);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().try_integer().unwrap(),
            (-1).into()
        );
    }
}
