//! Evaluation-stack manipulation instructions.

use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::StackItem;
use num_traits::ToPrimitive;

pub(super) fn execute(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    use OpCode::*;
    let context = engine
        .current_context_mut()
        .ok_or_else(|| VmError::invalid_operation("no current context"))?;
    let stack = context.evaluation_stack_mut();
    match instruction.opcode {
        DEPTH => {
            let depth = stack.len();
            stack.push(StackItem::from_int(depth as i64))
        }
        DROP => stack.pop().map(|_| ()),
        NIP => stack.remove(1).map(|_| ()),
        XDROP => {
            let n = pop_index(stack)?;
            stack.remove(n).map(|_| ())
        }
        CLEAR => {
            stack.clear();
            Ok(())
        }
        DUP => {
            let top = stack.peek(0)?.clone();
            stack.push(top)
        }
        OVER => {
            let item = stack.peek(1)?.clone();
            stack.push(item)
        }
        PICK => {
            let n = pop_index(stack)?;
            let item = stack.peek(n)?.clone();
            stack.push(item)
        }
        TUCK => {
            let top = stack.peek(0)?.clone();
            stack.insert(2, top)
        }
        SWAP => stack.swap(1),
        ROT => {
            let third = stack.remove(2)?;
            stack.push(third)
        }
        ROLL => {
            let n = pop_index(stack)?;
            if n > 0 {
                let item = stack.remove(n)?;
                stack.push(item)?;
            }
            Ok(())
        }
        REVERSE3 => stack.reverse(3),
        REVERSE4 => stack.reverse(4),
        REVERSEN => {
            let n = pop_index(stack)?;
            stack.reverse(n)
        }
        other => Err(VmError::invalid_operation(format!(
            "{other} is not a stack instruction"
        ))),
    }
}

fn pop_index(stack: &mut crate::evaluation_stack::EvaluationStack) -> VmResult<usize> {
    let value = stack.pop()?.try_integer()?;
    value
        .to_usize()
        .ok_or_else(|| VmError::invalid_operation(format!("negative stack index {value}")))
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
    fn dup_and_depth() {
        // PUSH5; DUP; DEPTH
        let engine = run(vec![0x15, 0x4a, 0x43]);
        let stack = engine.result_stack();
        assert_eq!(stack.peek(0).unwrap().try_integer().unwrap(), 2.into());
        assert_eq!(stack.peek(1).unwrap().try_integer().unwrap(), 5.into());
        assert_eq!(stack.peek(2).unwrap().try_integer().unwrap(), 5.into());
    }

    #[test]
    fn rot_cycles_top_three() {
        // PUSH1 PUSH2 PUSH3 ROT -> 2 3 1
        let engine = run(vec![0x11, 0x12, 0x13, 0x51]);
        let stack = engine.result_stack();
        assert_eq!(stack.peek(0).unwrap().try_integer().unwrap(), 1.into());
        assert_eq!(stack.peek(1).unwrap().try_integer().unwrap(), 3.into());
        assert_eq!(stack.peek(2).unwrap().try_integer().unwrap(), 2.into());
    }

    #[test]
    fn roll_moves_nth() {
        // PUSH1 PUSH2 PUSH3 PUSH2 ROLL -> 2 3 1
        let engine = run(vec![0x11, 0x12, 0x13, 0x12, 0x52]);
        let stack = engine.result_stack();
        assert_eq!(stack.peek(0).unwrap().try_integer().unwrap(), 1.into());
    }

    #[test]
    fn reversen_reverses() {
        // PUSH1 PUSH2 PUSH3 PUSH3 REVERSEN -> 3 2 1 with 1 on top... reversed: 1 2 3 top=1
        let engine = run(vec![0x11, 0x12, 0x13, 0x13, 0x55]);
        let stack = engine.result_stack();
        assert_eq!(stack.peek(0).unwrap().try_integer().unwrap(), 1.into());
        assert_eq!(stack.peek(2).unwrap().try_integer().unwrap(), 3.into());
    }

    #[test]
    fn drop_underflow_faults() {
        let mut engine = ExecutionEngine::new();
        engine
            .load_script(Script::new(vec![0x45]).unwrap(), -1)
            .unwrap();
        assert_eq!(engine.continue_execution(), VMState::Fault);
        assert!(engine.fault_message().unwrap().contains("stack underflow"));
    }
}
