//! Flow-control instructions.

use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::StackItem;

pub(super) fn execute(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    use OpCode::*;
    match instruction.opcode {
        NOP => Ok(()),

        JMP | JMP_L => {
            let offset = jump_offset(instruction)?;
            engine.execute_jump_offset(offset)
        }
        JMPIF | JMPIF_L => conditional_jump(engine, instruction, |taken| taken),
        JMPIFNOT | JMPIFNOT_L => conditional_jump(engine, instruction, |taken| !taken),
        JMPEQ | JMPEQ_L => comparison_jump(engine, instruction, |a, b| a == b),
        JMPNE | JMPNE_L => comparison_jump(engine, instruction, |a, b| a != b),
        JMPGT | JMPGT_L => comparison_jump(engine, instruction, |a, b| a > b),
        JMPGE | JMPGE_L => comparison_jump(engine, instruction, |a, b| a >= b),
        JMPLT | JMPLT_L => comparison_jump(engine, instruction, |a, b| a < b),
        JMPLE | JMPLE_L => comparison_jump(engine, instruction, |a, b| a <= b),

        CALL | CALL_L => {
            let offset = jump_offset(instruction)?;
            let target = instruction.pointer as i64 + offset;
            engine.execute_call(target)
        }
        CALLA => {
            let item = engine.pop()?;
            let StackItem::Pointer { script, position } = item else {
                return Err(VmError::InvalidType {
                    from: item.type_name(),
                    to: "Pointer",
                });
            };
            let context = engine
                .current_context()
                .ok_or_else(|| VmError::invalid_operation("no current context"))?;
            if script != *context.script() {
                return Err(VmError::invalid_operation(
                    "CALLA pointer targets another script",
                ));
            }
            engine.execute_call(position as i64)
        }
        CALLT => {
            let index = instruction.operand_u16()?;
            engine.on_call_token(index)
        }

        ABORT => Err(VmError::Aborted {
            message: "ABORT is executed".into(),
        }),
        ABORTMSG => {
            let message = engine.pop()?.try_string()?;
            Err(VmError::Aborted {
                message: format!("ABORT is executed: {message}"),
            })
        }
        ASSERT => {
            let condition = engine.pop()?.as_bool();
            if !condition {
                return Err(VmError::Aborted {
                    message: "ASSERT failed".into(),
                });
            }
            Ok(())
        }
        ASSERTMSG => {
            let message = engine.pop()?.try_string()?;
            let condition = engine.pop()?.as_bool();
            if !condition {
                return Err(VmError::Aborted {
                    message: format!("ASSERT failed: {message}"),
                });
            }
            Ok(())
        }
        THROW => {
            let exception = engine.pop()?;
            engine.throw(Some(exception))
        }

        TRY | TRY_L => {
            let (catch_offset, finally_offset) = instruction.operand_try_offsets()?;
            engine.execute_try(catch_offset, finally_offset)
        }
        ENDTRY | ENDTRY_L => {
            let offset = jump_offset(instruction)? as i32;
            engine.execute_end_try(offset)
        }
        ENDFINALLY => engine.execute_end_finally(),

        RET => engine.unload_current_context(),

        SYSCALL => {
            let id = instruction.operand_u32()?;
            engine.on_syscall(id)
        }

        other => Err(VmError::invalid_operation(format!(
            "{other} is not a flow-control instruction"
        ))),
    }
}

fn jump_offset(instruction: &Instruction) -> VmResult<i64> {
    if instruction.operand.len() == 1 {
        Ok(instruction.operand_i8()? as i64)
    } else {
        Ok(instruction.operand_i32()? as i64)
    }
}

fn conditional_jump(
    engine: &mut ExecutionEngine,
    instruction: &Instruction,
    take: impl Fn(bool) -> bool,
) -> VmResult<()> {
    let condition = engine.pop()?.as_bool();
    if take(condition) {
        let offset = jump_offset(instruction)?;
        engine.execute_jump_offset(offset)?;
    }
    Ok(())
}

fn comparison_jump(
    engine: &mut ExecutionEngine,
    instruction: &Instruction,
    take: impl Fn(&num_bigint::BigInt, &num_bigint::BigInt) -> bool,
) -> VmResult<()> {
    let right = engine.pop()?.try_integer()?;
    let left = engine.pop()?.try_integer()?;
    if take(&left, &right) {
        let offset = jump_offset(instruction)?;
        engine.execute_jump_offset(offset)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::execution_engine::ExecutionEngine;
    use crate::script::Script;
    use crate::vm_state::VMState;

    fn engine_with(script: Vec<u8>) -> ExecutionEngine {
        let mut engine = ExecutionEngine::new();
        engine.load_script(Script::new(script).unwrap(), -1).unwrap();
        engine
    }

    #[test]
    fn jmp_skips_instructions() {
        // JMP +3 (over PUSH2); PUSH2; PUSH1
        let mut engine = engine_with(vec![0x22, 0x03, 0x12, 0x11]);
        assert_eq!(engine.continue_execution(), VMState::Halt);
        let stack = engine.result_stack();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.peek(0).unwrap().try_integer().unwrap(), 1.into());
    }

    #[test]
    fn jmpif_takes_truthy() {
        // PUSHT; JMPIF +3; PUSH2; PUSH1
        let mut engine = engine_with(vec![0x08, 0x24, 0x03, 0x12, 0x11]);
        assert_eq!(engine.continue_execution(), VMState::Halt);
        assert_eq!(engine.result_stack().len(), 1);
    }

    #[test]
    fn jmpeq_compares_integers() {
        // PUSH2; PUSH2; JMPEQ +3; PUSH5; PUSH9
        let mut engine = engine_with(vec![0x12, 0x12, 0x28, 0x03, 0x15, 0x19]);
        assert_eq!(engine.continue_execution(), VMState::Halt);
        let stack = engine.result_stack();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.peek(0).unwrap().try_integer().unwrap(), 9.into());
    }

    #[test]
    fn invalid_jump_target_faults() {
        // JMP into its own operand
        let mut engine = engine_with(vec![0x22, 0x01]);
        assert_eq!(engine.continue_execution(), VMState::Fault);
        assert!(engine
            .fault_message()
            .unwrap()
            .contains("invalid jump target"));
    }

    #[test]
    fn call_and_ret_round_trip() {
        // 0: CALL +3 -> 3; 2: RET; 3: PUSH7; 4: RET
        let mut engine = engine_with(vec![0x34, 0x03, 0x40, 0x17, 0x40]);
        assert_eq!(engine.continue_execution(), VMState::Halt);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().try_integer().unwrap(),
            7.into()
        );
    }

    #[test]
    fn calla_rejects_foreign_pointer() {
        // PUSHNULL; CALLA: wrong type
        let mut engine = engine_with(vec![0x0b, 0x36]);
        assert_eq!(engine.continue_execution(), VMState::Fault);
    }

    #[test]
    fn pusha_calla_round_trip() {
        // 0: PUSHA +6 -> 6; 5: RET is at 5... layout:
        // 0: PUSHA(4) target 6; 5: CALLA; 6: PUSH3; 7: RET
        let mut engine = engine_with(vec![0x0a, 0x06, 0x00, 0x00, 0x00, 0x36, 0x13, 0x40]);
        assert_eq!(engine.continue_execution(), VMState::Halt);
        // CALLA ran the tail, pushing 3; falling through also reaches 6.
        assert_eq!(engine.result_stack().len(), 2);
    }

    #[test]
    fn assert_message_faults_with_text() {
        // PUSHF; PUSHDATA1 3 "bad"; ASSERTMSG
        let mut engine = engine_with(vec![0x09, 0x0c, 0x03, b'b', b'a', b'd', 0xe1]);
        assert_eq!(engine.continue_execution(), VMState::Fault);
        assert!(engine.fault_message().unwrap().contains("bad"));
    }

    #[test]
    fn syscall_without_router_faults() {
        let mut engine = engine_with(vec![0x41, 0x01, 0x02, 0x03, 0x04]);
        assert_eq!(engine.continue_execution(), VMState::Fault);
        assert!(engine.fault_message().unwrap().contains("unknown syscall"));
    }
}
