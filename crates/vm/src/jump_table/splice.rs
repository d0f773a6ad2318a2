//! Byte-splice instructions over buffers and byte strings.

use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::StackItem;
use neodbg_config::MAX_ITEM_SIZE;
use num_traits::ToPrimitive;

pub(super) fn execute(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    use OpCode::*;
    match instruction.opcode {
        NEWBUFFER => {
            let length = pop_size(engine)?;
            engine.push(StackItem::new_buffer(vec![0u8; length]))
        }
        MEMCPY => {
            let count = pop_size(engine)?;
            let source_index = pop_size(engine)?;
            let source = engine.pop()?.try_bytes()?;
            let destination_index = pop_size(engine)?;
            let destination = engine.pop()?;
            let StackItem::Buffer(buffer) = destination else {
                return Err(VmError::InvalidType {
                    from: destination.type_name(),
                    to: "Buffer",
                });
            };
            if source_index + count > source.len() {
                return Err(VmError::invalid_operation("MEMCPY source out of range"));
            }
            let mut destination = buffer.borrow_mut();
            if destination_index + count > destination.len() {
                return Err(VmError::invalid_operation(
                    "MEMCPY destination out of range",
                ));
            }
            destination[destination_index..destination_index + count]
                .copy_from_slice(&source[source_index..source_index + count]);
            Ok(())
        }
        CAT => {
            let right = engine.pop()?.try_bytes()?;
            let left = engine.pop()?.try_bytes()?;
            if left.len() + right.len() > MAX_ITEM_SIZE {
                return Err(VmError::too_large("CAT result over size limit"));
            }
            let mut joined = left;
            joined.extend_from_slice(&right);
            engine.push(StackItem::new_buffer(joined))
        }
        SUBSTR => {
            let count = pop_size(engine)?;
            let index = pop_size(engine)?;
            let bytes = engine.pop()?.try_bytes()?;
            if index + count > bytes.len() {
                return Err(VmError::invalid_operation("SUBSTR out of range"));
            }
            engine.push(StackItem::new_buffer(bytes[index..index + count].to_vec()))
        }
        LEFT => {
            let count = pop_size(engine)?;
            let bytes = engine.pop()?.try_bytes()?;
            if count > bytes.len() {
                return Err(VmError::invalid_operation("LEFT count out of range"));
            }
            engine.push(StackItem::new_buffer(bytes[..count].to_vec()))
        }
        RIGHT => {
            let count = pop_size(engine)?;
            let bytes = engine.pop()?.try_bytes()?;
            if count > bytes.len() {
                return Err(VmError::invalid_operation("RIGHT count out of range"));
            }
            engine.push(StackItem::new_buffer(bytes[bytes.len() - count..].to_vec()))
        }
        other => Err(VmError::invalid_operation(format!(
            "{other} is not a splice instruction"
        ))),
    }
}

fn pop_size(engine: &mut ExecutionEngine) -> VmResult<usize> {
    let value = engine.pop()?.try_integer()?;
    value
        .to_usize()
        .filter(|&v| v <= MAX_ITEM_SIZE)
        .ok_or_else(|| VmError::invalid_operation(format!("size {value} out of range")))
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
    fn cat_concatenates() {
        // PUSHDATA1 "ab"; PUSHDATA1 "cd"; CAT
        let engine = run(vec![0x0c, 0x02, b'a', b'b', 0x0c, 0x02, b'c', b'd', 0x8b]);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().try_bytes().unwrap(),
            b"abcd"
        );
    }

    #[test]
    fn substr_left_right() {
        // PUSHDATA1 "neo-vm"; PUSH4 LEFT -> "neo-"
        let engine = run(vec![
            0x0c, 0x06, b'n', b'e', b'o', b'-', b'v', b'm', 0x14, 0x8d,
        ]);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().try_bytes().unwrap(),
            b"neo-"
        );
    }

    #[test]
    fn substr_out_of_range_faults() {
        // PUSHDATA1 "ab"; PUSH1; PUSH5; SUBSTR
        let mut engine = ExecutionEngine::new();
        engine
            .load_script(
                Script::new(vec![0x0c, 0x02, b'a', b'b', 0x11, 0x15, 0x8c]).unwrap(),
                -1,
            )
            .unwrap();
        assert_eq!(engine.continue_execution(), VMState::Fault);
    }

    #[test]
    fn newbuffer_is_zeroed() {
        // PUSH3 NEWBUFFER
        let engine = run(vec![0x13, 0x88]);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().try_bytes().unwrap(),
            vec![0, 0, 0]
        );
    }
}
