//! Slot instructions: static fields, locals and arguments.

use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::slot::Slot;
use std::cell::RefCell;
use std::rc::Rc;

pub(super) fn execute(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    use OpCode::*;
    match instruction.opcode {
        INITSSLOT => {
            let count = instruction.operand_u8()? as usize;
            if count == 0 {
                return Err(VmError::invalid_operation("INITSSLOT with zero fields"));
            }
            let hash = engine
                .current_context()
                .ok_or_else(|| VmError::invalid_operation("no current context"))?
                .script_hash();
            // The static slot is shared among every context with the same
            // owning script hash.
            let slot = match engine.shared_static_fields(&hash) {
                Some(existing) => existing,
                None => {
                    let slot = Rc::new(RefCell::new(Slot::new(
                        count,
                        engine.reference_counter().clone(),
                    )));
                    engine.register_static_fields(hash, Rc::clone(&slot));
                    slot
                }
            };
            engine
                .current_context_mut()
                .expect("context checked above")
                .init_static_fields(slot)
        }
        INITSLOT => {
            let locals = instruction.operand_u8()? as usize;
            let arguments = instruction.operand_u8_2()? as usize;
            if locals == 0 && arguments == 0 {
                return Err(VmError::invalid_operation(
                    "INITSLOT with zero locals and arguments",
                ));
            }
            let counter = engine.reference_counter().clone();
            // Arguments are popped from the stack, first argument on top.
            let mut items = Vec::with_capacity(arguments);
            for _ in 0..arguments {
                items.push(engine.pop()?);
            }
            let argument_slot = Slot::with_items(items, counter.clone())?;
            let local_slot = Slot::new(locals, counter);
            engine
                .current_context_mut()
                .expect("context checked above")
                .init_slot(local_slot, argument_slot)
        }

        LDSFLD0 | LDSFLD1 | LDSFLD2 | LDSFLD3 | LDSFLD4 | LDSFLD5 | LDSFLD6 => {
            load_static(engine, instruction.opcode as u8 - LDSFLD0 as u8)
        }
        LDSFLD => load_static(engine, instruction.operand_u8()?),
        STSFLD0 | STSFLD1 | STSFLD2 | STSFLD3 | STSFLD4 | STSFLD5 | STSFLD6 => {
            store_static(engine, instruction.opcode as u8 - STSFLD0 as u8)
        }
        STSFLD => store_static(engine, instruction.operand_u8()?),

        LDLOC0 | LDLOC1 | LDLOC2 | LDLOC3 | LDLOC4 | LDLOC5 | LDLOC6 => {
            load_local(engine, instruction.opcode as u8 - LDLOC0 as u8)
        }
        LDLOC => load_local(engine, instruction.operand_u8()?),
        STLOC0 | STLOC1 | STLOC2 | STLOC3 | STLOC4 | STLOC5 | STLOC6 => {
            store_local(engine, instruction.opcode as u8 - STLOC0 as u8)
        }
        STLOC => store_local(engine, instruction.operand_u8()?),

        LDARG0 | LDARG1 | LDARG2 | LDARG3 | LDARG4 | LDARG5 | LDARG6 => {
            load_argument(engine, instruction.opcode as u8 - LDARG0 as u8)
        }
        LDARG => load_argument(engine, instruction.operand_u8()?),
        STARG0 | STARG1 | STARG2 | STARG3 | STARG4 | STARG5 | STARG6 => {
            store_argument(engine, instruction.opcode as u8 - STARG0 as u8)
        }
        STARG => store_argument(engine, instruction.operand_u8()?),

        other => Err(VmError::invalid_operation(format!(
            "{other} is not a slot instruction"
        ))),
    }
}

fn static_slot(
    engine: &ExecutionEngine,
) -> VmResult<Rc<RefCell<Slot>>> {
    let context = engine
        .current_context()
        .ok_or_else(|| VmError::invalid_operation("no current context"))?;
    // A frame created before INITSSLOT ran (e.g. the method frame under
    // _initialize) finds the slot through the per-hash registry.
    context
        .static_fields()
        .cloned()
        .or_else(|| engine.shared_static_fields(&context.script_hash()))
        .ok_or_else(|| VmError::invalid_operation("static slot is not initialized"))
}

fn load_static(engine: &mut ExecutionEngine, index: u8) -> VmResult<()> {
    let slot = static_slot(engine)?;
    let item = slot.borrow().get(index as usize)?;
    engine.push(item)
}

fn store_static(engine: &mut ExecutionEngine, index: u8) -> VmResult<()> {
    let item = engine.pop()?;
    let slot = static_slot(engine)?;
    let result = slot.borrow_mut().set(index as usize, item);
    result
}

fn load_local(engine: &mut ExecutionEngine, index: u8) -> VmResult<()> {
    let item = engine
        .current_context()
        .and_then(|context| context.local_variables())
        .ok_or_else(|| VmError::invalid_operation("local slot is not initialized"))?
        .get(index as usize)?;
    engine.push(item)
}

fn store_local(engine: &mut ExecutionEngine, index: u8) -> VmResult<()> {
    let item = engine.pop()?;
    engine
        .current_context_mut()
        .and_then(|context| context.local_variables_mut())
        .ok_or_else(|| VmError::invalid_operation("local slot is not initialized"))?
        .set(index as usize, item)
}

fn load_argument(engine: &mut ExecutionEngine, index: u8) -> VmResult<()> {
    let item = engine
        .current_context()
        .and_then(|context| context.arguments())
        .ok_or_else(|| VmError::invalid_operation("argument slot is not initialized"))?
        .get(index as usize)?;
    engine.push(item)
}

fn store_argument(engine: &mut ExecutionEngine, index: u8) -> VmResult<()> {
    let item = engine.pop()?;
    engine
        .current_context_mut()
        .and_then(|context| context.arguments_mut())
        .ok_or_else(|| VmError::invalid_operation("argument slot is not initialized"))?
        .set(index as usize, item)
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
    fn static_slot_store_and_load() {
        // INITSSLOT 2; PUSH5; STSFLD1; LDSFLD1
        let engine = run(vec![0x56, 0x02, 0x15, 0x61, 0x59]);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().try_integer().unwrap(),
            5.into()
        );
    }

    #[test]
    fn initslot_pops_arguments_in_order() {
        // PUSH1 PUSH2; INITSLOT 0 locals, 2 args; LDARG0; LDARG1
        // First argument popped is the top of stack.
        let engine = run(vec![0x11, 0x12, 0x57, 0x00, 0x02, 0x78, 0x79]);
        let stack = engine.result_stack();
        assert_eq!(stack.peek(0).unwrap().try_integer().unwrap(), 1.into());
        assert_eq!(stack.peek(1).unwrap().try_integer().unwrap(), 2.into());
    }

    #[test]
    fn locals_default_to_null() {
        // INITSLOT 1 local, 0 args; LDLOC0
        let engine = run(vec![0x57, 0x01, 0x00, 0x68]);
        assert!(engine.result_stack().peek(0).unwrap().is_null());
    }

    #[test]
    fn double_initsslot_faults() {
        let mut engine = ExecutionEngine::new();
        engine
            .load_script(Script::new(vec![0x56, 0x01, 0x56, 0x01]).unwrap(), -1)
            .unwrap();
        assert_eq!(engine.continue_execution(), VMState::Fault);
        assert!(engine
            .fault_message()
            .unwrap()
            .contains("already initialized"));
    }

    #[test]
    fn load_without_slot_faults() {
        let mut engine = ExecutionEngine::new();
        engine
            .load_script(Script::new(vec![0x68]).unwrap(), -1)
            .unwrap();
        assert_eq!(engine.continue_execution(), VMState::Fault);
        assert!(engine
            .fault_message()
            .unwrap()
            .contains("local slot is not initialized"));
    }
}
