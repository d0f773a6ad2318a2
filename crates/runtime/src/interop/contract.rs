//! `System.Contract.*` services and CALLT dispatch.

use crate::contract_state::ContractState;
use crate::interop::InteropContext;
use neodbg_core::UInt160;
use neodbg_vm::{
    CallFlags, ExecutionContext, ExecutionEngine, Script, StackItem, VmError, VmResult,
};

pub(super) fn call(engine: &mut ExecutionEngine, context: &mut InteropContext) -> VmResult<()> {
    let hash_bytes = engine.pop()?.try_bytes()?;
    let hash = UInt160::from_bytes(&hash_bytes)
        .map_err(|e| VmError::catchable(format!("bad contract hash: {e}")))?;
    let method = engine.pop()?.try_string()?;
    let flags_value = engine.pop()?.try_integer()?;
    let requested = u8::try_from(&flags_value)
        .ok()
        .and_then(CallFlags::from_bits)
        .ok_or_else(|| VmError::catchable(format!("invalid call flags {flags_value}")))?;
    let arguments = match engine.pop()? {
        StackItem::Array(items) => items.borrow().clone(),
        StackItem::Null => Vec::new(),
        other => {
            return Err(VmError::InvalidType {
                from: other.type_name(),
                to: "Array",
            })
        }
    };
    call_contract(engine, context, &hash, &method, requested, arguments)
}

pub(super) fn get_call_flags(
    engine: &mut ExecutionEngine,
    _context: &mut InteropContext,
) -> VmResult<()> {
    let flags = engine
        .current_context()
        .map(|frame| frame.call_flags())
        .unwrap_or(CallFlags::ALL);
    engine.push(StackItem::from_int(flags.bits() as i64))
}

/// Dispatches a CALLT through the executing script's method-token table.
pub(crate) fn call_token(
    engine: &mut ExecutionEngine,
    context: &mut InteropContext,
    index: u16,
) -> VmResult<()> {
    let executing = engine
        .current_context()
        .map(|frame| frame.script_hash())
        .ok_or_else(|| VmError::invalid_operation("no current context"))?;
    let token = context
        .method_tokens
        .get(&executing)
        .and_then(|tokens| tokens.get(index as usize))
        .cloned()
        .ok_or_else(|| {
            VmError::invalid_operation(format!("method token {index} is out of range"))
        })?;
    let flags = token
        .flags()
        .map_err(|e| VmError::invalid_operation(e.to_string()))?;
    let mut arguments = Vec::with_capacity(token.parameters_count as usize);
    for _ in 0..token.parameters_count {
        arguments.push(engine.pop()?);
    }
    arguments.reverse();
    call_contract(engine, context, &token.hash, &token.method, flags, arguments)
}

/// The shared cross-contract call path: resolves the callee, intersects
/// call flags, loads the method frame (and `_initialize` above it).
pub(crate) fn call_contract(
    engine: &mut ExecutionEngine,
    context: &mut InteropContext,
    hash: &UInt160,
    method: &str,
    requested_flags: CallFlags,
    arguments: Vec<StackItem>,
) -> VmResult<()> {
    if method.starts_with('_') {
        return Err(VmError::catchable(format!(
            "method {method} is not directly callable"
        )));
    }
    let contract = context
        .dao
        .get_contract(hash)
        .ok_or_else(|| VmError::catchable(format!("called contract {hash} not found")))?;
    let target = contract
        .manifest
        .abi
        .method(method, arguments.len())
        .ok_or_else(|| {
            VmError::catchable(format!(
                "method {method} with {} arguments not found in contract {hash}",
                arguments.len()
            ))
        })?
        .clone();

    let caller_flags = engine
        .current_context()
        .map(|frame| frame.call_flags())
        .unwrap_or(CallFlags::ALL);
    let effective = caller_flags.intersect(requested_flags);

    context.register_tokens(contract.hash, contract.nef.tokens.clone());

    let rvcount = if target.has_return_value() { 1 } else { 0 };
    let mut frame = frame_at(engine, &contract, rvcount, target.offset)?;
    for argument in arguments.into_iter().rev() {
        frame.evaluation_stack_mut().push(argument)?;
    }
    frame.set_call_flags(effective);
    engine.load_contract_context(frame)?;

    // _initialize runs first, on its own frame above the method frame.
    if let Some(initialize) = contract.manifest.abi.initialize_method() {
        let mut init_frame = frame_at(engine, &contract, 0, initialize.offset)?;
        init_frame.set_call_flags(effective);
        engine.load_context(init_frame)?;
    }
    Ok(())
}

fn frame_at(
    engine: &ExecutionEngine,
    contract: &ContractState,
    rvcount: i32,
    offset: usize,
) -> VmResult<ExecutionContext> {
    let script = Script::new_relaxed(contract.nef.script.clone());
    let mut frame = ExecutionContext::new(script, rvcount, engine.reference_counter());
    frame.set_script_hash(contract.hash);
    frame.jump(offset as i64)?;
    Ok(frame)
}
