//! `System.Runtime.*` services.

use crate::interop::InteropContext;
use crate::notification::NotificationEvent;
use neodbg_core::{Signer, UInt160, WitnessScope};
use neodbg_vm::{ExecutionEngine, ScriptBuilder, StackItem, VmError, VmResult};

/// Longest accepted runtime log message.
const MAX_LOG_LENGTH: usize = 1024;
/// Longest accepted notification name.
const MAX_EVENT_NAME_LENGTH: usize = 32;

pub(super) fn platform(engine: &mut ExecutionEngine, _context: &mut InteropContext) -> VmResult<()> {
    engine.push(StackItem::from_bytes(b"NEO".to_vec()))
}

pub(super) fn get_network(
    engine: &mut ExecutionEngine,
    context: &mut InteropContext,
) -> VmResult<()> {
    engine.push(StackItem::from_int(context.settings.network as i64))
}

pub(super) fn get_trigger(
    engine: &mut ExecutionEngine,
    context: &mut InteropContext,
) -> VmResult<()> {
    engine.push(StackItem::from_int(context.trigger as u8 as i64))
}

pub(super) fn get_time(
    engine: &mut ExecutionEngine,
    context: &mut InteropContext,
) -> VmResult<()> {
    // Synthetic block time: height times the configured block interval.
    let time = context.block_height as u64 * context.settings.ms_per_block;
    engine.push(StackItem::from_int(time as i64))
}

pub(super) fn get_script_container(
    engine: &mut ExecutionEngine,
    context: &mut InteropContext,
) -> VmResult<()> {
    let Some(transaction) = &context.container else {
        return engine.push(StackItem::Null);
    };
    let sender = transaction
        .sender()
        .map(|signer| signer.account.to_le_vec())
        .unwrap_or_default();
    let fields = vec![
        StackItem::from_bytes(transaction.hash().to_le_vec()),
        StackItem::from_int(transaction.version as i64),
        StackItem::from_int(transaction.nonce as i64),
        StackItem::from_bytes(sender),
        StackItem::from_int(transaction.system_fee),
        StackItem::from_int(transaction.network_fee),
        StackItem::from_int(transaction.valid_until_block as i64),
        StackItem::from_bytes(transaction.script.clone()),
    ];
    engine.push(StackItem::new_array(fields))
}

pub(super) fn get_executing_script_hash(
    engine: &mut ExecutionEngine,
    _context: &mut InteropContext,
) -> VmResult<()> {
    let hash = executing_script_hash(engine)?;
    engine.push(StackItem::from_bytes(hash.to_le_vec()))
}

pub(super) fn get_calling_script_hash(
    engine: &mut ExecutionEngine,
    _context: &mut InteropContext,
) -> VmResult<()> {
    match calling_script_hash(engine) {
        Some(hash) => engine.push(StackItem::from_bytes(hash.to_le_vec())),
        None => engine.push(StackItem::Null),
    }
}

pub(super) fn get_entry_script_hash(
    engine: &mut ExecutionEngine,
    _context: &mut InteropContext,
) -> VmResult<()> {
    let hash = engine
        .entry_context()
        .map(|context| context.script_hash())
        .ok_or_else(|| VmError::invalid_operation("no entry context"))?;
    engine.push(StackItem::from_bytes(hash.to_le_vec()))
}

pub(super) fn log(engine: &mut ExecutionEngine, context: &mut InteropContext) -> VmResult<()> {
    let message = engine.pop()?.try_string()?;
    if message.len() > MAX_LOG_LENGTH {
        return Err(VmError::catchable("log message too long"));
    }
    let hash = executing_script_hash(engine)?;
    tracing::info!(contract = %hash, "runtime log: {message}");
    context.logs.push(message);
    Ok(())
}

pub(super) fn notify(engine: &mut ExecutionEngine, context: &mut InteropContext) -> VmResult<()> {
    let name = engine.pop()?.try_string()?;
    if name.len() > MAX_EVENT_NAME_LENGTH {
        return Err(VmError::catchable("event name too long"));
    }
    let item = engine.pop()?;
    let contract = executing_script_hash(engine)?;
    context.notifications.push(NotificationEvent {
        contract,
        name,
        item,
    });
    Ok(())
}

pub(super) fn check_witness(
    engine: &mut ExecutionEngine,
    context: &mut InteropContext,
) -> VmResult<()> {
    let argument = engine.pop()?.try_bytes()?;
    let hash = match argument.len() {
        20 => UInt160::from_bytes(&argument)
            .map_err(|e| VmError::catchable(format!("bad witness hash: {e}")))?,
        33 => signature_contract_hash(&argument)?,
        other => {
            return Err(VmError::catchable(format!(
                "witness argument must be a hash or public key, got {other} bytes"
            )))
        }
    };
    let witnessed = check_hash_witness(engine, context, &hash)?;
    engine.push(StackItem::from_bool(witnessed))
}

/// The hash of the single-signature verification contract for a key.
fn signature_contract_hash(public_key: &[u8]) -> VmResult<UInt160> {
    let mut builder = ScriptBuilder::new();
    builder.emit_push_bytes(public_key)?;
    builder.emit_syscall("System.Crypto.CheckSig");
    Ok(UInt160::from_script(&builder.to_bytes()))
}

/// Applies the signer's witness scope to the current call.
pub(crate) fn check_hash_witness(
    engine: &ExecutionEngine,
    context: &InteropContext,
    hash: &UInt160,
) -> VmResult<bool> {
    let Some(container) = &context.container else {
        // No container: nothing vouches for anybody.
        return Ok(false);
    };
    let Some(signer) = container.signers.iter().find(|s| s.account == *hash) else {
        return Ok(false);
    };
    scope_matches(engine, context, signer)
}

fn scope_matches(
    engine: &ExecutionEngine,
    context: &InteropContext,
    signer: &Signer,
) -> VmResult<bool> {
    if signer.scopes == WitnessScope::None {
        return Ok(false);
    }
    if signer.scopes.has_flag(WitnessScope::Global) {
        return Ok(true);
    }
    if signer.scopes.has_flag(WitnessScope::CalledByEntry) {
        // The witness holds only while the entry invocation (or a frame it
        // directly called) is asking.
        let entry = engine
            .entry_context()
            .map(|frame| frame.script_hash())
            .ok_or_else(|| VmError::invalid_operation("no entry context"))?;
        let calling = calling_script_hash(engine);
        if calling.is_none() || calling == Some(entry) {
            return Ok(true);
        }
    }
    if signer.scopes.has_flag(WitnessScope::CustomContracts) {
        let executing = executing_script_hash(engine)?;
        if signer.allowed_contracts.contains(&executing) {
            return Ok(true);
        }
    }
    if signer.scopes.has_flag(WitnessScope::CustomGroups) {
        let executing = executing_script_hash(engine)?;
        if let Some(contract) = context.dao.get_contract(&executing) {
            let groups = contract.manifest.group_keys();
            if groups
                .iter()
                .any(|key| signer.allowed_groups.contains(key))
            {
                return Ok(true);
            }
        }
    }
    if signer.scopes.has_flag(WitnessScope::WitnessRules) {
        tracing::warn!("witness rules are not evaluated by the debugger");
    }
    Ok(false)
}

/// The owning hash of the executing frame.
pub(crate) fn executing_script_hash(engine: &ExecutionEngine) -> VmResult<UInt160> {
    engine
        .current_context()
        .map(|context| context.script_hash())
        .ok_or_else(|| VmError::invalid_operation("no current context"))
}

/// The owning hash of the frame that called the executing one, skipping
/// same-script call frames.
pub(crate) fn calling_script_hash(engine: &ExecutionEngine) -> Option<UInt160> {
    let frames = engine.invocation_stack();
    let executing = frames.last()?.script_hash();
    frames
        .iter()
        .rev()
        .map(|frame| frame.script_hash())
        .find(|hash| *hash != executing)
}
