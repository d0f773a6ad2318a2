//! Interop services: the syscall surface coupling the VM to chain state.
//!
//! The catalogue is a flat table keyed by the 32-bit id of each service
//! (first four little-endian bytes of SHA-256 over the canonical name).
//! Each entry carries the required call flags, a price, and a plain
//! function handler.

pub mod contract;
pub mod runtime;
pub mod storage;

use crate::dao::Dao;
use crate::error::RuntimeResult;
use crate::ledger::Ledger;
use crate::notification::NotificationEvent;
use crate::trigger::TriggerType;
use neodbg_config::ProtocolSettings;
use neodbg_core::{Transaction, UInt160};
use neodbg_vm::script_builder::sha_id::syscall_id;
use neodbg_vm::{CallFlags, ExecutionEngine, SyscallRouter, VmError, VmResult};
use once_cell::sync::Lazy;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::contract_state::MethodToken;

/// One entry of the interop catalogue.
pub struct InteropDescriptor {
    /// Canonical service name, e.g. `System.Storage.Get`.
    pub name: &'static str,
    /// Flags the calling context must hold.
    pub required_flags: CallFlags,
    /// Base price in datoshi, scaled by the execution fee factor.
    pub price: i64,
    /// The service implementation.
    pub handler: fn(&mut ExecutionEngine, &mut InteropContext) -> VmResult<()>,
}

/// The state side of one script load: trigger, DAO overlay, container,
/// notifications, and the chain facts scripts may ask about.
pub struct InteropContext {
    /// Why this execution runs.
    pub trigger: TriggerType,
    /// The transactional state view this execution writes into.
    pub dao: Dao,
    /// The verifiable container the script executes under.
    pub container: Option<Transaction>,
    /// Notifications in execution order.
    pub notifications: Vec<NotificationEvent>,
    /// Runtime log lines in execution order.
    pub logs: Vec<String>,
    /// Protocol settings of the chain.
    pub settings: ProtocolSettings,
    /// Actual chain height.
    pub chain_height: u32,
    /// Height presented to the executing script; differs from
    /// `chain_height` during historic execution.
    pub block_height: u32,
    /// Method-token tables per owning script hash, for CALLT.
    pub method_tokens: HashMap<UInt160, Vec<MethodToken>>,
}

impl InteropContext {
    /// Creates an application-trigger context over the ledger's live state.
    pub fn new(ledger: &Ledger) -> Self {
        Self {
            trigger: TriggerType::Application,
            dao: Dao::new(ledger.current_store()),
            container: None,
            notifications: Vec::new(),
            logs: Vec::new(),
            settings: ledger.settings().clone(),
            chain_height: ledger.height(),
            block_height: ledger.height(),
            method_tokens: HashMap::new(),
        }
    }

    /// Attaches the container transaction.
    pub fn with_container(mut self, container: Transaction) -> Self {
        self.container = Some(container);
        self
    }

    /// Registers a script's method-token table.
    pub fn register_tokens(&mut self, hash: UInt160, tokens: Vec<MethodToken>) {
        if !tokens.is_empty() {
            self.method_tokens.insert(hash, tokens);
        }
    }
}

macro_rules! catalogue {
    ($($name:literal, $flags:expr, $price:expr, $handler:path;)*) => {
        static CATALOGUE: Lazy<HashMap<u32, InteropDescriptor>> = Lazy::new(|| {
            let mut table = HashMap::new();
            $(
                table.insert(
                    syscall_id($name),
                    InteropDescriptor {
                        name: $name,
                        required_flags: $flags,
                        price: $price,
                        handler: $handler,
                    },
                );
            )*
            table
        });
    };
}

catalogue! {
    "System.Runtime.Platform", CallFlags::NONE, 1 << 3, runtime::platform;
    "System.Runtime.GetNetwork", CallFlags::NONE, 1 << 3, runtime::get_network;
    "System.Runtime.GetTrigger", CallFlags::NONE, 1 << 3, runtime::get_trigger;
    "System.Runtime.GetTime", CallFlags::NONE, 1 << 3, runtime::get_time;
    "System.Runtime.GetScriptContainer", CallFlags::NONE, 1 << 3, runtime::get_script_container;
    "System.Runtime.GetExecutingScriptHash", CallFlags::NONE, 1 << 4, runtime::get_executing_script_hash;
    "System.Runtime.GetCallingScriptHash", CallFlags::NONE, 1 << 4, runtime::get_calling_script_hash;
    "System.Runtime.GetEntryScriptHash", CallFlags::NONE, 1 << 4, runtime::get_entry_script_hash;
    "System.Runtime.CheckWitness", CallFlags::NONE, 1 << 10, runtime::check_witness;
    "System.Runtime.Log", CallFlags::NONE, 1 << 15, runtime::log;
    "System.Runtime.Notify", CallFlags::ALLOW_NOTIFY, 1 << 15, runtime::notify;
    "System.Storage.GetContext", CallFlags::READ_STATES, 1 << 4, storage::get_context;
    "System.Storage.GetReadOnlyContext", CallFlags::READ_STATES, 1 << 4, storage::get_read_only_context;
    "System.Storage.AsReadOnly", CallFlags::READ_STATES, 1 << 4, storage::as_read_only;
    "System.Storage.Get", CallFlags::READ_STATES, 1 << 15, storage::get;
    "System.Storage.Put", CallFlags::WRITE_STATES, 1 << 15, storage::put;
    "System.Storage.Delete", CallFlags::WRITE_STATES, 1 << 15, storage::delete;
    "System.Storage.Find", CallFlags::READ_STATES, 1 << 15, storage::find;
    "System.Iterator.Next", CallFlags::NONE, 1 << 15, storage::iterator_next;
    "System.Iterator.Value", CallFlags::NONE, 1 << 4, storage::iterator_value;
    "System.Contract.Call", CallFlags::READ_STATES, 1 << 15, contract::call;
    "System.Contract.GetCallFlags", CallFlags::NONE, 1 << 10, contract::get_call_flags;
}

/// Resolves a syscall id to its canonical name.
pub fn syscall_name(id: u32) -> Option<&'static str> {
    CATALOGUE.get(&id).map(|descriptor| descriptor.name)
}

/// Routes syscalls and method-token calls into the interop catalogue.
///
/// The context is shared with the shell so that notifications and the
/// storage overlay remain inspectable after a run.
pub struct InteropRouter {
    context: Rc<RefCell<InteropContext>>,
}

impl InteropRouter {
    /// Creates a router over a shared interop context.
    pub fn new(context: Rc<RefCell<InteropContext>>) -> Self {
        Self { context }
    }
}

impl SyscallRouter for InteropRouter {
    fn invoke(&mut self, engine: &mut ExecutionEngine, id: u32) -> VmResult<()> {
        let descriptor = CATALOGUE
            .get(&id)
            .ok_or(VmError::UnknownSyscall { id })?;
        let held = engine
            .current_context()
            .map(|context| context.call_flags())
            .unwrap_or(CallFlags::ALL);
        if !held.contains(descriptor.required_flags) {
            return Err(VmError::invalid_operation(format!(
                "syscall {} requires {}, context has {held}",
                descriptor.name, descriptor.required_flags
            )));
        }
        let mut context = self.context.borrow_mut();
        let price = descriptor
            .price
            .saturating_mul(context.settings.execution_fee_factor);
        engine.consume_gas(price)?;
        (descriptor.handler)(engine, &mut context)
    }

    fn call_token(&mut self, engine: &mut ExecutionEngine, index: u16) -> VmResult<()> {
        let mut context = self.context.borrow_mut();
        contract::call_token(engine, &mut context, index)
    }

    fn resolve_name(&self, id: u32) -> Option<String> {
        syscall_name(id).map(str::to_string)
    }
}

/// Builds a fake container transaction for loose-script loads: the given
/// signers, the loaded script, and a validity window starting at the
/// context's accepting block.
pub fn fake_transaction(
    script: Vec<u8>,
    signers: Vec<neodbg_core::Signer>,
    accepting_block: u32,
) -> Transaction {
    Transaction {
        version: 0,
        nonce: 0,
        system_fee: 0,
        network_fee: 0,
        valid_until_block: accepting_block,
        signers,
        attributes: Vec::new(),
        script,
        witnesses: Vec::new(),
    }
}

/// Convenience used by tests and the shell: application-trigger context
/// over the live chain with a fake container.
pub fn application_context(
    ledger: &Ledger,
    script: Vec<u8>,
    signers: Vec<neodbg_core::Signer>,
) -> RuntimeResult<InteropContext> {
    let accepting = ledger.height() + 1;
    let container = fake_transaction(script, signers, accepting);
    Ok(InteropContext::new(ledger).with_container(container))
}
