//! The debug session: one loaded script and its interop context.

use crate::error::ShellError;
use neodbg_config::AppConfig;
use neodbg_core::{Signer, Transaction, UInt160};
use neodbg_runtime::{
    historic_context, ContractManifest, InteropContext, InteropRouter, Ledger, MethodToken,
    NotificationEvent,
};
use neodbg_runtime::interop::fake_transaction;
use neodbg_vm::{
    ExecutionContext, ExecutionEngine, PriceTable, Script, StackItem, VMState,
};
use std::cell::RefCell;
use std::rc::Rc;

/// Everything a loader hands to the session.
pub struct LoadOptions {
    /// The script bytes to execute.
    pub script: Vec<u8>,
    /// Owner hash override for deployed contracts.
    pub owner: Option<UInt160>,
    /// Method-token table of the loaded NEF.
    pub tokens: Vec<MethodToken>,
    /// Manifest enabling `run <method>` dispatch.
    pub manifest: Option<ContractManifest>,
    /// Command-line signers for the fake container.
    pub signers: Vec<Signer>,
    /// An on-chain or offline transaction serving as the container.
    pub container: Option<Transaction>,
    /// Gas limit; defaults to the container's system fee or unbounded.
    pub gas: Option<i64>,
    /// Execute against state as of this height.
    pub historic: Option<u32>,
}

impl LoadOptions {
    /// Options for a loose script with defaults everywhere else.
    pub fn raw(script: Vec<u8>) -> Self {
        Self {
            script,
            owner: None,
            tokens: Vec::new(),
            manifest: None,
            signers: Vec::new(),
            container: None,
            gas: None,
            historic: None,
        }
    }
}

struct LoadedScript {
    engine: ExecutionEngine,
    context: Rc<RefCell<InteropContext>>,
    manifest: Option<ContractManifest>,
    script: Script,
}

/// The shell's mutable state: the chain and the currently loaded script.
pub struct DebugSession {
    ledger: Ledger,
    config: AppConfig,
    loaded: Option<LoadedScript>,
}

impl DebugSession {
    /// Creates a session over a fresh in-memory chain.
    pub fn new(config: AppConfig) -> Self {
        let ledger = Ledger::new(config.protocol.clone(), config.db_type);
        Self {
            ledger,
            config,
            loaded: None,
        }
    }

    /// Creates a session over an existing chain (tests, preloaded state).
    pub fn with_ledger(config: AppConfig, ledger: Ledger) -> Self {
        Self {
            ledger,
            config,
            loaded: None,
        }
    }

    /// The chain the session debugs against.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// The chain, mutable (test-chain construction).
    pub fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }

    /// The active configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// True when a script is loaded.
    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Discards the current load, overlay included.
    pub fn reset(&mut self) {
        self.loaded = None;
    }

    /// Loads a script, replacing any previous load, and returns the number
    /// of instructions.
    pub fn load(&mut self, options: LoadOptions) -> Result<usize, ShellError> {
        // Build the interop context before touching the current load, so a
        // failing load leaves the previous state intact.
        let mut context = match options.historic {
            Some(height) => historic_context(&self.ledger, height)?,
            None => InteropContext::new(&self.ledger),
        };
        // Fake containers are valid until the block being accepted.
        let accepting_block = match options.historic {
            Some(height) => height + 1,
            None => self.ledger.height() + 1,
        };

        let container = match options.container {
            Some(mut transaction) => {
                if options.historic.is_some() {
                    transaction.valid_until_block = accepting_block;
                }
                transaction
            }
            None => fake_transaction(
                options.script.clone(),
                options.signers.clone(),
                accepting_block,
            ),
        };
        let gas = options.gas.unwrap_or({
            if container.system_fee > 0 {
                container.system_fee
            } else {
                -1
            }
        });
        context.container = Some(container);

        let script = Script::new_relaxed(options.script);
        let instruction_count = script
            .instruction_count()
            .map_err(|e| ShellError::bad_argument(format!("bad script: {e}")))?;

        let context = Rc::new(RefCell::new(context));
        let mut engine = ExecutionEngine::new();
        engine.set_prices(PriceTable {
            execution_fee_factor: self.config.protocol.execution_fee_factor,
            overrides: self.config.protocol.prices.clone(),
        });
        engine.set_gas_limit(gas);
        engine.set_syscall_router(Box::new(InteropRouter::new(Rc::clone(&context))));

        let mut frame = ExecutionContext::new(script.clone(), -1, engine.reference_counter());
        if let Some(owner) = options.owner {
            frame.set_script_hash(owner);
        }
        let owner_hash = frame.script_hash();
        engine
            .load_context(frame)
            .map_err(ShellError::Vm)?;
        context
            .borrow_mut()
            .register_tokens(owner_hash, options.tokens);

        // The previous interop context and its overlay die here.
        self.loaded = Some(LoadedScript {
            engine,
            context,
            manifest: options.manifest,
            script,
        });
        Ok(instruction_count)
    }

    /// The loaded script's engine.
    pub fn engine(&self) -> Result<&ExecutionEngine, ShellError> {
        self.loaded
            .as_ref()
            .map(|loaded| &loaded.engine)
            .ok_or(ShellError::NoScript)
    }

    /// The loaded script's engine, mutable.
    pub fn engine_mut(&mut self) -> Result<&mut ExecutionEngine, ShellError> {
        self.loaded
            .as_mut()
            .map(|loaded| &mut loaded.engine)
            .ok_or(ShellError::NoScript)
    }

    /// The loaded script.
    pub fn script(&self) -> Result<&Script, ShellError> {
        self.loaded
            .as_ref()
            .map(|loaded| &loaded.script)
            .ok_or(ShellError::NoScript)
    }

    /// The loaded manifest, if any.
    pub fn manifest(&self) -> Option<&ContractManifest> {
        self.loaded.as_ref().and_then(|loaded| loaded.manifest.as_ref())
    }

    /// The interop context of the current load.
    pub fn context(&self) -> Result<Rc<RefCell<InteropContext>>, ShellError> {
        self.loaded
            .as_ref()
            .map(|loaded| Rc::clone(&loaded.context))
            .ok_or(ShellError::NoScript)
    }

    /// Notifications accumulated by the current load.
    pub fn notifications(&self) -> Vec<NotificationEvent> {
        self.loaded
            .as_ref()
            .map(|loaded| loaded.context.borrow().notifications.clone())
            .unwrap_or_default()
    }

    /// The instruction pointer of the current frame.
    pub fn instruction_pointer(&self) -> Option<usize> {
        let loaded = self.loaded.as_ref()?;
        loaded
            .engine
            .current_context()
            .map(|context| context.instruction_pointer())
    }

    /// Prepares `run <method> <params>`: pushes parameters, jumps the
    /// entry frame to the method offset, and schedules `_initialize`.
    pub fn prepare_method_call(
        &mut self,
        method: &str,
        parameters: Vec<StackItem>,
    ) -> Result<(), ShellError> {
        let loaded = self.loaded.as_mut().ok_or(ShellError::NoScript)?;
        let manifest = loaded.manifest.as_ref().ok_or(ShellError::NoManifest)?;
        let target = manifest
            .abi
            .method(method, parameters.len())
            .or_else(|| manifest.abi.method_by_name(method))
            .ok_or_else(|| {
                ShellError::bad_argument(format!("method {method} not found in manifest"))
            })?;
        let offset = target.offset;
        let initialize_offset = manifest.abi.initialize_method().map(|m| m.offset);

        let reference_counter = loaded.engine.reference_counter().clone();
        Self::push_parameters(&mut loaded.engine, parameters)?;
        let init_frame = {
            let frame = loaded
                .engine
                .current_context_mut()
                .ok_or(ShellError::NoScript)?;
            frame.jump(offset as i64).map_err(ShellError::Vm)?;
            initialize_offset.map(|position| frame.fork_for_call(position, &reference_counter))
        };
        if let Some(init_frame) = init_frame {
            loaded.engine.load_context(init_frame).map_err(ShellError::Vm)?;
        }
        Ok(())
    }

    /// Pushes `run` parameters so the first parameter ends on top.
    pub fn push_run_parameters(&mut self, parameters: Vec<StackItem>) -> Result<(), ShellError> {
        let loaded = self.loaded.as_mut().ok_or(ShellError::NoScript)?;
        Self::push_parameters(&mut loaded.engine, parameters)
    }

    fn push_parameters(
        engine: &mut ExecutionEngine,
        parameters: Vec<StackItem>,
    ) -> Result<(), ShellError> {
        for parameter in parameters.into_iter().rev() {
            engine.push(parameter).map_err(ShellError::Vm)?;
        }
        Ok(())
    }

    /// Runs until halt, fault or breakpoint.
    pub fn continue_execution(&mut self) -> Result<VMState, ShellError> {
        Ok(self.engine_mut()?.continue_execution())
    }
}
