//! Execution engine for the Neo Virtual Machine.
//!
//! Owns the invocation stack, the gas meter, breakpoints and the step
//! controller. Syscalls and method-token calls are routed through a
//! [`SyscallRouter`] installed by the host.

use crate::error::{VmError, VmResult};
use crate::evaluation_stack::EvaluationStack;
use crate::exception_handling::{ExceptionHandlingState, TryContext};
use crate::execution_context::ExecutionContext;
use crate::jump_table;
use crate::op_code::OpCode;
use crate::reference_counter::ReferenceCounter;
use crate::script::Script;
use crate::slot::Slot;
use crate::stack_item::StackItem;
use crate::vm_state::VMState;
use neodbg_config::MAX_INVOCATION_STACK_SIZE;
use neodbg_core::UInt160;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

/// Routes SYSCALL and CALLT instructions to the host's interop layer.
pub trait SyscallRouter {
    /// Dispatches a syscall by its 32-bit id.
    fn invoke(&mut self, engine: &mut ExecutionEngine, id: u32) -> VmResult<()>;

    /// Dispatches a CALLT through the owning script's method-token table.
    fn call_token(&mut self, engine: &mut ExecutionEngine, index: u16) -> VmResult<()>;

    /// Resolves a syscall id to its canonical name, for disassembly.
    fn resolve_name(&self, id: u32) -> Option<String>;
}

/// Per-opcode gas pricing: base price times the execution fee factor, with
/// optional per-mnemonic overrides from the protocol config.
#[derive(Debug, Clone)]
pub struct PriceTable {
    /// Multiplier applied to each base price.
    pub execution_fee_factor: i64,
    /// Base-price overrides keyed by mnemonic.
    pub overrides: BTreeMap<String, i64>,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self {
            execution_fee_factor: 30,
            overrides: BTreeMap::new(),
        }
    }
}

impl PriceTable {
    /// The gas charged for one dispatch of `opcode`.
    pub fn price(&self, opcode: OpCode) -> i64 {
        let base = self
            .overrides
            .get(opcode.name())
            .copied()
            .unwrap_or_else(|| opcode.base_price());
        base.saturating_mul(self.execution_fee_factor)
    }
}

/// The execution engine for the Neo VM.
pub struct ExecutionEngine {
    state: VMState,
    invocation_stack: Vec<ExecutionContext>,
    result_stack: EvaluationStack,
    reference_counter: ReferenceCounter,
    static_fields: HashMap<UInt160, Rc<RefCell<Slot>>>,
    breakpoints: HashMap<UInt160, HashSet<usize>>,
    one_shot_breakpoints: HashSet<(UInt160, usize)>,
    prices: PriceTable,
    gas_limit: i64,
    gas_consumed: i64,
    uncaught_exception: Option<StackItem>,
    fault_message: Option<String>,
    syscall_router: Option<Box<dyn SyscallRouter>>,
    /// Set by jumps and calls so the loop does not auto-advance the pointer.
    pub(crate) is_jumping: bool,
}

impl ExecutionEngine {
    /// Creates an engine with unbounded gas and no loaded script.
    pub fn new() -> Self {
        let reference_counter = ReferenceCounter::new();
        Self {
            state: VMState::Break,
            invocation_stack: Vec::new(),
            result_stack: EvaluationStack::new(reference_counter.clone()),
            reference_counter,
            static_fields: HashMap::new(),
            breakpoints: HashMap::new(),
            one_shot_breakpoints: HashSet::new(),
            prices: PriceTable::default(),
            gas_limit: -1,
            gas_consumed: 0,
            uncaught_exception: None,
            fault_message: None,
            syscall_router: None,
            is_jumping: false,
        }
    }

    /// The current VM state.
    pub fn state(&self) -> VMState {
        self.state
    }

    /// Sets the VM state.
    pub fn set_state(&mut self, state: VMState) {
        self.state = state;
    }

    /// The shared reference counter.
    pub fn reference_counter(&self) -> &ReferenceCounter {
        &self.reference_counter
    }

    /// The configured price table.
    pub fn prices(&self) -> &PriceTable {
        &self.prices
    }

    /// Replaces the price table.
    pub fn set_prices(&mut self, prices: PriceTable) {
        self.prices = prices;
    }

    /// Installs the syscall router.
    pub fn set_syscall_router(&mut self, router: Box<dyn SyscallRouter>) {
        self.syscall_router = Some(router);
    }

    /// Resolves a syscall id through the installed router.
    pub fn resolve_syscall_name(&self, id: u32) -> Option<String> {
        self.syscall_router.as_ref()?.resolve_name(id)
    }

    // === Gas ===

    /// The gas limit; -1 disables metering.
    pub fn gas_limit(&self) -> i64 {
        self.gas_limit
    }

    /// Sets the gas limit; -1 disables metering.
    pub fn set_gas_limit(&mut self, limit: i64) {
        self.gas_limit = limit;
    }

    /// Gas consumed so far.
    pub fn gas_consumed(&self) -> i64 {
        self.gas_consumed
    }

    /// Charges `amount` of gas, faulting on exhaustion.
    pub fn consume_gas(&mut self, amount: i64) -> VmResult<()> {
        self.gas_consumed = self.gas_consumed.saturating_add(amount.max(0));
        if self.gas_limit >= 0 && self.gas_consumed > self.gas_limit {
            return Err(VmError::GasExhausted);
        }
        Ok(())
    }

    // === Invocation stack ===

    /// The invocation stack, entry frame first.
    pub fn invocation_stack(&self) -> &[ExecutionContext] {
        &self.invocation_stack
    }

    /// The current (top) frame.
    pub fn current_context(&self) -> Option<&ExecutionContext> {
        self.invocation_stack.last()
    }

    /// The current frame, mutable.
    pub fn current_context_mut(&mut self) -> Option<&mut ExecutionContext> {
        self.invocation_stack.last_mut()
    }

    /// The entry frame.
    pub fn entry_context(&self) -> Option<&ExecutionContext> {
        self.invocation_stack.first()
    }

    /// Invocation depth.
    pub fn invocation_depth(&self) -> usize {
        self.invocation_stack.len()
    }

    /// The result stack holding declared return values after HALT.
    pub fn result_stack(&self) -> &EvaluationStack {
        &self.result_stack
    }

    /// The result stack, mutable.
    pub fn result_stack_mut(&mut self) -> &mut EvaluationStack {
        &mut self.result_stack
    }

    /// The uncaught exception, if a THROW is unwinding.
    pub fn uncaught_exception(&self) -> Option<&StackItem> {
        self.uncaught_exception.as_ref()
    }

    /// The recorded fault description, if the VM faulted.
    pub fn fault_message(&self) -> Option<&str> {
        self.fault_message.as_deref()
    }

    /// Pushes a frame onto the invocation stack.
    pub fn load_context(&mut self, context: ExecutionContext) -> VmResult<()> {
        if self.invocation_stack.len() >= MAX_INVOCATION_STACK_SIZE {
            return Err(VmError::InvocationStackOverflow {
                depth: self.invocation_stack.len(),
            });
        }
        self.invocation_stack.push(context);
        Ok(())
    }

    /// Loads `script` as a fresh entry frame and readies the engine.
    pub fn load_script(&mut self, script: Script, rvcount: i32) -> VmResult<&ExecutionContext> {
        let context = ExecutionContext::new(script, rvcount, &self.reference_counter);
        self.load_context(context)?;
        self.state = VMState::Break;
        self.current_context()
            .ok_or_else(|| VmError::invalid_operation("no context after load"))
    }

    /// The shared static-field slot for `hash`, if one was allocated.
    pub fn shared_static_fields(&self, hash: &UInt160) -> Option<Rc<RefCell<Slot>>> {
        self.static_fields.get(hash).cloned()
    }

    /// Registers the shared static-field slot for `hash`.
    pub fn register_static_fields(&mut self, hash: UInt160, slot: Rc<RefCell<Slot>>) {
        self.static_fields.insert(hash, slot);
    }

    // === Stack conveniences for instruction handlers ===

    /// Pushes onto the current frame's stack.
    pub fn push(&mut self, item: StackItem) -> VmResult<()> {
        self.current_context_mut()
            .ok_or_else(|| VmError::invalid_operation("no current context"))?
            .evaluation_stack_mut()
            .push(item)
    }

    /// Pops from the current frame's stack.
    pub fn pop(&mut self) -> VmResult<StackItem> {
        self.current_context_mut()
            .ok_or_else(|| VmError::invalid_operation("no current context"))?
            .evaluation_stack_mut()
            .pop()
    }

    /// Peeks into the current frame's stack.
    pub fn peek(&self, n: usize) -> VmResult<StackItem> {
        Ok(self
            .current_context()
            .ok_or_else(|| VmError::invalid_operation("no current context"))?
            .evaluation_stack()
            .peek(n)?
            .clone())
    }

    // === Breakpoints ===

    /// Sets a breakpoint at `position` in the current frame's script.
    pub fn add_breakpoint(&mut self, position: usize) -> VmResult<()> {
        let context = self
            .current_context()
            .ok_or_else(|| VmError::invalid_operation("no script is loaded"))?;
        if !context.script().is_boundary(position)? {
            return Err(VmError::InvalidJumpTarget {
                target: position as i64,
            });
        }
        self.breakpoints
            .entry(context.script_hash())
            .or_default()
            .insert(position);
        Ok(())
    }

    /// Schedules a one-shot break `count` instructions ahead in the current
    /// frame's script.
    pub fn add_breakpoint_rel(&mut self, count: usize) -> VmResult<()> {
        let context = self
            .current_context()
            .ok_or_else(|| VmError::invalid_operation("no script is loaded"))?;
        let script = context.script().clone();
        let hash = context.script_hash();
        let mut position = context.instruction_pointer();
        for _ in 0..count {
            if position >= script.len() {
                break;
            }
            position = script.instruction_at(position)?.next_position();
        }
        self.one_shot_breakpoints.insert((hash, position));
        Ok(())
    }

    /// Removes every breakpoint.
    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
        self.one_shot_breakpoints.clear();
    }

    fn take_breakpoint_hit(&mut self) -> bool {
        let Some(context) = self.current_context() else {
            return false;
        };
        let key = (context.script_hash(), context.instruction_pointer());
        if self.one_shot_breakpoints.remove(&key) {
            return true;
        }
        self.breakpoints
            .get(&key.0)
            .is_some_and(|set| set.contains(&key.1))
    }

    // === Execution ===

    /// Runs until HALT, FAULT, or a breakpoint. The instruction under a
    /// breakpoint is not executed; continuing resumes from it.
    pub fn continue_execution(&mut self) -> VMState {
        if self.state.is_finished() {
            return self.state;
        }
        self.state = VMState::None;
        let mut first = true;
        while !self.state.is_finished() {
            if !first && self.take_breakpoint_hit() {
                self.state = VMState::Break;
                break;
            }
            first = false;
            if let Err(err) = self.execute_next() {
                self.record_fault(err);
            }
        }
        self.state
    }

    /// Executes exactly one instruction, then parks in Break unless the
    /// execution actually ended.
    pub fn step_into(&mut self) -> VMState {
        if self.state.is_finished() {
            return self.state;
        }
        self.state = VMState::None;
        if let Err(err) = self.execute_next() {
            self.record_fault(err);
        }
        if !self.state.is_finished() {
            self.state = VMState::Break;
        }
        self.state
    }

    /// Runs until the invocation depth drops below the current depth.
    pub fn step_out(&mut self) -> VMState {
        self.step_until_depth(|depth, initial| depth < initial)
    }

    /// Executes one instruction; if it deepened the invocation stack, keeps
    /// running until control returns to the original depth.
    pub fn step_over(&mut self) -> VMState {
        if self.state.is_finished() {
            return self.state;
        }
        self.state = VMState::None;
        let initial = self.invocation_depth();
        if let Err(err) = self.execute_next() {
            self.record_fault(err);
        }
        while !self.state.is_finished() && self.invocation_depth() > initial {
            if self.take_breakpoint_hit() {
                break;
            }
            if let Err(err) = self.execute_next() {
                self.record_fault(err);
            }
        }
        if !self.state.is_finished() {
            self.state = VMState::Break;
        }
        self.state
    }

    fn step_until_depth(&mut self, done: impl Fn(usize, usize) -> bool) -> VMState {
        if self.state.is_finished() {
            return self.state;
        }
        self.state = VMState::None;
        let initial = self.invocation_depth();
        let mut first = true;
        loop {
            if self.state.is_finished() || done(self.invocation_depth(), initial) {
                break;
            }
            if !first && self.take_breakpoint_hit() {
                break;
            }
            first = false;
            if let Err(err) = self.execute_next() {
                self.record_fault(err);
            }
        }
        if !self.state.is_finished() {
            self.state = VMState::Break;
        }
        self.state
    }

    fn record_fault(&mut self, err: VmError) {
        if self.fault_message.is_none() {
            let location = self
                .current_context()
                .and_then(|context| {
                    let position = context.instruction_pointer();
                    context
                        .current_instruction()
                        .ok()
                        .map(|instruction| (position, instruction.opcode))
                })
                .map(|(position, opcode)| format!("at instruction {position} ({opcode})"));
            self.fault_message = Some(match location {
                Some(location) => format!("{location}: {err}"),
                None => err.to_string(),
            });
        }
        self.state = VMState::Fault;
    }

    /// Executes the instruction under the pointer of the current frame.
    pub fn execute_next(&mut self) -> VmResult<()> {
        if self.state.is_finished() {
            return Ok(());
        }
        let Some(context) = self.invocation_stack.last() else {
            self.state = VMState::Halt;
            return Ok(());
        };

        if context.at_script_end() {
            // Implicit RET at the end of the script.
            return self.unload_current_context();
        }

        let instruction = context.current_instruction()?;

        let price = self.prices.price(instruction.opcode);
        self.consume_gas(price)?;

        self.is_jumping = false;
        jump_table::execute(self, &instruction)?;

        if !self.is_jumping && !self.state.is_finished() {
            if let Some(context) = self.current_context_mut() {
                if context.instruction_pointer() == instruction.pointer {
                    context.set_instruction_pointer(instruction.next_position());
                }
            }
        }
        self.is_jumping = false;
        Ok(())
    }

    /// Pops the current frame, moving its declared return values to the
    /// calling frame, or to the result stack for the entry frame.
    pub fn unload_current_context(&mut self) -> VmResult<()> {
        let mut context = self
            .invocation_stack
            .pop()
            .ok_or_else(|| VmError::invalid_operation("no context to unload"))?;

        let rvcount = context.rvcount();
        let produced = context.evaluation_stack().len();
        if rvcount >= 0 && produced != rvcount as usize {
            // Put it back so diagnostics still see the frame.
            let message = format!(
                "return value count mismatch: declared {rvcount}, produced {produced}"
            );
            self.invocation_stack.push(context);
            return Err(VmError::invalid_operation(message));
        }

        match self.invocation_stack.last_mut() {
            Some(parent) => {
                context
                    .evaluation_stack_mut()
                    .drain_to(parent.evaluation_stack_mut())?;
            }
            None => {
                context
                    .evaluation_stack_mut()
                    .drain_to(&mut self.result_stack)?;
            }
        }
        context.clear_references();

        if self.invocation_stack.is_empty() {
            self.state = VMState::Halt;
        }
        self.is_jumping = true;
        Ok(())
    }

    // === Control-flow helpers used by instruction handlers ===

    /// Jumps the current frame to an absolute position.
    pub fn execute_jump(&mut self, position: i64) -> VmResult<()> {
        self.current_context_mut()
            .ok_or_else(|| VmError::invalid_operation("no current context"))?
            .jump(position)?;
        self.is_jumping = true;
        Ok(())
    }

    /// Jumps the current frame relative to the current instruction.
    pub fn execute_jump_offset(&mut self, offset: i64) -> VmResult<()> {
        let base = self
            .current_context()
            .ok_or_else(|| VmError::invalid_operation("no current context"))?
            .instruction_pointer() as i64;
        self.execute_jump(base + offset)
    }

    /// Pushes a same-script call frame targeting `position`.
    pub fn execute_call(&mut self, position: i64) -> VmResult<()> {
        let reference_counter = self.reference_counter.clone();
        let (resume, fork) = {
            let context = self
                .current_context()
                .ok_or_else(|| VmError::invalid_operation("no current context"))?;
            if position < 0
                || position > context.script().len() as i64
                || !context.script().is_boundary(position as usize)?
            {
                return Err(VmError::InvalidJumpTarget { target: position });
            }
            // The caller resumes at the next instruction.
            let resume = context.current_instruction()?.next_position();
            (
                resume,
                context.fork_for_call(position as usize, &reference_counter),
            )
        };
        self.current_context_mut()
            .expect("context checked above")
            .set_instruction_pointer(resume);
        self.load_context(fork)?;
        self.is_jumping = true;
        Ok(())
    }

    /// Loads a cross-script call frame (Contract.Call, CALLT): advances the
    /// caller past the invoking instruction, then pushes the new frame.
    pub fn load_contract_context(&mut self, context: ExecutionContext) -> VmResult<()> {
        if let Some(current) = self.current_context_mut() {
            if !current.at_script_end() {
                let next = current.current_instruction()?.next_position();
                current.set_instruction_pointer(next);
            }
        }
        self.load_context(context)?;
        self.is_jumping = true;
        Ok(())
    }

    /// Dispatches a SYSCALL through the installed router.
    pub fn on_syscall(&mut self, id: u32) -> VmResult<()> {
        let mut router = self
            .syscall_router
            .take()
            .ok_or(VmError::UnknownSyscall { id })?;
        let result = router.invoke(self, id);
        self.syscall_router = Some(router);
        result
    }

    /// Dispatches a CALLT through the installed router.
    pub fn on_call_token(&mut self, index: u16) -> VmResult<()> {
        let mut router = self.syscall_router.take().ok_or_else(|| {
            VmError::invalid_operation(format!("CALLT {index}: no method token table"))
        })?;
        let result = router.call_token(self, index);
        self.syscall_router = Some(router);
        result
    }

    // === Structured exceptions ===

    /// Opens a TRY block with handler offsets relative to the TRY opcode.
    pub fn execute_try(&mut self, catch_offset: i32, finally_offset: i32) -> VmResult<()> {
        if catch_offset == 0 && finally_offset == 0 {
            return Err(VmError::invalid_operation(
                "TRY with neither catch nor finally",
            ));
        }
        let context = self
            .current_context_mut()
            .ok_or_else(|| VmError::invalid_operation("no current context"))?;
        let base = context.instruction_pointer() as i64;
        let resolve = |offset: i32| -> Option<usize> {
            (offset != 0).then_some((base + offset as i64) as usize)
        };
        context.push_try(TryContext::new(resolve(catch_offset), resolve(finally_offset)))
    }

    /// Leaves the protected region: runs the finally handler if present,
    /// otherwise continues at the ENDTRY target.
    pub fn execute_end_try(&mut self, end_offset: i32) -> VmResult<()> {
        let context = self
            .current_context_mut()
            .ok_or_else(|| VmError::invalid_operation("no current context"))?;
        let base = context.instruction_pointer() as i64;
        let end_position = (base + end_offset as i64) as usize;

        let try_context = context
            .try_stack_last()
            .ok_or_else(|| VmError::invalid_operation("ENDTRY outside of a TRY block"))?;
        if try_context.state == ExceptionHandlingState::Finally {
            return Err(VmError::invalid_operation("ENDTRY inside finally"));
        }

        if try_context.has_finally() {
            let finally_position = try_context
                .finally_position
                .expect("has_finally checked above");
            let entry = context
                .try_stack_last_mut()
                .expect("try context checked above");
            entry.state = ExceptionHandlingState::Finally;
            entry.end_position = end_position;
            context.set_instruction_pointer(finally_position);
        } else {
            context.pop_try();
            context.set_instruction_pointer(end_position);
        }
        self.is_jumping = true;
        Ok(())
    }

    /// Closes a finally handler: resumes unwinding a pending exception, or
    /// continues at the recorded end position.
    pub fn execute_end_finally(&mut self) -> VmResult<()> {
        let context = self
            .current_context_mut()
            .ok_or_else(|| VmError::invalid_operation("no current context"))?;
        let try_context = context
            .pop_try()
            .ok_or_else(|| VmError::invalid_operation("ENDFINALLY outside of a TRY block"))?;
        if try_context.state != ExceptionHandlingState::Finally {
            return Err(VmError::invalid_operation(
                "ENDFINALLY outside of a finally block",
            ));
        }
        if self.uncaught_exception.is_some() {
            let exception = self.uncaught_exception.take();
            self.throw(exception)?;
        } else {
            let context = self
                .current_context_mut()
                .expect("context checked above");
            context.set_instruction_pointer(try_context.end_position);
            self.is_jumping = true;
        }
        Ok(())
    }

    /// Raises `exception`, unwinding the invocation stack to the nearest
    /// catch or finally handler.
    pub fn throw(&mut self, exception: Option<StackItem>) -> VmResult<()> {
        self.uncaught_exception = exception;

        while let Some(context) = self.invocation_stack.last_mut() {
            // Walk this frame's try-stack from the innermost handler.
            loop {
                let Some(try_context) = context.try_stack_last() else {
                    break;
                };
                let state = try_context.state;
                let has_finally = try_context.has_finally();
                let catch_position = try_context.catch_position;
                let finally_position = try_context.finally_position;

                if state == ExceptionHandlingState::Finally
                    || (state == ExceptionHandlingState::Catch && !has_finally)
                {
                    // This handler is already running; skip past it.
                    context.pop_try();
                    continue;
                }

                if state == ExceptionHandlingState::Try && catch_position.is_some() {
                    let entry = context
                        .try_stack_last_mut()
                        .expect("try context checked above");
                    entry.state = ExceptionHandlingState::Catch;
                    let exception = self
                        .uncaught_exception
                        .take()
                        .unwrap_or(StackItem::Null);
                    context.evaluation_stack_mut().push(exception)?;
                    context
                        .set_instruction_pointer(catch_position.expect("checked above"));
                    self.is_jumping = true;
                    return Ok(());
                }

                // Catch ran (or no catch declared); enter the finally.
                let entry = context
                    .try_stack_last_mut()
                    .expect("try context checked above");
                entry.state = ExceptionHandlingState::Finally;
                context.set_instruction_pointer(
                    finally_position.expect("finally checked by state machine"),
                );
                self.is_jumping = true;
                return Ok(());
            }

            // No handler in this frame; discard it and keep unwinding.
            let mut dropped = self
                .invocation_stack
                .pop()
                .expect("loop condition guarantees a frame");
            dropped.clear_references();
        }

        self.state = VMState::Fault;
        let exception = self.uncaught_exception.take();
        Err(VmError::UnhandledException {
            message: exception
                .map(|item| item.to_string())
                .unwrap_or_else(|| "exception".into()),
        })
    }
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with(script: &[u8]) -> ExecutionEngine {
        let mut engine = ExecutionEngine::new();
        engine
            .load_script(Script::new(script.to_vec()).unwrap(), -1)
            .unwrap();
        engine
    }

    #[test]
    fn push_add_halts_with_result() {
        // PUSH1 PUSH2 ADD
        let mut engine = engine_with(&[0x11, 0x12, 0x9e]);
        assert_eq!(engine.continue_execution(), VMState::Halt);
        assert_eq!(engine.result_stack().len(), 1);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().try_integer().unwrap(),
            3.into()
        );
    }

    #[test]
    fn breakpoints_pause_before_execution() {
        // PUSH1 PUSH2 ADD PUSH6 ADD
        let mut engine = engine_with(&[0x11, 0x12, 0x9e, 0x16, 0x9e]);
        engine.add_breakpoint(2).unwrap();
        assert_eq!(engine.continue_execution(), VMState::Break);
        let context = engine.current_context().unwrap();
        assert_eq!(context.instruction_pointer(), 2);
        assert_eq!(context.evaluation_stack().len(), 2);
        // Continuing resumes from the breakpoint instruction.
        assert_eq!(engine.continue_execution(), VMState::Halt);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().try_integer().unwrap(),
            9.into()
        );
    }

    #[test]
    fn step_into_executes_one_instruction() {
        let mut engine = engine_with(&[0x11, 0x12, 0x9e]);
        assert_eq!(engine.step_into(), VMState::Break);
        assert_eq!(engine.current_context().unwrap().instruction_pointer(), 1);
        assert_eq!(engine.step_into(), VMState::Break);
        assert_eq!(engine.step_into(), VMState::Break);
        // Implicit RET.
        assert_eq!(engine.step_into(), VMState::Halt);
    }

    #[test]
    fn step_over_skips_calls() {
        // 0: CALL +4 (-> 5); 2: PUSH2; 3: ADD; 4: RET; 5: PUSH1; 6: RET
        let script = [0x34, 0x05, 0x12, 0x9e, 0x40, 0x11, 0x40];
        let mut engine = engine_with(&script);
        assert_eq!(engine.step_over(), VMState::Break);
        // The call completed; we are back in the entry frame at 2.
        assert_eq!(engine.invocation_depth(), 1);
        assert_eq!(engine.current_context().unwrap().instruction_pointer(), 2);
        assert_eq!(
            engine.current_context().unwrap().evaluation_stack().len(),
            1
        );
    }

    #[test]
    fn step_out_runs_to_caller() {
        // Same script; step INTO the call first.
        let script = [0x34, 0x05, 0x12, 0x9e, 0x40, 0x11, 0x40];
        let mut engine = engine_with(&script);
        assert_eq!(engine.step_into(), VMState::Break);
        assert_eq!(engine.invocation_depth(), 2);
        assert_eq!(engine.step_out(), VMState::Break);
        assert_eq!(engine.invocation_depth(), 1);
        assert_eq!(engine.current_context().unwrap().instruction_pointer(), 2);
    }

    #[test]
    fn gas_exhaustion_faults() {
        let mut engine = engine_with(&[0x11, 0x12, 0x9e]);
        engine.set_gas_limit(35); // one PUSH costs 30 at factor 30
        assert_eq!(engine.continue_execution(), VMState::Fault);
        let message = engine.fault_message().unwrap();
        assert!(message.contains("gas limit exceeded"), "{message}");
        assert!(message.contains("at instruction 1"), "{message}");
    }

    #[test]
    fn unbounded_gas_still_accumulates() {
        let mut engine = engine_with(&[0x11, 0x12, 0x9e]);
        assert_eq!(engine.continue_execution(), VMState::Halt);
        assert!(engine.gas_consumed() > 0);
    }

    #[test]
    fn fault_preserves_stack_for_diagnostics() {
        // PUSH1 ABORT
        let mut engine = engine_with(&[0x11, 0x38]);
        assert_eq!(engine.continue_execution(), VMState::Fault);
        let message = engine.fault_message().unwrap();
        assert!(message.starts_with("at instruction 1 (ABORT):"), "{message}");
        // The frame and its stack remain inspectable.
        assert_eq!(
            engine.current_context().unwrap().evaluation_stack().len(),
            1
        );
    }

    #[test]
    fn throw_without_try_faults_with_message() {
        // PUSHDATA1 4 "oops"; THROW
        let mut engine = engine_with(&[0x0c, 0x04, b'o', b'o', b'p', b's', 0x3a]);
        assert_eq!(engine.continue_execution(), VMState::Fault);
        assert!(engine.fault_message().unwrap().contains("unhandled exception"));
    }

    #[test]
    fn try_catch_recovers() {
        // 0: TRY catch=+3 finally=0 ; 3: THROW ; 4: (catch) PUSH5 ; 5: ENDTRY +2 ; 7: RET
        // THROW pops a value, so push one first inside the try.
        // Script: TRY(3,0) PUSHNULL THROW [catch]PUSH5 ENDTRY(+2) RET
        // offsets: 0:TRY(2ops) 3:PUSHNULL 4:THROW 5:PUSH5 6:ENDTRY(1op) 8:RET
        let script = [0x3b, 0x05, 0x00, 0x0b, 0x3a, 0x15, 0x3d, 0x02, 0x40];
        let mut engine = engine_with(&script);
        assert_eq!(engine.continue_execution(), VMState::Halt);
        // Catch pushed the exception (null), then PUSH5.
        assert_eq!(
            engine.result_stack().peek(0).unwrap().try_integer().unwrap(),
            5.into()
        );
    }

    #[test]
    fn relative_breakpoint_is_one_shot() {
        let mut engine = engine_with(&[0x11, 0x12, 0x9e, 0x16, 0x9e]);
        engine.add_breakpoint_rel(2).unwrap();
        assert_eq!(engine.continue_execution(), VMState::Break);
        assert_eq!(engine.current_context().unwrap().instruction_pointer(), 2);
        assert_eq!(engine.continue_execution(), VMState::Halt);
    }

    #[test]
    fn rvcount_mismatch_faults() {
        let mut engine = ExecutionEngine::new();
        engine
            .load_script(Script::new(vec![0x11, 0x12]).unwrap(), 1)
            .unwrap();
        assert_eq!(engine.continue_execution(), VMState::Fault);
        assert!(engine
            .fault_message()
            .unwrap()
            .contains("return value count mismatch"));
    }
}
