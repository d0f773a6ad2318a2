//! Execution context: one frame of the invocation stack.

use crate::call_flags::CallFlags;
use crate::error::{VmError, VmResult};
use crate::evaluation_stack::EvaluationStack;
use crate::exception_handling::TryContext;
use crate::instruction::Instruction;
use crate::reference_counter::ReferenceCounter;
use crate::script::Script;
use crate::slot::Slot;
use neodbg_config::MAX_TRY_NESTING_DEPTH;
use neodbg_core::UInt160;
use std::cell::RefCell;
use std::rc::Rc;

/// A call frame bound to a script.
///
/// The owning script hash normally equals the script's own hash but differs
/// for deployed contracts, whose owner is the deployment-time hash.
#[derive(Debug)]
pub struct ExecutionContext {
    script: Script,
    script_hash: UInt160,
    instruction_pointer: usize,
    rvcount: i32,
    evaluation_stack: EvaluationStack,
    static_fields: Option<Rc<RefCell<Slot>>>,
    local_variables: Option<Slot>,
    arguments: Option<Slot>,
    try_stack: Vec<TryContext>,
    call_flags: CallFlags,
}

impl ExecutionContext {
    /// Creates a frame at position 0 of `script`.
    ///
    /// `rvcount` declares how many values return to the caller; -1 returns
    /// everything left on the frame's stack.
    pub fn new(script: Script, rvcount: i32, reference_counter: &ReferenceCounter) -> Self {
        let script_hash = script.hash();
        Self {
            script,
            script_hash,
            instruction_pointer: 0,
            rvcount,
            evaluation_stack: EvaluationStack::new(reference_counter.clone()),
            static_fields: None,
            local_variables: None,
            arguments: None,
            try_stack: Vec::new(),
            call_flags: CallFlags::ALL,
        }
    }

    /// Creates the frame for a same-script CALL: shared script, hash and
    /// static fields, fresh stack and slots.
    pub fn fork_for_call(
        &self,
        position: usize,
        reference_counter: &ReferenceCounter,
    ) -> Self {
        Self {
            script: self.script.clone(),
            script_hash: self.script_hash,
            instruction_pointer: position,
            rvcount: -1,
            evaluation_stack: EvaluationStack::new(reference_counter.clone()),
            static_fields: self.static_fields.clone(),
            local_variables: None,
            arguments: None,
            try_stack: Vec::new(),
            call_flags: self.call_flags,
        }
    }

    /// The script this frame executes.
    pub fn script(&self) -> &Script {
        &self.script
    }

    /// The owning script hash.
    pub fn script_hash(&self) -> UInt160 {
        self.script_hash
    }

    /// Overrides the owning script hash (deployed contracts).
    pub fn set_script_hash(&mut self, hash: UInt160) {
        self.script_hash = hash;
    }

    /// The current instruction pointer.
    pub fn instruction_pointer(&self) -> usize {
        self.instruction_pointer
    }

    /// Moves the instruction pointer without boundary validation.
    pub(crate) fn set_instruction_pointer(&mut self, position: usize) {
        self.instruction_pointer = position;
    }

    /// Declared return value count (-1 = all).
    pub fn rvcount(&self) -> i32 {
        self.rvcount
    }

    /// The frame's call flags.
    pub fn call_flags(&self) -> CallFlags {
        self.call_flags
    }

    /// Narrows the frame's call flags.
    pub fn set_call_flags(&mut self, flags: CallFlags) {
        self.call_flags = flags;
    }

    /// The frame's operand stack.
    pub fn evaluation_stack(&self) -> &EvaluationStack {
        &self.evaluation_stack
    }

    /// The frame's operand stack, mutable.
    pub fn evaluation_stack_mut(&mut self) -> &mut EvaluationStack {
        &mut self.evaluation_stack
    }

    /// True when the instruction pointer has run off the script end.
    pub fn at_script_end(&self) -> bool {
        self.instruction_pointer >= self.script.len()
    }

    /// Decodes the instruction under the pointer.
    pub fn current_instruction(&self) -> VmResult<Instruction> {
        self.script.instruction_at(self.instruction_pointer)
    }

    /// The position and mnemonic under the pointer, without advancing.
    pub fn next_instr(&self) -> VmResult<(usize, String)> {
        let instruction = self.current_instruction()?;
        Ok((instruction.pointer, instruction.opcode.name().to_string()))
    }

    /// Advances the pointer past the current instruction.
    pub fn move_next(&mut self) -> VmResult<()> {
        let instruction = self.current_instruction()?;
        self.instruction_pointer = instruction.next_position();
        Ok(())
    }

    /// Validates `position` against the instruction index and jumps there.
    pub fn jump(&mut self, position: i64) -> VmResult<()> {
        if position < 0
            || position > self.script.len() as i64
            || !self.script.is_boundary(position as usize)?
        {
            return Err(VmError::InvalidJumpTarget { target: position });
        }
        self.instruction_pointer = position as usize;
        Ok(())
    }

    /// The shared static field slot, if allocated.
    pub fn static_fields(&self) -> Option<&Rc<RefCell<Slot>>> {
        self.static_fields.as_ref()
    }

    /// Allocates the static field slot. INITSSLOT may run only once.
    pub fn init_static_fields(&mut self, slot: Rc<RefCell<Slot>>) -> VmResult<()> {
        if self.static_fields.is_some() {
            return Err(VmError::invalid_operation(
                "static slot is already initialized",
            ));
        }
        self.static_fields = Some(slot);
        Ok(())
    }

    /// The local variable slot, if allocated.
    pub fn local_variables(&self) -> Option<&Slot> {
        self.local_variables.as_ref()
    }

    /// The local variable slot, mutable.
    pub fn local_variables_mut(&mut self) -> Option<&mut Slot> {
        self.local_variables.as_mut()
    }

    /// The argument slot, if allocated.
    pub fn arguments(&self) -> Option<&Slot> {
        self.arguments.as_ref()
    }

    /// The argument slot, mutable.
    pub fn arguments_mut(&mut self) -> Option<&mut Slot> {
        self.arguments.as_mut()
    }

    /// Allocates locals and arguments. INITSLOT may run only once.
    pub fn init_slot(&mut self, locals: Slot, arguments: Slot) -> VmResult<()> {
        if self.local_variables.is_some() || self.arguments.is_some() {
            return Err(VmError::invalid_operation("slot is already initialized"));
        }
        if !locals.is_empty() {
            self.local_variables = Some(locals);
        }
        if !arguments.is_empty() {
            self.arguments = Some(arguments);
        }
        Ok(())
    }

    /// Number of open TRY blocks.
    pub fn try_stack_len(&self) -> usize {
        self.try_stack.len()
    }

    /// Opens a TRY block.
    pub fn push_try(&mut self, try_context: TryContext) -> VmResult<()> {
        if self.try_stack.len() >= MAX_TRY_NESTING_DEPTH {
            return Err(VmError::TryNestingTooDeep);
        }
        self.try_stack.push(try_context);
        Ok(())
    }

    /// The innermost TRY block.
    pub fn try_stack_last(&self) -> Option<&TryContext> {
        self.try_stack.last()
    }

    /// The innermost TRY block, mutable.
    pub fn try_stack_last_mut(&mut self) -> Option<&mut TryContext> {
        self.try_stack.last_mut()
    }

    /// Closes the innermost TRY block.
    pub fn pop_try(&mut self) -> Option<TryContext> {
        self.try_stack.pop()
    }

    /// Releases slot and stack references held by the frame.
    pub fn clear_references(&mut self) {
        self.evaluation_stack.clear();
        if let Some(mut locals) = self.local_variables.take() {
            locals.clear_references();
        }
        if let Some(mut arguments) = self.arguments.take() {
            arguments.clear_references();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(bytes: Vec<u8>) -> ExecutionContext {
        ExecutionContext::new(Script::new(bytes).unwrap(), -1, &ReferenceCounter::new())
    }

    #[test]
    fn jump_validates_boundaries() {
        // PUSHDATA1 3 "abc"; RET
        let mut ctx = context(vec![0x0c, 0x03, b'a', b'b', b'c', 0x40]);
        assert!(ctx.jump(5).is_ok());
        assert!(matches!(
            ctx.jump(2),
            Err(VmError::InvalidJumpTarget { target: 2 })
        ));
        assert!(ctx.jump(-1).is_err());
        assert!(ctx.jump(7).is_err());
        // Jumping to the script end is the implicit RET position.
        assert!(ctx.jump(6).is_ok());
    }

    #[test]
    fn slots_allocate_once() {
        let counter = ReferenceCounter::new();
        let mut ctx = context(vec![0x40]);
        ctx.init_slot(Slot::new(2, counter.clone()), Slot::new(0, counter.clone()))
            .unwrap();
        assert!(ctx.local_variables().is_some());
        assert!(ctx.arguments().is_none());
        assert!(ctx
            .init_slot(Slot::new(1, counter.clone()), Slot::new(0, counter))
            .is_err());
    }

    #[test]
    fn fork_shares_static_fields() {
        let counter = ReferenceCounter::new();
        let mut ctx = context(vec![0x21, 0x21, 0x40]);
        ctx.init_static_fields(Rc::new(RefCell::new(Slot::new(2, counter.clone()))))
            .unwrap();
        let fork = ctx.fork_for_call(1, &counter);
        assert_eq!(fork.instruction_pointer(), 1);
        assert_eq!(fork.script_hash(), ctx.script_hash());
        assert!(Rc::ptr_eq(
            ctx.static_fields().unwrap(),
            fork.static_fields().unwrap()
        ));
    }

    #[test]
    fn next_instr_does_not_advance() {
        let ctx = context(vec![0x11, 0x12]);
        let (position, name) = ctx.next_instr().unwrap();
        assert_eq!((position, name.as_str()), (0, "PUSH1"));
        assert_eq!(ctx.instruction_pointer(), 0);
    }
}
