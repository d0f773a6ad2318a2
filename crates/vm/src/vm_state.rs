//! VM state enumeration.

use std::fmt;

/// The observable state of the virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VMState {
    /// Executing, or ready to execute.
    #[default]
    None,
    /// Execution completed normally; results are on the result stack.
    Halt,
    /// Execution failed; the stacks are preserved for inspection.
    Fault,
    /// Paused at a breakpoint or after a completed step.
    Break,
}

impl VMState {
    /// True for the two terminal states.
    pub fn is_finished(self) -> bool {
        matches!(self, VMState::Halt | VMState::Fault)
    }
}

impl fmt::Display for VMState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VMState::None => write!(f, "NONE"),
            VMState::Halt => write!(f, "HALT"),
            VMState::Fault => write!(f, "FAULT"),
            VMState::Break => write!(f, "BREAK"),
        }
    }
}
