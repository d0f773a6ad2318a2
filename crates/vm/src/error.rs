//! Error types for the VM crate.

use thiserror::Error;

/// Result alias for VM operations.
pub type VmResult<T> = Result<T, VmError>;

/// VM execution errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    /// A script or operand could not be decoded.
    #[error("can't parse script: {message}")]
    Parse {
        /// What failed to decode.
        message: String,
    },

    /// An opcode byte with no assigned instruction.
    #[error("invalid opcode {opcode:#04x}")]
    InvalidOpcode {
        /// The offending byte.
        opcode: u8,
    },

    /// A jump or call target that is not an instruction boundary.
    #[error("invalid jump target {target}")]
    InvalidJumpTarget {
        /// The offending target offset.
        target: i64,
    },

    /// Not enough items on the evaluation stack.
    #[error("stack underflow: need {requested} items, have {available}")]
    StackUnderflow {
        /// Items the operation needed.
        requested: usize,
        /// Items actually present.
        available: usize,
    },

    /// Too many live composite item references.
    #[error("too many references: {count} exceeds limit {limit}")]
    TooManyReferences {
        /// Live reference count.
        count: usize,
        /// Configured cap.
        limit: usize,
    },

    /// A stack item grew past the configured bounds.
    #[error("stack item too large: {message}")]
    StackItemTooLarge {
        /// What exceeded the bound.
        message: String,
    },

    /// A coercion between stack item types that is not defined.
    #[error("invalid conversion: {from} to {to}")]
    InvalidType {
        /// Source type name.
        from: &'static str,
        /// Target type name.
        to: &'static str,
    },

    /// The gas limit was exhausted.
    #[error("gas limit exceeded")]
    GasExhausted,

    /// An operation was attempted in a state that does not permit it.
    #[error("{message}")]
    InvalidOperation {
        /// Description of the violation.
        message: String,
    },

    /// Invocation stack depth cap.
    #[error("invocation stack size exceeded: {depth}")]
    InvocationStackOverflow {
        /// Depth that was requested.
        depth: usize,
    },

    /// TRY nesting cap within one context.
    #[error("try nesting depth exceeded")]
    TryNestingTooDeep,

    /// Arithmetic that has no defined result.
    #[error("{operation}: {message}")]
    Arithmetic {
        /// The mnemonic of the operation.
        operation: &'static str,
        /// Why it failed.
        message: String,
    },

    /// ABORT, or ASSERT over a falsy value.
    #[error("{message}")]
    Aborted {
        /// The abort reason.
        message: String,
    },

    /// A THROW that no TRY handler caught.
    #[error("unhandled exception: {message}")]
    UnhandledException {
        /// Rendering of the thrown item.
        message: String,
    },

    /// An exception raised by an interop service that scripts may catch.
    #[error("{message}")]
    Catchable {
        /// The exception message.
        message: String,
    },

    /// A syscall id with no catalogue entry.
    #[error("unknown syscall {id:#010x}")]
    UnknownSyscall {
        /// The 32-bit interop id.
        id: u32,
    },
}

impl VmError {
    /// Shorthand for a `Parse` error.
    pub fn parse(message: impl Into<String>) -> Self {
        VmError::Parse {
            message: message.into(),
        }
    }

    /// Shorthand for an `InvalidOperation` error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        VmError::InvalidOperation {
            message: message.into(),
        }
    }

    /// Shorthand for a `StackItemTooLarge` error.
    pub fn too_large(message: impl Into<String>) -> Self {
        VmError::StackItemTooLarge {
            message: message.into(),
        }
    }

    /// Shorthand for a `Catchable` error.
    pub fn catchable(message: impl Into<String>) -> Self {
        VmError::Catchable {
            message: message.into(),
        }
    }

    /// True when a TRY handler may catch this error.
    pub fn is_catchable(&self) -> bool {
        matches!(self, VmError::Catchable { .. })
    }
}
