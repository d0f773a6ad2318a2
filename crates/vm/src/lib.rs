//! # Neo Virtual Machine
//!
//! A stack-based virtual machine for the Neo N3 instruction set, built for
//! interactive debugging: breakpoints, single stepping (into/over/out), slot
//! and stack inspection, and deterministic fault accounting with gas
//! metering.
//!
//! ## Architecture
//!
//! - **ExecutionEngine**: execution loop, invocation stack, breakpoints,
//!   step controller, gas meter
//! - **ExecutionContext**: one call frame: script, instruction pointer,
//!   slots, try-stack, call flags
//! - **EvaluationStack**: per-frame operand stack with reference accounting
//! - **StackItem**: the tagged value universe scripts compute over
//! - **Script**: immutable bytecode with an instruction-boundary index
//! - **JumpTable**: per-category instruction handlers
//! - **ScriptBuilder**: programmatic bytecode construction

pub mod call_flags;
pub mod error;
pub mod evaluation_stack;
pub mod exception_handling;
pub mod execution_context;
pub mod execution_engine;
pub mod instruction;
pub mod jump_table;
pub mod op_code;
pub mod reference_counter;
pub mod script;
pub mod script_builder;
pub mod slot;
pub mod stack_item;
pub mod vm_state;

pub use call_flags::CallFlags;
pub use error::{VmError, VmResult};
pub use evaluation_stack::EvaluationStack;
pub use exception_handling::{ExceptionHandlingState, TryContext};
pub use execution_context::ExecutionContext;
pub use execution_engine::{ExecutionEngine, PriceTable, SyscallRouter};
pub use instruction::Instruction;
pub use op_code::{OpCode, OperandSize};
pub use reference_counter::ReferenceCounter;
pub use script::Script;
pub use script_builder::ScriptBuilder;
pub use slot::Slot;
pub use stack_item::serialization::{deserialize as deserialize_item, serialize as serialize_item};
pub use stack_item::{InteropInterface, StackItem, StackItemType};
pub use vm_state::VMState;
