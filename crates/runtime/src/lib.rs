//! # Neo Debugger Runtime
//!
//! The state-backed half of the execution core: contract state (NEF +
//! manifest), the DAO over the layered store, an in-memory ledger with
//! per-height snapshots for historic execution, and the interop services
//! (`System.Runtime.*`, `System.Storage.*`, `System.Contract.*`) that couple
//! scripts to that state.

pub mod contract_state;
pub mod dao;
pub mod error;
pub mod historic;
pub mod interop;
pub mod ledger;
pub mod manifest;
pub mod notification;
pub mod trigger;

pub use contract_state::{ContractState, MethodToken, NefFile};
pub use dao::Dao;
pub use error::{RuntimeError, RuntimeResult};
pub use historic::historic_context;
pub use interop::{syscall_name, InteropContext, InteropRouter};
pub use ledger::Ledger;
pub use manifest::{ContractAbi, ContractManifest, ContractMethod};
pub use notification::NotificationEvent;
pub use trigger::TriggerType;
