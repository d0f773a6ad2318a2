//! Error types for the runtime crate.

use thiserror::Error;

/// Result alias for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors from contract loading, state access and the ledger.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A NEF file failed validation.
    #[error("invalid NEF file: {message}")]
    InvalidNef {
        /// What was wrong with the file.
        message: String,
    },

    /// A manifest failed validation or deserialization.
    #[error("invalid manifest: {0}")]
    InvalidManifest(#[from] serde_json::Error),

    /// A contract the operation needs is not deployed.
    #[error("contract {hash} not found")]
    ContractNotFound {
        /// The requested contract hash.
        hash: String,
    },

    /// A method missing from a contract's ABI.
    #[error("method {method} with {arguments} arguments not found in manifest")]
    MethodNotFound {
        /// The requested method name.
        method: String,
        /// Number of arguments requested.
        arguments: usize,
    },

    /// A height beyond the chain's current state.
    #[error("block height {height} is out of range (chain height {chain_height})")]
    HeightOutOfRange {
        /// The requested height.
        height: u32,
        /// The chain's height.
        chain_height: u32,
    },

    /// A transaction the operation needs is not on the chain.
    #[error("transaction {hash} not found")]
    TransactionNotFound {
        /// The requested transaction hash.
        hash: String,
    },

    /// Core type errors (hash parsing, wire decoding).
    #[error(transparent)]
    Core(#[from] neodbg_core::CoreError),

    /// VM errors surfaced through runtime paths.
    #[error(transparent)]
    Vm(#[from] neodbg_vm::VmError),
}

impl RuntimeError {
    /// Shorthand for an `InvalidNef` error.
    pub fn invalid_nef(message: impl Into<String>) -> Self {
        RuntimeError::InvalidNef {
            message: message.into(),
        }
    }
}
