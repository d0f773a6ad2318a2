// Copyright (C) 2015-2025 The Neo Project.
//
// lib.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! # Neo Debugger Core Types
//!
//! Core value types shared across the neodbg workspace: 160/256-bit hashes,
//! base58check addresses, witness scopes, signers, and the transaction
//! container scripts execute under.

pub mod error;
pub mod io;
pub mod signer;
pub mod transaction;
pub mod uint160;
pub mod uint256;
pub mod witness_scope;

pub use error::CoreError;
pub use io::{BinaryWriter, MemoryReader};
pub use signer::Signer;
pub use transaction::{Transaction, TransactionAttribute, Witness};
pub use uint160::UInt160;
pub use uint256::UInt256;
pub use witness_scope::WitnessScope;

/// Result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
