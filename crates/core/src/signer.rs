// Copyright (C) 2015-2025 The Neo Project.
//
// signer.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Implementation of Signer for Neo transactions.

use crate::error::CoreError;
use crate::io::{BinaryWriter, MemoryReader};
use crate::uint160::UInt160;
use crate::witness_scope::WitnessScope;
use serde::{Deserialize, Serialize};

/// Maximum number of allowed contracts or groups per signer.
pub const MAX_SUBITEMS: usize = 16;

/// Represents a signer of a transaction.
///
/// A signer binds an account to a witness scope: who is signing, and which
/// sub-invocations may rely on that signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signer {
    /// The account of the signer.
    pub account: UInt160,

    /// The scopes of the witness.
    pub scopes: WitnessScope,

    /// Contracts the witness extends to; meaningful with CustomContracts.
    #[serde(default)]
    pub allowed_contracts: Vec<UInt160>,

    /// Serialized group public keys the witness extends to; meaningful with
    /// CustomGroups.
    #[serde(default)]
    pub allowed_groups: Vec<Vec<u8>>,
}

impl Signer {
    /// Creates a signer with the specified scope and no custom lists.
    pub fn with_scope(account: UInt160, scopes: WitnessScope) -> Self {
        Self {
            account,
            scopes,
            allowed_contracts: Vec::new(),
            allowed_groups: Vec::new(),
        }
    }

    /// Creates a signer with the Global scope.
    pub fn global(account: UInt160) -> Self {
        Self::with_scope(account, WitnessScope::Global)
    }

    /// Creates a signer with the CalledByEntry scope, the default for
    /// command-line signers given without an explicit scope.
    pub fn called_by_entry(account: UInt160) -> Self {
        Self::with_scope(account, WitnessScope::CalledByEntry)
    }

    /// Serializes the signer in wire format.
    pub fn encode(&self, writer: &mut BinaryWriter) {
        writer.write_bytes(self.account.as_bytes());
        writer.write_u8(self.scopes.bits());
        if self.scopes.has_flag(WitnessScope::CustomContracts) {
            writer.write_var_int(self.allowed_contracts.len() as u64);
            for contract in &self.allowed_contracts {
                writer.write_bytes(contract.as_bytes());
            }
        }
        if self.scopes.has_flag(WitnessScope::CustomGroups) {
            writer.write_var_int(self.allowed_groups.len() as u64);
            for group in &self.allowed_groups {
                writer.write_bytes(group);
            }
        }
    }

    /// Deserializes a signer from wire format.
    pub fn decode(reader: &mut MemoryReader<'_>) -> Result<Self, CoreError> {
        let account = UInt160::from_bytes(&reader.read_bytes(20)?)?;
        let scopes = WitnessScope::from_byte(reader.read_u8()?)?;
        let mut signer = Signer::with_scope(account, scopes);
        if scopes.has_flag(WitnessScope::CustomContracts) {
            let count = reader.read_var_int(MAX_SUBITEMS as u64)? as usize;
            for _ in 0..count {
                signer
                    .allowed_contracts
                    .push(UInt160::from_bytes(&reader.read_bytes(20)?)?);
            }
        }
        if scopes.has_flag(WitnessScope::CustomGroups) {
            let count = reader.read_var_int(MAX_SUBITEMS as u64)? as usize;
            for _ in 0..count {
                // Compressed EC points are 33 bytes.
                signer.allowed_groups.push(reader.read_bytes(33)?);
            }
        }
        Ok(signer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> UInt160 {
        UInt160::from_script(&[0x42])
    }

    #[test]
    fn round_trip_plain_scope() {
        let signer = Signer::called_by_entry(account());
        let mut writer = BinaryWriter::new();
        signer.encode(&mut writer);
        let bytes = writer.into_bytes();
        let decoded = Signer::decode(&mut MemoryReader::new(&bytes)).unwrap();
        assert_eq!(decoded, signer);
    }

    #[test]
    fn round_trip_custom_contracts() {
        let mut signer = Signer::with_scope(account(), WitnessScope::CustomContracts);
        signer.allowed_contracts.push(UInt160::from_script(&[0x11]));
        signer.allowed_contracts.push(UInt160::from_script(&[0x12]));
        let mut writer = BinaryWriter::new();
        signer.encode(&mut writer);
        let bytes = writer.into_bytes();
        let decoded = Signer::decode(&mut MemoryReader::new(&bytes)).unwrap();
        assert_eq!(decoded.allowed_contracts.len(), 2);
        assert_eq!(decoded, signer);
    }

    #[test]
    fn decode_rejects_invalid_scope_byte() {
        let mut bytes = account().to_le_vec();
        bytes.push(0x83); // Global plus extra bits
        assert!(Signer::decode(&mut MemoryReader::new(&bytes)).is_err());
    }
}
