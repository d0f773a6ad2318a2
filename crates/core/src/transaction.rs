// Copyright (C) 2015-2025 The Neo Project.
//
// transaction.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Implementation of the Neo N3 transaction container.
//!
//! Transactions carry the script a load executes under, together with the
//! signers whose witness scopes CheckWitness consults. The debugger also
//! fabricates synthetic transactions around loose scripts so that every
//! execution has a container.

use crate::error::CoreError;
use crate::io::{BinaryWriter, MemoryReader};
use crate::signer::Signer;
use crate::uint256::UInt256;
use serde::{Deserialize, Serialize};

/// Maximum transaction size in bytes.
pub const MAX_TRANSACTION_SIZE: usize = 102_400;
/// Maximum number of attributes on one transaction.
pub const MAX_TRANSACTION_ATTRIBUTES: usize = 16;
/// Maximum number of signers on one transaction.
pub const MAX_TRANSACTION_SIGNERS: usize = 16;

/// A witness attached to a transaction: the invocation script pushing the
/// signature, and the verification script it satisfies.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    /// Script pushing signature data.
    #[serde(with = "base64_bytes")]
    pub invocation: Vec<u8>,
    /// Script verifying the pushed data.
    #[serde(with = "base64_bytes")]
    pub verification: Vec<u8>,
}

/// Transaction attributes the debugger understands.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionAttribute {
    /// Priority marker; carries no payload.
    HighPriority,
}

impl TransactionAttribute {
    fn encode(&self, writer: &mut BinaryWriter) {
        match self {
            TransactionAttribute::HighPriority => writer.write_u8(0x01),
        }
    }

    fn decode(reader: &mut MemoryReader<'_>) -> Result<Self, CoreError> {
        match reader.read_u8()? {
            0x01 => Ok(TransactionAttribute::HighPriority),
            other => Err(CoreError::invalid_format(format!(
                "unknown attribute type {other:#04x}"
            ))),
        }
    }
}

/// Represents a Neo N3 transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction format version; 0 for N3.
    pub version: u8,
    /// Random value to make the hash unique.
    pub nonce: u32,
    /// GAS paid for execution, in datoshi.
    pub system_fee: i64,
    /// GAS paid for inclusion and verification, in datoshi.
    pub network_fee: i64,
    /// Last block height at which the transaction is valid.
    pub valid_until_block: u32,
    /// Accounts whose witnesses authorize the transaction.
    pub signers: Vec<Signer>,
    /// Additional attributes.
    pub attributes: Vec<TransactionAttribute>,
    /// The script executed on-chain.
    #[serde(with = "base64_bytes")]
    pub script: Vec<u8>,
    /// Witnesses, in signer order.
    pub witnesses: Vec<Witness>,
}

impl Transaction {
    /// The hash of the transaction: double SHA-256 of the unsigned payload.
    pub fn hash(&self) -> UInt256 {
        UInt256::hash256(&self.encode_unsigned())
    }

    /// The account of the first signer, conventionally the fee payer.
    pub fn sender(&self) -> Option<&Signer> {
        self.signers.first()
    }

    /// Serializes the unsigned portion of the transaction.
    pub fn encode_unsigned(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::new();
        writer.write_u8(self.version);
        writer.write_u32(self.nonce);
        writer.write_i64(self.system_fee);
        writer.write_i64(self.network_fee);
        writer.write_u32(self.valid_until_block);
        writer.write_var_int(self.signers.len() as u64);
        for signer in &self.signers {
            signer.encode(&mut writer);
        }
        writer.write_var_int(self.attributes.len() as u64);
        for attribute in &self.attributes {
            attribute.encode(&mut writer);
        }
        writer.write_var_bytes(&self.script);
        writer.into_bytes()
    }

    /// Serializes the full transaction including witnesses.
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::new();
        writer.write_bytes(&self.encode_unsigned());
        writer.write_var_int(self.witnesses.len() as u64);
        for witness in &self.witnesses {
            writer.write_var_bytes(&witness.invocation);
            writer.write_var_bytes(&witness.verification);
        }
        writer.into_bytes()
    }

    /// Deserializes a full transaction.
    pub fn decode(data: &[u8]) -> Result<Self, CoreError> {
        if data.len() > MAX_TRANSACTION_SIZE {
            return Err(CoreError::SizeExceeded {
                size: data.len(),
                limit: MAX_TRANSACTION_SIZE,
            });
        }
        let mut reader = MemoryReader::new(data);
        let version = reader.read_u8()?;
        if version != 0 {
            return Err(CoreError::invalid_format(format!(
                "unsupported transaction version {version}"
            )));
        }
        let nonce = reader.read_u32()?;
        let system_fee = reader.read_i64()?;
        let network_fee = reader.read_i64()?;
        if system_fee < 0 || network_fee < 0 {
            return Err(CoreError::invalid_format("negative fee"));
        }
        let valid_until_block = reader.read_u32()?;
        let signer_count = reader.read_var_int(MAX_TRANSACTION_SIGNERS as u64)? as usize;
        let mut signers = Vec::with_capacity(signer_count);
        for _ in 0..signer_count {
            signers.push(Signer::decode(&mut reader)?);
        }
        let attribute_count = reader.read_var_int(MAX_TRANSACTION_ATTRIBUTES as u64)? as usize;
        let mut attributes = Vec::with_capacity(attribute_count);
        for _ in 0..attribute_count {
            attributes.push(TransactionAttribute::decode(&mut reader)?);
        }
        let script = reader.read_var_bytes(u16::MAX as usize)?;
        if script.is_empty() {
            return Err(CoreError::invalid_format("empty script"));
        }
        let witness_count = reader.read_var_int(MAX_TRANSACTION_SIGNERS as u64)? as usize;
        let mut witnesses = Vec::with_capacity(witness_count);
        for _ in 0..witness_count {
            witnesses.push(Witness {
                invocation: reader.read_var_bytes(1024)?,
                verification: reader.read_var_bytes(1024)?,
            });
        }
        Ok(Self {
            version,
            nonce,
            system_fee,
            network_fee,
            valid_until_block,
            signers,
            attributes,
            script,
            witnesses,
        })
    }
}

/// Serde adaptor encoding byte vectors as base64 strings.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uint160::UInt160;
    use crate::witness_scope::WitnessScope;

    fn sample() -> Transaction {
        Transaction {
            version: 0,
            nonce: 0xdead_beef,
            system_fee: 10_0000_0000,
            network_fee: 1234,
            valid_until_block: 5762,
            signers: vec![Signer::with_scope(
                UInt160::from_script(&[0x42]),
                WitnessScope::CalledByEntry,
            )],
            attributes: vec![TransactionAttribute::HighPriority],
            script: vec![0x11, 0x12, 0x93],
            witnesses: vec![Witness {
                invocation: vec![0x0c, 0x40],
                verification: vec![0x41],
            }],
        }
    }

    #[test]
    fn binary_round_trip() {
        let tx = sample();
        let decoded = Transaction::decode(&tx.encode()).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn hash_ignores_witnesses() {
        let tx = sample();
        let mut stripped = tx.clone();
        stripped.witnesses.clear();
        assert_eq!(tx.hash(), stripped.hash());

        let mut other = tx.clone();
        other.nonce += 1;
        assert_ne!(tx.hash(), other.hash());
    }

    #[test]
    fn decode_rejects_empty_script() {
        let mut tx = sample();
        tx.script.clear();
        assert!(Transaction::decode(&tx.encode()).is_err());
    }

    #[test]
    fn json_round_trip_uses_base64_script() {
        let tx = sample();
        let json = serde_json::to_string(&tx).unwrap();
        assert!(json.contains("ERKT")); // base64 of 0x11 0x12 0x93
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tx);
    }
}
