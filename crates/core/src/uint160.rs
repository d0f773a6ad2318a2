// Copyright (C) 2015-2025 The Neo Project.
//
// uint160.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Implementation of UInt160, a 160-bit unsigned integer.
//!
//! Script hashes are stored little-endian; the canonical string form is the
//! reversed (big-endian) hex with a `0x` prefix, matching the rest of the
//! Neo ecosystem.

use crate::error::CoreError;
use ripemd::Ripemd160;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// The length of UInt160 values in bytes.
pub const UINT160_SIZE: usize = 20;

/// Represents a 160-bit unsigned integer, e.g. a contract script hash.
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct UInt160([u8; UINT160_SIZE]);

impl UInt160 {
    /// Returns a zero UInt160.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Checks whether every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// The little-endian bytes of this value.
    pub fn as_bytes(&self) -> &[u8; UINT160_SIZE] {
        &self.0
    }

    /// The little-endian bytes as a vector.
    pub fn to_le_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// The big-endian bytes as a vector.
    pub fn to_be_vec(&self) -> Vec<u8> {
        let mut bytes = self.0;
        bytes.reverse();
        bytes.to_vec()
    }

    /// Creates a UInt160 from little-endian bytes.
    pub fn from_bytes(value: &[u8]) -> Result<Self, CoreError> {
        if value.len() != UINT160_SIZE {
            return Err(CoreError::invalid_format(format!(
                "expected {UINT160_SIZE} bytes, got {}",
                value.len()
            )));
        }
        let mut bytes = [0u8; UINT160_SIZE];
        bytes.copy_from_slice(value);
        Ok(Self(bytes))
    }

    /// Computes the script hash of `script`: RIPEMD160(SHA256(script)).
    pub fn from_script(script: &[u8]) -> Self {
        let sha = Sha256::digest(script);
        let ripe = Ripemd160::digest(sha);
        let mut bytes = [0u8; UINT160_SIZE];
        bytes.copy_from_slice(&ripe);
        Self(bytes)
    }

    /// Parses the canonical big-endian hex form, with or without `0x`.
    pub fn from_hex(value: &str) -> Result<Self, CoreError> {
        let trimmed = value.strip_prefix("0x").unwrap_or(value);
        let mut bytes = decode_hash_hex(trimmed, UINT160_SIZE)?;
        bytes.reverse();
        Self::from_bytes(&bytes)
    }

    /// Parses little-endian hex, with or without `0x`.
    pub fn from_le_hex(value: &str) -> Result<Self, CoreError> {
        let trimmed = value.strip_prefix("0x").unwrap_or(value);
        let bytes = decode_hash_hex(trimmed, UINT160_SIZE)?;
        Self::from_bytes(&bytes)
    }

    /// Encodes this hash as a base58check address with the given version byte.
    pub fn to_address(&self, version: u8) -> String {
        let mut data = Vec::with_capacity(1 + UINT160_SIZE);
        data.push(version);
        data.extend_from_slice(&self.0);
        let checksum = Sha256::digest(Sha256::digest(&data));
        data.extend_from_slice(&checksum[..4]);
        bs58::encode(data).into_string()
    }

    /// Decodes a base58check address, verifying checksum and version byte.
    pub fn from_address(address: &str, version: u8) -> Result<Self, CoreError> {
        let data = bs58::decode(address)
            .into_vec()
            .map_err(|e| CoreError::invalid_address(format!("bad base58: {e}")))?;
        if data.len() != 1 + UINT160_SIZE + 4 {
            return Err(CoreError::invalid_address(format!(
                "wrong payload length {}",
                data.len()
            )));
        }
        let (payload, checksum) = data.split_at(1 + UINT160_SIZE);
        let expected = Sha256::digest(Sha256::digest(payload));
        if checksum != &expected[..4] {
            return Err(CoreError::invalid_address("checksum mismatch"));
        }
        if payload[0] != version {
            return Err(CoreError::invalid_address(format!(
                "wrong version byte {:#04x}",
                payload[0]
            )));
        }
        Self::from_bytes(&payload[1..])
    }
}

fn decode_hash_hex(value: &str, size: usize) -> Result<Vec<u8>, CoreError> {
    if value.len() != size * 2 {
        return Err(CoreError::invalid_format(format!(
            "expected {} hex chars, got {}",
            size * 2,
            value.len()
        )));
    }
    hex::decode(value).map_err(|e| CoreError::invalid_format(format!("bad hex: {e}")))
}

impl fmt::Display for UInt160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.to_be_vec()))
    }
}

impl fmt::Debug for UInt160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for UInt160 {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for UInt160 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for UInt160 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::from_hex(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip_is_byte_reversed() {
        let hash = UInt160::from_hex("0x0102030405060708090a0b0c0d0e0f1011121314").unwrap();
        assert_eq!(hash.as_bytes()[0], 0x14);
        assert_eq!(hash.as_bytes()[19], 0x01);
        assert_eq!(
            hash.to_string(),
            "0x0102030405060708090a0b0c0d0e0f1011121314"
        );

        let le = UInt160::from_le_hex(&hex::encode(hash.to_le_vec())).unwrap();
        assert_eq!(le, hash);
    }

    #[test]
    fn rejects_bad_lengths() {
        assert!(UInt160::from_hex("0x1234").is_err());
        assert!(UInt160::from_bytes(&[0u8; 19]).is_err());
    }

    #[test]
    fn address_round_trip() {
        let hash = UInt160::from_script(&[0x51]);
        let address = hash.to_address(0x35);
        assert!(address.starts_with('N'));
        assert_eq!(UInt160::from_address(&address, 0x35).unwrap(), hash);
    }

    #[test]
    fn address_rejects_tampering() {
        let hash = UInt160::from_script(&[0x51]);
        let mut address = hash.to_address(0x35);
        address.replace_range(1..2, if &address[1..2] == "a" { "b" } else { "a" });
        assert!(UInt160::from_address(&address, 0x35).is_err());
    }

    #[test]
    fn script_hash_is_stable() {
        // PUSH1 script hashed with RIPEMD160(SHA256(..)).
        let hash = UInt160::from_script(&[0x11]);
        assert_eq!(hash, UInt160::from_script(&[0x11]));
        assert_ne!(hash, UInt160::from_script(&[0x12]));
        assert!(!hash.is_zero());
    }
}
