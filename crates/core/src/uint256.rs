// Copyright (C) 2015-2025 The Neo Project.
//
// uint256.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Implementation of UInt256, a 256-bit unsigned integer.

use crate::error::CoreError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// The length of UInt256 values in bytes.
pub const UINT256_SIZE: usize = 32;

/// Represents a 256-bit unsigned integer, e.g. a transaction or block hash.
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct UInt256([u8; UINT256_SIZE]);

impl UInt256 {
    /// Returns a zero UInt256.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Checks whether every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// The little-endian bytes of this value.
    pub fn as_bytes(&self) -> &[u8; UINT256_SIZE] {
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

    /// Creates a UInt256 from little-endian bytes.
    pub fn from_bytes(value: &[u8]) -> Result<Self, CoreError> {
        if value.len() != UINT256_SIZE {
            return Err(CoreError::invalid_format(format!(
                "expected {UINT256_SIZE} bytes, got {}",
                value.len()
            )));
        }
        let mut bytes = [0u8; UINT256_SIZE];
        bytes.copy_from_slice(value);
        Ok(Self(bytes))
    }

    /// Double-SHA256 of `data`, as used for transaction hashes.
    pub fn hash256(data: &[u8]) -> Self {
        let digest = Sha256::digest(Sha256::digest(data));
        let mut bytes = [0u8; UINT256_SIZE];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Parses the canonical big-endian hex form, with or without `0x`.
    pub fn from_hex(value: &str) -> Result<Self, CoreError> {
        let trimmed = value.strip_prefix("0x").unwrap_or(value);
        if trimmed.len() != UINT256_SIZE * 2 {
            return Err(CoreError::invalid_format(format!(
                "expected {} hex chars, got {}",
                UINT256_SIZE * 2,
                trimmed.len()
            )));
        }
        let mut bytes =
            hex::decode(trimmed).map_err(|e| CoreError::invalid_format(format!("bad hex: {e}")))?;
        bytes.reverse();
        Self::from_bytes(&bytes)
    }

    /// Parses little-endian hex, with or without `0x`.
    pub fn from_le_hex(value: &str) -> Result<Self, CoreError> {
        let trimmed = value.strip_prefix("0x").unwrap_or(value);
        if trimmed.len() != UINT256_SIZE * 2 {
            return Err(CoreError::invalid_format(format!(
                "expected {} hex chars, got {}",
                UINT256_SIZE * 2,
                trimmed.len()
            )));
        }
        let bytes =
            hex::decode(trimmed).map_err(|e| CoreError::invalid_format(format!("bad hex: {e}")))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Display for UInt256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.to_be_vec()))
    }
}

impl fmt::Debug for UInt256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for UInt256 {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for UInt256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for UInt256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::from_hex(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let hash = UInt256::hash256(b"neo");
        let parsed = UInt256::from_hex(&hash.to_string()).unwrap();
        assert_eq!(parsed, hash);
        let le = UInt256::from_le_hex(&hex::encode(hash.to_le_vec())).unwrap();
        assert_eq!(le, hash);
    }

    #[test]
    fn display_reverses_bytes() {
        let mut bytes = [0u8; UINT256_SIZE];
        bytes[0] = 0xaa;
        let hash = UInt256::from_bytes(&bytes).unwrap();
        assert!(hash.to_string().ends_with("aa"));
    }

    #[test]
    fn rejects_bad_lengths() {
        assert!(UInt256::from_hex("0xabcd").is_err());
        assert!(UInt256::from_bytes(&[0u8; 31]).is_err());
    }
}
