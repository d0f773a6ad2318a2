//! Deployed contract state and the NEF executable container.

use crate::error::{RuntimeError, RuntimeResult};
use crate::manifest::ContractManifest;
use neodbg_core::{BinaryWriter, MemoryReader, UInt160};
use neodbg_vm::CallFlags;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// NEF magic: "NEF3" interpreted little-endian.
pub const NEF_MAGIC: u32 = 0x3346454e;
/// Maximum NEF script size.
pub const NEF_MAX_SCRIPT_SIZE: usize = 512 * 1024;
/// Maximum number of method tokens in one NEF.
pub const NEF_MAX_TOKENS: usize = 128;

/// A method token: a static cross-contract call target used by CALLT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodToken {
    /// The target contract.
    pub hash: UInt160,
    /// The target method name.
    pub method: String,
    /// Number of parameters the call pops.
    #[serde(rename = "paramcount")]
    pub parameters_count: u16,
    /// Whether the call pushes a return value.
    #[serde(rename = "hasreturnvalue")]
    pub has_return_value: bool,
    /// Flags the call is performed with.
    #[serde(rename = "callflags")]
    pub call_flags: u8,
}

impl MethodToken {
    /// The token's call flags, validated.
    pub fn flags(&self) -> RuntimeResult<CallFlags> {
        CallFlags::from_bits(self.call_flags)
            .ok_or_else(|| RuntimeError::invalid_nef(format!("bad call flags {:#04x}", self.call_flags)))
    }
}

/// The NEF (Neo Executable Format) container for a contract script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NefFile {
    /// Name and version of the producing compiler.
    pub compiler: String,
    /// Source URL of the contract, may be empty.
    pub source: String,
    /// Static call targets for CALLT.
    pub tokens: Vec<MethodToken>,
    /// The contract bytecode.
    #[serde(with = "hex_bytes")]
    pub script: Vec<u8>,
    /// First four little-endian bytes of the double SHA-256 of the body.
    pub checksum: u32,
}

impl NefFile {
    /// Builds a NEF around `script`, computing the checksum.
    pub fn from_script(compiler: &str, script: Vec<u8>) -> RuntimeResult<Self> {
        let mut nef = Self {
            compiler: compiler.to_string(),
            source: String::new(),
            tokens: Vec::new(),
            script,
            checksum: 0,
        };
        nef.checksum = nef.compute_checksum()?;
        Ok(nef)
    }

    /// Serializes the container, checksum included.
    pub fn to_bytes(&self) -> RuntimeResult<Vec<u8>> {
        let mut writer = self.write_body()?;
        writer.write_u32(self.checksum);
        Ok(writer.into_bytes())
    }

    fn write_body(&self) -> RuntimeResult<BinaryWriter> {
        if self.script.is_empty() {
            return Err(RuntimeError::invalid_nef("empty script"));
        }
        if self.script.len() > NEF_MAX_SCRIPT_SIZE {
            return Err(RuntimeError::invalid_nef("script too long"));
        }
        let mut writer = BinaryWriter::new();
        writer.write_u32(NEF_MAGIC);
        writer.write_fixed_string(&self.compiler, 64)?;
        writer.write_var_string(&self.source);
        writer.write_u8(0); // reserved
        writer.write_var_int(self.tokens.len() as u64);
        for token in &self.tokens {
            writer.write_bytes(token.hash.as_bytes());
            writer.write_var_string(&token.method);
            writer.write_u16(token.parameters_count);
            writer.write_u8(u8::from(token.has_return_value));
            writer.write_u8(token.call_flags);
        }
        writer.write_u16(0); // reserved
        writer.write_var_bytes(&self.script);
        Ok(writer)
    }

    /// The checksum over everything before the checksum field.
    pub fn compute_checksum(&self) -> RuntimeResult<u32> {
        let body = self.write_body()?.into_bytes();
        let digest = Sha256::digest(Sha256::digest(&body));
        Ok(u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]))
    }

    /// Parses and validates a serialized NEF, checksum included.
    pub fn from_bytes(data: &[u8]) -> RuntimeResult<Self> {
        let mut reader = MemoryReader::new(data);
        let magic = reader.read_u32()?;
        if magic != NEF_MAGIC {
            return Err(RuntimeError::invalid_nef(format!(
                "wrong magic {magic:#010x}"
            )));
        }
        let compiler = reader.read_fixed_string(64)?;
        let source = reader.read_var_string(256)?;
        if reader.read_u8()? != 0 {
            return Err(RuntimeError::invalid_nef("reserved byte is set"));
        }
        let token_count = reader.read_var_int(NEF_MAX_TOKENS as u64)? as usize;
        let mut tokens = Vec::with_capacity(token_count);
        for _ in 0..token_count {
            let hash = UInt160::from_bytes(&reader.read_bytes(20)?)?;
            let method = reader.read_var_string(32)?;
            let parameters_count = reader.read_u16()?;
            let has_return_value = reader.read_u8()? != 0;
            let call_flags = reader.read_u8()?;
            tokens.push(MethodToken {
                hash,
                method,
                parameters_count,
                has_return_value,
                call_flags,
            });
        }
        if reader.read_u16()? != 0 {
            return Err(RuntimeError::invalid_nef("reserved word is set"));
        }
        let script = reader.read_var_bytes(NEF_MAX_SCRIPT_SIZE)?;
        if script.is_empty() {
            return Err(RuntimeError::invalid_nef("empty script"));
        }
        let checksum = reader.read_u32()?;
        let nef = Self {
            compiler,
            source,
            tokens,
            script,
            checksum,
        };
        let expected = nef.compute_checksum()?;
        if checksum != expected {
            return Err(RuntimeError::invalid_nef(format!(
                "checksum mismatch: file has {checksum:#010x}, computed {expected:#010x}"
            )));
        }
        Ok(nef)
    }
}

/// The state of a deployed smart contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractState {
    /// The contract's signed 32-bit storage id.
    pub id: i32,
    /// Incremented on every contract update.
    #[serde(rename = "updatecounter")]
    pub update_counter: u16,
    /// The contract hash, fixed at deployment.
    pub hash: UInt160,
    /// The executable container.
    pub nef: NefFile,
    /// The contract metadata.
    pub manifest: ContractManifest,
}

impl ContractState {
    /// Creates a deployed-contract record.
    pub fn new(id: i32, hash: UInt160, nef: NefFile, manifest: ContractManifest) -> Self {
        Self {
            id,
            update_counter: 0,
            hash,
            nef,
            manifest,
        }
    }
}

/// Serde adaptor encoding script bytes as hex.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nef_round_trip() {
        let mut nef = NefFile::from_script("neo-core-v3.0", vec![0x11, 0x12, 0x9e]).unwrap();
        nef.tokens.push(MethodToken {
            hash: UInt160::from_script(&[0x42]),
            method: "transfer".into(),
            parameters_count: 4,
            has_return_value: true,
            call_flags: 0x0f,
        });
        nef.checksum = nef.compute_checksum().unwrap();
        let bytes = nef.to_bytes().unwrap();
        let parsed = NefFile::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, nef);
    }

    #[test]
    fn nef_checksum_mismatch_is_rejected() {
        let nef = NefFile::from_script("c", vec![0x11]).unwrap();
        let mut bytes = nef.to_bytes().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let err = NefFile::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn nef_wrong_magic_is_rejected() {
        let nef = NefFile::from_script("c", vec![0x11]).unwrap();
        let mut bytes = nef.to_bytes().unwrap();
        bytes[0] ^= 0x01;
        assert!(NefFile::from_bytes(&bytes).is_err());
    }

    #[test]
    fn token_flags_validate() {
        let token = MethodToken {
            hash: UInt160::zero(),
            method: "m".into(),
            parameters_count: 0,
            has_return_value: false,
            call_flags: 0xf0,
        };
        assert!(token.flags().is_err());
    }
}
