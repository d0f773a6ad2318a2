//! Contract manifest container.

use crate::error::RuntimeResult;
use crate::manifest::contract_abi::ContractAbi;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum length of a serialized manifest.
pub const MAX_MANIFEST_LENGTH: usize = u16::MAX as usize;

/// A group the contract belongs to: a public key plus a signature of the
/// contract hash by that key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractGroup {
    /// Compressed public key, hex-encoded.
    #[serde(rename = "pubkey")]
    pub public_key: String,
    /// Base64 signature over the contract hash.
    pub signature: String,
}

/// What the contract is permitted to call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractPermission {
    /// Target contract hash, group key, or `*`.
    pub contract: String,
    /// Permitted method names, or `*`.
    pub methods: Value,
}

impl ContractPermission {
    /// The wildcard permission new manifests default to.
    pub fn default_wildcard() -> Self {
        Self {
            contract: "*".into(),
            methods: Value::String("*".into()),
        }
    }
}

/// The manifest of a smart contract: name, ABI, permissions, trusts and
/// supported standards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractManifest {
    /// The contract name.
    pub name: String,
    /// Groups the contract belongs to.
    #[serde(default)]
    pub groups: Vec<ContractGroup>,
    /// Reserved feature flags.
    #[serde(default)]
    pub features: Value,
    /// NEP standards the contract implements.
    #[serde(default, rename = "supportedstandards")]
    pub supported_standards: Vec<String>,
    /// The ABI.
    pub abi: ContractAbi,
    /// Call permissions.
    #[serde(default)]
    pub permissions: Vec<ContractPermission>,
    /// Contracts and groups this contract trusts.
    #[serde(default)]
    pub trusts: Value,
    /// Arbitrary extra metadata.
    #[serde(default)]
    pub extra: Value,
}

impl ContractManifest {
    /// Creates a minimal manifest with a wildcard permission.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
            features: Value::Object(Default::default()),
            supported_standards: Vec::new(),
            abi: ContractAbi::default(),
            permissions: vec![ContractPermission::default_wildcard()],
            trusts: Value::Array(Vec::new()),
            extra: Value::Null,
        }
    }

    /// Parses a manifest from its JSON encoding.
    pub fn from_json(data: &[u8]) -> RuntimeResult<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Serializes the manifest to pretty JSON.
    pub fn to_json_pretty(&self) -> RuntimeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Hex-decoded group public keys, for witness-scope matching.
    pub fn group_keys(&self) -> Vec<Vec<u8>> {
        self.groups
            .iter()
            .filter_map(|group| hex::decode(&group.public_key).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::contract_abi::{ContractMethod, ContractParameter};

    #[test]
    fn json_round_trip() {
        let mut manifest = ContractManifest::new("Token");
        manifest.abi.methods.push(ContractMethod {
            name: "transfer".into(),
            parameters: vec![
                ContractParameter {
                    name: "from".into(),
                    parameter_type: "Hash160".into(),
                },
                ContractParameter {
                    name: "to".into(),
                    parameter_type: "Hash160".into(),
                },
            ],
            return_type: "Boolean".into(),
            offset: 35,
            safe: false,
        });
        manifest.supported_standards.push("NEP-17".into());
        let json = manifest.to_json_pretty().unwrap();
        let parsed = ContractManifest::from_json(json.as_bytes()).unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn parses_canonical_field_names() {
        let manifest = ContractManifest::from_json(
            br#"{
                "name": "Example",
                "supportedstandards": ["NEP-17"],
                "abi": {
                    "methods": [
                        {"name": "main", "parameters": [], "returntype": "Integer", "offset": 0, "safe": true}
                    ],
                    "events": []
                }
            }"#,
        )
        .unwrap();
        assert_eq!(manifest.name, "Example");
        assert_eq!(manifest.supported_standards, vec!["NEP-17"]);
        let method = manifest.abi.method("main", 0).unwrap();
        assert!(method.safe);
        assert!(method.has_return_value());
    }

    #[test]
    fn method_lookup_by_arity() {
        let mut manifest = ContractManifest::new("M");
        for count in [0usize, 2] {
            manifest.abi.methods.push(ContractMethod {
                name: "poly".into(),
                parameters: (0..count)
                    .map(|i| ContractParameter {
                        name: format!("p{i}"),
                        parameter_type: "Any".into(),
                    })
                    .collect(),
                return_type: "Void".into(),
                offset: count * 10,
                safe: false,
            });
        }
        assert_eq!(manifest.abi.method("poly", 2).unwrap().offset, 20);
        assert!(manifest.abi.method("poly", 1).is_none());
    }
}
