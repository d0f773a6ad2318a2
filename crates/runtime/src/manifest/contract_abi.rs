//! Contract ABI: methods, parameters and events.

use serde::{Deserialize, Serialize};

/// One parameter of a contract method or event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractParameter {
    /// Parameter name.
    pub name: String,
    /// Parameter type, e.g. `Integer`, `ByteArray`, `Hash160`.
    #[serde(rename = "type")]
    pub parameter_type: String,
}

/// One method of a contract's ABI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractMethod {
    /// Method name.
    pub name: String,
    /// Declared parameters.
    #[serde(default)]
    pub parameters: Vec<ContractParameter>,
    /// Return type; `Void` for none.
    #[serde(rename = "returntype")]
    pub return_type: String,
    /// Entry offset of the method within the script.
    pub offset: usize,
    /// True when the method performs no writes.
    #[serde(default)]
    pub safe: bool,
}

impl ContractMethod {
    /// True when the method pushes a return value.
    pub fn has_return_value(&self) -> bool {
        !self.return_type.eq_ignore_ascii_case("void")
    }
}

/// One event a contract declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractEvent {
    /// Event name.
    pub name: String,
    /// Declared payload fields.
    #[serde(default)]
    pub parameters: Vec<ContractParameter>,
}

/// The ABI block of a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAbi {
    /// Callable methods.
    #[serde(default)]
    pub methods: Vec<ContractMethod>,
    /// Declared events.
    #[serde(default)]
    pub events: Vec<ContractEvent>,
}

impl ContractAbi {
    /// Finds a method by name and parameter count.
    pub fn method(&self, name: &str, parameters: usize) -> Option<&ContractMethod> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.parameters.len() == parameters)
    }

    /// Finds a method by name alone; ambiguity resolves to the first match.
    pub fn method_by_name(&self, name: &str) -> Option<&ContractMethod> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// The `_initialize` method, if the contract declares one.
    pub fn initialize_method(&self) -> Option<&ContractMethod> {
        self.method("_initialize", 0)
    }
}
