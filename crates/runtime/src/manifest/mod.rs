//! Contract manifest: the JSON metadata deployed next to a NEF.

mod contract_abi;
mod contract_manifest;

pub use contract_abi::{ContractAbi, ContractEvent, ContractMethod, ContractParameter};
pub use contract_manifest::{ContractGroup, ContractManifest, ContractPermission};
