//! Configuration types for the neodbg execution core.
//!
//! Protocol settings (network magic, hardforks, fee factors) and the VM
//! limit constants shared by the rest of the workspace.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Size of a hash (UInt256) in bytes.
pub const HASH_SIZE: usize = 32;
/// Size of a script hash (UInt160) in bytes.
pub const ADDRESS_SIZE: usize = 20;
/// Maximum script size in bytes.
pub const MAX_SCRIPT_SIZE: usize = 65536;
/// Maximum size of a serialized stack item or integer-convertible byte string.
pub const MAX_ITEM_SIZE: usize = 65536;
/// Maximum number of live composite stack item references in one execution.
pub const MAX_STACK_REFERENCES: usize = 65536;
/// Maximum depth of the invocation stack.
pub const MAX_INVOCATION_STACK_SIZE: usize = 1024;
/// Maximum nesting depth of TRY blocks in one context.
pub const MAX_TRY_NESTING_DEPTH: usize = 16;
/// Maximum width of a VM integer in bytes.
pub const MAX_INTEGER_SIZE: usize = 32;
/// Maximum depth for struct clone and deep comparison.
pub const MAX_COMPARABLE_DEPTH: usize = 2048;
/// Number of storage-key bytes occupied by the contract id prefix.
pub const STORAGE_ID_PREFIX_SIZE: usize = 4;

/// Errors produced while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("can't read config: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML.
    #[error("can't parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A setting has an unacceptable value.
    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Well-known Neo networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    MainNet,
    TestNet,
    #[default]
    Private,
}

impl NetworkType {
    /// Gets the network magic number.
    pub fn magic(&self) -> u32 {
        match self {
            NetworkType::MainNet => 0x334f454e, // "NEO3" in little endian
            NetworkType::TestNet => 0x3254334e, // "N3T2" in little endian
            NetworkType::Private => 0x0000002a,
        }
    }

    /// Gets the address version byte used by base58check addresses.
    pub fn address_version(&self) -> u8 {
        0x35
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkType::MainNet => write!(f, "mainnet"),
            NetworkType::TestNet => write!(f, "testnet"),
            NetworkType::Private => write!(f, "private"),
        }
    }
}

impl FromStr for NetworkType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" => Ok(NetworkType::MainNet),
            "testnet" | "test" => Ok(NetworkType::TestNet),
            "private" | "privnet" => Ok(NetworkType::Private),
            other => Err(ConfigError::Invalid(format!("unknown network: {other}"))),
        }
    }
}

/// Protocol-level settings the execution core consumes.
///
/// Gas pricing constants are configuration, not code: `execution_fee_factor`
/// scales every opcode's base price and `prices` overrides individual opcodes
/// by mnemonic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProtocolSettings {
    /// Network magic included in signed payloads.
    pub network: u32,
    /// Version byte for base58check addresses.
    pub address_version: u8,
    /// Number of consensus validators.
    pub validators_count: u32,
    /// Milliseconds between blocks.
    pub ms_per_block: u64,
    /// How far back executions may reference blocks.
    pub max_traceable_blocks: u32,
    /// Multiplier applied to every opcode base price.
    pub execution_fee_factor: i64,
    /// Hardfork name to activation height.
    pub hardforks: BTreeMap<String, u32>,
    /// Per-opcode base price overrides, keyed by mnemonic.
    pub prices: BTreeMap<String, i64>,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            network: NetworkType::Private.magic(),
            address_version: 0x35,
            validators_count: 7,
            ms_per_block: 15_000,
            max_traceable_blocks: 2_102_400,
            execution_fee_factor: 30,
            hardforks: BTreeMap::new(),
            prices: BTreeMap::new(),
        }
    }
}

impl ProtocolSettings {
    /// Settings for one of the well-known networks.
    pub fn for_network(network: NetworkType) -> Self {
        Self {
            network: network.magic(),
            address_version: network.address_version(),
            ..Self::default()
        }
    }

    /// Returns true if the named hardfork is active at the given height.
    pub fn hardfork_enabled(&self, name: &str, height: u32) -> bool {
        self.hardforks.get(name).is_some_and(|&h| height >= h)
    }
}

/// Backing store selection for the debugger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    #[default]
    InMemory,
    LevelDb,
    BoltDb,
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbType::InMemory => write!(f, "inmemory"),
            DbType::LevelDb => write!(f, "leveldb"),
            DbType::BoltDb => write!(f, "boltdb"),
        }
    }
}

/// Top-level application configuration for the debug shell.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AppConfig {
    /// Protocol settings of the chain being debugged.
    pub protocol: ProtocolSettings,
    /// Backing store type, reported by `env`.
    pub db_type: DbType,
    /// External command used to compile source into NEF + manifest.
    pub compiler: Option<String>,
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol.execution_fee_factor <= 0 {
            return Err(ConfigError::Invalid(
                "execution-fee-factor must be positive".into(),
            ));
        }
        if self.protocol.ms_per_block == 0 {
            return Err(ConfigError::Invalid("ms-per-block must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_magic_values() {
        assert_eq!(NetworkType::MainNet.magic(), 0x334f454e);
        assert_eq!(NetworkType::TestNet.magic(), 0x3254334e);
        assert_eq!("mainnet".parse::<NetworkType>().unwrap(), NetworkType::MainNet);
        assert!("nonet".parse::<NetworkType>().is_err());
    }

    #[test]
    fn default_settings_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.db_type.to_string(), "inmemory");
    }

    #[test]
    fn hardfork_activation() {
        let mut settings = ProtocolSettings::default();
        settings.hardforks.insert("Aspidochelone".into(), 100);
        assert!(!settings.hardfork_enabled("Aspidochelone", 99));
        assert!(settings.hardfork_enabled("Aspidochelone", 100));
        assert!(!settings.hardfork_enabled("Basilisk", 1_000_000));
    }

    #[test]
    fn parse_toml_config() {
        let config: AppConfig = toml::from_str(
            r#"
            db-type = "inmemory"
            compiler = "neo-go contract compile"

            [protocol]
            network = 42
            execution-fee-factor = 30

            [protocol.hardforks]
            Aspidochelone = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.protocol.network, 42);
        assert!(config.protocol.hardfork_enabled("Aspidochelone", 0));
        assert_eq!(config.compiler.as_deref(), Some("neo-go contract compile"));
    }
}
