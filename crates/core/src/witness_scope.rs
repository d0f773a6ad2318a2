// Copyright (C) 2015-2025 The Neo Project.
//
// witness_scope.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Implementation of WitnessScope, the scope of a witness.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Represents the scope of a witness as a set of flags.
///
/// The scope declares which sub-calls of an invocation may claim the
/// signing account's authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WitnessScope(u8);

#[allow(non_upper_case_globals)]
impl WitnessScope {
    /// Only the transaction itself is signed; every CheckWitness fails.
    pub const None: WitnessScope = WitnessScope(0x00);

    /// The witness holds only while the entry script is the caller.
    pub const CalledByEntry: WitnessScope = WitnessScope(0x01);

    /// The witness holds inside the listed contracts.
    pub const CustomContracts: WitnessScope = WitnessScope(0x10);

    /// The witness holds inside contracts of the listed groups.
    pub const CustomGroups: WitnessScope = WitnessScope(0x20);

    /// The witness is governed by witness rules.
    pub const WitnessRules: WitnessScope = WitnessScope(0x40);

    /// The witness holds everywhere. Cannot be combined with other flags.
    pub const Global: WitnessScope = WitnessScope(0x80);

    /// Checks whether `flag` is set.
    pub fn has_flag(self, flag: WitnessScope) -> bool {
        if flag.0 == 0 {
            return self.0 == 0;
        }
        self.0 & flag.0 == flag.0
    }

    /// Combines two scopes.
    pub fn combine(self, other: WitnessScope) -> Self {
        WitnessScope(self.0 | other.0)
    }

    /// The raw flag byte.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Validates a flag byte. Global must stand alone.
    pub fn from_byte(value: u8) -> Result<Self, CoreError> {
        const VALID: u8 = 0x01 | 0x10 | 0x20 | 0x40 | 0x80;
        if value & !VALID != 0 {
            return Err(CoreError::invalid_format(format!(
                "unknown witness scope bits {value:#04x}"
            )));
        }
        if value & 0x80 != 0 && value != 0x80 {
            return Err(CoreError::invalid_format(
                "Global scope cannot be combined with other scopes",
            ));
        }
        Ok(WitnessScope(value))
    }

    /// Parses a comma-separated list of scope names, e.g. `CalledByEntry,Global`.
    pub fn from_list(value: &str) -> Result<Self, CoreError> {
        let mut result = WitnessScope::None;
        for part in value.split(',') {
            result = result.combine(part.trim().parse()?);
        }
        Self::from_byte(result.0)
    }
}

impl Default for WitnessScope {
    fn default() -> Self {
        WitnessScope::None
    }
}

impl fmt::Display for WitnessScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "None");
        }
        let names = [
            (WitnessScope::CalledByEntry, "CalledByEntry"),
            (WitnessScope::CustomContracts, "CustomContracts"),
            (WitnessScope::CustomGroups, "CustomGroups"),
            (WitnessScope::WitnessRules, "WitnessRules"),
            (WitnessScope::Global, "Global"),
        ];
        let mut first = true;
        for (flag, name) in names {
            if self.has_flag(flag) {
                if !first {
                    write!(f, ", ")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        Ok(())
    }
}

impl FromStr for WitnessScope {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(WitnessScope::None),
            "CalledByEntry" => Ok(WitnessScope::CalledByEntry),
            "CustomContracts" => Ok(WitnessScope::CustomContracts),
            "CustomGroups" => Ok(WitnessScope::CustomGroups),
            "WitnessRules" => Ok(WitnessScope::WitnessRules),
            "Global" => Ok(WitnessScope::Global),
            other => Err(CoreError::invalid_format(format!(
                "unknown witness scope: {other}"
            ))),
        }
    }
}
