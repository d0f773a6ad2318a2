//! Call permission flags for contract invocations and interop services.

use std::fmt;

/// Permissions a context holds while executing.
///
/// A cross-contract call intersects the caller's flags with the flags it
/// requests for the callee, so permissions only ever narrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallFlags(u8);

impl CallFlags {
    /// No permissions.
    pub const NONE: CallFlags = CallFlags(0);
    /// May read blockchain state.
    pub const READ_STATES: CallFlags = CallFlags(0b0000_0001);
    /// May write blockchain state.
    pub const WRITE_STATES: CallFlags = CallFlags(0b0000_0010);
    /// May call other contracts.
    pub const ALLOW_CALL: CallFlags = CallFlags(0b0000_0100);
    /// May send notifications.
    pub const ALLOW_NOTIFY: CallFlags = CallFlags(0b0000_1000);
    /// Read and write state.
    pub const STATES: CallFlags = CallFlags(0b0000_0011);
    /// Read state and call contracts.
    pub const READ_ONLY: CallFlags = CallFlags(0b0000_0101);
    /// Everything.
    pub const ALL: CallFlags = CallFlags(0b0000_1111);

    /// Validates a raw flag byte.
    pub fn from_bits(bits: u8) -> Option<Self> {
        if bits & !Self::ALL.0 != 0 {
            return None;
        }
        Some(CallFlags(bits))
    }

    /// The raw flag byte.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// True when every flag in `other` is present.
    pub fn contains(self, other: CallFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// The intersection of two flag sets.
    pub fn intersect(self, other: CallFlags) -> CallFlags {
        CallFlags(self.0 & other.0)
    }

    /// True when no flags are set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for CallFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "None");
        }
        if *self == Self::ALL {
            return write!(f, "All");
        }
        let names = [
            (Self::READ_STATES, "ReadStates"),
            (Self::WRITE_STATES, "WriteStates"),
            (Self::ALLOW_CALL, "AllowCall"),
            (Self::ALLOW_NOTIFY, "AllowNotify"),
        ];
        let mut first = true;
        for (flag, name) in names {
            if self.contains(flag) {
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
