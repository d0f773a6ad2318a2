//! Stack item type tags.

use crate::error::VmError;

/// The wire-level type tag of a stack item, as used by ISTYPE and CONVERT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StackItemType {
    /// Null, or "any type" in signatures.
    Any = 0x00,
    /// A script position.
    Pointer = 0x10,
    /// True or false.
    Boolean = 0x20,
    /// A signed arbitrary-precision integer.
    Integer = 0x21,
    /// An immutable byte string.
    ByteString = 0x28,
    /// A mutable byte buffer.
    Buffer = 0x30,
    /// An ordered list of items.
    Array = 0x40,
    /// An array with value (deep-copy) semantics.
    Struct = 0x41,
    /// An ordered key-value collection with primitive keys.
    Map = 0x48,
    /// An opaque host object.
    InteropInterface = 0x60,
}

impl StackItemType {
    /// The display name of the type.
    pub fn name(self) -> &'static str {
        match self {
            StackItemType::Any => "Any",
            StackItemType::Pointer => "Pointer",
            StackItemType::Boolean => "Boolean",
            StackItemType::Integer => "Integer",
            StackItemType::ByteString => "ByteString",
            StackItemType::Buffer => "Buffer",
            StackItemType::Array => "Array",
            StackItemType::Struct => "Struct",
            StackItemType::Map => "Map",
            StackItemType::InteropInterface => "InteropInterface",
        }
    }

    /// True for Boolean, Integer and ByteString.
    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            StackItemType::Boolean | StackItemType::Integer | StackItemType::ByteString
        )
    }
}

impl TryFrom<u8> for StackItemType {
    type Error = VmError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(StackItemType::Any),
            0x10 => Ok(StackItemType::Pointer),
            0x20 => Ok(StackItemType::Boolean),
            0x21 => Ok(StackItemType::Integer),
            0x28 => Ok(StackItemType::ByteString),
            0x30 => Ok(StackItemType::Buffer),
            0x40 => Ok(StackItemType::Array),
            0x41 => Ok(StackItemType::Struct),
            0x48 => Ok(StackItemType::Map),
            0x60 => Ok(StackItemType::InteropInterface),
            other => Err(VmError::parse(format!("unknown item type {other:#04x}"))),
        }
    }
}
