//! Stack item implementation for the Neo Virtual Machine.
//!
//! The tagged value universe scripts compute over. Composite items (arrays,
//! structs, maps, buffers) are shared `Rc<RefCell<…>>` cells so that
//! reference identity, in-place mutation and cycles behave the way the
//! instruction set expects; the engine's `ReferenceCounter` bounds how many
//! such references one execution may create.

pub mod serialization;
mod stack_item_type;

pub use stack_item_type::StackItemType;

use crate::error::{VmError, VmResult};
use crate::script::Script;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use neodbg_config::{MAX_COMPARABLE_DEPTH, MAX_INTEGER_SIZE, MAX_ITEM_SIZE};
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A host object exposed to scripts as an opaque handle.
///
/// Equality between interop items is identity: two handles are equal only
/// when they wrap the same object.
pub trait InteropInterface: fmt::Debug {
    /// A short name describing the wrapped object, e.g. `StorageIterator`.
    fn interface_type(&self) -> &str;

    /// Allows downcasting to the concrete host type.
    fn as_any(&self) -> &dyn std::any::Any;
}

/// The items of a map, in insertion order. Keys are primitive items.
pub type MapEntries = Vec<(StackItem, StackItem)>;

/// Represents a value in the Neo VM.
#[derive(Debug, Clone)]
pub enum StackItem {
    /// The absence of a value.
    Null,
    /// A boolean value.
    Boolean(bool),
    /// A signed arbitrary-precision integer of at most 32 bytes.
    Integer(BigInt),
    /// An immutable byte string.
    ByteString(Rc<Vec<u8>>),
    /// A mutable byte buffer.
    Buffer(Rc<RefCell<Vec<u8>>>),
    /// An ordered list of items with reference semantics.
    Array(Rc<RefCell<Vec<StackItem>>>),
    /// An ordered list of items with value semantics on clone.
    Struct(Rc<RefCell<Vec<StackItem>>>),
    /// An insertion-ordered map with primitive keys.
    Map(Rc<RefCell<MapEntries>>),
    /// A code pointer inside a script.
    Pointer {
        /// The script the pointer refers into.
        script: Script,
        /// The instruction offset.
        position: usize,
    },
    /// An opaque host object.
    Interop(Rc<dyn InteropInterface>),
}

impl StackItem {
    /// The canonical null item.
    pub fn null() -> Self {
        StackItem::Null
    }

    /// Creates a boolean item.
    pub fn from_bool(value: bool) -> Self {
        StackItem::Boolean(value)
    }

    /// Creates an integer item.
    pub fn from_int<T: Into<BigInt>>(value: T) -> Self {
        StackItem::Integer(value.into())
    }

    /// Creates an immutable byte string item.
    pub fn from_bytes<T: Into<Vec<u8>>>(value: T) -> Self {
        StackItem::ByteString(Rc::new(value.into()))
    }

    /// Creates a mutable buffer item.
    pub fn new_buffer<T: Into<Vec<u8>>>(value: T) -> Self {
        StackItem::Buffer(Rc::new(RefCell::new(value.into())))
    }

    /// Creates an array item.
    pub fn new_array(items: Vec<StackItem>) -> Self {
        StackItem::Array(Rc::new(RefCell::new(items)))
    }

    /// Creates a struct item.
    pub fn new_struct(items: Vec<StackItem>) -> Self {
        StackItem::Struct(Rc::new(RefCell::new(items)))
    }

    /// Creates an empty map item.
    pub fn new_map() -> Self {
        StackItem::Map(Rc::new(RefCell::new(Vec::new())))
    }

    /// Creates a pointer item.
    pub fn new_pointer(script: Script, position: usize) -> Self {
        StackItem::Pointer { script, position }
    }

    /// Wraps a host object.
    pub fn from_interface(value: Rc<dyn InteropInterface>) -> Self {
        StackItem::Interop(value)
    }

    /// The type tag of this item.
    pub fn item_type(&self) -> StackItemType {
        match self {
            StackItem::Null => StackItemType::Any,
            StackItem::Boolean(_) => StackItemType::Boolean,
            StackItem::Integer(_) => StackItemType::Integer,
            StackItem::ByteString(_) => StackItemType::ByteString,
            StackItem::Buffer(_) => StackItemType::Buffer,
            StackItem::Array(_) => StackItemType::Array,
            StackItem::Struct(_) => StackItemType::Struct,
            StackItem::Map(_) => StackItemType::Map,
            StackItem::Pointer { .. } => StackItemType::Pointer,
            StackItem::Interop(_) => StackItemType::InteropInterface,
        }
    }

    /// The display name of this item's type.
    pub fn type_name(&self) -> &'static str {
        self.item_type().name()
    }

    /// True for the null item.
    pub fn is_null(&self) -> bool {
        matches!(self, StackItem::Null)
    }

    /// True for items tracked by the reference counter.
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            StackItem::Array(_) | StackItem::Struct(_) | StackItem::Map(_) | StackItem::Buffer(_)
        )
    }

    /// Converts the item to a boolean.
    pub fn as_bool(&self) -> bool {
        match self {
            StackItem::Null => false,
            StackItem::Boolean(b) => *b,
            StackItem::Integer(i) => !i.is_zero(),
            StackItem::ByteString(b) => b.iter().any(|&byte| byte != 0),
            StackItem::Buffer(_) => true,
            StackItem::Array(_) | StackItem::Struct(_) | StackItem::Map(_) => true,
            StackItem::Pointer { .. } => true,
            StackItem::Interop(_) => true,
        }
    }

    /// Converts the item to an integer under Neo's coercion rules.
    pub fn try_integer(&self) -> VmResult<BigInt> {
        match self {
            StackItem::Boolean(b) => Ok(BigInt::from(u8::from(*b))),
            StackItem::Integer(i) => Ok(i.clone()),
            StackItem::ByteString(bytes) => bytes_to_integer(bytes),
            StackItem::Buffer(bytes) => bytes_to_integer(&bytes.borrow()),
            other => Err(VmError::InvalidType {
                from: other.type_name(),
                to: "Integer",
            }),
        }
    }

    /// Converts the item to bytes under Neo's coercion rules.
    pub fn try_bytes(&self) -> VmResult<Vec<u8>> {
        match self {
            StackItem::Boolean(b) => Ok(vec![u8::from(*b)]),
            StackItem::Integer(i) => Ok(integer_to_bytes(i)),
            StackItem::ByteString(bytes) => Ok(bytes.as_ref().clone()),
            StackItem::Buffer(bytes) => Ok(bytes.borrow().clone()),
            other => Err(VmError::InvalidType {
                from: other.type_name(),
                to: "ByteString",
            }),
        }
    }

    /// Converts the item to a UTF-8 string.
    pub fn try_string(&self) -> VmResult<String> {
        String::from_utf8(self.try_bytes()?).map_err(|_| VmError::InvalidType {
            from: "ByteString",
            to: "String",
        })
    }

    /// The element count of a collection, or byte length of a byte item.
    pub fn len(&self) -> VmResult<usize> {
        match self {
            StackItem::ByteString(bytes) => Ok(bytes.len()),
            StackItem::Buffer(bytes) => Ok(bytes.borrow().len()),
            StackItem::Array(items) | StackItem::Struct(items) => Ok(items.borrow().len()),
            StackItem::Map(entries) => Ok(entries.borrow().len()),
            other => Err(VmError::invalid_operation(format!(
                "SIZE is not defined for {}",
                other.type_name()
            ))),
        }
    }

    /// Equality under the EQUAL opcode.
    ///
    /// Primitives compare by their byte representation, structs compare
    /// deeply with a depth bound, all other composites by identity.
    pub fn equals(&self, other: &StackItem) -> VmResult<bool> {
        self.equals_limited(other, &mut (MAX_COMPARABLE_DEPTH as isize))
    }

    fn equals_limited(&self, other: &StackItem, budget: &mut isize) -> VmResult<bool> {
        *budget -= 1;
        if *budget < 0 {
            return Err(VmError::too_large("comparison is too deep"));
        }
        match (self, other) {
            (StackItem::Null, StackItem::Null) => Ok(true),
            (StackItem::Null, _) | (_, StackItem::Null) => Ok(false),
            (StackItem::Interop(a), StackItem::Interop(b)) => Ok(Rc::ptr_eq(a, b)),
            (StackItem::Array(a), StackItem::Array(b)) => Ok(Rc::ptr_eq(a, b)),
            (StackItem::Map(a), StackItem::Map(b)) => Ok(Rc::ptr_eq(a, b)),
            (StackItem::Buffer(a), StackItem::Buffer(b)) => Ok(Rc::ptr_eq(a, b)),
            (StackItem::Struct(a), StackItem::Struct(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Ok(true);
                }
                let a = a.borrow();
                let b = b.borrow();
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (x, y) in a.iter().zip(b.iter()) {
                    if !x.equals_limited(y, budget)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (
                StackItem::Pointer { script, position },
                StackItem::Pointer {
                    script: other_script,
                    position: other_position,
                },
            ) => Ok(position == other_position && script.as_bytes() == other_script.as_bytes()),
            (a, b) if a.item_type().is_primitive() && b.item_type().is_primitive() => {
                let left = a.try_bytes()?;
                let right = b.try_bytes()?;
                if left.len() > MAX_ITEM_SIZE || right.len() > MAX_ITEM_SIZE {
                    return Err(VmError::too_large("byte comparison over size limit"));
                }
                Ok(left == right)
            }
            _ => Ok(false),
        }
    }

    /// Produces a deep copy; structs copy their elements, other composites
    /// copy structure as well, so mutation of the copy never aliases the
    /// original. Depth is bounded.
    pub fn deep_copy(&self) -> VmResult<StackItem> {
        self.deep_copy_limited(MAX_COMPARABLE_DEPTH)
    }

    fn deep_copy_limited(&self, depth: usize) -> VmResult<StackItem> {
        if depth == 0 {
            return Err(VmError::too_large("clone is too deep"));
        }
        match self {
            StackItem::Array(items) => {
                let copied = items
                    .borrow()
                    .iter()
                    .map(|i| i.deep_copy_limited(depth - 1))
                    .collect::<VmResult<Vec<_>>>()?;
                Ok(StackItem::new_array(copied))
            }
            StackItem::Struct(items) => {
                let copied = items
                    .borrow()
                    .iter()
                    .map(|i| i.deep_copy_limited(depth - 1))
                    .collect::<VmResult<Vec<_>>>()?;
                Ok(StackItem::new_struct(copied))
            }
            StackItem::Map(entries) => {
                let copied = entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), v.deep_copy_limited(depth - 1)?)))
                    .collect::<VmResult<MapEntries>>()?;
                Ok(StackItem::Map(Rc::new(RefCell::new(copied))))
            }
            StackItem::Buffer(bytes) => Ok(StackItem::new_buffer(bytes.borrow().clone())),
            other => Ok(other.clone()),
        }
    }

    /// Converts this item to the requested type under CONVERT rules.
    pub fn convert_to(&self, target: StackItemType) -> VmResult<StackItem> {
        if self.item_type() == target {
            return Ok(self.clone());
        }
        match target {
            StackItemType::Boolean => Ok(StackItem::from_bool(self.as_bool())),
            StackItemType::Integer => Ok(StackItem::Integer(self.try_integer()?)),
            StackItemType::ByteString => Ok(StackItem::from_bytes(self.try_bytes()?)),
            StackItemType::Buffer => Ok(StackItem::new_buffer(self.try_bytes()?)),
            StackItemType::Array => match self {
                StackItem::Struct(items) => Ok(StackItem::Array(Rc::new(RefCell::new(
                    items.borrow().clone(),
                )))),
                _ => Err(self.conversion_error(target)),
            },
            StackItemType::Struct => match self {
                StackItem::Array(items) => Ok(StackItem::Struct(Rc::new(RefCell::new(
                    items.borrow().clone(),
                )))),
                _ => Err(self.conversion_error(target)),
            },
            StackItemType::Any if self.is_null() => Ok(StackItem::Null),
            _ => Err(self.conversion_error(target)),
        }
    }

    fn conversion_error(&self, target: StackItemType) -> VmError {
        VmError::InvalidType {
            from: self.type_name(),
            to: target.name(),
        }
    }

    /// Renders this item as tagged JSON for stack and slot dumps. Cycles
    /// are rendered as a marker instead of recursing forever.
    pub fn to_json(&self) -> serde_json::Value {
        let mut visited = Vec::new();
        self.to_json_guarded(&mut visited)
    }

    fn composite_address(&self) -> Option<usize> {
        match self {
            StackItem::Array(rc) | StackItem::Struct(rc) => Some(Rc::as_ptr(rc) as usize),
            StackItem::Map(rc) => Some(Rc::as_ptr(rc) as usize),
            _ => None,
        }
    }

    fn to_json_guarded(&self, visited: &mut Vec<usize>) -> serde_json::Value {
        use serde_json::{json, Value};
        if let Some(address) = self.composite_address() {
            if visited.contains(&address) {
                return json!({ "type": self.type_name(), "value": "<circular>" });
            }
            visited.push(address);
        }
        let value = match self {
            StackItem::Null => Value::Null,
            StackItem::Boolean(b) => json!({ "type": "Boolean", "value": b }),
            StackItem::Integer(i) => match i.to_i64() {
                Some(small) => json!({ "type": "Integer", "value": small }),
                None => json!({ "type": "Integer", "value": i.to_string() }),
            },
            StackItem::ByteString(bytes) => {
                json!({ "type": "ByteString", "value": BASE64.encode(bytes.as_ref()) })
            }
            StackItem::Buffer(bytes) => {
                json!({ "type": "Buffer", "value": BASE64.encode(&*bytes.borrow()) })
            }
            StackItem::Array(items) | StackItem::Struct(items) => {
                let rendered: Vec<Value> = items
                    .borrow()
                    .iter()
                    .map(|i| i.to_json_guarded(visited))
                    .collect();
                json!({ "type": self.type_name(), "value": rendered })
            }
            StackItem::Map(entries) => {
                let rendered: Vec<Value> = entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| {
                        json!({
                            "key": k.to_json_guarded(visited),
                            "value": v.to_json_guarded(visited),
                        })
                    })
                    .collect();
                json!({ "type": "Map", "value": rendered })
            }
            StackItem::Pointer { position, .. } => {
                json!({ "type": "Pointer", "value": position })
            }
            StackItem::Interop(interface) => {
                json!({ "type": "InteropInterface", "value": interface.interface_type() })
            }
        };
        if let Some(address) = self.composite_address() {
            visited.retain(|&a| a != address);
        }
        value
    }
}

fn bytes_to_integer(bytes: &[u8]) -> VmResult<BigInt> {
    if bytes.len() > MAX_INTEGER_SIZE {
        return Err(VmError::too_large(format!(
            "integer of {} bytes exceeds {MAX_INTEGER_SIZE}",
            bytes.len()
        )));
    }
    if bytes.is_empty() {
        return Ok(BigInt::zero());
    }
    Ok(BigInt::from_signed_bytes_le(bytes))
}

/// Minimal little-endian two's-complement encoding; zero encodes as empty.
pub fn integer_to_bytes(value: &BigInt) -> Vec<u8> {
    if value.is_zero() {
        return Vec::new();
    }
    value.to_signed_bytes_le()
}

/// Checks the 32-byte bound the VM enforces on every produced integer.
pub fn check_integer(value: &BigInt) -> VmResult<()> {
    if !value.is_zero() && value.to_signed_bytes_le().len() > MAX_INTEGER_SIZE {
        return Err(VmError::too_large("integer overflows 32 bytes"));
    }
    Ok(())
}

impl fmt::Display for StackItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackItem::Null => write!(f, "Null"),
            StackItem::Boolean(b) => write!(f, "{b}"),
            StackItem::Integer(i) => write!(f, "{i}"),
            StackItem::ByteString(bytes) => write!(f, "0x{}", hex::encode(bytes.as_ref())),
            StackItem::Buffer(bytes) => write!(f, "0x{}", hex::encode(&*bytes.borrow())),
            StackItem::Array(items) => write!(f, "Array[{}]", items.borrow().len()),
            StackItem::Struct(items) => write!(f, "Struct[{}]", items.borrow().len()),
            StackItem::Map(entries) => write!(f, "Map[{}]", entries.borrow().len()),
            StackItem::Pointer { position, .. } => write!(f, "Pointer({position})"),
            StackItem::Interop(i) => write!(f, "Interop({})", i.interface_type()),
        }
    }
}
