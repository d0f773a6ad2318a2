//! Canonical binary encoding of stack items.
//!
//! The format is a type tag followed by the payload; composites nest.
//! Serialization rejects cycles (via a visited set) and unserializable
//! types; both directions enforce item-count and byte-size limits.

use crate::error::{VmError, VmResult};
use crate::stack_item::{MapEntries, StackItem, StackItemType};
use neodbg_config::{MAX_ITEM_SIZE, MAX_STACK_REFERENCES};
use neodbg_core::{BinaryWriter, MemoryReader};
use num_bigint::BigInt;
use std::cell::RefCell;
use std::rc::Rc;

/// Serializes `item` into the canonical byte encoding.
pub fn serialize(item: &StackItem) -> VmResult<Vec<u8>> {
    let mut writer = BinaryWriter::new();
    let mut visited = Vec::new();
    let mut remaining_items = MAX_STACK_REFERENCES;
    serialize_into(&mut writer, item, &mut visited, &mut remaining_items)?;
    if writer.len() > MAX_ITEM_SIZE {
        return Err(VmError::too_large("serialized item over size limit"));
    }
    Ok(writer.into_bytes())
}

fn serialize_into(
    writer: &mut BinaryWriter,
    item: &StackItem,
    visited: &mut Vec<usize>,
    remaining_items: &mut usize,
) -> VmResult<()> {
    if *remaining_items == 0 {
        return Err(VmError::too_large("too many items to serialize"));
    }
    *remaining_items -= 1;

    if let Some(address) = item.composite_address() {
        if visited.contains(&address) {
            return Err(VmError::invalid_operation(
                "can't serialize a circular reference",
            ));
        }
        visited.push(address);
    }

    writer.write_u8(item.item_type() as u8);
    match item {
        StackItem::Null => {}
        StackItem::Boolean(value) => writer.write_u8(u8::from(*value)),
        StackItem::Integer(_) | StackItem::ByteString(_) | StackItem::Buffer(_) => {
            writer.write_var_bytes(&item.try_bytes()?);
        }
        StackItem::Array(items) | StackItem::Struct(items) => {
            let items = items.borrow();
            writer.write_var_int(items.len() as u64);
            for element in items.iter() {
                serialize_into(writer, element, visited, remaining_items)?;
            }
        }
        StackItem::Map(entries) => {
            let entries = entries.borrow();
            writer.write_var_int(entries.len() as u64);
            for (key, value) in entries.iter() {
                serialize_into(writer, key, visited, remaining_items)?;
                serialize_into(writer, value, visited, remaining_items)?;
            }
        }
        StackItem::Pointer { .. } | StackItem::Interop(_) => {
            return Err(VmError::invalid_operation(format!(
                "{} is not serializable",
                item.type_name()
            )));
        }
    }

    if let Some(address) = item.composite_address() {
        visited.retain(|&a| a != address);
    }
    Ok(())
}

/// Deserializes an item from the canonical byte encoding.
pub fn deserialize(data: &[u8]) -> VmResult<StackItem> {
    if data.len() > MAX_ITEM_SIZE {
        return Err(VmError::too_large("serialized item over size limit"));
    }
    let mut reader = MemoryReader::new(data);
    let mut remaining_items = MAX_STACK_REFERENCES;
    let item = deserialize_from(&mut reader, &mut remaining_items)?;
    if reader.remaining() != 0 {
        return Err(VmError::parse("trailing bytes after serialized item"));
    }
    Ok(item)
}

fn deserialize_from(
    reader: &mut MemoryReader<'_>,
    remaining_items: &mut usize,
) -> VmResult<StackItem> {
    if *remaining_items == 0 {
        return Err(VmError::too_large("too many items to deserialize"));
    }
    *remaining_items -= 1;

    let tag = reader
        .read_u8()
        .map_err(|e| VmError::parse(e.to_string()))?;
    let item_type = StackItemType::try_from(tag)?;
    let read_bytes = |reader: &mut MemoryReader<'_>| -> VmResult<Vec<u8>> {
        reader
            .read_var_bytes(MAX_ITEM_SIZE)
            .map_err(|e| VmError::parse(e.to_string()))
    };
    match item_type {
        StackItemType::Any => Ok(StackItem::Null),
        StackItemType::Boolean => {
            let value = reader
                .read_u8()
                .map_err(|e| VmError::parse(e.to_string()))?;
            Ok(StackItem::from_bool(value != 0))
        }
        StackItemType::Integer => {
            let bytes = read_bytes(reader)?;
            if bytes.len() > 32 {
                return Err(VmError::too_large("integer overflows 32 bytes"));
            }
            Ok(StackItem::Integer(BigInt::from_signed_bytes_le(&bytes)))
        }
        StackItemType::ByteString => Ok(StackItem::from_bytes(read_bytes(reader)?)),
        StackItemType::Buffer => Ok(StackItem::new_buffer(read_bytes(reader)?)),
        StackItemType::Array | StackItemType::Struct => {
            let count = reader
                .read_var_int(MAX_STACK_REFERENCES as u64)
                .map_err(|e| VmError::parse(e.to_string()))? as usize;
            let mut items = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                items.push(deserialize_from(reader, remaining_items)?);
            }
            if item_type == StackItemType::Array {
                Ok(StackItem::new_array(items))
            } else {
                Ok(StackItem::new_struct(items))
            }
        }
        StackItemType::Map => {
            let count = reader
                .read_var_int(MAX_STACK_REFERENCES as u64)
                .map_err(|e| VmError::parse(e.to_string()))? as usize;
            let mut entries: MapEntries = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                let key = deserialize_from(reader, remaining_items)?;
                if !key.item_type().is_primitive() {
                    return Err(VmError::parse("map key is not primitive"));
                }
                let value = deserialize_from(reader, remaining_items)?;
                entries.push((key, value));
            }
            Ok(StackItem::Map(Rc::new(RefCell::new(entries))))
        }
        StackItemType::Pointer | StackItemType::InteropInterface => Err(VmError::parse(format!(
            "{} is not deserializable",
            item_type.name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(item: StackItem) -> StackItem {
        deserialize(&serialize(&item).unwrap()).unwrap()
    }

    #[test]
    fn primitives_round_trip() {
        assert!(round_trip(StackItem::Null).is_null());
        assert!(round_trip(StackItem::from_bool(true)).as_bool());
        assert_eq!(
            round_trip(StackItem::from_int(-12345)).try_integer().unwrap(),
            (-12345).into()
        );
        assert_eq!(
            round_trip(StackItem::from_bytes(b"neo".to_vec()))
                .try_bytes()
                .unwrap(),
            b"neo"
        );
    }

    #[test]
    fn nested_composites_round_trip() {
        let map = StackItem::new_map();
        if let StackItem::Map(entries) = &map {
            entries.borrow_mut().push((
                StackItem::from_int(1),
                StackItem::new_array(vec![StackItem::from_bool(false), StackItem::Null]),
            ));
        }
        let back = round_trip(map);
        let StackItem::Map(entries) = back else {
            panic!("expected a map");
        };
        let entries = entries.borrow();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1.len().unwrap(), 2);
    }

    #[test]
    fn cycles_fail_gracefully() {
        let array = StackItem::new_array(vec![]);
        if let StackItem::Array(items) = &array {
            items.borrow_mut().push(array.clone());
        }
        let err = serialize(&array).unwrap_err();
        assert!(err.to_string().contains("circular"));
    }

    #[test]
    fn interop_items_are_rejected() {
        #[derive(Debug)]
        struct Host;
        impl crate::stack_item::InteropInterface for Host {
            fn interface_type(&self) -> &str {
                "Host"
            }
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
        }
        let item = StackItem::from_interface(Rc::new(Host));
        assert!(serialize(&item).is_err());
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = serialize(&StackItem::from_int(1)).unwrap();
        bytes.push(0);
        assert!(deserialize(&bytes).is_err());
    }

    #[test]
    fn struct_keeps_its_kind() {
        let item = StackItem::new_struct(vec![StackItem::from_int(9)]);
        let back = round_trip(item);
        assert_eq!(back.item_type(), StackItemType::Struct);
    }
}
