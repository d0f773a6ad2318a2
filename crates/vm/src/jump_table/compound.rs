//! Compound-type instructions: arrays, structs, maps.

use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::{MapEntries, StackItem, StackItemType};
use neodbg_config::MAX_ITEM_SIZE;
use num_traits::ToPrimitive;
use std::cell::RefCell;
use std::rc::Rc;

pub(super) fn execute(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    use OpCode::*;
    match instruction.opcode {
        PACKMAP => {
            let count = pop_count(engine)?;
            let mut entries: MapEntries = Vec::with_capacity(count);
            for _ in 0..count {
                let key = pop_map_key(engine)?;
                let value = engine.pop()?;
                entries.push((key, value));
            }
            engine.push(StackItem::Map(Rc::new(RefCell::new(entries))))
        }
        PACKSTRUCT => {
            let count = pop_count(engine)?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(engine.pop()?);
            }
            engine.push(StackItem::new_struct(items))
        }
        PACK => {
            let count = pop_count(engine)?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(engine.pop()?);
            }
            engine.push(StackItem::new_array(items))
        }
        UNPACK => {
            let item = engine.pop()?;
            match item {
                StackItem::Array(items) | StackItem::Struct(items) => {
                    let items = items.borrow();
                    for element in items.iter().rev() {
                        engine.push(element.clone())?;
                    }
                    engine.push(StackItem::from_int(items.len() as i64))
                }
                StackItem::Map(entries) => {
                    let entries = entries.borrow();
                    for (key, value) in entries.iter().rev() {
                        engine.push(value.clone())?;
                        engine.push(key.clone())?;
                    }
                    engine.push(StackItem::from_int(entries.len() as i64))
                }
                other => Err(VmError::InvalidType {
                    from: other.type_name(),
                    to: "Array",
                }),
            }
        }
        NEWARRAY0 => engine.push(StackItem::new_array(Vec::new())),
        NEWARRAY | NEWARRAY_T => {
            // The element type of NEWARRAY_T only matters for validation.
            if instruction.opcode == NEWARRAY_T {
                StackItemType::try_from(instruction.operand_u8()?)?;
            }
            let count = pop_count(engine)?;
            engine.push(StackItem::new_array(vec![StackItem::Null; count]))
        }
        NEWSTRUCT0 => engine.push(StackItem::new_struct(Vec::new())),
        NEWSTRUCT => {
            let count = pop_count(engine)?;
            engine.push(StackItem::new_struct(vec![StackItem::Null; count]))
        }
        NEWMAP => engine.push(StackItem::new_map()),
        SIZE => {
            let size = engine.pop()?.len()?;
            engine.push(StackItem::from_int(size as i64))
        }
        HASKEY => {
            let key = engine.pop()?;
            let collection = engine.pop()?;
            let found = match &collection {
                StackItem::Array(items) | StackItem::Struct(items) => {
                    let index = item_index(&key)?;
                    index < items.borrow().len()
                }
                StackItem::Map(entries) => find_entry(&entries.borrow(), &key)?.is_some(),
                StackItem::ByteString(bytes) => item_index(&key)? < bytes.len(),
                StackItem::Buffer(bytes) => item_index(&key)? < bytes.borrow().len(),
                other => {
                    return Err(VmError::InvalidType {
                        from: other.type_name(),
                        to: "Array",
                    })
                }
            };
            engine.push(StackItem::from_bool(found))
        }
        KEYS => {
            let item = engine.pop()?;
            let StackItem::Map(entries) = item else {
                return Err(VmError::InvalidType {
                    from: item.type_name(),
                    to: "Map",
                });
            };
            let keys: Vec<StackItem> = entries.borrow().iter().map(|(k, _)| k.clone()).collect();
            engine.push(StackItem::new_array(keys))
        }
        VALUES => {
            let item = engine.pop()?;
            let values: Vec<StackItem> = match item {
                StackItem::Array(items) | StackItem::Struct(items) => items.borrow().clone(),
                StackItem::Map(entries) => {
                    entries.borrow().iter().map(|(_, v)| v.clone()).collect()
                }
                other => {
                    return Err(VmError::InvalidType {
                        from: other.type_name(),
                        to: "Map",
                    })
                }
            };
            engine.push(StackItem::new_array(values))
        }
        PICKITEM => {
            let key = engine.pop()?;
            let collection = engine.pop()?;
            let picked = match &collection {
                StackItem::Array(items) | StackItem::Struct(items) => {
                    let index = item_index(&key)?;
                    items.borrow().get(index).cloned().ok_or_else(|| {
                        VmError::invalid_operation(format!("index {index} out of range"))
                    })?
                }
                StackItem::Map(entries) => {
                    let entries = entries.borrow();
                    let position = find_entry(&entries, &key)?.ok_or_else(|| {
                        VmError::invalid_operation("key not found in map")
                    })?;
                    entries[position].1.clone()
                }
                StackItem::ByteString(_) | StackItem::Buffer(_) => {
                    let bytes = collection.try_bytes()?;
                    let index = item_index(&key)?;
                    let byte = bytes.get(index).copied().ok_or_else(|| {
                        VmError::invalid_operation(format!("index {index} out of range"))
                    })?;
                    StackItem::from_int(byte as i64)
                }
                other => {
                    return Err(VmError::InvalidType {
                        from: other.type_name(),
                        to: "Array",
                    })
                }
            };
            engine.push(picked)
        }
        APPEND => {
            let value = engine.pop()?;
            let target = engine.pop()?;
            match &target {
                StackItem::Array(items) | StackItem::Struct(items) => {
                    // Structs append a deep copy of struct values.
                    let value = if matches!(value, StackItem::Struct(_)) {
                        value.deep_copy()?
                    } else {
                        value
                    };
                    engine.reference_counter().add(&value)?;
                    items.borrow_mut().push(value);
                    Ok(())
                }
                other => Err(VmError::InvalidType {
                    from: other.type_name(),
                    to: "Array",
                }),
            }
        }
        SETITEM => {
            let value = engine.pop()?;
            let key = engine.pop()?;
            let target = engine.pop()?;
            match &target {
                StackItem::Array(items) | StackItem::Struct(items) => {
                    let index = item_index(&key)?;
                    let mut items = items.borrow_mut();
                    let slot = items.get_mut(index).ok_or_else(|| {
                        VmError::invalid_operation(format!("index {index} out of range"))
                    })?;
                    engine.reference_counter().add(&value)?;
                    engine.reference_counter().remove(slot);
                    *slot = value;
                    Ok(())
                }
                StackItem::Map(entries) => {
                    require_map_key(&key)?;
                    let mut entries = entries.borrow_mut();
                    match find_entry(&entries, &key)? {
                        Some(position) => {
                            engine.reference_counter().add(&value)?;
                            engine.reference_counter().remove(&entries[position].1);
                            entries[position].1 = value;
                        }
                        None => {
                            engine.reference_counter().add(&value)?;
                            entries.push((key, value));
                        }
                    }
                    Ok(())
                }
                StackItem::Buffer(bytes) => {
                    let index = item_index(&key)?;
                    let byte = value
                        .try_integer()?
                        .to_u8()
                        .ok_or_else(|| VmError::invalid_operation("byte value out of range"))?;
                    let mut bytes = bytes.borrow_mut();
                    let slot = bytes.get_mut(index).ok_or_else(|| {
                        VmError::invalid_operation(format!("index {index} out of range"))
                    })?;
                    *slot = byte;
                    Ok(())
                }
                other => Err(VmError::InvalidType {
                    from: other.type_name(),
                    to: "Array",
                }),
            }
        }
        REVERSEITEMS => {
            let target = engine.pop()?;
            match &target {
                StackItem::Array(items) | StackItem::Struct(items) => {
                    items.borrow_mut().reverse();
                    Ok(())
                }
                StackItem::Buffer(bytes) => {
                    bytes.borrow_mut().reverse();
                    Ok(())
                }
                other => Err(VmError::InvalidType {
                    from: other.type_name(),
                    to: "Array",
                }),
            }
        }
        REMOVE => {
            let key = engine.pop()?;
            let target = engine.pop()?;
            match &target {
                StackItem::Array(items) | StackItem::Struct(items) => {
                    let index = item_index(&key)?;
                    let mut items = items.borrow_mut();
                    if index >= items.len() {
                        return Err(VmError::invalid_operation(format!(
                            "index {index} out of range"
                        )));
                    }
                    let removed = items.remove(index);
                    engine.reference_counter().remove(&removed);
                    Ok(())
                }
                StackItem::Map(entries) => {
                    let mut entries = entries.borrow_mut();
                    if let Some(position) = find_entry(&entries, &key)? {
                        let (_, removed) = entries.remove(position);
                        engine.reference_counter().remove(&removed);
                    }
                    Ok(())
                }
                other => Err(VmError::InvalidType {
                    from: other.type_name(),
                    to: "Array",
                }),
            }
        }
        CLEARITEMS => {
            let target = engine.pop()?;
            match &target {
                StackItem::Array(items) | StackItem::Struct(items) => {
                    let mut items = items.borrow_mut();
                    for item in items.iter() {
                        engine.reference_counter().remove(item);
                    }
                    items.clear();
                    Ok(())
                }
                StackItem::Map(entries) => {
                    let mut entries = entries.borrow_mut();
                    for (_, value) in entries.iter() {
                        engine.reference_counter().remove(value);
                    }
                    entries.clear();
                    Ok(())
                }
                other => Err(VmError::InvalidType {
                    from: other.type_name(),
                    to: "Array",
                }),
            }
        }
        POPITEM => {
            let target = engine.pop()?;
            match &target {
                StackItem::Array(items) | StackItem::Struct(items) => {
                    let popped = items
                        .borrow_mut()
                        .pop()
                        .ok_or_else(|| VmError::invalid_operation("POPITEM from empty array"))?;
                    engine.reference_counter().remove(&popped);
                    engine.push(popped)
                }
                other => Err(VmError::InvalidType {
                    from: other.type_name(),
                    to: "Array",
                }),
            }
        }
        other => Err(VmError::invalid_operation(format!(
            "{other} is not a compound-type instruction"
        ))),
    }
}

fn pop_count(engine: &mut ExecutionEngine) -> VmResult<usize> {
    let value = engine.pop()?.try_integer()?;
    value
        .to_usize()
        .filter(|&v| v <= MAX_ITEM_SIZE)
        .ok_or_else(|| VmError::invalid_operation(format!("count {value} out of range")))
}

fn pop_map_key(engine: &mut ExecutionEngine) -> VmResult<StackItem> {
    let key = engine.pop()?;
    require_map_key(&key)?;
    Ok(key)
}

fn require_map_key(key: &StackItem) -> VmResult<()> {
    if !key.item_type().is_primitive() {
        return Err(VmError::InvalidType {
            from: key.type_name(),
            to: "map key",
        });
    }
    Ok(())
}

fn item_index(key: &StackItem) -> VmResult<usize> {
    let value = key.try_integer()?;
    value
        .to_usize()
        .ok_or_else(|| VmError::invalid_operation(format!("index {value} out of range")))
}

/// Locates `key` in insertion-ordered entries by primitive equality.
fn find_entry(entries: &MapEntries, key: &StackItem) -> VmResult<Option<usize>> {
    require_map_key(key)?;
    for (position, (existing, _)) in entries.iter().enumerate() {
        if existing.equals(key)? {
            return Ok(Some(position));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use crate::execution_engine::ExecutionEngine;
    use crate::script::Script;
    use crate::vm_state::VMState;

    fn run(script: Vec<u8>) -> ExecutionEngine {
        let mut engine = ExecutionEngine::new();
        engine.load_script(Script::new(script).unwrap(), -1).unwrap();
        assert_eq!(engine.continue_execution(), VMState::Halt);
        engine
    }

    #[test]
    fn pack_and_unpack() {
        // PUSH1 PUSH2 PUSH2 PACK UNPACK
        let engine = run(vec![0x11, 0x12, 0x12, 0xc0, 0xc1]);
        let stack = engine.result_stack();
        // UNPACK pushes elements then the count.
        assert_eq!(stack.peek(0).unwrap().try_integer().unwrap(), 2.into());
        assert_eq!(stack.peek(1).unwrap().try_integer().unwrap(), 2.into());
        assert_eq!(stack.peek(2).unwrap().try_integer().unwrap(), 1.into());
    }

    #[test]
    fn newarray_pickitem_setitem() {
        // PUSH2 NEWARRAY; DUP; PUSH0; PUSH7; SETITEM; PUSH0; PICKITEM
        let engine = run(vec![0x12, 0xc3, 0x4a, 0x10, 0x17, 0xd0, 0x10, 0xce]);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().try_integer().unwrap(),
            7.into()
        );
    }

    #[test]
    fn map_set_get_haskey() {
        // NEWMAP; DUP; PUSH1; PUSH5; SETITEM; DUP; PUSH1; PICKITEM
        let engine = run(vec![0xc8, 0x4a, 0x11, 0x15, 0xd0, 0x4a, 0x11, 0xce]);
        let stack = engine.result_stack();
        assert_eq!(stack.peek(0).unwrap().try_integer().unwrap(), 5.into());
    }

    #[test]
    fn pickitem_missing_key_faults() {
        // NEWMAP; PUSH1; PICKITEM
        let mut engine = ExecutionEngine::new();
        engine
            .load_script(Script::new(vec![0xc8, 0x11, 0xce]).unwrap(), -1)
            .unwrap();
        assert_eq!(engine.continue_execution(), VMState::Fault);
        assert!(engine.fault_message().unwrap().contains("key not found"));
    }

    #[test]
    fn append_copies_structs() {
        // NEWARRAY0; DUP; NEWSTRUCT0; APPEND; SIZE
        let engine = run(vec![0xc2, 0x4a, 0xc5, 0xcf, 0xca]);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().try_integer().unwrap(),
            1.into()
        );
    }

    #[test]
    fn popitem_returns_last() {
        // PUSH1 PUSH2 PUSH2 PACK POPITEM  -> array packs [2,1]? PACK pops 2 then 1 -> [2,1], last=1
        let engine = run(vec![0x11, 0x12, 0x12, 0xc0, 0xd4]);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().try_integer().unwrap(),
            1.into()
        );
    }

    #[test]
    fn haskey_on_bytestring_checks_bounds() {
        // PUSHDATA1 "ab"; PUSH1; HASKEY
        let engine = run(vec![0x0c, 0x02, b'a', b'b', 0x11, 0xcb]);
        assert!(engine.result_stack().peek(0).unwrap().as_bool());
    }
}
