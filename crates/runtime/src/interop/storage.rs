//! `System.Storage.*` and `System.Iterator.*` services.

use crate::interop::runtime::executing_script_hash;
use crate::interop::InteropContext;
use neodbg_vm::{ExecutionEngine, InteropInterface, StackItem, VmError, VmResult};
use std::cell::Cell;
use std::rc::Rc;

/// Longest accepted storage key.
const MAX_STORAGE_KEY_SIZE: usize = 64;
/// Longest accepted storage value.
const MAX_STORAGE_VALUE_SIZE: usize = u16::MAX as usize;

/// Find option: return keys only.
const FIND_KEYS_ONLY: u8 = 1 << 0;
/// Find option: trim the search prefix from returned keys.
const FIND_REMOVE_PREFIX: u8 = 1 << 1;
/// Find option: return values only.
const FIND_VALUES_ONLY: u8 = 1 << 2;
/// Find option: deserialize values before returning them.
const FIND_DESERIALIZE: u8 = 1 << 3;
/// Find option: return field 0 of the deserialized value.
const FIND_PICK_FIELD0: u8 = 1 << 4;
/// Find option: return field 1 of the deserialized value.
const FIND_PICK_FIELD1: u8 = 1 << 5;
/// Find option: iterate backwards.
const FIND_BACKWARDS: u8 = 1 << 7;

/// A storage context: the executing contract's id plus a write permission.
#[derive(Debug)]
pub struct StorageContext {
    /// The owning contract's storage id.
    pub id: i32,
    /// Writes are rejected through a read-only context.
    pub read_only: bool,
}

impl InteropInterface for StorageContext {
    fn interface_type(&self) -> &str {
        "StorageContext"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// A storage scan in progress, consumed via `System.Iterator.*`.
#[derive(Debug)]
pub struct StorageIterator {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    // None until the first Next.
    position: Cell<Option<usize>>,
    options: u8,
    prefix_length: usize,
}

impl InteropInterface for StorageIterator {
    fn interface_type(&self) -> &str {
        "StorageIterator"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl StorageIterator {
    fn next(&self) -> bool {
        let next = self.position.get().map_or(0, |p| p + 1);
        if next < self.entries.len() {
            self.position.set(Some(next));
            true
        } else {
            // Park past the end so further Next calls stay false.
            self.position.set(Some(self.entries.len()));
            false
        }
    }

    fn value(&self) -> VmResult<StackItem> {
        let position = self
            .position
            .get()
            .ok_or_else(|| VmError::catchable("iterator is not positioned; call Next first"))?;
        let (key, value) = self
            .entries
            .get(position)
            .ok_or_else(|| VmError::catchable("iterator is exhausted"))?;
        let key = if self.options & FIND_REMOVE_PREFIX != 0 {
            key[self.prefix_length..].to_vec()
        } else {
            key.clone()
        };
        let value_item = if self.options & FIND_DESERIALIZE != 0 {
            let deserialized = neodbg_vm::deserialize_item(value)?;
            if self.options & (FIND_PICK_FIELD0 | FIND_PICK_FIELD1) != 0 {
                let index = usize::from(self.options & FIND_PICK_FIELD1 != 0);
                match &deserialized {
                    StackItem::Array(items) | StackItem::Struct(items) => {
                        items.borrow().get(index).cloned().ok_or_else(|| {
                            VmError::catchable("picked field is out of range")
                        })?
                    }
                    other => {
                        return Err(VmError::catchable(format!(
                            "can't pick a field from {}",
                            other.type_name()
                        )))
                    }
                }
            } else {
                deserialized
            }
        } else {
            StackItem::from_bytes(value.clone())
        };
        let item = if self.options & FIND_KEYS_ONLY != 0 {
            StackItem::from_bytes(key)
        } else if self.options & FIND_VALUES_ONLY != 0 {
            value_item
        } else {
            StackItem::new_struct(vec![StackItem::from_bytes(key), value_item])
        };
        Ok(item)
    }
}

pub(super) fn get_context(
    engine: &mut ExecutionEngine,
    context: &mut InteropContext,
) -> VmResult<()> {
    push_context(engine, context, false)
}

pub(super) fn get_read_only_context(
    engine: &mut ExecutionEngine,
    context: &mut InteropContext,
) -> VmResult<()> {
    push_context(engine, context, true)
}

fn push_context(
    engine: &mut ExecutionEngine,
    context: &mut InteropContext,
    read_only: bool,
) -> VmResult<()> {
    let hash = executing_script_hash(engine)?;
    let contract = context
        .dao
        .get_contract(&hash)
        .ok_or_else(|| VmError::catchable(format!("contract {hash} is not deployed")))?;
    engine.push(StackItem::from_interface(Rc::new(StorageContext {
        id: contract.id,
        read_only,
    })))
}

pub(super) fn as_read_only(
    engine: &mut ExecutionEngine,
    _context: &mut InteropContext,
) -> VmResult<()> {
    let storage_context = pop_storage_context(engine)?;
    engine.push(StackItem::from_interface(Rc::new(StorageContext {
        id: storage_context.id,
        read_only: true,
    })))
}

pub(super) fn get(engine: &mut ExecutionEngine, context: &mut InteropContext) -> VmResult<()> {
    let storage_context = pop_storage_context(engine)?;
    let key = engine.pop()?.try_bytes()?;
    match context.dao.get_storage_item(storage_context.id, &key) {
        Some(value) => engine.push(StackItem::from_bytes(value)),
        None => engine.push(StackItem::Null),
    }
}

pub(super) fn put(engine: &mut ExecutionEngine, context: &mut InteropContext) -> VmResult<()> {
    let storage_context = pop_storage_context(engine)?;
    let key = engine.pop()?.try_bytes()?;
    let value = engine.pop()?.try_bytes()?;
    if storage_context.read_only {
        return Err(VmError::catchable("storage context is read-only"));
    }
    if key.len() > MAX_STORAGE_KEY_SIZE {
        return Err(VmError::catchable("storage key too long"));
    }
    if value.len() > MAX_STORAGE_VALUE_SIZE {
        return Err(VmError::catchable("storage value too long"));
    }
    context.dao.put_storage_item(storage_context.id, &key, value);
    Ok(())
}

pub(super) fn delete(engine: &mut ExecutionEngine, context: &mut InteropContext) -> VmResult<()> {
    let storage_context = pop_storage_context(engine)?;
    let key = engine.pop()?.try_bytes()?;
    if storage_context.read_only {
        return Err(VmError::catchable("storage context is read-only"));
    }
    context.dao.delete_storage_item(storage_context.id, &key);
    Ok(())
}

pub(super) fn find(engine: &mut ExecutionEngine, context: &mut InteropContext) -> VmResult<()> {
    let storage_context = pop_storage_context(engine)?;
    let prefix = engine.pop()?.try_bytes()?;
    let options = engine.pop()?.try_integer()?;
    let options = u8::try_from(&options)
        .map_err(|_| VmError::catchable(format!("invalid find options {options}")))?;
    validate_find_options(options)?;
    let backwards = options & FIND_BACKWARDS != 0;
    let entries = context
        .dao
        .find_storage(storage_context.id, &prefix, backwards, 0);
    engine.push(StackItem::from_interface(Rc::new(StorageIterator {
        entries,
        position: Cell::new(None),
        options,
        prefix_length: prefix.len(),
    })))
}

fn validate_find_options(options: u8) -> VmResult<()> {
    const KNOWN: u8 = FIND_KEYS_ONLY
        | FIND_REMOVE_PREFIX
        | FIND_VALUES_ONLY
        | FIND_DESERIALIZE
        | FIND_PICK_FIELD0
        | FIND_PICK_FIELD1
        | FIND_BACKWARDS;
    if options & !KNOWN != 0 {
        return Err(VmError::catchable(format!(
            "unknown find options {options:#04x}"
        )));
    }
    if options & FIND_KEYS_ONLY != 0 && options & FIND_VALUES_ONLY != 0 {
        return Err(VmError::catchable(
            "KeysOnly and ValuesOnly are mutually exclusive",
        ));
    }
    if options & (FIND_PICK_FIELD0 | FIND_PICK_FIELD1) != 0
        && options & FIND_DESERIALIZE == 0
    {
        return Err(VmError::catchable(
            "picked fields require DeserializeValues",
        ));
    }
    Ok(())
}

pub(super) fn iterator_next(
    engine: &mut ExecutionEngine,
    _context: &mut InteropContext,
) -> VmResult<()> {
    let interface = pop_interface(engine)?;
    let Some(iterator) = interface.as_any().downcast_ref::<StorageIterator>() else {
        return Err(unexpected_interface(&*interface));
    };
    let advanced = iterator.next();
    engine.push(StackItem::from_bool(advanced))
}

pub(super) fn iterator_value(
    engine: &mut ExecutionEngine,
    _context: &mut InteropContext,
) -> VmResult<()> {
    let interface = pop_interface(engine)?;
    let Some(iterator) = interface.as_any().downcast_ref::<StorageIterator>() else {
        return Err(unexpected_interface(&*interface));
    };
    let value = iterator.value()?;
    engine.push(value)
}

fn pop_storage_context(engine: &mut ExecutionEngine) -> VmResult<StorageContext> {
    let interface = pop_interface(engine)?;
    let storage_context = interface
        .as_any()
        .downcast_ref::<StorageContext>()
        .ok_or_else(|| unexpected_interface(&*interface))?;
    Ok(StorageContext {
        id: storage_context.id,
        read_only: storage_context.read_only,
    })
}

fn pop_interface(engine: &mut ExecutionEngine) -> VmResult<Rc<dyn InteropInterface>> {
    let item = engine.pop()?;
    match item {
        StackItem::Interop(interface) => Ok(interface),
        other => Err(VmError::InvalidType {
            from: other.type_name(),
            to: "InteropInterface",
        }),
    }
}

fn unexpected_interface(interface: &dyn InteropInterface) -> VmError {
    VmError::catchable(format!(
        "unexpected interop interface {}",
        interface.interface_type()
    ))
}
