//! Variable slots: static fields, locals and arguments.

use crate::error::{VmError, VmResult};
use crate::reference_counter::ReferenceCounter;
use crate::stack_item::StackItem;

/// A fixed-size slot of stack items, allocated once by INITSSLOT/INITSLOT.
#[derive(Debug)]
pub struct Slot {
    items: Vec<StackItem>,
    reference_counter: ReferenceCounter,
}

impl Slot {
    /// Creates a slot of `count` null items.
    pub fn new(count: usize, reference_counter: ReferenceCounter) -> Self {
        Self {
            items: vec![StackItem::Null; count],
            reference_counter,
        }
    }

    /// Creates a slot holding the given items, counting their references.
    pub fn with_items(
        items: Vec<StackItem>,
        reference_counter: ReferenceCounter,
    ) -> VmResult<Self> {
        for item in &items {
            reference_counter.add(item)?;
        }
        Ok(Self {
            items,
            reference_counter,
        })
    }

    /// The number of entries in the slot.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True for a zero-length slot.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Reads the item at `index`.
    pub fn get(&self, index: usize) -> VmResult<StackItem> {
        self.items
            .get(index)
            .cloned()
            .ok_or_else(|| VmError::invalid_operation(format!("slot index {index} out of range")))
    }

    /// Replaces the item at `index`.
    pub fn set(&mut self, index: usize, item: StackItem) -> VmResult<()> {
        let existing = self.items.get_mut(index).ok_or_else(|| {
            VmError::invalid_operation(format!("slot index {index} out of range"))
        })?;
        self.reference_counter.add(&item)?;
        self.reference_counter.remove(existing);
        *existing = item;
        Ok(())
    }

    /// Drops the references held by this slot.
    pub fn clear_references(&mut self) {
        for item in &self.items {
            self.reference_counter.remove(item);
        }
        self.items.clear();
    }

    /// Renders the slot as a JSON array of tagged items; unset entries
    /// render as `null`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.items.iter().map(StackItem::to_json).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_slot_is_null_filled() {
        let slot = Slot::new(3, ReferenceCounter::new());
        assert_eq!(slot.len(), 3);
        assert!(slot.get(0).unwrap().is_null());
        assert!(slot.get(2).unwrap().is_null());
        assert!(slot.get(3).is_err());
    }

    #[test]
    fn set_replaces_references() {
        let counter = ReferenceCounter::new();
        let mut slot = Slot::new(2, counter.clone());
        slot.set(1, StackItem::new_array(vec![])).unwrap();
        assert_eq!(counter.count(), 1);
        slot.set(1, StackItem::from_int(5)).unwrap();
        assert_eq!(counter.count(), 0);
        assert_eq!(slot.get(1).unwrap().try_integer().unwrap(), 5.into());
    }

    #[test]
    fn json_uses_null_for_unset() {
        let counter = ReferenceCounter::new();
        let mut slot = Slot::new(2, counter);
        slot.set(1, StackItem::from_int(5)).unwrap();
        assert_eq!(slot.to_json().to_string(), r#"[null,{"type":"Integer","value":5}]"#);
    }
}
