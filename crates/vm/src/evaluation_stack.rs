//! Evaluation stack for the Neo Virtual Machine.

use crate::error::{VmError, VmResult};
use crate::reference_counter::ReferenceCounter;
use crate::stack_item::StackItem;

/// The operand stack of one execution context.
#[derive(Debug)]
pub struct EvaluationStack {
    stack: Vec<StackItem>,
    reference_counter: ReferenceCounter,
}

impl EvaluationStack {
    /// Creates an empty stack sharing the given reference counter.
    pub fn new(reference_counter: ReferenceCounter) -> Self {
        Self {
            stack: Vec::new(),
            reference_counter,
        }
    }

    /// The reference counter in use.
    pub fn reference_counter(&self) -> &ReferenceCounter {
        &self.reference_counter
    }

    /// The number of items on the stack.
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// True when the stack holds no items.
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Pushes an item, counting its reference.
    pub fn push(&mut self, item: StackItem) -> VmResult<()> {
        self.reference_counter.add(&item)?;
        self.stack.push(item);
        Ok(())
    }

    /// Pops the top item.
    pub fn pop(&mut self) -> VmResult<StackItem> {
        match self.stack.pop() {
            Some(item) => {
                self.reference_counter.remove(&item);
                Ok(item)
            }
            None => Err(VmError::StackUnderflow {
                requested: 1,
                available: 0,
            }),
        }
    }

    /// Reads the item `n` positions below the top without removing it.
    pub fn peek(&self, n: usize) -> VmResult<&StackItem> {
        if n >= self.stack.len() {
            return Err(VmError::StackUnderflow {
                requested: n + 1,
                available: self.stack.len(),
            });
        }
        Ok(&self.stack[self.stack.len() - 1 - n])
    }

    /// Removes the item `n` positions below the top.
    pub fn remove(&mut self, n: usize) -> VmResult<StackItem> {
        if n >= self.stack.len() {
            return Err(VmError::StackUnderflow {
                requested: n + 1,
                available: self.stack.len(),
            });
        }
        let index = self.stack.len() - 1 - n;
        let item = self.stack.remove(index);
        self.reference_counter.remove(&item);
        Ok(item)
    }

    /// Inserts an item `n` positions below the top.
    pub fn insert(&mut self, n: usize, item: StackItem) -> VmResult<()> {
        if n > self.stack.len() {
            return Err(VmError::StackUnderflow {
                requested: n,
                available: self.stack.len(),
            });
        }
        self.reference_counter.add(&item)?;
        let index = self.stack.len() - n;
        self.stack.insert(index, item);
        Ok(())
    }

    /// Swaps the top item with the item `n` positions below it.
    pub fn swap(&mut self, n: usize) -> VmResult<()> {
        if n >= self.stack.len() {
            return Err(VmError::StackUnderflow {
                requested: n + 1,
                available: self.stack.len(),
            });
        }
        let top = self.stack.len() - 1;
        let other = top - n;
        self.stack.swap(top, other);
        Ok(())
    }

    /// Reverses the order of the top `n` items.
    pub fn reverse(&mut self, n: usize) -> VmResult<()> {
        if n > self.stack.len() {
            return Err(VmError::StackUnderflow {
                requested: n,
                available: self.stack.len(),
            });
        }
        if n > 1 {
            let start = self.stack.len() - n;
            self.stack[start..].reverse();
        }
        Ok(())
    }

    /// Removes every item.
    pub fn clear(&mut self) {
        for item in &self.stack {
            self.reference_counter.remove(item);
        }
        self.stack.clear();
    }

    /// Moves every item to `target`, preserving order.
    pub fn drain_to(&mut self, target: &mut EvaluationStack) -> VmResult<()> {
        for item in self.stack.drain(..) {
            self.reference_counter.remove(&item);
            target.reference_counter.add(&item)?;
            target.stack.push(item);
        }
        Ok(())
    }

    /// Iterates from bottom to top.
    pub fn iter(&self) -> impl Iterator<Item = &StackItem> {
        self.stack.iter()
    }

    /// Renders the stack top-first as a JSON array of tagged items.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.stack.iter().rev().map(StackItem::to_json).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack() -> EvaluationStack {
        EvaluationStack::new(ReferenceCounter::new())
    }

    #[test]
    fn push_pop_peek() {
        let mut s = stack();
        s.push(StackItem::from_int(1)).unwrap();
        s.push(StackItem::from_int(2)).unwrap();
        assert_eq!(s.peek(0).unwrap().try_integer().unwrap(), 2.into());
        assert_eq!(s.peek(1).unwrap().try_integer().unwrap(), 1.into());
        assert_eq!(s.pop().unwrap().try_integer().unwrap(), 2.into());
        assert_eq!(s.len(), 1);
        assert!(s.peek(1).is_err());
    }

    #[test]
    fn pop_empty_underflows() {
        let mut s = stack();
        assert!(matches!(
            s.pop(),
            Err(VmError::StackUnderflow { requested: 1, available: 0 })
        ));
    }

    #[test]
    fn swap_and_reverse() {
        let mut s = stack();
        for i in 1..=4 {
            s.push(StackItem::from_int(i)).unwrap();
        }
        s.swap(2).unwrap(); // 1 4 3 2
        assert_eq!(s.peek(0).unwrap().try_integer().unwrap(), 2.into());
        assert_eq!(s.peek(2).unwrap().try_integer().unwrap(), 4.into());
        s.reverse(4).unwrap(); // 2 3 4 1
        assert_eq!(s.peek(0).unwrap().try_integer().unwrap(), 1.into());
    }

    #[test]
    fn reference_counting_follows_items() {
        let counter = ReferenceCounter::new();
        let mut s = EvaluationStack::new(counter.clone());
        s.push(StackItem::new_array(vec![])).unwrap();
        assert_eq!(counter.count(), 1);
        s.pop().unwrap();
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn drain_transfers_in_order() {
        let counter = ReferenceCounter::new();
        let mut a = EvaluationStack::new(counter.clone());
        let mut b = EvaluationStack::new(counter);
        a.push(StackItem::from_int(1)).unwrap();
        a.push(StackItem::from_int(2)).unwrap();
        a.drain_to(&mut b).unwrap();
        assert!(a.is_empty());
        assert_eq!(b.peek(0).unwrap().try_integer().unwrap(), 2.into());
        assert_eq!(b.peek(1).unwrap().try_integer().unwrap(), 1.into());
    }

    #[test]
    fn json_renders_top_first() {
        let mut s = stack();
        s.push(StackItem::from_int(1)).unwrap();
        s.push(StackItem::from_int(3)).unwrap();
        assert_eq!(
            s.to_json().to_string(),
            r#"[{"type":"Integer","value":3},{"type":"Integer","value":1}]"#
        );
    }
}
