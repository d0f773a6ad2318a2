//! Script representation: immutable bytecode plus an instruction index.

use crate::error::{VmError, VmResult};
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use neodbg_core::UInt160;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Debug)]
struct ScriptInner {
    bytes: Vec<u8>,
    hash: RefCell<Option<UInt160>>,
    // Instruction start offsets, built on first use.
    boundaries: RefCell<Option<Rc<Vec<usize>>>>,
}

/// An immutable byte script with a lazily built index of instruction
/// boundaries. Cloning is cheap; all clones share the same bytes.
#[derive(Debug, Clone)]
pub struct Script {
    inner: Rc<ScriptInner>,
}

impl Script {
    /// Wraps raw bytes after validating that every instruction decodes.
    pub fn new(bytes: Vec<u8>) -> VmResult<Self> {
        let script = Self::new_relaxed(bytes);
        script.boundaries()?;
        Ok(script)
    }

    /// Wraps raw bytes without up-front validation. Undecodable
    /// instructions surface as faults when reached.
    pub fn new_relaxed(bytes: Vec<u8>) -> Self {
        Self {
            inner: Rc::new(ScriptInner {
                bytes,
                hash: RefCell::new(None),
                boundaries: RefCell::new(None),
            }),
        }
    }

    /// The script length in bytes.
    pub fn len(&self) -> usize {
        self.inner.bytes.len()
    }

    /// True for the empty script.
    pub fn is_empty(&self) -> bool {
        self.inner.bytes.is_empty()
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.inner.bytes
    }

    /// The script hash: RIPEMD160(SHA256(bytes)), cached.
    pub fn hash(&self) -> UInt160 {
        let mut cached = self.inner.hash.borrow_mut();
        *cached.get_or_insert_with(|| UInt160::from_script(&self.inner.bytes))
    }

    fn boundaries(&self) -> VmResult<Rc<Vec<usize>>> {
        if let Some(existing) = self.inner.boundaries.borrow().as_ref() {
            return Ok(Rc::clone(existing));
        }
        let mut offsets = Vec::new();
        let mut position = 0;
        while position < self.len() {
            let instruction = Instruction::parse(&self.inner.bytes, position)?;
            offsets.push(position);
            position = instruction.next_position();
        }
        let offsets = Rc::new(offsets);
        *self.inner.boundaries.borrow_mut() = Some(Rc::clone(&offsets));
        Ok(offsets)
    }

    /// Number of instructions in the script.
    pub fn instruction_count(&self) -> VmResult<usize> {
        Ok(self.boundaries()?.len())
    }

    /// True when `position` starts an instruction or equals the script
    /// length (the implicit RET position).
    pub fn is_boundary(&self, position: usize) -> VmResult<bool> {
        if position == self.len() {
            return Ok(true);
        }
        Ok(self.boundaries()?.binary_search(&position).is_ok())
    }

    /// Decodes the instruction at `position`.
    pub fn instruction_at(&self, position: usize) -> VmResult<Instruction> {
        Instruction::parse(&self.inner.bytes, position)
    }

    /// Decodes every instruction in order.
    pub fn instructions(&self) -> VmResult<Vec<Instruction>> {
        self.boundaries()?
            .iter()
            .map(|&offset| self.instruction_at(offset))
            .collect()
    }

    /// Produces the tab-aligned disassembly `INDEX OPCODE PARAMETER`.
    ///
    /// `resolve_syscall` maps 32-bit interop ids to service names; without
    /// it, SYSCALL operands print as hex ids.
    pub fn print_ops(
        &self,
        resolve_syscall: Option<&dyn Fn(u32) -> Option<String>>,
    ) -> VmResult<String> {
        let mut out = String::new();
        for instruction in self.instructions()? {
            let parameter = if instruction.opcode == OpCode::SYSCALL {
                let id = instruction.operand_u32()?;
                resolve_syscall
                    .and_then(|resolve| resolve(id))
                    .unwrap_or_else(|| format!("{id:#010x}"))
            } else {
                instruction.operand_display()
            };
            if parameter.is_empty() {
                out.push_str(&format!("{}\t{}\n", instruction.pointer, instruction.opcode));
            } else {
                out.push_str(&format!(
                    "{}\t{}\t{}\n",
                    instruction.pointer, instruction.opcode, parameter
                ));
            }
        }
        Ok(out)
    }
}

impl PartialEq for Script {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner) || self.inner.bytes == other.inner.bytes
    }
}

impl Eq for Script {}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.inner.bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_and_count() {
        // PUSH1 PUSH2 ADD PUSH6 ADD
        let script = Script::new(vec![0x11, 0x12, 0x9e, 0x16, 0x9e]).unwrap();
        assert_eq!(script.instruction_count().unwrap(), 5);
        assert!(script.is_boundary(2).unwrap());
        assert!(script.is_boundary(5).unwrap());
    }

    #[test]
    fn boundary_inside_operand_is_rejected() {
        // PUSHDATA1 3 "abc"; RET
        let script = Script::new(vec![0x0c, 0x03, b'a', b'b', b'c', 0x40]).unwrap();
        assert!(script.is_boundary(0).unwrap());
        assert!(!script.is_boundary(1).unwrap());
        assert!(!script.is_boundary(3).unwrap());
        assert!(script.is_boundary(5).unwrap());
    }

    #[test]
    fn strict_validation_rejects_truncation() {
        assert!(Script::new(vec![0x0c, 0x05, b'a']).is_err());
        // Relaxed construction defers the error.
        let relaxed = Script::new_relaxed(vec![0x0c, 0x05, b'a']);
        assert!(relaxed.instruction_at(0).is_err());
    }

    #[test]
    fn hash_is_cached_and_stable() {
        let script = Script::new(vec![0x11]).unwrap();
        assert_eq!(script.hash(), script.hash());
        assert_eq!(script.hash(), UInt160::from_script(&[0x11]));
    }

    #[test]
    fn disassembly_layout() {
        let script = Script::new(vec![0x11, 0x12, 0x9e]).unwrap();
        let listing = script.print_ops(None).unwrap();
        assert_eq!(listing, "0\tPUSH1\n1\tPUSH2\n2\tADD\n");
    }

    #[test]
    fn disassembly_resolves_syscalls() {
        // SYSCALL 0x01020304
        let script = Script::new(vec![0x41, 0x04, 0x03, 0x02, 0x01]).unwrap();
        let resolver = |id: u32| (id == 0x01020304).then(|| "System.Runtime.Log".to_string());
        let listing = script.print_ops(Some(&resolver)).unwrap();
        assert_eq!(listing, "0\tSYSCALL\tSystem.Runtime.Log\n");
    }
}
