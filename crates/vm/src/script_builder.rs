//! Programmatic bytecode construction.

use crate::error::{VmError, VmResult};
use crate::op_code::OpCode;
use crate::script::Script;
use crate::stack_item::integer_to_bytes;
use neodbg_config::MAX_ITEM_SIZE;
use num_bigint::BigInt;
use sha_id::syscall_id;

/// Builds VM scripts instruction by instruction.
#[derive(Debug, Default)]
pub struct ScriptBuilder {
    bytes: Vec<u8>,
}

impl ScriptBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current script length.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when nothing has been emitted.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Emits a bare opcode.
    pub fn emit(&mut self, opcode: OpCode) -> &mut Self {
        self.bytes.push(opcode as u8);
        self
    }

    /// Emits an opcode with a fixed operand.
    pub fn emit_with(&mut self, opcode: OpCode, operand: &[u8]) -> &mut Self {
        self.bytes.push(opcode as u8);
        self.bytes.extend_from_slice(operand);
        self
    }

    /// Emits the shortest push for `value`.
    pub fn emit_push_int(&mut self, value: impl Into<BigInt>) -> VmResult<&mut Self> {
        let value = value.into();
        if let Ok(small) = i8::try_from(&value) {
            if (-1..=16).contains(&(small as i16)) {
                let opcode = if small == -1 {
                    OpCode::PUSHM1
                } else {
                    OpCode::try_from(OpCode::PUSH0 as u8 + small as u8)?
                };
                return Ok(self.emit(opcode));
            }
        }
        let bytes = integer_to_bytes(&value);
        let (opcode, width) = match bytes.len() {
            0..=1 => (OpCode::PUSHINT8, 1),
            2 => (OpCode::PUSHINT16, 2),
            3..=4 => (OpCode::PUSHINT32, 4),
            5..=8 => (OpCode::PUSHINT64, 8),
            9..=16 => (OpCode::PUSHINT128, 16),
            17..=32 => (OpCode::PUSHINT256, 32),
            _ => return Err(VmError::too_large("integer overflows 32 bytes")),
        };
        // Sign-extend to the operand width.
        let filler = if value.sign() == num_bigint::Sign::Minus {
            0xff
        } else {
            0x00
        };
        let mut operand = bytes;
        operand.resize(width, filler);
        Ok(self.emit_with(opcode, &operand))
    }

    /// Emits a boolean push.
    pub fn emit_push_bool(&mut self, value: bool) -> &mut Self {
        self.emit(if value { OpCode::PUSHT } else { OpCode::PUSHF })
    }

    /// Emits a data push with the smallest PUSHDATA form.
    pub fn emit_push_bytes(&mut self, data: &[u8]) -> VmResult<&mut Self> {
        if data.len() > MAX_ITEM_SIZE {
            return Err(VmError::too_large("push data over size limit"));
        }
        if data.len() < 0x100 {
            self.bytes.push(OpCode::PUSHDATA1 as u8);
            self.bytes.push(data.len() as u8);
        } else {
            self.bytes.push(OpCode::PUSHDATA2 as u8);
            self.bytes
                .extend_from_slice(&(data.len() as u16).to_le_bytes());
        }
        self.bytes.extend_from_slice(data);
        Ok(self)
    }

    /// Emits a UTF-8 string push.
    pub fn emit_push_string(&mut self, value: &str) -> VmResult<&mut Self> {
        self.emit_push_bytes(value.as_bytes())
    }

    /// Emits a null push.
    pub fn emit_push_null(&mut self) -> &mut Self {
        self.emit(OpCode::PUSHNULL)
    }

    /// Emits a SYSCALL of the named service.
    pub fn emit_syscall(&mut self, name: &str) -> &mut Self {
        let id = syscall_id(name);
        self.bytes.push(OpCode::SYSCALL as u8);
        self.bytes.extend_from_slice(&id.to_le_bytes());
        self
    }

    /// Emits a long-form jump with a placeholder offset, returning the
    /// offset position for later patching.
    pub fn emit_jump(&mut self, opcode: OpCode, offset: i32) -> &mut Self {
        self.bytes.push(opcode as u8);
        self.bytes.extend_from_slice(&offset.to_le_bytes());
        self
    }

    /// Finishes the script, validating every instruction.
    pub fn build(self) -> VmResult<Script> {
        Script::new(self.bytes)
    }

    /// The raw bytes emitted so far.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}

/// Interop id derivation, shared with the syscall catalogue.
pub mod sha_id {
    /// The 32-bit id of an interop service: the first four bytes of
    /// SHA-256 over the canonical name, interpreted little-endian.
    pub fn syscall_id(name: &str) -> u32 {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(name.as_bytes());
        u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution_engine::ExecutionEngine;
    use crate::vm_state::VMState;

    #[test]
    fn small_ints_use_push_opcodes() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(3).unwrap();
        assert_eq!(builder.to_bytes(), vec![0x13]);
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(-1).unwrap();
        assert_eq!(builder.to_bytes(), vec![0x0f]);
    }

    #[test]
    fn wide_ints_sign_extend() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(-300).unwrap();
        // PUSHINT16 with LE -300
        assert_eq!(builder.to_bytes(), vec![0x01, 0xd4, 0xfe]);
    }

    #[test]
    fn built_scripts_execute() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(20).unwrap();
        builder.emit_push_int(22).unwrap();
        builder.emit(OpCode::ADD);
        let script = builder.build().unwrap();

        let mut engine = ExecutionEngine::new();
        engine.load_script(script, -1).unwrap();
        assert_eq!(engine.continue_execution(), VMState::Halt);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().try_integer().unwrap(),
            42.into()
        );
    }

    #[test]
    fn pushdata_form_scales() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_bytes(&[0xaa; 300]).unwrap();
        let bytes = builder.to_bytes();
        assert_eq!(bytes[0], OpCode::PUSHDATA2 as u8);
        assert_eq!(u16::from_le_bytes([bytes[1], bytes[2]]), 300);
    }

    #[test]
    fn syscall_id_is_sha_prefix() {
        // Stable across calls and distinct across names.
        let a = sha_id::syscall_id("System.Runtime.Log");
        let b = sha_id::syscall_id("System.Runtime.Notify");
        assert_ne!(a, b);
        assert_eq!(a, sha_id::syscall_id("System.Runtime.Log"));
    }
}
