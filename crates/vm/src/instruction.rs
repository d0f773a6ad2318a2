//! Instruction representation and parsing.

use crate::error::{VmError, VmResult};
use crate::op_code::OpCode;

/// A decoded instruction: position, opcode and operand payload.
///
/// For length-prefixed opcodes (PUSHDATA*) the operand holds the payload
/// without its prefix; `size()` accounts for the prefix bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Offset of the opcode byte within the script.
    pub pointer: usize,
    /// The opcode.
    pub opcode: OpCode,
    /// The operand payload.
    pub operand: Vec<u8>,
}

impl Instruction {
    /// Parses the instruction at `position`.
    pub fn parse(script: &[u8], position: usize) -> VmResult<Self> {
        let &opcode_byte = script
            .get(position)
            .ok_or_else(|| VmError::parse("position out of bounds"))?;
        let opcode = OpCode::try_from(opcode_byte)?;
        let shape = opcode.operand_size();

        let operand_start = position + 1;
        let (payload_start, payload_len) = if shape.is_prefixed() {
            if operand_start + shape.prefix > script.len() {
                return Err(VmError::parse(format!(
                    "{} at {position} is missing its length prefix",
                    opcode.name()
                )));
            }
            let mut length = 0usize;
            for (i, &byte) in script[operand_start..operand_start + shape.prefix]
                .iter()
                .enumerate()
            {
                length |= (byte as usize) << (8 * i);
            }
            (operand_start + shape.prefix, length)
        } else {
            (operand_start, shape.size)
        };

        if payload_start + payload_len > script.len() {
            return Err(VmError::parse(format!(
                "{} at {position} overruns the script: needs {} bytes, {} remain",
                opcode.name(),
                payload_len,
                script.len().saturating_sub(payload_start)
            )));
        }

        Ok(Self {
            pointer: position,
            opcode,
            operand: script[payload_start..payload_start + payload_len].to_vec(),
        })
    }

    /// Total encoded size: opcode byte, prefix if any, and payload.
    pub fn size(&self) -> usize {
        1 + self.opcode.operand_size().prefix + self.operand.len()
    }

    /// Offset of the instruction that follows this one.
    pub fn next_position(&self) -> usize {
        self.pointer + self.size()
    }

    /// The operand as a signed 8-bit jump offset.
    pub fn operand_i8(&self) -> VmResult<i8> {
        match self.operand.as_slice() {
            [b] => Ok(*b as i8),
            _ => Err(self.operand_error("1-byte operand")),
        }
    }

    /// The operand as a signed 32-bit jump offset.
    pub fn operand_i32(&self) -> VmResult<i32> {
        match self.operand.as_slice() {
            [a, b, c, d] => Ok(i32::from_le_bytes([*a, *b, *c, *d])),
            _ => Err(self.operand_error("4-byte operand")),
        }
    }

    /// The first operand byte.
    pub fn operand_u8(&self) -> VmResult<u8> {
        self.operand
            .first()
            .copied()
            .ok_or_else(|| self.operand_error("1-byte operand"))
    }

    /// The second operand byte (INITSLOT arguments count).
    pub fn operand_u8_2(&self) -> VmResult<u8> {
        self.operand
            .get(1)
            .copied()
            .ok_or_else(|| self.operand_error("2-byte operand"))
    }

    /// The operand as an unsigned 16-bit token index.
    pub fn operand_u16(&self) -> VmResult<u16> {
        match self.operand.as_slice() {
            [a, b] => Ok(u16::from_le_bytes([*a, *b])),
            _ => Err(self.operand_error("2-byte operand")),
        }
    }

    /// The operand as an unsigned 32-bit value (SYSCALL id, PUSHA target).
    pub fn operand_u32(&self) -> VmResult<u32> {
        Ok(self.operand_i32()? as u32)
    }

    /// The two signed offsets of a TRY/TRY_L operand.
    pub fn operand_try_offsets(&self) -> VmResult<(i32, i32)> {
        match self.operand.as_slice() {
            [c, f] => Ok((*c as i8 as i32, *f as i8 as i32)),
            [a, b, c, d, e, f, g, h] => Ok((
                i32::from_le_bytes([*a, *b, *c, *d]),
                i32::from_le_bytes([*e, *f, *g, *h]),
            )),
            _ => Err(self.operand_error("TRY operand")),
        }
    }

    fn operand_error(&self, expected: &str) -> VmError {
        VmError::parse(format!(
            "{} at {}: expected {expected}, operand is {} bytes",
            self.opcode.name(),
            self.pointer,
            self.operand.len()
        ))
    }

    /// Renders the operand for disassembly: empty for no operand, signed
    /// offsets for jumps, quoted text when printable, hex otherwise.
    pub fn operand_display(&self) -> String {
        use OpCode::*;
        if self.operand.is_empty() {
            return String::new();
        }
        match self.opcode {
            JMP | JMPIF | JMPIFNOT | JMPEQ | JMPNE | JMPGT | JMPGE | JMPLT | JMPLE | CALL
            | ENDTRY => {
                let offset = self.operand[0] as i8 as i64;
                format!("{} ({offset})", self.pointer as i64 + offset)
            }
            JMP_L | JMPIF_L | JMPIFNOT_L | JMPEQ_L | JMPNE_L | JMPGT_L | JMPGE_L | JMPLT_L
            | JMPLE_L | CALL_L | ENDTRY_L | PUSHA => {
                let offset =
                    i32::from_le_bytes([self.operand[0], self.operand[1], self.operand[2], self.operand[3]])
                        as i64;
                format!("{} ({offset})", self.pointer as i64 + offset)
            }
            PUSHINT8 | PUSHINT16 | PUSHINT32 | PUSHINT64 | PUSHINT128 | PUSHINT256 => {
                num_bigint::BigInt::from_signed_bytes_le(&self.operand).to_string()
            }
            INITSSLOT | LDSFLD | STSFLD | LDLOC | STLOC | LDARG | STARG | NEWARRAY_T | ISTYPE
            | CONVERT => format!("{}", self.operand[0]),
            INITSLOT => format!("{} local, {} arg", self.operand[0], self.operand[1]),
            CALLT => format!("{}", u16::from_le_bytes([self.operand[0], self.operand[1]])),
            TRY | TRY_L => {
                let (catch_offset, finally_offset) =
                    self.operand_try_offsets().unwrap_or((0, 0));
                format!("catch {catch_offset}, finally {finally_offset}")
            }
            _ => {
                if !self.operand.is_empty()
                    && self
                        .operand
                        .iter()
                        .all(|&b| (0x20..0x7f).contains(&b))
                {
                    format!("\"{}\"", String::from_utf8_lossy(&self.operand))
                } else {
                    hex::encode(&self.operand)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple() {
        let script = [0x11, 0x12, 0x9e]; // PUSH1 PUSH2 ADD
        let instruction = Instruction::parse(&script, 2).unwrap();
        assert_eq!(instruction.opcode, OpCode::ADD);
        assert_eq!(instruction.size(), 1);
        assert_eq!(instruction.next_position(), 3);
    }

    #[test]
    fn parse_pushdata1() {
        let script = [0x0c, 0x03, b'a', b'b', b'c', 0x40];
        let instruction = Instruction::parse(&script, 0).unwrap();
        assert_eq!(instruction.opcode, OpCode::PUSHDATA1);
        assert_eq!(instruction.operand, b"abc");
        assert_eq!(instruction.size(), 5);
    }

    #[test]
    fn parse_rejects_truncated_operand() {
        let script = [0x0c, 0x05, b'a'];
        assert!(Instruction::parse(&script, 0).is_err());
        let script = [0x02, 0x01]; // PUSHINT32 with 1 byte
        assert!(Instruction::parse(&script, 0).is_err());
    }

    #[test]
    fn parse_rejects_unknown_opcode() {
        assert!(matches!(
            Instruction::parse(&[0x42], 0),
            Err(VmError::InvalidOpcode { opcode: 0x42 })
        ));
    }

    #[test]
    fn try_offsets() {
        let script = [0x3b, 0x05, 0x00]; // TRY catch=+5 finally=none
        let instruction = Instruction::parse(&script, 0).unwrap();
        assert_eq!(instruction.operand_try_offsets().unwrap(), (5, 0));
    }

    #[test]
    fn jump_display_is_absolute_with_relative() {
        let script = [0x21, 0x22, 0xfe]; // NOP; JMP -2
        let instruction = Instruction::parse(&script, 1).unwrap();
        assert_eq!(instruction.operand_display(), "-1 (-2)");
    }
}
