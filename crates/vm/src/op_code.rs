//! Opcode definitions for the Neo Virtual Machine.
//!
//! One entry per instruction: discriminant byte, mnemonic, and operand
//! shape (fixed width or length-prefixed).

use crate::error::VmError;

/// Operand shape of an opcode: either a fixed number of bytes or a
/// little-endian length prefix followed by that many bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OperandSize {
    /// Fixed operand width in bytes.
    pub size: usize,
    /// Width of the length prefix, when the operand is variable.
    pub prefix: usize,
}

impl OperandSize {
    /// No operand.
    pub const NONE: OperandSize = OperandSize { size: 0, prefix: 0 };

    /// A fixed-width operand.
    pub const fn fixed(size: usize) -> Self {
        Self { size, prefix: 0 }
    }

    /// A length-prefixed operand.
    pub const fn prefixed(prefix: usize) -> Self {
        Self { size: 0, prefix }
    }

    /// True when the operand is length-prefixed.
    pub fn is_prefixed(&self) -> bool {
        self.prefix > 0
    }
}

macro_rules! op_codes {
    ($($name:ident = $value:expr, $operand:expr;)*) => {
        /// An instruction opcode.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        #[allow(non_camel_case_types)]
        pub enum OpCode {
            $(
                #[doc = stringify!($name)]
                $name = $value,
            )*
        }

        impl OpCode {
            /// The mnemonic of this opcode.
            pub fn name(self) -> &'static str {
                match self {
                    $(OpCode::$name => stringify!($name),)*
                }
            }

            /// The operand shape of this opcode.
            pub fn operand_size(self) -> OperandSize {
                match self {
                    $(OpCode::$name => $operand,)*
                }
            }
        }

        impl TryFrom<u8> for OpCode {
            type Error = VmError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok(OpCode::$name),)*
                    other => Err(VmError::InvalidOpcode { opcode: other }),
                }
            }
        }
    };
}

op_codes! {
    // Constants
    PUSHINT8 = 0x00, OperandSize::fixed(1);
    PUSHINT16 = 0x01, OperandSize::fixed(2);
    PUSHINT32 = 0x02, OperandSize::fixed(4);
    PUSHINT64 = 0x03, OperandSize::fixed(8);
    PUSHINT128 = 0x04, OperandSize::fixed(16);
    PUSHINT256 = 0x05, OperandSize::fixed(32);
    PUSHT = 0x08, OperandSize::NONE;
    PUSHF = 0x09, OperandSize::NONE;
    PUSHA = 0x0A, OperandSize::fixed(4);
    PUSHNULL = 0x0B, OperandSize::NONE;
    PUSHDATA1 = 0x0C, OperandSize::prefixed(1);
    PUSHDATA2 = 0x0D, OperandSize::prefixed(2);
    PUSHDATA4 = 0x0E, OperandSize::prefixed(4);
    PUSHM1 = 0x0F, OperandSize::NONE;
    PUSH0 = 0x10, OperandSize::NONE;
    PUSH1 = 0x11, OperandSize::NONE;
    PUSH2 = 0x12, OperandSize::NONE;
    PUSH3 = 0x13, OperandSize::NONE;
    PUSH4 = 0x14, OperandSize::NONE;
    PUSH5 = 0x15, OperandSize::NONE;
    PUSH6 = 0x16, OperandSize::NONE;
    PUSH7 = 0x17, OperandSize::NONE;
    PUSH8 = 0x18, OperandSize::NONE;
    PUSH9 = 0x19, OperandSize::NONE;
    PUSH10 = 0x1A, OperandSize::NONE;
    PUSH11 = 0x1B, OperandSize::NONE;
    PUSH12 = 0x1C, OperandSize::NONE;
    PUSH13 = 0x1D, OperandSize::NONE;
    PUSH14 = 0x1E, OperandSize::NONE;
    PUSH15 = 0x1F, OperandSize::NONE;
    PUSH16 = 0x20, OperandSize::NONE;

    // Flow control
    NOP = 0x21, OperandSize::NONE;
    JMP = 0x22, OperandSize::fixed(1);
    JMP_L = 0x23, OperandSize::fixed(4);
    JMPIF = 0x24, OperandSize::fixed(1);
    JMPIF_L = 0x25, OperandSize::fixed(4);
    JMPIFNOT = 0x26, OperandSize::fixed(1);
    JMPIFNOT_L = 0x27, OperandSize::fixed(4);
    JMPEQ = 0x28, OperandSize::fixed(1);
    JMPEQ_L = 0x29, OperandSize::fixed(4);
    JMPNE = 0x2A, OperandSize::fixed(1);
    JMPNE_L = 0x2B, OperandSize::fixed(4);
    JMPGT = 0x2C, OperandSize::fixed(1);
    JMPGT_L = 0x2D, OperandSize::fixed(4);
    JMPGE = 0x2E, OperandSize::fixed(1);
    JMPGE_L = 0x2F, OperandSize::fixed(4);
    JMPLT = 0x30, OperandSize::fixed(1);
    JMPLT_L = 0x31, OperandSize::fixed(4);
    JMPLE = 0x32, OperandSize::fixed(1);
    JMPLE_L = 0x33, OperandSize::fixed(4);
    CALL = 0x34, OperandSize::fixed(1);
    CALL_L = 0x35, OperandSize::fixed(4);
    CALLA = 0x36, OperandSize::NONE;
    CALLT = 0x37, OperandSize::fixed(2);
    ABORT = 0x38, OperandSize::NONE;
    ASSERT = 0x39, OperandSize::NONE;
    THROW = 0x3A, OperandSize::NONE;
    TRY = 0x3B, OperandSize::fixed(2);
    TRY_L = 0x3C, OperandSize::fixed(8);
    ENDTRY = 0x3D, OperandSize::fixed(1);
    ENDTRY_L = 0x3E, OperandSize::fixed(4);
    ENDFINALLY = 0x3F, OperandSize::NONE;
    RET = 0x40, OperandSize::NONE;
    SYSCALL = 0x41, OperandSize::fixed(4);

    // Stack
    DEPTH = 0x43, OperandSize::NONE;
    DROP = 0x45, OperandSize::NONE;
    NIP = 0x46, OperandSize::NONE;
    XDROP = 0x48, OperandSize::NONE;
    CLEAR = 0x49, OperandSize::NONE;
    DUP = 0x4A, OperandSize::NONE;
    OVER = 0x4B, OperandSize::NONE;
    PICK = 0x4D, OperandSize::NONE;
    TUCK = 0x4E, OperandSize::NONE;
    SWAP = 0x50, OperandSize::NONE;
    ROT = 0x51, OperandSize::NONE;
    ROLL = 0x52, OperandSize::NONE;
    REVERSE3 = 0x53, OperandSize::NONE;
    REVERSE4 = 0x54, OperandSize::NONE;
    REVERSEN = 0x55, OperandSize::NONE;

    // Slot
    INITSSLOT = 0x56, OperandSize::fixed(1);
    INITSLOT = 0x57, OperandSize::fixed(2);
    LDSFLD0 = 0x58, OperandSize::NONE;
    LDSFLD1 = 0x59, OperandSize::NONE;
    LDSFLD2 = 0x5A, OperandSize::NONE;
    LDSFLD3 = 0x5B, OperandSize::NONE;
    LDSFLD4 = 0x5C, OperandSize::NONE;
    LDSFLD5 = 0x5D, OperandSize::NONE;
    LDSFLD6 = 0x5E, OperandSize::NONE;
    LDSFLD = 0x5F, OperandSize::fixed(1);
    STSFLD0 = 0x60, OperandSize::NONE;
    STSFLD1 = 0x61, OperandSize::NONE;
    STSFLD2 = 0x62, OperandSize::NONE;
    STSFLD3 = 0x63, OperandSize::NONE;
    STSFLD4 = 0x64, OperandSize::NONE;
    STSFLD5 = 0x65, OperandSize::NONE;
    STSFLD6 = 0x66, OperandSize::NONE;
    STSFLD = 0x67, OperandSize::fixed(1);
    LDLOC0 = 0x68, OperandSize::NONE;
    LDLOC1 = 0x69, OperandSize::NONE;
    LDLOC2 = 0x6A, OperandSize::NONE;
    LDLOC3 = 0x6B, OperandSize::NONE;
    LDLOC4 = 0x6C, OperandSize::NONE;
    LDLOC5 = 0x6D, OperandSize::NONE;
    LDLOC6 = 0x6E, OperandSize::NONE;
    LDLOC = 0x6F, OperandSize::fixed(1);
    STLOC0 = 0x70, OperandSize::NONE;
    STLOC1 = 0x71, OperandSize::NONE;
    STLOC2 = 0x72, OperandSize::NONE;
    STLOC3 = 0x73, OperandSize::NONE;
    STLOC4 = 0x74, OperandSize::NONE;
    STLOC5 = 0x75, OperandSize::NONE;
    STLOC6 = 0x76, OperandSize::NONE;
    STLOC = 0x77, OperandSize::fixed(1);
    LDARG0 = 0x78, OperandSize::NONE;
    LDARG1 = 0x79, OperandSize::NONE;
    LDARG2 = 0x7A, OperandSize::NONE;
    LDARG3 = 0x7B, OperandSize::NONE;
    LDARG4 = 0x7C, OperandSize::NONE;
    LDARG5 = 0x7D, OperandSize::NONE;
    LDARG6 = 0x7E, OperandSize::NONE;
    LDARG = 0x7F, OperandSize::fixed(1);
    STARG0 = 0x80, OperandSize::NONE;
    STARG1 = 0x81, OperandSize::NONE;
    STARG2 = 0x82, OperandSize::NONE;
    STARG3 = 0x83, OperandSize::NONE;
    STARG4 = 0x84, OperandSize::NONE;
    STARG5 = 0x85, OperandSize::NONE;
    STARG6 = 0x86, OperandSize::NONE;
    STARG = 0x87, OperandSize::fixed(1);

    // Splice
    NEWBUFFER = 0x88, OperandSize::NONE;
    MEMCPY = 0x89, OperandSize::NONE;
    CAT = 0x8B, OperandSize::NONE;
    SUBSTR = 0x8C, OperandSize::NONE;
    LEFT = 0x8D, OperandSize::NONE;
    RIGHT = 0x8E, OperandSize::NONE;

    // Bitwise logic
    INVERT = 0x90, OperandSize::NONE;
    AND = 0x91, OperandSize::NONE;
    OR = 0x92, OperandSize::NONE;
    XOR = 0x93, OperandSize::NONE;
    EQUAL = 0x97, OperandSize::NONE;
    NOTEQUAL = 0x98, OperandSize::NONE;

    // Arithmetic
    SIGN = 0x99, OperandSize::NONE;
    ABS = 0x9A, OperandSize::NONE;
    NEGATE = 0x9B, OperandSize::NONE;
    INC = 0x9C, OperandSize::NONE;
    DEC = 0x9D, OperandSize::NONE;
    ADD = 0x9E, OperandSize::NONE;
    SUB = 0x9F, OperandSize::NONE;
    MUL = 0xA0, OperandSize::NONE;
    DIV = 0xA1, OperandSize::NONE;
    MOD = 0xA2, OperandSize::NONE;
    POW = 0xA3, OperandSize::NONE;
    SQRT = 0xA4, OperandSize::NONE;
    MODMUL = 0xA5, OperandSize::NONE;
    MODPOW = 0xA6, OperandSize::NONE;
    SHL = 0xA8, OperandSize::NONE;
    SHR = 0xA9, OperandSize::NONE;
    NOT = 0xAA, OperandSize::NONE;
    BOOLAND = 0xAB, OperandSize::NONE;
    BOOLOR = 0xAC, OperandSize::NONE;
    NZ = 0xB1, OperandSize::NONE;
    NUMEQUAL = 0xB3, OperandSize::NONE;
    NUMNOTEQUAL = 0xB4, OperandSize::NONE;
    LT = 0xB5, OperandSize::NONE;
    LE = 0xB6, OperandSize::NONE;
    GT = 0xB7, OperandSize::NONE;
    GE = 0xB8, OperandSize::NONE;
    MIN = 0xB9, OperandSize::NONE;
    MAX = 0xBA, OperandSize::NONE;
    WITHIN = 0xBB, OperandSize::NONE;

    // Compound types
    PACKMAP = 0xBE, OperandSize::NONE;
    PACKSTRUCT = 0xBF, OperandSize::NONE;
    PACK = 0xC0, OperandSize::NONE;
    UNPACK = 0xC1, OperandSize::NONE;
    NEWARRAY0 = 0xC2, OperandSize::NONE;
    NEWARRAY = 0xC3, OperandSize::NONE;
    NEWARRAY_T = 0xC4, OperandSize::fixed(1);
    NEWSTRUCT0 = 0xC5, OperandSize::NONE;
    NEWSTRUCT = 0xC6, OperandSize::NONE;
    NEWMAP = 0xC8, OperandSize::NONE;
    SIZE = 0xCA, OperandSize::NONE;
    HASKEY = 0xCB, OperandSize::NONE;
    KEYS = 0xCC, OperandSize::NONE;
    VALUES = 0xCD, OperandSize::NONE;
    PICKITEM = 0xCE, OperandSize::NONE;
    APPEND = 0xCF, OperandSize::NONE;
    SETITEM = 0xD0, OperandSize::NONE;
    REVERSEITEMS = 0xD1, OperandSize::NONE;
    REMOVE = 0xD2, OperandSize::NONE;
    CLEARITEMS = 0xD3, OperandSize::NONE;
    POPITEM = 0xD4, OperandSize::NONE;

    // Types
    ISNULL = 0xD8, OperandSize::NONE;
    ISTYPE = 0xD9, OperandSize::fixed(1);
    CONVERT = 0xDB, OperandSize::fixed(1);

    // Extensions
    ABORTMSG = 0xE0, OperandSize::NONE;
    ASSERTMSG = 0xE1, OperandSize::NONE;
}

impl OpCode {
    /// Base gas price of the opcode in datoshi, before the execution fee
    /// factor is applied. Individual opcodes may be overridden from the
    /// protocol config.
    pub fn base_price(self) -> i64 {
        use OpCode::*;
        match self {
            PUSHINT8 | PUSHINT16 | PUSHINT32 | PUSHINT64 | PUSHNULL | PUSHM1 | PUSH0 | PUSH1
            | PUSH2 | PUSH3 | PUSH4 | PUSH5 | PUSH6 | PUSH7 | PUSH8 | PUSH9 | PUSH10 | PUSH11
            | PUSH12 | PUSH13 | PUSH14 | PUSH15 | PUSH16 | PUSHT | PUSHF | NOP | ASSERT => 1,
            PUSHINT128 | PUSHINT256 | PUSHA | TRY | TRY_L | ENDTRY | ENDTRY_L | ENDFINALLY
            | INVERT | SIGN | ABS | NEGATE | INC | DEC | NOT | NZ | ISNULL => 1 << 2,
            PUSHDATA1 | AND | OR | XOR | ADD | SUB | BOOLAND | BOOLOR | NUMEQUAL | NUMNOTEQUAL
            | LT | LE | GT | GE | MIN | MAX | WITHIN | NEWMAP | ISTYPE => 1 << 3,
            PUSHDATA2 | JMP | JMP_L | JMPIF | JMPIF_L | JMPIFNOT | JMPIFNOT_L | JMPEQ | JMPEQ_L
            | JMPNE | JMPNE_L | JMPGT | JMPGT_L | JMPGE | JMPGE_L | JMPLT | JMPLT_L | JMPLE
            | JMPLE_L | CALL | CALL_L | CALLA | THROW | ABORT | RET | DEPTH | DROP | NIP
            | XDROP | CLEAR | DUP | OVER | PICK | TUCK | SWAP | ROT | ROLL | REVERSE3
            | REVERSE4 | REVERSEN | INITSSLOT | MUL | DIV | MOD | SHL | SHR | POW | MODMUL => 1 << 4,
            ABORTMSG | ASSERTMSG => 1 << 4,
            INITSLOT | LDSFLD0 | LDSFLD1 | LDSFLD2 | LDSFLD3 | LDSFLD4 | LDSFLD5 | LDSFLD6
            | LDSFLD | STSFLD0 | STSFLD1 | STSFLD2 | STSFLD3 | STSFLD4 | STSFLD5 | STSFLD6
            | STSFLD | LDLOC0 | LDLOC1 | LDLOC2 | LDLOC3 | LDLOC4 | LDLOC5 | LDLOC6 | LDLOC
            | STLOC0 | STLOC1 | STLOC2 | STLOC3 | STLOC4 | STLOC5 | STLOC6 | STLOC | LDARG0
            | LDARG1 | LDARG2 | LDARG3 | LDARG4 | LDARG5 | LDARG6 | LDARG | STARG0 | STARG1
            | STARG2 | STARG3 | STARG4 | STARG5 | STARG6 | STARG | NEWSTRUCT0 | SIZE | HASKEY
            | SQRT | MODPOW => 1 << 6,
            NEWBUFFER | KEYS | PICKITEM | APPEND | SETITEM | REVERSEITEMS | REMOVE
            | CLEARITEMS | POPITEM | NEWARRAY0 => 1 << 7,
            EQUAL | NOTEQUAL | MEMCPY | CAT | SUBSTR | LEFT | RIGHT | VALUES | PACKMAP
            | PACKSTRUCT | PACK | UNPACK | NEWARRAY | NEWARRAY_T | NEWSTRUCT | CONVERT => 1 << 11,
            PUSHDATA4 => 1 << 12,
            CALLT => 1 << 15,
            SYSCALL => 0, // priced by the interop catalogue
        }
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
