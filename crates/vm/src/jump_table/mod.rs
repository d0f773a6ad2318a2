//! Instruction dispatch, split by opcode category.

mod bitwise;
mod compound;
mod control;
mod numeric;
mod push;
mod slot;
mod splice;
mod stack;
mod types;

use crate::error::VmResult;
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;

/// Executes one decoded instruction against the engine.
pub fn execute(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    use OpCode::*;
    match instruction.opcode {
        PUSHINT8 | PUSHINT16 | PUSHINT32 | PUSHINT64 | PUSHINT128 | PUSHINT256 | PUSHT | PUSHF
        | PUSHA | PUSHNULL | PUSHDATA1 | PUSHDATA2 | PUSHDATA4 | PUSHM1 | PUSH0 | PUSH1
        | PUSH2 | PUSH3 | PUSH4 | PUSH5 | PUSH6 | PUSH7 | PUSH8 | PUSH9 | PUSH10 | PUSH11
        | PUSH12 | PUSH13 | PUSH14 | PUSH15 | PUSH16 => push::execute(engine, instruction),

        NOP | JMP | JMP_L | JMPIF | JMPIF_L | JMPIFNOT | JMPIFNOT_L | JMPEQ | JMPEQ_L | JMPNE
        | JMPNE_L | JMPGT | JMPGT_L | JMPGE | JMPGE_L | JMPLT | JMPLT_L | JMPLE | JMPLE_L
        | CALL | CALL_L | CALLA | CALLT | ABORT | ASSERT | THROW | TRY | TRY_L | ENDTRY
        | ENDTRY_L | ENDFINALLY | RET | SYSCALL | ABORTMSG | ASSERTMSG => {
            control::execute(engine, instruction)
        }

        DEPTH | DROP | NIP | XDROP | CLEAR | DUP | OVER | PICK | TUCK | SWAP | ROT | ROLL
        | REVERSE3 | REVERSE4 | REVERSEN => stack::execute(engine, instruction),

        INITSSLOT | INITSLOT | LDSFLD0 | LDSFLD1 | LDSFLD2 | LDSFLD3 | LDSFLD4 | LDSFLD5
        | LDSFLD6 | LDSFLD | STSFLD0 | STSFLD1 | STSFLD2 | STSFLD3 | STSFLD4 | STSFLD5
        | STSFLD6 | STSFLD | LDLOC0 | LDLOC1 | LDLOC2 | LDLOC3 | LDLOC4 | LDLOC5 | LDLOC6
        | LDLOC | STLOC0 | STLOC1 | STLOC2 | STLOC3 | STLOC4 | STLOC5 | STLOC6 | STLOC
        | LDARG0 | LDARG1 | LDARG2 | LDARG3 | LDARG4 | LDARG5 | LDARG6 | LDARG | STARG0
        | STARG1 | STARG2 | STARG3 | STARG4 | STARG5 | STARG6 | STARG => {
            slot::execute(engine, instruction)
        }

        NEWBUFFER | MEMCPY | CAT | SUBSTR | LEFT | RIGHT => splice::execute(engine, instruction),

        INVERT | AND | OR | XOR | EQUAL | NOTEQUAL => bitwise::execute(engine, instruction),

        SIGN | ABS | NEGATE | INC | DEC | ADD | SUB | MUL | DIV | MOD | POW | SQRT | MODMUL
        | MODPOW | SHL | SHR | NOT | BOOLAND | BOOLOR | NZ | NUMEQUAL | NUMNOTEQUAL | LT | LE
        | GT | GE | MIN | MAX | WITHIN => numeric::execute(engine, instruction),

        PACKMAP | PACKSTRUCT | PACK | UNPACK | NEWARRAY0 | NEWARRAY | NEWARRAY_T | NEWSTRUCT0
        | NEWSTRUCT | NEWMAP | SIZE | HASKEY | KEYS | VALUES | PICKITEM | APPEND | SETITEM
        | REVERSEITEMS | REMOVE | CLEARITEMS | POPITEM => compound::execute(engine, instruction),

        ISNULL | ISTYPE | CONVERT => types::execute(engine, instruction),
    }
}
