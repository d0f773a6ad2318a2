//! Arithmetic instructions over arbitrary-precision integers.

use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::{check_integer, StackItem};
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

pub(super) fn execute(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    use OpCode::*;
    match instruction.opcode {
        SIGN => unary(engine, |value| Ok(value.signum())),
        ABS => unary(engine, |value| Ok(value.abs())),
        NEGATE => unary(engine, |value| Ok(-value)),
        INC => unary(engine, |value| Ok(value + 1)),
        DEC => unary(engine, |value| Ok(value - 1)),
        ADD => binary(engine, |a, b| Ok(a + b)),
        SUB => binary(engine, |a, b| Ok(a - b)),
        MUL => binary(engine, |a, b| Ok(a * b)),
        DIV => binary(engine, |a, b| {
            if b.is_zero() {
                return Err(VmError::Arithmetic {
                    operation: "DIV",
                    message: "division by zero".into(),
                });
            }
            Ok(a / b)
        }),
        MOD => binary(engine, |a, b| {
            if b.is_zero() {
                return Err(VmError::Arithmetic {
                    operation: "MOD",
                    message: "division by zero".into(),
                });
            }
            Ok(a % b)
        }),
        POW => {
            let exponent = engine.pop()?.try_integer()?;
            let base = engine.pop()?.try_integer()?;
            let exponent = exponent.to_u32().ok_or(VmError::Arithmetic {
                operation: "POW",
                message: "exponent out of range".into(),
            })?;
            let result = base.pow(exponent);
            check_integer(&result)?;
            engine.push(StackItem::Integer(result))
        }
        SQRT => unary(engine, |value| {
            if value.is_negative() {
                return Err(VmError::Arithmetic {
                    operation: "SQRT",
                    message: "negative value".into(),
                });
            }
            Ok(value.sqrt())
        }),
        MODMUL => {
            let modulus = engine.pop()?.try_integer()?;
            let right = engine.pop()?.try_integer()?;
            let left = engine.pop()?.try_integer()?;
            if modulus.is_zero() {
                return Err(VmError::Arithmetic {
                    operation: "MODMUL",
                    message: "zero modulus".into(),
                });
            }
            engine.push(StackItem::Integer(left * right % modulus))
        }
        MODPOW => {
            let modulus = engine.pop()?.try_integer()?;
            let exponent = engine.pop()?.try_integer()?;
            let base = engine.pop()?.try_integer()?;
            if modulus.is_zero() {
                return Err(VmError::Arithmetic {
                    operation: "MODPOW",
                    message: "zero modulus".into(),
                });
            }
            // Exponent -1 requests a modular inverse.
            let result = if exponent == BigInt::from(-1) {
                modinv(&base, &modulus).ok_or(VmError::Arithmetic {
                    operation: "MODPOW",
                    message: "no modular inverse".into(),
                })?
            } else {
                if exponent.is_negative() {
                    return Err(VmError::Arithmetic {
                        operation: "MODPOW",
                        message: "negative exponent".into(),
                    });
                }
                base.modpow(&exponent, &modulus)
            };
            engine.push(StackItem::Integer(result))
        }
        SHL => shift(engine, true),
        SHR => shift(engine, false),
        NOT => {
            let value = engine.pop()?.as_bool();
            engine.push(StackItem::from_bool(!value))
        }
        BOOLAND => {
            let right = engine.pop()?.as_bool();
            let left = engine.pop()?.as_bool();
            engine.push(StackItem::from_bool(left && right))
        }
        BOOLOR => {
            let right = engine.pop()?.as_bool();
            let left = engine.pop()?.as_bool();
            engine.push(StackItem::from_bool(left || right))
        }
        NZ => {
            let value = engine.pop()?.try_integer()?;
            engine.push(StackItem::from_bool(!value.is_zero()))
        }
        NUMEQUAL => compare(engine, |a, b| a == b),
        NUMNOTEQUAL => compare(engine, |a, b| a != b),
        LT => compare_with_null(engine, |a, b| a < b),
        LE => compare_with_null(engine, |a, b| a <= b),
        GT => compare_with_null(engine, |a, b| a > b),
        GE => compare_with_null(engine, |a, b| a >= b),
        MIN => binary(engine, |a, b| Ok(a.min(b))),
        MAX => binary(engine, |a, b| Ok(a.max(b))),
        WITHIN => {
            let upper = engine.pop()?.try_integer()?;
            let lower = engine.pop()?.try_integer()?;
            let value = engine.pop()?.try_integer()?;
            engine.push(StackItem::from_bool(lower <= value && value < upper))
        }
        other => Err(VmError::invalid_operation(format!(
            "{other} is not an arithmetic instruction"
        ))),
    }
}

fn unary(
    engine: &mut ExecutionEngine,
    op: impl Fn(BigInt) -> VmResult<BigInt>,
) -> VmResult<()> {
    let value = engine.pop()?.try_integer()?;
    let result = op(value)?;
    check_integer(&result)?;
    engine.push(StackItem::Integer(result))
}

fn binary(
    engine: &mut ExecutionEngine,
    op: impl Fn(BigInt, BigInt) -> VmResult<BigInt>,
) -> VmResult<()> {
    let right = engine.pop()?.try_integer()?;
    let left = engine.pop()?.try_integer()?;
    let result = op(left, right)?;
    check_integer(&result)?;
    engine.push(StackItem::Integer(result))
}

fn compare(engine: &mut ExecutionEngine, op: impl Fn(&BigInt, &BigInt) -> bool) -> VmResult<()> {
    let right = engine.pop()?.try_integer()?;
    let left = engine.pop()?.try_integer()?;
    engine.push(StackItem::from_bool(op(&left, &right)))
}

/// Relational comparisons treat a null operand as unordered: always false.
fn compare_with_null(
    engine: &mut ExecutionEngine,
    op: impl Fn(&BigInt, &BigInt) -> bool,
) -> VmResult<()> {
    let right = engine.pop()?;
    let left = engine.pop()?;
    if left.is_null() || right.is_null() {
        return engine.push(StackItem::from_bool(false));
    }
    let result = op(&left.try_integer()?, &right.try_integer()?);
    engine.push(StackItem::from_bool(result))
}

fn shift(engine: &mut ExecutionEngine, left_shift: bool) -> VmResult<()> {
    let shift = engine.pop()?.try_integer()?;
    let value = engine.pop()?.try_integer()?;
    let shift = shift.to_u32().filter(|&s| s <= 256).ok_or_else(|| {
        VmError::Arithmetic {
            operation: if left_shift { "SHL" } else { "SHR" },
            message: format!("shift {shift} out of range"),
        }
    })?;
    let result = if left_shift {
        value << shift
    } else {
        value >> shift
    };
    check_integer(&result)?;
    engine.push(StackItem::Integer(result))
}

fn modinv(value: &BigInt, modulus: &BigInt) -> Option<BigInt> {
    // Extended Euclid; modulus is non-zero here.
    let (mut old_r, mut r) = (value.clone(), modulus.clone());
    let (mut old_s, mut s) = (BigInt::from(1), BigInt::from(0));
    while !r.is_zero() {
        let quotient = &old_r / &r;
        let next_r = &old_r - &quotient * &r;
        old_r = std::mem::replace(&mut r, next_r);
        let next_s = &old_s - &quotient * &s;
        old_s = std::mem::replace(&mut s, next_s);
    }
    if old_r.abs() != BigInt::from(1) {
        return None;
    }
    // old_r may be -1; fold its sign into the coefficient.
    let mut inverse = old_s * old_r.signum();
    inverse %= modulus;
    if inverse.is_negative() {
        inverse += modulus.abs();
    }
    Some(inverse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution_engine::ExecutionEngine;
    use crate::script::Script;
    use crate::vm_state::VMState;

    fn run(script: Vec<u8>) -> ExecutionEngine {
        let mut engine = ExecutionEngine::new();
        engine.load_script(Script::new(script).unwrap(), -1).unwrap();
        assert_eq!(engine.continue_execution(), VMState::Halt);
        engine
    }

    fn top_int(engine: &ExecutionEngine) -> BigInt {
        engine.result_stack().peek(0).unwrap().try_integer().unwrap()
    }

    #[test]
    fn add_two_small_numbers() {
        // PUSH1 PUSH2 ADD
        let engine = run(vec![0x11, 0x12, 0x9e]);
        assert_eq!(top_int(&engine), 3.into());
    }

    #[test]
    fn add_chain() {
        // PUSH1 PUSH2 ADD PUSH6 ADD = 9
        let engine = run(vec![0x11, 0x12, 0x9e, 0x16, 0x9e]);
        assert_eq!(top_int(&engine), 9.into());
    }

    #[test]
    fn division_truncates_toward_zero() {
        // PUSHINT8 -7; PUSH2; DIV
        let engine = run(vec![0x00, 0xf9, 0x12, 0xa1]);
        assert_eq!(top_int(&engine), (-3).into());
    }

    #[test]
    fn division_by_zero_faults() {
        let mut engine = ExecutionEngine::new();
        engine
            .load_script(Script::new(vec![0x11, 0x10, 0xa1]).unwrap(), -1)
            .unwrap();
        assert_eq!(engine.continue_execution(), VMState::Fault);
        assert!(engine.fault_message().unwrap().contains("division by zero"));
    }

    #[test]
    fn overflow_faults() {
        // PUSHINT256 max positive; PUSH1; SHL 1 would overflow... use INC
        let mut bytes = vec![0x05];
        bytes.extend_from_slice(&[0xff; 31]);
        bytes.push(0x7f);
        bytes.push(0x9c); // INC
        let mut engine = ExecutionEngine::new();
        engine.load_script(Script::new(bytes).unwrap(), -1).unwrap();
        assert_eq!(engine.continue_execution(), VMState::Fault);
        assert!(engine.fault_message().unwrap().contains("overflows"));
    }

    #[test]
    fn comparisons_with_null_are_false() {
        // PUSH1; PUSHNULL; LT
        let engine = run(vec![0x11, 0x0b, 0xb5]);
        assert!(!engine.result_stack().peek(0).unwrap().as_bool());
    }

    #[test]
    fn within_bounds() {
        // PUSH5; PUSH1; PUSH6; WITHIN  (1 <= 5 < 6)
        let engine = run(vec![0x15, 0x11, 0x16, 0xbb]);
        assert!(engine.result_stack().peek(0).unwrap().as_bool());
    }

    #[test]
    fn modinv_basic() {
        assert_eq!(
            modinv(&BigInt::from(3), &BigInt::from(7)),
            Some(BigInt::from(5))
        );
        assert_eq!(modinv(&BigInt::from(2), &BigInt::from(4)), None);
    }

    #[test]
    fn sqrt_floor() {
        // PUSH8 SQRT = 2
        let engine = run(vec![0x18, 0xa4]);
        assert_eq!(top_int(&engine), 2.into());
    }
}
