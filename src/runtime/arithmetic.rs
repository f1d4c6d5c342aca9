//! Value arithmetic
//!
//! Pure operations on atomic [`Value`]s. Operands arrive already converted to
//! a common type by the compiler. Problems the simulated program should hear
//! about come back as a [`Fault`] next to the (possibly invalid) result.

use crate::memory::Value;
use crate::parser::ast::{BinOp, UnOp};
use crate::runtime::EventKind;
use crate::types::{AtomicKind, Type};

/// A rule violation detected while computing a value
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Fault {
    pub kind: EventKind,
    pub message: String,
}

impl Fault {
    fn undefined(message: impl Into<String>) -> Self {
        Fault {
            kind: EventKind::UndefinedBehavior,
            message: message.into(),
        }
    }
}

/// Arithmetic, bitwise and shift operators on operands of type `ty`
pub(crate) fn binary(op: BinOp, left: &Value, right: &Value, ty: &Type) -> (Value, Option<Fault>) {
    let valid = left.valid && right.valid;
    let (result, fault) = if ty.is_floating() {
        floating(op, left.as_float(), right.as_float(), ty)
    } else {
        integral(op, left.as_int(), right.as_int(), ty)
    };
    let result = if valid { result } else { result.invalidated() };
    (result, fault)
}

fn floating(op: BinOp, a: f64, b: f64, ty: &Type) -> (Value, Option<Fault>) {
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return (
                    Value::float(a / b, ty.clone()),
                    Some(Fault::undefined("floating-point division by zero")),
                );
            }
            a / b
        }
        _ => return (Value::zero(ty.clone()).invalidated(), Some(Fault::undefined(format!("operator {} on a floating value", op.symbol())))),
    };
    (Value::float(result, ty.clone()), None)
}

fn integral(op: BinOp, a: i64, b: i64, ty: &Type) -> (Value, Option<Fault>) {
    let result = match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div | BinOp::Mod if b == 0 => {
            let what = if op == BinOp::Div { "division" } else { "modulo" };
            return (
                Value::zero(ty.clone()).invalidated(),
                Some(Fault::undefined(format!("integer {} by zero", what))),
            );
        }
        BinOp::Div => a.wrapping_div(b),
        BinOp::Mod => a.wrapping_rem(b),
        BinOp::BitAnd => a & b,
        BinOp::BitOr => a | b,
        BinOp::BitXor => a ^ b,
        BinOp::Shl | BinOp::Shr => {
            let width = ty.atomic_kind().map_or(32, |k| k.size() * 8) as i64;
            if !(0..width).contains(&b) {
                return (
                    Value::zero(ty.clone()).invalidated(),
                    Some(Fault::undefined(format!("shift by {} bits is out of range for '{}'", b, ty))),
                );
            }
            if op == BinOp::Shl {
                a.wrapping_shl(b as u32)
            } else {
                a.wrapping_shr(b as u32)
            }
        }
        _ => return (Value::zero(ty.clone()).invalidated(), Some(Fault::undefined(format!("operator {} on an integral value", op.symbol())))),
    };
    let value = Value::int(result, ty.clone());
    // `a % b` is undefined whenever `a / b` is not representable
    let quotient_overflows = op == BinOp::Mod && {
        let quotient = a.wrapping_div(b);
        Value::int(quotient, ty.clone()).as_int() != quotient
    };
    let fault = ((value.as_int() != result && op != BinOp::Shl) || quotient_overflows)
        .then(|| Fault::undefined(format!("signed integer overflow in '{}' arithmetic", ty)));
    (value, fault)
}

/// Relational and equality operators
pub(crate) fn compare(op: BinOp, left: &Value, right: &Value) -> bool {
    if left.ty.is_floating() || right.ty.is_floating() {
        let (a, b) = (left.as_float(), right.as_float());
        match op {
            BinOp::Eq => a == b,
            BinOp::Ne => a != b,
            BinOp::Lt => a < b,
            BinOp::Le => a <= b,
            BinOp::Gt => a > b,
            BinOp::Ge => a >= b,
            _ => false,
        }
    } else {
        let (a, b) = (left.as_int(), right.as_int());
        match op {
            BinOp::Eq => a == b,
            BinOp::Ne => a != b,
            BinOp::Lt => a < b,
            BinOp::Le => a <= b,
            BinOp::Gt => a > b,
            BinOp::Ge => a >= b,
            _ => false,
        }
    }
}

/// `-x`, `+x` and `~x`
pub(crate) fn unary(op: UnOp, operand: &Value, ty: &Type) -> (Value, Option<Fault>) {
    let result = match op {
        UnOp::Neg if ty.is_floating() => Value::float(-operand.as_float(), ty.clone()),
        UnOp::Neg => {
            let negated = operand.as_int().wrapping_neg();
            let value = Value::int(negated, ty.clone());
            if value.as_int() != negated {
                return (value, Some(Fault::undefined("signed integer overflow in negation")));
            }
            value
        }
        UnOp::BitNot => Value::int(!operand.as_int(), ty.clone()),
        _ => Value {
            ty: ty.clone(),
            ..operand.clone()
        },
    };
    let result = if operand.valid { result } else { result.invalidated() };
    (result, None)
}

/// Convert an arithmetic value to another arithmetic type
pub(crate) fn convert(value: &Value, to: &Type) -> (Value, Option<Fault>) {
    let to = to.cv_unqualified();
    let mut fault = None;
    let result = match to.atomic_kind() {
        Some(AtomicKind::Bool) => Value::bool(value.is_true()),
        Some(AtomicKind::Float | AtomicKind::Double) => Value::float(value.as_float(), to.clone()),
        Some(kind) if value.ty.is_floating() => {
            let f = value.as_float().trunc();
            let (min, max) = range_of(kind);
            if !f.is_finite() || f < min as f64 || f > max as f64 {
                fault = Some(Fault::undefined(format!(
                    "the value {} does not fit in type '{}'",
                    value.as_float(),
                    to
                )));
            }
            Value::int(f as i64, to.clone())
        }
        Some(kind) => {
            let raw = value.as_int();
            let (min, max) = range_of(kind);
            if !(min..=max).contains(&raw) {
                fault = Some(Fault {
                    kind: EventKind::ImplementationDefined,
                    message: format!("the value {} does not fit in type '{}' and is truncated", raw, to),
                });
            }
            Value::int(raw, to.clone())
        }
        None => Value {
            ty: to.clone(),
            ..value.clone()
        },
    };
    let result = if value.valid { result } else { result.invalidated() };
    (result, fault)
}

fn range_of(kind: AtomicKind) -> (i64, i64) {
    match kind {
        AtomicKind::Char => (i64::from(i8::MIN), i64::from(i8::MAX)),
        AtomicKind::Bool => (0, 1),
        _ => (i64::from(i32::MIN), i64::from(i32::MAX)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_division_truncates() {
        let (result, fault) = binary(BinOp::Div, &Value::int(7, Type::int()), &Value::int(2, Type::int()), &Type::int());
        assert_eq!(result, Value::int(3, Type::int()));
        assert!(fault.is_none());
    }

    #[test]
    fn test_division_by_zero_is_undefined() {
        let (result, fault) = binary(BinOp::Mod, &Value::int(7, Type::int()), &Value::int(0, Type::int()), &Type::int());
        assert!(!result.valid);
        assert_eq!(fault.map(|f| f.kind), Some(EventKind::UndefinedBehavior));
    }

    #[test]
    fn test_signed_overflow_wraps_and_reports() {
        let max = Value::int(i64::from(i32::MAX), Type::int());
        let (result, fault) = binary(BinOp::Add, &max, &Value::int(1, Type::int()), &Type::int());
        assert_eq!(result.as_int(), i64::from(i32::MIN));
        assert!(fault.is_some());
    }

    #[test]
    fn test_min_divided_by_minus_one_reports_for_both_operators() {
        let min = Value::int(i64::from(i32::MIN), Type::int());
        let minus_one = Value::int(-1, Type::int());
        let (_, div_fault) = binary(BinOp::Div, &min, &minus_one, &Type::int());
        let (rem, rem_fault) = binary(BinOp::Mod, &min, &minus_one, &Type::int());
        assert_eq!(div_fault.map(|f| f.kind), Some(EventKind::UndefinedBehavior));
        assert_eq!(rem_fault.map(|f| f.kind), Some(EventKind::UndefinedBehavior));
        assert_eq!(rem.as_int(), 0);
    }

    #[test]
    fn test_invalid_operand_poisons_result() {
        let garbage = Value::int(4, Type::int()).invalidated();
        let (result, _) = binary(BinOp::Mul, &garbage, &Value::int(2, Type::int()), &Type::int());
        assert!(!result.valid);
        assert_eq!(result.as_int(), 8);
    }

    #[test]
    fn test_conversions() {
        let (narrowed, fault) = convert(&Value::int(300, Type::int()), &Type::char());
        assert_eq!(narrowed.as_int(), 44);
        assert_eq!(fault.map(|f| f.kind), Some(EventKind::ImplementationDefined));

        let (truncated, fault) = convert(&Value::float(-2.75, Type::double()), &Type::int());
        assert_eq!(truncated.as_int(), -2);
        assert!(fault.is_none());

        let (widened, _) = convert(&Value::int(3, Type::int()), &Type::double());
        assert_eq!(widened, Value::float(3.0, Type::double()));

        let (flag, _) = convert(&Value::float(0.5, Type::double()), &Type::bool());
        assert_eq!(flag, Value::bool(true));
    }

    #[test]
    fn test_compare_mixed() {
        assert!(compare(BinOp::Lt, &Value::int(1, Type::int()), &Value::float(1.5, Type::double())));
        assert!(compare(BinOp::Ne, &Value::int(1, Type::int()), &Value::int(2, Type::int())));
    }
}
