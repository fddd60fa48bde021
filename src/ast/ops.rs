use std::cmp::Ordering;

use crate::runtime::error::RuntimeError;
use crate::value::Value;

use super::{BinaryOperator, UnaryOperator};

pub fn unary(op: UnaryOperator, operand: &Value) -> Result<Value, RuntimeError> {
    let overflow = RuntimeError::Overflow { operation: "negation" };
    match (op, operand) {
        (UnaryOperator::Not, Value::Boolean(value)) => Ok(Value::Boolean(!value)),
        (UnaryOperator::Not, Value::Integer(value)) => Ok(Value::Integer(!value)),
        (UnaryOperator::Not, Value::Long(value)) => Ok(Value::Long(!value)),
        (UnaryOperator::Negate, Value::Integer(value)) => {
            value.checked_neg().map(Value::Integer).ok_or(overflow)
        }
        (UnaryOperator::Negate, Value::Long(value)) => {
            value.checked_neg().map(Value::Long).ok_or(overflow)
        }
        (UnaryOperator::Negate, Value::Double(value)) => Ok(Value::Double(-value)),
        (_, other) => Err(invalid("operand", other)),
    }
}

/// Applies `op` to operands that were already converted to a common type.
pub fn binary(op: BinaryOperator, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    use BinaryOperator as Op;

    match op {
        Op::Equal => Ok(Value::Boolean(equals(left, right))),
        Op::NotEqual => Ok(Value::Boolean(!equals(left, right))),
        Op::Less => Ok(Value::Boolean(compare(left, right)? == Some(Ordering::Less))),
        Op::LessEqual => Ok(Value::Boolean(matches!(
            compare(left, right)?,
            Some(Ordering::Less | Ordering::Equal)
        ))),
        Op::Greater => Ok(Value::Boolean(compare(left, right)? == Some(Ordering::Greater))),
        Op::GreaterEqual => Ok(Value::Boolean(matches!(
            compare(left, right)?,
            Some(Ordering::Greater | Ordering::Equal)
        ))),
        Op::In => match right {
            Value::Array { items, .. } => Ok(Value::Boolean(
                items.iter().any(|item| equals(left, item)),
            )),
            other => Err(invalid("set", other)),
        },
        Op::And | Op::Or | Op::Xor => logical(op, left, right),
        Op::Shl | Op::Shr => shift(op, left, right),
        Op::Add | Op::Subtract | Op::Multiply | Op::Divide | Op::IntDivide | Op::Modulo => {
            arithmetic(op, left, right)
        }
    }
}

/// Every ordinal from `low` to `high` inclusive, of the same kind as `low`.
pub fn expand_range(low: &Value, high: &Value) -> Result<Vec<Value>, RuntimeError> {
    (low.as_ordinal()?..=high.as_ordinal()?)
        .map(|ordinal| low.with_ordinal(ordinal))
        .collect()
}

/// Renders `value:width:precision`: right-aligned in `width` columns, with
/// `precision` fixed decimals for reals.
pub fn format(
    value: &Value,
    width: &Value,
    precision: Option<&Value>,
) -> Result<Value, RuntimeError> {
    let width = usize::try_from(width.as_ordinal()?).unwrap_or(0);
    let text = match (value, precision) {
        (Value::Double(number), Some(precision)) => {
            let precision = usize::try_from(precision.as_ordinal()?).unwrap_or(0);
            format!("{number:.precision$}")
        }
        (other, _) => other.to_output(),
    };
    Ok(Value::String(format!("{text:>width$}")))
}

fn arithmetic(op: BinaryOperator, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    use BinaryOperator as Op;

    if let (Op::Divide, Value::Double(_), Value::Double(divisor)) = (op, left, right)
        && *divisor == 0.0
    {
        return Err(RuntimeError::DivisionByZero);
    }
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => {
            integer_op(op, i64::from(*a), i64::from(*b)).and_then(|result| {
                i32::try_from(result)
                    .map(Value::Integer)
                    .map_err(|_| overflow(op))
            })
        }
        (Value::Long(a), Value::Long(b)) => integer_op(op, *a, *b).map(Value::Long),
        (Value::Double(a), Value::Double(b)) => match op {
            Op::Add => Ok(Value::Double(a + b)),
            Op::Subtract => Ok(Value::Double(a - b)),
            Op::Multiply => Ok(Value::Double(a * b)),
            Op::Divide => Ok(Value::Double(a / b)),
            _ => Err(invalid("integer", left)),
        },
        (Value::String(a), Value::String(b)) if op == Op::Add => {
            Ok(Value::String(format!("{a}{b}")))
        }
        (other, _) => Err(invalid("number", other)),
    }
}

fn integer_op(op: BinaryOperator, a: i64, b: i64) -> Result<i64, RuntimeError> {
    use BinaryOperator as Op;

    let result = match op {
        Op::Add => a.checked_add(b),
        Op::Subtract => a.checked_sub(b),
        Op::Multiply => a.checked_mul(b),
        Op::IntDivide | Op::Modulo if b == 0 => return Err(RuntimeError::DivisionByZero),
        Op::IntDivide => a.checked_div(b),
        Op::Modulo => a.checked_rem(b),
        _ => return Err(RuntimeError::Internal("integer operator")),
    };
    result.ok_or_else(|| overflow(op))
}

fn overflow(op: BinaryOperator) -> RuntimeError {
    RuntimeError::Overflow {
        operation: op.symbol(),
    }
}

fn logical(op: BinaryOperator, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    use BinaryOperator as Op;

    match (left, right) {
        (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(match op {
            Op::And => *a && *b,
            Op::Or => *a || *b,
            _ => a ^ b,
        })),
        (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(match op {
            Op::And => a & b,
            Op::Or => a | b,
            _ => a ^ b,
        })),
        (Value::Long(a), Value::Long(b)) => Ok(Value::Long(match op {
            Op::And => a & b,
            Op::Or => a | b,
            _ => a ^ b,
        })),
        (other, _) => Err(invalid("boolean or integer", other)),
    }
}

fn shift(op: BinaryOperator, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    let amount = u32::try_from(right.as_ordinal()?).unwrap_or(u32::MAX);
    let left_shift = op == BinaryOperator::Shl;
    match left {
        Value::Integer(value) => {
            let bits = *value as u32;
            let shifted = if left_shift {
                bits.checked_shl(amount)
            } else {
                bits.checked_shr(amount)
            };
            Ok(Value::Integer(shifted.unwrap_or(0) as i32))
        }
        Value::Long(value) => {
            let bits = *value as u64;
            let shifted = if left_shift {
                bits.checked_shl(amount)
            } else {
                bits.checked_shr(amount)
            };
            Ok(Value::Long(shifted.unwrap_or(0) as i64))
        }
        other => Err(invalid("integer", other)),
    }
}

fn equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Char(a), Value::String(b)) | (Value::String(b), Value::Char(a)) => {
            b.chars().eq(std::iter::once(*a))
        }
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Result<Option<Ordering>, RuntimeError> {
    let ordering = match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => a.partial_cmp(b),
        (Value::Long(a), Value::Long(b)) => a.partial_cmp(b),
        (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
        (Value::Char(a), Value::Char(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => a.partial_cmp(b),
        (Value::Boolean(a), Value::Boolean(b)) => a.partial_cmp(b),
        (other, _) => return Err(invalid("comparable value", other)),
    };
    Ok(ordering)
}

fn invalid(expected: &'static str, found: &Value) -> RuntimeError {
    RuntimeError::InvalidValue {
        expected,
        found: found.type_name().to_string(),
    }
}
