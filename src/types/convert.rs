use crate::ast::{ExprKind, Expression};
use crate::runtime::error::RuntimeError;
use crate::value::Value;

use super::{BasicType, Type};

/// How a value of one type becomes a value of another.
#[derive(Debug, Clone, PartialEq)]
pub enum Conversion {
    Identity,
    Widen { from: BasicType, to: BasicType },
    CharToString,
    /// Converts every element of an array.
    Elements(Box<Conversion>),
    NilToPointer,
    ToAny,
}

impl Conversion {
    /// Ranking weight used by overload resolution; an exact match costs 0.
    pub fn cost(&self) -> u32 {
        match self {
            Conversion::Identity => 0,
            Conversion::Widen { from, to } => match (from.widening_rank(), to.widening_rank()) {
                (Some(from), Some(to)) => to.saturating_sub(from),
                _ => 1,
            },
            Conversion::CharToString => 2,
            Conversion::Elements(inner) => inner.cost(),
            Conversion::NilToPointer => 1,
            Conversion::ToAny => 10,
        }
    }

    /// Whether the runtime value is left as is, so only the static type
    /// changes.
    pub fn is_retype(&self) -> bool {
        match self {
            Conversion::Identity | Conversion::NilToPointer | Conversion::ToAny => true,
            Conversion::Elements(inner) => inner.is_retype(),
            Conversion::Widen { .. } | Conversion::CharToString => false,
        }
    }

    pub fn apply(&self, value: Value) -> Result<Value, RuntimeError> {
        match self {
            Conversion::Identity | Conversion::NilToPointer | Conversion::ToAny => Ok(value),
            Conversion::Widen { to, .. } => widen(value, *to),
            Conversion::CharToString => Ok(Value::String(value.as_char()?.to_string())),
            Conversion::Elements(inner) => match value {
                Value::Array { lower, items } => {
                    let items = items
                        .into_iter()
                        .map(|item| inner.apply(item))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(Value::Array { lower, items })
                }
                other => Err(RuntimeError::InvalidValue {
                    expected: "array",
                    found: other.type_name().to_string(),
                }),
            },
        }
    }
}

fn widen(value: Value, to: BasicType) -> Result<Value, RuntimeError> {
    let converted = match (to, &value) {
        (BasicType::Integer, Value::Char(c)) => i32::try_from(u32::from(*c))
            .map(Value::Integer)
            .map_err(|_| RuntimeError::Overflow {
                operation: "conversion",
            })?,
        (BasicType::Long, _) => Value::Long(value.as_ordinal()?),
        (BasicType::Double, Value::Char(c)) => Value::Double(f64::from(u32::from(*c))),
        (BasicType::Double, _) => Value::Double(value.as_f64()?),
        _ => value,
    };
    Ok(converted)
}

/// Finds the implicit conversion from `from` to `to`, if one exists.
/// Narrowing is never implicit.
pub fn conversion(from: &Type, to: &Type) -> Option<Conversion> {
    if to.is_any() {
        return Some(if from.is_any() {
            Conversion::Identity
        } else {
            Conversion::ToAny
        });
    }
    match (from, to) {
        (Type::Basic(from), Type::Basic(to)) => basic_conversion(*from, *to),
        (
            Type::Array {
                element: from_element,
                bounds: from_bounds,
            },
            Type::Array {
                element: to_element,
                bounds: to_bounds,
            },
        ) => {
            if !from_bounds.fits(to_bounds) {
                return None;
            }
            match conversion(from_element, to_element)? {
                Conversion::Identity => Some(Conversion::Identity),
                // Elements stored as `any` keep their own values.
                Conversion::ToAny => Some(Conversion::Identity),
                inner => Some(Conversion::Elements(Box::new(inner))),
            }
        }
        (Type::Pointer(from), Type::Pointer(to)) => (from == to).then_some(Conversion::Identity),
        (Type::Nil, Type::Pointer(_)) | (Type::Nil, Type::Nil) => Some(Conversion::NilToPointer),
        (Type::Varargs(from), Type::Varargs(to)) => conversion(from, to),
        (Type::Native(from), Type::Native(to)) => (from == to).then_some(Conversion::Identity),
        _ => None,
    }
}

fn basic_conversion(from: BasicType, to: BasicType) -> Option<Conversion> {
    if from == to {
        return Some(Conversion::Identity);
    }
    if from == BasicType::Char && to == BasicType::String {
        return Some(Conversion::CharToString);
    }
    match (from.widening_rank(), to.widening_rank()) {
        (Some(from_rank), Some(to_rank)) if from_rank < to_rank => {
            Some(Conversion::Widen { from, to })
        }
        _ => None,
    }
}

/// Converts `expression` to `target`. On failure the expression is handed
/// back unchanged so the caller can build the right diagnostic.
pub fn convert(expression: Expression, target: &Type) -> Result<Expression, Expression> {
    let Some(conversion) = conversion(&expression.ty, target) else {
        return Err(expression);
    };
    if conversion.is_retype() {
        return Ok(Expression {
            ty: target.clone(),
            ..expression
        });
    }
    let position = expression.position.clone();
    Ok(Expression {
        kind: ExprKind::Convert {
            conversion,
            operand: Box::new(expression),
        },
        ty: target.clone(),
        position,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Position;
    use crate::types::Subrange;

    fn literal(value: Value, ty: Type) -> Expression {
        Expression::literal(value, ty, Position::start_of("test"))
    }

    #[test]
    fn widening_follows_the_numeric_path() {
        assert_eq!(
            conversion(&Type::CHAR, &Type::INTEGER),
            Some(Conversion::Widen {
                from: BasicType::Char,
                to: BasicType::Integer
            })
        );
        assert!(conversion(&Type::INTEGER, &Type::DOUBLE).is_some());
        assert!(conversion(&Type::CHAR, &Type::STRING).is_some());
    }

    #[test]
    fn narrowing_is_rejected() {
        assert_eq!(conversion(&Type::DOUBLE, &Type::INTEGER), None);
        assert_eq!(conversion(&Type::LONG, &Type::INTEGER), None);
        assert_eq!(conversion(&Type::STRING, &Type::CHAR), None);
        assert_eq!(conversion(&Type::BOOLEAN, &Type::INTEGER), None);
    }

    #[test]
    fn exact_match_is_cheapest() {
        let exact = conversion(&Type::INTEGER, &Type::INTEGER).unwrap();
        let widen = conversion(&Type::INTEGER, &Type::LONG).unwrap();
        let any = conversion(&Type::INTEGER, &Type::ANY).unwrap();
        assert!(exact.cost() < widen.cost());
        assert!(widen.cost() < any.cost());
    }

    #[test]
    fn arrays_need_matching_bounds() {
        let fixed = Type::array(Type::INTEGER, Subrange::new(1, 3));
        let other = Type::array(Type::INTEGER, Subrange::new(1, 4));
        let open = Type::array(Type::LONG, Subrange::UNBOUNDED);
        assert_eq!(conversion(&fixed, &other), None);
        assert!(matches!(
            conversion(&fixed, &open),
            Some(Conversion::Elements(_))
        ));
    }

    #[test]
    fn open_arrays_do_not_fill_fixed_ones() {
        let fixed = Type::array(Type::INTEGER, Subrange::new(1, 3));
        let wider = Type::array(Type::INTEGER, Subrange::new(0, 5));
        let open = Type::array(Type::INTEGER, Subrange::UNBOUNDED);
        assert_eq!(conversion(&open, &fixed), None);
        assert_eq!(conversion(&wider, &open), Some(Conversion::Identity));
        assert_eq!(conversion(&open, &open), Some(Conversion::Identity));
        assert!(Conversion::Identity.is_retype());
        assert!(!Conversion::CharToString.is_retype());
    }

    #[test]
    fn pointers_need_identical_targets() {
        let to_int = Type::pointer(Type::INTEGER);
        let to_long = Type::pointer(Type::LONG);
        assert_eq!(conversion(&to_int, &to_long), None);
        assert_eq!(conversion(&Type::Nil, &to_int), Some(Conversion::NilToPointer));
    }

    #[test]
    fn convert_wraps_widening_and_hands_back_failures() {
        let widened = convert(literal(Value::Integer(2), Type::INTEGER), &Type::DOUBLE)
            .expect("integer widens to double");
        assert_eq!(widened.ty, Type::DOUBLE);
        assert!(matches!(widened.kind, ExprKind::Convert { .. }));

        let rejected = convert(literal(Value::Double(2.5), Type::DOUBLE), &Type::INTEGER)
            .expect_err("double does not narrow");
        assert_eq!(rejected.kind, ExprKind::Literal(Value::Double(2.5)));
    }

    #[test]
    fn apply_converts_values() {
        let widen = Conversion::Widen {
            from: BasicType::Char,
            to: BasicType::Double,
        };
        assert_eq!(widen.apply(Value::Char('A')).unwrap(), Value::Double(65.0));
        assert_eq!(
            Conversion::CharToString.apply(Value::Char('x')).unwrap(),
            Value::String("x".to_string())
        );
    }
}
