use std::fmt;

use crate::value::Value;

pub mod convert;
pub mod error;
pub mod subrange;

pub use convert::{Conversion, conversion, convert};
pub use error::TypeError;
pub use subrange::Subrange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicType {
    Boolean,
    Char,
    Integer,
    Long,
    Double,
    String,
}

impl BasicType {
    /// Position on the implicit widening path `char -> integer -> long -> double`.
    pub fn widening_rank(self) -> Option<u32> {
        match self {
            BasicType::Char => Some(0),
            BasicType::Integer => Some(1),
            BasicType::Long => Some(2),
            BasicType::Double => Some(3),
            BasicType::Boolean | BasicType::String => None,
        }
    }

    /// Storage size reported by `sizeof`.
    pub fn byte_size(self) -> i32 {
        match self {
            BasicType::Boolean => 1,
            BasicType::Char => 2,
            BasicType::Integer => 4,
            BasicType::Long | BasicType::Double => 8,
            BasicType::String => 256,
        }
    }

    pub fn default_value(self) -> Value {
        match self {
            BasicType::Boolean => Value::Boolean(false),
            BasicType::Char => Value::Char('\0'),
            BasicType::Integer => Value::Integer(0),
            BasicType::Long => Value::Long(0),
            BasicType::Double => Value::Double(0.0),
            BasicType::String => Value::String(String::new()),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BasicType::Boolean => "boolean",
            BasicType::Char => "char",
            BasicType::Integer => "integer",
            BasicType::Long => "int64",
            BasicType::Double => "double",
            BasicType::String => "string",
        }
    }
}

/// Type backed by a host value. Two native types are the same type when
/// their names match.
#[derive(Clone, Copy)]
pub struct NativeType {
    pub name: &'static str,
    pub init: fn() -> Value,
}

fn nil_value() -> Value {
    Value::Pointer(None)
}

impl NativeType {
    /// Accepts a value of any type; used by routines such as `writeln`.
    pub const ANY: NativeType = NativeType {
        name: "any",
        init: nil_value,
    };

    pub fn is_any(&self) -> bool {
        self.name == Self::ANY.name
    }
}

impl PartialEq for NativeType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NativeType").field(&self.name).finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Basic(BasicType),
    Array {
        element: Box<Type>,
        bounds: Subrange,
    },
    Pointer(Box<Type>),
    /// Trailing parameter accepting zero or more arguments of the element
    /// type.
    Varargs(Box<Type>),
    Native(NativeType),
    /// Type of the `nil` literal.
    Nil,
}

impl Type {
    pub const BOOLEAN: Type = Type::Basic(BasicType::Boolean);
    pub const CHAR: Type = Type::Basic(BasicType::Char);
    pub const INTEGER: Type = Type::Basic(BasicType::Integer);
    pub const LONG: Type = Type::Basic(BasicType::Long);
    pub const DOUBLE: Type = Type::Basic(BasicType::Double);
    pub const STRING: Type = Type::Basic(BasicType::String);
    pub const ANY: Type = Type::Native(NativeType::ANY);

    pub fn array(element: Type, bounds: Subrange) -> Type {
        Type::Array {
            element: Box::new(element),
            bounds,
        }
    }

    pub fn pointer(target: Type) -> Type {
        Type::Pointer(Box::new(target))
    }

    pub fn varargs(element: Type) -> Type {
        Type::Varargs(Box::new(element))
    }

    /// Type identity for by-reference binding, with open array bounds only
    /// accepted on the `target` side.
    pub fn fits(&self, target: &Type) -> bool {
        match (self, target) {
            (
                Type::Array { element, bounds },
                Type::Array {
                    element: target_element,
                    bounds: target_bounds,
                },
            ) => bounds.fits(target_bounds) && element.fits(target_element),
            _ => self == target,
        }
    }

    pub fn basic(&self) -> Option<BasicType> {
        match self {
            Type::Basic(basic) => Some(*basic),
            _ => None,
        }
    }

    pub fn is_ordinal(&self) -> bool {
        matches!(
            self.basic(),
            Some(BasicType::Boolean | BasicType::Char | BasicType::Integer | BasicType::Long)
        )
    }

    pub fn is_integral(&self) -> bool {
        matches!(self.basic(), Some(BasicType::Integer | BasicType::Long))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self.basic(),
            Some(BasicType::Integer | BasicType::Long | BasicType::Double)
        )
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Type::Native(native) if native.is_any())
    }

    pub fn default_value(&self) -> Value {
        match self {
            Type::Basic(basic) => basic.default_value(),
            Type::Array { element, bounds } => Value::Array {
                lower: bounds.lower,
                items: vec![element.default_value(); bounds.len()],
            },
            Type::Pointer(_) | Type::Nil => Value::Pointer(None),
            Type::Varargs(_) => Value::Array {
                lower: 0,
                items: Vec::new(),
            },
            Type::Native(native) => (native.init)(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Basic(basic) => f.write_str(basic.name()),
            Type::Array { element, bounds } if bounds.is_unbounded() => {
                write!(f, "array of {element}")
            }
            Type::Array { element, bounds } => write!(f, "array[{bounds}] of {element}"),
            Type::Pointer(target) => write!(f, "^{target}"),
            Type::Varargs(element) => write!(f, "varargs of {element}"),
            Type::Native(native) => f.write_str(native.name),
            Type::Nil => f.write_str("nil"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrays_compare_structurally() {
        let fixed = Type::array(Type::INTEGER, Subrange::new(1, 3));
        let open = Type::array(Type::INTEGER, Subrange::UNBOUNDED);
        assert_eq!(fixed, open);
        assert_eq!(fixed, Type::array(Type::INTEGER, Subrange::new(1, 3)));
        assert_ne!(fixed, Type::array(Type::INTEGER, Subrange::new(0, 3)));
        assert_ne!(fixed, Type::array(Type::CHAR, Subrange::new(1, 3)));
    }

    #[test]
    fn default_array_value_uses_bounds() {
        let ty = Type::array(Type::CHAR, Subrange::new(2, 2));
        assert_eq!(
            ty.default_value(),
            Value::Array {
                lower: 2,
                items: vec![Value::Char('\0'), Value::Char('\0')]
            }
        );
    }

    #[test]
    fn displays_like_source() {
        let ty = Type::pointer(Type::array(Type::DOUBLE, Subrange::new(0, 10)));
        assert_eq!(ty.to_string(), "^array[0..9] of double");
        assert_eq!(
            Type::array(Type::STRING, Subrange::UNBOUNDED).to_string(),
            "array of string"
        );
    }
}
