use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::runtime::error::RuntimeError;

/// A host value exposed to programs through a native-bound type such as
/// `text`.
pub trait HostObject: fmt::Debug {
    fn type_name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub type HostRef = Rc<RefCell<Box<dyn HostObject>>>;

pub fn host_ref(object: impl HostObject + 'static) -> HostRef {
    Rc::new(RefCell::new(Box::new(object)))
}

#[derive(Debug, Clone)]
pub enum Value {
    Boolean(bool),
    Integer(i32),
    Long(i64),
    Double(f64),
    Char(char),
    String(String),
    Array { lower: i64, items: Vec<Value> },
    Pointer(Option<Reference>),
    Native(HostRef),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Long(_) => "int64",
            Value::Double(_) => "double",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::Array { .. } => "array",
            Value::Pointer(_) => "pointer",
            Value::Native(object) => object.borrow().type_name(),
        }
    }

    pub fn as_bool(&self) -> Result<bool, RuntimeError> {
        match self {
            Value::Boolean(value) => Ok(*value),
            other => Err(other.mismatch("boolean")),
        }
    }

    /// Ordinal value of integers, longs, characters and booleans.
    pub fn as_ordinal(&self) -> Result<i64, RuntimeError> {
        match self {
            Value::Integer(value) => Ok(i64::from(*value)),
            Value::Long(value) => Ok(*value),
            Value::Char(value) => Ok(i64::from(u32::from(*value))),
            Value::Boolean(value) => Ok(i64::from(*value)),
            other => Err(other.mismatch("ordinal")),
        }
    }

    pub fn as_f64(&self) -> Result<f64, RuntimeError> {
        match self {
            Value::Double(value) => Ok(*value),
            Value::Integer(value) => Ok(f64::from(*value)),
            Value::Long(value) => Ok(*value as f64),
            other => Err(other.mismatch("real")),
        }
    }

    pub fn as_str(&self) -> Result<&str, RuntimeError> {
        match self {
            Value::String(value) => Ok(value),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn as_char(&self) -> Result<char, RuntimeError> {
        match self {
            Value::Char(value) => Ok(*value),
            other => Err(other.mismatch("char")),
        }
    }

    pub fn as_host(&self) -> Result<&HostRef, RuntimeError> {
        match self {
            Value::Native(object) => Ok(object),
            other => Err(other.mismatch("native object")),
        }
    }

    /// Rebuilds an ordinal of the same kind as `self` from a raw value, as
    /// `succ`, `pred` and `for` loops need.
    pub fn with_ordinal(&self, ordinal: i64) -> Result<Value, RuntimeError> {
        match self {
            Value::Integer(_) => i32::try_from(ordinal)
                .map(Value::Integer)
                .map_err(|_| RuntimeError::Overflow { operation: "ordinal" }),
            Value::Long(_) => Ok(Value::Long(ordinal)),
            Value::Char(_) => u32::try_from(ordinal)
                .ok()
                .and_then(char::from_u32)
                .map(Value::Char)
                .ok_or(RuntimeError::Overflow { operation: "ordinal" }),
            Value::Boolean(_) => match ordinal {
                0 => Ok(Value::Boolean(false)),
                1 => Ok(Value::Boolean(true)),
                _ => Err(RuntimeError::Overflow { operation: "ordinal" }),
            },
            other => Err(other.mismatch("ordinal")),
        }
    }

    fn mismatch(&self, expected: &'static str) -> RuntimeError {
        RuntimeError::InvalidValue {
            expected,
            found: self.type_name().to_string(),
        }
    }

    pub fn to_output(&self) -> String {
        match self {
            Value::Boolean(true) => "TRUE".to_string(),
            Value::Boolean(false) => "FALSE".to_string(),
            Value::Integer(value) => value.to_string(),
            Value::Long(value) => value.to_string(),
            Value::Double(value) => format_double(*value),
            Value::Char(value) => value.to_string(),
            Value::String(value) => value.clone(),
            Value::Array { items, .. } => {
                let rendered = items
                    .iter()
                    .map(Value::to_output)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("[{rendered}]")
            }
            Value::Pointer(None) => "nil".to_string(),
            Value::Pointer(Some(reference)) => match reference.get() {
                Ok(value) => format!("^{}", value.to_output()),
                Err(_) => "^?".to_string(),
            },
            Value::Native(object) => format!("<{}>", object.borrow().type_name()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (
                Value::Array { lower, items },
                Value::Array {
                    lower: other_lower,
                    items: other_items,
                },
            ) => lower == other_lower && items == other_items,
            (Value::Pointer(a), Value::Pointer(b)) => match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => a.same_target(b),
                _ => false,
            },
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Renders doubles the way Pascal `writeln` output is expected to look:
/// always with a fractional part, scientific outside `[1e-3, 1e7)`.
pub fn format_double(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let magnitude = value.abs();
    if magnitude == 0.0 || (1e-3..1e7).contains(&magnitude) {
        let text = value.to_string();
        if text.contains('.') {
            text
        } else {
            format!("{text}.0")
        }
    } else {
        let text = format!("{value:E}");
        match text.split_once('E') {
            Some((mantissa, exponent)) if !mantissa.contains('.') => {
                format!("{mantissa}.0E{exponent}")
            }
            _ => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    /// Array element by its declared index.
    Element(i64),
    /// String character, 1-based.
    Char(i64),
}

/// A handle to storage: a shared cell plus a path into nested arrays and
/// strings. Variables, `var` parameters, pointers and element accesses all
/// use it.
#[derive(Debug, Clone)]
pub struct Reference {
    cell: Rc<RefCell<Value>>,
    path: Vec<Step>,
}

impl Reference {
    pub fn new(value: Value) -> Self {
        Self {
            cell: Rc::new(RefCell::new(value)),
            path: Vec::new(),
        }
    }

    pub fn element(&self, index: i64) -> Self {
        self.extend(Step::Element(index))
    }

    pub fn char_at(&self, index: i64) -> Self {
        self.extend(Step::Char(index))
    }

    fn extend(&self, step: Step) -> Self {
        let mut path = self.path.clone();
        path.push(step);
        Self {
            cell: self.cell.clone(),
            path,
        }
    }

    pub fn same_target(&self, other: &Reference) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell) && self.path == other.path
    }

    pub fn get(&self) -> Result<Value, RuntimeError> {
        let root = self
            .cell
            .try_borrow()
            .map_err(|_| RuntimeError::Internal("storage is being written"))?;
        let mut current: &Value = &root;
        for step in &self.path {
            match step {
                Step::Element(index) => current = element(current, *index)?,
                Step::Char(index) => return char_of(current, *index).map(Value::Char),
            }
        }
        Ok(current.clone())
    }

    pub fn set(&self, value: Value) -> Result<(), RuntimeError> {
        self.update(|slot| {
            *slot = value;
            Ok(())
        })
    }

    /// Runs `apply` on the referenced value in place.
    pub fn update<T>(
        &self,
        apply: impl FnOnce(&mut Value) -> Result<T, RuntimeError>,
    ) -> Result<T, RuntimeError> {
        let mut root = self
            .cell
            .try_borrow_mut()
            .map_err(|_| RuntimeError::Internal("storage is already borrowed"))?;
        let mut current: &mut Value = &mut root;
        for (depth, step) in self.path.iter().enumerate() {
            match step {
                Step::Element(index) => current = element_mut(current, *index)?,
                Step::Char(index) => {
                    if depth + 1 != self.path.len() {
                        return Err(RuntimeError::Internal("character has no elements"));
                    }
                    return update_char(current, *index, apply);
                }
            }
        }
        apply(current)
    }
}

fn offset(lower: i64, len: usize, index: i64) -> Result<usize, RuntimeError> {
    let upper = lower + len as i64 - 1;
    if index < lower || index > upper {
        return Err(RuntimeError::IndexOutOfBounds {
            index,
            lower,
            upper,
        });
    }
    usize::try_from(index - lower).map_err(|_| RuntimeError::Internal("negative offset"))
}

fn element(value: &Value, index: i64) -> Result<&Value, RuntimeError> {
    match value {
        Value::Array { lower, items } => Ok(&items[offset(*lower, items.len(), index)?]),
        other => Err(other.mismatch("array")),
    }
}

fn element_mut(value: &mut Value, index: i64) -> Result<&mut Value, RuntimeError> {
    match value {
        Value::Array { lower, items } => {
            let at = offset(*lower, items.len(), index)?;
            Ok(&mut items[at])
        }
        other => Err(other.mismatch("array")),
    }
}

fn char_of(value: &Value, index: i64) -> Result<char, RuntimeError> {
    let text = value.as_str()?;
    let len = text.chars().count();
    let at = offset(1, len, index)?;
    text.chars()
        .nth(at)
        .ok_or(RuntimeError::Internal("character index"))
}

fn update_char<T>(
    value: &mut Value,
    index: i64,
    apply: impl FnOnce(&mut Value) -> Result<T, RuntimeError>,
) -> Result<T, RuntimeError> {
    let current = char_of(value, index)?;
    let mut slot = Value::Char(current);
    let result = apply(&mut slot)?;
    let replacement = slot.as_char()?;
    if let Value::String(text) = value {
        let at = offset(1, text.chars().count(), index)?;
        *text = text
            .chars()
            .enumerate()
            .map(|(position, c)| if position == at { replacement } else { c })
            .collect();
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array(lower: i64, values: &[i32]) -> Value {
        Value::Array {
            lower,
            items: values.iter().copied().map(Value::Integer).collect(),
        }
    }

    #[test]
    fn doubles_always_show_a_fraction() {
        assert_eq!(format_double(3.0), "3.0");
        assert_eq!(format_double(0.25), "0.25");
        assert_eq!(format_double(-2.5), "-2.5");
        assert_eq!(format_double(1e7), "1.0E7");
        assert_eq!(format_double(1.5e-5), "1.5E-5");
    }

    #[test]
    fn element_references_use_declared_bounds() {
        let reference = Reference::new(array(5, &[10, 20, 30]));
        assert_eq!(reference.element(6).get().unwrap(), Value::Integer(20));

        reference.element(7).set(Value::Integer(99)).unwrap();
        assert_eq!(reference.get().unwrap(), array(5, &[10, 20, 99]));

        let err = reference.element(8).get().unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::IndexOutOfBounds {
                index: 8,
                lower: 5,
                upper: 7
            }
        ));
    }

    #[test]
    fn string_characters_are_one_based() {
        let reference = Reference::new(Value::String("cat".to_string()));
        assert_eq!(reference.char_at(1).get().unwrap(), Value::Char('c'));
        reference.char_at(3).set(Value::Char('r')).unwrap();
        assert_eq!(reference.get().unwrap(), Value::String("car".to_string()));
    }

    #[test]
    fn pointers_compare_by_target() {
        let target = Reference::new(Value::Integer(1));
        let same = Value::Pointer(Some(target.clone()));
        let other = Value::Pointer(Some(Reference::new(Value::Integer(1))));
        assert_eq!(same, Value::Pointer(Some(target)));
        assert_ne!(same, other);
        assert_ne!(same, Value::Pointer(None));
    }

    #[test]
    fn with_ordinal_keeps_the_kind() {
        assert_eq!(Value::Char('a').with_ordinal(98).unwrap(), Value::Char('b'));
        assert!(Value::Integer(0).with_ordinal(i64::MAX).is_err());
    }
}
