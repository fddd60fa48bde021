//! Declarative native bindings. A library lists its routines up front, each
//! with a parameter table derived from host types via [`HostType`], so the
//! compiler can type-check calls without any runtime introspection.

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::io::{InputCursor, IoHandler};
use crate::runtime::cancel::CancellationToken;
use crate::scope::{ParamMode, Parameter, Signature};
use crate::types::{Subrange, Type};
use crate::value::{Reference, Value};

pub mod crt;
pub mod math;
pub mod system;
pub mod text_io;

/// Host services a routine may use while it runs.
pub struct HostContext<'a> {
    pub io: &'a mut dyn IoHandler,
    pub input: &'a mut InputCursor,
    pub cancel: &'a CancellationToken,
}

/// Invocation thunk. Arguments arrive already converted to the parameter
/// types, with trailing varargs flattened after the fixed ones; `var`
/// parameters arrive as `Value::Pointer` to the caller's storage. Returning a [`RuntimeError`](crate::runtime::error::RuntimeError)
/// inside the `anyhow::Error` reports a language-level failure; anything
/// else is treated as a fault of the routine itself.
pub type NativeFn = fn(&mut HostContext<'_>, &[Value]) -> anyhow::Result<Option<Value>>;

#[derive(Clone)]
pub struct NativeRoutine {
    pub name: String,
    pub signature: Signature,
    pub thunk: NativeFn,
}

impl fmt::Debug for NativeRoutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeRoutine")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish()
    }
}

impl NativeRoutine {
    pub fn new(name: &str, thunk: NativeFn) -> Self {
        Self {
            name: name.to_string(),
            signature: Signature::new(Vec::new(), None),
            thunk,
        }
    }

    pub fn param<T: HostType>(mut self, name: &str) -> Self {
        self.signature.params.push(Parameter::value(name, T::pascal_type()));
        self
    }

    pub fn var<T: HostType>(mut self, name: &str) -> Self {
        self.signature.params.push(Parameter {
            name: name.to_string(),
            ty: T::pascal_type(),
            mode: ParamMode::Var,
        });
        self
    }

    pub fn returns<T: HostType>(mut self) -> Self {
        self.signature.result = Some(T::pascal_type());
        self
    }
}

/// A pluggable set of routines, constants and types imported by name.
pub trait NativeLibrary {
    fn name(&self) -> &'static str;

    fn routines(&self) -> Vec<NativeRoutine>;

    fn constants(&self) -> Vec<(&'static str, Value, Type)> {
        Vec::new()
    }

    fn types(&self) -> Vec<(&'static str, Type)> {
        Vec::new()
    }
}

/// Libraries available to `uses` clauses, looked up before the source
/// search path.
#[derive(Clone, Default)]
pub struct LibraryRegistry {
    libraries: Vec<Rc<dyn NativeLibrary>>,
}

impl LibraryRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// `system`, `math` and `crt`.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(system::System);
        registry.register(math::Math);
        registry.register(crt::Crt);
        registry
    }

    pub fn register(&mut self, library: impl NativeLibrary + 'static) {
        self.libraries.push(Rc::new(library));
    }

    pub fn get(&self, name: &str) -> Option<&dyn NativeLibrary> {
        self.libraries
            .iter()
            .find(|library| library.name().eq_ignore_ascii_case(name))
            .map(|library| library.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.libraries.iter().map(|library| library.name()).collect()
    }
}

impl fmt::Debug for LibraryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Maps a host type to the Pascal type of a routine parameter or result.
pub trait HostType {
    fn pascal_type() -> Type;
}

impl HostType for bool {
    fn pascal_type() -> Type {
        Type::BOOLEAN
    }
}

impl HostType for char {
    fn pascal_type() -> Type {
        Type::CHAR
    }
}

impl HostType for i32 {
    fn pascal_type() -> Type {
        Type::INTEGER
    }
}

impl HostType for i64 {
    fn pascal_type() -> Type {
        Type::LONG
    }
}

impl HostType for f64 {
    fn pascal_type() -> Type {
        Type::DOUBLE
    }
}

impl HostType for String {
    fn pascal_type() -> Type {
        Type::STRING
    }
}

/// A sequence without declared bounds becomes an open array.
impl<T: HostType> HostType for Vec<T> {
    fn pascal_type() -> Type {
        Type::array(T::pascal_type(), Subrange::UNBOUNDED)
    }
}

/// Accepts a value of any type.
pub struct Any;

impl HostType for Any {
    fn pascal_type() -> Type {
        Type::ANY
    }
}

/// Pointer-like wrapper; unwraps to a pointer to `T`.
pub struct Ptr<T>(PhantomData<T>);

impl<T: HostType> HostType for Ptr<T> {
    fn pascal_type() -> Type {
        Type::pointer(T::pascal_type())
    }
}

/// Sequence with declared start index and length.
pub struct Bounded<T, const START: i64, const LEN: i64>(PhantomData<T>);

impl<T: HostType, const START: i64, const LEN: i64> HostType for Bounded<T, START, LEN> {
    fn pascal_type() -> Type {
        Type::array(T::pascal_type(), Subrange::new(START, LEN))
    }
}

/// Trailing variadic parameter.
pub struct Varargs<T>(PhantomData<T>);

impl<T: HostType> HostType for Varargs<T> {
    fn pascal_type() -> Type {
        Type::varargs(T::pascal_type())
    }
}

pub(crate) fn arg(args: &[Value], index: usize) -> anyhow::Result<&Value> {
    args.get(index)
        .ok_or_else(|| anyhow::anyhow!("missing argument {index}"))
}

/// Storage behind a `var` argument.
pub(crate) fn reference(args: &[Value], index: usize) -> anyhow::Result<&Reference> {
    match arg(args, index)? {
        Value::Pointer(Some(reference)) => Ok(reference),
        other => anyhow::bail!("argument {index} is not a reference: {}", other.type_name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut HostContext<'_>, _: &[Value]) -> anyhow::Result<Option<Value>> {
        Ok(None)
    }

    #[test]
    fn host_types_map_to_descriptors() {
        assert_eq!(<Vec<f64>>::pascal_type().to_string(), "array of double");
        assert_eq!(
            <Bounded<char, 1, 3>>::pascal_type(),
            Type::array(Type::CHAR, Subrange::new(1, 3))
        );
        assert_eq!(<Ptr<i64>>::pascal_type(), Type::pointer(Type::LONG));
        assert_eq!(<Varargs<Any>>::pascal_type(), Type::varargs(Type::ANY));
    }

    #[test]
    fn routine_builder_collects_signature() {
        let routine = NativeRoutine::new("blend", noop)
            .param::<i32>("a")
            .var::<String>("out")
            .returns::<bool>();
        assert_eq!(routine.signature.params.len(), 2);
        assert_eq!(routine.signature.params[1].mode, ParamMode::Var);
        assert_eq!(routine.signature.result, Some(Type::BOOLEAN));
    }

    #[test]
    fn registry_finds_libraries_case_insensitively() {
        let registry = LibraryRegistry::standard();
        assert!(registry.get("MATH").is_some());
        assert!(registry.get("graph").is_none());
        assert_eq!(registry.names(), vec!["system", "math", "crt"]);
    }
}
