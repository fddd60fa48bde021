//! Scope arena. Scopes link to their parent by [`ScopeId`], functions and
//! native routines live in flat tables addressed by id, and lookups walk the
//! parent chain applying a fixed precedence at every level: function,
//! constant, variable, then imported libraries and units.
//!
//! All identifiers are case-insensitive; maps are keyed by the lowercase
//! spelling.

use rustc_hash::FxHashMap;

use crate::ast::{Statement, VarRef};
use crate::native::NativeRoutine;
use crate::token::Position;
use crate::types::Type;
use crate::value::Value;

pub mod error;
pub mod overload;

pub use error::ScopeError;
pub use overload::{
    Applicable, ArgumentShape, Binding, OverloadFailure, ParamMode, Parameter, Signature,
};

pub const RESULT_VARIABLE: &str = "result";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(usize);

impl ScopeId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LibraryId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Callee {
    User(FunctionId),
    Native(NativeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Program,
    Unit,
    Function(FunctionId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Import {
    Library(LibraryId),
    Unit(ScopeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntityKind {
    Variable,
    Constant,
    Type,
    Function,
}

impl EntityKind {
    fn describe(self) -> &'static str {
        match self {
            EntityKind::Variable => "Variable",
            EntityKind::Constant => "Constant",
            EntityKind::Type => "Type",
            EntityKind::Function => "Routine",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub ty: Type,
    pub position: Position,
    /// Initial value when the declaration carries one.
    pub initial: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub name: String,
    pub value: Value,
    pub ty: Type,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub struct UserFunction {
    pub name: String,
    pub signature: Signature,
    /// Scope holding parameters, locals and the hidden result slot.
    pub scope: ScopeId,
    /// Scope the routine is declared in; its frame is the static link.
    pub declared_in: ScopeId,
    pub position: Position,
    pub body: Option<Statement>,
}

#[derive(Debug, Clone)]
pub struct ScopeContext {
    pub kind: ScopeKind,
    pub name: String,
    pub parent: Option<ScopeId>,
    functions: FxHashMap<String, Vec<Callee>>,
    variables: Vec<Variable>,
    variable_index: FxHashMap<String, usize>,
    constants: FxHashMap<String, Constant>,
    types: FxHashMap<String, Type>,
    declared: FxHashMap<String, (EntityKind, Position)>,
    imports: Vec<Import>,
}

impl ScopeContext {
    fn new(kind: ScopeKind, name: &str, parent: Option<ScopeId>) -> Self {
        Self {
            kind,
            name: name.to_string(),
            parent,
            functions: FxHashMap::default(),
            variables: Vec::new(),
            variable_index: FxHashMap::default(),
            constants: FxHashMap::default(),
            types: FxHashMap::default(),
            declared: FxHashMap::default(),
            imports: Vec::new(),
        }
    }

    /// Variables in declaration order.
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variable_index
            .get(&key(name))
            .map(|index| &self.variables[*index])
    }

    pub fn imports(&self) -> &[Import] {
        &self.imports
    }
}

/// Routines, constants and types exported by a native library.
#[derive(Debug, Clone, Default)]
pub struct LibraryScope {
    pub name: String,
    functions: FxHashMap<String, Vec<NativeId>>,
    constants: FxHashMap<String, Constant>,
    types: FxHashMap<String, Type>,
}

/// What a bare identifier resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    Functions(Vec<Callee>),
    Constant(Constant),
    Variable(VarRef, Type),
}

#[derive(Debug, Clone, Default)]
pub struct ScopeArena {
    scopes: Vec<ScopeContext>,
    functions: Vec<UserFunction>,
    natives: Vec<NativeRoutine>,
    libraries: Vec<LibraryScope>,
}

pub fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl ScopeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: ScopeKind, name: &str, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(ScopeContext::new(kind, name, parent));
        id
    }

    pub fn scope(&self, id: ScopeId) -> &ScopeContext {
        &self.scopes[id.0]
    }

    fn scope_mut(&mut self, id: ScopeId) -> &mut ScopeContext {
        &mut self.scopes[id.0]
    }

    pub fn function(&self, id: FunctionId) -> &UserFunction {
        &self.functions[id.0]
    }

    pub fn function_mut(&mut self, id: FunctionId) -> &mut UserFunction {
        &mut self.functions[id.0]
    }

    pub fn native(&self, id: NativeId) -> &NativeRoutine {
        &self.natives[id.0]
    }

    pub fn signature(&self, callee: Callee) -> &Signature {
        match callee {
            Callee::User(id) => &self.functions[id.0].signature,
            Callee::Native(id) => &self.natives[id.0].signature,
        }
    }

    pub fn callee_name(&self, callee: Callee) -> &str {
        match callee {
            Callee::User(id) => &self.functions[id.0].name,
            Callee::Native(id) => &self.natives[id.0].name,
        }
    }

    /// The function whose body scope is `scope`, if any.
    pub fn function_of(&self, scope: ScopeId) -> Option<FunctionId> {
        match self.scope(scope).kind {
            ScopeKind::Function(id) => Some(id),
            _ => None,
        }
    }

    fn claim(
        &mut self,
        scope: ScopeId,
        name: &str,
        kind: EntityKind,
        position: &Position,
    ) -> Result<(), ScopeError> {
        let context = self.scope_mut(scope);
        let key = key(name);
        if let Some((previous_kind, previous)) = context.declared.get(&key) {
            // Overloads share a name.
            if kind == EntityKind::Function && *previous_kind == EntityKind::Function {
                return Ok(());
            }
            return Err(ScopeError::NamingConflict {
                name: name.to_string(),
                kind: kind.describe(),
                position: position.clone(),
                previous_kind: previous_kind.describe(),
                previous: previous.clone(),
            });
        }
        context.declared.insert(key, (kind, position.clone()));
        Ok(())
    }

    pub fn declare_variable(
        &mut self,
        scope: ScopeId,
        variable: Variable,
    ) -> Result<VarRef, ScopeError> {
        self.claim(scope, &variable.name, EntityKind::Variable, &variable.position)?;
        let context = self.scope_mut(scope);
        let name = key(&variable.name);
        context
            .variable_index
            .insert(name.clone(), context.variables.len());
        context.variables.push(variable);
        Ok(VarRef { scope, name })
    }

    pub fn declare_constant(
        &mut self,
        scope: ScopeId,
        constant: Constant,
    ) -> Result<(), ScopeError> {
        self.claim(scope, &constant.name, EntityKind::Constant, &constant.position)?;
        self.scope_mut(scope)
            .constants
            .insert(key(&constant.name), constant);
        Ok(())
    }

    pub fn declare_type(
        &mut self,
        scope: ScopeId,
        name: &str,
        ty: Type,
        position: &Position,
    ) -> Result<(), ScopeError> {
        self.claim(scope, name, EntityKind::Type, position)?;
        self.scope_mut(scope).types.insert(key(name), ty);
        Ok(())
    }

    /// Declares a routine header. A header matching an earlier body-less
    /// declaration (a `forward` or interface header) returns that earlier
    /// routine instead of adding an overload.
    pub fn declare_function(
        &mut self,
        declared_in: ScopeId,
        name: &str,
        signature: Signature,
        position: &Position,
    ) -> Result<FunctionId, ScopeError> {
        let varargs = signature
            .params
            .iter()
            .position(|param| matches!(param.ty, Type::Varargs(_)));
        if let Some(index) = varargs
            && index + 1 != signature.params.len()
        {
            return Err(ScopeError::MisplacedVarargs {
                name: signature.params[index].name.clone(),
                position: position.clone(),
            });
        }

        self.claim(declared_in, name, EntityKind::Function, position)?;
        let existing = self
            .scope(declared_in)
            .functions
            .get(&key(name))
            .into_iter()
            .flatten()
            .find_map(|callee| match callee {
                Callee::User(id) if self.functions[id.0].signature.same_parameters(&signature) => {
                    Some(*id)
                }
                _ => None,
            });
        if let Some(id) = existing {
            let function = &self.functions[id.0];
            if function.body.is_some() {
                return Err(ScopeError::DuplicateBody {
                    name: name.to_string(),
                    position: position.clone(),
                    previous: function.position.clone(),
                });
            }
            if function.signature.result != signature.result {
                return Err(ScopeError::NamingConflict {
                    name: name.to_string(),
                    kind: EntityKind::Function.describe(),
                    position: position.clone(),
                    previous_kind: EntityKind::Function.describe(),
                    previous: function.position.clone(),
                });
            }
            return Ok(id);
        }

        let id = FunctionId(self.functions.len());
        let scope = self.push(ScopeKind::Function(id), name, Some(declared_in));
        self.functions.push(UserFunction {
            name: name.to_string(),
            signature,
            scope,
            declared_in,
            position: position.clone(),
            body: None,
        });
        self.scope_mut(declared_in)
            .functions
            .entry(key(name))
            .or_default()
            .push(Callee::User(id));
        Ok(id)
    }

    pub fn add_library(&mut self, name: &str, routines: Vec<NativeRoutine>) -> LibraryId {
        let id = LibraryId(self.libraries.len());
        let mut library = LibraryScope {
            name: key(name),
            ..LibraryScope::default()
        };
        for routine in routines {
            let native = NativeId(self.natives.len());
            library
                .functions
                .entry(key(&routine.name))
                .or_default()
                .push(native);
            self.natives.push(routine);
        }
        self.libraries.push(library);
        id
    }

    pub fn add_library_constant(&mut self, library: LibraryId, constant: Constant) {
        self.libraries[library.0]
            .constants
            .insert(key(&constant.name), constant);
    }

    pub fn add_library_type(&mut self, library: LibraryId, name: &str, ty: Type) {
        self.libraries[library.0].types.insert(key(name), ty);
    }

    pub fn library_named(&self, name: &str) -> Option<LibraryId> {
        let name = key(name);
        self.libraries
            .iter()
            .position(|library| library.name == name)
            .map(LibraryId)
    }

    pub fn import(&mut self, scope: ScopeId, import: Import) {
        let imports = &mut self.scope_mut(scope).imports;
        if !imports.contains(&import) {
            imports.push(import);
        }
    }

    /// Resolves a bare identifier. Routines that cannot be called without
    /// arguments do not hide constants and variables, at the same level or
    /// further out. They are returned only when nothing else matches.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<Symbol> {
        let name = key(name);
        let mut nearest_routines = None;
        let mut current = Some(scope);
        while let Some(id) = current {
            let context = self.scope(id);
            if let Some(callees) = context.functions.get(&name) {
                let mut callees = callees.clone();
                extend_unique(&mut callees, self.imported_functions(id, &name));
                if self.any_zero_argument(&callees) {
                    return Some(Symbol::Functions(callees));
                }
                nearest_routines.get_or_insert(callees);
            }
            if let Some(constant) = context.constants.get(&name) {
                return Some(Symbol::Constant(constant.clone()));
            }
            if let Some(variable) = context.variable(&name) {
                return Some(Symbol::Variable(
                    VarRef {
                        scope: id,
                        name: name.clone(),
                    },
                    variable.ty.clone(),
                ));
            }
            match self.lookup_imports(id, &name) {
                Some(Symbol::Functions(callees)) if !self.any_zero_argument(&callees) => {
                    nearest_routines.get_or_insert(callees);
                }
                Some(symbol) => return Some(symbol),
                None => {}
            }
            current = context.parent;
        }
        nearest_routines.map(Symbol::Functions)
    }

    /// Resolves a name that is followed by an argument list: the nearest
    /// routines win over any constant or variable.
    pub fn lookup_routine(&self, scope: ScopeId, name: &str) -> Option<Symbol> {
        self.candidate_levels(scope, name)
            .into_iter()
            .next()
            .map(Symbol::Functions)
    }

    fn lookup_imports(&self, scope: ScopeId, name: &str) -> Option<Symbol> {
        for import in &self.scope(scope).imports {
            match *import {
                Import::Library(library) => {
                    let library = &self.libraries[library.0];
                    if let Some(natives) = library.functions.get(name) {
                        let mut callees = natives.iter().copied().map(Callee::Native).collect();
                        let extra = self.imported_functions(scope, name);
                        extend_unique(&mut callees, extra);
                        return Some(Symbol::Functions(callees));
                    }
                    if let Some(constant) = library.constants.get(name) {
                        return Some(Symbol::Constant(constant.clone()));
                    }
                }
                Import::Unit(unit) => {
                    let context = self.scope(unit);
                    if let Some(callees) = context.functions.get(name) {
                        let mut callees = callees.clone();
                        let extra = self.imported_functions(scope, name);
                        extend_unique(&mut callees, extra);
                        return Some(Symbol::Functions(callees));
                    }
                    if let Some(constant) = context.constants.get(name) {
                        return Some(Symbol::Constant(constant.clone()));
                    }
                    if let Some(variable) = context.variable(name) {
                        return Some(Symbol::Variable(
                            VarRef {
                                scope: unit,
                                name: name.to_string(),
                            },
                            variable.ty.clone(),
                        ));
                    }
                }
            }
        }
        None
    }

    /// Overload candidates for a call: the nearest level that declares or
    /// imports the name first, then each enclosing level.
    pub fn candidate_levels(&self, scope: ScopeId, name: &str) -> Vec<Vec<Callee>> {
        let name = key(name);
        let mut levels = Vec::new();
        let mut current = Some(scope);
        while let Some(id) = current {
            let context = self.scope(id);
            let mut callees = context.functions.get(&name).cloned().unwrap_or_default();
            extend_unique(&mut callees, self.imported_functions(id, &name));
            if !callees.is_empty() {
                levels.push(callees);
            }
            current = context.parent;
        }
        levels
    }

    fn imported_functions(&self, scope: ScopeId, name: &str) -> Vec<Callee> {
        let mut callees = Vec::new();
        for import in &self.scope(scope).imports {
            match *import {
                Import::Library(library) => {
                    if let Some(natives) = self.libraries[library.0].functions.get(name) {
                        callees.extend(natives.iter().copied().map(Callee::Native));
                    }
                }
                Import::Unit(unit) => {
                    if let Some(found) = self.scope(unit).functions.get(name) {
                        callees.extend(found.iter().copied());
                    }
                }
            }
        }
        callees
    }

    fn any_zero_argument(&self, callees: &[Callee]) -> bool {
        callees
            .iter()
            .any(|callee| overload::applicable(self.signature(*callee), &[]).is_some())
    }

    pub fn lookup_type(&self, scope: ScopeId, name: &str) -> Option<Type> {
        let name = key(name);
        let mut current = Some(scope);
        while let Some(id) = current {
            let context = self.scope(id);
            if let Some(ty) = context.types.get(&name) {
                return Some(ty.clone());
            }
            for import in &context.imports {
                let found = match *import {
                    Import::Library(library) => self.libraries[library.0].types.get(&name),
                    Import::Unit(unit) => self.scope(unit).types.get(&name),
                };
                if let Some(ty) = found {
                    return Some(ty.clone());
                }
            }
            current = context.parent;
        }
        None
    }

    /// Routines declared with a header but never given a body.
    pub fn missing_bodies(&self) -> Vec<&UserFunction> {
        self.functions
            .iter()
            .filter(|function| function.body.is_none())
            .collect()
    }

    pub fn functions(&self) -> impl Iterator<Item = (FunctionId, &UserFunction)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(index, function)| (FunctionId(index), function))
    }
}

fn extend_unique(callees: &mut Vec<Callee>, extra: Vec<Callee>) {
    for callee in extra {
        if !callees.contains(&callee) {
            callees.push(callee);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(line: usize) -> Position {
        Position::new("test".into(), line, 1)
    }

    fn variable(name: &str, ty: Type, line: usize) -> Variable {
        Variable {
            name: name.to_string(),
            ty,
            position: position(line),
            initial: None,
        }
    }

    fn constant(name: &str, value: i32, line: usize) -> Constant {
        Constant {
            name: name.to_string(),
            value: Value::Integer(value),
            ty: Type::INTEGER,
            position: position(line),
        }
    }

    #[test]
    fn lookup_walks_to_parent_and_ignores_case() {
        let mut arena = ScopeArena::new();
        let global = arena.push(ScopeKind::Program, "main", None);
        arena
            .declare_variable(global, variable("Counter", Type::INTEGER, 1))
            .unwrap();
        let id = arena
            .declare_function(global, "f", Signature::new(vec![], None), &position(2))
            .unwrap();
        let local = arena.function(id).scope;

        let Some(Symbol::Variable(var, ty)) = arena.lookup(local, "COUNTER") else {
            panic!("expected variable");
        };
        assert_eq!(var.scope, global);
        assert_eq!(var.name, "counter");
        assert_eq!(ty, Type::INTEGER);
        assert_eq!(arena.lookup(local, "missing"), None);
    }

    #[test]
    fn local_declarations_shadow_outer_ones() {
        let mut arena = ScopeArena::new();
        let global = arena.push(ScopeKind::Program, "main", None);
        arena.declare_constant(global, constant("x", 1, 1)).unwrap();
        let inner = arena.push(ScopeKind::Unit, "inner", Some(global));
        arena
            .declare_variable(inner, variable("x", Type::CHAR, 2))
            .unwrap();
        assert!(matches!(
            arena.lookup(inner, "x"),
            Some(Symbol::Variable(_, Type::Basic(crate::types::BasicType::Char)))
        ));
        assert!(matches!(arena.lookup(global, "x"), Some(Symbol::Constant(_))));
    }

    #[test]
    fn conflicting_declarations_name_both_sites() {
        let mut arena = ScopeArena::new();
        let global = arena.push(ScopeKind::Program, "main", None);
        arena
            .declare_variable(global, variable("total", Type::INTEGER, 3))
            .unwrap();
        let err = arena
            .declare_constant(global, constant("TOTAL", 1, 7))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Constant 'TOTAL' declared at test:7:1 conflicts with Variable 'TOTAL' declared at test:3:1"
        );
    }

    #[test]
    fn overloads_share_a_name_but_not_a_signature() {
        let mut arena = ScopeArena::new();
        let global = arena.push(ScopeKind::Program, "main", None);
        let int = Signature::new(vec![Parameter::value("x", Type::INTEGER)], None);
        let real = Signature::new(vec![Parameter::value("x", Type::DOUBLE)], None);
        let a = arena
            .declare_function(global, "show", int.clone(), &position(1))
            .unwrap();
        arena
            .declare_function(global, "show", real, &position(2))
            .unwrap();
        assert_eq!(arena.candidate_levels(global, "SHOW")[0].len(), 2);

        // A second header with the same parameters refers to the first one
        // until it has a body.
        let again = arena
            .declare_function(global, "show", int.clone(), &position(3))
            .unwrap();
        assert_eq!(again, a);
        arena.function_mut(a).body = Some(Statement::empty(position(4)));
        assert!(matches!(
            arena.declare_function(global, "show", int, &position(5)),
            Err(ScopeError::DuplicateBody { .. })
        ));
    }

    #[test]
    fn varargs_must_come_last() {
        let mut arena = ScopeArena::new();
        let global = arena.push(ScopeKind::Program, "main", None);
        let signature = Signature::new(
            vec![
                Parameter::value("rest", Type::varargs(Type::ANY)),
                Parameter::value("x", Type::INTEGER),
            ],
            None,
        );
        assert!(matches!(
            arena.declare_function(global, "bad", signature, &position(1)),
            Err(ScopeError::MisplacedVarargs { .. })
        ));
    }

    #[test]
    fn bare_name_prefers_zero_argument_routine() {
        let mut arena = ScopeArena::new();
        let global = arena.push(ScopeKind::Program, "main", None);
        arena.declare_constant(global, constant("size", 3, 1)).unwrap();
        let inner = arena.push(ScopeKind::Unit, "inner", Some(global));
        arena
            .declare_function(
                inner,
                "size",
                Signature::new(vec![Parameter::value("x", Type::INTEGER)], Some(Type::INTEGER)),
                &position(2),
            )
            .unwrap();
        // Only a one-argument overload: the outer constant stays visible.
        assert!(matches!(arena.lookup(inner, "size"), Some(Symbol::Constant(_))));
        assert!(matches!(
            arena.lookup_routine(inner, "size"),
            Some(Symbol::Functions(_))
        ));
        assert_eq!(arena.lookup(inner, "width"), None);

        arena
            .declare_function(
                inner,
                "size",
                Signature::new(vec![], Some(Type::INTEGER)),
                &position(3),
            )
            .unwrap();
        let Some(Symbol::Functions(callees)) = arena.lookup(inner, "size") else {
            panic!("expected routine");
        };
        assert_eq!(callees.len(), 2);
    }
}
