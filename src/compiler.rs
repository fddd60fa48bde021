//! Front end: walks the grouped token tree of a program and the units it
//! uses, declaring everything in a [`ScopeArena`] and building the typed
//! tree the runtime executes.

use std::path::PathBuf;

use crate::native::LibraryRegistry;
use crate::runtime::Program;
use crate::scope::{ScopeArena, ScopeId};

mod cursor;
mod declarations;
pub mod error;
mod expressions;
mod statements;
mod units;

pub use error::{CompileError, CompileResult, SyntaxError};

use units::Session;

#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Directories searched for include files and units.
    pub search_path: Vec<PathBuf>,
    pub fold_constants: bool,
    /// Native libraries `uses` clauses resolve against before the search
    /// path.
    pub libraries: LibraryRegistry,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            search_path: Vec::new(),
            fold_constants: true,
            libraries: LibraryRegistry::standard(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn compile(&self, source: &str, unit_name: &str) -> CompileResult<Program> {
        Session::new(&self.options).compile_program(source, unit_name)
    }
}

/// Compiles `source` with the standard libraries and constant folding.
pub fn compile(
    source: &str,
    unit_name: &str,
    search_path: &[PathBuf],
) -> CompileResult<Program> {
    let options = CompileOptions {
        search_path: search_path.to_vec(),
        ..CompileOptions::default()
    };
    Compiler::new(options).compile(source, unit_name)
}

/// Declaration and body builder for one scope at a time.
pub(crate) struct Builder<'a> {
    arena: &'a mut ScopeArena,
    scope: ScopeId,
    /// Enclosing loops in the routine being built.
    loop_depth: usize,
}

impl<'a> Builder<'a> {
    pub(crate) fn new(arena: &'a mut ScopeArena, scope: ScopeId) -> Self {
        Self {
            arena,
            scope,
            loop_depth: 0,
        }
    }

    fn in_loop<T>(&mut self, parse: impl FnOnce(&mut Self) -> CompileResult<T>) -> CompileResult<T> {
        self.loop_depth += 1;
        let parsed = parse(self);
        self.loop_depth -= 1;
        parsed
    }
}
