use std::fs;

use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::ast::Statement;
use crate::grouping::{GroupKind, assemble, find_in_path};
use crate::runtime::{Program, UnitCode};
use crate::scope::{
    Constant, FunctionId, Import, LibraryId, ScopeArena, ScopeError, ScopeId, ScopeKind, key,
};
use crate::token::{Position, TokenKind};

use super::Builder;
use super::CompileOptions;
use super::cursor::Cursor;
use super::declarations::Section;
use super::error::CompileResult;

const SYSTEM_LIBRARY: &str = "system";

enum UnitState {
    Loading,
    Loaded(ScopeId),
}

/// One compilation: the main program plus every unit it pulls in, sharing
/// one arena. Units are compiled once and recorded in dependency order.
pub(crate) struct Session<'o> {
    options: &'o CompileOptions,
    arena: ScopeArena,
    units: FxHashMap<String, UnitState>,
    unit_code: Vec<UnitCode>,
}

impl<'o> Session<'o> {
    pub(crate) fn new(options: &'o CompileOptions) -> Self {
        Self {
            options,
            arena: ScopeArena::new(),
            units: FxHashMap::default(),
            unit_code: Vec::new(),
        }
    }

    pub(crate) fn compile_program(mut self, source: &str, unit_name: &str) -> CompileResult<Program> {
        let root = assemble(source, unit_name, &self.options.search_path);
        let scope = self.arena.push(ScopeKind::Program, unit_name, None);
        self.import_system(scope);

        let mut cursor = Cursor::new(&root);
        if cursor.eat(&TokenKind::Program) {
            cursor.expect_identifier()?;
            if cursor.peek_group(GroupKind::Paren).is_some() {
                cursor.advance();
            }
            cursor.expect(&TokenKind::Semicolon)?;
        }
        self.parse_uses(&mut cursor, scope)?;

        let mut builder = Builder::new(&mut self.arena, scope);
        builder.parse_declarations(&mut cursor, Section::Definitions)?;
        let main = cursor.expect_group(GroupKind::Begin)?;
        let body = builder.parse_block(main)?;
        cursor.expect(&TokenKind::Dot)?;
        cursor.expect_done()?;
        if let Some(error) = root.errors().first() {
            return Err((*error).clone().into());
        }

        if let Some(function) = self.arena.missing_bodies().first() {
            return Err(ScopeError::MissingBody {
                name: function.name.clone(),
                position: function.position.clone(),
            }
            .into());
        }

        let mut program = Program {
            arena: self.arena,
            main: scope,
            body,
            units: self.unit_code,
        };
        if self.options.fold_constants {
            fold_program(&mut program);
        }
        info!(
            unit = unit_name,
            units = program.units.len(),
            routines = program.arena.functions().count(),
            "compiled program"
        );
        Ok(program)
    }

    fn import_system(&mut self, scope: ScopeId) {
        if let Some(library) = self.import_library(SYSTEM_LIBRARY) {
            self.arena.import(scope, Import::Library(library));
        }
    }

    /// Registers a native library in the arena on first use.
    fn import_library(&mut self, name: &str) -> Option<LibraryId> {
        if let Some(id) = self.arena.library_named(name) {
            return Some(id);
        }
        let library = self.options.libraries.get(name)?;
        let id = self.arena.add_library(library.name(), library.routines());
        let position = Position::start_of(library.name());
        for (name, value, ty) in library.constants() {
            self.arena.add_library_constant(
                id,
                Constant {
                    name: name.to_string(),
                    value,
                    ty,
                    position: position.clone(),
                },
            );
        }
        for (name, ty) in library.types() {
            self.arena.add_library_type(id, name, ty);
        }
        debug!(library = library.name(), "imported native library");
        Some(id)
    }

    /// `uses a, b;` resolves each name against the native libraries first,
    /// then against `<name>.pas` on the search path.
    fn parse_uses(&mut self, cursor: &mut Cursor<'_>, scope: ScopeId) -> CompileResult<()> {
        if !cursor.eat(&TokenKind::Uses) {
            return Ok(());
        }
        loop {
            let (name, position) = cursor.expect_identifier()?;
            let import = match self.import_library(&name) {
                Some(library) => Import::Library(library),
                None => Import::Unit(self.load_unit(&name, &position)?),
            };
            self.arena.import(scope, import);
            if !cursor.eat(&TokenKind::Comma) {
                break;
            }
        }
        cursor.expect(&TokenKind::Semicolon)?;
        Ok(())
    }

    fn load_unit(&mut self, name: &str, position: &Position) -> CompileResult<ScopeId> {
        let unit_key = key(name);
        match self.units.get(&unit_key) {
            Some(UnitState::Loaded(scope)) => return Ok(*scope),
            Some(UnitState::Loading) => {
                return Err(ScopeError::CircularUnit {
                    name: name.to_string(),
                    position: position.clone(),
                }
                .into());
            }
            None => {}
        }

        let search_path = &self.options.search_path;
        let path = find_in_path(search_path, &format!("{name}.pas"))
            .or_else(|| find_in_path(search_path, &format!("{unit_key}.pas")))
            .ok_or_else(|| ScopeError::LibraryNotFound {
                name: name.to_string(),
                position: position.clone(),
            })?;
        let source = fs::read_to_string(&path).map_err(|error| ScopeError::LibraryUnreadable {
            name: name.to_string(),
            message: error.to_string(),
            position: position.clone(),
        })?;
        debug!(unit = name, path = %path.display(), "loading unit");

        self.units.insert(unit_key.clone(), UnitState::Loading);
        let scope = self.compile_unit(&source, name)?;
        self.units.insert(unit_key, UnitState::Loaded(scope));
        Ok(scope)
    }

    /// `unit name; interface ... implementation ... [initialization ...]
    /// [finalization ...] end.`
    fn compile_unit(&mut self, source: &str, name: &str) -> CompileResult<ScopeId> {
        let root = assemble(source, name, &self.options.search_path);
        let scope = self.arena.push(ScopeKind::Unit, name, None);
        self.import_system(scope);

        let mut cursor = Cursor::new(&root);
        let unit = cursor.expect_group(GroupKind::Unit)?;
        cursor.expect(&TokenKind::Dot)?;
        cursor.expect_done()?;

        let mut body = Cursor::new(unit);
        body.expect_identifier()?;
        body.expect(&TokenKind::Semicolon)?;
        body.expect(&TokenKind::Interface)?;
        self.parse_uses(&mut body, scope)?;
        Builder::new(&mut self.arena, scope).parse_declarations(&mut body, Section::Interface)?;

        body.expect(&TokenKind::Implementation)?;
        self.parse_uses(&mut body, scope)?;
        let mut builder = Builder::new(&mut self.arena, scope);
        builder.parse_declarations(&mut body, Section::Definitions)?;
        let initialization = if body.eat(&TokenKind::Initialization) {
            Some(builder.parse_initialization(&mut body)?)
        } else {
            None
        };
        let finalization = if body.eat(&TokenKind::Finalization) {
            Some(builder.parse_finalization(&mut body)?)
        } else {
            None
        };
        body.expect_done()?;
        if let Some(error) = root.errors().first() {
            return Err((*error).clone().into());
        }

        self.unit_code.push(UnitCode {
            name: name.to_string(),
            scope,
            initialization,
            finalization,
        });
        Ok(scope)
    }
}

fn fold_statement(statement: &mut Statement) {
    let position = statement.position.clone();
    let taken = std::mem::replace(statement, Statement::empty(position));
    *statement = taken.fold();
}

fn fold_program(program: &mut Program) {
    fold_statement(&mut program.body);
    let functions: Vec<FunctionId> = program.arena.functions().map(|(id, _)| id).collect();
    for id in functions {
        if let Some(body) = program.arena.function_mut(id).body.as_mut() {
            fold_statement(body);
        }
    }
    for unit in &mut program.units {
        for section in [&mut unit.initialization, &mut unit.finalization] {
            if let Some(statement) = section.as_mut() {
                fold_statement(statement);
            }
        }
    }
    debug!("folded constant expressions");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use indoc::indoc;

    use crate::compiler::{CompileError, compile};
    use crate::scope::ScopeError;

    fn unit_dir(name: &str, files: &[(&str, &str)]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pascal-units-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        for (file, contents) in files {
            fs::write(dir.join(file), contents).unwrap();
        }
        dir
    }

    #[test]
    fn units_are_compiled_once_in_dependency_order() {
        let dir = unit_dir(
            "order",
            &[
                (
                    "base.pas",
                    indoc! {"
                        unit base;
                        interface
                        function seed: integer;
                        implementation
                        function seed: integer;
                        begin
                          seed := 7;
                        end;
                        end.
                    "},
                ),
                (
                    "middle.pas",
                    indoc! {"
                        unit middle;
                        interface
                        uses base;
                        function grown: integer;
                        implementation
                        function grown: integer;
                        begin
                          grown := seed * 2;
                        end;
                        end.
                    "},
                ),
            ],
        );
        let program = compile(
            indoc! {"
                program main;
                uses base, middle;
                begin
                  writeln(seed + grown);
                end.
            "},
            "main",
            &[dir.clone()],
        )
        .unwrap();
        let names: Vec<_> = program.units.iter().map(|unit| unit.name.as_str()).collect();
        assert_eq!(names, ["base", "middle"]);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn circular_units_are_rejected() {
        let dir = unit_dir(
            "cycle",
            &[
                (
                    "ping.pas",
                    "unit ping; interface uses pong; implementation end.",
                ),
                (
                    "pong.pas",
                    "unit pong; interface uses ping; implementation end.",
                ),
            ],
        );
        let err = compile("uses ping; begin end.", "main", &[dir.clone()]).unwrap_err();
        assert!(matches!(
            err,
            CompileError::Scope(ScopeError::CircularUnit { ref name, .. }) if name == "ping"
        ));
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn missing_units_are_reported() {
        let err = compile("uses graph; begin end.", "main", &[]).unwrap_err();
        assert_eq!(err.to_string(), "Library 'graph' not found at main:1:6");
    }

    #[test]
    fn native_libraries_need_no_file() {
        compile(
            indoc! {"
                uses math, crt;
                begin
                  writeln(max(1, 2), sin(0.0));
                  delay(0);
                end.
            "},
            "main",
            &[],
        )
        .unwrap();
    }
}
