use tracing::debug;

use crate::ast::Statement;
use crate::grouping::{Group, GroupKind, TokenTree};
use crate::scope::{
    Constant, FunctionId, ParamMode, Parameter, RESULT_VARIABLE, ScopeError, Signature, Symbol,
    Variable, key,
};
use crate::token::{Position, TokenKind};
use crate::types::{Subrange, Type, TypeError};
use crate::value::Value;

use super::Builder;
use super::cursor::Cursor;
use super::error::{CompileResult, SyntaxError};

/// Where a declaration block sits. Interface sections declare routine
/// headers only; their bodies follow in the implementation section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Section {
    Definitions,
    Interface,
}

fn builtin_type(name: &str) -> Option<Type> {
    let ty = match key(name).as_str() {
        "integer" | "byte" | "shortint" | "smallint" | "word" | "longint" | "cardinal" => {
            Type::INTEGER
        }
        "int64" | "qword" => Type::LONG,
        "real" | "single" | "double" | "extended" => Type::DOUBLE,
        "boolean" => Type::BOOLEAN,
        "char" => Type::CHAR,
        "string" => Type::STRING,
        _ => return None,
    };
    Some(ty)
}

impl Builder<'_> {
    pub(crate) fn parse_declarations(
        &mut self,
        cursor: &mut Cursor<'_>,
        section: Section,
    ) -> CompileResult<()> {
        loop {
            match cursor.peek_kind() {
                Some(TokenKind::Const) => {
                    cursor.advance();
                    self.parse_constants(cursor)?;
                }
                Some(TokenKind::Type) => {
                    cursor.advance();
                    self.parse_type_aliases(cursor)?;
                }
                Some(TokenKind::Var) => {
                    cursor.advance();
                    self.parse_variables(cursor)?;
                }
                Some(TokenKind::Procedure | TokenKind::Function) => {
                    self.parse_routine(cursor, section)?;
                }
                _ => return Ok(()),
            }
        }
    }

    fn at_identifier(cursor: &Cursor<'_>) -> bool {
        matches!(cursor.peek_kind(), Some(TokenKind::Identifier(_)))
    }

    /// `name = expr;` folds to a constant. `name: T = value;` is a typed
    /// constant, stored as an initialized variable.
    fn parse_constants(&mut self, cursor: &mut Cursor<'_>) -> CompileResult<()> {
        while Self::at_identifier(cursor) {
            let (name, position) = cursor.expect_identifier()?;
            if cursor.eat(&TokenKind::Colon) {
                let ty = self.parse_type(cursor)?;
                cursor.expect(&TokenKind::Equal)?;
                let initial = self.parse_initializer(cursor, &ty)?;
                self.arena.declare_variable(
                    self.scope,
                    Variable {
                        name,
                        ty,
                        position,
                        initial: Some(initial),
                    },
                )?;
            } else {
                cursor.expect(&TokenKind::Equal)?;
                let expression = self.parse_expression(cursor)?;
                let (value, ty) = self.evaluate_constant(expression, None)?;
                self.arena.declare_constant(
                    self.scope,
                    Constant {
                        name,
                        value,
                        ty,
                        position,
                    },
                )?;
            }
            cursor.expect(&TokenKind::Semicolon)?;
        }
        Ok(())
    }

    fn parse_type_aliases(&mut self, cursor: &mut Cursor<'_>) -> CompileResult<()> {
        while Self::at_identifier(cursor) {
            let (name, position) = cursor.expect_identifier()?;
            cursor.expect(&TokenKind::Equal)?;
            let ty = self.parse_type(cursor)?;
            cursor.expect(&TokenKind::Semicolon)?;
            self.arena.declare_type(self.scope, &name, ty, &position)?;
        }
        Ok(())
    }

    fn parse_variables(&mut self, cursor: &mut Cursor<'_>) -> CompileResult<()> {
        while Self::at_identifier(cursor) {
            let mut names = vec![cursor.expect_identifier()?];
            while cursor.eat(&TokenKind::Comma) {
                names.push(cursor.expect_identifier()?);
            }
            cursor.expect(&TokenKind::Colon)?;
            let ty = self.parse_type(cursor)?;
            let initial = if cursor.eat(&TokenKind::Equal) {
                Some(self.parse_initializer(cursor, &ty)?)
            } else {
                None
            };
            cursor.expect(&TokenKind::Semicolon)?;
            for (name, position) in names {
                self.arena.declare_variable(
                    self.scope,
                    Variable {
                        name,
                        ty: ty.clone(),
                        position,
                        initial: initial.clone(),
                    },
                )?;
            }
        }
        Ok(())
    }

    /// A constant value of type `ty`. Array values are written as
    /// parenthesized lists, nested once per dimension.
    fn parse_initializer(&mut self, cursor: &mut Cursor<'_>, ty: &Type) -> CompileResult<Value> {
        if let Type::Array { element, bounds } = ty
            && let Some(group) = cursor.peek_group(GroupKind::Paren)
        {
            cursor.advance();
            let mut inner = Cursor::new(group);
            let mut items = Vec::new();
            while !inner.is_done() {
                items.push(self.parse_initializer(&mut inner, element)?);
                if !inner.eat(&TokenKind::Comma) {
                    break;
                }
            }
            inner.expect_done()?;
            if !bounds.is_unbounded() && items.len() != bounds.len() {
                return Err(TypeError::ArraySizeMismatch {
                    expected: bounds.len(),
                    found: items.len(),
                    position: group.open.position.clone(),
                }
                .into());
            }
            return Ok(Value::Array {
                lower: bounds.lower,
                items,
            });
        }
        let expression = self.parse_expression(cursor)?;
        let (value, _) = self.evaluate_constant(expression, Some(ty))?;
        Ok(value)
    }

    pub(crate) fn parse_type(&mut self, cursor: &mut Cursor<'_>) -> CompileResult<Type> {
        let position = cursor.position();
        let token = match cursor.peek() {
            Some(TokenTree::Group(group)) if group.kind == GroupKind::Record => {
                return Err(SyntaxError::Unsupported {
                    feature: "records",
                    position,
                }
                .into());
            }
            Some(TokenTree::Group(group)) if group.kind == GroupKind::Class => {
                return Err(SyntaxError::Unsupported {
                    feature: "classes",
                    position,
                }
                .into());
            }
            Some(TokenTree::Token(token)) => token,
            _ => return Err(cursor.unexpected("type")),
        };

        match &token.kind {
            TokenKind::Identifier(name) => {
                if let Some(ty) = self.arena.lookup_type(self.scope, name) {
                    cursor.advance();
                    return Ok(ty);
                }
                if let Some(ty) = builtin_type(name) {
                    cursor.advance();
                    // `string[n]`: the length limit is not enforced.
                    if ty == Type::STRING && cursor.peek_group(GroupKind::Bracket).is_some() {
                        cursor.advance();
                    }
                    return Ok(ty);
                }
                if let Some(Symbol::Constant(_)) = self.arena.lookup(self.scope, name) {
                    return self.parse_subrange(cursor);
                }
                Err(ScopeError::UnknownType {
                    name: name.clone(),
                    position,
                }
                .into())
            }
            TokenKind::Array => {
                cursor.advance();
                let dimensions = match cursor.peek_group(GroupKind::Bracket) {
                    Some(group) => {
                        cursor.advance();
                        self.parse_dimensions(group)?
                    }
                    None => vec![Subrange::UNBOUNDED],
                };
                cursor.expect(&TokenKind::Of)?;
                let element = self.parse_type(cursor)?;
                Ok(dimensions
                    .into_iter()
                    .rev()
                    .fold(element, |element, bounds| Type::array(element, bounds)))
            }
            TokenKind::Caret => {
                cursor.advance();
                Ok(Type::pointer(self.parse_type(cursor)?))
            }
            _ => self.parse_subrange(cursor),
        }
    }

    /// `lo..hi` as a type: the ordinal type of its bounds.
    fn parse_subrange(&mut self, cursor: &mut Cursor<'_>) -> CompileResult<Type> {
        let (lower, ty, position) = self.constant_ordinal(cursor)?;
        cursor.expect(&TokenKind::DotDot)?;
        let (upper, _, _) = self.constant_ordinal(cursor)?;
        if upper < lower {
            return Err(TypeError::SubrangeBound {
                lower,
                upper,
                position,
            }
            .into());
        }
        Ok(ty)
    }

    fn parse_dimensions(&mut self, group: &Group) -> CompileResult<Vec<Subrange>> {
        let mut cursor = Cursor::new(group);
        let mut dimensions = Vec::new();
        loop {
            let (lower, upper, position) = self.index_bounds(&mut cursor)?;
            let bounds = Subrange::between(lower, upper).ok_or(TypeError::SubrangeBound {
                lower,
                upper,
                position,
            })?;
            dimensions.push(bounds);
            if !cursor.eat(&TokenKind::Comma) {
                break;
            }
        }
        cursor.expect_done()?;
        Ok(dimensions)
    }

    fn index_bounds(&mut self, cursor: &mut Cursor<'_>) -> CompileResult<(i64, i64, Position)> {
        let (lower, position) = self.integer_bound(cursor)?;
        cursor.expect(&TokenKind::DotDot)?;
        let (upper, _) = self.integer_bound(cursor)?;
        Ok((lower, upper, position))
    }

    fn integer_bound(&mut self, cursor: &mut Cursor<'_>) -> CompileResult<(i64, Position)> {
        let expression = self.parse_expression(cursor)?;
        let position = expression.position.clone();
        let (value, ty) = self.evaluate_constant(expression, None)?;
        match value {
            Value::Integer(value) => Ok((i64::from(value), position)),
            Value::Long(value) => Ok((value, position)),
            _ => Err(TypeError::NonIntegerIndex {
                found: ty.to_string(),
                position,
            }
            .into()),
        }
    }

    fn parse_routine(&mut self, cursor: &mut Cursor<'_>, section: Section) -> CompileResult<()> {
        let is_function = cursor.at(&TokenKind::Function);
        cursor.advance();
        let (name, position) = cursor.expect_identifier()?;
        let params = match cursor.peek_group(GroupKind::Paren) {
            Some(group) => {
                cursor.advance();
                self.parse_parameters(group)?
            }
            None => Vec::new(),
        };
        let result = if is_function {
            cursor.expect(&TokenKind::Colon)?;
            Some(self.parse_type(cursor)?)
        } else {
            None
        };
        cursor.expect(&TokenKind::Semicolon)?;

        let id = self
            .arena
            .declare_function(self.scope, &name, Signature::new(params, result), &position)?;
        self.declare_parameters(id)?;
        if cursor.eat(&TokenKind::Forward) {
            cursor.expect(&TokenKind::Semicolon)?;
            return Ok(());
        }
        if section == Section::Interface {
            return Ok(());
        }

        let routine_scope = self.arena.function(id).scope;
        let outer_scope = std::mem::replace(&mut self.scope, routine_scope);
        let outer_loops = std::mem::take(&mut self.loop_depth);
        let body = self.parse_routine_body(cursor);
        self.scope = outer_scope;
        self.loop_depth = outer_loops;

        self.arena.function_mut(id).body = Some(body?);
        debug!(routine = %name, %position, "compiled routine body");
        Ok(())
    }

    fn parse_routine_body(&mut self, cursor: &mut Cursor<'_>) -> CompileResult<Statement> {
        self.parse_declarations(cursor, Section::Definitions)?;
        let group = cursor.expect_group(GroupKind::Begin)?;
        let body = self.parse_block(group)?;
        cursor.expect(&TokenKind::Semicolon)?;
        Ok(body)
    }

    /// `a, b: T; var c: T; const d: T`
    fn parse_parameters(&mut self, group: &Group) -> CompileResult<Vec<Parameter>> {
        let mut cursor = Cursor::new(group);
        let mut params = Vec::new();
        while !cursor.is_done() {
            let mode = if cursor.eat(&TokenKind::Var) {
                ParamMode::Var
            } else if cursor.eat(&TokenKind::Const) {
                ParamMode::Const
            } else {
                ParamMode::Value
            };
            let mut names = vec![cursor.expect_identifier()?.0];
            while cursor.eat(&TokenKind::Comma) {
                names.push(cursor.expect_identifier()?.0);
            }
            cursor.expect(&TokenKind::Colon)?;
            let ty = self.parse_type(&mut cursor)?;
            params.extend(names.into_iter().map(|name| Parameter {
                name,
                ty: ty.clone(),
                mode,
            }));
            if !cursor.eat(&TokenKind::Semicolon) {
                break;
            }
        }
        cursor.expect_done()?;
        Ok(params)
    }

    /// Parameters and the result slot live in the routine's own scope. A
    /// second header for the same routine finds them already declared.
    fn declare_parameters(&mut self, id: FunctionId) -> CompileResult<()> {
        let function = self.arena.function(id);
        let scope = function.scope;
        if !self.arena.scope(scope).variables().is_empty() {
            return Ok(());
        }
        let params = function.signature.params.clone();
        let result = function.signature.result.clone();
        let position = function.position.clone();

        for param in params {
            let ty = match param.ty {
                Type::Varargs(element) => Type::Array {
                    element,
                    bounds: Subrange::UNBOUNDED,
                },
                ty => ty,
            };
            self.arena.declare_variable(
                scope,
                Variable {
                    name: param.name,
                    ty,
                    position: position.clone(),
                    initial: None,
                },
            )?;
        }
        if let Some(ty) = result {
            self.arena.declare_variable(
                scope,
                Variable {
                    name: RESULT_VARIABLE.to_string(),
                    ty,
                    position,
                    initial: None,
                },
            )?;
        }
        Ok(())
    }
}
