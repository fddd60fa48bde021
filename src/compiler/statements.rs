use crate::ast::{CaseArm, CaseLabel, Direction, ExprKind, Expression, Place, Statement, StmtKind, VarRef};
use crate::grouping::{Group, GroupKind, TokenTree};
use crate::scope::{RESULT_VARIABLE, ScopeError, ScopeId, key};
use crate::token::{Position, TokenKind};
use crate::types::{Type, TypeError};
use crate::value::Value;

use super::Builder;
use super::cursor::Cursor;
use super::error::{CompileResult, SyntaxError};

fn never(_: &TokenKind) -> bool {
    false
}

fn is_finalization(kind: &TokenKind) -> bool {
    *kind == TokenKind::Finalization
}

impl Builder<'_> {
    /// Statements of a `begin ... end` group.
    pub(crate) fn parse_block(&mut self, group: &Group) -> CompileResult<Statement> {
        let mut cursor = Cursor::new(group);
        let statements = self.parse_statements(&mut cursor, never)?;
        cursor.expect_done()?;
        Ok(Statement::new(
            StmtKind::Block(statements),
            group.open.position.clone(),
        ))
    }

    /// A unit's `initialization` section, which runs up to `finalization`
    /// or the end of the unit.
    pub(crate) fn parse_initialization(&mut self, cursor: &mut Cursor<'_>) -> CompileResult<Statement> {
        let position = cursor.position();
        let statements = self.parse_statements(cursor, is_finalization)?;
        Ok(Statement::new(StmtKind::Block(statements), position))
    }

    pub(crate) fn parse_finalization(&mut self, cursor: &mut Cursor<'_>) -> CompileResult<Statement> {
        let position = cursor.position();
        let statements = self.parse_statements(cursor, never)?;
        Ok(Statement::new(StmtKind::Block(statements), position))
    }

    /// `;`-separated statements up to the end of the cursor or a token
    /// accepted by `stop`.
    fn parse_statements(
        &mut self,
        cursor: &mut Cursor<'_>,
        stop: fn(&TokenKind) -> bool,
    ) -> CompileResult<Vec<Statement>> {
        let mut statements = Vec::new();
        loop {
            if cursor.is_done() || cursor.peek_kind().is_some_and(stop) {
                return Ok(statements);
            }
            if cursor.eat(&TokenKind::Semicolon) {
                continue;
            }
            statements.push(self.parse_statement(cursor)?);
            if cursor.is_done() || cursor.peek_kind().is_some_and(stop) {
                return Ok(statements);
            }
            cursor.expect(&TokenKind::Semicolon)?;
        }
    }

    pub(crate) fn parse_statement(&mut self, cursor: &mut Cursor<'_>) -> CompileResult<Statement> {
        let position = cursor.position();
        let token = match cursor.peek() {
            Some(TokenTree::Group(group)) => {
                return match group.kind {
                    GroupKind::Begin => {
                        cursor.advance();
                        self.parse_block(group)
                    }
                    GroupKind::Repeat => {
                        cursor.advance();
                        self.parse_repeat(group, cursor, position)
                    }
                    GroupKind::Case => {
                        cursor.advance();
                        self.parse_case(group, position)
                    }
                    _ => Err(cursor.unexpected("statement")),
                };
            }
            Some(TokenTree::Token(token)) => token,
            Some(TokenTree::Error(_)) => return Err(cursor.unexpected("statement")),
            None => return Ok(Statement::empty(position)),
        };

        match &token.kind {
            TokenKind::If => {
                cursor.advance();
                let condition = self.parse_condition(cursor)?;
                cursor.expect(&TokenKind::Then)?;
                let then_branch = Box::new(self.parse_statement(cursor)?);
                let else_branch = if cursor.eat(&TokenKind::Else) {
                    Some(Box::new(self.parse_statement(cursor)?))
                } else {
                    None
                };
                Ok(Statement::new(
                    StmtKind::If {
                        condition,
                        then_branch,
                        else_branch,
                    },
                    position,
                ))
            }
            TokenKind::While => {
                cursor.advance();
                let condition = self.parse_condition(cursor)?;
                cursor.expect(&TokenKind::Do)?;
                let body = Box::new(self.in_loop(|builder| builder.parse_statement(cursor))?);
                Ok(Statement::new(StmtKind::While { condition, body }, position))
            }
            TokenKind::For => {
                cursor.advance();
                self.parse_for(cursor, position)
            }
            TokenKind::Break | TokenKind::Continue => {
                let (kind, statement) = match token.kind {
                    TokenKind::Break => (StmtKind::Break, "break"),
                    _ => (StmtKind::Continue, "continue"),
                };
                cursor.advance();
                if self.loop_depth == 0 {
                    return Err(ScopeError::OutsideLoop {
                        statement,
                        position,
                    }
                    .into());
                }
                Ok(Statement::new(kind, position))
            }
            TokenKind::Exit => {
                cursor.advance();
                self.parse_exit(cursor, position)
            }
            TokenKind::Identifier(name) => self.parse_simple_statement(cursor, name, position),
            TokenKind::Semicolon | TokenKind::Else | TokenKind::Until => {
                Ok(Statement::empty(position))
            }
            _ => Err(cursor.unexpected("statement")),
        }
    }

    fn parse_condition(&mut self, cursor: &mut Cursor<'_>) -> CompileResult<Expression> {
        let condition = self.parse_expression(cursor)?;
        self.coerce(condition, &Type::BOOLEAN)
    }

    /// The body sits in the group; `until <condition>` follows it in the
    /// enclosing items.
    fn parse_repeat(
        &mut self,
        group: &Group,
        cursor: &mut Cursor<'_>,
        position: Position,
    ) -> CompileResult<Statement> {
        let mut inner = Cursor::new(group);
        let body = self.in_loop(|builder| builder.parse_statements(&mut inner, never))?;
        inner.expect_done()?;
        let condition = self.parse_condition(cursor)?;
        Ok(Statement::new(StmtKind::Repeat { body, condition }, position))
    }

    fn parse_for(&mut self, cursor: &mut Cursor<'_>, position: Position) -> CompileResult<Statement> {
        let variable = self.parse_designator(cursor, false)?;
        let ty = variable.ty.clone();
        if !ty.is_ordinal() {
            return Err(TypeError::NotOrdinal {
                found: ty.to_string(),
                position: variable.position,
            }
            .into());
        }
        let variable = match variable.kind {
            ExprKind::Place(place @ Place::Variable(_)) => place,
            _ => {
                return Err(ScopeError::NotAssignable {
                    name: "for loop counter".to_string(),
                    position: variable.position,
                }
                .into());
            }
        };
        cursor.expect(&TokenKind::Assign)?;
        let first = self.parse_expression(cursor)?;
        let first = self.coerce(first, &ty)?;
        let direction = if cursor.eat(&TokenKind::To) {
            Direction::Up
        } else if cursor.eat(&TokenKind::Downto) {
            Direction::Down
        } else {
            return Err(cursor.unexpected("'to' or 'downto'"));
        };
        let last = self.parse_expression(cursor)?;
        let last = self.coerce(last, &ty)?;
        cursor.expect(&TokenKind::Do)?;
        let body = Box::new(self.in_loop(|builder| builder.parse_statement(cursor))?);
        Ok(Statement::new(
            StmtKind::For {
                variable,
                first,
                last,
                direction,
                body,
            },
            position,
        ))
    }

    fn parse_case(&mut self, group: &Group, position: Position) -> CompileResult<Statement> {
        let mut cursor = Cursor::new(group);
        let selector = self.parse_expression(&mut cursor)?;
        if !selector.ty.is_ordinal() {
            return Err(TypeError::NotOrdinal {
                found: selector.ty.to_string(),
                position: selector.position,
            }
            .into());
        }
        cursor.expect(&TokenKind::Of)?;

        let mut arms = Vec::new();
        let mut otherwise = None;
        while !cursor.is_done() {
            if cursor.eat(&TokenKind::Semicolon) {
                continue;
            }
            if cursor.at(&TokenKind::Else) {
                let at = cursor.position();
                cursor.advance();
                let statements = self.parse_statements(&mut cursor, never)?;
                otherwise = Some(Box::new(Statement::new(StmtKind::Block(statements), at)));
                break;
            }
            let mut labels = Vec::new();
            loop {
                let low = self.case_label(&mut cursor, &selector.ty)?;
                if cursor.eat(&TokenKind::DotDot) {
                    let high = self.case_label(&mut cursor, &selector.ty)?;
                    labels.push(CaseLabel::Range(low, high));
                } else {
                    labels.push(CaseLabel::Value(low));
                }
                if !cursor.eat(&TokenKind::Comma) {
                    break;
                }
            }
            cursor.expect(&TokenKind::Colon)?;
            let body = self.parse_statement(&mut cursor)?;
            arms.push(CaseArm { labels, body });
            if !cursor.is_done() && !cursor.at(&TokenKind::Else) {
                cursor.expect(&TokenKind::Semicolon)?;
            }
        }
        cursor.expect_done()?;
        Ok(Statement::new(
            StmtKind::Case {
                selector,
                arms,
                otherwise,
            },
            position,
        ))
    }

    fn case_label(
        &mut self,
        cursor: &mut Cursor<'_>,
        selector: &Type,
    ) -> CompileResult<Value> {
        let label = self.parse_expression(cursor)?;
        let (value, _) = self.evaluate_constant(label, Some(selector))?;
        Ok(value)
    }

    fn parse_exit(&mut self, cursor: &mut Cursor<'_>, position: Position) -> CompileResult<Statement> {
        let Some(group) = cursor.peek_group(GroupKind::Paren) else {
            return Ok(Statement::new(StmtKind::Exit, position));
        };
        cursor.advance();
        let mut inner = Cursor::new(group);
        if inner.is_done() {
            return Ok(Statement::new(StmtKind::Exit, position));
        }
        let Some((target, ty)) = self.current_result() else {
            return Err(SyntaxError::ExitValueOutsideFunction { position }.into());
        };
        let value = self.parse_expression(&mut inner)?;
        inner.expect_done()?;
        let value = self.coerce(value, &ty)?;
        Ok(Statement::new(
            StmtKind::Block(vec![
                Statement::new(StmtKind::Assign { target, value }, position.clone()),
                Statement::new(StmtKind::Exit, position.clone()),
            ]),
            position,
        ))
    }

    /// Result slot of the routine being built, when it is a function.
    fn current_result(&self) -> Option<(Place, Type)> {
        let function = self.arena.function_of(self.scope)?;
        let ty = self.arena.function(function).signature.result.clone()?;
        Some((result_place(self.scope), ty))
    }

    /// Result slot of the enclosing function called `name`; assigning to a
    /// function's own name sets its result.
    fn named_result(&self, name: &str) -> Option<(Place, Type)> {
        let name = key(name);
        let mut current = Some(self.scope);
        while let Some(scope) = current {
            if let Some(id) = self.arena.function_of(scope) {
                let function = self.arena.function(id);
                if key(&function.name) == name
                    && let Some(ty) = &function.signature.result
                {
                    return Some((result_place(scope), ty.clone()));
                }
            }
            current = self.arena.scope(scope).parent;
        }
        None
    }

    /// Assignment, procedure call or one of the `new`/`dispose` intrinsics.
    fn parse_simple_statement(
        &mut self,
        cursor: &mut Cursor<'_>,
        name: &str,
        position: Position,
    ) -> CompileResult<Statement> {
        if cursor.peek_nth_kind(1) == Some(&TokenKind::Assign)
            && let Some((target, ty)) = self.named_result(name)
        {
            cursor.advance();
            cursor.advance();
            let value = self.parse_expression(cursor)?;
            let value = self.coerce(value, &ty)?;
            return Ok(Statement::new(StmtKind::Assign { target, value }, position));
        }

        let intrinsic = key(name);
        if matches!(intrinsic.as_str(), "new" | "dispose")
            && self.arena.lookup(self.scope, name).is_none()
        {
            cursor.advance();
            let group = cursor.expect_group(GroupKind::Paren)?;
            return self.parse_allocation(intrinsic == "new", group, position);
        }

        let target = self.parse_designator(cursor, true)?;
        if cursor.eat(&TokenKind::Assign) {
            let value = self.parse_expression(cursor)?;
            let place = match target.kind {
                ExprKind::Place(place) => place,
                _ => {
                    return Err(ScopeError::NotAssignable {
                        name: name.to_string(),
                        position,
                    }
                    .into());
                }
            };
            let value = self.coerce(value, &target.ty)?;
            return Ok(Statement::new(
                StmtKind::Assign {
                    target: place,
                    value,
                },
                position,
            ));
        }
        match target.kind {
            ExprKind::Call(call) => Ok(Statement::new(StmtKind::Call(call), position)),
            _ => Err(cursor.unexpected("':='")),
        }
    }

    fn parse_allocation(
        &mut self,
        allocate: bool,
        group: &Group,
        position: Position,
    ) -> CompileResult<Statement> {
        let mut inner = Cursor::new(group);
        let target = self.parse_designator(&mut inner, false)?;
        inner.expect_done()?;
        let Type::Pointer(pointee) = &target.ty else {
            return Err(TypeError::NotAPointer {
                found: target.ty.to_string(),
                position: target.position,
            }
            .into());
        };
        let pointee = (**pointee).clone();
        let place = match target.kind {
            ExprKind::Place(place) => place,
            _ => {
                return Err(ScopeError::NotAssignable {
                    name: if allocate { "new" } else { "dispose" }.to_string(),
                    position: target.position,
                }
                .into());
            }
        };
        let kind = if allocate {
            StmtKind::New {
                target: place,
                pointee,
            }
        } else {
            StmtKind::Dispose(place)
        };
        Ok(Statement::new(kind, position))
    }
}

fn result_place(scope: ScopeId) -> Place {
    Place::Variable(VarRef {
        scope,
        name: RESULT_VARIABLE.to_string(),
    })
}
