use crate::ast::{Argument, BinaryOperator, Call, ExprKind, Expression, Place, UnaryOperator};
use crate::grouping::{Group, GroupKind, TokenTree};
use crate::scope::{ArgumentShape, Binding, OverloadFailure, ScopeError, Symbol, overload};
use crate::token::{Position, TokenKind};
use crate::types::{BasicType, Subrange, Type, TypeError, conversion, convert};
use crate::value::Value;

use super::Builder;
use super::cursor::Cursor;
use super::error::{CompileError, CompileResult};

fn relational(kind: &TokenKind) -> Option<BinaryOperator> {
    let op = match kind {
        TokenKind::Equal => BinaryOperator::Equal,
        TokenKind::NotEqual => BinaryOperator::NotEqual,
        TokenKind::Less => BinaryOperator::Less,
        TokenKind::LessEqual => BinaryOperator::LessEqual,
        TokenKind::Greater => BinaryOperator::Greater,
        TokenKind::GreaterEqual => BinaryOperator::GreaterEqual,
        TokenKind::In => BinaryOperator::In,
        _ => return None,
    };
    Some(op)
}

fn additive(kind: &TokenKind) -> Option<BinaryOperator> {
    let op = match kind {
        TokenKind::Plus => BinaryOperator::Add,
        TokenKind::Minus => BinaryOperator::Subtract,
        TokenKind::Or => BinaryOperator::Or,
        TokenKind::Xor => BinaryOperator::Xor,
        _ => return None,
    };
    Some(op)
}

fn multiplicative(kind: &TokenKind) -> Option<BinaryOperator> {
    let op = match kind {
        TokenKind::Star => BinaryOperator::Multiply,
        TokenKind::Slash => BinaryOperator::Divide,
        TokenKind::Div => BinaryOperator::IntDivide,
        TokenKind::Mod => BinaryOperator::Modulo,
        TokenKind::And => BinaryOperator::And,
        TokenKind::Shl => BinaryOperator::Shl,
        TokenKind::Shr => BinaryOperator::Shr,
        _ => return None,
    };
    Some(op)
}

/// The type both operands widen to, if either widens to the other.
pub(crate) fn common_type(left: &Type, right: &Type) -> Option<Type> {
    if left.is_any() || right.is_any() {
        return None;
    }
    if conversion(left, right).is_some() {
        return Some(right.clone());
    }
    if conversion(right, left).is_some() {
        return Some(left.clone());
    }
    None
}

fn is_text(ty: &Type) -> bool {
    matches!(ty.basic(), Some(BasicType::Char | BasicType::String))
}

fn operands_error(op: BinaryOperator, left: &Type, right: &Type, position: &Position) -> CompileError {
    TypeError::InvalidOperands {
        operator: op.symbol(),
        left: left.to_string(),
        right: right.to_string(),
        position: position.clone(),
    }
    .into()
}

fn describe_arguments(shapes: &[ArgumentShape]) -> String {
    shapes
        .iter()
        .map(|shape| shape.ty.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

enum SetItem {
    Single(Expression),
    Range(Expression, Expression),
}

impl Builder<'_> {
    pub(crate) fn parse_expression(&mut self, cursor: &mut Cursor<'_>) -> CompileResult<Expression> {
        let left = self.parse_simple(cursor)?;
        let Some(op) = cursor.peek_kind().and_then(relational) else {
            return Ok(left);
        };
        let position = cursor.position();
        cursor.advance();
        let right = self.parse_simple(cursor)?;
        self.binary(op, left, right, position)
    }

    fn parse_simple(&mut self, cursor: &mut Cursor<'_>) -> CompileResult<Expression> {
        let mut left = self.parse_term(cursor)?;
        while let Some(op) = cursor.peek_kind().and_then(additive) {
            let position = cursor.position();
            cursor.advance();
            let right = self.parse_term(cursor)?;
            left = self.binary(op, left, right, position)?;
        }
        Ok(left)
    }

    fn parse_term(&mut self, cursor: &mut Cursor<'_>) -> CompileResult<Expression> {
        let mut left = self.parse_factor(cursor)?;
        while let Some(op) = cursor.peek_kind().and_then(multiplicative) {
            let position = cursor.position();
            cursor.advance();
            let right = self.parse_factor(cursor)?;
            left = self.binary(op, left, right, position)?;
        }
        Ok(left)
    }

    fn parse_factor(&mut self, cursor: &mut Cursor<'_>) -> CompileResult<Expression> {
        let position = cursor.position();
        let token = match cursor.peek() {
            Some(TokenTree::Group(group)) if group.kind == GroupKind::Paren => {
                cursor.advance();
                let mut inner = Cursor::new(group);
                let expression = self.parse_expression(&mut inner)?;
                inner.expect_done()?;
                return Ok(expression);
            }
            Some(TokenTree::Group(group)) if group.kind == GroupKind::Bracket => {
                cursor.advance();
                return self.set_literal(group, position);
            }
            Some(TokenTree::Token(token)) => token,
            _ => return Err(cursor.unexpected("expression")),
        };

        let (value, ty) = match &token.kind {
            TokenKind::Integer(value) => (Value::Integer(*value), Type::INTEGER),
            TokenKind::Long(value) => (Value::Long(*value), Type::LONG),
            TokenKind::Real(value) => (Value::Double(*value), Type::DOUBLE),
            TokenKind::Char(value) => (Value::Char(*value), Type::CHAR),
            TokenKind::String(value) => (Value::String(value.clone()), Type::STRING),
            TokenKind::True => (Value::Boolean(true), Type::BOOLEAN),
            TokenKind::False => (Value::Boolean(false), Type::BOOLEAN),
            TokenKind::Nil => (Value::Pointer(None), Type::Nil),
            TokenKind::Not | TokenKind::Minus | TokenKind::Plus => {
                let op = match token.kind {
                    TokenKind::Not => Some(UnaryOperator::Not),
                    TokenKind::Minus => Some(UnaryOperator::Negate),
                    _ => None,
                };
                cursor.advance();
                let operand = self.parse_factor(cursor)?;
                return match op {
                    Some(op) => self.unary(op, operand, position),
                    None if operand.ty.is_numeric() => Ok(operand),
                    None => Err(TypeError::InvalidOperand {
                        operator: "+",
                        operand: operand.ty.to_string(),
                        position,
                    }
                    .into()),
                };
            }
            TokenKind::At => {
                cursor.advance();
                let target = self.parse_designator(cursor, false)?;
                return match target.kind {
                    ExprKind::Place(place) => Ok(Expression::new(
                        ExprKind::AddressOf(place),
                        Type::pointer(target.ty),
                        position,
                    )),
                    _ => Err(TypeError::InvalidOperand {
                        operator: "@",
                        operand: target.ty.to_string(),
                        position,
                    }
                    .into()),
                };
            }
            TokenKind::Identifier(_) => return self.parse_designator(cursor, false),
            _ => return Err(cursor.unexpected("expression")),
        };
        cursor.advance();
        Ok(Expression::literal(value, ty, position))
    }

    /// An identifier with its index and dereference suffixes. With
    /// `allow_procedure`, a call that returns nothing is accepted and typed
    /// `nil`.
    pub(crate) fn parse_designator(
        &mut self,
        cursor: &mut Cursor<'_>,
        allow_procedure: bool,
    ) -> CompileResult<Expression> {
        let (name, position) = cursor.expect_identifier()?;
        let called = cursor.peek_group(GroupKind::Paren).is_some();
        let symbol = called
            .then(|| self.arena.lookup_routine(self.scope, &name))
            .flatten()
            .or_else(|| self.arena.lookup(self.scope, &name))
            .ok_or_else(|| ScopeError::UnresolvedIdentifier {
                name: name.clone(),
                position: position.clone(),
            })?;

        let mut expression = match symbol {
            Symbol::Functions(_) => {
                let args = match cursor.peek_group(GroupKind::Paren) {
                    Some(group) => {
                        cursor.advance();
                        self.parse_arguments(group)?
                    }
                    None => Vec::new(),
                };
                let (call, result) = self.resolve_call(&name, args, &position)?;
                match result {
                    Some(ty) => Expression::new(ExprKind::Call(call), ty, position),
                    None if allow_procedure => {
                        return Ok(Expression::new(ExprKind::Call(call), Type::Nil, position));
                    }
                    None => return Err(TypeError::NoValue { name, position }.into()),
                }
            }
            _ if cursor.peek_group(GroupKind::Paren).is_some() => {
                return Err(ScopeError::NotCallable { name, position }.into());
            }
            Symbol::Constant(constant) => Expression::literal(constant.value, constant.ty, position),
            Symbol::Variable(variable, ty) => {
                Expression::new(ExprKind::Place(Place::Variable(variable)), ty, position)
            }
        };

        loop {
            if let Some(group) = cursor.peek_group(GroupKind::Bracket) {
                cursor.advance();
                let mut inner = Cursor::new(group);
                loop {
                    let index = self.parse_expression(&mut inner)?;
                    expression = self.index(expression, index)?;
                    if !inner.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                inner.expect_done()?;
            } else if cursor.at(&TokenKind::Caret) {
                let at = cursor.position();
                cursor.advance();
                expression = self.deref(expression, at)?;
            } else {
                return Ok(expression);
            }
        }
    }

    fn index(&self, base: Expression, index: Expression) -> CompileResult<Expression> {
        if !index.ty.is_integral() {
            return Err(TypeError::NonIntegerIndex {
                found: index.ty.to_string(),
                position: index.position,
            }
            .into());
        }
        let position = base.position.clone();
        let (element, string) = match &base.ty {
            Type::Array { element, .. } => ((**element).clone(), false),
            Type::Basic(BasicType::String) => (Type::CHAR, true),
            other => {
                return Err(TypeError::NotIndexable {
                    found: other.to_string(),
                    position,
                }
                .into());
            }
        };
        let base = match base.kind {
            ExprKind::Place(place) => Box::new(place),
            _ => {
                return Err(TypeError::NotIndexable {
                    found: base.ty.to_string(),
                    position,
                }
                .into());
            }
        };
        let index = Box::new(index);
        let place = if string {
            Place::Char { base, index }
        } else {
            Place::Element { base, index }
        };
        Ok(Expression::new(ExprKind::Place(place), element, position))
    }

    fn deref(&self, pointer: Expression, position: Position) -> CompileResult<Expression> {
        let Type::Pointer(target) = &pointer.ty else {
            return Err(TypeError::NotAPointer {
                found: pointer.ty.to_string(),
                position,
            }
            .into());
        };
        let ty = (**target).clone();
        Ok(Expression::new(
            ExprKind::Place(Place::Deref(Box::new(pointer))),
            ty,
            position,
        ))
    }

    /// Arguments of a call; `value:width[:precision]` becomes a format node.
    pub(crate) fn parse_arguments(&mut self, group: &Group) -> CompileResult<Vec<Expression>> {
        let mut cursor = Cursor::new(group);
        let mut args = Vec::new();
        while !cursor.is_done() {
            let value = self.parse_expression(&mut cursor)?;
            let arg = if cursor.eat(&TokenKind::Colon) {
                let width = self.parse_expression(&mut cursor)?;
                let width = self.coerce(width, &Type::INTEGER)?;
                let precision = if cursor.eat(&TokenKind::Colon) {
                    let precision = self.parse_expression(&mut cursor)?;
                    Some(Box::new(self.coerce(precision, &Type::INTEGER)?))
                } else {
                    None
                };
                let position = value.position.clone();
                Expression::new(
                    ExprKind::Format {
                        value: Box::new(value),
                        width: Box::new(width),
                        precision,
                    },
                    Type::STRING,
                    position,
                )
            } else {
                value
            };
            args.push(arg);
            if !cursor.eat(&TokenKind::Comma) {
                break;
            }
        }
        cursor.expect_done()?;
        Ok(args)
    }

    /// Picks the overload for `name` and converts each argument to the
    /// parameter it binds to. The nearest level with an applicable
    /// candidate wins.
    pub(crate) fn resolve_call(
        &mut self,
        name: &str,
        args: Vec<Expression>,
        position: &Position,
    ) -> CompileResult<(Call, Option<Type>)> {
        let shapes: Vec<ArgumentShape> = args
            .iter()
            .map(|arg| ArgumentShape {
                ty: arg.ty.clone(),
                assignable: matches!(arg.kind, ExprKind::Place(_)),
            })
            .collect();

        let mut chosen = None;
        for level in self.arena.candidate_levels(self.scope, name) {
            let candidates: Vec<_> = level
                .iter()
                .map(|callee| (*callee, self.arena.signature(*callee)))
                .collect();
            match overload::select(&candidates, &shapes) {
                Ok(found) => {
                    chosen = Some(found);
                    break;
                }
                Err(OverloadFailure::Ambiguous) => {
                    return Err(ScopeError::AmbiguousOverload {
                        name: name.to_string(),
                        arguments: describe_arguments(&shapes),
                        position: position.clone(),
                    }
                    .into());
                }
                Err(OverloadFailure::NoneApplicable) => {}
            }
        }
        let Some((callee, applicable)) = chosen else {
            return Err(ScopeError::NoApplicableOverload {
                name: name.to_string(),
                arguments: describe_arguments(&shapes),
                position: position.clone(),
            }
            .into());
        };

        let mut bound = Vec::with_capacity(args.len());
        for (arg, binding) in args.into_iter().zip(applicable.bindings) {
            bound.push(match binding {
                Binding::Value(ty) => Argument::Value(self.coerce(arg, &ty)?),
                Binding::Reference => match arg.kind {
                    ExprKind::Place(place) => Argument::Reference(place),
                    _ => {
                        return Err(ScopeError::NotAssignable {
                            name: name.to_string(),
                            position: arg.position,
                        }
                        .into());
                    }
                },
            });
        }
        let result = self.arena.signature(callee).result.clone();
        let call = Call {
            callee,
            name: self.arena.callee_name(callee).to_string(),
            args: bound,
        };
        Ok((call, result))
    }

    fn set_literal(&mut self, group: &Group, position: Position) -> CompileResult<Expression> {
        let mut cursor = Cursor::new(group);
        let mut items = Vec::new();
        while !cursor.is_done() {
            let low = self.parse_expression(&mut cursor)?;
            if cursor.eat(&TokenKind::DotDot) {
                let high = self.parse_expression(&mut cursor)?;
                items.push(SetItem::Range(low, high));
            } else {
                items.push(SetItem::Single(low));
            }
            if !cursor.eat(&TokenKind::Comma) {
                break;
            }
        }
        cursor.expect_done()?;

        let mut element: Option<Type> = None;
        for item in &items {
            let ends = match item {
                SetItem::Single(value) => vec![value],
                SetItem::Range(low, high) => vec![low, high],
            };
            for end in ends {
                element = Some(match element {
                    None => end.ty.clone(),
                    Some(current) => common_type(&current, &end.ty).ok_or_else(|| {
                        operands_error(BinaryOperator::In, &current, &end.ty, &end.position)
                    })?,
                });
            }
        }
        let element = element.unwrap_or(Type::ANY);

        let mut converted = Vec::with_capacity(items.len());
        for item in items {
            converted.push(match item {
                SetItem::Single(value) => self.coerce(value, &element)?,
                SetItem::Range(low, high) => {
                    if !element.is_ordinal() {
                        return Err(TypeError::NotOrdinal {
                            found: element.to_string(),
                            position: low.position,
                        }
                        .into());
                    }
                    let at = low.position.clone();
                    let low = self.coerce(low, &element)?;
                    let high = self.coerce(high, &element)?;
                    Expression::new(
                        ExprKind::Range {
                            low: Box::new(low),
                            high: Box::new(high),
                        },
                        element.clone(),
                        at,
                    )
                }
            });
        }
        Ok(Expression::new(
            ExprKind::ArrayLiteral {
                lower: 0,
                items: converted,
            },
            Type::array(element, Subrange::UNBOUNDED),
            position,
        ))
    }

    pub(crate) fn unary(
        &self,
        op: UnaryOperator,
        operand: Expression,
        position: Position,
    ) -> CompileResult<Expression> {
        let ty = operand.ty.clone();
        let valid = match op {
            UnaryOperator::Not => ty == Type::BOOLEAN || ty.is_integral(),
            UnaryOperator::Negate => ty.is_numeric(),
        };
        if !valid {
            return Err(TypeError::InvalidOperand {
                operator: match op {
                    UnaryOperator::Not => "not",
                    UnaryOperator::Negate => "-",
                },
                operand: ty.to_string(),
                position,
            }
            .into());
        }
        Ok(Expression::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            ty,
            position,
        ))
    }

    pub(crate) fn binary(
        &self,
        op: BinaryOperator,
        left: Expression,
        right: Expression,
        position: Position,
    ) -> CompileResult<Expression> {
        use BinaryOperator as Op;

        let invalid = || operands_error(op, &left.ty, &right.ty, &position);
        let common = common_type(&left.ty, &right.ty);
        let (operand, result) = match op {
            Op::Add if is_text(&left.ty) && is_text(&right.ty) => (Type::STRING, Type::STRING),
            Op::Add | Op::Subtract | Op::Multiply => match common {
                Some(ty) if ty.is_numeric() => (ty.clone(), ty),
                _ => return Err(invalid()),
            },
            Op::Divide => match common {
                Some(ty) if ty.is_numeric() => (Type::DOUBLE, Type::DOUBLE),
                _ => return Err(invalid()),
            },
            Op::IntDivide | Op::Modulo => match common {
                Some(ty) if ty.is_integral() => (ty.clone(), ty),
                _ => return Err(invalid()),
            },
            Op::And | Op::Or | Op::Xor => match common {
                Some(ty) if ty == Type::BOOLEAN || ty.is_integral() => (ty.clone(), ty),
                _ => return Err(invalid()),
            },
            Op::Shl | Op::Shr => {
                if !(left.ty.is_integral() && right.ty.is_integral()) {
                    return Err(invalid());
                }
                let ty = left.ty.clone();
                return Ok(Expression::new(
                    ExprKind::Binary {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    ty,
                    position,
                ));
            }
            Op::In => {
                let Type::Array { element, .. } = &right.ty else {
                    return Err(invalid());
                };
                let element = (**element).clone();
                if !element.is_any() && conversion(&left.ty, &element).is_none() {
                    return Err(invalid());
                }
                let left = self.coerce(left, &element)?;
                return Ok(Expression::new(
                    ExprKind::Binary {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    Type::BOOLEAN,
                    position,
                ));
            }
            Op::Equal | Op::NotEqual => match common {
                Some(ty) if matches!(ty, Type::Basic(_) | Type::Pointer(_) | Type::Nil) => {
                    (ty, Type::BOOLEAN)
                }
                _ => return Err(invalid()),
            },
            Op::Less | Op::LessEqual | Op::Greater | Op::GreaterEqual => match common {
                Some(ty @ Type::Basic(_)) => (ty, Type::BOOLEAN),
                _ => return Err(invalid()),
            },
        };
        let left = self.coerce(left, &operand)?;
        let right = self.coerce(right, &operand)?;
        Ok(Expression::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            result,
            position,
        ))
    }

    /// Converts `expression` to `target`. An array literal adopts the bounds
    /// of a bounded target once its element count matches.
    pub(crate) fn coerce(&self, expression: Expression, target: &Type) -> CompileResult<Expression> {
        let literal = matches!(expression.kind, ExprKind::ArrayLiteral { .. });
        let expression = match target {
            Type::Array { element, bounds } if literal && !bounds.is_unbounded() => {
                self.fit_array_literal(expression, element, *bounds)?
            }
            _ => expression,
        };
        convert(expression, target).map_err(|rejected| {
            TypeError::Unconvertible {
                from: rejected.ty.to_string(),
                to: target.to_string(),
                position: rejected.position,
            }
            .into()
        })
    }

    fn fit_array_literal(
        &self,
        literal: Expression,
        element: &Type,
        bounds: Subrange,
    ) -> CompileResult<Expression> {
        let Expression { kind, ty, position } = literal;
        let ExprKind::ArrayLiteral { items, .. } = kind else {
            return Ok(Expression { kind, ty, position });
        };
        let found = match ArrayLength::of(&items) {
            ArrayLength::Known(found) => found,
            // Ranges over runtime values are checked when evaluated.
            ArrayLength::Dynamic => bounds.len(),
        };
        if found != bounds.len() {
            return Err(TypeError::ArraySizeMismatch {
                expected: bounds.len(),
                found,
                position,
            }
            .into());
        }
        let items = items
            .into_iter()
            .map(|item| match item.kind {
                ExprKind::Range { low, high } => Ok(Expression::new(
                    ExprKind::Range {
                        low: Box::new(self.coerce(*low, element)?),
                        high: Box::new(self.coerce(*high, element)?),
                    },
                    element.clone(),
                    item.position,
                )),
                _ => self.coerce(item, element),
            })
            .collect::<CompileResult<Vec<_>>>()?;
        Ok(Expression::new(
            ExprKind::ArrayLiteral {
                lower: bounds.lower,
                items,
            },
            Type::array(element.clone(), bounds),
            position,
        ))
    }

    /// Folds `expression`, converted to `ty` when given, down to a literal.
    pub(crate) fn evaluate_constant(
        &self,
        expression: Expression,
        ty: Option<&Type>,
    ) -> CompileResult<(Value, Type)> {
        let expression = match ty {
            Some(ty) => self.coerce(expression, ty)?,
            None => expression,
        }
        .fold();
        match expression.kind {
            ExprKind::Literal(value) => Ok((value, expression.ty)),
            _ => Err(TypeError::NotConstant {
                position: expression.position,
            }
            .into()),
        }
    }

    /// A constant ordinal such as an array bound or a case label.
    pub(crate) fn constant_ordinal(
        &mut self,
        cursor: &mut Cursor<'_>,
    ) -> CompileResult<(i64, Type, Position)> {
        let expression = self.parse_expression(cursor)?;
        let position = expression.position.clone();
        let (value, ty) = self.evaluate_constant(expression, None)?;
        if !ty.is_ordinal() {
            return Err(TypeError::NotOrdinal {
                found: ty.to_string(),
                position,
            }
            .into());
        }
        let ordinal = value.as_ordinal().map_err(|_| TypeError::NotConstant {
            position: position.clone(),
        })?;
        Ok((ordinal, ty, position))
    }
}

enum ArrayLength {
    Known(usize),
    Dynamic,
}

impl ArrayLength {
    fn of(items: &[Expression]) -> Self {
        let mut total = 0usize;
        for item in items {
            match &item.kind {
                ExprKind::Range { low, high } => {
                    let (Some(low), Some(high)) = (low.constant_value(), high.constant_value())
                    else {
                        return ArrayLength::Dynamic;
                    };
                    let (Ok(low), Ok(high)) = (low.as_ordinal(), high.as_ordinal()) else {
                        return ArrayLength::Dynamic;
                    };
                    total += usize::try_from(high - low + 1).unwrap_or(0);
                }
                _ => total += 1,
            }
        }
        ArrayLength::Known(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{ScopeArena, ScopeKind, Variable};
    use crate::grouping::assemble;

    fn parse(arena: &mut ScopeArena, source: &str) -> CompileResult<Expression> {
        let root = assemble(source, "test", &[]);
        let scope = arena.push(ScopeKind::Program, "test", None);
        let mut builder = Builder::new(arena, scope);
        let mut cursor = Cursor::new(&root);
        let expression = builder.parse_expression(&mut cursor)?;
        cursor.expect_done()?;
        Ok(expression)
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let mut arena = ScopeArena::new();
        let expression = parse(&mut arena, "1 + 2 * 3").unwrap();
        assert_eq!(expression.fold().as_literal(), Some(&Value::Integer(7)));
    }

    #[test]
    fn mixed_arithmetic_widens() {
        let mut arena = ScopeArena::new();
        let expression = parse(&mut arena, "1 + 2.5").unwrap();
        assert_eq!(expression.ty, Type::DOUBLE);
        let division = parse(&mut arena, "7 / 2").unwrap();
        assert_eq!(division.ty, Type::DOUBLE);
        assert_eq!(division.fold().as_literal(), Some(&Value::Double(3.5)));
    }

    #[test]
    fn chars_concatenate_to_strings() {
        let mut arena = ScopeArena::new();
        let expression = parse(&mut arena, "'a' + 'b'").unwrap();
        assert_eq!(expression.ty, Type::STRING);
        assert_eq!(
            expression.fold().as_literal(),
            Some(&Value::String("ab".to_string()))
        );
    }

    #[test]
    fn boolean_and_integer_do_not_mix() {
        let mut arena = ScopeArena::new();
        let err = parse(&mut arena, "true + 1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Operator '+' cannot be applied to boolean and integer at test:1:6"
        );
    }

    #[test]
    fn unknown_names_are_unresolved() {
        let mut arena = ScopeArena::new();
        let err = parse(&mut arena, "missing * 2").unwrap_err();
        assert!(matches!(
            err,
            CompileError::Scope(ScopeError::UnresolvedIdentifier { .. })
        ));
    }

    #[test]
    fn set_membership_uses_the_element_type() {
        let mut arena = ScopeArena::new();
        let expression = parse(&mut arena, "3 in [1..5, 9]").unwrap();
        assert_eq!(expression.ty, Type::BOOLEAN);
        assert_eq!(expression.fold().as_literal(), Some(&Value::Boolean(true)));
    }

    #[test]
    fn strings_index_to_chars() {
        let mut arena = ScopeArena::new();
        let scope = arena.push(ScopeKind::Program, "test", None);
        arena
            .declare_variable(
                scope,
                Variable {
                    name: "s".to_string(),
                    ty: Type::STRING,
                    position: Position::start_of("test"),
                    initial: None,
                },
            )
            .unwrap();
        let root = assemble("s[1]", "test", &[]);
        let mut builder = Builder::new(&mut arena, scope);
        let expression = builder.parse_expression(&mut Cursor::new(&root)).unwrap();
        assert_eq!(expression.ty, Type::CHAR);
        assert!(matches!(expression.kind, ExprKind::Place(Place::Char { .. })));

        let root = assemble("s[1.5]", "test", &[]);
        let err = builder.parse_expression(&mut Cursor::new(&root)).unwrap_err();
        assert!(matches!(
            err,
            CompileError::Type(TypeError::NonIntegerIndex { .. })
        ));
    }

    #[test]
    fn array_literals_must_match_the_declared_size() {
        let mut arena = ScopeArena::new();
        let literal = parse(&mut arena, "[1, 2, 3]").unwrap();
        let scope = arena.push(ScopeKind::Program, "b", None);
        let builder = Builder::new(&mut arena, scope);
        let fitted = builder
            .coerce(literal.clone(), &Type::array(Type::INTEGER, Subrange::new(1, 3)))
            .unwrap();
        assert_eq!(
            fitted.fold().as_literal(),
            Some(&Value::Array {
                lower: 1,
                items: vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)],
            })
        );
        let err = builder
            .coerce(literal, &Type::array(Type::INTEGER, Subrange::new(0, 4)))
            .unwrap_err();
        assert!(matches!(
            err,
            CompileError::Type(TypeError::ArraySizeMismatch {
                expected: 4,
                found: 3,
                ..
            })
        ));
    }
}
