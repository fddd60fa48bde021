//! Compile-time folding. Children fold first; a node then becomes a literal
//! when its value can be computed from literals alone. An evaluation that
//! fails (overflow, division by zero) is left in place so the error surfaces
//! at runtime.

use crate::value::Value;

use super::{
    Argument, BinaryOperator, Call, CaseArm, Direction, ExprKind, Expression, Place, Statement,
    StmtKind, ops,
};

impl Expression {
    pub fn fold(self) -> Expression {
        let Expression { kind, ty, position } = self;
        let kind = match kind {
            ExprKind::Place(place) => ExprKind::Place(place.fold()),
            ExprKind::AddressOf(place) => ExprKind::AddressOf(place.fold()),
            ExprKind::ArrayLiteral { lower, items } => ExprKind::ArrayLiteral {
                lower,
                items: items.into_iter().map(Expression::fold).collect(),
            },
            ExprKind::Range { low, high } => ExprKind::Range {
                low: Box::new(low.fold()),
                high: Box::new(high.fold()),
            },
            ExprKind::Unary { op, operand } => ExprKind::Unary {
                op,
                operand: Box::new(operand.fold()),
            },
            ExprKind::Binary { op, left, right } => ExprKind::Binary {
                op,
                left: Box::new(left.fold()),
                right: Box::new(right.fold()),
            },
            ExprKind::Convert {
                conversion,
                operand,
            } => ExprKind::Convert {
                conversion,
                operand: Box::new(operand.fold()),
            },
            ExprKind::Format {
                value,
                width,
                precision,
            } => ExprKind::Format {
                value: Box::new(value.fold()),
                width: Box::new(width.fold()),
                precision: precision.map(|precision| Box::new(precision.fold())),
            },
            ExprKind::Call(call) => ExprKind::Call(call.fold()),
            literal @ ExprKind::Literal(_) => literal,
        };
        let folded = Expression { kind, ty, position };
        match folded.constant_value() {
            Some(value) if !matches!(folded.kind, ExprKind::Literal(_)) => {
                Expression::literal(value, folded.ty, folded.position)
            }
            _ => folded,
        }
    }

    /// The value of this node when its operands are all literals and
    /// evaluating it succeeds. Calls and storage accesses are never constant.
    pub fn constant_value(&self) -> Option<Value> {
        match &self.kind {
            ExprKind::Literal(value) => Some(value.clone()),
            ExprKind::Unary { op, operand } => ops::unary(*op, operand.as_literal()?).ok(),
            ExprKind::Binary { op, left, right } => {
                ops::binary(*op, left.as_literal()?, right.as_literal()?).ok()
            }
            ExprKind::Convert {
                conversion,
                operand,
            } => conversion.apply(operand.as_literal()?.clone()).ok(),
            ExprKind::Format {
                value,
                width,
                precision,
            } => {
                let precision = match precision {
                    Some(precision) => Some(precision.as_literal()?),
                    None => None,
                };
                ops::format(value.as_literal()?, width.as_literal()?, precision).ok()
            }
            ExprKind::ArrayLiteral { lower, items } => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match &item.kind {
                        ExprKind::Range { low, high } => values.extend(
                            ops::expand_range(low.as_literal()?, high.as_literal()?).ok()?,
                        ),
                        _ => values.push(item.as_literal()?.clone()),
                    }
                }
                Some(Value::Array {
                    lower: *lower,
                    items: values,
                })
            }
            ExprKind::Range { .. }
            | ExprKind::Place(_)
            | ExprKind::AddressOf(_)
            | ExprKind::Call(_) => None,
        }
    }
}

impl Place {
    fn fold(self) -> Place {
        match self {
            Place::Variable(variable) => Place::Variable(variable),
            Place::Element { base, index } => Place::Element {
                base: Box::new(base.fold()),
                index: Box::new(index.fold()),
            },
            Place::Char { base, index } => Place::Char {
                base: Box::new(base.fold()),
                index: Box::new(index.fold()),
            },
            Place::Deref(pointer) => Place::Deref(Box::new(pointer.fold())),
        }
    }
}

impl Call {
    fn fold(self) -> Call {
        let args = self
            .args
            .into_iter()
            .map(|arg| match arg {
                Argument::Value(value) => Argument::Value(value.fold()),
                Argument::Reference(place) => Argument::Reference(place.fold()),
            })
            .collect();
        Call { args, ..self }
    }
}

impl Statement {
    pub fn fold(self) -> Statement {
        let Statement { kind, position } = self;
        let kind = match kind {
            StmtKind::Block(statements) => {
                StmtKind::Block(statements.into_iter().map(Statement::fold).collect())
            }
            StmtKind::Assign { target, value } => StmtKind::Assign {
                target: target.fold(),
                value: value.fold(),
            },
            StmtKind::Call(call) => StmtKind::Call(call.fold()),
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = condition.fold();
                let then_branch = then_branch.fold();
                let else_branch = else_branch.map(|branch| branch.fold());
                match constant_condition(&condition) {
                    Some(true) => return then_branch,
                    Some(false) => {
                        return else_branch.unwrap_or_else(|| Statement::empty(position));
                    }
                    None => StmtKind::If {
                        condition,
                        then_branch: Box::new(then_branch),
                        else_branch: else_branch.map(Box::new),
                    },
                }
            }
            StmtKind::While { condition, body } => {
                let condition = condition.fold();
                if constant_condition(&condition) == Some(false) {
                    return Statement::empty(position);
                }
                StmtKind::While {
                    condition,
                    body: Box::new(body.fold()),
                }
            }
            StmtKind::Repeat { body, condition } => StmtKind::Repeat {
                body: body.into_iter().map(Statement::fold).collect(),
                condition: condition.fold(),
            },
            StmtKind::For {
                variable,
                first,
                last,
                direction,
                body,
            } => {
                let variable = variable.fold();
                let first = first.fold();
                let last = last.fold();
                if never_runs(&first, &last, direction) {
                    // Only the initial assignment of the loop variable remains.
                    StmtKind::Assign {
                        target: variable,
                        value: first,
                    }
                } else {
                    StmtKind::For {
                        variable,
                        first,
                        last,
                        direction,
                        body: Box::new(body.fold()),
                    }
                }
            }
            StmtKind::Case {
                selector,
                arms,
                otherwise,
            } => StmtKind::Case {
                selector: selector.fold(),
                arms: arms
                    .into_iter()
                    .map(|arm| CaseArm {
                        labels: arm.labels,
                        body: arm.body.fold(),
                    })
                    .collect(),
                otherwise: otherwise.map(|statement| Box::new(statement.fold())),
            },
            StmtKind::New { target, pointee } => StmtKind::New {
                target: target.fold(),
                pointee,
            },
            StmtKind::Dispose(target) => StmtKind::Dispose(target.fold()),
            other @ (StmtKind::Break | StmtKind::Continue | StmtKind::Exit | StmtKind::Empty) => {
                other
            }
        };
        Statement { kind, position }
    }
}

fn constant_condition(condition: &Expression) -> Option<bool> {
    match condition.as_literal() {
        Some(Value::Boolean(value)) => Some(*value),
        _ => None,
    }
}

fn never_runs(first: &Expression, last: &Expression, direction: Direction) -> bool {
    let (Some(first), Some(last)) = (first.as_literal(), last.as_literal()) else {
        return false;
    };
    let op = match direction {
        Direction::Up => BinaryOperator::Greater,
        Direction::Down => BinaryOperator::Less,
    };
    matches!(ops::binary(op, first, last), Ok(Value::Boolean(true)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{UnaryOperator, VarRef};
    use crate::scope::ScopeId;
    use crate::token::Position;
    use crate::types::{BasicType, Conversion, Type};

    fn position() -> Position {
        Position::start_of("test")
    }

    fn int(value: i32) -> Expression {
        Expression::literal(Value::Integer(value), Type::INTEGER, position())
    }

    fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Expression {
        Expression::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            Type::INTEGER,
            position(),
        )
    }

    fn variable(name: &str) -> Place {
        Place::Variable(VarRef {
            scope: ScopeId::new(0),
            name: name.to_string(),
        })
    }

    fn load(name: &str) -> Expression {
        Expression::new(ExprKind::Place(variable(name)), Type::INTEGER, position())
    }

    #[test]
    fn folds_nested_arithmetic() {
        let expr = binary(
            BinaryOperator::Multiply,
            binary(BinaryOperator::Add, int(2), int(3)),
            Expression::new(
                ExprKind::Unary {
                    op: UnaryOperator::Negate,
                    operand: Box::new(int(4)),
                },
                Type::INTEGER,
                position(),
            ),
        );
        assert_eq!(expr.fold().kind, ExprKind::Literal(Value::Integer(-20)));
    }

    #[test]
    fn folding_is_idempotent() {
        let expr = binary(
            BinaryOperator::Add,
            load("x"),
            binary(BinaryOperator::Multiply, int(6), int(7)),
        );
        let once = expr.fold();
        assert_eq!(once.clone().fold(), once);
        let ExprKind::Binary { right, .. } = &once.kind else {
            panic!("expected binary node");
        };
        assert_eq!(right.kind, ExprKind::Literal(Value::Integer(42)));
    }

    #[test]
    fn failing_evaluation_is_deferred() {
        let expr = binary(BinaryOperator::IntDivide, int(1), int(0));
        assert!(matches!(expr.fold().kind, ExprKind::Binary { .. }));

        let overflow = binary(BinaryOperator::Add, int(i32::MAX), int(1));
        assert!(matches!(overflow.fold().kind, ExprKind::Binary { .. }));
    }

    #[test]
    fn conversions_of_literals_fold() {
        let expr = Expression::new(
            ExprKind::Convert {
                conversion: Conversion::Widen {
                    from: BasicType::Integer,
                    to: BasicType::Double,
                },
                operand: Box::new(int(3)),
            },
            Type::DOUBLE,
            position(),
        );
        let folded = expr.fold();
        assert_eq!(folded.kind, ExprKind::Literal(Value::Double(3.0)));
        assert_eq!(folded.ty, Type::DOUBLE);
    }

    #[test]
    fn constant_if_keeps_only_the_taken_branch() {
        let assign = |value| {
            Statement::new(
                StmtKind::Assign {
                    target: variable("x"),
                    value: int(value),
                },
                position(),
            )
        };
        let condition = Expression::new(
            ExprKind::Binary {
                op: BinaryOperator::Less,
                left: Box::new(int(1)),
                right: Box::new(int(2)),
            },
            Type::BOOLEAN,
            position(),
        );
        let statement = Statement::new(
            StmtKind::If {
                condition,
                then_branch: Box::new(assign(1)),
                else_branch: Some(Box::new(assign(2))),
            },
            position(),
        );
        assert_eq!(statement.fold(), assign(1));
    }

    #[test]
    fn empty_count_down_loop_folds_to_its_initialisation() {
        let body = Statement::new(StmtKind::Break, position());
        let statement = Statement::new(
            StmtKind::For {
                variable: variable("i"),
                first: int(1),
                last: binary(BinaryOperator::Add, int(2), int(3)),
                direction: Direction::Down,
                body: Box::new(body),
            },
            position(),
        );
        assert_eq!(
            statement.fold().kind,
            StmtKind::Assign {
                target: variable("i"),
                value: int(1),
            }
        );
    }

    #[test]
    fn false_while_folds_away() {
        let condition = Expression::literal(Value::Boolean(false), Type::BOOLEAN, position());
        let statement = Statement::new(
            StmtKind::While {
                condition,
                body: Box::new(Statement::new(StmtKind::Continue, position())),
            },
            position(),
        );
        assert_eq!(statement.fold().kind, StmtKind::Empty);
    }
}
