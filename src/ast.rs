use crate::scope::{Callee, ScopeId};
use crate::token::Position;
use crate::types::{Conversion, Type};
use crate::value::Value;

pub mod fold;
pub mod ops;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    IntDivide,
    Modulo,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    In,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::IntDivide => "div",
            BinaryOperator::Modulo => "mod",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
            BinaryOperator::Xor => "xor",
            BinaryOperator::Shl => "shl",
            BinaryOperator::Shr => "shr",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::Less => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::In => "in",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Equal
                | BinaryOperator::NotEqual
                | BinaryOperator::Less
                | BinaryOperator::LessEqual
                | BinaryOperator::Greater
                | BinaryOperator::GreaterEqual
        )
    }
}

/// A variable slot: the scope that declares it and its lowercase name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VarRef {
    pub scope: ScopeId,
    pub name: String,
}

/// Something that can be assigned to or passed by reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Place {
    Variable(VarRef),
    /// Array element by declared index.
    Element {
        base: Box<Place>,
        index: Box<Expression>,
    },
    /// String character, 1-based.
    Char {
        base: Box<Place>,
        index: Box<Expression>,
    },
    Deref(Box<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Value(Expression),
    Reference(Place),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub callee: Callee,
    pub name: String,
    pub args: Vec<Argument>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Value),
    Place(Place),
    /// Array constructor. `Range` items expand to every ordinal in between.
    ArrayLiteral { lower: i64, items: Vec<Expression> },
    Range {
        low: Box<Expression>,
        high: Box<Expression>,
    },
    AddressOf(Place),
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Convert {
        conversion: Conversion,
        operand: Box<Expression>,
    },
    /// `value:width:precision` inside a write argument list.
    Format {
        value: Box<Expression>,
        width: Box<Expression>,
        precision: Option<Box<Expression>>,
    },
    Call(Call),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExprKind,
    pub ty: Type,
    pub position: Position,
}

impl Expression {
    pub fn new(kind: ExprKind, ty: Type, position: Position) -> Self {
        Self { kind, ty, position }
    }

    pub fn literal(value: Value, ty: Type, position: Position) -> Self {
        Self::new(ExprKind::Literal(value), ty, position)
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match &self.kind {
            ExprKind::Literal(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_place(&self) -> Option<&Place> {
        match &self.kind {
            ExprKind::Place(place) => Some(place),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaseLabel {
    Value(Value),
    Range(Value, Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseArm {
    pub labels: Vec<CaseLabel>,
    pub body: Statement,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Block(Vec<Statement>),
    Assign {
        target: Place,
        value: Expression,
    },
    Call(Call),
    If {
        condition: Expression,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
    },
    While {
        condition: Expression,
        body: Box<Statement>,
    },
    Repeat {
        body: Vec<Statement>,
        condition: Expression,
    },
    For {
        variable: Place,
        first: Expression,
        last: Expression,
        direction: Direction,
        body: Box<Statement>,
    },
    Case {
        selector: Expression,
        arms: Vec<CaseArm>,
        otherwise: Option<Box<Statement>>,
    },
    Break,
    Continue,
    Exit,
    New {
        target: Place,
        pointee: Type,
    },
    Dispose(Place),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StmtKind,
    pub position: Position,
}

impl Statement {
    pub fn new(kind: StmtKind, position: Position) -> Self {
        Self { kind, position }
    }

    pub fn empty(position: Position) -> Self {
        Self::new(StmtKind::Empty, position)
    }
}
