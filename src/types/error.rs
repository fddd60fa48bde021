use thiserror::Error;

use crate::token::Position;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("Cannot convert {from} to {to} at {position}")]
    Unconvertible {
        from: String,
        to: String,
        position: Position,
    },
    #[error("Array index must be an integer, got {found} at {position}")]
    NonIntegerIndex { found: String, position: Position },
    #[error("Invalid subrange {lower}..{upper} at {position}")]
    SubrangeBound {
        lower: i64,
        upper: i64,
        position: Position,
    },
    #[error("Array constant has {found} elements, expected {expected} at {position}")]
    ArraySizeMismatch {
        expected: usize,
        found: usize,
        position: Position,
    },
    #[error("Operator '{operator}' cannot be applied to {left} and {right} at {position}")]
    InvalidOperands {
        operator: &'static str,
        left: String,
        right: String,
        position: Position,
    },
    #[error("Operator '{operator}' cannot be applied to {operand} at {position}")]
    InvalidOperand {
        operator: &'static str,
        operand: String,
        position: Position,
    },
    #[error("Expression is not constant at {position}")]
    NotConstant { position: Position },
    #[error("Value of type {found} cannot be indexed at {position}")]
    NotIndexable { found: String, position: Position },
    #[error("Value of type {found} is not a pointer at {position}")]
    NotAPointer { found: String, position: Position },
    #[error("Expected an ordinal type, got {found} at {position}")]
    NotOrdinal { found: String, position: Position },
    #[error("Procedure '{name}' does not return a value at {position}")]
    NoValue { name: String, position: Position },
}

impl TypeError {
    pub fn position(&self) -> &Position {
        match self {
            Self::Unconvertible { position, .. }
            | Self::NonIntegerIndex { position, .. }
            | Self::SubrangeBound { position, .. }
            | Self::ArraySizeMismatch { position, .. }
            | Self::InvalidOperands { position, .. }
            | Self::InvalidOperand { position, .. }
            | Self::NotConstant { position }
            | Self::NotIndexable { position, .. }
            | Self::NotAPointer { position, .. }
            | Self::NotOrdinal { position, .. }
            | Self::NoValue { position, .. } => position,
        }
    }
}
