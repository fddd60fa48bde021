use thiserror::Error;

use crate::grouping::GroupingError;
use crate::scope::ScopeError;
use crate::token::Position;
use crate::types::TypeError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("Expected {expected}, got {found} at {position}")]
    Expected {
        expected: String,
        found: String,
        position: Position,
    },
    #[error("{feature} are not supported at {position}")]
    Unsupported {
        feature: &'static str,
        position: Position,
    },
    #[error("'exit' with a value outside of a function at {position}")]
    ExitValueOutsideFunction { position: Position },
}

impl SyntaxError {
    pub fn position(&self) -> &Position {
        match self {
            Self::Expected { position, .. }
            | Self::Unsupported { position, .. }
            | Self::ExitValueOutsideFunction { position } => position,
        }
    }
}

/// Any failure while turning source text into a [`Program`](crate::Program).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error(transparent)]
    Grouping(#[from] GroupingError),
    #[error(transparent)]
    Scope(#[from] ScopeError),
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
}

impl CompileError {
    pub fn position(&self) -> &Position {
        match self {
            Self::Grouping(error) => error.position(),
            Self::Scope(error) => error.position(),
            Self::Type(error) => error.position(),
            Self::Syntax(error) => error.position(),
        }
    }
}

pub type CompileResult<T> = Result<T, CompileError>;
