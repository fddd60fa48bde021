use thiserror::Error;

use crate::token::Position;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScopeError {
    #[error("Unresolved identifier '{name}' at {position}")]
    UnresolvedIdentifier { name: String, position: Position },
    #[error(
        "{kind} '{name}' declared at {position} conflicts with {previous_kind} '{name}' declared at {previous}"
    )]
    NamingConflict {
        name: String,
        kind: &'static str,
        position: Position,
        previous_kind: &'static str,
        previous: Position,
    },
    #[error("Routine '{name}' at {position} already has a body declared at {previous}")]
    DuplicateBody {
        name: String,
        position: Position,
        previous: Position,
    },
    #[error("Forward declared routine '{name}' at {position} has no body")]
    MissingBody { name: String, position: Position },
    #[error("Call to '{name}' with ({arguments}) is ambiguous at {position}")]
    AmbiguousOverload {
        name: String,
        arguments: String,
        position: Position,
    },
    #[error("No overload of '{name}' accepts ({arguments}) at {position}")]
    NoApplicableOverload {
        name: String,
        arguments: String,
        position: Position,
    },
    #[error("Varargs parameter '{name}' must be the last parameter at {position}")]
    MisplacedVarargs { name: String, position: Position },
    #[error("Library '{name}' not found at {position}")]
    LibraryNotFound { name: String, position: Position },
    #[error("Unit '{name}' could not be read at {position}: {message}")]
    LibraryUnreadable {
        name: String,
        message: String,
        position: Position,
    },
    #[error("Unit '{name}' at {position} uses itself through its dependencies")]
    CircularUnit { name: String, position: Position },
    #[error("Unknown type '{name}' at {position}")]
    UnknownType { name: String, position: Position },
    #[error("'{name}' is not a routine at {position}")]
    NotCallable { name: String, position: Position },
    #[error("'{name}' cannot be assigned to at {position}")]
    NotAssignable { name: String, position: Position },
    #[error("'{statement}' outside of a loop at {position}")]
    OutsideLoop {
        statement: &'static str,
        position: Position,
    },
}

impl ScopeError {
    pub fn position(&self) -> &Position {
        match self {
            Self::UnresolvedIdentifier { position, .. }
            | Self::NamingConflict { position, .. }
            | Self::DuplicateBody { position, .. }
            | Self::MissingBody { position, .. }
            | Self::AmbiguousOverload { position, .. }
            | Self::NoApplicableOverload { position, .. }
            | Self::MisplacedVarargs { position, .. }
            | Self::LibraryNotFound { position, .. }
            | Self::LibraryUnreadable { position, .. }
            | Self::CircularUnit { position, .. }
            | Self::UnknownType { position, .. }
            | Self::NotCallable { position, .. }
            | Self::NotAssignable { position, .. }
            | Self::OutsideLoop { position, .. } => position,
        }
    }
}
