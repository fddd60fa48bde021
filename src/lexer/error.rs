use thiserror::Error;

use crate::token::Position;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("Unexpected character '{character}' at {position}")]
    UnexpectedCharacter { character: char, position: Position },
    #[error("Invalid number literal '{literal}' at {position}")]
    InvalidNumber { literal: String, position: Position },
    #[error("Invalid character code '#{literal}' at {position}")]
    InvalidCharCode { literal: String, position: Position },
    #[error("Unterminated string literal at {position}")]
    UnterminatedString { position: Position },
    #[error("Unterminated comment at {position}")]
    UnterminatedComment { position: Position },
}

impl LexError {
    pub fn position(&self) -> &Position {
        match self {
            Self::UnexpectedCharacter { position, .. }
            | Self::InvalidNumber { position, .. }
            | Self::InvalidCharCode { position, .. }
            | Self::UnterminatedString { position }
            | Self::UnterminatedComment { position } => position,
        }
    }
}

pub type LexResult<T> = Result<T, LexError>;
