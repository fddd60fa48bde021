use thiserror::Error;

use crate::token::Position;

/// Language-level runtime faults. Host failures inside native routines are
/// kept apart in [`RuntimeError::NativeCall`].
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Arithmetic overflow in {operation}")]
    Overflow { operation: &'static str },
    #[error("Index {index} out of bounds {lower}..{upper}")]
    IndexOutOfBounds { index: i64, lower: i64, upper: i64 },
    #[error("Dereference of nil pointer")]
    NilDereference,
    #[error("File '{name}' is not open")]
    FileNotOpen { name: String },
    #[error("File '{name}' not found")]
    FileNotFound { name: String },
    #[error("Read past end of input")]
    InputExhausted,
    #[error("Invalid input '{input}': expected {expected}")]
    InvalidInput {
        input: String,
        expected: &'static str,
    },
    #[error("Stack overflow: call depth exceeded {depth}")]
    StackOverflow { depth: usize },
    #[error("Program terminated by user")]
    Cancelled,
    #[error("Expected {expected} value, got {found}")]
    InvalidValue {
        expected: &'static str,
        found: String,
    },
    #[error("I/O error: {message}")]
    Io { message: String },
    #[error("Runtime invariant violated: {0}")]
    Internal(&'static str),
    #[error("Error in native routine '{routine}': {cause:#}")]
    NativeCall {
        routine: String,
        #[source]
        cause: anyhow::Error,
    },
    #[error("{error} (at {position})")]
    Located {
        position: Position,
        #[source]
        error: Box<RuntimeError>,
    },
}

impl RuntimeError {
    /// Attaches `position` unless a deeper frame already did.
    pub fn at(self, position: &Position) -> Self {
        match self {
            located @ RuntimeError::Located { .. } => located,
            error => RuntimeError::Located {
                position: position.clone(),
                error: Box::new(error),
            },
        }
    }

    pub fn position(&self) -> Option<&Position> {
        match self {
            RuntimeError::Located { position, .. } => Some(position),
            _ => None,
        }
    }

    /// The error without its location wrapper.
    pub fn kind(&self) -> &RuntimeError {
        match self {
            RuntimeError::Located { error, .. } => error.kind(),
            error => error,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind(), RuntimeError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_position_wins() {
        let inner = Position::start_of("inner");
        let outer = Position::new("outer".into(), 9, 1);
        let error = RuntimeError::DivisionByZero.at(&inner).at(&outer);
        assert_eq!(error.position(), Some(&inner));
        assert!(matches!(error.kind(), RuntimeError::DivisionByZero));
    }

    #[test]
    fn native_call_message_names_routine_and_cause() {
        let error = RuntimeError::NativeCall {
            routine: "power".to_string(),
            cause: anyhow::anyhow!("host exploded"),
        };
        assert_eq!(
            error.to_string(),
            "Error in native routine 'power': host exploded"
        );
    }
}
