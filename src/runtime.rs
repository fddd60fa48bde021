//! Tree-walking execution of a compiled [`Program`].

use std::fmt;

use tracing::info;

use crate::ast::Statement;
use crate::config::RunConfig;
use crate::io::{IoHandler, StdIo};
use crate::scope::{ScopeArena, ScopeId};
use crate::token::Position;

pub mod cancel;
pub mod debug;
mod engine;
pub mod error;

use cancel::CancellationToken;
use debug::DebugListener;
use engine::Engine;
use error::RuntimeError;

/// Code contributed by one compiled unit.
#[derive(Debug, Clone)]
pub struct UnitCode {
    pub name: String,
    pub scope: ScopeId,
    pub initialization: Option<Statement>,
    pub finalization: Option<Statement>,
}

/// Everything needed to run: the declarations, the main block, and the
/// unit sections in dependency order.
#[derive(Debug, Clone)]
pub struct Program {
    pub arena: ScopeArena,
    pub main: ScopeId,
    pub body: Statement,
    pub units: Vec<UnitCode>,
}

#[derive(Debug)]
pub struct RuntimeFailure {
    pub position: Option<Position>,
    pub error: RuntimeError,
}

impl fmt::Display for RuntimeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.position {
            Some(position) => write!(f, "Runtime error at {position}: {}", self.error.kind()),
            None => write!(f, "Runtime error: {}", self.error),
        }
    }
}

/// How a run ended.
#[derive(Debug)]
pub enum ExitOutcome {
    Completed,
    Cancelled { position: Option<Position> },
    Failed(RuntimeFailure),
}

impl ExitOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ExitOutcome::Completed)
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitOutcome::Completed => write!(f, "Completed"),
            ExitOutcome::Cancelled {
                position: Some(position),
            } => write!(f, "Program terminated by user at {position}"),
            ExitOutcome::Cancelled { position: None } => write!(f, "Program terminated by user"),
            ExitOutcome::Failed(failure) => write!(f, "{failure}"),
        }
    }
}

impl Program {
    /// Runs against the process console with the default limits.
    pub fn run(
        &self,
        listener: Option<&mut dyn DebugListener>,
        cancel: &CancellationToken,
    ) -> ExitOutcome {
        let mut io = StdIo;
        self.run_with(&mut io, listener, cancel, &RunConfig::default())
    }

    pub fn run_with(
        &self,
        io: &mut dyn IoHandler,
        listener: Option<&mut dyn DebugListener>,
        cancel: &CancellationToken,
        config: &RunConfig,
    ) -> ExitOutcome {
        let mut engine = Engine::new(self, io, listener, cancel, config);
        let outcome = match engine.run() {
            Ok(()) => ExitOutcome::Completed,
            Err(error) if error.is_cancelled() => ExitOutcome::Cancelled {
                position: error.position().cloned(),
            },
            Err(error) => ExitOutcome::Failed(RuntimeFailure {
                position: error.position().cloned(),
                error,
            }),
        };
        info!(outcome = %outcome, "program finished");
        outcome
    }
}
