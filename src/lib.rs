pub mod ast;
pub mod compiler;
pub mod config;
pub mod grouping;
pub mod io;
pub mod lexer;
pub mod native;
pub mod runtime;
pub mod scope;
pub mod token;
pub mod types;
pub mod value;

pub use compiler::{CompileError, CompileOptions, Compiler, compile};
pub use config::RunConfig;
pub use runtime::cancel::CancellationToken;
pub use runtime::debug::DebugListener;
pub use runtime::{ExitOutcome, Program, RuntimeFailure};
