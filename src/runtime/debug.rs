use tracing::info;

use crate::token::Position;

/// Observer called before each statement runs.
pub trait DebugListener {
    fn on_line(&mut self, position: &Position);

    /// Free-form detail for the line just reported, such as a variable
    /// snapshot.
    fn on_message(&mut self, _message: &str) {}
}

/// Keeps everything it is told.
#[derive(Debug, Default)]
pub struct LineRecorder {
    pub lines: Vec<Position>,
    pub messages: Vec<String>,
}

impl DebugListener for LineRecorder {
    fn on_line(&mut self, position: &Position) {
        self.lines.push(position.clone());
    }

    fn on_message(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }
}

/// Emits each executed line as a tracing event.
#[derive(Debug, Default)]
pub struct TraceListener;

impl DebugListener for TraceListener {
    fn on_line(&mut self, position: &Position) {
        info!(target: "pascal_interp::trace", %position, "line");
    }

    fn on_message(&mut self, message: &str) {
        info!(target: "pascal_interp::trace", variables = message, "snapshot");
    }
}
