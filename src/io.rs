use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use crate::runtime::error::RuntimeError;

/// Console routed through the embedder, so output can be captured and input
/// supplied.
pub trait IoHandler {
    fn write(&mut self, text: &str) -> io::Result<()>;
    /// Next input line without its terminator, `None` at end of input.
    fn read_line(&mut self) -> io::Result<Option<String>>;
    fn clear(&mut self) -> io::Result<()>;
}

/// Process stdin/stdout.
#[derive(Debug, Default)]
pub struct StdIo;

impl IoHandler for StdIo {
    fn write(&mut self, text: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
        stdout.flush()
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(strip_newline(line)))
    }

    fn clear(&mut self) -> io::Result<()> {
        self.write("\x1b[2J\x1b[H")
    }
}

/// In-memory console: scripted input lines and captured output.
#[derive(Debug, Default, Clone)]
pub struct BufferedIo {
    input: VecDeque<String>,
    output: String,
    clears: usize,
}

impl BufferedIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(input: &str) -> Self {
        Self {
            input: input.lines().map(str::to_string).collect(),
            ..Self::default()
        }
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn into_output(self) -> String {
        self.output
    }

    pub fn clears(&self) -> usize {
        self.clears
    }
}

impl IoHandler for BufferedIo {
    fn write(&mut self, text: &str) -> io::Result<()> {
        self.output.push_str(text);
        Ok(())
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.input.pop_front())
    }

    fn clear(&mut self) -> io::Result<()> {
        self.clears += 1;
        Ok(())
    }
}

fn strip_newline(mut line: String) -> String {
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    line
}

/// Tokenising view over a line source for `read` and `readln`: keeps the
/// unread rest of the current line between calls.
#[derive(Debug, Default)]
pub struct InputCursor {
    pending: Option<String>,
}

impl InputCursor {
    pub fn new() -> Self {
        Self::default()
    }

    fn fill<S: LineSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> Result<&mut String, RuntimeError> {
        if self.pending.is_none() {
            let line = source.next_line()?.ok_or(RuntimeError::InputExhausted)?;
            self.pending = Some(line);
        }
        self.pending
            .as_mut()
            .ok_or(RuntimeError::Internal("input line"))
    }

    /// Next whitespace-delimited word, moving to following lines as needed.
    pub fn word<S: LineSource + ?Sized>(&mut self, source: &mut S) -> Result<String, RuntimeError> {
        loop {
            let line = self.fill(source)?;
            let trimmed = line.trim_start();
            if trimmed.is_empty() {
                self.pending = None;
                continue;
            }
            let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
            let word = trimmed[..end].to_string();
            let rest = trimmed[end..].to_string();
            *line = rest;
            return Ok(word);
        }
    }

    /// Next character of the current line; a line end reads as a space.
    pub fn char<S: LineSource + ?Sized>(&mut self, source: &mut S) -> Result<char, RuntimeError> {
        let line = self.fill(source)?;
        let mut chars = line.chars();
        match chars.next() {
            Some(c) => {
                let rest = chars.as_str().to_string();
                *line = rest;
                Ok(c)
            }
            None => {
                self.pending = None;
                Ok(' ')
            }
        }
    }

    /// Everything left on the current line.
    pub fn rest<S: LineSource + ?Sized>(&mut self, source: &mut S) -> Result<String, RuntimeError> {
        let line = self.fill(source)?;
        Ok(std::mem::take(line))
    }

    /// Drops the rest of the current line, reading one if none is pending.
    pub fn finish_line<S: LineSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> Result<(), RuntimeError> {
        if self.pending.take().is_none() {
            source.next_line()?.ok_or(RuntimeError::InputExhausted)?;
        }
        Ok(())
    }

    pub fn at_end<S: LineSource + ?Sized>(&mut self, source: &mut S) -> Result<bool, RuntimeError> {
        if self.pending.is_some() {
            return Ok(false);
        }
        match source.next_line()? {
            Some(line) => {
                self.pending = Some(line);
                Ok(false)
            }
            None => Ok(true),
        }
    }
}

/// Where an [`InputCursor`] pulls its lines from.
pub trait LineSource {
    fn next_line(&mut self) -> Result<Option<String>, RuntimeError>;
}

impl<T: IoHandler + ?Sized> LineSource for T {
    fn next_line(&mut self) -> Result<Option<String>, RuntimeError> {
        self.read_line().map_err(|error| RuntimeError::Io {
            message: error.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_span_lines() {
        let mut io = BufferedIo::with_input("12  7\n\n  -3 rest of line\nnext");
        let mut cursor = InputCursor::new();
        assert_eq!(cursor.word(&mut io).unwrap(), "12");
        assert_eq!(cursor.word(&mut io).unwrap(), "7");
        assert_eq!(cursor.word(&mut io).unwrap(), "-3");
        assert_eq!(cursor.rest(&mut io).unwrap(), " rest of line");
        cursor.finish_line(&mut io).unwrap();
        assert_eq!(cursor.rest(&mut io).unwrap(), "next");
        cursor.finish_line(&mut io).unwrap();
        assert!(cursor.at_end(&mut io).unwrap());
        assert!(matches!(
            cursor.word(&mut io),
            Err(RuntimeError::InputExhausted)
        ));
    }

    #[test]
    fn buffered_io_captures_output() {
        let mut io = BufferedIo::new();
        io.write("a").unwrap();
        io.write("b\n").unwrap();
        io.clear().unwrap();
        assert_eq!(io.output(), "ab\n");
        assert_eq!(io.clears(), 1);
    }
}
