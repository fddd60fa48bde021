use std::any::Any;
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};

use crate::io::{InputCursor, LineSource};
use crate::runtime::error::RuntimeError;
use crate::types::{NativeType, Type};
use crate::value::{HostObject, Reference, Value, host_ref};

use super::HostType;

pub const TEXT: NativeType = NativeType {
    name: "text",
    init: new_text,
};

fn new_text() -> Value {
    Value::Native(host_ref(TextFile::default()))
}

#[derive(Debug, Default)]
struct Lines(VecDeque<String>);

impl LineSource for Lines {
    fn next_line(&mut self) -> Result<Option<String>, RuntimeError> {
        Ok(self.0.pop_front())
    }
}

#[derive(Debug, Default)]
enum FileState {
    #[default]
    Closed,
    Reading {
        lines: Lines,
        cursor: InputCursor,
    },
    Writing(BufWriter<File>),
}

/// A `text` file variable: a name bound by `assign` and an open mode.
#[derive(Debug, Default)]
pub struct TextFile {
    name: Option<String>,
    state: FileState,
}

impl HostObject for TextFile {
    fn type_name(&self) -> &'static str {
        TEXT.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl HostType for TextFile {
    fn pascal_type() -> Type {
        Type::Native(TEXT)
    }
}

fn io_error(error: std::io::Error) -> RuntimeError {
    RuntimeError::Io {
        message: error.to_string(),
    }
}

impl TextFile {
    fn name(&self) -> String {
        self.name.clone().unwrap_or_default()
    }

    fn bound_name(&self) -> Result<&str, RuntimeError> {
        self.name.as_deref().ok_or_else(|| RuntimeError::FileNotOpen {
            name: String::new(),
        })
    }

    pub fn assign(&mut self, name: &str) {
        self.name = Some(name.to_string());
        self.state = FileState::Closed;
    }

    pub fn rewrite(&mut self) -> Result<(), RuntimeError> {
        let file = File::create(self.bound_name()?).map_err(io_error)?;
        self.state = FileState::Writing(BufWriter::new(file));
        Ok(())
    }

    pub fn append(&mut self) -> Result<(), RuntimeError> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.bound_name()?)
            .map_err(io_error)?;
        self.state = FileState::Writing(BufWriter::new(file));
        Ok(())
    }

    pub fn reset(&mut self) -> Result<(), RuntimeError> {
        let name = self.bound_name()?.to_string();
        let contents = std::fs::read_to_string(&name).map_err(|error| {
            if error.kind() == std::io::ErrorKind::NotFound {
                RuntimeError::FileNotFound { name: name.clone() }
            } else {
                io_error(error)
            }
        })?;
        self.state = FileState::Reading {
            lines: Lines(contents.lines().map(str::to_string).collect()),
            cursor: InputCursor::new(),
        };
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), RuntimeError> {
        match std::mem::take(&mut self.state) {
            FileState::Writing(mut writer) => writer.flush().map_err(io_error),
            FileState::Reading { .. } => Ok(()),
            FileState::Closed => Err(RuntimeError::FileNotOpen { name: self.name() }),
        }
    }

    pub fn write(&mut self, text: &str) -> Result<(), RuntimeError> {
        match &mut self.state {
            FileState::Writing(writer) => writer.write_all(text.as_bytes()).map_err(io_error),
            _ => Err(RuntimeError::FileNotOpen { name: self.name() }),
        }
    }

    pub fn eof(&mut self) -> Result<bool, RuntimeError> {
        match &mut self.state {
            FileState::Reading { lines, cursor } => cursor.at_end(lines),
            _ => Err(RuntimeError::FileNotOpen { name: self.name() }),
        }
    }

    pub fn read(
        &mut self,
        targets: &[&Reference],
        finish_line: bool,
    ) -> Result<(), RuntimeError> {
        let name = self.name();
        match &mut self.state {
            FileState::Reading { lines, cursor } => {
                read_values(cursor, lines, targets, finish_line)
            }
            _ => Err(RuntimeError::FileNotOpen { name }),
        }
    }
}

/// Runs `apply` on the `TextFile` behind a `text` value.
pub fn with_file<T>(
    value: &Value,
    apply: impl FnOnce(&mut TextFile) -> Result<T, RuntimeError>,
) -> Result<T, RuntimeError> {
    let host = value.as_host()?;
    let mut object = host
        .try_borrow_mut()
        .map_err(|_| RuntimeError::Internal("text file is already in use"))?;
    let file = object
        .as_any_mut()
        .downcast_mut::<TextFile>()
        .ok_or_else(|| RuntimeError::InvalidValue {
            expected: "text",
            found: "native object".to_string(),
        })?;
    apply(file)
}

/// Reads one value per target, parsed according to the target's current
/// value kind. With `finish_line`, the rest of the line is dropped.
pub fn read_values<S: LineSource + ?Sized>(
    cursor: &mut InputCursor,
    source: &mut S,
    targets: &[&Reference],
    finish_line: bool,
) -> Result<(), RuntimeError> {
    for target in targets {
        let value = match target.get()? {
            Value::String(_) => Value::String(cursor.rest(source)?),
            Value::Char(_) => Value::Char(cursor.char(source)?),
            Value::Integer(_) => {
                let word = cursor.word(source)?;
                Value::Integer(word.parse().map_err(|_| invalid_input(word, "integer"))?)
            }
            Value::Long(_) => {
                let word = cursor.word(source)?;
                Value::Long(word.parse().map_err(|_| invalid_input(word, "integer"))?)
            }
            Value::Double(_) => {
                let word = cursor.word(source)?;
                Value::Double(word.parse().map_err(|_| invalid_input(word, "real"))?)
            }
            Value::Boolean(_) => {
                let word = cursor.word(source)?;
                match word.to_ascii_lowercase().as_str() {
                    "true" => Value::Boolean(true),
                    "false" => Value::Boolean(false),
                    _ => return Err(invalid_input(word, "boolean")),
                }
            }
            other => {
                return Err(RuntimeError::InvalidValue {
                    expected: "readable variable",
                    found: other.type_name().to_string(),
                });
            }
        };
        target.set(value)?;
    }
    if finish_line {
        cursor.finish_line(source)?;
    }
    Ok(())
}

fn invalid_input(input: String, expected: &'static str) -> RuntimeError {
    RuntimeError::InvalidInput { input, expected }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::BufferedIo;

    #[test]
    fn reads_by_target_kind() {
        let mut io = BufferedIo::with_input("42 2.5\nhello world\n");
        let mut cursor = InputCursor::new();
        let number = Reference::new(Value::Integer(0));
        let real = Reference::new(Value::Double(0.0));
        let text = Reference::new(Value::String(String::new()));

        read_values(&mut cursor, &mut io, &[&number, &real], true).unwrap();
        read_values(&mut cursor, &mut io, &[&text], true).unwrap();

        assert_eq!(number.get().unwrap(), Value::Integer(42));
        assert_eq!(real.get().unwrap(), Value::Double(2.5));
        assert_eq!(text.get().unwrap(), Value::String("hello world".to_string()));
    }

    #[test]
    fn bad_number_is_invalid_input() {
        let mut io = BufferedIo::with_input("abc\n");
        let mut cursor = InputCursor::new();
        let number = Reference::new(Value::Integer(0));
        let err = read_values(&mut cursor, &mut io, &[&number], false).unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidInput { expected: "integer", .. }));
    }

    #[test]
    fn unopened_file_reports_not_open() {
        let file = new_text();
        let err = with_file(&file, |file| file.write("x")).unwrap_err();
        assert!(matches!(err, RuntimeError::FileNotOpen { .. }));
    }

    #[test]
    fn write_then_read_back() {
        let path = std::env::temp_dir()
            .join(format!("pascal-interp-{}.txt", std::process::id()));
        let path = path.to_string_lossy().to_string();
        let file = new_text();
        with_file(&file, |file| {
            file.assign(&path);
            file.rewrite()?;
            file.write("7\n")?;
            file.close()
        })
        .unwrap();

        let target = Reference::new(Value::Integer(0));
        let at_end = with_file(&file, |file| {
            file.reset()?;
            file.read(&[&target], true)?;
            file.eof()
        })
        .unwrap();
        assert_eq!(target.get().unwrap(), Value::Integer(7));
        assert!(at_end);
        let _ = std::fs::remove_file(&path);
    }
}
