//! The `system` library: console and text-file I/O plus the ordinal, numeric
//! and string helpers every program sees without a `uses` clause.

use anyhow::Result;

use crate::runtime::error::RuntimeError;
use crate::types::{BasicType, Type};
use crate::value::{Reference, Value};

use super::text_io::{TEXT, TextFile, read_values, with_file};
use super::{Any, HostContext, NativeLibrary, NativeRoutine, Varargs, arg, reference};

type Outcome = Result<Option<Value>>;

pub struct System;

impl NativeLibrary for System {
    fn name(&self) -> &'static str {
        "system"
    }

    fn routines(&self) -> Vec<NativeRoutine> {
        let mut routines = io_routines();
        routines.extend(ordinal_routines());
        routines.extend(numeric_routines());
        routines.extend(string_routines());
        routines
    }

    fn constants(&self) -> Vec<(&'static str, Value, Type)> {
        vec![
            ("pi", Value::Double(std::f64::consts::PI), Type::DOUBLE),
            ("maxint", Value::Integer(i32::MAX), Type::INTEGER),
        ]
    }

    fn types(&self) -> Vec<(&'static str, Type)> {
        vec![("text", Type::Native(TEXT))]
    }
}

fn io_routines() -> Vec<NativeRoutine> {
    vec![
        NativeRoutine::new("write", write_console).param::<Varargs<Any>>("args"),
        NativeRoutine::new("writeln", writeln_console).param::<Varargs<Any>>("args"),
        NativeRoutine::new("write", write_file)
            .param::<TextFile>("file")
            .param::<Varargs<Any>>("args"),
        NativeRoutine::new("writeln", writeln_file)
            .param::<TextFile>("file")
            .param::<Varargs<Any>>("args"),
        NativeRoutine::new("read", read_console).var::<Varargs<Any>>("args"),
        NativeRoutine::new("readln", readln_console).var::<Varargs<Any>>("args"),
        NativeRoutine::new("read", read_file)
            .param::<TextFile>("file")
            .var::<Varargs<Any>>("args"),
        NativeRoutine::new("readln", readln_file)
            .param::<TextFile>("file")
            .var::<Varargs<Any>>("args"),
        NativeRoutine::new("eof", eof_console).returns::<bool>(),
        NativeRoutine::new("eof", eof_file)
            .param::<TextFile>("file")
            .returns::<bool>(),
        NativeRoutine::new("assign", assign)
            .param::<TextFile>("file")
            .param::<String>("name"),
        NativeRoutine::new("rewrite", |_, args| file_op(args, TextFile::rewrite))
            .param::<TextFile>("file"),
        NativeRoutine::new("reset", |_, args| file_op(args, TextFile::reset))
            .param::<TextFile>("file"),
        NativeRoutine::new("append", |_, args| file_op(args, TextFile::append))
            .param::<TextFile>("file"),
        NativeRoutine::new("close", |_, args| file_op(args, TextFile::close))
            .param::<TextFile>("file"),
    ]
}

fn render(args: &[Value]) -> String {
    args.iter().map(Value::to_output).collect()
}

fn console(ctx: &mut HostContext<'_>, text: &str) -> Result<()> {
    ctx.io.write(text).map_err(|error| RuntimeError::Io {
        message: error.to_string(),
    })?;
    Ok(())
}

fn write_console(ctx: &mut HostContext<'_>, args: &[Value]) -> Outcome {
    console(ctx, &render(args))?;
    Ok(None)
}

fn writeln_console(ctx: &mut HostContext<'_>, args: &[Value]) -> Outcome {
    let mut text = render(args);
    text.push('\n');
    console(ctx, &text)?;
    Ok(None)
}

fn write_file(_: &mut HostContext<'_>, args: &[Value]) -> Outcome {
    let text = render(args.get(1..).unwrap_or_default());
    with_file(arg(args, 0)?, |file| file.write(&text))?;
    Ok(None)
}

fn writeln_file(_: &mut HostContext<'_>, args: &[Value]) -> Outcome {
    let mut text = render(args.get(1..).unwrap_or_default());
    text.push('\n');
    with_file(arg(args, 0)?, |file| file.write(&text))?;
    Ok(None)
}

fn targets(args: &[Value]) -> Result<Vec<&Reference>> {
    (0..args.len()).map(|index| reference(args, index)).collect()
}

fn read_console(ctx: &mut HostContext<'_>, args: &[Value]) -> Outcome {
    let targets = targets(args)?;
    read_values(&mut *ctx.input, &mut *ctx.io, &targets, false)?;
    Ok(None)
}

fn readln_console(ctx: &mut HostContext<'_>, args: &[Value]) -> Outcome {
    let targets = targets(args)?;
    read_values(&mut *ctx.input, &mut *ctx.io, &targets, true)?;
    Ok(None)
}

fn read_file(_: &mut HostContext<'_>, args: &[Value]) -> Outcome {
    let targets = targets(args.get(1..).unwrap_or_default())?;
    with_file(arg(args, 0)?, |file| file.read(&targets, false))?;
    Ok(None)
}

fn readln_file(_: &mut HostContext<'_>, args: &[Value]) -> Outcome {
    let targets = targets(args.get(1..).unwrap_or_default())?;
    with_file(arg(args, 0)?, |file| file.read(&targets, true))?;
    Ok(None)
}

fn eof_console(ctx: &mut HostContext<'_>, _: &[Value]) -> Outcome {
    let at_end = ctx.input.at_end(&mut *ctx.io)?;
    Ok(Some(Value::Boolean(at_end)))
}

fn eof_file(_: &mut HostContext<'_>, args: &[Value]) -> Outcome {
    let at_end = with_file(arg(args, 0)?, TextFile::eof)?;
    Ok(Some(Value::Boolean(at_end)))
}

fn assign(_: &mut HostContext<'_>, args: &[Value]) -> Outcome {
    let name = arg(args, 1)?.as_str()?.to_string();
    with_file(arg(args, 0)?, |file| {
        file.assign(&name);
        Ok(())
    })?;
    Ok(None)
}

fn file_op(args: &[Value], op: fn(&mut TextFile) -> Result<(), RuntimeError>) -> Outcome {
    with_file(arg(args, 0)?, op)?;
    Ok(None)
}

fn ordinal_routines() -> Vec<NativeRoutine> {
    vec![
        NativeRoutine::new("length", length_string)
            .param::<String>("s")
            .returns::<i32>(),
        NativeRoutine::new("length", length_array)
            .param::<Vec<Any>>("items")
            .returns::<i32>(),
        NativeRoutine::new("low", low)
            .param::<Vec<Any>>("items")
            .returns::<i32>(),
        NativeRoutine::new("high", high)
            .param::<Vec<Any>>("items")
            .returns::<i32>(),
        NativeRoutine::new("sizeof", size_of)
            .param::<Any>("value")
            .returns::<i32>(),
        NativeRoutine::new("ord", ord_integer)
            .param::<char>("c")
            .returns::<i32>(),
        NativeRoutine::new("ord", ord_integer)
            .param::<bool>("b")
            .returns::<i32>(),
        NativeRoutine::new("ord", ord_integer)
            .param::<i32>("i")
            .returns::<i32>(),
        NativeRoutine::new("ord", |_, args| Ok(Some(Value::Long(ordinal(args)?))))
            .param::<i64>("i")
            .returns::<i64>(),
        NativeRoutine::new("chr", chr).param::<i32>("code").returns::<char>(),
        NativeRoutine::new("succ", |_, args| step(arg(args, 0)?, 1))
            .param::<i32>("x")
            .returns::<i32>(),
        NativeRoutine::new("succ", |_, args| step(arg(args, 0)?, 1))
            .param::<i64>("x")
            .returns::<i64>(),
        NativeRoutine::new("succ", |_, args| step(arg(args, 0)?, 1))
            .param::<char>("x")
            .returns::<char>(),
        NativeRoutine::new("succ", |_, args| step(arg(args, 0)?, 1))
            .param::<bool>("x")
            .returns::<bool>(),
        NativeRoutine::new("pred", |_, args| step(arg(args, 0)?, -1))
            .param::<i32>("x")
            .returns::<i32>(),
        NativeRoutine::new("pred", |_, args| step(arg(args, 0)?, -1))
            .param::<i64>("x")
            .returns::<i64>(),
        NativeRoutine::new("pred", |_, args| step(arg(args, 0)?, -1))
            .param::<char>("x")
            .returns::<char>(),
        NativeRoutine::new("pred", |_, args| step(arg(args, 0)?, -1))
            .param::<bool>("x")
            .returns::<bool>(),
        NativeRoutine::new("odd", |_, args| Ok(Some(Value::Boolean(ordinal(args)? % 2 != 0))))
            .param::<i64>("x")
            .returns::<bool>(),
        NativeRoutine::new("inc", |_, args| step_in_place(args, 1)).var::<i32>("x"),
        NativeRoutine::new("inc", |_, args| step_in_place(args, 1)).var::<i64>("x"),
        NativeRoutine::new("inc", |_, args| step_in_place(args, 1)).var::<char>("x"),
        NativeRoutine::new("inc", |_, args| step_in_place(args, 1))
            .var::<i32>("x")
            .param::<i32>("n"),
        NativeRoutine::new("inc", |_, args| step_in_place(args, 1))
            .var::<i64>("x")
            .param::<i64>("n"),
        NativeRoutine::new("inc", |_, args| step_in_place(args, 1))
            .var::<char>("x")
            .param::<i32>("n"),
        NativeRoutine::new("dec", |_, args| step_in_place(args, -1)).var::<i32>("x"),
        NativeRoutine::new("dec", |_, args| step_in_place(args, -1)).var::<i64>("x"),
        NativeRoutine::new("dec", |_, args| step_in_place(args, -1)).var::<char>("x"),
        NativeRoutine::new("dec", |_, args| step_in_place(args, -1))
            .var::<i32>("x")
            .param::<i32>("n"),
        NativeRoutine::new("dec", |_, args| step_in_place(args, -1))
            .var::<i64>("x")
            .param::<i64>("n"),
        NativeRoutine::new("dec", |_, args| step_in_place(args, -1))
            .var::<char>("x")
            .param::<i32>("n"),
    ]
}

fn integer(value: i64) -> Outcome {
    let value = i32::try_from(value).map_err(|_| RuntimeError::Overflow {
        operation: "integer result",
    })?;
    Ok(Some(Value::Integer(value)))
}

fn count(len: usize) -> Outcome {
    integer(i64::try_from(len).unwrap_or(i64::MAX))
}

fn ordinal(args: &[Value]) -> Result<i64> {
    Ok(arg(args, 0)?.as_ordinal()?)
}

fn array(value: &Value) -> Result<(i64, &[Value]), RuntimeError> {
    match value {
        Value::Array { lower, items } => Ok((*lower, items)),
        other => Err(RuntimeError::InvalidValue {
            expected: "array",
            found: other.type_name().to_string(),
        }),
    }
}

fn length_string(_: &mut HostContext<'_>, args: &[Value]) -> Outcome {
    count(arg(args, 0)?.as_str()?.chars().count())
}

fn length_array(_: &mut HostContext<'_>, args: &[Value]) -> Outcome {
    let (_, items) = array(arg(args, 0)?)?;
    count(items.len())
}

fn low(_: &mut HostContext<'_>, args: &[Value]) -> Outcome {
    let (lower, _) = array(arg(args, 0)?)?;
    integer(lower)
}

fn high(_: &mut HostContext<'_>, args: &[Value]) -> Outcome {
    let (lower, items) = array(arg(args, 0)?)?;
    integer(lower + i64::try_from(items.len()).unwrap_or(i64::MAX) - 1)
}

fn byte_size(value: &Value) -> i64 {
    let basic = match value {
        Value::Boolean(_) => BasicType::Boolean,
        Value::Integer(_) => BasicType::Integer,
        Value::Long(_) => BasicType::Long,
        Value::Double(_) => BasicType::Double,
        Value::Char(_) => BasicType::Char,
        Value::String(_) => BasicType::String,
        Value::Array { items, .. } => return items.iter().map(byte_size).sum(),
        Value::Pointer(_) | Value::Native(_) => return 8,
    };
    i64::from(basic.byte_size())
}

fn size_of(_: &mut HostContext<'_>, args: &[Value]) -> Outcome {
    integer(byte_size(arg(args, 0)?))
}

fn ord_integer(_: &mut HostContext<'_>, args: &[Value]) -> Outcome {
    integer(ordinal(args)?)
}

fn chr(_: &mut HostContext<'_>, args: &[Value]) -> Outcome {
    let code = ordinal(args)?;
    let c = u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| RuntimeError::InvalidValue {
            expected: "character code",
            found: code.to_string(),
        })?;
    Ok(Some(Value::Char(c)))
}

fn shifted(value: &Value, delta: i64) -> Result<Value, RuntimeError> {
    let next = value
        .as_ordinal()?
        .checked_add(delta)
        .ok_or(RuntimeError::Overflow { operation: "ordinal" })?;
    value.with_ordinal(next)
}

fn step(value: &Value, delta: i64) -> Outcome {
    Ok(Some(shifted(value, delta)?))
}

/// `inc`/`dec`: the optional second argument scales `sign`.
fn step_in_place(args: &[Value], sign: i64) -> Outcome {
    let amount = match args.get(1) {
        Some(amount) => amount.as_ordinal()?,
        None => 1,
    };
    let delta = amount
        .checked_mul(sign)
        .ok_or(RuntimeError::Overflow { operation: "ordinal" })?;
    reference(args, 0)?.update(|slot| {
        *slot = shifted(slot, delta)?;
        Ok(())
    })?;
    Ok(None)
}

fn numeric_routines() -> Vec<NativeRoutine> {
    vec![
        NativeRoutine::new("abs", abs).param::<i32>("x").returns::<i32>(),
        NativeRoutine::new("abs", abs).param::<i64>("x").returns::<i64>(),
        NativeRoutine::new("abs", abs).param::<f64>("x").returns::<f64>(),
        NativeRoutine::new("sqr", sqr).param::<i32>("x").returns::<i32>(),
        NativeRoutine::new("sqr", sqr).param::<i64>("x").returns::<i64>(),
        NativeRoutine::new("sqr", sqr).param::<f64>("x").returns::<f64>(),
        NativeRoutine::new("sqrt", |_, args| {
            Ok(Some(Value::Double(arg(args, 0)?.as_f64()?.sqrt())))
        })
        .param::<f64>("x")
        .returns::<f64>(),
        NativeRoutine::new("trunc", |_, args| to_integer(arg(args, 0)?.as_f64()?.trunc()))
            .param::<f64>("x")
            .returns::<i32>(),
        NativeRoutine::new("round", |_, args| to_integer(arg(args, 0)?.as_f64()?.round()))
            .param::<f64>("x")
            .returns::<i32>(),
    ]
}

fn overflow(operation: &'static str) -> RuntimeError {
    RuntimeError::Overflow { operation }
}

fn abs(_: &mut HostContext<'_>, args: &[Value]) -> Outcome {
    let value = match arg(args, 0)? {
        Value::Integer(x) => Value::Integer(x.checked_abs().ok_or(overflow("abs"))?),
        Value::Long(x) => Value::Long(x.checked_abs().ok_or(overflow("abs"))?),
        other => Value::Double(other.as_f64()?.abs()),
    };
    Ok(Some(value))
}

fn sqr(_: &mut HostContext<'_>, args: &[Value]) -> Outcome {
    let value = match arg(args, 0)? {
        Value::Integer(x) => Value::Integer(x.checked_mul(*x).ok_or(overflow("sqr"))?),
        Value::Long(x) => Value::Long(x.checked_mul(*x).ok_or(overflow("sqr"))?),
        other => {
            let x = other.as_f64()?;
            Value::Double(x * x)
        }
    };
    Ok(Some(value))
}

fn to_integer(value: f64) -> Outcome {
    if !value.is_finite() || value < f64::from(i32::MIN) || value > f64::from(i32::MAX) {
        return Err(overflow("conversion to integer").into());
    }
    Ok(Some(Value::Integer(value as i32)))
}

fn string_routines() -> Vec<NativeRoutine> {
    vec![
        NativeRoutine::new("inttostr", |_, args| {
            Ok(Some(Value::String(ordinal(args)?.to_string())))
        })
        .param::<i64>("value")
        .returns::<String>(),
        NativeRoutine::new("strtoint", str_to_int)
            .param::<String>("text")
            .returns::<i32>(),
        NativeRoutine::new("upcase", |_, args| {
            Ok(Some(Value::Char(arg(args, 0)?.as_char()?.to_ascii_uppercase())))
        })
        .param::<char>("c")
        .returns::<char>(),
        NativeRoutine::new("upcase", |_, args| {
            Ok(Some(Value::String(arg(args, 0)?.as_str()?.to_uppercase())))
        })
        .param::<String>("s")
        .returns::<String>(),
        NativeRoutine::new("copy", copy)
            .param::<String>("s")
            .param::<i32>("index")
            .param::<i32>("count")
            .returns::<String>(),
        NativeRoutine::new("pos", pos)
            .param::<String>("needle")
            .param::<String>("haystack")
            .returns::<i32>(),
        NativeRoutine::new("concat", |_, args| Ok(Some(Value::String(render(args)))))
            .param::<Varargs<String>>("parts")
            .returns::<String>(),
    ]
}

fn str_to_int(_: &mut HostContext<'_>, args: &[Value]) -> Outcome {
    let text = arg(args, 0)?.as_str()?;
    let value = text
        .trim()
        .parse::<i32>()
        .map_err(|_| RuntimeError::InvalidInput {
            input: text.to_string(),
            expected: "integer",
        })?;
    Ok(Some(Value::Integer(value)))
}

/// `copy(s, index, count)`: 1-based, clamped to the string.
fn copy(_: &mut HostContext<'_>, args: &[Value]) -> Outcome {
    let text = arg(args, 0)?.as_str()?;
    let start = usize::try_from(arg(args, 1)?.as_ordinal()?.max(1) - 1).unwrap_or(0);
    let count = usize::try_from(arg(args, 2)?.as_ordinal()?).unwrap_or(0);
    let part = text.chars().skip(start).take(count).collect();
    Ok(Some(Value::String(part)))
}

fn pos(_: &mut HostContext<'_>, args: &[Value]) -> Outcome {
    let needle = arg(args, 0)?.as_str()?;
    let haystack = arg(args, 1)?.as_str()?;
    match haystack.find(needle) {
        Some(byte) => count(haystack[..byte].chars().count() + 1),
        None => integer(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{BufferedIo, InputCursor};
    use crate::runtime::cancel::CancellationToken;

    fn call(name: &str, args: &[Value]) -> Result<Option<Value>> {
        let mut io = BufferedIo::new();
        call_with(&mut io, name, args)
    }

    /// Calls the first routine named `name` whose arity fits `args`.
    fn call_with(io: &mut BufferedIo, name: &str, args: &[Value]) -> Result<Option<Value>> {
        let routine = System
            .routines()
            .into_iter()
            .find(|routine| {
                routine.name == name
                    && (routine.signature.params.len() == args.len()
                        || routine.signature.varargs().is_some())
            })
            .ok_or_else(|| anyhow::anyhow!("no routine {name}"))?;
        let mut input = InputCursor::new();
        let cancel = CancellationToken::new();
        let mut ctx = HostContext {
            io,
            input: &mut input,
            cancel: &cancel,
        };
        (routine.thunk)(&mut ctx, args)
    }

    fn string(text: &str) -> Value {
        Value::String(text.to_string())
    }

    #[test]
    fn writeln_renders_every_argument() {
        let mut io = BufferedIo::new();
        call_with(
            &mut io,
            "writeln",
            &[string("x = "), Value::Integer(3), Value::Double(1.5)],
        )
        .unwrap();
        assert_eq!(io.output(), "x = 31.5\n");
    }

    #[test]
    fn inc_and_dec_update_the_variable() {
        let counter = Reference::new(Value::Integer(5));
        let pointer = Value::Pointer(Some(counter.clone()));
        call("inc", &[pointer.clone()]).unwrap();
        call("dec", &[pointer.clone(), Value::Integer(3)]).unwrap();
        assert_eq!(counter.get().unwrap(), Value::Integer(3));

        let letter = Reference::new(Value::Char('a'));
        call("inc", &[Value::Pointer(Some(letter.clone())), Value::Integer(2)]).unwrap();
        assert_eq!(letter.get().unwrap(), Value::Char('c'));
    }

    #[test]
    fn string_helpers_are_one_based() {
        assert_eq!(
            call("copy", &[string("pascal"), Value::Integer(2), Value::Integer(3)]).unwrap(),
            Some(string("asc"))
        );
        assert_eq!(
            call("pos", &[string("ca"), string("pascal")]).unwrap(),
            Some(Value::Integer(4))
        );
        assert_eq!(
            call("pos", &[string("z"), string("pascal")]).unwrap(),
            Some(Value::Integer(0))
        );
    }

    #[test]
    fn array_bounds_and_sizes() {
        let items = Value::Array {
            lower: 3,
            items: vec![Value::Long(1), Value::Long(2)],
        };
        assert_eq!(call("low", &[items.clone()]).unwrap(), Some(Value::Integer(3)));
        assert_eq!(call("high", &[items.clone()]).unwrap(), Some(Value::Integer(4)));
        assert_eq!(call("sizeof", &[items]).unwrap(), Some(Value::Integer(16)));
    }

    #[test]
    fn language_errors_stay_runtime_errors() {
        let err = call("strtoint", &[string("12a")]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RuntimeError>(),
            Some(RuntimeError::InvalidInput { .. })
        ));
        let err = call("round", &[Value::Double(1e12)]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RuntimeError>(),
            Some(RuntimeError::Overflow { .. })
        ));
    }
}
