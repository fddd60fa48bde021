use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::runtime::error::RuntimeError;
use crate::value::Value;

use super::{HostContext, NativeLibrary, NativeRoutine, arg};

/// Longest uninterrupted sleep inside `delay`.
const DELAY_SLICE: Duration = Duration::from_millis(10);

/// Screen control: `clrscr` and a cancellable `delay`.
pub struct Crt;

impl NativeLibrary for Crt {
    fn name(&self) -> &'static str {
        "crt"
    }

    fn routines(&self) -> Vec<NativeRoutine> {
        vec![
            NativeRoutine::new("clrscr", clear_screen),
            NativeRoutine::new("delay", delay).param::<i32>("milliseconds"),
        ]
    }
}

fn clear_screen(ctx: &mut HostContext<'_>, _: &[Value]) -> Result<Option<Value>> {
    ctx.io.clear().map_err(|error| RuntimeError::Io {
        message: error.to_string(),
    })?;
    Ok(None)
}

fn delay(ctx: &mut HostContext<'_>, args: &[Value]) -> Result<Option<Value>> {
    let millis = u64::try_from(arg(args, 0)?.as_ordinal()?).unwrap_or(0);
    let deadline = Instant::now() + Duration::from_millis(millis);
    loop {
        if ctx.cancel.is_cancelled() {
            return Err(RuntimeError::Cancelled.into());
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        thread::sleep(DELAY_SLICE.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{BufferedIo, InputCursor};
    use crate::runtime::cancel::CancellationToken;

    #[test]
    fn delay_stops_when_cancelled() {
        let mut io = BufferedIo::new();
        let mut input = InputCursor::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut ctx = HostContext {
            io: &mut io,
            input: &mut input,
            cancel: &cancel,
        };
        let started = Instant::now();
        let err = delay(&mut ctx, &[Value::Integer(60_000)]).unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(matches!(
            err.downcast_ref::<RuntimeError>(),
            Some(RuntimeError::Cancelled)
        ));
    }

    #[test]
    fn clrscr_reaches_the_handler() {
        let mut io = BufferedIo::new();
        let mut input = InputCursor::new();
        let cancel = CancellationToken::new();
        let mut ctx = HostContext {
            io: &mut io,
            input: &mut input,
            cancel: &cancel,
        };
        clear_screen(&mut ctx, &[]).unwrap();
        assert_eq!(io.clears(), 1);
    }
}
