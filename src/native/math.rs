use anyhow::Result;

use crate::ast::{BinaryOperator, ops};
use crate::runtime::error::RuntimeError;
use crate::value::Value;

use super::{HostContext, NativeLibrary, NativeRoutine, arg};

type Outcome = Result<Option<Value>>;

/// Trigonometry, logarithms and the `max`/`min` family.
pub struct Math;

impl NativeLibrary for Math {
    fn name(&self) -> &'static str {
        "math"
    }

    fn routines(&self) -> Vec<NativeRoutine> {
        let unary = [
            NativeRoutine::new("arccos", |_, args| real(args, f64::acos)),
            NativeRoutine::new("arcsin", |_, args| real(args, f64::asin)),
            NativeRoutine::new("arctan", |_, args| real(args, f64::atan)),
            NativeRoutine::new("sin", |_, args| real(args, f64::sin)),
            NativeRoutine::new("cos", |_, args| real(args, f64::cos)),
            NativeRoutine::new("tan", |_, args| real(args, f64::tan)),
            NativeRoutine::new("ln", |_, args| real(args, f64::ln)),
            NativeRoutine::new("exp", |_, args| real(args, f64::exp)),
        ];
        let mut routines: Vec<_> = unary
            .into_iter()
            .map(|routine| routine.param::<f64>("x").returns::<f64>())
            .collect();

        routines.extend([
            NativeRoutine::new("power", power)
                .param::<f64>("base")
                .param::<f64>("exponent")
                .returns::<f64>(),
            NativeRoutine::new("floor", |_, args| whole(args, f64::floor))
                .param::<f64>("x")
                .returns::<i32>(),
            NativeRoutine::new("ceil", |_, args| whole(args, f64::ceil))
                .param::<f64>("x")
                .returns::<i32>(),
        ]);

        for (name, thunk) in [("max", pick_max as Picker), ("min", pick_min)] {
            routines.extend([
                NativeRoutine::new(name, thunk)
                    .param::<i32>("a")
                    .param::<i32>("b")
                    .returns::<i32>(),
                NativeRoutine::new(name, thunk)
                    .param::<i64>("a")
                    .param::<i64>("b")
                    .returns::<i64>(),
                NativeRoutine::new(name, thunk)
                    .param::<f64>("a")
                    .param::<f64>("b")
                    .returns::<f64>(),
            ]);
        }
        routines
    }
}

type Picker = fn(&mut HostContext<'_>, &[Value]) -> Outcome;

fn real(args: &[Value], apply: fn(f64) -> f64) -> Outcome {
    Ok(Some(Value::Double(apply(arg(args, 0)?.as_f64()?))))
}

fn whole(args: &[Value], apply: fn(f64) -> f64) -> Outcome {
    let value = apply(arg(args, 0)?.as_f64()?);
    if !value.is_finite() || value < f64::from(i32::MIN) || value > f64::from(i32::MAX) {
        return Err(RuntimeError::Overflow {
            operation: "conversion to integer",
        }
        .into());
    }
    Ok(Some(Value::Integer(value as i32)))
}

fn power(_: &mut HostContext<'_>, args: &[Value]) -> Outcome {
    let base = arg(args, 0)?.as_f64()?;
    let exponent = arg(args, 1)?.as_f64()?;
    Ok(Some(Value::Double(base.powf(exponent))))
}

/// Both operands share a type; the chosen one is returned unchanged.
fn pick(args: &[Value], keep_left: BinaryOperator) -> Outcome {
    let left = arg(args, 0)?;
    let right = arg(args, 1)?;
    let chosen = if ops::binary(keep_left, left, right)?.as_bool()? {
        left
    } else {
        right
    };
    Ok(Some(chosen.clone()))
}

fn pick_max(_: &mut HostContext<'_>, args: &[Value]) -> Outcome {
    pick(args, BinaryOperator::GreaterEqual)
}

fn pick_min(_: &mut HostContext<'_>, args: &[Value]) -> Outcome {
    pick(args, BinaryOperator::LessEqual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{BufferedIo, InputCursor};
    use crate::runtime::cancel::CancellationToken;
    use crate::types::Type;

    fn call(name: &str, params: &[Type], args: &[Value]) -> Outcome {
        let routine = Math
            .routines()
            .into_iter()
            .find(|routine| {
                routine.name == name
                    && routine
                        .signature
                        .params
                        .iter()
                        .map(|param| &param.ty)
                        .eq(params.iter())
            })
            .ok_or_else(|| anyhow::anyhow!("no routine {name}"))?;
        let mut io = BufferedIo::new();
        let mut input = InputCursor::new();
        let cancel = CancellationToken::new();
        let mut ctx = HostContext {
            io: &mut io,
            input: &mut input,
            cancel: &cancel,
        };
        (routine.thunk)(&mut ctx, args)
    }

    #[test]
    fn max_and_min_keep_the_operand_kind() {
        let ints = [Type::INTEGER, Type::INTEGER];
        assert_eq!(
            call("max", &ints, &[Value::Integer(3), Value::Integer(9)]).unwrap(),
            Some(Value::Integer(9))
        );
        assert_eq!(
            call("min", &ints, &[Value::Integer(3), Value::Integer(9)]).unwrap(),
            Some(Value::Integer(3))
        );
        let longs = [Type::LONG, Type::LONG];
        assert_eq!(
            call("max", &longs, &[Value::Long(i64::MAX), Value::Long(i64::MAX - 1)]).unwrap(),
            Some(Value::Long(i64::MAX))
        );
    }

    #[test]
    fn floor_and_ceil_return_integers() {
        let real = [Type::DOUBLE];
        assert_eq!(
            call("floor", &real, &[Value::Double(-1.5)]).unwrap(),
            Some(Value::Integer(-2))
        );
        assert_eq!(
            call("ceil", &real, &[Value::Double(1.2)]).unwrap(),
            Some(Value::Integer(2))
        );
        let args = [Value::Double(2.0), Value::Double(10.0)];
        assert_eq!(
            call("power", &[Type::DOUBLE, Type::DOUBLE], &args).unwrap(),
            Some(Value::Double(1024.0))
        );
    }
}
