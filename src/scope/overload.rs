use crate::types::{Conversion, Type, conversion};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamMode {
    Value,
    Const,
    Var,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: Type,
    pub mode: ParamMode,
}

impl Parameter {
    pub fn value(name: &str, ty: Type) -> Self {
        Self {
            name: name.to_string(),
            ty,
            mode: ParamMode::Value,
        }
    }

    pub fn var(name: &str, ty: Type) -> Self {
        Self {
            name: name.to_string(),
            ty,
            mode: ParamMode::Var,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub params: Vec<Parameter>,
    pub result: Option<Type>,
}

impl Signature {
    pub fn new(params: Vec<Parameter>, result: Option<Type>) -> Self {
        Self { params, result }
    }

    pub fn varargs(&self) -> Option<&Parameter> {
        self.params
            .last()
            .filter(|param| matches!(param.ty, Type::Varargs(_)))
    }

    pub fn fixed_params(&self) -> &[Parameter] {
        match self.varargs() {
            Some(_) => &self.params[..self.params.len() - 1],
            None => &self.params,
        }
    }

    /// Same parameter types and modes; names and the result type are not
    /// part of the overload identity.
    pub fn same_parameters(&self, other: &Signature) -> bool {
        self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.mode == b.mode && a.ty == b.ty)
    }
}

/// Static shape of one call argument.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentShape {
    pub ty: Type,
    pub assignable: bool,
}

/// How one argument binds to its parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Value(Type),
    Reference,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Applicable {
    pub cost: u32,
    pub bindings: Vec<Binding>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverloadFailure {
    NoneApplicable,
    Ambiguous,
}

fn bind(param_ty: &Type, mode: ParamMode, arg: &ArgumentShape) -> Option<(u32, Binding)> {
    if mode == ParamMode::Var {
        if !arg.assignable {
            return None;
        }
        if param_ty.is_any() && !arg.ty.is_any() {
            return Some((Conversion::ToAny.cost(), Binding::Reference));
        }
        return arg.ty.fits(param_ty).then_some((0, Binding::Reference));
    }
    let conversion = conversion(&arg.ty, param_ty)?;
    Some((conversion.cost(), Binding::Value(param_ty.clone())))
}

/// Checks `args` against `signature`, returning the total conversion cost.
pub fn applicable(signature: &Signature, args: &[ArgumentShape]) -> Option<Applicable> {
    let fixed = signature.fixed_params();
    if args.len() < fixed.len() || (signature.varargs().is_none() && args.len() > fixed.len()) {
        return None;
    }

    let mut cost = 0;
    let mut bindings = Vec::with_capacity(args.len());
    for (param, arg) in fixed.iter().zip(args) {
        let (arg_cost, binding) = bind(&param.ty, param.mode, arg)?;
        cost += arg_cost;
        bindings.push(binding);
    }
    if let Some(varargs) = signature.varargs()
        && let Type::Varargs(element) = &varargs.ty
    {
        // A fixed-arity match beats the same call through varargs.
        cost += 1;
        for arg in &args[fixed.len()..] {
            let (arg_cost, binding) = bind(element, varargs.mode, arg)?;
            cost += arg_cost;
            bindings.push(binding);
        }
    }
    Some(Applicable { cost, bindings })
}

/// Picks the unique cheapest applicable candidate.
pub fn select<T: Copy>(
    candidates: &[(T, &Signature)],
    args: &[ArgumentShape],
) -> Result<(T, Applicable), OverloadFailure> {
    let mut best: Option<(T, Applicable)> = None;
    let mut tied = false;
    for (candidate, signature) in candidates {
        let Some(found) = applicable(signature, args) else {
            continue;
        };
        match &best {
            Some((_, current)) if found.cost > current.cost => {}
            Some((_, current)) if found.cost == current.cost => tied = true,
            _ => {
                tied = false;
                best = Some((*candidate, found));
            }
        }
    }
    match best {
        Some(_) if tied => Err(OverloadFailure::Ambiguous),
        Some(found) => Ok(found),
        None => Err(OverloadFailure::NoneApplicable),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Subrange;

    fn shape(ty: Type) -> ArgumentShape {
        ArgumentShape {
            ty,
            assignable: false,
        }
    }

    fn place(ty: Type) -> ArgumentShape {
        ArgumentShape {
            ty,
            assignable: true,
        }
    }

    fn sig(params: Vec<Parameter>) -> Signature {
        Signature::new(params, None)
    }

    #[test]
    fn exact_match_beats_widening() {
        let int = sig(vec![Parameter::value("x", Type::INTEGER)]);
        let double = sig(vec![Parameter::value("x", Type::DOUBLE)]);
        let candidates = [(0, &double), (1, &int)];

        let (chosen, found) = select(&candidates, &[shape(Type::INTEGER)]).unwrap();
        assert_eq!(chosen, 1);
        assert_eq!(found.cost, 0);

        let (chosen, _) = select(&candidates, &[shape(Type::DOUBLE)]).unwrap();
        assert_eq!(chosen, 0);
    }

    #[test]
    fn selection_is_deterministic() {
        let long = sig(vec![Parameter::value("x", Type::LONG)]);
        let double = sig(vec![Parameter::value("x", Type::DOUBLE)]);
        for _ in 0..10 {
            let (chosen, _) = select(&[(0, &double), (1, &long)], &[shape(Type::CHAR)]).unwrap();
            assert_eq!(chosen, 1);
        }
    }

    #[test]
    fn equal_costs_are_ambiguous() {
        let left = sig(vec![
            Parameter::value("a", Type::LONG),
            Parameter::value("b", Type::INTEGER),
        ]);
        let right = sig(vec![
            Parameter::value("a", Type::INTEGER),
            Parameter::value("b", Type::LONG),
        ]);
        let args = [shape(Type::INTEGER), shape(Type::INTEGER)];
        assert_eq!(
            select(&[(0, &left), (1, &right)], &args).unwrap_err(),
            OverloadFailure::Ambiguous
        );
    }

    #[test]
    fn varargs_accepts_any_number_of_trailing_arguments() {
        let writeln = sig(vec![Parameter::value("args", Type::varargs(Type::ANY))]);
        assert!(applicable(&writeln, &[]).is_some());
        assert_eq!(
            applicable(&writeln, &[shape(Type::STRING), shape(Type::INTEGER)])
                .unwrap()
                .bindings
                .len(),
            2
        );

        let sum = sig(vec![Parameter::value("values", Type::varargs(Type::INTEGER))]);
        assert!(applicable(&sum, &[shape(Type::INTEGER), shape(Type::DOUBLE)]).is_none());
    }

    #[test]
    fn fixed_prefix_beats_plain_varargs() {
        let text = Type::Native(crate::types::NativeType {
            name: "text",
            init: || crate::value::Value::Pointer(None),
        });
        let console = sig(vec![Parameter::value("args", Type::varargs(Type::ANY))]);
        let file = sig(vec![
            Parameter::value("file", text.clone()),
            Parameter::value("args", Type::varargs(Type::ANY)),
        ]);
        let args = [shape(text), shape(Type::STRING)];
        let (chosen, _) = select(&[(0, &console), (1, &file)], &args).unwrap();
        assert_eq!(chosen, 1);
    }

    #[test]
    fn var_parameters_need_an_identical_place() {
        let inc = sig(vec![Parameter::var("x", Type::INTEGER)]);
        assert!(applicable(&inc, &[place(Type::INTEGER)]).is_some());
        assert!(applicable(&inc, &[shape(Type::INTEGER)]).is_none());
        assert!(applicable(&inc, &[place(Type::CHAR)]).is_none());

        let open = sig(vec![Parameter::var(
            "items",
            Type::array(Type::INTEGER, Subrange::UNBOUNDED),
        )]);
        let fixed = Type::array(Type::INTEGER, Subrange::new(1, 5));
        assert!(applicable(&open, &[place(fixed)]).is_some());
    }

    #[test]
    fn arity_must_match_without_varargs() {
        let one = sig(vec![Parameter::value("x", Type::INTEGER)]);
        assert_eq!(
            select(&[(0, &one)], &[]).unwrap_err(),
            OverloadFailure::NoneApplicable
        );
    }
}
