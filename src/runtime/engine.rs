use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::ast::ops;
use crate::ast::{
    Argument, BinaryOperator, Call, CaseLabel, Direction, ExprKind, Expression, Place, Statement,
    StmtKind, VarRef,
};
use crate::config::RunConfig;
use crate::io::{InputCursor, IoHandler};
use crate::native::HostContext;
use crate::scope::{Callee, FunctionId, NativeId, RESULT_VARIABLE, ScopeId, Variable, key};
use crate::token::Position;
use crate::types::{BasicType, Type};
use crate::value::{Reference, Value};

use super::Program;
use super::cancel::CancellationToken;
use super::debug::DebugListener;
use super::error::RuntimeError;

type ExecOutcome<T> = Result<T, RuntimeError>;

/// Control flow leaving a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ExecResult {
    Normal,
    Break,
    Continue,
    Exit,
}

/// Storage for one activation. `parent` is the static link: the frame of
/// the scope the routine was declared in.
#[derive(Debug)]
struct Frame {
    scope: ScopeId,
    slots: FxHashMap<String, Reference>,
    parent: Option<Rc<Frame>>,
}

impl Frame {
    fn new(scope: ScopeId, variables: &[Variable], parent: Option<Rc<Frame>>) -> Self {
        let mut slots = FxHashMap::default();
        for variable in variables {
            slots.insert(key(&variable.name), initial_slot(variable));
        }
        Self {
            scope,
            slots,
            parent,
        }
    }
}

fn initial_slot(variable: &Variable) -> Reference {
    Reference::new(
        variable
            .initial
            .clone()
            .unwrap_or_else(|| variable.ty.default_value()),
    )
}

/// An evaluated argument before it reaches the callee.
enum Bound {
    Value(Value),
    Reference(Reference),
}

pub(super) struct Engine<'a, 'l> {
    program: &'a Program,
    io: &'a mut dyn IoHandler,
    listener: Option<&'l mut dyn DebugListener>,
    cancel: &'a CancellationToken,
    config: &'a RunConfig,
    input: InputCursor,
    /// Program and unit storage, alive for the whole run.
    globals: FxHashMap<ScopeId, Rc<Frame>>,
    frame: Option<Rc<Frame>>,
    depth: usize,
}

impl<'a, 'l> Engine<'a, 'l> {
    pub(super) fn new(
        program: &'a Program,
        io: &'a mut dyn IoHandler,
        listener: Option<&'l mut dyn DebugListener>,
        cancel: &'a CancellationToken,
        config: &'a RunConfig,
    ) -> Self {
        let mut globals = FxHashMap::default();
        let scopes = program
            .units
            .iter()
            .map(|unit| unit.scope)
            .chain(std::iter::once(program.main));
        for scope in scopes {
            let variables = program.arena.scope(scope).variables();
            globals.insert(scope, Rc::new(Frame::new(scope, variables, None)));
        }
        Self {
            program,
            io,
            listener,
            cancel,
            config,
            input: InputCursor::new(),
            globals,
            frame: None,
            depth: 0,
        }
    }

    /// Unit initializations in dependency order, the main block, then
    /// finalizations in reverse.
    pub(super) fn run(&mut self) -> ExecOutcome<()> {
        let program = self.program;
        for unit in &program.units {
            if let Some(section) = &unit.initialization {
                debug!(unit = %unit.name, "running unit initialization");
                self.exec_statement(section)?;
            }
        }
        self.exec_statement(&program.body)?;
        for unit in program.units.iter().rev() {
            if let Some(section) = &unit.finalization {
                debug!(unit = %unit.name, "running unit finalization");
                self.exec_statement(section)?;
            }
        }
        Ok(())
    }

    fn check_cancelled(&self, position: &Position) -> ExecOutcome<()> {
        if self.cancel.is_cancelled() {
            return Err(RuntimeError::Cancelled.at(position));
        }
        Ok(())
    }

    fn exec_block(&mut self, statements: &[Statement]) -> ExecOutcome<ExecResult> {
        for statement in statements {
            let flow = self.exec_statement(statement)?;
            if flow != ExecResult::Normal {
                return Ok(flow);
            }
        }
        Ok(ExecResult::Normal)
    }

    fn exec_statement(&mut self, statement: &Statement) -> ExecOutcome<ExecResult> {
        self.check_cancelled(&statement.position)?;
        self.report(statement);
        self.exec_kind(statement)
            .map_err(|error| error.at(&statement.position))
    }

    fn report(&mut self, statement: &Statement) {
        if self.listener.is_none() || matches!(statement.kind, StmtKind::Block(_)) {
            return;
        }
        let snapshot = if self.config.debug_snapshots {
            match self.snapshot() {
                Ok(snapshot) => Some(snapshot),
                Err(error) => {
                    trace!(%error, "skipped variable snapshot");
                    None
                }
            }
        } else {
            None
        };
        if let Some(listener) = self.listener.as_deref_mut() {
            listener.on_line(&statement.position);
            if let Some(snapshot) = snapshot {
                listener.on_message(&snapshot);
            }
        }
    }

    /// `name = value` for every variable visible from the current frame,
    /// innermost first, then the program's globals.
    fn snapshot(&self) -> ExecOutcome<String> {
        let arena = &self.program.arena;
        let mut entries = Vec::new();
        let mut frame = self.frame.as_ref();
        let mut seen_main = false;
        while let Some(current) = frame {
            seen_main |= current.scope == self.program.main;
            render_frame(current, arena.scope(current.scope).variables(), &mut entries)?;
            frame = current.parent.as_ref();
        }
        if !seen_main && let Some(main) = self.globals.get(&self.program.main) {
            render_frame(main, arena.scope(main.scope).variables(), &mut entries)?;
        }
        Ok(entries.join(", "))
    }

    fn exec_kind(&mut self, statement: &Statement) -> ExecOutcome<ExecResult> {
        match &statement.kind {
            StmtKind::Block(statements) => self.exec_block(statements),
            StmtKind::Assign { target, value } => {
                let value = self.eval_expression(value)?;
                self.resolve_place(target)?.set(value)?;
                Ok(ExecResult::Normal)
            }
            StmtKind::Call(call) => {
                self.eval_call(call)?;
                Ok(ExecResult::Normal)
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval_expression(condition)?.as_bool()? {
                    self.exec_statement(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.exec_statement(else_branch)
                } else {
                    Ok(ExecResult::Normal)
                }
            }
            StmtKind::While { condition, body } => {
                while self.eval_expression(condition)?.as_bool()? {
                    self.check_cancelled(&statement.position)?;
                    match self.exec_statement(body)? {
                        ExecResult::Break => break,
                        ExecResult::Exit => return Ok(ExecResult::Exit),
                        ExecResult::Normal | ExecResult::Continue => {}
                    }
                }
                Ok(ExecResult::Normal)
            }
            StmtKind::Repeat { body, condition } => loop {
                self.check_cancelled(&statement.position)?;
                match self.exec_block(body)? {
                    ExecResult::Break => break Ok(ExecResult::Normal),
                    ExecResult::Exit => break Ok(ExecResult::Exit),
                    ExecResult::Normal | ExecResult::Continue => {}
                }
                if self.eval_expression(condition)?.as_bool()? {
                    break Ok(ExecResult::Normal);
                }
            },
            StmtKind::For {
                variable,
                first,
                last,
                direction,
                body,
            } => self.exec_for(statement, variable, first, last, *direction, body),
            StmtKind::Case {
                selector,
                arms,
                otherwise,
            } => {
                let selector = self.eval_expression(selector)?.as_ordinal()?;
                for arm in arms {
                    if arm.labels.iter().any(|label| label_matches(label, selector)) {
                        return self.exec_statement(&arm.body);
                    }
                }
                match otherwise {
                    Some(otherwise) => self.exec_statement(otherwise),
                    None => Ok(ExecResult::Normal),
                }
            }
            StmtKind::Break => Ok(ExecResult::Break),
            StmtKind::Continue => Ok(ExecResult::Continue),
            StmtKind::Exit => Ok(ExecResult::Exit),
            StmtKind::New { target, pointee } => {
                let storage = Reference::new(pointee.default_value());
                self.resolve_place(target)?
                    .set(Value::Pointer(Some(storage)))?;
                Ok(ExecResult::Normal)
            }
            StmtKind::Dispose(target) => {
                let pointer = self.resolve_place(target)?;
                if matches!(pointer.get()?, Value::Pointer(None)) {
                    return Err(RuntimeError::NilDereference);
                }
                pointer.set(Value::Pointer(None))?;
                Ok(ExecResult::Normal)
            }
            StmtKind::Empty => Ok(ExecResult::Normal),
        }
    }

    /// Both bounds are evaluated once; the loop keeps its own counter and
    /// writes it to the variable before every iteration.
    fn exec_for(
        &mut self,
        statement: &Statement,
        variable: &Place,
        first: &Expression,
        last: &Expression,
        direction: Direction,
        body: &Statement,
    ) -> ExecOutcome<ExecResult> {
        let first = self.eval_expression(first)?;
        let last = self.eval_expression(last)?.as_ordinal()?;
        let counter = self.resolve_place(variable)?;
        counter.set(first.clone())?;

        let mut current = first.as_ordinal()?;
        let finished = |current: i64| match direction {
            Direction::Up => current > last,
            Direction::Down => current < last,
        };
        while !finished(current) {
            self.check_cancelled(&statement.position)?;
            counter.set(first.with_ordinal(current)?)?;
            match self.exec_statement(body)? {
                ExecResult::Break => break,
                ExecResult::Exit => return Ok(ExecResult::Exit),
                ExecResult::Normal | ExecResult::Continue => {}
            }
            if current == last {
                break;
            }
            current = match direction {
                Direction::Up => current + 1,
                Direction::Down => current - 1,
            };
        }
        Ok(ExecResult::Normal)
    }

    fn eval_expression(&mut self, expression: &Expression) -> ExecOutcome<Value> {
        match &expression.kind {
            ExprKind::Literal(value) => Ok(value.clone()),
            ExprKind::Place(place) => self.resolve_place(place)?.get(),
            ExprKind::ArrayLiteral { lower, items } => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match &item.kind {
                        ExprKind::Range { low, high } => {
                            let low = self.eval_expression(low)?;
                            let high = self.eval_expression(high)?;
                            values.extend(ops::expand_range(&low, &high)?);
                        }
                        _ => values.push(self.eval_expression(item)?),
                    }
                }
                Ok(Value::Array {
                    lower: *lower,
                    items: values,
                })
            }
            ExprKind::Range { .. } => Err(RuntimeError::Internal(
                "range outside of an array constructor",
            )),
            ExprKind::AddressOf(place) => Ok(Value::Pointer(Some(self.resolve_place(place)?))),
            ExprKind::Unary { op, operand } => {
                let operand = self.eval_expression(operand)?;
                ops::unary(*op, &operand)
            }
            ExprKind::Binary { op, left, right } => self.eval_binary(*op, left, right),
            ExprKind::Convert {
                conversion,
                operand,
            } => conversion.apply(self.eval_expression(operand)?),
            ExprKind::Format {
                value,
                width,
                precision,
            } => {
                let value = self.eval_expression(value)?;
                let width = self.eval_expression(width)?;
                let precision = match precision {
                    Some(precision) => Some(self.eval_expression(precision)?),
                    None => None,
                };
                ops::format(&value, &width, precision.as_ref())
            }
            ExprKind::Call(call) => self
                .eval_call(call)?
                .ok_or(RuntimeError::Internal("routine returned no value")),
        }
    }

    /// Boolean `and`/`or` short-circuit; everything else evaluates both
    /// operands left to right.
    fn eval_binary(
        &mut self,
        op: BinaryOperator,
        left: &Expression,
        right: &Expression,
    ) -> ExecOutcome<Value> {
        let logical = left.ty == Type::Basic(BasicType::Boolean)
            && matches!(op, BinaryOperator::And | BinaryOperator::Or);
        let left = self.eval_expression(left)?;
        if logical {
            let decided = match op {
                BinaryOperator::And => !left.as_bool()?,
                _ => left.as_bool()?,
            };
            if decided {
                return Ok(left);
            }
            return Ok(Value::Boolean(self.eval_expression(right)?.as_bool()?));
        }
        let right = self.eval_expression(right)?;
        ops::binary(op, &left, &right)
    }

    fn resolve_place(&mut self, place: &Place) -> ExecOutcome<Reference> {
        match place {
            Place::Variable(variable) => self.variable(variable),
            Place::Element { base, index } => {
                let index = self.eval_expression(index)?.as_ordinal()?;
                Ok(self.resolve_place(base)?.element(index))
            }
            Place::Char { base, index } => {
                let index = self.eval_expression(index)?.as_ordinal()?;
                Ok(self.resolve_place(base)?.char_at(index))
            }
            Place::Deref(pointer) => match self.eval_expression(pointer)? {
                Value::Pointer(Some(target)) => Ok(target),
                Value::Pointer(None) => Err(RuntimeError::NilDereference),
                other => Err(RuntimeError::InvalidValue {
                    expected: "pointer",
                    found: other.type_name().to_string(),
                }),
            },
        }
    }

    fn variable(&self, variable: &VarRef) -> ExecOutcome<Reference> {
        let mut frame = self.frame.as_ref();
        while let Some(current) = frame {
            if current.scope == variable.scope {
                return current
                    .slots
                    .get(&variable.name)
                    .cloned()
                    .ok_or(RuntimeError::Internal("variable missing from its frame"));
            }
            frame = current.parent.as_ref();
        }
        self.globals
            .get(&variable.scope)
            .and_then(|frame| frame.slots.get(&variable.name))
            .cloned()
            .ok_or(RuntimeError::Internal("variable has no storage"))
    }

    fn eval_call(&mut self, call: &Call) -> ExecOutcome<Option<Value>> {
        let mut args = Vec::with_capacity(call.args.len());
        for argument in &call.args {
            args.push(match argument {
                Argument::Value(expression) => Bound::Value(self.eval_expression(expression)?),
                Argument::Reference(place) => Bound::Reference(self.resolve_place(place)?),
            });
        }
        match call.callee {
            Callee::User(function) => self.call_user(function, args),
            Callee::Native(routine) => self.call_native(routine, args),
        }
    }

    fn call_user(&mut self, id: FunctionId, args: Vec<Bound>) -> ExecOutcome<Option<Value>> {
        let program = self.program;
        let function = program.arena.function(id);
        let body = function
            .body
            .as_ref()
            .ok_or(RuntimeError::Internal("routine has no body"))?;
        if self.depth >= self.config.max_call_depth {
            return Err(RuntimeError::StackOverflow {
                depth: self.config.max_call_depth,
            });
        }

        let mut slots = FxHashMap::default();
        for (param, arg) in function.signature.params.iter().zip(args) {
            let slot = match arg {
                Bound::Value(value) => Reference::new(value),
                Bound::Reference(reference) => reference,
            };
            slots.insert(key(&param.name), slot);
        }
        for variable in program.arena.scope(function.scope).variables() {
            slots
                .entry(key(&variable.name))
                .or_insert_with(|| initial_slot(variable));
        }
        let frame = Rc::new(Frame {
            scope: function.scope,
            slots,
            parent: self.static_link(function.declared_in),
        });
        trace!(routine = %function.name, depth = self.depth + 1, "enter");

        let caller = self.frame.replace(frame);
        self.depth += 1;
        let flow = self.exec_statement(body);
        self.depth -= 1;
        let callee = std::mem::replace(&mut self.frame, caller);
        flow?;

        if function.signature.result.is_none() {
            return Ok(None);
        }
        let result = callee
            .as_ref()
            .and_then(|frame| frame.slots.get(RESULT_VARIABLE))
            .ok_or(RuntimeError::Internal("function frame has no result"))?;
        result.get().map(Some)
    }

    /// Nearest frame on the current static chain belonging to `scope`. Top
    /// level routines link to nothing and reach globals directly.
    fn static_link(&self, scope: ScopeId) -> Option<Rc<Frame>> {
        let mut frame = self.frame.as_ref();
        while let Some(current) = frame {
            if current.scope == scope {
                return Some(Rc::clone(current));
            }
            frame = current.parent.as_ref();
        }
        None
    }

    fn call_native(&mut self, id: NativeId, args: Vec<Bound>) -> ExecOutcome<Option<Value>> {
        let routine = self.program.arena.native(id);
        let values: Vec<Value> = args
            .into_iter()
            .map(|arg| match arg {
                Bound::Value(value) => value,
                Bound::Reference(reference) => Value::Pointer(Some(reference)),
            })
            .collect();
        let mut context = HostContext {
            io: &mut *self.io,
            input: &mut self.input,
            cancel: self.cancel,
        };
        (routine.thunk)(&mut context, &values).map_err(|cause| {
            match cause.downcast::<RuntimeError>() {
                Ok(error) => error,
                Err(cause) => RuntimeError::NativeCall {
                    routine: routine.name.clone(),
                    cause,
                },
            }
        })
    }
}

fn label_matches(label: &CaseLabel, selector: i64) -> bool {
    match label {
        CaseLabel::Value(value) => value.as_ordinal().is_ok_and(|value| value == selector),
        CaseLabel::Range(low, high) => match (low.as_ordinal(), high.as_ordinal()) {
            (Ok(low), Ok(high)) => (low..=high).contains(&selector),
            _ => false,
        },
    }
}

fn render_frame(
    frame: &Frame,
    variables: &[Variable],
    entries: &mut Vec<String>,
) -> ExecOutcome<()> {
    for variable in variables {
        if let Some(slot) = frame.slots.get(&key(&variable.name)) {
            entries.push(format!("{} = {}", variable.name, slot.get()?.to_output()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use crate::compiler::compile;
    use crate::config::RunConfig;
    use crate::io::BufferedIo;
    use crate::runtime::ExitOutcome;
    use crate::runtime::cancel::CancellationToken;
    use crate::runtime::debug::LineRecorder;
    use crate::runtime::error::RuntimeError;

    fn config() -> RunConfig {
        RunConfig {
            max_call_depth: 24,
            ..RunConfig::default()
        }
    }

    fn run_with_input(source: &str, input: &str) -> (ExitOutcome, String) {
        let program = compile(source, "test", &[]).unwrap();
        let mut io = BufferedIo::with_input(input);
        let outcome = program.run_with(&mut io, None, &CancellationToken::new(), &config());
        (outcome, io.into_output())
    }

    fn run(source: &str) -> String {
        let (outcome, output) = run_with_input(source, "");
        assert!(outcome.is_completed(), "{outcome}");
        output
    }

    fn failure(source: &str) -> (RuntimeError, String) {
        match run_with_input(source, "").0 {
            ExitOutcome::Failed(failure) => {
                let position = failure
                    .position
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                (failure.error, position)
            }
            other => panic!("expected a failure, got {other}"),
        }
    }

    #[test]
    fn while_loop_accumulates() {
        let output = run(indoc! {"
            var i, sum: integer;
            begin
              i := 5;
              sum := 0;
              while i > 0 do
              begin
                sum := sum + i;
                i := i - 1;
              end;
              writeln(sum);
            end.
        "});
        assert_eq!(output, "15\n");
    }

    #[test]
    fn break_and_continue_steer_loops() {
        let output = run(indoc! {"
            var i, sum: integer;
            begin
              sum := 0;
              for i := 1 to 10 do
              begin
                if i mod 2 = 0 then continue;
                if i > 7 then break;
                sum := sum + i;
              end;
              writeln(sum);
              i := 0;
              repeat
                i := i + 1;
                if i = 3 then break;
              until false;
              writeln(i);
            end.
        "});
        assert_eq!(output, "16\n3\n");
    }

    #[test]
    fn for_bounds_are_evaluated_once() {
        let output = run(indoc! {"
            var i, n, count: integer;
            begin
              n := 3;
              count := 0;
              for i := 1 to n do
              begin
                n := n + 1;
                count := count + 1;
              end;
              writeln(count, ' ', n);
              for i := 3 downto 1 do write(i);
              writeln;
            end.
        "});
        assert_eq!(output, "3 6\n321\n");
    }

    #[test]
    fn recursion_and_var_parameters() {
        let output = run(indoc! {"
            var total: integer;

            function fact(n: integer): integer;
            begin
              if n <= 1 then
                fact := 1
              else
                fact := n * fact(n - 1);
            end;

            procedure bump(var target: integer; amount: integer);
            begin
              target := target + amount;
              amount := 0;
            end;

            begin
              total := 1;
              bump(total, fact(5));
              writeln(total);
            end.
        "});
        assert_eq!(output, "121\n");
    }

    #[test]
    fn nested_routines_see_enclosing_locals() {
        let output = run(indoc! {"
            function outer(n: integer): integer;
            var acc: integer;

              procedure add(k: integer);
              begin
                acc := acc + k;
                if k > 1 then add(k - 1);
              end;

            begin
              acc := 0;
              add(n);
              outer := acc;
            end;

            begin
              writeln(outer(4));
            end.
        "});
        assert_eq!(output, "10\n");
    }

    #[test]
    fn exit_leaves_only_the_current_routine() {
        let output = run(indoc! {"
            function first(limit: integer): integer;
            var i: integer;
            begin
              for i := 1 to 100 do
                if i * i > limit then exit(i);
              first := -1;
            end;

            begin
              writeln(first(20));
              writeln('after');
            end.
        "});
        assert_eq!(output, "5\nafter\n");
    }

    #[test]
    fn arrays_are_copied_by_value() {
        let output = run(indoc! {"
            var a, b: array[1..3] of integer;
            begin
              a[1] := 1;
              b := a;
              b[1] := 9;
              writeln(a[1], ' ', b[1]);
            end.
        "});
        assert_eq!(output, "1 9\n");
    }

    #[test]
    fn pointers_alias_their_target() {
        let output = run(indoc! {"
            var x: integer;
                p, q: ^integer;
            begin
              x := 1;
              p := @x;
              p^ := 5;
              new(q);
              q^ := p^ + 1;
              writeln(x, ' ', q^, ' ', p = @x);
              dispose(q);
              writeln(q = nil);
            end.
        "});
        assert_eq!(output, "5 6 TRUE\nTRUE\n");
    }

    #[test]
    fn case_matches_values_and_ranges() {
        let output = run(indoc! {"
            var i: integer;
            begin
              for i := 1 to 4 do
                case i of
                  1: write('a');
                  2..3: write('b');
                else
                  write('z');
                end;
              writeln;
            end.
        "});
        assert_eq!(output, "abbz\n");
    }

    #[test]
    fn boolean_operators_short_circuit() {
        let output = run(indoc! {"
            var p: ^integer;
            begin
              p := nil;
              if (p <> nil) and (p^ > 0) then writeln('deref');
              if (p = nil) or (p^ > 0) then writeln('safe');
            end.
        "});
        assert_eq!(output, "safe\n");
    }

    #[test]
    fn read_parses_words_from_input() {
        let (outcome, output) = run_with_input(
            indoc! {"
                var a, b: integer;
                begin
                  readln(a, b);
                  writeln(a + b);
                end.
            "},
            "3 4\n",
        );
        assert!(outcome.is_completed(), "{outcome}");
        assert_eq!(output, "7\n");
    }

    #[test]
    fn division_by_zero_reports_its_line() {
        let (error, position) = failure(indoc! {"
            var a, b: integer;
            begin
              a := 1;
              b := 0;
              writeln(a div b);
            end.
        "});
        assert!(matches!(error.kind(), RuntimeError::DivisionByZero));
        assert_eq!(position, "test:5:3");
    }

    #[test]
    fn index_out_of_bounds_is_a_runtime_error() {
        let (error, _) = failure(indoc! {"
            var a: array[1..3] of integer;
                i: integer;
            begin
              i := 4;
              a[i] := 1;
            end.
        "});
        assert!(matches!(
            error.kind(),
            RuntimeError::IndexOutOfBounds {
                index: 4,
                lower: 1,
                upper: 3
            }
        ));
    }

    #[test]
    fn nil_dereference_is_a_runtime_error() {
        let (error, _) = failure(indoc! {"
            var p: ^integer;
            begin
              p := nil;
              p^ := 1;
            end.
        "});
        assert!(matches!(error.kind(), RuntimeError::NilDereference));
    }

    #[test]
    fn runaway_recursion_overflows() {
        let (error, position) = failure(indoc! {"
            procedure down(n: integer);
            begin
              down(n + 1);
            end;

            begin
              down(0);
            end.
        "});
        assert!(matches!(
            error.kind(),
            RuntimeError::StackOverflow { depth: 24 }
        ));
        assert_eq!(position, "test:3:3");
    }

    #[test]
    fn default_depth_limit_overflows_before_the_host_stack() {
        let program = compile(
            indoc! {"
                function f(n: integer): integer;
                begin
                  f := 1 + f(n + 1);
                end;

                begin
                  writeln(f(0));
                end.
            "},
            "test",
            &[],
        )
        .unwrap();
        let config = RunConfig::default();
        let mut io = BufferedIo::with_input("");
        let outcome = program.run_with(&mut io, None, &CancellationToken::new(), &config);
        let ExitOutcome::Failed(failure) = outcome else {
            panic!("expected a stack overflow, got {outcome}");
        };
        assert!(matches!(
            failure.error.kind(),
            RuntimeError::StackOverflow { depth } if *depth == config.max_call_depth
        ));
        assert_eq!(io.into_output(), "");
    }

    #[test]
    fn count_down_loops_honour_break_and_continue() {
        let output = run(indoc! {"
            var i, sum: integer;
            begin
              sum := 0;
              for i := 5 downto 1 do sum := sum + i;
              writeln(sum);
              sum := 0;
              for i := 5 downto 1 do
              begin
                sum := sum + i;
                if i = 3 then break;
              end;
              writeln(sum, ' ', i);
              sum := 0;
              for i := 5 downto 1 do
              begin
                if i = 3 then continue;
                sum := sum + i;
              end;
              writeln(sum);
            end.
        "});
        assert_eq!(output, "15\n12 3\n12\n");
    }

    #[test]
    fn bare_name_skips_routines_that_need_arguments() {
        let output = run(indoc! {"
            var n: integer;

            procedure p;

              function n(x: integer): integer;
              begin
                n := x * 2;
              end;

            begin
              writeln(n);
              writeln(n(4));
            end;

            begin
              n := 7;
              p;
            end.
        "});
        assert_eq!(output, "7\n8\n");
    }

    #[test]
    fn cancelled_token_stops_before_the_first_statement() {
        let program = compile("begin writeln('never'); end.", "test", &[]).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut io = BufferedIo::new();
        let outcome = program.run_with(&mut io, None, &cancel, &config());
        assert!(matches!(outcome, ExitOutcome::Cancelled { .. }));
        assert_eq!(io.output(), "");
    }

    #[test]
    fn listener_sees_every_line_with_a_snapshot() {
        let program = compile(
            indoc! {"
                var x: integer;
                begin
                  x := 1;
                  x := x + 1;
                end.
            "},
            "test",
            &[],
        )
        .unwrap();
        let mut recorder = LineRecorder::default();
        let mut io = BufferedIo::new();
        let outcome = program.run_with(
            &mut io,
            Some(&mut recorder),
            &CancellationToken::new(),
            &config(),
        );
        assert!(outcome.is_completed());
        let lines: Vec<_> = recorder.lines.iter().map(|position| position.line).collect();
        assert_eq!(lines, [3, 4]);
        assert_eq!(recorder.messages, ["x = 0", "x = 1"]);
    }

    #[test]
    fn snapshots_can_be_switched_off() {
        let program = compile("var x: integer; begin x := 2; end.", "test", &[]).unwrap();
        let mut recorder = LineRecorder::default();
        let config = RunConfig {
            debug_snapshots: false,
            ..config()
        };
        program.run_with(
            &mut BufferedIo::new(),
            Some(&mut recorder),
            &CancellationToken::new(),
            &config,
        );
        assert_eq!(recorder.lines.len(), 1);
        assert!(recorder.messages.is_empty());
    }
}
