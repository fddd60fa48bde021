use anyhow::{Context, Result, bail, ensure};
use std::fs;
use std::path::Path;

use pascal_interp::io::BufferedIo;
use pascal_interp::token::Position;
use pascal_interp::{
    CancellationToken, CompileOptions, Compiler, DebugListener, ExitOutcome, Program, RunConfig,
    compile,
};
use test_support::{Case, CaseClass, load_cases, normalize_output};

const UNIT_NAME: &str = "program";

/// Trips the token once `remaining` lines have been reported.
struct CancelAfter {
    remaining: usize,
    token: CancellationToken,
}

impl DebugListener for CancelAfter {
    fn on_line(&mut self, _position: &Position) {
        match self.remaining.checked_sub(1) {
            Some(remaining) => self.remaining = remaining,
            None => self.token.cancel(),
        }
    }
}

fn run_config() -> RunConfig {
    RunConfig {
        max_call_depth: 32,
        debug_snapshots: false,
    }
}

fn execute(case: &Case, program: &Program) -> Result<(ExitOutcome, String)> {
    let mut io = BufferedIo::with_input(&case.input()?);
    let token = CancellationToken::new();
    let outcome = match case.spec.cancel_after_lines {
        Some(lines) => {
            let mut listener = CancelAfter {
                remaining: lines,
                token: token.clone(),
            };
            program.run_with(&mut io, Some(&mut listener), &token, &run_config())
        }
        None => program.run_with(&mut io, None, &token, &run_config()),
    };
    Ok((outcome, io.into_output()))
}

fn expected_text(case: &Case) -> Result<String> {
    let file = case
        .spec
        .expected
        .stderr_contains_file
        .as_deref()
        .with_context(|| format!("Missing stderr_contains_file in {}", case.name))?;
    Ok(case.read_text(file)?.trim().to_string())
}

fn check_stdout(case: &Case, output: &str) -> Result<()> {
    let Some(stdout_file) = case.spec.expected.stdout_file.as_deref() else {
        return Ok(());
    };
    let expected = case.read_text(stdout_file)?;
    assert_eq!(
        normalize_output(output),
        normalize_output(&expected),
        "Output mismatch for {}",
        case.name
    );
    Ok(())
}

fn check_position(case: &Case, position: Option<&Position>) -> Result<()> {
    if let Some(expected) = &case.spec.expected.position {
        let actual = position.map(ToString::to_string).unwrap_or_default();
        ensure!(
            &actual == expected,
            "Expected position {expected} in {}, got '{actual}'",
            case.name
        );
    }
    Ok(())
}

/// Folding must not change what a program prints.
fn check_unfolded_matches(case: &Case, source: &str, folded_output: &str) -> Result<()> {
    let compiler = Compiler::new(CompileOptions {
        search_path: vec![case.dir.clone()],
        fold_constants: false,
        ..CompileOptions::default()
    });
    let program = compiler
        .compile(source, UNIT_NAME)
        .with_context(|| format!("Compiling {} without folding", case.name))?;
    let (outcome, output) = execute(case, &program)?;
    ensure!(
        outcome.is_completed(),
        "Case {} did not complete without folding: {outcome}",
        case.name
    );
    assert_eq!(
        normalize_output(&output),
        normalize_output(folded_output),
        "Folded and unfolded output differ for {}",
        case.name
    );
    Ok(())
}

fn run_case(case: &Case) -> Result<()> {
    let source = fs::read_to_string(&case.program_path)
        .with_context(|| format!("Reading {}", case.name))?;
    let compiled = compile(&source, UNIT_NAME, &[case.dir.clone()]);
    match case.spec.class {
        CaseClass::RuntimeSuccess => {
            ensure!(
                case.spec.expected.exit_code == 0,
                "Case {} expected exit code must be 0 for runtime_success",
                case.name
            );
            let program = compiled.with_context(|| format!("Compiling {}", case.name))?;
            let (outcome, output) = execute(case, &program)?;
            ensure!(
                outcome.is_completed(),
                "Case {} did not complete: {outcome}",
                case.name
            );
            check_stdout(case, &output)?;
            check_unfolded_matches(case, &source, &output)?;
        }
        CaseClass::FrontendError => {
            ensure!(
                case.spec.expected.exit_code == 1,
                "Case {} expected exit code must be 1 for frontend_error",
                case.name
            );
            let expected = expected_text(case)?;
            let error = match compiled {
                Ok(_) => bail!("Expected frontend error in {}, but it compiled", case.name),
                Err(error) => error,
            };
            let actual = error.to_string();
            ensure!(
                actual.contains(&expected),
                "Expected frontend error containing '{expected}' in {}, got '{actual}'",
                case.name
            );
            check_position(case, Some(error.position()))?;
        }
        CaseClass::RuntimeError => {
            ensure!(
                case.spec.expected.exit_code == 1,
                "Case {} expected exit code must be 1 for runtime_error",
                case.name
            );
            let expected = expected_text(case)?;
            let program = compiled.with_context(|| format!("Compiling {}", case.name))?;
            let (outcome, output) = execute(case, &program)?;
            let ExitOutcome::Failed(failure) = outcome else {
                bail!("Expected runtime error in {}, got {outcome}", case.name);
            };
            let actual = failure.to_string();
            ensure!(
                actual.contains(&expected),
                "Expected runtime error containing '{expected}' in {}, got '{actual}'",
                case.name
            );
            check_position(case, failure.position.as_ref())?;
            check_stdout(case, &output)?;
        }
        CaseClass::Cancelled => {
            ensure!(
                case.spec.cancel_after_lines.is_some(),
                "Case {} is cancelled but sets no cancel_after_lines",
                case.name
            );
            let program = compiled.with_context(|| format!("Compiling {}", case.name))?;
            let (outcome, output) = execute(case, &program)?;
            let ExitOutcome::Cancelled { position } = outcome else {
                bail!("Expected cancellation in {}, got {outcome}", case.name);
            };
            check_position(case, position.as_ref())?;
            check_stdout(case, &output)?;
        }
    }
    Ok(())
}

#[test]
fn runs_programs() -> Result<()> {
    for case in load_cases(Path::new("tests/programs"))? {
        if case.spec.bench.enabled {
            ensure!(
                !case.spec.bench.tags.is_empty(),
                "Case {} has bench enabled but no tags",
                case.name
            );
        }
        run_case(&case)?;
    }
    Ok(())
}
