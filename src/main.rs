use std::fs;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pascal_interp::io::StdIo;
use pascal_interp::runtime::debug::TraceListener;
use pascal_interp::{CancellationToken, CompileOptions, Compiler, DebugListener, ExitOutcome, RunConfig};

#[derive(Parser)]
#[command(name = "pascal-interp")]
#[command(about = "Runs a Pascal program", long_about = None)]
struct Cli {
    /// Program source file.
    file: PathBuf,

    /// Extra directory searched for units and include files.
    #[arg(short = 'I', long = "include", value_name = "DIR")]
    include: Vec<PathBuf>,

    /// Skip constant folding.
    #[arg(long)]
    no_fold: bool,

    /// YAML file with run limits.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log every executed line.
    #[arg(long)]
    trace_lines: bool,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn setup_logging(verbose: u8, trace_lines: bool) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let directives = if trace_lines {
        format!("{level},pascal_interp::trace=info")
    } else {
        level.to_string()
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directives))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.trace_lines);

    let source = fs::read_to_string(&cli.file)
        .with_context(|| format!("Reading {}", cli.file.display()))?;
    let config = match &cli.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };

    let mut search_path = Vec::new();
    if let Some(dir) = cli.file.parent() {
        search_path.push(dir.to_path_buf());
    }
    search_path.extend(cli.include);
    let compiler = Compiler::new(CompileOptions {
        search_path,
        fold_constants: !cli.no_fold,
        ..CompileOptions::default()
    });
    let unit_name = cli
        .file
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("main");

    let program = match compiler.compile(&source, unit_name) {
        Ok(program) => program,
        Err(error) => {
            eprintln!("{error}");
            process::exit(1);
        }
    };

    let mut tracer = TraceListener;
    let listener: Option<&mut dyn DebugListener> = if cli.trace_lines {
        Some(&mut tracer)
    } else {
        None
    };
    let cancel = CancellationToken::new();
    match program.run_with(&mut StdIo, listener, &cancel, &config) {
        ExitOutcome::Completed => Ok(()),
        outcome @ ExitOutcome::Cancelled { .. } => {
            eprintln!("{outcome}");
            process::exit(130);
        }
        ExitOutcome::Failed(failure) => {
            eprintln!("{failure}");
            process::exit(1);
        }
    }
}
