#![allow(dead_code)]
use std::fs;
use std::path::{Path, PathBuf};

use pascal_interp::{Program, compile};

/// `(case name, case directory)` of every bench-enabled case tagged `tag`.
pub fn workloads(tag: &str) -> Vec<(String, PathBuf)> {
    test_support::bench_cases(Path::new("tests/programs"), tag)
        .unwrap_or_else(|err| panic!("load bench cases: {err:#}"))
        .into_iter()
        .map(|case| (case.name, case.dir))
        .collect()
}

pub fn load_source(dir: &Path) -> String {
    let path = dir.join("program.pas");
    fs::read_to_string(&path).unwrap_or_else(|err| panic!("read {}: {err}", path.display()))
}

pub fn load_program(dir: &Path) -> Program {
    let source = load_source(dir);
    compile(&source, "program", &[dir.to_path_buf()])
        .unwrap_or_else(|err| panic!("compile {}: {err}", dir.display()))
}
