mod common;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use pascal_interp::grouping::assemble;
use pascal_interp::{CompileOptions, Compiler, lexer};

fn bench_frontend(c: &mut Criterion) {
    for tag in ["loops", "calls"] {
        for (label, dir) in common::workloads(tag) {
            let source = common::load_source(&dir);
            let search_path = vec![dir.clone()];

            c.bench_function(&format!("frontend_tokenize_{label}"), |b| {
                b.iter(|| {
                    let out = lexer::tokenize(black_box(&source), "program").expect("tokenize");
                    black_box(out);
                })
            });

            c.bench_function(&format!("frontend_group_{label}"), |b| {
                b.iter(|| {
                    let out = assemble(black_box(&source), "program", &search_path);
                    black_box(out);
                })
            });

            for fold_constants in [true, false] {
                let compiler = Compiler::new(CompileOptions {
                    search_path: search_path.clone(),
                    fold_constants,
                    ..CompileOptions::default()
                });
                let mode = if fold_constants { "folded" } else { "unfolded" };
                c.bench_function(&format!("frontend_compile_{mode}_{label}"), |b| {
                    b.iter(|| {
                        let out = compiler.compile(black_box(&source), "program").expect("compile");
                        black_box(out);
                    })
                });
            }
        }
    }
}

criterion_group!(benches, bench_frontend);
criterion_main!(benches);
