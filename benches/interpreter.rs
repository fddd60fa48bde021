mod common;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use pascal_interp::io::BufferedIo;
use pascal_interp::{CancellationToken, RunConfig};

fn bench_interpreter(c: &mut Criterion) {
    let config = RunConfig {
        debug_snapshots: false,
        ..RunConfig::default()
    };
    for tag in ["loops", "calls"] {
        for (label, dir) in common::workloads(tag) {
            let program = common::load_program(&dir);

            c.bench_function(&format!("interpreter_run_{label}"), |b| {
                let cancel = CancellationToken::new();
                b.iter(|| {
                    let mut io = BufferedIo::new();
                    let outcome = black_box(&program).run_with(&mut io, None, &cancel, &config);
                    assert!(outcome.is_completed(), "{outcome}");
                    black_box(io.into_output());
                })
            });
        }
    }
}

criterion_group!(benches, bench_interpreter);
criterion_main!(benches);
