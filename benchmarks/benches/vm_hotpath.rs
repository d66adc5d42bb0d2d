//! Benchmarks VM Ember: boucle fetch-decode-execute (Criterion)
//!
//! Variables d'environnement :
//!   CRIT_SAMPLES (def=50) | CRIT_WARMUP_MS (def=300) | CRIT_MEASURE_MS (def=1200)
//!
//! Lancement :
//!   cargo bench -p ember-benches --bench vm_hotpath

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ember_benches::arithmetic_chain;
use ember_vm::{Vm, VmOptions};

fn env_u64(k: &str, d: u64) -> u64 {
    std::env::var(k).ok().and_then(|s| s.parse().ok()).unwrap_or(d)
}

fn configured() -> Criterion {
    Criterion::default()
        .sample_size(usize::try_from(env_u64("CRIT_SAMPLES", 50)).unwrap_or(50))
        .warm_up_time(Duration::from_millis(env_u64("CRIT_WARMUP_MS", 300)))
        .measurement_time(Duration::from_millis(env_u64("CRIT_MEASURE_MS", 1200)))
}

fn bench_interpret(c: &mut Criterion) {
    let mut group = c.benchmark_group("vm/interpret");
    for terms in [16usize, 256, 4096] {
        let chunk = arithmetic_chain(terms).expect("bench pool stays below MAX_CONSTANTS");
        group.throughput(Throughput::Bytes(chunk.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(terms), &chunk, |b, chunk| {
            let mut vm = Vm::new();
            b.iter(|| black_box(vm.interpret(black_box(chunk))));
        });
    }
    group.finish();
}

fn bench_traced(c: &mut Criterion) {
    let chunk = arithmetic_chain(256).expect("bench pool stays below MAX_CONSTANTS");
    let mut group = c.benchmark_group("vm/traced");
    group.throughput(Throughput::Bytes(chunk.len() as u64));
    group.bench_function("buffer", |b| {
        let mut vm = Vm::with_options(VmOptions::default().with_trace(true));
        let mut trace = String::new();
        b.iter(|| {
            trace.clear();
            black_box(vm.interpret_traced(black_box(&chunk), &mut trace))
        });
    });
    group.finish();
}

criterion_group! {
    name = benches;
    config = configured();
    targets = bench_interpret, bench_traced
}
criterion_main!(benches);
