//! Benchmarks chunk Ember: image binaire, table des lignes, désassemblage.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ember_benches::arithmetic_chain;
use ember_core::{disasm::disassemble, verify::verify_chunk, Chunk};

fn bench_image(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk/image");
    for terms in [256usize, 4096] {
        let chunk = arithmetic_chain(terms).expect("bench pool stays below MAX_CONSTANTS");
        let bytes = chunk.to_bytes();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::new("encode", terms), &chunk, |b, chunk| {
            b.iter(|| black_box(chunk.to_bytes()));
        });
        group.bench_with_input(BenchmarkId::new("decode_verify", terms), &bytes, |b, bytes| {
            b.iter(|| {
                let chunk = Chunk::from_bytes(black_box(bytes));
                black_box(chunk.and_then(|c| verify_chunk(&c)))
            });
        });
    }
    group.finish();
}

fn bench_lines(c: &mut Criterion) {
    let chunk = arithmetic_chain(4096).expect("bench pool stays below MAX_CONSTANTS");
    c.bench_function("chunk/line_lookup", |b| {
        b.iter(|| {
            let mut sum = 0u64;
            for offset in (0..chunk.len()).step_by(7) {
                sum += u64::from(chunk.line(black_box(offset)).unwrap_or(0));
            }
            black_box(sum)
        });
    });
}

fn bench_disasm(c: &mut Criterion) {
    let chunk = arithmetic_chain(1024).expect("bench pool stays below MAX_CONSTANTS");
    c.bench_function("chunk/disassemble", |b| b.iter(|| black_box(disassemble(&chunk, "bench"))));
}

criterion_group!(benches, bench_image, bench_lines, bench_disasm);
criterion_main!(benches);
