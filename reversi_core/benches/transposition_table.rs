use criterion::{black_box, criterion_group, criterion_main, Criterion};
use reversi_core::transposition_table::TranspositionTable;
use reversi_core::types::SolveResult;

fn bench_store(c: &mut Criterion) {
    let tt = TranspositionTable::new(64);
    let mut key: u64 = 0x9E3779B97F4A7C15;
    c.bench_function("transposition_table/store", |b| {
        b.iter(|| {
            key = key.wrapping_mul(0x2545F4914F6CDD1D).wrapping_add(1);
            tt.store(black_box(key), 10, 3, 4, SolveResult::Unknown, 0);
        })
    });
}

fn bench_probe_hit(c: &mut Criterion) {
    let tt = TranspositionTable::new(64);
    tt.store(0xABCD, 10, 3, 4, SolveResult::Unknown, 0);
    c.bench_function("transposition_table/probe_hit", |b| {
        b.iter(|| black_box(tt.probe(black_box(0xABCD), 5)))
    });
}

fn bench_probe_miss(c: &mut Criterion) {
    let tt = TranspositionTable::new(64);
    c.bench_function("transposition_table/probe_miss", |b| {
        b.iter(|| black_box(tt.probe(black_box(0x1234), 5)))
    });
}

criterion_group!(benches, bench_store, bench_probe_hit, bench_probe_miss);
criterion_main!(benches);
