use criterion::{black_box, criterion_group, criterion_main, Criterion};
use reversi_core::bitboard::{get_moves, get_potential_moves};

const STARTING_PLAYER: u64 = (1 << 28) | (1 << 35);
const STARTING_OPPONENT: u64 = (1 << 27) | (1 << 36);

fn bench_get_moves(c: &mut Criterion) {
    c.bench_function("get_moves/starting_position", |b| {
        b.iter(|| get_moves(black_box(STARTING_PLAYER), black_box(STARTING_OPPONENT)))
    });
}

fn bench_get_potential_moves(c: &mut Criterion) {
    c.bench_function("get_potential_moves/starting_position", |b| {
        b.iter(|| get_potential_moves(black_box(STARTING_PLAYER), black_box(STARTING_OPPONENT)))
    });
}

criterion_group!(benches, bench_get_moves, bench_get_potential_moves);
criterion_main!(benches);
