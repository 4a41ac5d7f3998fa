//! Benchmarks for the POMCP planner: cost of building a root node from a
//! belief, and of a full `choose_move` search at a few iteration budgets.

use chess::belief::StateDistribution;
use chess::board::Board;
use chess::piece::Color;
use chess::planner::{self, PlannerConfig};
use chess::rng::BeliefRng;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn config(iterations: usize) -> PlannerConfig {
    PlannerConfig {
        base_iterations: iterations,
        base_rollout_depth: 3,
        rollout_particles: 32,
        heuristic_samples: 5,
        ..PlannerConfig::default()
    }
}

fn bench_choose_move(c: &mut Criterion) {
    let mut group = c.benchmark_group("planner choose_move");
    group.sample_size(10);
    let belief = StateDistribution::reinitialize(Board::initial(), 32);
    for iterations in [50usize, 200, 800] {
        let cfg = config(iterations);
        group.bench_with_input(
            BenchmarkId::new("choose_move", iterations),
            &cfg,
            |b, cfg| {
                b.iter_batched(
                    || BeliefRng::from_seed(99),
                    |mut rng| {
                        std::hint::black_box(planner::choose_move(
                            &belief,
                            Color::White,
                            cfg,
                            cfg.total_budget_secs,
                            &mut rng,
                        ))
                    },
                    criterion::BatchSize::LargeInput,
                );
            },
        );
    }
    group.finish();
}

criterion_group! {
    name = planner_benches;
    config = Criterion::default().sample_size(10);
    targets = bench_choose_move
}
criterion_main!(planner_benches);
