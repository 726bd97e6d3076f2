use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use su2_lattice::prelude::*;

fn pure_gauge(l: usize) -> SimulationConfig {
    SimulationConfig {
        lattice: LatticeConfig {
            extents: vec![l; 4],
            nslices: None,
        },
        init: InitConfig {
            hot_start: true,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn with_scalars(l: usize) -> SimulationConfig {
    let mut c = pure_gauge(l);
    c.fields = FieldsConfig {
        doublet: true,
        triplet: true,
        ..Default::default()
    };
    c.action.lambda_phi = 0.2;
    c.action.msq_triplet = 0.1;
    c.action.b4 = 0.2;
    c.updates.extend([
        UpdateStep::new(FieldKind::Doublet, Algorithm::Overrelax, 1),
        UpdateStep::new(FieldKind::Doublet, Algorithm::Metropolis, 1),
        UpdateStep::new(FieldKind::Triplet, Algorithm::Overrelax, 1),
        UpdateStep::new(FieldKind::Triplet, Algorithm::Metropolis, 1),
    ]);
    c
}

fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep");
    group.sample_size(10);
    for &l in &[4usize, 8] {
        group.bench_with_input(BenchmarkId::new("pure_gauge", l), &l, |b, &l| {
            let mut sim = Simulation::new(pure_gauge(l), NoComm).unwrap();
            b.iter(|| sim.sweep().unwrap());
        });
        group.bench_with_input(BenchmarkId::new("gauge_higgs_triplet", l), &l, |b, &l| {
            let mut sim = Simulation::new(with_scalars(l), NoComm).unwrap();
            b.iter(|| sim.sweep().unwrap());
        });
    }
    group.finish();
}

fn bench_two_rank_sweep(c: &mut Criterion) {
    c.bench_function("sweep/two_local_ranks_8^4", |b| {
        b.iter_custom(|iters| {
            let cfg = pure_gauge(8);
            let world = LocalComm::world_with_timeout(2, cfg.comm_timeout());
            let times: Vec<_> = std::thread::scope(|s| {
                let hs: Vec<_> = world
                    .into_iter()
                    .map(|comm| {
                        let cfg = cfg.clone();
                        s.spawn(move || {
                            let mut sim = Simulation::new(cfg, comm).unwrap();
                            let t0 = std::time::Instant::now();
                            for _ in 0..iters {
                                sim.sweep().unwrap();
                            }
                            black_box(sim.counters().total_accepted());
                            t0.elapsed()
                        })
                    })
                    .collect();
                hs.into_iter().map(|h| h.join().unwrap()).collect()
            });
            times.into_iter().max().unwrap_or_default()
        });
    });
}

criterion_group!(benches, bench_sweep, bench_two_rank_sweep);
criterion_main!(benches);
