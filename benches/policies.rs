use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use dmab::{
    Dmab, DmabConfig, OperatorSet, PageHinkley, PageHinkleyConfig, Policy, RouletteConfig,
    RouletteDmab, Rsmab, Scenario, SlidingConfig, Simulation, Smab,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

const HORIZON: usize = 20_000;

fn scenario(sc: Scenario) -> Arc<OperatorSet> {
    let mut rng = StdRng::seed_from_u64(42);
    Arc::new(sc.build(HORIZON, &mut rng).unwrap())
}

fn make(kind: &str, ops: &OperatorSet) -> Box<dyn Policy> {
    match kind {
        "DMAB" => Box::new(Dmab::new(ops, DmabConfig::dmab())),
        "PDMAB" => Box::new(Dmab::new(ops, DmabConfig::pdmab())),
        "KRDMAB 10" => Box::new(
            RouletteDmab::with_seed(ops, RouletteConfig::krdmab(10.0), 7).unwrap(),
        ),
        "SMAB" => Box::new(Smab::new(ops, SlidingConfig::default())),
        _ => Box::new(Rsmab::with_seed(ops, SlidingConfig::default(), 5.0, 7).unwrap()),
    }
}

fn bench_runs(c: &mut Criterion) {
    let ops = scenario(Scenario::SimpleChanging);
    let sim = Simulation::new(50, HORIZON).unwrap();

    let mut group = c.benchmark_group("simulate/simple_changing");
    group.sample_size(20);
    for kind in ["DMAB", "PDMAB", "KRDMAB 10", "SMAB", "RSMAB 5"] {
        group.bench_with_input(BenchmarkId::from_parameter(kind), &kind, |b, &kind| {
            b.iter(|| {
                let mut p = make(kind, &ops);
                sim.run(p.as_mut(), &ops);
                black_box(p.record().total_reward());
            })
        });
    }
    group.finish();
}

fn bench_page_hinkley(c: &mut Criterion) {
    // Slow sawtooth around 0.5: exercises the update without ever alarming.
    let xs: Vec<f64> = (0..4096).map(|i| 0.45 + (i % 11) as f64 * 0.01).collect();
    let cfg = PageHinkleyConfig::disabled();

    c.bench_function("page_hinkley/update", |b| {
        b.iter(|| {
            let mut ph = PageHinkley::new();
            let mut mean = 0.0;
            for (n, &x) in xs.iter().enumerate() {
                mean += (x - mean) / (n + 1) as f64;
                black_box(ph.update(&cfg, mean, x));
            }
            black_box(ph.score());
        })
    });
}

criterion_group!(benches, bench_runs, bench_page_hinkley);
criterion_main!(benches);
