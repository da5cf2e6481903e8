use criterion::{criterion_group, criterion_main, Criterion};
use sim_runtime::{SimulationEngine, SimulationFactory};

fn bench_periods(c: &mut Criterion) {
    let now = chrono::Utc::now();
    let base = SimulationEngine::new(SimulationFactory::demo(now));
    c.bench_function("advance_period_demo", |b| {
        b.iter(|| {
            let mut engine = base.clone();
            for _ in 0..12 {
                engine.advance_period(now);
            }
            engine
        })
    });
}

criterion_group!(benches, bench_periods);
criterion_main!(benches);
