//! Benchmarks for the audited microcosm.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use entropy_audit::{
    compute::{FieldGrid, Ledger, Simulation},
    schema::SimulationConfig,
};

fn sized_config(size: usize) -> SimulationConfig {
    SimulationConfig {
        width: size,
        height: size,
        random_seed: Some(42),
        ..SimulationConfig::default()
    }
}

fn bench_simulation_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulation_step");

    for size in [20, 50, 100, 200] {
        let mut sim = Simulation::new(sized_config(size)).expect("valid config");

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", size, size)),
            &size,
            |b, _| {
                b.iter(|| {
                    sim.step();
                    black_box(sim.tick());
                });
            },
        );
    }

    group.finish();
}

fn bench_field_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("field_update");

    for size in [50, 100, 200] {
        let mut fields = FieldGrid::new(&sized_config(size)).expect("valid config");
        let mut ledger = Ledger::default();

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", size, size)),
            &size,
            |b, _| {
                b.iter(|| {
                    fields.update(black_box(&mut ledger));
                });
            },
        );
    }

    group.finish();
}

fn bench_population(c: &mut Criterion) {
    let mut group = c.benchmark_group("population");

    for count in [40, 160, 640] {
        let mut config = sized_config(100);
        config.species[0].initial_count = count;
        let mut sim = Simulation::new(config).expect("valid config");

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_agents", count)),
            &count,
            |b, _| {
                b.iter(|| {
                    sim.step();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_simulation_step,
    bench_field_update,
    bench_population
);
criterion_main!(benches);
