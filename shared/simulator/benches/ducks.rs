use criterion::{criterion_group, criterion_main, Criterion};
use pond_simulator::config::BattleConfig;
use pond_simulator::runner::run_headless;
use pond_simulator::scenario::{self, Scenario};

fn duck_battle(seed: u64) {
    let mut ducks = scenario::Ducks::builtin(&["rook", "counter", "sniper", "rook"]);
    let mut battle = scenario::new_battle(&mut ducks, BattleConfig::default(), seed, &[]);
    run_headless(&mut battle);
    assert_ne!(ducks.status(&battle), scenario::Status::Running);
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("ducks", |b| b.iter(|| duck_battle(0)));
}

pub fn criterion_config() -> Criterion {
    Criterion::default()
        .sample_size(10)
        .measurement_time(core::time::Duration::from_secs(20))
}

criterion_group!(name = benches;
                 config = criterion_config();
                 targets = criterion_benchmark);
criterion_main!(benches);
