use pond_simulator::avatar::AvatarHandle;
use pond_simulator::config::BattleConfig;
use pond_simulator::scenario::{self, Status};
use rayon::prelude::*;
use std::time::Instant;
use test_log::test;

fn check_solution(scenario_name: &str) {
    (0..4u64).into_par_iter().for_each(|seed| {
        let start_time = Instant::now();
        let check_once = |seed: u64| -> u64 {
            let mut scenario = scenario::load(scenario_name);
            let codes = scenario.solution_codes();
            let mut battle =
                scenario::new_battle(scenario.as_mut(), BattleConfig::default(), seed, &codes);
            battle.start(|_| {});

            let mut i = 0;
            while scenario.status(&battle) == Status::Running && i < 20000 {
                battle.update();
                i += 1;
            }

            assert_eq!(
                scenario.status(&battle),
                Status::Victory {
                    avatar: AvatarHandle(0)
                },
                "{} did not succeed with seed {}",
                scenario_name,
                seed
            );
            battle.hash()
        };
        let hashes: Vec<u64> = (0..2).map(|_| check_once(seed)).collect();
        assert_eq!(
            hashes[0], hashes[1],
            "{} was not deterministic",
            scenario_name
        );
        log::info!(
            "{} seed {} took {:?}",
            scenario_name,
            seed,
            Instant::now() - start_time
        );
    });
}

#[test]
fn test_stationary_levels() {
    vec!["tutor1", "tutor2", "tutor3", "tutor4"]
        .into_par_iter()
        .for_each(check_solution);
}

#[test]
fn test_moving_levels() {
    vec!["tutor5", "tutor6", "tutor7", "tutor8", "tutor9", "tutor10"]
        .into_par_iter()
        .for_each(check_solution);
}

#[test]
fn test_no_code_fails() {
    let mut scenario = scenario::load("tutor1");
    let mut battle = scenario::new_battle(scenario.as_mut(), BattleConfig::default(), 0, &[]);
    battle.start(|_| {});
    while scenario.status(&battle) == Status::Running {
        battle.update();
    }
    assert_eq!(scenario.status(&battle), Status::Failed);
    assert_eq!(battle.survivors(), Some(2));
}
