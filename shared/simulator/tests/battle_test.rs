use approx::assert_abs_diff_eq;
use nalgebra::point;
use pond_simulator::avatar::AvatarHandle;
use pond_simulator::battle::{Battle, BattleState, Code, Event};
use pond_simulator::config::BattleConfig;
use pond_simulator::scenario::{self, Scenario, Status};
use pond_simulator::vm::{ErrorKind, Value};
use std::cell::Cell;
use std::rc::Rc;
use test_log::test;

const A: AvatarHandle = AvatarHandle(0);
const B: AvatarHandle = AvatarHandle(1);
const C: AvatarHandle = AvatarHandle(2);
const D: AvatarHandle = AvatarHandle(3);

fn js(source: &str) -> Code {
    Code::Js(source.to_string())
}

fn run_to_end(battle: &mut Battle, max_updates: usize) {
    for _ in 0..max_updates {
        if battle.state() != BattleState::Running {
            return;
        }
        battle.update();
    }
    panic!("battle still running after {max_updates} updates");
}

#[test]
fn test_cannon_kills_idle_target() {
    let mut battle = Battle::new(BattleConfig::default(), 0);
    battle.add_avatar(
        "gunner",
        point![10.0, 50.0],
        0.0,
        js("while (true) { cannon(0, 40); }"),
    );
    battle.add_avatar("target", point![50.0, 50.0], 0.0, Code::None);

    let survivors = Rc::new(Cell::new(None));
    let done = survivors.clone();
    battle.start(move |count| done.set(Some(count)));

    let mut first_boom = None;
    while first_boom.is_none() {
        battle.update();
        first_boom = battle.events().iter().find_map(|event| match event {
            Event::Boom { damage, x, y } => Some((*damage, *x, *y)),
            _ => None,
        });
        assert!(battle.updates() < 100);
    }
    let (damage, x, y) = first_boom.unwrap();
    assert_abs_diff_eq!(damage, 10.0, epsilon = 1e-9);
    assert_abs_diff_eq!(x, 50.0, epsilon = 1e-9);
    assert_abs_diff_eq!(y, 50.0, epsilon = 1e-9);
    assert_abs_diff_eq!(battle.avatar(B).damage(), 10.0, epsilon = 1e-9);

    run_to_end(&mut battle, 10000);
    assert!(battle.avatar(B).is_dead());
    assert!(!battle.avatar(A).is_dead());
    assert_eq!(battle.avatar(A).damage(), 0.0);
    assert_eq!(battle.survivors(), Some(1));
    assert_eq!(survivors.get(), Some(1));
    assert_eq!(battle.rank(), &[A, B]);
}

#[test]
fn test_ranking() {
    let mut battle = Battle::new(BattleConfig::default(), 0);
    for (i, x) in [10.0, 30.0, 50.0, 70.0].iter().enumerate() {
        battle.add_avatar(&format!("duck{i}"), point![*x, 50.0], 0.0, Code::None);
    }
    battle.start(|_| {});
    battle.avatar_mut(A).add_damage(10.0);
    battle.avatar_mut(D).add_damage(5.0);
    battle.avatar_mut(B).die();
    battle.update();
    battle.avatar_mut(C).die();
    assert_eq!(battle.rank(), &[C, B]);
    battle.stop();
    assert_eq!(battle.state(), BattleState::Stopped);
    assert_eq!(battle.survivors(), Some(2));
    assert_eq!(battle.rank(), &[D, A, C, B]);

    // Stopping twice changes nothing.
    battle.stop();
    assert_eq!(battle.rank(), &[D, A, C, B]);
}

#[test]
fn test_time_limit() {
    let config = BattleConfig {
        time_limit: 1000.0,
        ..Default::default()
    };
    let mut battle = Battle::new(config, 0);
    battle.add_avatar("a", point![20.0, 50.0], 0.0, Code::None);
    battle.add_avatar("b", point![80.0, 50.0], 30.0, Code::None);
    battle.start(|_| {});
    run_to_end(&mut battle, 100);
    assert_eq!(battle.updates(), 51);
    assert_eq!(battle.survivors(), Some(2));
    assert_eq!(battle.rank(), &[A, B]);
}

#[test]
fn test_script_fault_kills_only_its_avatar() {
    let mut battle = Battle::new(BattleConfig::default(), 0);
    battle.add_avatar(
        "faulty",
        point![20.0, 50.0],
        0.0,
        js("var x = 0;\nwhile (true) {\n  x++;\n  if (x > 5) quack();\n}"),
    );
    battle.add_avatar(
        "counter",
        point![80.0, 50.0],
        0.0,
        js("var n = 0;\nwhile (true) { n++; }"),
    );
    battle.start(|_| {});
    while !battle.avatar(A).is_dead() {
        battle.update();
        assert!(battle.updates() < 10);
    }

    assert!(!battle.avatar(B).is_dead());
    assert_eq!(battle.errors().len(), 1);
    let error = &battle.errors()[0];
    assert_eq!(error.avatar, A);
    assert_eq!(error.error.kind, ErrorKind::Reference);
    assert_eq!(error.error.line, 4);
    assert!(battle.events().contains(&Event::Die { avatar: A }));

    let count = |battle: &Battle| match battle.script_global(B, "n") {
        Some(Value::Number(n)) => n,
        other => panic!("unexpected {other:?}"),
    };
    let before = count(&battle);
    battle.update();
    assert!(count(&battle) > before);

    run_to_end(&mut battle, 1000);
    assert_eq!(battle.rank(), &[B, A]);
}

#[test]
fn test_init_fault() {
    let mut battle = Battle::new(BattleConfig::default(), 0);
    battle.add_avatar("broken", point![20.0, 50.0], 0.0, js("var = ;"));
    battle.add_avatar("missing", point![50.0, 50.0], 0.0, Code::Builtin("goose".into()));
    battle.add_avatar("idle", point![80.0, 50.0], 0.0, Code::None);
    battle.start(|_| {});

    assert_eq!(battle.state(), BattleState::Running);
    assert!(battle.avatar(A).is_dead());
    assert!(battle.avatar(B).is_dead());
    assert!(!battle.avatar(C).is_dead());
    assert_eq!(battle.errors()[0].error.kind, ErrorKind::Syntax);
    assert_eq!(battle.errors()[1].error.kind, ErrorKind::Reference);
    assert_eq!(
        battle.events(),
        &[Event::Die { avatar: A }, Event::Die { avatar: B }]
    );
    run_to_end(&mut battle, 1000);
    assert_eq!(battle.survivors(), Some(1));
    assert_eq!(battle.rank()[0], C);
}

#[test]
fn test_restart_resets() {
    let mut battle = Battle::new(BattleConfig::default(), 0);
    battle.add_avatar("a", point![20.0, 50.0], 5.0, js("swim(0, 100);"));
    battle.add_avatar("b", point![80.0, 80.0], 0.0, Code::None);
    battle.start(|_| {});
    for _ in 0..20 {
        battle.update();
    }
    assert!(battle.avatar(A).loc().x > 20.0);
    battle.start(|_| {});
    assert_eq!(battle.avatar(A).loc(), point![20.0, 50.0]);
    assert_eq!(battle.avatar(A).damage(), 5.0);
    assert_eq!(battle.updates(), 0);
    assert!(battle.rank().is_empty());
    battle.reset();
    assert_eq!(battle.state(), BattleState::Idle);
    battle.update();
    assert_eq!(battle.updates(), 0);
}

#[test]
fn test_string_growth_kills_only_its_avatar() {
    let mut battle = Battle::new(BattleConfig::default(), 0);
    battle.add_avatar(
        "hoarder",
        point![20.0, 50.0],
        0.0,
        js("var s = 'xxxxxxxx';\nwhile (true) {\n  s = s + s;\n}"),
    );
    battle.add_avatar(
        "counter",
        point![80.0, 50.0],
        0.0,
        js("var n = 0;\nwhile (true) { n++; }"),
    );
    battle.start(|_| {});
    while !battle.avatar(A).is_dead() {
        battle.update();
        assert!(battle.updates() < 10);
    }
    assert!(!battle.avatar(B).is_dead());
    assert_eq!(battle.errors()[0].error.kind, ErrorKind::Range);
    assert_eq!(battle.errors()[0].error.line, 3);
    assert_eq!(battle.state(), BattleState::Running);
    battle.update();
    assert!(matches!(battle.script_global(B, "n"), Some(Value::Number(n)) if n > 0.0));
}

#[test]
fn test_deeply_nested_script_is_rejected() {
    let nested = format!("var a = {}1{};", "(".repeat(3000), ")".repeat(3000));
    let mut battle = Battle::new(BattleConfig::default(), 0);
    battle.add_avatar("nested", point![20.0, 50.0], 0.0, js(&nested));
    battle.add_avatar("idle", point![80.0, 50.0], 0.0, Code::None);
    battle.start(|_| {});
    assert_eq!(battle.state(), BattleState::Running);
    assert!(battle.avatar(A).is_dead());
    assert!(!battle.avatar(B).is_dead());
    assert_eq!(battle.errors()[0].error.kind, ErrorKind::Syntax);
}

fn duck_battle(seed: u64) -> Battle {
    let mut ducks = scenario::Ducks::builtin(&["rook", "counter", "sniper", "rook"]);
    scenario::new_battle(&mut ducks, BattleConfig::default(), seed, &[])
}

#[test]
fn test_deterministic() {
    let hashes: Vec<u64> = (0..2)
        .map(|_| {
            let mut battle = duck_battle(7);
            battle.start(|_| {});
            for _ in 0..2000 {
                battle.update();
            }
            battle.hash()
        })
        .collect();
    assert_eq!(hashes[0], hashes[1]);
}

#[test]
fn test_ducks_finish() {
    let mut ducks = scenario::Ducks::builtin(&["rook", "counter", "sniper", "rook"]);
    let mut battle = scenario::new_battle(&mut ducks, BattleConfig::default(), 1, &[]);
    battle.start(|_| {});
    run_to_end(&mut battle, 20000);
    let status = ducks.status(&battle);
    assert_ne!(status, Status::Running);
    assert_eq!(battle.rank().len(), 4);
    if let Status::Victory { avatar } = status {
        assert_eq!(battle.rank()[0], avatar);
        assert!(!battle.avatar(avatar).is_dead());
    }
}

#[test]
fn test_snapshot() {
    let mut battle = duck_battle(3);
    battle.start(|_| {});
    for _ in 0..10 {
        battle.update();
    }
    let snapshot = battle.snapshot();
    assert_eq!(snapshot.updates, 10);
    assert_eq!(snapshot.ticks, 1000);
    assert_abs_diff_eq!(snapshot.time, 200.0);
    assert_eq!(snapshot.avatars.len(), 4);
    assert_eq!(snapshot.avatars[1].name.as_str(), "counter");
    let json = serde_json::to_string(&snapshot).unwrap();
    assert!(json.contains("\"state\":\"Running\""));
}

#[test]
fn test_config_from_json() {
    let config = BattleConfig::from_json(r#"{"game_fps": 1000, "blast_damage": 20}"#).unwrap();
    assert_eq!(config.tick_length(), 1.0);
    assert_eq!(config.blast_damage, 20.0);
    assert_eq!(config.max_range, 70.0);
    assert!(BattleConfig::from_json(r#"{"speed_of_light": 1}"#).is_err());
    assert!(BattleConfig::from_json(r#"{"game_fps": 0}"#).is_err());
}
