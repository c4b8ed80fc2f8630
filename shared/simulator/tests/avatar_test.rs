use approx::assert_abs_diff_eq;
use nalgebra::point;
use pond_simulator::avatar::{polar_offset, AvatarHandle};
use pond_simulator::battle::{Battle, Code, Event};
use pond_simulator::config::{
    BattleConfig, ACCELERATION, COLLISION_DAMAGE, MAX_DAMAGE, MAX_SPEED,
};
use test_log::test;

fn new_battle(starts: &[(f64, f64)]) -> Battle {
    let mut battle = Battle::new(BattleConfig::default(), 0);
    for (i, &(x, y)) in starts.iter().enumerate() {
        battle.add_avatar(&format!("duck{i}"), point![x, y], 0.0, Code::None);
    }
    battle
}

const A: AvatarHandle = AvatarHandle(0);
const B: AvatarHandle = AvatarHandle(1);

#[test]
fn test_scan_cone() {
    let mut battle = new_battle(&[(50.0, 50.0), (60.0, 50.0)]);
    assert_abs_diff_eq!(battle.avatar_mut(A).scan(0.0, 5.0), 10.0);
    assert_eq!(battle.avatar_mut(A).scan(180.0, 5.0), f64::INFINITY);
    assert_eq!(battle.avatar_mut(A).scan(20.0, 10.0), f64::INFINITY);
    // Resolution is capped at 20 degrees.
    assert_eq!(battle.avatar_mut(A).scan(15.0, 90.0), f64::INFINITY);
    assert_abs_diff_eq!(battle.avatar_mut(A).scan(8.0, 90.0), 10.0);
    assert_abs_diff_eq!(battle.avatar_mut(B).scan(180.0, 2.0), 10.0);
    assert_eq!(
        battle.events()[0],
        Event::Scan {
            avatar: A,
            degree: 0.0,
            resolution: 5.0
        }
    );
}

#[test]
fn test_scan_wraps_around_north() {
    let enemy = polar_offset(&point![50.0, 50.0], 359.0, 20.0);
    let mut battle = new_battle(&[(50.0, 50.0), (enemy.x, enemy.y)]);
    assert_abs_diff_eq!(battle.avatar_mut(A).scan(0.0, 4.0), 20.0, epsilon = 1e-9);
    assert_abs_diff_eq!(battle.avatar_mut(A).scan(3.0, 10.0), 20.0, epsilon = 1e-9);
    assert_abs_diff_eq!(battle.avatar_mut(A).scan(-2.0, 4.0), 20.0, epsilon = 1e-9);
    assert_eq!(battle.avatar_mut(A).scan(10.0, 10.0), f64::INFINITY);
}

#[test]
fn test_scan_ignores_self_and_dead() {
    let mut battle = new_battle(&[(50.0, 50.0), (60.0, 50.0), (80.0, 50.0)]);
    assert_abs_diff_eq!(battle.avatar_mut(A).scan(0.0, 5.0), 10.0);
    battle.avatar_mut(B).die();
    assert_abs_diff_eq!(battle.avatar_mut(A).scan(0.0, 5.0), 30.0);
    battle.avatar_mut(AvatarHandle(2)).die();
    assert_eq!(battle.avatar_mut(A).scan(0.0, 20.0), f64::INFINITY);
}

#[test]
fn test_cannon_reload() {
    let mut battle = new_battle(&[(10.0, 50.0), (90.0, 90.0)]);
    battle.start(|_| {});
    assert!(battle.avatar_mut(A).cannon(0.0, 40.0));
    assert!(!battle.avatar_mut(A).cannon(0.0, 40.0));
    assert_eq!(battle.missiles().len(), 1);
    for _ in 0..24 {
        battle.update();
        assert!(!battle.avatar_mut(A).cannon(90.0, 10.0));
    }
    battle.update();
    assert!(battle.avatar_mut(A).cannon(90.0, 10.0));
    assert_eq!(battle.avatar(A).data().facing, 90.0);
}

#[test]
fn test_cannon_range_is_clamped() {
    let mut battle = new_battle(&[(10.0, 50.0), (90.0, 90.0)]);
    assert!(battle.avatar_mut(A).cannon(0.0, 500.0));
    let missile = &battle.missiles()[0];
    assert_eq!(missile.range, 70.0);
    assert_abs_diff_eq!(missile.end_loc, point![80.0, 50.0], epsilon = 1e-9);
}

#[test]
fn test_missile_explodes_at_range() {
    let mut battle = new_battle(&[(10.0, 50.0), (51.0, 50.0)]);
    battle.start(|_| {});
    battle.avatar_mut(A).cannon(0.0, 40.0);
    let mut booms = vec![];
    for _ in 0..20 {
        battle.update();
        for event in battle.events() {
            if let Event::Boom { damage, x, y } = event {
                booms.push((*damage, *x, *y));
            }
        }
    }
    assert_eq!(booms.len(), 1);
    let (damage, x, y) = booms[0];
    assert_abs_diff_eq!(damage, 7.5, epsilon = 1e-9);
    assert_abs_diff_eq!(x, 50.0, epsilon = 1e-9);
    assert_abs_diff_eq!(y, 50.0, epsilon = 1e-9);
    assert_abs_diff_eq!(battle.avatar(B).damage(), 7.5, epsilon = 1e-9);
    assert_eq!(battle.avatar(A).damage(), 0.0);
    assert!(battle.missiles().is_empty());
}

#[test]
fn test_drive_refuses_turn_at_speed() {
    let mut battle = new_battle(&[(10.0, 50.0), (90.0, 90.0)]);
    battle.start(|_| {});
    battle.avatar_mut(A).drive(0.0, 100.0);
    for _ in 0..20 {
        battle.update();
    }
    assert_eq!(battle.avatar(A).speed(), 100.0);
    battle.avatar_mut(A).drive(90.0, 100.0);
    assert_eq!(battle.avatar(A).data().degree, 0.0);
    assert_eq!(battle.avatar(A).data().desired_speed, 0.0);
    battle.avatar_mut(A).drive(0.0, 150.0);
    assert_eq!(battle.avatar(A).data().desired_speed, 100.0);
}

#[test]
fn test_drive_starts_moving_at_once() {
    let mut battle = new_battle(&[(10.0, 50.0), (90.0, 90.0)]);
    battle.start(|_| {});
    battle.avatar_mut(A).drive(0.0, 50.0);
    assert_eq!(battle.avatar(A).speed(), 0.1);
    assert_eq!(battle.avatar(A).data().desired_speed, 50.0);

    // Asking for no speed leaves a stopped avatar stopped.
    battle.avatar_mut(B).drive(90.0, 0.0);
    assert_eq!(battle.avatar(B).speed(), 0.0);

    battle.update();
    assert_abs_diff_eq!(battle.avatar(A).speed(), 0.1 + ACCELERATION);
}

#[test]
fn test_wall_crash() {
    let mut battle = new_battle(&[(95.0, 50.0), (10.0, 10.0)]);
    battle.start(|_| {});
    battle.avatar_mut(A).drive(0.0, 100.0);
    let mut crashes = vec![];
    let mut impact_speed = None;
    for _ in 0..100 {
        let speed_before = battle.avatar(A).speed();
        battle.update();
        for event in battle.events() {
            if let Event::Crash { avatar, damage } = event {
                crashes.push((*avatar, *damage));
                // The avatar accelerates before it moves into the wall.
                impact_speed = Some((speed_before + ACCELERATION).min(MAX_SPEED));
            }
        }
        let loc = battle.avatar(A).loc();
        assert!(loc.x <= 100.0);
    }
    assert_eq!(crashes.len(), 1);
    assert_eq!(crashes[0].0, A);
    let impact_speed = impact_speed.unwrap();
    assert!(impact_speed > 0.0);
    assert_abs_diff_eq!(
        crashes[0].1,
        impact_speed / MAX_SPEED * COLLISION_DAMAGE,
        epsilon = 1e-12
    );
    assert_eq!(battle.avatar(A).loc(), point![100.0, 50.0]);
    assert_eq!(battle.avatar(A).speed(), 0.0);
    assert_abs_diff_eq!(battle.avatar(A).damage(), crashes[0].1);
}

#[test]
fn test_collision_damages_both() {
    let mut battle = new_battle(&[(40.0, 50.0), (50.0, 50.0)]);
    battle.start(|_| {});
    battle.avatar_mut(A).drive(0.0, 50.0);
    let mut crashes = vec![];
    for _ in 0..50 {
        battle.update();
        for event in battle.events() {
            if let Event::Crash { avatar, damage } = event {
                crashes.push((*avatar, *damage));
            }
        }
    }
    assert_eq!(crashes.len(), 2);
    assert_eq!(crashes[0].1, crashes[1].1);
    let avatars: Vec<AvatarHandle> = crashes.iter().map(|(avatar, _)| *avatar).collect();
    assert!(avatars.contains(&A) && avatars.contains(&B));
    assert_eq!(battle.avatar(A).damage(), battle.avatar(B).damage());
    assert!(battle.avatar(A).damage() > 0.0);
    assert_eq!(battle.avatar(A).speed(), 0.0);
    let distance = nalgebra::distance(&battle.avatar(A).loc(), &battle.avatar(B).loc());
    assert!(distance >= 4.0, "avatars overlap: {distance}");
}

#[test]
fn test_damage_is_bounded() {
    let mut battle = new_battle(&[(10.0, 50.0), (90.0, 50.0)]);
    battle.avatar_mut(B).add_damage(60.0);
    assert!(!battle.avatar(B).is_dead());
    assert_eq!(battle.avatar(B).health(), 40.0);
    battle.avatar_mut(B).add_damage(60.0);
    assert!(battle.avatar(B).is_dead());
    assert_eq!(battle.avatar(B).damage(), MAX_DAMAGE);
    assert_eq!(battle.rank(), &[B]);

    battle.avatar_mut(B).add_damage(10.0);
    battle.avatar_mut(B).die();
    assert_eq!(battle.avatar(B).damage(), MAX_DAMAGE);
    assert_eq!(battle.rank(), &[B]);
    let deaths = battle
        .events()
        .iter()
        .filter(|e| matches!(e, Event::Die { .. }))
        .count();
    assert_eq!(deaths, 1);
}

#[test]
fn test_dead_avatars_do_not_move() {
    let mut battle = new_battle(&[(10.0, 50.0), (90.0, 50.0), (50.0, 90.0)]);
    battle.start(|_| {});
    battle.avatar_mut(A).drive(0.0, 100.0);
    battle.update();
    battle.avatar_mut(A).die();
    let loc = battle.avatar(A).loc();
    for _ in 0..10 {
        battle.update();
    }
    assert_eq!(battle.avatar(A).loc(), loc);
    assert_eq!(battle.avatar(A).speed(), 0.0);
}
