use super::{check_tutor_victory, Scenario, Status};
use crate::avatar::AvatarHandle;
use crate::battle::{Battle, Code};
use nalgebra::{point, Point2};

pub const LEVELS: usize = 10;

const PLAYER: AvatarHandle = AvatarHandle(0);

struct Level {
    player: Point2<f64>,
    player_damage: f64,
    opponent: Point2<f64>,
    opponent_damage: f64,
    opponent_code: &'static str,
    solution: &'static str,
}

fn level(number: usize) -> Option<Level> {
    let (player, player_damage, opponent, opponent_damage, opponent_code, solution) = match number
    {
        1 => (
            point![50.0, 30.0],
            0.0,
            point![50.0, 70.0],
            99.0,
            "target",
            include_str!("../../tutor/level1.js"),
        ),
        2 => (
            point![70.0, 50.0],
            0.0,
            point![20.0, 50.0],
            99.0,
            "target",
            include_str!("../../tutor/level2.js"),
        ),
        3 => (
            point![20.0, 20.0],
            0.0,
            point![62.4264, 62.4264],
            0.0,
            "target",
            include_str!("../../tutor/level3.js"),
        ),
        4 => (
            point![50.0, 80.0],
            0.0,
            point![50.0, 20.0],
            0.0,
            "target",
            include_str!("../../tutor/level4.js"),
        ),
        5 => (
            point![90.0, 50.0],
            0.0,
            point![50.0, 50.0],
            0.0,
            "pendulum",
            include_str!("../../tutor/level5.js"),
        ),
        6 => (
            point![10.0, 50.0],
            0.0,
            point![50.0, 50.0],
            0.0,
            "pendulum",
            include_str!("../../tutor/level6.js"),
        ),
        7 => (
            point![20.0, 80.0],
            0.0,
            point![80.0, 20.0],
            99.0,
            "target",
            include_str!("../../tutor/level7.js"),
        ),
        8 => (
            point![50.0, 90.0],
            0.0,
            point![50.0, 10.0],
            99.0,
            "pendulum",
            include_str!("../../tutor/level8.js"),
        ),
        9 => (
            point![5.0, 50.0],
            99.0,
            point![95.0, 50.0],
            0.0,
            "target",
            include_str!("../../tutor/level9.js"),
        ),
        10 => (
            point![10.0, 10.0],
            50.0,
            point![40.0, 40.0],
            0.0,
            "scared",
            include_str!("../../tutor/level10.js"),
        ),
        _ => return None,
    };
    Some(Level {
        player,
        player_damage,
        opponent,
        opponent_damage,
        opponent_code,
        solution,
    })
}

/// One of the Pond Tutor levels: the player's avatar against a single
/// scripted opponent.
pub struct Tutor {
    number: usize,
    level: Level,
}

impl Tutor {
    pub fn new(number: usize) -> Option<Tutor> {
        level(number).map(|level| Tutor { number, level })
    }
}

impl Scenario for Tutor {
    fn name(&self) -> String {
        format!("tutor{}", self.number)
    }

    fn human_name(&self) -> String {
        format!("Pond Tutor: Level {}", self.number)
    }

    fn init(&mut self, battle: &mut Battle, _seed: u64) {
        let codes = self.initial_code();
        let player = battle.add_avatar(
            "Player",
            self.level.player,
            self.level.player_damage,
            codes[0].clone(),
        );
        battle.avatar_mut(player).data_mut().player = true;
        battle.add_avatar(
            self.level.opponent_code,
            self.level.opponent,
            self.level.opponent_damage,
            codes[1].clone(),
        );
    }

    fn status(&self, battle: &Battle) -> Status {
        check_tutor_victory(battle, PLAYER)
    }

    fn initial_code(&self) -> Vec<Code> {
        vec![
            Code::None,
            Code::Builtin(self.level.opponent_code.to_string()),
        ]
    }

    fn solution(&self) -> Code {
        Code::Js(self.level.solution.to_string())
    }

    fn next_scenario(&self) -> Option<String> {
        if self.number < LEVELS {
            Some(format!("tutor{}", self.number + 1))
        } else {
            None
        }
    }
}
