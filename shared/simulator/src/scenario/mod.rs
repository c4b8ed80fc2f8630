mod ducks;
mod tutor;

use crate::avatar::AvatarHandle;
use crate::battle::{Battle, BattleState, Code};
use crate::clock::{Clock, TickClock};
use crate::config::BattleConfig;
use serde::{Deserialize, Serialize};

pub use ducks::Ducks;
pub use tutor::Tutor;

#[derive(PartialEq, Eq, Hash, Debug, Serialize, Deserialize, Copy, Clone)]
pub enum Status {
    Running,
    Victory { avatar: AvatarHandle },
    Failed,
    Draw,
}

pub trait Scenario {
    fn name(&self) -> String;

    fn human_name(&self) -> String {
        self.name()
    }

    /// Adds the avatars. Each one starts out with its entry from
    /// `initial_code`.
    fn init(&mut self, battle: &mut Battle, seed: u64);

    fn status(&self, battle: &Battle) -> Status;

    // Indexed by avatar.
    fn initial_code(&self) -> Vec<Code>;

    /// Script that wins the scenario when given to the first avatar.
    fn solution(&self) -> Code {
        Code::None
    }

    fn solution_codes(&self) -> Vec<Code> {
        let mut codes = self.initial_code();
        if let Some(first) = codes.first_mut() {
            *first = self.solution();
        }
        codes
    }

    fn next_scenario(&self) -> Option<String> {
        None
    }
}

pub fn load_safe(name: &str) -> Option<Box<dyn Scenario>> {
    let scenario: Option<Box<dyn Scenario>> = match name {
        "ducks" => Some(Box::new(Ducks::default())),
        _ => name
            .strip_prefix("tutor")
            .and_then(|level| level.parse::<usize>().ok())
            .and_then(Tutor::new)
            .map(|tutor| Box::new(tutor) as Box<dyn Scenario>),
    };
    if let Some(scenario) = scenario.as_ref() {
        assert_eq!(scenario.name(), name);
    }
    scenario
}

pub fn load(name: &str) -> Box<dyn Scenario> {
    match load_safe(name) {
        Some(scenario) => scenario,
        None => panic!("Unknown scenario"),
    }
}

pub fn list() -> Vec<String> {
    (1..=tutor::LEVELS)
        .map(|level| format!("tutor{level}"))
        .chain(std::iter::once("ducks".to_string()))
        .collect()
}

/// Builds a battle for `scenario`. Entries of `codes` replace the scenario's
/// initial code avatar by avatar.
pub fn new_battle(
    scenario: &mut dyn Scenario,
    config: BattleConfig,
    seed: u64,
    codes: &[Code],
) -> Battle {
    new_battle_with_clock(scenario, config, seed, codes, Box::new(TickClock::new()))
}

/// Like [`new_battle`], but reload gating and the time limit follow `clock`.
pub fn new_battle_with_clock(
    scenario: &mut dyn Scenario,
    config: BattleConfig,
    seed: u64,
    codes: &[Code],
    clock: Box<dyn Clock>,
) -> Battle {
    let mut battle = Battle::with_clock(config, seed, clock);
    scenario.init(&mut battle, seed);
    let handles: Vec<AvatarHandle> = battle.avatar_handles().collect();
    for (handle, code) in handles.into_iter().zip(codes.iter()) {
        battle.set_code(handle, code.clone());
    }
    battle
}

/// Victory for `player` if it is the only survivor once the battle stops.
pub fn check_tutor_victory(battle: &Battle, player: AvatarHandle) -> Status {
    if battle.state() != BattleState::Stopped {
        return Status::Running;
    }
    if battle.survivors() == Some(1) && battle.rank().first() == Some(&player) {
        Status::Victory { avatar: player }
    } else {
        Status::Failed
    }
}

/// Victory for the last avatar standing, otherwise a draw.
pub fn check_last_standing(battle: &Battle) -> Status {
    if battle.state() != BattleState::Stopped {
        return Status::Running;
    }
    match (battle.survivors(), battle.rank().first()) {
        (Some(1), Some(&avatar)) => Status::Victory { avatar },
        _ => Status::Draw,
    }
}
