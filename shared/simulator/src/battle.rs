use crate::avatar::{AvatarAccessor, AvatarAccessorMut, AvatarData, AvatarHandle};
use crate::clock::{Clock, TickClock};
use crate::config::BattleConfig;
use crate::missile::{self, Missile};
use crate::rng;
use crate::snapshot::*;
use crate::vm::{self, AvatarController};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[derive(Clone, Serialize, Deserialize, Debug, Eq, Hash, PartialEq)]
pub enum Code {
    None,
    Js(String),
    Builtin(String),
}

/// Something worth drawing that happened during the last tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    Scan {
        avatar: AvatarHandle,
        degree: f64,
        resolution: f64,
    },
    Bang {
        avatar: AvatarHandle,
        degree: f64,
    },
    Boom {
        damage: f64,
        x: f64,
        y: f64,
    },
    Crash {
        avatar: AvatarHandle,
        damage: f64,
    },
    Die {
        avatar: AvatarHandle,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleState {
    Idle,
    Running,
    Stopped,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScriptError {
    pub avatar: AvatarHandle,
    pub error: vm::Error,
}

pub struct Battle {
    config: BattleConfig,
    clock: Box<dyn Clock>,
    seed: u64,
    pub(crate) avatars: Vec<AvatarData>,
    controllers: Vec<Option<AvatarController>>,
    pub(crate) missiles: Vec<Missile>,
    pub(crate) events: Vec<Event>,
    pub(crate) rank: Vec<AvatarHandle>,
    errors: Vec<ScriptError>,
    state: BattleState,
    /// Rounds of interpreter steps, STATEMENTS_PER_FRAME per update.
    ticks: u64,
    updates: u64,
    end_time: f64,
    survivors: Option<usize>,
    done_callback: Option<Box<dyn FnOnce(usize)>>,
}

impl Battle {
    /// A battle on simulated time.
    pub fn new(config: BattleConfig, seed: u64) -> Battle {
        Battle::with_clock(config, seed, Box::new(TickClock::new()))
    }

    pub fn with_clock(config: BattleConfig, seed: u64, clock: Box<dyn Clock>) -> Battle {
        log::debug!("seed {seed}");
        Battle {
            config,
            clock,
            seed,
            avatars: vec![],
            controllers: vec![],
            missiles: vec![],
            events: vec![],
            rank: vec![],
            errors: vec![],
            state: BattleState::Idle,
            ticks: 0,
            updates: 0,
            end_time: 0.0,
            survivors: None,
            done_callback: None,
        }
    }

    pub fn config(&self) -> &BattleConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn state(&self) -> BattleState {
        self.state
    }

    /// Clock time in milliseconds.
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Number of avatars alive when the battle stopped.
    pub fn survivors(&self) -> Option<usize> {
        self.survivors
    }

    pub fn add_avatar(
        &mut self,
        name: &str,
        start: Point2<f64>,
        damage: f64,
        code: Code,
    ) -> AvatarHandle {
        let handle = AvatarHandle(self.avatars.len());
        self.avatars.push(AvatarData::new(name, start, damage, code));
        handle
    }

    /// Replaces an avatar's script. Takes effect at the next `start`.
    pub fn set_code(&mut self, handle: AvatarHandle, code: Code) {
        self.avatars[handle.0].code = code;
    }

    pub fn avatar(&self, handle: AvatarHandle) -> AvatarAccessor {
        AvatarAccessor {
            battle: self,
            handle,
        }
    }

    pub fn avatar_mut(&mut self, handle: AvatarHandle) -> AvatarAccessorMut {
        AvatarAccessorMut {
            battle: self,
            handle,
        }
    }

    pub fn avatar_handles(&self) -> impl Iterator<Item = AvatarHandle> {
        (0..self.avatars.len()).map(AvatarHandle)
    }

    pub fn find_avatar(&self, name: &str) -> Option<AvatarHandle> {
        self.avatars
            .iter()
            .position(|a| a.name.as_str() == name)
            .map(AvatarHandle)
    }

    pub fn missiles(&self) -> &[Missile] {
        &self.missiles
    }

    /// Events from the most recent update, or from `start` before the first
    /// update.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Best first. Until the battle stops this only holds the dead, most
    /// recent death first.
    pub fn rank(&self) -> &[AvatarHandle] {
        &self.rank
    }

    pub fn errors(&self) -> &[ScriptError] {
        &self.errors
    }

    /// Global value from an avatar's script.
    pub fn script_global(&self, handle: AvatarHandle, name: &str) -> Option<vm::Value> {
        self.controllers
            .get(handle.0)
            .and_then(|c| c.as_ref())
            .and_then(|c| c.global(name))
    }

    /// Stops the battle and puts every avatar back where it started.
    pub fn reset(&mut self) {
        self.events.clear();
        self.missiles.clear();
        self.rank.clear();
        self.errors.clear();
        self.controllers.clear();
        self.ticks = 0;
        self.updates = 0;
        self.survivors = None;
        self.done_callback = None;
        self.state = BattleState::Idle;
        for avatar in self.avatars.iter_mut() {
            avatar.reset();
        }
    }

    /// Loads every avatar's script and starts the clock. `done_callback`
    /// receives the number of survivors once the battle stops.
    pub fn start(&mut self, done_callback: impl FnOnce(usize) + 'static) {
        if self.state != BattleState::Idle {
            self.reset();
        }
        self.done_callback = Some(Box::new(done_callback));
        self.end_time = self.clock.now() + self.config.time_limit;
        log::info!("Starting battle with {} avatars", self.avatars.len());

        self.controllers = Vec::with_capacity(self.avatars.len());
        for index in 0..self.avatars.len() {
            let handle = AvatarHandle(index);
            let seed = rng::avatar_seed(self.seed, index);
            match vm::new_avatar_controller(&self.avatars[index].code, seed) {
                Ok(controller) => self.controllers.push(controller),
                Err(error) => {
                    log::warn!("{} fails to load: {}", self.avatars[index].name, error);
                    self.controllers.push(None);
                    self.errors.push(ScriptError {
                        avatar: handle,
                        error,
                    });
                    self.avatar_mut(handle).die();
                }
            }
        }
        self.state = BattleState::Running;
    }

    /// Advances the battle by one tick.
    pub fn update(&mut self) {
        if self.state != BattleState::Running {
            return;
        }
        self.events.clear();
        self.clock.advance(self.config.tick_length());

        self.update_interpreters();
        missile::tick(self);
        for handle in self.avatar_handles() {
            self.avatar_mut(handle).tick();
        }
        self.updates += 1;

        let now = self.clock.now();
        if self.avatars.len() <= self.rank.len() + 1 {
            // At most one avatar left. Give the last missiles a moment to land.
            self.end_time = self.end_time.min(now + self.config.end_grace);
        }
        if now > self.end_time {
            self.stop();
        }
    }

    fn update_interpreters(&mut self) {
        let mut controllers = std::mem::take(&mut self.controllers);
        for _ in 0..self.config.statements_per_frame {
            self.ticks += 1;
            for (index, controller) in controllers.iter_mut().enumerate() {
                if self.avatars[index].dead {
                    continue;
                }
                let controller = match controller {
                    Some(controller) => controller,
                    None => continue,
                };
                let handle = AvatarHandle(index);
                if let Err(error) = controller.step(&mut self.avatar_mut(handle)) {
                    log::warn!("{} throws an error: {}", self.avatars[index].name, error);
                    self.errors.push(ScriptError {
                        avatar: handle,
                        error,
                    });
                    self.avatar_mut(handle).die();
                }
            }
        }
        self.controllers = controllers;
    }

    /// Ends the battle. Survivors are ranked ahead of the dead, least damaged
    /// first.
    pub fn stop(&mut self) {
        if self.state != BattleState::Running {
            return;
        }
        let mut survivors: Vec<AvatarHandle> = self
            .avatar_handles()
            .filter(|handle| !self.avatars[handle.0].dead)
            .collect();
        let count = survivors.len();
        survivors.sort_by(|a, b| {
            self.avatars[a.0]
                .damage
                .total_cmp(&self.avatars[b.0].damage)
        });
        survivors.extend(self.rank.drain(..));
        self.rank = survivors;
        self.state = BattleState::Stopped;
        self.survivors = Some(count);
        log::info!(
            "Battle over after {} updates with {} survivors",
            self.updates,
            count
        );
        if let Some(callback) = self.done_callback.take() {
            callback(count);
        }
    }

    pub fn hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::Hasher;
        let fixedpoint = |v: f64| (v * 1e9) as i64;
        let mut s = DefaultHasher::new();
        for avatar in self.avatars.iter() {
            s.write_i64(fixedpoint(avatar.loc.x));
            s.write_i64(fixedpoint(avatar.loc.y));
            s.write_i64(fixedpoint(avatar.degree));
            s.write_i64(fixedpoint(avatar.speed));
            s.write_i64(fixedpoint(avatar.damage));
            s.write_u8(avatar.dead as u8);
        }
        for missile in self.missiles.iter() {
            s.write_i64(fixedpoint(missile.end_loc.x));
            s.write_i64(fixedpoint(missile.end_loc.y));
            s.write_i64(fixedpoint(missile.progress));
        }
        s.finish()
    }

    pub fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot {
            updates: self.updates,
            ticks: self.ticks,
            time: self.now(),
            state: self.state,
            avatars: vec![],
            missiles: vec![],
            events: self.events.clone(),
            rank: self.rank.clone(),
            errors: self.errors.clone(),
        };

        for (index, avatar) in self.avatars.iter().enumerate() {
            snapshot.avatars.push(AvatarSnapshot {
                id: index as u64,
                name: avatar.name.clone(),
                x: avatar.loc.x,
                y: avatar.loc.y,
                degree: avatar.degree,
                facing: avatar.facing,
                speed: avatar.speed,
                damage: avatar.damage,
                dead: avatar.dead,
                player: avatar.player,
            });
        }

        for missile in self.missiles.iter() {
            let position = missile.position();
            snapshot.missiles.push(MissileSnapshot {
                avatar: missile.avatar,
                x: position.x,
                y: position.y,
                end_x: missile.end_loc.x,
                end_y: missile.end_loc.y,
            });
        }

        snapshot
    }
}
