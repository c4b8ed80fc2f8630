use crate::battle::{Battle, Code, Event};
use crate::collision;
use crate::config::{ARENA_SIZE, MAX_DAMAGE, MAX_SPEED};
use crate::missile::Missile;
use crate::vm::{value::format_number, Host};
use nalgebra::{point, vector, Point2};
use serde::{Deserialize, Serialize};
use smartstring::alias::String as SmartString;

/// Centre of the arena. Avatars start out facing it.
pub fn center() -> Point2<f64> {
    point![ARENA_SIZE / 2.0, ARENA_SIZE / 2.0]
}

/// Index of the avatar in the battle. Stable for the battle's lifetime.
#[derive(Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Debug, Serialize, Deserialize)]
pub struct AvatarHandle(pub usize);

impl From<AvatarHandle> for u64 {
    fn from(handle: AvatarHandle) -> u64 {
        handle.0 as u64
    }
}

#[derive(Clone, Debug)]
pub struct AvatarData {
    pub name: SmartString,
    pub code: Code,
    /// Controlled by the person playing, as opposed to a built-in opponent.
    pub player: bool,
    pub start_loc: Point2<f64>,
    pub start_damage: f64,
    pub loc: Point2<f64>,
    /// Direction of travel.
    pub degree: f64,
    /// Direction the head points. Follows the last shot.
    pub facing: f64,
    pub speed: f64,
    pub desired_speed: f64,
    pub damage: f64,
    pub dead: bool,
    /// Clock time of the last shot.
    pub last_missile: Option<f64>,
}

impl AvatarData {
    pub fn new(name: &str, start_loc: Point2<f64>, start_damage: f64, code: Code) -> Self {
        let mut data = Self {
            name: name.into(),
            code,
            player: false,
            start_loc,
            start_damage,
            loc: start_loc,
            degree: 0.0,
            facing: 0.0,
            speed: 0.0,
            desired_speed: 0.0,
            damage: start_damage,
            dead: false,
            last_missile: None,
        };
        data.reset();
        data
    }

    /// Restores the state the avatar had when it was created.
    pub fn reset(&mut self) {
        self.loc = self.start_loc;
        self.damage = self.start_damage;
        self.degree = bearing(&self.start_loc, &center());
        self.facing = self.degree;
        self.dead = false;
        self.speed = 0.0;
        self.desired_speed = 0.0;
        self.last_missile = None;
    }
}

/// Maps any angle in degrees into [0, 360).
pub fn normalize_angle(angle: f64) -> f64 {
    let angle = angle % 360.0;
    if angle < 0.0 {
        angle + 360.0
    } else {
        angle
    }
}

/// Heading in degrees from `from` towards `to`.
pub fn bearing(from: &Point2<f64>, to: &Point2<f64>) -> f64 {
    let d = to - from;
    normalize_angle(d.y.atan2(d.x).to_degrees())
}

/// Point `distance` away from `from` along `degree`.
pub fn polar_offset(from: &Point2<f64>, degree: f64, distance: f64) -> Point2<f64> {
    let radians = degree.to_radians();
    from + vector![radians.cos(), radians.sin()] * distance
}

pub struct AvatarAccessor<'a> {
    pub(crate) battle: &'a Battle,
    pub(crate) handle: AvatarHandle,
}

impl<'a> AvatarAccessor<'a> {
    pub fn handle(&self) -> AvatarHandle {
        self.handle
    }

    pub fn data(&self) -> &'a AvatarData {
        &self.battle.avatars[self.handle.0]
    }

    pub fn name(&self) -> &'a str {
        &self.data().name
    }

    pub fn loc(&self) -> Point2<f64> {
        self.data().loc
    }

    pub fn damage(&self) -> f64 {
        self.data().damage
    }

    pub fn health(&self) -> f64 {
        MAX_DAMAGE - self.data().damage
    }

    pub fn speed(&self) -> f64 {
        self.data().speed
    }

    pub fn is_dead(&self) -> bool {
        self.data().dead
    }
}

pub struct AvatarAccessorMut<'a> {
    pub(crate) battle: &'a mut Battle,
    pub(crate) handle: AvatarHandle,
}

impl<'a> AvatarAccessorMut<'a> {
    pub fn readonly(&self) -> AvatarAccessor {
        AvatarAccessor {
            battle: self.battle,
            handle: self.handle,
        }
    }

    pub fn data(&self) -> &AvatarData {
        &self.battle.avatars[self.handle.0]
    }

    pub fn data_mut(&mut self) -> &mut AvatarData {
        &mut self.battle.avatars[self.handle.0]
    }

    /// Distance to the closest living enemy within `resolution / 2` degrees
    /// of `degree`, or infinity.
    pub fn scan(&mut self, degree: f64, resolution: f64) -> f64 {
        let resolution = resolution.clamp(0.0, 20.0);
        let degree = normalize_angle(degree);
        self.battle.events.push(Event::Scan {
            avatar: self.handle,
            degree,
            resolution,
        });

        let scan1 = normalize_angle(degree - resolution / 2.0);
        let mut scan2 = normalize_angle(degree + resolution / 2.0);
        if scan1 > scan2 {
            scan2 += 360.0;
        }
        let loc = self.data().loc;
        let mut closest = f64::INFINITY;
        for (index, enemy) in self.battle.avatars.iter().enumerate() {
            if index == self.handle.0 || enemy.dead {
                continue;
            }
            let range = nalgebra::distance(&loc, &enemy.loc);
            let mut angle = bearing(&loc, &enemy.loc);
            if angle < scan1 {
                angle += 360.0;
            }
            if scan1 <= angle && angle <= scan2 {
                closest = closest.min(range);
            }
        }
        closest
    }

    /// Sets the heading and target speed. A heading change is refused above
    /// half speed, in which case the avatar brakes instead.
    pub fn drive(&mut self, degree: f64, speed: f64) {
        let degree = normalize_angle(degree);
        let mut speed = speed;
        let data = self.data_mut();
        if data.degree != degree {
            if data.speed <= MAX_SPEED / 2.0 {
                data.degree = degree;
                data.facing = degree;
            } else {
                speed = 0.0;
            }
        }
        if data.speed == 0.0 && speed > 0.0 {
            // Let observers see that the avatar is moving this tick.
            data.speed = 0.1;
        }
        data.desired_speed = speed.clamp(0.0, MAX_SPEED);
    }

    pub fn stop(&mut self) {
        self.data_mut().desired_speed = 0.0;
    }

    /// Fires a missile that explodes `range` away along `degree`. Returns
    /// false while the cannon is reloading.
    pub fn cannon(&mut self, degree: f64, range: f64) -> bool {
        let now = self.battle.now();
        let reload = self.battle.config().reload_time * 1000.0;
        let max_range = self.battle.config().max_range;
        if let Some(last) = self.data().last_missile {
            if last + reload > now {
                return false;
            }
        }
        let handle = self.handle;
        let degree = normalize_angle(degree);
        let range = range.clamp(0.0, max_range);
        let data = self.data_mut();
        data.last_missile = Some(now);
        data.facing = degree;
        let missile = Missile::new(handle, data.loc, degree, range);
        self.battle.missiles.push(missile);
        self.battle.events.push(Event::Bang {
            avatar: handle,
            degree,
        });
        true
    }

    pub fn add_damage(&mut self, amount: f64) {
        if self.data().dead {
            return;
        }
        let data = self.data_mut();
        data.damage += amount;
        if data.damage >= MAX_DAMAGE {
            self.die();
        }
    }

    pub fn die(&mut self) {
        if self.data().dead {
            return;
        }
        let data = self.data_mut();
        data.speed = 0.0;
        data.dead = true;
        data.damage = MAX_DAMAGE;
        log::info!("{} dies", data.name);
        self.battle.rank.insert(0, self.handle);
        self.battle.events.push(Event::Die {
            avatar: self.handle,
        });
    }

    pub fn reset(&mut self) {
        self.data_mut().reset();
    }

    /// Accelerates and moves the avatar by one tick, resolving collisions with
    /// the walls and other avatars.
    pub fn tick(&mut self) {
        if self.data().dead {
            return;
        }
        let config = self.battle.config().clone();
        let data = self.data_mut();
        if data.speed < data.desired_speed {
            data.speed = (data.speed + config.acceleration).min(data.desired_speed);
        } else if data.speed > data.desired_speed {
            data.speed = (data.speed - config.acceleration).max(data.desired_speed);
        }
        if data.speed <= 0.0 {
            return;
        }

        let (_, closest_before) = collision::closest_neighbour(self.battle, self.handle);
        let data = self.data_mut();
        let step = data.speed / MAX_SPEED * config.avatar_speed;
        let delta = polar_offset(&point![0.0, 0.0], data.degree, step).coords;
        data.loc += delta;

        if collision::out_of_bounds(&data.loc) {
            data.loc = collision::clamp_to_arena(&data.loc);
            let damage = data.speed / MAX_SPEED * config.collision_damage;
            self.add_damage(damage);
            let data = self.data_mut();
            data.speed = 0.0;
            data.desired_speed = 0.0;
            self.battle.events.push(Event::Crash {
                avatar: self.handle,
                damage,
            });
            return;
        }

        let (neighbour, closest_after) = collision::closest_neighbour(self.battle, self.handle);
        let neighbour = match neighbour {
            Some(neighbour) => neighbour,
            None => return,
        };
        if closest_after < config.collision_radius && closest_before > closest_after {
            self.data_mut().loc -= delta;
            let fastest = self
                .data()
                .speed
                .max(self.battle.avatar(neighbour).speed());
            let damage = fastest / MAX_SPEED * config.collision_damage;
            for handle in [self.handle, neighbour] {
                let mut avatar = self.battle.avatar_mut(handle);
                avatar.add_damage(damage);
                let data = avatar.data_mut();
                data.speed = 0.0;
                data.desired_speed = 0.0;
            }
            self.battle.events.push(Event::Crash {
                avatar: self.handle,
                damage,
            });
            self.battle.events.push(Event::Crash {
                avatar: neighbour,
                damage,
            });
        }
    }
}

impl<'a> Host for AvatarAccessorMut<'a> {
    fn log(&mut self, value: f64) {
        log::info!("{} logs: {}", self.data().name, format_number(value));
    }

    fn scan(&mut self, degree: f64, resolution: f64) -> f64 {
        AvatarAccessorMut::scan(self, degree, resolution)
    }

    fn cannon(&mut self, degree: f64, range: f64) -> bool {
        AvatarAccessorMut::cannon(self, degree, range)
    }

    fn drive(&mut self, degree: f64, speed: f64) {
        AvatarAccessorMut::drive(self, degree, speed)
    }

    fn stop(&mut self) {
        AvatarAccessorMut::stop(self)
    }

    fn damage(&self) -> f64 {
        self.data().damage
    }

    fn speed(&self) -> f64 {
        self.data().speed
    }

    fn loc_x(&self) -> f64 {
        self.data().loc.x
    }

    fn loc_y(&self) -> f64 {
        self.data().loc.y
    }
}
