use crate::avatar::{polar_offset, AvatarHandle};
use crate::battle::{Battle, Event};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Missile {
    pub avatar: AvatarHandle,
    pub start_loc: Point2<f64>,
    pub degree: f64,
    pub range: f64,
    pub end_loc: Point2<f64>,
    /// Distance travelled so far.
    pub progress: f64,
}

impl Missile {
    pub fn new(avatar: AvatarHandle, start_loc: Point2<f64>, degree: f64, range: f64) -> Self {
        Self {
            avatar,
            start_loc,
            degree,
            range,
            end_loc: polar_offset(&start_loc, degree, range),
            progress: 0.0,
        }
    }

    /// Where the missile is now, for drawing.
    pub fn position(&self) -> Point2<f64> {
        if self.range <= 0.0 {
            return self.end_loc;
        }
        let t = (self.progress / self.range).min(1.0);
        self.start_loc + (self.end_loc - self.start_loc) * t
    }
}

/// Advances every missile in flight and detonates the ones that have arrived.
pub fn tick(battle: &mut Battle) {
    let speed = battle.config().missile_speed;
    for index in (0..battle.missiles.len()).rev() {
        let missile = &mut battle.missiles[index];
        missile.progress += speed;
        if missile.range - missile.progress < speed / 2.0 {
            let missile = battle.missiles.remove(index);
            explode(battle, &missile);
        }
    }
}

fn explode(battle: &mut Battle, missile: &Missile) {
    let radius = battle.config().blast_radius;
    let blast_damage = battle.config().blast_damage;
    let mut max_damage: f64 = 0.0;
    for handle in battle.avatar_handles() {
        let avatar = battle.avatar(handle);
        if avatar.is_dead() {
            continue;
        }
        let range = nalgebra::distance(&avatar.loc(), &missile.end_loc);
        let damage = (1.0 - range / radius) * blast_damage;
        if damage > 0.0 {
            battle.avatar_mut(handle).add_damage(damage);
            max_damage = max_damage.max(damage);
        }
    }
    log::debug!(
        "Missile from {:?} exploded at {:?} for {}",
        missile.avatar,
        missile.end_loc,
        max_damage
    );
    battle.events.push(Event::Boom {
        damage: max_damage,
        x: missile.end_loc.x,
        y: missile.end_loc.y,
    });
}
