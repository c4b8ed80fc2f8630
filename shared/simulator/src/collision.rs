use crate::avatar::AvatarHandle;
use crate::battle::Battle;
use crate::config::ARENA_SIZE;
use nalgebra::{point, Point2};

/// Closest living avatar other than `handle` and its distance. A linear scan
/// is plenty for a handful of avatars.
pub fn closest_neighbour(battle: &Battle, handle: AvatarHandle) -> (Option<AvatarHandle>, f64) {
    let loc = battle.avatar(handle).loc();
    let mut closest = None;
    let mut distance = f64::INFINITY;
    for other in battle.avatar_handles() {
        if other == handle {
            continue;
        }
        let avatar = battle.avatar(other);
        if avatar.is_dead() {
            continue;
        }
        let d = nalgebra::distance(&loc, &avatar.loc());
        if d < distance {
            closest = Some(other);
            distance = d;
        }
    }
    (closest, distance)
}

pub fn out_of_bounds(p: &Point2<f64>) -> bool {
    p.x < 0.0 || p.x > ARENA_SIZE || p.y < 0.0 || p.y > ARENA_SIZE
}

pub fn clamp_to_arena(p: &Point2<f64>) -> Point2<f64> {
    point![p.x.clamp(0.0, ARENA_SIZE), p.y.clamp(0.0, ARENA_SIZE)]
}
