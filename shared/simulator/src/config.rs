use serde::{Deserialize, Serialize};

/// Ticks per second of simulated time.
pub const GAME_FPS: f64 = 50.0;
/// Interpreter steps each living avatar gets per tick.
pub const STATEMENTS_PER_FRAME: usize = 100;
/// Seconds between two shots of the same cannon.
pub const RELOAD_TIME: f64 = 0.5;
pub const AVATAR_SPEED: f64 = 1.0;
/// Distance a missile covers per tick.
pub const MISSILE_SPEED: f64 = 3.0;
/// Change in speed per tick.
pub const ACCELERATION: f64 = 5.0;
/// Centre to centre distance at which two avatars collide.
pub const COLLISION_RADIUS: f64 = 5.0;
/// Damage from a collision at full speed.
pub const COLLISION_DAMAGE: f64 = 3.0;
/// Milliseconds.
pub const TIME_LIMIT: f64 = 5.0 * 60.0 * 1000.0;
pub const MAX_RANGE: f64 = 70.0;
pub const BLAST_RADIUS: f64 = 4.0;
/// Damage dealt at the centre of a blast.
pub const BLAST_DAMAGE: f64 = 10.0;
/// Milliseconds the battle keeps running once a winner is clear.
pub const END_GRACE: f64 = 1000.0;
pub const ARENA_SIZE: f64 = 100.0;
pub const MAX_SPEED: f64 = 100.0;
pub const MAX_DAMAGE: f64 = 100.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BattleConfig {
    pub game_fps: f64,
    pub statements_per_frame: usize,
    pub reload_time: f64,
    pub avatar_speed: f64,
    pub missile_speed: f64,
    pub acceleration: f64,
    pub collision_radius: f64,
    pub collision_damage: f64,
    pub time_limit: f64,
    pub max_range: f64,
    pub blast_radius: f64,
    pub blast_damage: f64,
    pub end_grace: f64,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            game_fps: GAME_FPS,
            statements_per_frame: STATEMENTS_PER_FRAME,
            reload_time: RELOAD_TIME,
            avatar_speed: AVATAR_SPEED,
            missile_speed: MISSILE_SPEED,
            acceleration: ACCELERATION,
            collision_radius: COLLISION_RADIUS,
            collision_damage: COLLISION_DAMAGE,
            time_limit: TIME_LIMIT,
            max_range: MAX_RANGE,
            blast_radius: BLAST_RADIUS,
            blast_damage: BLAST_DAMAGE,
            end_grace: END_GRACE,
        }
    }
}

impl BattleConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: Self = serde_json::from_str(json)?;
        config
            .validate()
            .map_err(<serde_json::Error as serde::de::Error>::custom)?;
        Ok(config)
    }

    /// Rejects settings the simulation cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        let positive = [
            ("game_fps", self.game_fps),
            ("missile_speed", self.missile_speed),
            ("blast_radius", self.blast_radius),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(format!("{name} must be positive, got {value}"));
            }
        }
        let non_negative = [
            ("reload_time", self.reload_time),
            ("avatar_speed", self.avatar_speed),
            ("acceleration", self.acceleration),
            ("collision_radius", self.collision_radius),
            ("collision_damage", self.collision_damage),
            ("time_limit", self.time_limit),
            ("max_range", self.max_range),
            ("blast_damage", self.blast_damage),
            ("end_grace", self.end_grace),
        ];
        for (name, value) in non_negative {
            if value.is_nan() || value < 0.0 {
                return Err(format!("{name} must not be negative, got {value}"));
            }
        }
        Ok(())
    }

    /// Length of one tick in milliseconds.
    pub fn tick_length(&self) -> f64 {
        1000.0 / self.game_fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_override() {
        let config = BattleConfig::from_json(r#"{"game_fps": 1000, "reload_time": 1.5}"#).unwrap();
        assert_eq!(config.game_fps, 1000.0);
        assert_eq!(config.reload_time, 1.5);
        assert_eq!(config.missile_speed, MISSILE_SPEED);
        assert_eq!(config.tick_length(), 1.0);
    }

    #[test]
    fn test_rejects_unknown_fields() {
        assert!(BattleConfig::from_json(r#"{"gravity": 9.8}"#).is_err());
        assert_eq!(BattleConfig::from_json("{}").unwrap(), BattleConfig::default());
    }

    #[test]
    fn test_rejects_unusable_values() {
        for json in [
            r#"{"game_fps": 0}"#,
            r#"{"game_fps": -50}"#,
            r#"{"missile_speed": 0}"#,
            r#"{"blast_radius": -1}"#,
            r#"{"time_limit": -1000}"#,
        ] {
            assert!(BattleConfig::from_json(json).is_err(), "{json} accepted");
        }
        let error = BattleConfig::from_json(r#"{"game_fps": 0}"#).unwrap_err();
        assert!(error.to_string().contains("game_fps"));
        assert!(BattleConfig::default().validate().is_ok());
    }
}
