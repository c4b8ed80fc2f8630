pub mod avatar;
pub mod battle;
pub mod clock;
pub mod collision;
pub mod config;
pub mod missile;
pub mod rng;
pub mod runner;
pub mod scenario;
pub mod snapshot;
pub mod vm;

pub use battle::{Battle, BattleState, Code, Event};
pub use config::BattleConfig;
