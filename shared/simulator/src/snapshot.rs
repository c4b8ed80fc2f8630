use crate::avatar::AvatarHandle;
use crate::battle::{BattleState, Event, ScriptError};
use serde::{Deserialize, Serialize};
use smartstring::alias::String as SmartString;

/// Everything a viewer needs to draw one frame.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Snapshot {
    pub updates: u64,
    pub ticks: u64,
    /// Clock time in milliseconds.
    pub time: f64,
    pub state: BattleState,
    pub avatars: Vec<AvatarSnapshot>,
    pub missiles: Vec<MissileSnapshot>,
    pub events: Vec<Event>,
    pub rank: Vec<AvatarHandle>,
    pub errors: Vec<ScriptError>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AvatarSnapshot {
    pub id: u64,
    pub name: SmartString,
    pub x: f64,
    pub y: f64,
    pub degree: f64,
    pub facing: f64,
    pub speed: f64,
    pub damage: f64,
    pub dead: bool,
    pub player: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MissileSnapshot {
    pub avatar: AvatarHandle,
    pub x: f64,
    pub y: f64,
    pub end_x: f64,
    pub end_y: f64,
}

impl Snapshot {
    pub fn avatar(&self, handle: AvatarHandle) -> Option<&AvatarSnapshot> {
        self.avatars.get(handle.0)
    }
}
