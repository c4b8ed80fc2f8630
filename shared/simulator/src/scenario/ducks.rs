use super::{check_last_standing, Scenario, Status};
use crate::avatar::center;
use crate::battle::{Battle, Code};
use crate::rng::new_rng;
use nalgebra::{point, Point2};
use rand::seq::SliceRandom;
use smartstring::alias::String as SmartString;

/// Free-for-all between up to four ducks in the corners. Any further ducks
/// start in the middle.
pub struct Ducks {
    ducks: Vec<(SmartString, Code)>,
}

impl Ducks {
    pub fn new(ducks: Vec<(SmartString, Code)>) -> Self {
        Self { ducks }
    }

    /// Ducks named after the built-in scripts they run.
    pub fn builtin(names: &[&str]) -> Self {
        Self::new(
            names
                .iter()
                .map(|name| ((*name).into(), Code::Builtin(name.to_string())))
                .collect(),
        )
    }
}

impl Default for Ducks {
    fn default() -> Self {
        let mut ducks = Ducks::builtin(&["rook", "counter", "sniper"]);
        ducks.ducks.insert(0, ("Player".into(), Code::None));
        ducks
    }
}

impl Scenario for Ducks {
    fn name(&self) -> String {
        "ducks".into()
    }

    fn human_name(&self) -> String {
        "Duck Pond".into()
    }

    fn init(&mut self, battle: &mut Battle, seed: u64) {
        let mut corners: Vec<Point2<f64>> = vec![
            point![20.0, 80.0],
            point![80.0, 80.0],
            point![20.0, 20.0],
            point![80.0, 20.0],
        ];
        corners.shuffle(&mut new_rng(seed));
        for (index, (name, code)) in self.ducks.iter().enumerate() {
            let start = corners.get(index).copied().unwrap_or_else(center);
            battle.add_avatar(name, start, 0.0, code.clone());
        }
    }

    fn status(&self, battle: &Battle) -> Status {
        check_last_standing(battle)
    }

    fn initial_code(&self) -> Vec<Code> {
        self.ducks.iter().map(|(_, code)| code.clone()).collect()
    }
}
