use crate::battle::Code;
use lazy_static::lazy_static;
use std::collections::BTreeMap;

lazy_static! {
    static ref BUILTIN_SCRIPTS: BTreeMap<&'static str, &'static str> = {
        let mut m = BTreeMap::new();
        m.insert("rook", include_str!("../../ducks/rook.js"));
        m.insert("counter", include_str!("../../ducks/counter.js"));
        m.insert("sniper", include_str!("../../ducks/sniper.js"));
        m.insert("target", include_str!("../../ducks/target.js"));
        m.insert("pendulum", include_str!("../../ducks/pendulum.js"));
        m.insert("scared", include_str!("../../ducks/scared.js"));
        m
    };
}

pub fn load_source(name: &str) -> Result<Code, String> {
    match BUILTIN_SCRIPTS.get(name) {
        Some(source) => Ok(Code::Js(source.to_string())),
        None => Err(format!("Unknown builtin script {name:?}")),
    }
}

pub fn names() -> impl Iterator<Item = &'static str> {
    BUILTIN_SCRIPTS.keys().copied()
}
