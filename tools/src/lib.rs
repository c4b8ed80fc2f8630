use anyhow::{anyhow, Context};
use pond_simulator::battle::Code;
use pond_simulator::vm::builtin;
use std::path::Path;

pub struct Duck {
    pub name: String,
    pub code: Code,
}

/// Resolves a command line argument to a duck: either the name of a
/// built-in script or the path of a `.js` file.
pub fn load_duck(arg: &str) -> anyhow::Result<Duck> {
    let path = Path::new(arg);
    if arg.ends_with(".js") || path.exists() {
        let source =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {arg:?}"))?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| arg.to_string());
        return Ok(Duck {
            name,
            code: Code::Js(source),
        });
    }
    if builtin::names().any(|name| name == arg) {
        return Ok(Duck {
            name: arg.to_string(),
            code: Code::Builtin(arg.to_string()),
        });
    }
    Err(anyhow!(
        "{arg:?} is neither a file nor one of the built-in ducks ({})",
        builtin::names().collect::<Vec<_>>().join(", ")
    ))
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<pond_simulator::BattleConfig> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            pond_simulator::BattleConfig::from_json(&json)
                .with_context(|| format!("Invalid config in {}", path.display()))
        }
        None => Ok(Default::default()),
    }
}
