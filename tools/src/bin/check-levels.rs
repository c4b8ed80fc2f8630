use clap::Parser;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use pond_simulator::avatar::AvatarHandle;
use pond_simulator::scenario::{self, Status};
use pond_tools::load_config;
use rayon::prelude::*;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap()]
struct Arguments {
    /// Level to check, e.g. tutor3. Defaults to every level.
    scenario: Option<String>,

    #[clap(short, long, default_value = "100")]
    rounds: u64,

    /// Base seed
    #[clap(short, long, default_value = "0")]
    seed: u64,

    /// JSON file overriding battle settings
    #[clap(short, long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("check_levels=info"),
    )
    .init();

    let args = Arguments::parse();
    let config = load_config(args.config.as_deref())?;

    let scenarios = if let Some(scenario_name) = args.scenario {
        if scenario::load_safe(&scenario_name).is_none() {
            anyhow::bail!("Unknown scenario {scenario_name:?}");
        }
        vec![scenario_name]
    } else {
        scenario::list()
            .into_iter()
            .filter(|name| name.starts_with("tutor"))
            .collect()
    };

    let progress = indicatif::ProgressBar::new(args.rounds * scenarios.len() as u64);

    let failures: Vec<(String, Vec<u64>)> = scenarios
        .par_iter()
        .map(|scenario_name| {
            let failed_seeds: Vec<u64> = (args.seed..(args.seed + args.rounds))
                .into_par_iter()
                .filter_map(|seed| {
                    let mut scenario = scenario::load(scenario_name);
                    let codes = scenario.solution_codes();
                    let mut battle =
                        scenario::new_battle(scenario.as_mut(), config.clone(), seed, &codes);
                    pond_simulator::runner::run_headless(&mut battle);
                    progress.inc(1);
                    match scenario.status(&battle) {
                        Status::Victory {
                            avatar: AvatarHandle(0),
                        } => None,
                        status => {
                            log::debug!("{scenario_name} seed {seed}: {status:?}");
                            Some(seed)
                        }
                    }
                })
                .collect();
            (scenario_name.clone(), failed_seeds)
        })
        .collect();
    progress.finish_and_clear();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Scenario", "Failure Count", "Sample Seeds"]);
    let mut failed = false;
    for (scenario_name, failed_seeds) in failures {
        if !failed_seeds.is_empty() {
            failed = true;
            table.add_row(vec![
                scenario_name.clone(),
                failed_seeds.len().to_string(),
                failed_seeds
                    .iter()
                    .take(10)
                    .map(|seed| seed.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            ]);
        }
    }

    if failed {
        println!("{table}");
        std::process::exit(1);
    }
    log::info!("All levels passed");
    Ok(())
}
