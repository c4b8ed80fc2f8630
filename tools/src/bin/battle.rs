use clap::Parser;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use crossbeam::channel;
use pond_simulator::battle::{Battle, Event};
use pond_simulator::clock::{Clock, SystemClock, TickClock};
use pond_simulator::config::BattleConfig;
use pond_simulator::runner::{run_headless, Pacing, Runner};
use pond_simulator::scenario::{self, Ducks, Scenario, Status};
use pond_simulator::snapshot::Snapshot;
use pond_tools::{load_config, load_duck, Duck};
use rayon::prelude::*;
use std::path::PathBuf;
use std::time::Duration;

/// Refresh rate of the event viewer.
const VIEWER_FPS: f64 = 36.0;

#[derive(Parser, Debug)]
#[clap()]
struct Arguments {
    /// Built-in duck names or paths to .js files
    #[clap(required = true, min_values = 2)]
    ducks: Vec<String>,

    #[clap(short, long, default_value = "100")]
    rounds: u64,

    /// Base seed
    #[clap(short, long, default_value = "0")]
    seed: u64,

    /// JSON file overriding battle settings
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Run a single battle at game speed and print what happens
    #[clap(long)]
    realtime: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("battle=info"))
        .init();

    let args = Arguments::parse();
    let ducks = args
        .ducks
        .iter()
        .map(|arg| load_duck(arg))
        .collect::<anyhow::Result<Vec<Duck>>>()?;
    let config = load_config(args.config.as_deref())?;

    if args.realtime {
        run_realtime(&ducks, config, args.seed);
        return Ok(());
    }

    log::info!("Running {} battles", args.rounds);
    let results: Vec<(Status, Vec<usize>)> = (args.seed..(args.seed + args.rounds))
        .into_par_iter()
        .map(|seed| run_battle(&ducks, config.clone(), seed))
        .collect();

    let mut wins = vec![0; ducks.len()];
    let mut rank_sums = vec![0; ducks.len()];
    let mut draws = 0;
    for (status, ranks) in results.iter() {
        match status {
            Status::Victory { avatar } => wins[avatar.0] += 1,
            _ => draws += 1,
        }
        for (index, rank) in ranks.iter().enumerate() {
            rank_sums[index] += rank;
        }
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Duck", "Wins", "Mean Rank"]);
    for (index, duck) in ducks.iter().enumerate() {
        table.add_row(vec![
            duck.name.clone(),
            wins[index].to_string(),
            format!("{:.2}", rank_sums[index] as f64 / results.len().max(1) as f64),
        ]);
    }
    println!("{table}");
    println!("Draws: {draws}");
    Ok(())
}

fn new_battle(
    ducks: &[Duck],
    config: BattleConfig,
    seed: u64,
    clock: Box<dyn Clock>,
) -> (Ducks, Battle) {
    let mut scenario = Ducks::new(
        ducks
            .iter()
            .map(|duck| (duck.name.as_str().into(), duck.code.clone()))
            .collect(),
    );
    let battle = scenario::new_battle_with_clock(&mut scenario, config, seed, &[], clock);
    (scenario, battle)
}

/// Returns the outcome and each duck's final rank, counting from 1.
fn run_battle(ducks: &[Duck], config: BattleConfig, seed: u64) -> (Status, Vec<usize>) {
    let (scenario, mut battle) = new_battle(ducks, config, seed, Box::new(TickClock::new()));
    run_headless(&mut battle);
    let mut ranks = vec![0; ducks.len()];
    for (position, handle) in battle.rank().iter().enumerate() {
        ranks[handle.0] = position + 1;
    }
    (scenario.status(&battle), ranks)
}

fn run_realtime(ducks: &[Duck], config: BattleConfig, seed: u64) {
    let (scenario, mut battle) = new_battle(ducks, config, seed, Box::new(SystemClock::new()));
    let (sender, receiver) = channel::bounded::<Snapshot>(64);
    let viewer = std::thread::spawn(move || view(receiver));

    let mut runner = Runner::new(Pacing::RealTime).with_snapshots(sender);
    battle.start(|survivors| log::info!("{survivors} left standing"));
    runner.run(&mut battle);
    // Closes the channel so the viewer drains and exits.
    drop(runner);
    if viewer.join().is_err() {
        log::warn!("Viewer thread panicked");
    }

    match scenario.status(&battle) {
        Status::Victory { avatar } => {
            log::info!("{} wins", battle.avatar(avatar).name())
        }
        _ => log::info!("Draw"),
    }
}

fn view(receiver: channel::Receiver<Snapshot>) {
    let frame = Duration::from_secs_f64(1.0 / VIEWER_FPS);
    loop {
        std::thread::sleep(frame);
        loop {
            match receiver.try_recv() {
                Ok(snapshot) => {
                    for event in snapshot.events.iter() {
                        describe(&snapshot, event);
                    }
                }
                Err(channel::TryRecvError::Empty) => break,
                Err(channel::TryRecvError::Disconnected) => return,
            }
        }
    }
}

fn describe(snapshot: &Snapshot, event: &Event) {
    let name = |handle| {
        snapshot
            .avatar(handle)
            .map(|avatar| avatar.name.to_string())
            .unwrap_or_default()
    };
    let time = snapshot.time / 1000.0;
    match event {
        Event::Bang { avatar, degree } => {
            log::info!("{time:7.2}s {} fires at {degree:.0}", name(*avatar))
        }
        Event::Boom { damage, x, y } if *damage > 0.0 => {
            log::info!("{time:7.2}s boom at ({x:.0}, {y:.0}) for {damage:.1}")
        }
        Event::Crash { avatar, damage } => {
            log::info!("{time:7.2}s {} crashes for {damage:.1}", name(*avatar))
        }
        Event::Die { avatar } => log::info!("{time:7.2}s {} dies", name(*avatar)),
        _ => {}
    }
}
