use crate::battle::{Battle, BattleState};
use crate::snapshot::Snapshot;
use crossbeam::channel::{Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pacing {
    /// Sleep one tick length between updates.
    RealTime,
    /// Run updates back to back.
    Headless,
}

/// Cancels a running battle from another thread.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Finished { survivors: usize },
    Cancelled,
}

pub struct Runner {
    pacing: Pacing,
    cancel: CancelHandle,
    snapshots: Option<Sender<Snapshot>>,
}

impl Runner {
    pub fn new(pacing: Pacing) -> Self {
        Self {
            pacing,
            cancel: CancelHandle::default(),
            snapshots: None,
        }
    }

    /// Publishes a snapshot after every update. Snapshots are dropped while
    /// the channel is full so a slow viewer never holds up the battle.
    pub fn with_snapshots(mut self, sender: Sender<Snapshot>) -> Self {
        self.snapshots = Some(sender);
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Drives a started battle until it stops or is cancelled. A cancelled
    /// battle is reset.
    pub fn run(&mut self, battle: &mut Battle) -> Outcome {
        let tick = Duration::from_secs_f64(battle.config().tick_length() / 1000.0);
        loop {
            if self.cancel.is_cancelled() {
                log::info!("Battle cancelled after {} updates", battle.updates());
                battle.reset();
                return Outcome::Cancelled;
            }
            battle.update();
            self.publish(battle);
            if battle.state() != BattleState::Running {
                return Outcome::Finished {
                    survivors: battle.survivors().unwrap_or(0),
                };
            }
            if self.pacing == Pacing::RealTime {
                std::thread::sleep(tick);
            }
        }
    }

    fn publish(&mut self, battle: &Battle) {
        if let Some(sender) = self.snapshots.as_ref() {
            match sender.try_send(battle.snapshot()) {
                Ok(()) | Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Disconnected(_)) => {
                    log::debug!("Viewer went away");
                    self.snapshots = None;
                }
            }
        }
    }
}

/// Starts `battle` and runs it to completion without pausing between ticks.
pub fn run_headless(battle: &mut Battle) -> usize {
    battle.start(|_| {});
    match Runner::new(Pacing::Headless).run(battle) {
        Outcome::Finished { survivors } => survivors,
        Outcome::Cancelled => 0,
    }
}
