use instant::Instant;

/// Source of the wall-clock time used for reload gating and deadlines.
pub trait Clock {
    /// Milliseconds since the clock was created.
    fn now(&self) -> f64;
    /// Called at the start of every tick with the tick length.
    fn advance(&mut self, ms: f64);
}

pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        SystemClock::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        (Instant::now() - self.start).as_secs_f64() * 1000.0
    }

    fn advance(&mut self, _ms: f64) {}
}

/// Simulated time that only moves when the battle ticks. Makes a battle a
/// pure function of its seed.
#[derive(Default)]
pub struct TickClock {
    now: f64,
}

impl TickClock {
    pub fn new() -> Self {
        Self { now: 0.0 }
    }
}

impl Clock for TickClock {
    fn now(&self) -> f64 {
        self.now
    }

    fn advance(&mut self, ms: f64) {
        self.now += ms;
    }
}
