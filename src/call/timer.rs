use tokio::time::Instant;

/// Elapsed connected-call time in whole seconds.
///
/// Armed on entering `connected`, sampled once per second by the ticker
/// task, disarmed on the terminal transition. Samples never go backwards
/// and the value reported by [`DurationTimer::disarm`] is recomputed from
/// the start instant rather than taken from the last sample.
#[derive(Debug, Default)]
pub struct DurationTimer {
    started: Option<Instant>,
    last_sample: u64,
    frozen: Option<u64>,
}

impl DurationTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start measuring from `now`; any previous measurement is discarded
    pub fn arm(&mut self, now: Instant) {
        self.started = Some(now);
        self.last_sample = 0;
        self.frozen = None;
    }

    pub fn is_armed(&self) -> bool {
        self.started.is_some() && self.frozen.is_none()
    }

    /// Periodic sample. `None` once disarmed.
    pub fn sample(&mut self, now: Instant) -> Option<u64> {
        if !self.is_armed() {
            return None;
        }
        let elapsed = self.elapsed_at(now);
        self.last_sample = self.last_sample.max(elapsed);
        Some(self.last_sample)
    }

    /// Stop and freeze on the authoritative elapsed value
    pub fn disarm(&mut self, now: Instant) -> u64 {
        if let Some(frozen) = self.frozen {
            return frozen;
        }
        let total = match self.started {
            Some(_) => self.elapsed_at(now).max(self.last_sample),
            None => 0,
        };
        self.frozen = Some(total);
        total
    }

    /// Current value: frozen total, else the latest sample
    pub fn current(&self) -> u64 {
        self.frozen.unwrap_or(self.last_sample)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn elapsed_at(&self, now: Instant) -> u64 {
        self.started
            .map(|start| now.saturating_duration_since(start).as_secs())
            .unwrap_or(0)
    }
}
