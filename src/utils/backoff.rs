use std::time::Duration;

/// Exponential reconnect delay: starts at `initial`, doubles per failure, capped at `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let max = max.max(initial);
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay to wait before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    /// Change the cap, e.g. after the settings were reloaded
    pub fn set_max(&mut self, max: Duration) {
        self.max = max.max(self.initial);
        self.current = self.current.min(self.max);
    }

    /// Call after a successful connection
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}
