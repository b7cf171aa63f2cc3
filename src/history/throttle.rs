use std::time::{Duration, Instant};

// Collapses rapid repeated undo/redo triggers at the input layer, e.g. a
// held-down keyboard shortcut. Leading edge: the first trigger passes, any
// trigger inside the interval window is dropped and does not reset the
// window.
#[derive(Debug)]
pub struct TriggerThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl TriggerThrottle {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

    pub fn new(interval: Duration) -> Self {
        TriggerThrottle { interval, last: None }
    }

    pub fn try_trigger(&mut self) -> bool {
        self.try_trigger_at(Instant::now())
    }

    // Clock-injected variant so tests can drive time without sleeping.
    pub fn try_trigger_at(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last
            && now.duration_since(last) < self.interval
        {
            return false;
        }
        self.last = Some(now);
        true
    }
}

impl Default for TriggerThrottle {
    fn default() -> Self {
        TriggerThrottle::new(Self::DEFAULT_INTERVAL)
    }
}
