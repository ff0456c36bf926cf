use std::time::{Duration, Instant};

/// Debounce state for one autocomplete field. Each keystroke reschedules
/// the pending fire; only the most recent schedule survives. Fired
/// fetches get a generation tag so a slow response for a superseded
/// query can be recognized and dropped.
#[derive(Clone, Copy, Debug)]
pub struct Debounce {
    delay: Duration,
    min_len: usize,
    fire_at: Option<Instant>,
    generation: u64,
}

impl Debounce {
    pub fn new(delay: Duration, min_len: usize) -> Self {
        Self {
            delay,
            min_len,
            fire_at: None,
            generation: 0,
        }
    }

    /// Returns false when the query is below the minimum length, in which
    /// case the pending fire is cancelled and the caller should clear the
    /// result list without issuing a request. Every keystroke also
    /// supersedes any fetch already in flight for an older query.
    pub fn input(&mut self, query: &str, now: Instant) -> bool {
        self.generation = self.generation.wrapping_add(1);
        if query.trim().chars().count() < self.min_len {
            self.fire_at = None;
            return false;
        }
        self.fire_at = Some(now + self.delay);
        true
    }

    pub fn pending(&self) -> bool {
        self.fire_at.is_some()
    }

    /// Consumes a due timer and hands out the generation for the fetch
    /// about to be issued.
    pub fn fire_due(&mut self, now: Instant) -> Option<u64> {
        match self.fire_at {
            Some(at) if now >= at => {
                self.fire_at = None;
                self.generation = self.generation.wrapping_add(1);
                Some(self.generation)
            }
            _ => None,
        }
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    /// Outstanding responses become stale without scheduling anything new.
    pub fn invalidate(&mut self) {
        self.fire_at = None;
        self.generation = self.generation.wrapping_add(1);
    }
}

/// Recurring tick in the polling style of the main loop: the owner asks
/// `due(now)` each pass instead of holding a real timer. At most one
/// schedule exists; enabling twice does not create a second one.
#[derive(Clone, Copy, Debug)]
pub struct Interval {
    every: Duration,
    enabled: bool,
    last: Option<Instant>,
}

impl Interval {
    /// Opt-in interval, disabled until `enable`.
    pub fn new(every: Duration) -> Self {
        Self {
            every,
            enabled: false,
            last: None,
        }
    }

    /// Always-on interval whose first tick fires immediately.
    pub fn running(every: Duration) -> Self {
        Self {
            every,
            enabled: true,
            last: None,
        }
    }

    pub fn enable(&mut self, now: Instant) {
        if self.enabled {
            return;
        }
        self.enabled = true;
        // First tick lands one full period from now, like setInterval.
        self.last = Some(now);
    }

    pub fn disable(&mut self) {
        self.enabled = false;
        self.last = None;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn due(&mut self, now: Instant) -> bool {
        if !self.enabled {
            return false;
        }
        match self.last {
            None => {
                self.last = Some(now);
                true
            }
            Some(prev) if now.duration_since(prev) >= self.every => {
                self.last = Some(now);
                true
            }
            _ => false,
        }
    }
}

/// Single delayed action, e.g. reverting a transient status message.
#[derive(Clone, Copy, Debug, Default)]
pub struct OneShot {
    fire_at: Option<Instant>,
}

impl OneShot {
    pub fn arm(&mut self, now: Instant, delay: Duration) {
        self.fire_at = Some(now + delay);
    }

    pub fn armed(&self) -> bool {
        self.fire_at.is_some()
    }

    pub fn fire_due(&mut self, now: Instant) -> bool {
        match self.fire_at {
            Some(at) if now >= at => {
                self.fire_at = None;
                true
            }
            _ => false,
        }
    }
}
