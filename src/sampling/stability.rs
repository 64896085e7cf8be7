use std::time::{Duration, Instant};

/// Tracks whether the discovered widget count has stopped changing.
///
/// Stability is proven, never assumed: it only holds once the count has been
/// unchanged for strictly longer than the window.
#[derive(Debug, Clone)]
pub struct PopulationTracker {
    window: Duration,
    empty_timeout: Duration,
    started_at: Instant,
    last_count: Option<usize>,
    stable_since: Instant,
    ever_discovered: bool,
}

impl PopulationTracker {
    pub fn new(started_at: Instant, window: Duration, empty_timeout: Duration) -> Self {
        Self {
            window,
            empty_timeout,
            started_at,
            last_count: None,
            stable_since: started_at,
            ever_discovered: false,
        }
    }

    /// Record the population size seen at `now`. Returns true when it changed.
    pub fn observe(&mut self, count: usize, now: Instant) -> bool {
        if count > 0 {
            self.ever_discovered = true;
        }
        let changed = self.last_count != Some(count);
        if changed {
            self.last_count = Some(count);
            self.stable_since = now;
        }
        changed
    }

    pub fn stable_since(&self) -> Instant {
        self.stable_since
    }

    pub fn last_count(&self) -> Option<usize> {
        self.last_count
    }

    pub fn ever_discovered(&self) -> bool {
        self.ever_discovered
    }

    pub fn is_stable(&self, now: Instant) -> bool {
        self.last_count.is_some() && now.saturating_duration_since(self.stable_since) > self.window
    }

    /// Nothing has ever mounted, the empty timeout has passed and the empty
    /// population is itself stable.
    pub fn is_genuinely_empty(&self, now: Instant) -> bool {
        !self.ever_discovered
            && now.saturating_duration_since(self.started_at) >= self.empty_timeout
            && self.is_stable(now)
    }
}
