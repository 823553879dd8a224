//! Paired-view countdown, ticked once per second by the host.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownTick {
    /// No countdown is running.
    Inactive,
    Running(u32),
    /// Reached zero on this tick; the countdown is now cleared.
    Expired,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Countdown {
    remaining: Option<u32>,
}

impl Countdown {
    /// Start from `secs`, replacing any countdown already running.
    pub fn start(&mut self, secs: u32) {
        self.remaining = Some(secs);
    }

    pub fn tick(&mut self) -> CountdownTick {
        match self.remaining {
            None => CountdownTick::Inactive,
            Some(secs) if secs <= 1 => {
                self.remaining = None;
                CountdownTick::Expired
            }
            Some(secs) => {
                self.remaining = Some(secs - 1);
                CountdownTick::Running(secs - 1)
            }
        }
    }

    /// Add `secs` to a running countdown. No effect when inactive.
    pub fn extend(&mut self, secs: u32) -> Option<u32> {
        let remaining = self.remaining.as_mut()?;
        *remaining = remaining.saturating_add(secs);
        Some(*remaining)
    }

    pub fn cancel(&mut self) {
        self.remaining = None;
    }

    pub fn remaining(&self) -> Option<u32> {
        self.remaining
    }

    pub fn is_active(&self) -> bool {
        self.remaining.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_down_to_expiry() {
        let mut c = Countdown::default();
        c.start(3);
        assert_eq!(c.tick(), CountdownTick::Running(2));
        assert_eq!(c.tick(), CountdownTick::Running(1));
        assert_eq!(c.tick(), CountdownTick::Expired);
        assert_eq!(c.tick(), CountdownTick::Inactive);
        assert!(!c.is_active());
    }

    #[test]
    fn extend_adds_exactly_n_increments() {
        let mut c = Countdown::default();
        c.start(20);
        for _ in 0..4 {
            c.extend(10);
        }
        assert_eq!(c.remaining(), Some(60));
    }

    #[test]
    fn extend_when_inactive_is_noop() {
        let mut c = Countdown::default();
        assert_eq!(c.extend(10), None);
        assert_eq!(c.remaining(), None);
    }

    #[test]
    fn start_replaces_running_countdown() {
        let mut c = Countdown::default();
        c.start(5);
        c.tick();
        c.start(20);
        assert_eq!(c.remaining(), Some(20));
    }

    #[test]
    fn cancel_clears() {
        let mut c = Countdown::default();
        c.start(5);
        c.cancel();
        assert_eq!(c.tick(), CountdownTick::Inactive);
    }
}
