use std::time::Instant;

/// Abstracts "now" so header-retry scheduling (spec.md §4.3, §5 "header
/// request retry timer 5s") can be driven deterministically in tests
/// without sleeping real wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
