use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Validity stamp handed out by `StampClock`.
pub type Stamp = u64;

/// Logical clock for validity stamps. Every call to `tick` returns a value
/// greater than any returned before, also across threads.
/// Stamp 0 is never handed out, it marks a community that was never scanned.
#[derive(Debug)]
pub struct StampClock {
    next: AtomicU64,
}

impl Default for StampClock {
    fn default() -> Self {
        StampClock::new()
    }
}

impl StampClock {
    pub fn new() -> Self {
        StampClock { next: AtomicU64::new(1) }
    }

    #[inline]
    pub fn tick(&self) -> Stamp {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// The stamp the next `tick` would return.
    pub fn peek(&self) -> Stamp {
        self.next.load(Ordering::Relaxed)
    }
}

/// Milliseconds since `start`, for log lines.
pub fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}


#[cfg(test)]
mod util_test {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    use crate::util::StampClock;

    #[test]
    pub fn test_stamp_monotonic() {
        let clock = StampClock::new();
        let first = clock.tick();
        let second = clock.tick();
        assert_eq!(first, 1);
        assert!(second > first);
        assert_eq!(clock.peek(), second + 1);
    }

    #[test]
    pub fn test_stamp_unique_across_threads() {
        let clock = Arc::new(StampClock::new());
        let handles: Vec<_> = (0..4).map(|_| {
            let clock = Arc::clone(&clock);
            thread::spawn(move || (0..1000).map(|_| clock.tick()).collect::<Vec<_>>())
        }).collect();
        let mut seen = HashSet::new();
        for handle in handles {
            for stamp in handle.join().unwrap() {
                assert!(seen.insert(stamp), "stamp {} handed out twice", stamp);
            }
        }
        assert_eq!(seen.len(), 4000);
    }
}
