use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use vellum_types::Stamp;

/// Hybrid logical clock issuing the store's server timestamps.
///
/// Guarantees strict monotonicity per store handle: when the wall clock has
/// not advanced since the last issued stamp, the logical counter increments
/// instead. Delta chains rely on this to stay strictly time-ordered even
/// when several writes commit within one millisecond.
pub struct StoreClock {
    node_id: u16,
    state: Mutex<ClockState>,
}

struct ClockState {
    physical_ms: u64,
    logical: u32,
}

impl StoreClock {
    /// Create a clock for the given node identifier.
    pub fn new(node_id: u16) -> Self {
        Self {
            node_id,
            state: Mutex::new(ClockState {
                physical_ms: 0,
                logical: 0,
            }),
        }
    }

    /// Issue a stamp strictly greater than every stamp issued before it.
    pub fn now(&self) -> Stamp {
        let wall = Self::wall_clock_ms();
        let mut state = self.state.lock().expect("clock mutex poisoned");

        let new_physical = wall.max(state.physical_ms);
        let new_logical = if new_physical > state.physical_ms {
            // Wall clock advanced; reset logical counter.
            0
        } else {
            // Same physical tick; increment logical counter.
            state.logical + 1
        };

        state.physical_ms = new_physical;
        state.logical = new_logical;

        Stamp::new(new_physical, new_logical, self.node_id)
    }

    /// The node identifier this clock was created with.
    pub fn node_id(&self) -> u16 {
        self.node_id
    }

    /// Current wall-clock time in milliseconds since the UNIX epoch.
    fn wall_clock_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_across_rapid_calls() {
        let clock = StoreClock::new(1);
        let mut prev = clock.now();
        for _ in 0..1000 {
            let next = clock.now();
            assert!(next > prev, "clock must be strictly monotonic: {prev:?} >= {next:?}");
            prev = next;
        }
    }

    #[test]
    fn logical_increments_within_same_physical() {
        let clock = StoreClock::new(1);
        // Force the physical clock to a fixed value by setting state directly.
        {
            let mut state = clock.state.lock().unwrap();
            state.physical_ms = u64::MAX; // Far future; wall clock can never exceed.
            state.logical = 0;
        }
        let t1 = clock.now();
        let t2 = clock.now();
        let t3 = clock.now();

        assert_eq!(t1.physical_ms, u64::MAX);
        assert_eq!(t1.logical, 1); // incremented from 0
        assert_eq!(t2.logical, 2);
        assert_eq!(t3.logical, 3);
        assert!(t1 < t2);
        assert!(t2 < t3);
    }

    #[test]
    fn node_id_is_preserved() {
        let clock = StoreClock::new(42);
        let stamp = clock.now();
        assert_eq!(stamp.node_id, 42);
        assert_eq!(clock.node_id(), 42);
    }

    #[test]
    fn concurrent_now_calls_are_unique() {
        use std::sync::Arc;
        use std::thread;

        let clock = Arc::new(StoreClock::new(1));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let clock = Arc::clone(&clock);
            handles.push(thread::spawn(move || {
                let mut stamps = Vec::with_capacity(100);
                for _ in 0..100 {
                    stamps.push(clock.now());
                }
                stamps
            }));
        }

        let mut all_stamps: Vec<Stamp> = Vec::new();
        for handle in handles {
            all_stamps.extend(handle.join().unwrap());
        }

        // All stamps must be unique (monotonic per thread, unique globally).
        let len = all_stamps.len();
        all_stamps.sort();
        all_stamps.dedup();
        assert_eq!(all_stamps.len(), len, "all stamps must be unique across threads");
    }
}
