use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Time source injected into every timed component.
///
/// `now_ms` is monotonic and drives alert expiry; `wall_clock_ms` stamps
/// persisted baseline records.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
    fn wall_clock_ms(&self) -> u64;
}

/// Clock backed by the tokio timer.
///
/// Reads `tokio::time::Instant`, so a runtime with paused time advances it
/// together with `sleep`/`interval`.
pub struct SystemClock {
    start: tokio::time::Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: tokio::time::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn wall_clock_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Hand-advanced clock for deterministic tests and replays.
pub struct ManualClock {
    now_ms: AtomicU64,
    wall_base_ms: u64,
}

impl ManualClock {
    pub fn new(wall_base_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(0),
            wall_base_ms,
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.now_ms.store(ms, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn wall_clock_ms(&self) -> u64 {
        self.wall_base_ms + self.now_ms()
    }
}
