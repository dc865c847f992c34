use std::time::Instant;

/// The external collaborator providing monotonic time to the core. Abstracted so scenario tests
/// can drive time deterministically instead of sleeping.
pub trait Clock: Send + Sync {
    /// Monotonic milliseconds since an arbitrary epoch fixed at clock construction.
    fn now(&self) -> i64;
}

/// A [`Clock`] backed by [`std::time::Instant`].
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    /// Creates a clock whose epoch is "now".
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        self.epoch.elapsed().as_millis() as i64
    }
}

/// A [`Clock`] whose value is advanced explicitly, for deterministic scenario tests.
pub struct ManualClock {
    now_ms: std::sync::atomic::AtomicI64,
}

impl ManualClock {
    /// Creates a clock starting at `now_ms`.
    pub fn new(now_ms: i64) -> Self {
        Self {
            now_ms: std::sync::atomic::AtomicI64::new(now_ms),
        }
    }

    /// Sets the clock to `now_ms`. Must be non-decreasing, matching the monotonic contract of
    /// [`Clock::now`].
    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, std::sync::atomic::Ordering::SeqCst);
    }

    /// Advances the clock by `delta_ms`.
    pub fn advance(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now_ms.load(std::sync::atomic::Ordering::SeqCst)
    }
}
