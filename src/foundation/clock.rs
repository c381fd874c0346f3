use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Monotonic time source injected into playback and capture.
///
/// `now_ms` is measured from an arbitrary origin; only differences are meaningful.
pub trait ClockSource: Send + Sync {
    fn now_ms(&self) -> f64;

    fn sleep_ms(&self, ms: f64);

    /// Block until `now_ms() >= deadline_ms` or `cancelled()` returns true.
    ///
    /// Returns `true` when the deadline was reached.
    fn wait_until(&self, deadline_ms: f64, cancelled: &dyn Fn() -> bool) -> bool;
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

const WAIT_SLICE_MS: f64 = 5.0;

impl ClockSource for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    fn sleep_ms(&self, ms: f64) {
        if ms.is_finite() && ms > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(ms / 1000.0));
        }
    }

    fn wait_until(&self, deadline_ms: f64, cancelled: &dyn Fn() -> bool) -> bool {
        loop {
            if cancelled() {
                return false;
            }
            let remaining = deadline_ms - self.now_ms();
            if remaining <= 0.0 {
                return true;
            }
            self.sleep_ms(remaining.min(WAIT_SLICE_MS));
        }
    }
}

/// Deterministic clock for tests and offline drivers: time moves only when someone sleeps
/// or calls [`ManualClock::advance`].
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    inner: Arc<(Mutex<f64>, Condvar)>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward and wake waiters. Non-positive or non-finite steps are ignored.
    pub fn advance(&self, ms: f64) {
        let (lock, cvar) = &*self.inner;
        let mut now = lock.lock().unwrap_or_else(|e| e.into_inner());
        if ms.is_finite() && ms > 0.0 {
            *now += ms;
        }
        cvar.notify_all();
    }
}

impl ClockSource for ManualClock {
    fn now_ms(&self) -> f64 {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sleep_ms(&self, ms: f64) {
        self.advance(ms);
    }

    fn wait_until(&self, deadline_ms: f64, cancelled: &dyn Fn() -> bool) -> bool {
        let (lock, cvar) = &*self.inner;
        let mut now = lock.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if *now >= deadline_ms {
                return true;
            }
            if cancelled() {
                return false;
            }
            // Wake periodically so cancellation is observed even when nobody advances time.
            let (guard, _) = cvar
                .wait_timeout(now, Duration::from_millis(WAIT_SLICE_MS as u64))
                .unwrap_or_else(|e| e.into_inner());
            now = guard;
        }
    }
}
