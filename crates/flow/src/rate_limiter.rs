//! crates/flow/src/rate_limiter.rs
//!
//! An async token-bucket pacer for commands-per-second, modeled on the
//! debt-accumulation scheme of a bytes-per-second limiter: every admitted
//! command adds to an outstanding debt, and the limiter sleeps only once
//! that debt implies a wait worth taking, coalescing short bursts instead
//! of sleeping after every single command.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// The shortest sleep the limiter will actually perform; smaller debts are
/// left outstanding until they cross this threshold.
const MINIMUM_SLEEP: Duration = Duration::from_millis(10);

/// Paces command submission to at most `qps` per second. Cloning shares the
/// same underlying bucket.
pub struct RateLimiter {
    qps: AtomicU64,
    state: Mutex<LimiterState>,
}

struct LimiterState {
    debt_micros: u128,
    last_register: Instant,
}

impl RateLimiter {
    /// Builds a limiter; `qps == 0` means unlimited, and every call to
    /// [`RateLimiter::acquire`] returns immediately.
    #[must_use]
    pub fn new(qps: u32) -> Self {
        Self {
            qps: AtomicU64::new(u64::from(qps)),
            state: Mutex::new(LimiterState {
                debt_micros: 0,
                last_register: Instant::now(),
            }),
        }
    }

    /// An unlimited limiter; every call to [`RateLimiter::acquire`] is a no-op.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(0)
    }

    /// Updates the configured rate; `0` disables limiting.
    pub fn set_qps(&self, qps: u32) {
        self.qps.store(u64::from(qps), Ordering::Relaxed);
    }

    /// Accounts for `count` commands just about to be submitted, sleeping
    /// first if the bucket's accumulated debt requires it.
    pub async fn acquire(&self, count: u64) {
        let qps = self.qps.load(Ordering::Relaxed);
        if qps == 0 || count == 0 {
            return;
        }

        let micros_per_command = 1_000_000u128 / u128::from(qps).max(1);
        let mut state = self.state.lock().await;

        let elapsed = state.last_register.elapsed();
        state.debt_micros = state
            .debt_micros
            .saturating_sub(elapsed.as_micros())
            .saturating_add(micros_per_command * u128::from(count));
        state.last_register = Instant::now();

        if state.debt_micros > MINIMUM_SLEEP.as_micros() {
            let sleep_for = u64::try_from(state.debt_micros).unwrap_or(u64::MAX);
            drop(state);
            tokio::time::sleep(Duration::from_micros(sleep_for)).await;
        }
    }
}
