use crate::model::Mode;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub factor: f64,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(200),
            factor: 1.5,
            max: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    /// `min(base * factor^retries, max)`, rounded to the millisecond.
    pub fn delay(&self, retries: u32) -> Duration {
        let exp = i32::try_from(retries).unwrap_or(i32::MAX);
        let millis = (self.base.as_millis() as f64 * self.factor.powi(exp)).round();
        let max_millis = self.max.as_millis() as f64;
        if !millis.is_finite() || millis >= max_millis {
            return self.max;
        }
        Duration::from_millis(millis as u64)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BackoffSnapshot {
    pub active: bool,
    pub retries: u32,
}

impl BackoffSnapshot {
    pub fn mode(&self) -> Mode {
        if self.active {
            Mode::Degraded
        } else {
            Mode::Normal
        }
    }
}

#[derive(Debug, Default)]
pub struct BackoffState {
    inner: Mutex<BackoffSnapshot>,
}

impl BackoffState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> BackoffSnapshot {
        *self.lock()
    }

    pub fn record_success(&self) {
        let mut state = self.lock();
        state.active = false;
        state.retries = 0;
    }

    pub fn record_failure(&self) {
        self.lock().active = true;
    }

    /// Called by the scheduler after a degraded iteration. A success inside
    /// that iteration already reset the counter, so nothing advances then.
    pub fn advance_retry(&self) {
        let mut state = self.lock();
        if state.active {
            state.retries = state.retries.saturating_add(1);
        }
    }

    pub fn reset_retries(&self) {
        self.lock().retries = 0;
    }

    fn lock(&self) -> MutexGuard<'_, BackoffSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
