//! Fixed-spacing call pacer shared by every worker.
//!
//! Not a token bucket: after each call the next one may start only once
//! `min_delay` has passed (or `error_backoff` after a transient failure).
//! The lock is held across the wait and the call, so workers sharing a
//! pacer never overlap and never burst.

use super::types::LookupError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

/// Longest spacing a pacer will keep between calls.
pub const MAX_SPACING: Duration = Duration::from_secs(3600);

#[derive(Clone)]
pub struct Pacer {
    next_allowed: Arc<Mutex<Option<Instant>>>,
    min_delay: Duration,
    error_backoff: Duration,
}

impl Pacer {
    /// Both spacings are clamped to [`MAX_SPACING`].
    pub fn new(min_delay: Duration, error_backoff: Duration) -> Self {
        Self {
            next_allowed: Arc::new(Mutex::new(None)),
            min_delay: min_delay.min(MAX_SPACING),
            error_backoff: error_backoff.min(MAX_SPACING),
        }
    }

    pub fn error_backoff(&self) -> Duration {
        self.error_backoff
    }

    /// Run one external call inside the pacing window.
    pub fn call<T>(&self, f: impl FnOnce() -> Result<T, LookupError>) -> Result<T, LookupError> {
        let mut next_allowed = self.next_allowed.lock();

        if let Some(at) = *next_allowed {
            let now = Instant::now();
            if at > now {
                let wait = at - now;
                trace!(wait_ms = wait.as_millis() as u64, "pacing before lookup");
                std::thread::sleep(wait);
            }
        }

        let result = f();

        let spacing = match &result {
            Err(e) if e.is_transient() => self.error_backoff,
            _ => self.min_delay,
        };
        let now = Instant::now();
        *next_allowed = Some(now.checked_add(spacing).unwrap_or(now));
        result
    }
}
