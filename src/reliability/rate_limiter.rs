//! Sliding-window rate limiter shared by every worker.
//!
//! At most `max_calls` permits are granted in any trailing window of
//! `window`, measured from the moment each earlier permit was granted.
//! Waiters are served in FIFO order through a single async mutex, and the
//! mutex is held while sleeping so later callers cannot overtake.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{CleanerError, Result};

/// A granted call slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePermit {
    /// When the permit was granted
    pub granted_at: Instant,
    /// Permits in the trailing window, including this one
    pub in_window: usize,
}

/// Process-wide gate bounding outbound calls per sliding window.
#[derive(Debug)]
pub struct RateLimiter {
    max_calls: usize,
    window: Duration,
    grants: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a new limiter. Fails if `max_calls` or `window` is zero.
    pub fn new(max_calls: usize, window: Duration) -> Result<Self> {
        if max_calls == 0 {
            return Err(CleanerError::invalid_config(
                "rate limiter max_calls must be greater than 0",
            ));
        }
        if window.is_zero() {
            return Err(CleanerError::invalid_config(
                "rate limiter window must be greater than 0",
            ));
        }
        if Instant::now().checked_add(window).is_none() {
            return Err(CleanerError::invalid_config("rate limiter window is too large"));
        }

        Ok(Self {
            max_calls,
            window,
            grants: Mutex::new(VecDeque::with_capacity(max_calls)),
        })
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait until a call may be issued and record it.
    ///
    /// Never fails. Dropping the returned future while it waits releases the
    /// queue position without consuming a permit.
    pub async fn acquire(&self) -> RatePermit {
        let mut grants = self.grants.lock().await;

        loop {
            let now = Instant::now();
            self.prune(&mut grants, now);

            if grants.len() < self.max_calls {
                grants.push_back(now);
                trace!(
                    in_window = grants.len(),
                    window_secs = self.window.as_secs_f64(),
                    "Rate limiter granted permit"
                );
                return RatePermit {
                    granted_at: now,
                    in_window: grants.len(),
                };
            }

            // Full: the oldest grant leaves the window first.
            if let Some(&oldest) = grants.front() {
                match oldest.checked_add(self.window) {
                    Some(ready_at) => {
                        debug!(
                            wait_secs = (ready_at - now).as_secs_f64(),
                            "Rate limit reached, waiting"
                        );
                        tokio::time::sleep_until(ready_at).await;
                    }
                    // Past the clock's range; tokio clamps the deadline.
                    None => tokio::time::sleep(self.window).await,
                }
            }
        }
    }

    /// Like [`acquire`](Self::acquire), but gives up with
    /// [`CleanerError::Cancelled`] as soon as `cancel` fires.
    pub async fn acquire_cancellable(&self, cancel: &CancellationToken) -> Result<RatePermit> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CleanerError::Cancelled),
            permit = self.acquire() => Ok(permit),
        }
    }

    /// Grant a permit only if one is available right now.
    pub fn try_acquire(&self) -> Option<RatePermit> {
        let mut grants = self.grants.try_lock().ok()?;
        let now = Instant::now();
        self.prune(&mut grants, now);

        if grants.len() < self.max_calls {
            grants.push_back(now);
            Some(RatePermit {
                granted_at: now,
                in_window: grants.len(),
            })
        } else {
            None
        }
    }

    /// Number of permits granted within the trailing window.
    pub async fn in_window(&self) -> usize {
        let mut grants = self.grants.lock().await;
        self.prune(&mut grants, Instant::now());
        grants.len()
    }

    fn prune(&self, grants: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&oldest) = grants.front() {
            if now.duration_since(oldest) >= self.window {
                grants.pop_front();
            } else {
                break;
            }
        }
    }
}
