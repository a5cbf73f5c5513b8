//! Token-bucket rate limiter shared by every outbound request
//!
//! Tokens are added by a background refill task, one per `1/rate` seconds,
//! up to a capacity equal to the rate. The bucket starts empty. Callers take
//! one token per request via [`RateLimiter::wait`].

use crate::RateLimitError;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Mutable bucket state, always accessed under one lock
#[derive(Debug)]
struct Bucket {
    capacity: u32,
    available: u32,
    period: Duration,
}

#[derive(Debug)]
struct Inner {
    bucket: Mutex<Bucket>,
    token_added: Notify,
    rate_changed: Notify,
    stopped: CancellationToken,
}

impl Inner {
    fn bucket(&self) -> MutexGuard<'_, Bucket> {
        self.bucket.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn try_take(&self) -> bool {
        let mut bucket = self.bucket();
        if bucket.available > 0 {
            bucket.available -= 1;
            true
        } else {
            false
        }
    }
}

/// Global requests-per-second limiter
///
/// Must be created inside a Tokio runtime: construction spawns the refill
/// task. Dropping the limiter stops it.
#[derive(Debug)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

impl RateLimiter {
    /// Creates a limiter admitting `rate` requests per second
    ///
    /// A rate of 0 is clamped to 1.
    pub fn new(rate: u32) -> Self {
        let rate = clamp_rate(rate);

        let inner = Arc::new(Inner {
            bucket: Mutex::new(Bucket {
                capacity: rate,
                available: 0,
                period: period_for(rate),
            }),
            token_added: Notify::new(),
            rate_changed: Notify::new(),
            stopped: CancellationToken::new(),
        });

        tokio::spawn(refill(Arc::clone(&inner)));

        Self { inner }
    }

    /// Waits for a token
    ///
    /// # Returns
    ///
    /// * `Ok(())` - A token was taken; the request may proceed
    /// * `Err(RateLimitError::Cancelled)` - `cancel` fired first
    /// * `Err(RateLimitError::Stopped)` - The limiter was stopped
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), RateLimitError> {
        loop {
            // Register interest before checking the bucket so a token added
            // in between still wakes us
            let notified = self.inner.token_added.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.inner.stopped.is_cancelled() {
                return Err(RateLimitError::Stopped);
            }
            if cancel.is_cancelled() {
                return Err(RateLimitError::Cancelled);
            }
            if self.inner.try_take() {
                return Ok(());
            }

            tokio::select! {
                biased;
                _ = self.inner.stopped.cancelled() => return Err(RateLimitError::Stopped),
                _ = cancel.cancelled() => return Err(RateLimitError::Cancelled),
                _ = &mut notified => {}
            }
        }
    }

    /// Changes the rate (and capacity) to `rate` requests per second
    ///
    /// Tokens already in the bucket are kept up to the new capacity; a
    /// higher rate does not grant extra tokens. A rate of 0 is clamped to 1.
    pub fn set_rate(&self, rate: u32) {
        let rate = clamp_rate(rate);
        {
            let mut bucket = self.inner.bucket();
            if self.inner.stopped.is_cancelled() || bucket.capacity == rate {
                return;
            }
            bucket.capacity = rate;
            bucket.available = bucket.available.min(rate);
            bucket.period = period_for(rate);
        }
        tracing::debug!("Rate limit changed to {} requests/sec", rate);
        self.inner.rate_changed.notify_one();
    }

    /// Stops the refill task and releases every waiter with
    /// [`RateLimitError::Stopped`]
    pub fn stop(&self) {
        self.inner.stopped.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.is_cancelled()
    }

    /// Current rate in requests per second
    pub fn rate(&self) -> u32 {
        self.inner.bucket().capacity
    }

    /// Tokens currently in the bucket
    pub fn available(&self) -> u32 {
        self.inner.bucket().available
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Adds one token per period until stopped
///
/// The period is re-read from the bucket on every tick, and a rate change
/// restarts the wait with the new cadence.
async fn refill(inner: Arc<Inner>) {
    let mut next_tick = Instant::now() + inner.bucket().period;

    loop {
        tokio::select! {
            biased;
            _ = inner.stopped.cancelled() => {
                tracing::trace!("Rate limiter refill task stopped");
                return;
            }
            _ = inner.rate_changed.notified() => {
                next_tick = Instant::now() + inner.bucket().period;
            }
            _ = tokio::time::sleep_until(next_tick) => {
                let added = {
                    let mut bucket = inner.bucket();
                    next_tick += bucket.period;
                    // A full bucket drops the tick
                    if bucket.available < bucket.capacity {
                        bucket.available += 1;
                        true
                    } else {
                        false
                    }
                };
                if added {
                    inner.token_added.notify_one();
                }
            }
        }
    }
}

fn clamp_rate(rate: u32) -> u32 {
    if rate == 0 {
        tracing::warn!("Rate limit of 0 requests/sec is invalid, using 1");
        1
    } else {
        rate
    }
}

/// Refill cadence; never zero, even for rates above one per nanosecond
fn period_for(rate: u32) -> Duration {
    (Duration::from_secs(1) / rate).max(Duration::from_nanos(1))
}
