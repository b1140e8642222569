//! Admission control consulted before registry reads.

use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Interval between token-refill checks while waiting.
const REFILL_POLL: Duration = Duration::from_millis(100);

/// Admission-control policy: wait until a request may proceed or the
/// deadline passes.
#[async_trait]
pub trait Limiter: Send + Sync {
    /// Block until admitted, failing with [`Error::Timeout`] when the
    /// deadline expires first.
    async fn allow(&self, deadline: Duration) -> Result<()>;
}

/// Admits everything. Used when admission control is disabled.
#[derive(Debug, Default)]
pub struct Unlimited;

#[async_trait]
impl Limiter for Unlimited {
    async fn allow(&self, _deadline: Duration) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket limiter: `rate` tokens per second refill up to
/// `capacity`, starting from `initial_tokens`.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    rate: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a bucket with the given capacity, refill rate (tokens per
    /// second) and initial fill.
    pub fn new(capacity: u64, rate: f64, initial_tokens: f64) -> Self {
        Self {
            capacity: capacity as f64,
            rate,
            state: Mutex::new(BucketState {
                tokens: initial_tokens,
                last_refill: Instant::now(),
            }),
        }
    }

    fn try_take(&self) -> bool {
        let mut state = self.state.lock();

        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + self.rate * elapsed).min(self.capacity);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl Limiter for TokenBucket {
    async fn allow(&self, deadline: Duration) -> Result<()> {
        let start = Instant::now();
        loop {
            if self.try_take() {
                return Ok(());
            }
            if start.elapsed() >= deadline {
                return Err(Error::Timeout);
            }
            tokio::time::sleep(REFILL_POLL.min(deadline)).await;
        }
    }
}
