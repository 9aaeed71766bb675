//! Admission gate: a token bucket whose rate is replaced at runtime.
//!
//! The bucket is sized with capacity == rate, so a peer may spend its whole
//! per-second share at once and then refills linearly. A rate of zero admits
//! nobody: blocking callers park until the rate turns positive or their own
//! context fires, fail-fast callers are rejected on the spot.
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::{sleep, Duration, Instant};
use tracing::debug;

use crate::context::WaitContext;
use crate::error::{Result, ShareLimitError};

/// Rate-gated wait primitive driven by the coordination loop
#[async_trait]
pub trait RateGate: Send + Sync {
    /// Block until admitted, or fail with `Unavailable` (fail-fast while the
    /// rate is zero), `Cancelled` or `DeadlineExceeded`.
    async fn wait(&self, ctx: &WaitContext, fail_fast: bool) -> Result<()>;

    /// Replace the admitted rate (requests per second)
    fn set_rate(&self, rate: u32);

    fn rate(&self) -> u32;
}

/// Token bucket with capacity equal to its refill rate
#[derive(Clone, Debug)]
pub struct TokenBucket {
    // Count of tokens
    tokens: f64,
    // Refill rate per second, also the capacity
    rate: u32,
    last_refill: Instant,
}

impl TokenBucket {
    /// Buckets start empty
    pub fn new(rate: u32, now: Instant) -> Self {
        Self {
            tokens: 0.0,
            rate,
            last_refill: now,
        }
    }

    /// Tokens are added at the rate of rate * time_since_last_refill
    fn add_tokens_to_bucket(&mut self, now: Instant) -> &mut Self {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let tokens_to_add = f64::from(self.rate) * elapsed.as_secs_f64();
        self.tokens = (self.tokens + tokens_to_add).clamp(0.0, f64::from(self.rate));
        self.last_refill = now;
        self
    }

    /// Settle refill at the old rate, then switch rate and capacity
    pub fn reconfigure(&mut self, rate: u32, now: Instant) {
        self.add_tokens_to_bucket(now);
        self.rate = rate;
        self.tokens = self.tokens.clamp(0.0, f64::from(rate));
    }

    /// Take one token, or report how long until one is available.
    /// A zero-rate bucket never refills and returns `None` on failure.
    pub fn try_take(&mut self, now: Instant) -> std::result::Result<(), Option<Duration>> {
        self.add_tokens_to_bucket(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return Ok(());
        }
        if self.rate == 0 {
            return Err(None);
        }
        let missing = 1.0 - self.tokens;
        Err(Some(Duration::from_secs_f64(missing / f64::from(self.rate))))
    }

    /// Return number of whole tokens, clamped to u32 range
    pub fn tokens_to_u32(&self) -> u32 {
        self.tokens.trunc().clamp(0.0, u32::MAX.into()) as u32
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }
}

#[derive(Debug)]
struct GateState {
    rate: u32,
    bucket: TokenBucket,
}

/// Built-in `RateGate`
#[derive(Debug)]
pub struct TokenBucketGate {
    state: Mutex<GateState>,
    // broadcast on every set_rate with a positive rate
    rate_raised: Notify,
}

impl Default for TokenBucketGate {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenBucketGate {
    /// Gates start closed (rate 0)
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                rate: 0,
                bucket: TokenBucket::new(0, Instant::now()),
            }),
            rate_raised: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        // nothing in the critical sections can panic halfway through an update
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn available_tokens(&self) -> u32 {
        let mut state = self.lock();
        state.bucket.add_tokens_to_bucket(Instant::now());
        state.bucket.tokens_to_u32()
    }
}

enum Admission {
    Closed,
    RefillIn(Duration),
}

#[async_trait]
impl RateGate for TokenBucketGate {
    async fn wait(&self, ctx: &WaitContext, fail_fast: bool) -> Result<()> {
        // one deadline timer for the whole call
        let done = ctx.done();
        tokio::pin!(done);

        loop {
            // Registered before the rate is read, so a set_rate landing between
            // the read and the await below still wakes us.
            let rate_raised = self.rate_raised.notified();
            tokio::pin!(rate_raised);

            let admission = {
                let mut state = self.lock();
                if state.rate == 0 {
                    if fail_fast {
                        return Err(ShareLimitError::Unavailable);
                    }
                    Admission::Closed
                } else {
                    if let Some(err) = ctx.check() {
                        return Err(err);
                    }
                    match state.bucket.try_take(Instant::now()) {
                        Ok(()) => return Ok(()),
                        Err(Some(refill)) => Admission::RefillIn(refill),
                        Err(None) => Admission::Closed,
                    }
                }
            };

            match admission {
                Admission::Closed => {
                    tokio::select! {
                        biased;
                        err = &mut done => return Err(err),
                        _ = &mut rate_raised => {}
                    }
                }
                Admission::RefillIn(refill) => {
                    // A set_rate(0) during this sleep is caught by the rate
                    // check at the top of the next iteration.
                    tokio::select! {
                        biased;
                        err = &mut done => return Err(err),
                        _ = &mut rate_raised => {}
                        _ = sleep(refill) => {}
                    }
                }
            }
        }
    }

    fn set_rate(&self, rate: u32) {
        let previous = {
            let mut state = self.lock();
            let previous = state.rate;
            state.rate = rate;
            state.bucket.reconfigure(rate, Instant::now());
            previous
        };
        if previous != rate {
            debug!(previous, rate, "Admission rate changed");
        }
        // the new rate is published before anyone is woken
        if rate > 0 {
            self.rate_raised.notify_waiters();
        }
    }

    fn rate(&self) -> u32 {
        self.lock().rate
    }
}
