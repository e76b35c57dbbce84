//! Retry executor with exponential backoff.
//!
//! One [`RetryExecutor`] owns at most one outstanding call. Starting a new
//! [`RetryExecutor::execute`] cancels the previous one (last call wins, not a queue).
//!
//! Per call:
//!
//! ```text
//! attempting ──ok──────────────────────────────▶ done
//!     │ err
//!     ▼
//! classifying ──terminal / budget spent──────────▶ failed
//!     │ transient
//!     ▼
//! retry-wait ──delay elapsed──▶ attempting
//!
//! any state ──cancel / overall ceiling──────────▶ aborted
//! ```
//!
//! Two timeout layers exist. The per-attempt timeout cancels only that attempt
//! and reports a retryable `abort`; the overall ceiling cancels the whole call
//! and is terminal.

use crate::error_kind::ApiError;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Retry configuration. Constructed per call site, never mutated by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Overall ceiling across all attempts
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Ceiling for a single attempt
    #[serde(default)]
    pub attempt_timeout_ms: Option<u64>,
    /// Statuses treated as transient. Empty means "trust the classifier".
    #[serde(default)]
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::interactive()
    }
}

impl RetryPolicy {
    /// Interactive UI calls: few retries, short ceilings.
    pub fn interactive() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 5_000,
            timeout_ms: Some(45_000),
            attempt_timeout_ms: Some(15_000),
            retryable_statuses: vec![408, 429, 500, 502, 503, 504],
        }
    }

    /// Bulk/report calls (exam submission, statistics export): patient.
    pub fn bulk() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 2_000,
            max_delay_ms: 30_000,
            timeout_ms: None,
            attempt_timeout_ms: Some(65_000),
            retryable_statuses: vec![502, 503, 504],
        }
    }

    /// Single attempt, no backoff.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            timeout_ms: None,
            attempt_timeout_ms: None,
            retryable_statuses: Vec::new(),
        }
    }

    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn with_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay_ms = initial.as_millis() as u64;
        self.max_delay_ms = max.as_millis() as u64;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    pub fn with_retryable_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_statuses = statuses.into_iter().collect();
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_ms.map(Duration::from_millis)
    }

    /// Checks `initial_delay <= max_delay`.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(format!(
                "initial_delay_ms ({}) must not exceed max_delay_ms ({})",
                self.initial_delay_ms, self.max_delay_ms
            ));
        }
        Ok(())
    }

    /// `min(initial_delay * 2^attempt, max_delay)`; `attempt` is 0 for the first retry.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay = self
            .initial_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(delay)
    }

    /// Whether this error deserves another attempt, ignoring the attempt budget.
    pub fn should_retry(&self, err: &Error) -> bool {
        if !err.is_retryable() {
            return false;
        }
        match err.as_api().and_then(|e| e.status) {
            Some(status) if !self.retryable_statuses.is_empty() => {
                self.retryable_statuses.contains(&status)
            }
            _ => true,
        }
    }
}

type RetryCallback = Arc<dyn Fn(u32, &Error) + Send + Sync>;
type AbortCallback = Arc<dyn Fn() + Send + Sync>;

/// Observability hooks (e.g. a UI toast). Both optional.
#[derive(Clone, Default)]
pub struct RetryHooks {
    on_retry: Option<RetryCallback>,
    on_abort: Option<AbortCallback>,
}

impl RetryHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fired before each backoff wait with the 1-based retry number.
    pub fn on_retry(mut self, f: impl Fn(u32, &Error) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Arc::new(f));
        self
    }

    /// Fired once when cancellation is the terminal outcome of a call.
    pub fn on_abort(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_abort = Some(Arc::new(f));
        self
    }

    fn retrying(&self, retry: u32, err: &Error) {
        if let Some(cb) = &self.on_retry {
            cb(retry, err);
        }
    }

    fn aborted(&self) {
        if let Some(cb) = &self.on_abort {
            cb();
        }
    }
}

impl std::fmt::Debug for RetryHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryHooks")
            .field("on_retry", &self.on_retry.is_some())
            .field("on_abort", &self.on_abort.is_some())
            .finish()
    }
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    token: Option<CancellationToken>,
}

/// Why a call stopped early.
enum Interrupt {
    Cancelled,
    Ceiling,
}

/// Exponential-backoff retry engine with last-call-wins cancellation.
#[derive(Debug)]
pub struct RetryExecutor {
    slot: Mutex<Slot>,
    hooks: RetryHooks,
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryExecutor {
    pub fn new() -> Self {
        Self::with_hooks(RetryHooks::default())
    }

    pub fn with_hooks(hooks: RetryHooks) -> Self {
        Self {
            slot: Mutex::new(Slot {
                generation: 0,
                token: None,
            }),
            hooks,
        }
    }

    /// Cancel the current call, if any. Its caller receives a non-retryable `abort`.
    pub fn abort(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(token) = slot.token.take() {
            debug!("retry executor aborted by caller");
            token.cancel();
        }
    }

    /// Whether a call is currently outstanding on this executor.
    pub fn is_busy(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .token
            .is_some()
    }

    fn begin(&self) -> (u64, CancellationToken) {
        let mut slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(previous) = slot.token.take() {
            debug!("superseding in-flight call");
            previous.cancel();
        }
        slot.generation = slot.generation.wrapping_add(1);
        let token = CancellationToken::new();
        slot.token = Some(token.clone());
        (slot.generation, token)
    }

    fn finish(&self, generation: u64) {
        let mut slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        if slot.generation == generation {
            slot.token = None;
        }
    }

    /// Run `operation` until it succeeds, fails terminally, runs out of retries,
    /// or is cancelled.
    ///
    /// The operation receives a cancellation token scoped to one attempt and should
    /// hand it to its I/O. An operation that ignores it is simply no longer awaited.
    pub async fn execute<T, F, Fut>(&self, policy: &RetryPolicy, operation: F) -> Result<T>
    where
        F: FnMut(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_after(policy, std::future::ready(Ok(())), operation)
            .await
    }

    /// Like [`execute`](Self::execute), but claims this executor before awaiting
    /// `preflight` (e.g. the readiness gate).
    ///
    /// An `abort()` or a newer call arriving during the preflight wait cancels
    /// this call before any attempt is made. A preflight error is returned as is.
    /// The overall ceiling starts once the preflight has completed.
    pub async fn execute_after<T, P, F, Fut>(
        &self,
        policy: &RetryPolicy,
        preflight: P,
        mut operation: F,
    ) -> Result<T>
    where
        P: Future<Output = Result<()>>,
        F: FnMut(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let (generation, token) = self.begin();
        let result = async {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(Stop::Interrupted(Interrupt::Cancelled)),
                r = preflight => r.map_err(Stop::Failed)?,
            }
            let deadline = policy.timeout().map(|t| Instant::now() + t);
            self.run(policy, &mut operation, &token, deadline).await
        }
        .await
        .map_err(|stop| match stop {
            Stop::Failed(err) => err,
            Stop::Interrupted(interrupt) => {
                token.cancel();
                self.hooks.aborted();
                let caller = matches!(interrupt, Interrupt::Cancelled);
                if !caller {
                    warn!(
                        timeout_ms = policy.timeout_ms.unwrap_or_default(),
                        "overall request ceiling elapsed"
                    );
                }
                Error::Api(ApiError::aborted(caller))
            }
        });
        self.finish(generation);
        result
    }

    async fn run<T, F, Fut>(
        &self,
        policy: &RetryPolicy,
        operation: &mut F,
        token: &CancellationToken,
        deadline: Option<Instant>,
    ) -> std::result::Result<T, Stop>
    where
        F: FnMut(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            if token.is_cancelled() {
                return Err(Stop::Interrupted(Interrupt::Cancelled));
            }

            let attempt_token = token.child_token();
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(Stop::Interrupted(Interrupt::Cancelled)),
                _ = sleep_until(deadline) => return Err(Stop::Interrupted(Interrupt::Ceiling)),
                r = attempt_once(operation(attempt_token.clone()), &attempt_token, policy.attempt_timeout()) => r,
            };

            let err = match outcome {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(attempt, "request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !policy.should_retry(&err) || attempt >= policy.max_retries {
                debug!(attempt, error = %err, "giving up");
                return Err(Stop::Failed(err));
            }

            let delay = policy.delay_for_attempt(attempt);
            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "request failed, retrying"
            );
            self.hooks.retrying(attempt + 1, &err);

            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(Stop::Interrupted(Interrupt::Cancelled)),
                _ = sleep_until(deadline) => return Err(Stop::Interrupted(Interrupt::Ceiling)),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt = attempt.saturating_add(1);
        }
    }
}

enum Stop {
    Failed(Error),
    Interrupted(Interrupt),
}

async fn attempt_once<T, Fut>(
    fut: Fut,
    attempt_token: &CancellationToken,
    timeout: Option<Duration>,
) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match timeout {
        Some(t) => match tokio::time::timeout(t, fut).await {
            Ok(r) => r,
            Err(_) => {
                attempt_token.cancel();
                debug!(timeout_ms = t.as_millis() as u64, "attempt timed out");
                Err(Error::Api(ApiError::aborted(false)))
            }
        },
        None => fut.await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending::<()>().await,
    }
}
