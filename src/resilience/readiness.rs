//! 后端就绪门：轮询健康检查端点，所有并发调用方共享同一个探测过程。
//!
//! Backend readiness gate.
//!
//! No application traffic flows until a `GET /health` probe succeeds. The first
//! caller starts the probe sequence; everyone arriving while it runs attaches to
//! the same in-flight future, so there is exactly one physical probe loop no
//! matter how many components wait on it. The loop runs as its own task and
//! keeps going even if every waiter gives up early.
//!
//! Lifecycle: `idle → checking → ready` (terminal) or `checking → not-ready`
//! (terminal until [`ReadinessGate::reset`]). A settled gate never re-probes on
//! its own.

use crate::error_kind::ApiError;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// A single health probe. One call is one physical request.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> Result<(), ApiError>;
}

/// Pre-flight failure, reported outside the API error taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadinessError {
    #[error("backend not reachable after {attempts} health probes: {last_error}")]
    NotReachable { attempts: u32, last_error: String },
}

/// Probe loop settings. Independent of any request retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    pub health_path: String,
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub probe_timeout_ms: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            health_path: "/health".to_string(),
            max_attempts: 5,
            initial_delay_ms: 1_000,
            max_delay_ms: 10_000,
            probe_timeout_ms: 5_000,
        }
    }
}

impl ReadinessConfig {
    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    pub fn with_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay_ms = initial.as_millis() as u64;
        self.max_delay_ms = max.as_millis() as u64;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(
            self.initial_delay_ms
                .saturating_mul(factor)
                .min(self.max_delay_ms),
        )
    }
}

/// Observable gate state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReadinessState {
    pub is_ready: bool,
    pub is_checking: bool,
    pub last_check: Option<SystemTime>,
    pub error: Option<String>,
    /// Probes issued by the current (or last) sequence
    pub attempts: u32,
}

type ProbeFuture = Shared<BoxFuture<'static, Result<(), ReadinessError>>>;

struct Inner {
    state: ReadinessState,
    inflight: Option<ProbeFuture>,
    generation: u64,
}

struct GateShared {
    probe: Arc<dyn HealthProbe>,
    config: ReadinessConfig,
    inner: Mutex<Inner>,
}

impl GateShared {
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Apply a state update only if no reset happened since `generation` started.
    fn update(&self, generation: u64, f: impl FnOnce(&mut Inner)) {
        let mut inner = self.lock();
        if inner.generation == generation {
            f(&mut inner);
        }
    }
}

/// Shared readiness gate. Cheap to clone; clones observe the same state.
#[derive(Clone)]
pub struct ReadinessGate {
    shared: Arc<GateShared>,
}

impl std::fmt::Debug for ReadinessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessGate")
            .field("config", &self.shared.config)
            .field("state", &self.state())
            .finish()
    }
}

impl ReadinessGate {
    pub fn new(probe: Arc<dyn HealthProbe>, config: ReadinessConfig) -> Self {
        Self {
            shared: Arc::new(GateShared {
                probe,
                config,
                inner: Mutex::new(Inner {
                    state: ReadinessState::default(),
                    inflight: None,
                    generation: 0,
                }),
            }),
        }
    }

    /// A gate that is already open. For tests and backends without `/health`.
    pub fn always_ready() -> Self {
        struct Open;
        #[async_trait]
        impl HealthProbe for Open {
            async fn check(&self) -> Result<(), ApiError> {
                Ok(())
            }
        }
        let gate = Self::new(Arc::new(Open), ReadinessConfig::default());
        gate.shared.lock().state.is_ready = true;
        gate
    }

    pub fn config(&self) -> &ReadinessConfig {
        &self.shared.config
    }

    pub fn state(&self) -> ReadinessState {
        self.shared.lock().state.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.shared.lock().state.is_ready
    }

    /// Resolve once the backend is confirmed healthy.
    ///
    /// Ready gates return immediately. A gate that already settled as not-ready
    /// fails immediately with the recorded error until [`reset`](Self::reset).
    /// Must be called from within a tokio runtime.
    pub async fn ensure_ready(&self) -> Result<(), ReadinessError> {
        let fut = {
            let mut inner = self.shared.lock();
            if inner.state.is_ready {
                return Ok(());
            }
            match &inner.inflight {
                Some(fut) => fut.clone(),
                None => {
                    if let Some(err) = &inner.state.error {
                        return Err(ReadinessError::NotReachable {
                            attempts: inner.state.attempts,
                            last_error: err.clone(),
                        });
                    }
                    let generation = inner.generation;
                    inner.state.is_checking = true;
                    inner.state.attempts = 0;
                    let task = tokio::spawn(probe_sequence(self.shared.clone(), generation));
                    let fut = async move {
                        task.await.unwrap_or_else(|e| {
                            Err(ReadinessError::NotReachable {
                                attempts: 0,
                                last_error: format!("probe task failed: {}", e),
                            })
                        })
                    }
                    .boxed()
                    .shared();
                    inner.inflight = Some(fut.clone());
                    fut
                }
            }
        };
        fut.await
    }

    /// Forget the outcome and start over from attempt 0 on the next `ensure_ready`.
    ///
    /// A probe loop still running from before the reset keeps running for its
    /// existing waiters, but its outcome is no longer recorded.
    pub fn reset(&self) {
        let mut inner = self.shared.lock();
        inner.generation = inner.generation.wrapping_add(1);
        inner.inflight = None;
        inner.state = ReadinessState::default();
        debug!("readiness gate reset");
    }

    /// `reset` followed by `ensure_ready`.
    pub async fn recheck(&self) -> Result<(), ReadinessError> {
        self.reset();
        self.ensure_ready().await
    }
}

async fn probe_sequence(shared: Arc<GateShared>, generation: u64) -> Result<(), ReadinessError> {
    let config = shared.config.clone();
    let max_attempts = config.max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 0..max_attempts {
        let outcome = tokio::time::timeout(config.probe_timeout(), shared.probe.check()).await;
        shared.update(generation, |inner| {
            inner.state.attempts = attempt + 1;
            inner.state.last_check = Some(SystemTime::now());
        });

        match outcome {
            Ok(Ok(())) => {
                info!(attempts = attempt + 1, "backend is ready");
                shared.update(generation, |inner| {
                    inner.state.is_ready = true;
                    inner.state.is_checking = false;
                    inner.state.error = None;
                    inner.inflight = None;
                });
                return Ok(());
            }
            Ok(Err(err)) => {
                last_error = err.to_string();
            }
            Err(_) => {
                last_error = format!(
                    "health probe timed out after {}ms",
                    config.probe_timeout_ms
                );
            }
        }

        if attempt + 1 < max_attempts {
            let delay = config.delay_for_attempt(attempt);
            warn!(
                attempt = attempt + 1,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = last_error.as_str(),
                "backend not ready yet"
            );
            tokio::time::sleep(delay).await;
        }
    }

    warn!(
        attempts = max_attempts,
        error = last_error.as_str(),
        "backend not reachable, giving up"
    );
    let recorded = last_error.clone();
    shared.update(generation, |inner| {
        inner.state.is_ready = false;
        inner.state.is_checking = false;
        inner.state.error = Some(recorded);
        inner.inflight = None;
    });
    Err(ReadinessError::NotReachable {
        attempts: max_attempts,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_boot_sequence() {
        let cfg = ReadinessConfig::default();
        assert_eq!(cfg.health_path, "/health");
        assert_eq!(cfg.max_attempts, 5);
        assert_eq!(cfg.delay_for_attempt(0), Duration::from_millis(1_000));
        assert_eq!(cfg.delay_for_attempt(3), Duration::from_millis(8_000));
        assert_eq!(cfg.delay_for_attempt(4), Duration::from_millis(10_000));
    }

    #[test]
    fn max_attempts_never_zero() {
        assert_eq!(ReadinessConfig::default().with_max_attempts(0).max_attempts, 1);
    }

    #[tokio::test]
    async fn always_ready_gate_skips_probe() {
        let gate = ReadinessGate::always_ready();
        assert!(gate.ensure_ready().await.is_ok());
        assert!(gate.state().is_ready);
        assert_eq!(gate.state().attempts, 0);
    }
}
