//! 弹性模式模块：提供指数退避重试执行器和后端就绪门。
//!
//! # Resilience Primitives Module
//!
//! Two primitives keep the request layer well-behaved while the backend is
//! slow, restarting, or briefly unavailable.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`retry`] | Exponential-backoff retry executor with cancellation and two timeout layers |
//! | [`readiness`] | Shared backend readiness gate polling `/health` before any traffic |
//!
//! ## Retry Executor
//!
//! ```rust,no_run
//! use jlpt_api_client::resilience::retry::{RetryExecutor, RetryPolicy};
//!
//! # async fn demo() -> jlpt_api_client::Result<()> {
//! let executor = RetryExecutor::new();
//! let policy = RetryPolicy::interactive().with_max_retries(2);
//! let value = executor
//!     .execute(&policy, |_cancel| async { Ok::<_, jlpt_api_client::Error>(42) })
//!     .await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```
//!
//! ## Readiness Gate
//!
//! Every [`crate::ApiClient`] call awaits its gate first. Concurrent callers
//! share one probe sequence and observe the same outcome.

pub mod readiness;
pub mod retry;

pub use readiness::{HealthProbe, ReadinessConfig, ReadinessError, ReadinessGate, ReadinessState};
pub use retry::{RetryExecutor, RetryHooks, RetryPolicy};
