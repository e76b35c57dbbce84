//! # jlpt-api-client
//!
//! JLPT 学习平台的弹性 API 请求层：就绪门、指数退避重试、响应信封校验与错误分类。
//!
//! Resilient request layer for the JLPT study platform backend.
//!
//! ## Overview
//!
//! Every call made through [`ApiClient`] goes through the same pipeline:
//!
//! 1. wait on the shared [`ReadinessGate`] until `/health` answers 200
//! 2. attach the bearer token from the [`SessionStore`]
//! 3. run the request through a [`RetryExecutor`] with exponential backoff
//! 4. validate the `{ success, data, message, errorCode, timestamp }` envelope
//! 5. return the unwrapped, typed `data`
//!
//! Failures are normalized into an [`ApiError`] carrying one [`ApiErrorKind`].
//! `network`, `timeout`, `abort` and `server` are transient; `client`, `auth`,
//! `forbidden` and `validation` are terminal. `auth` and `forbidden` also end
//! the session.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jlpt_api_client::{ApiClient, RequestDescriptor, RetryPolicy};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Exam {
//!     id: u64,
//!     title: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> jlpt_api_client::Result<()> {
//!     let client = ApiClient::builder()
//!         .base_url("http://localhost:8080/api")
//!         .build()?;
//!
//!     let exams: Vec<Exam> = client.get("/exams").await?;
//!
//!     let imported: serde_json::Value = client
//!         .call(
//!             RequestDescriptor::post("/admin/questions/import")
//!                 .body(serde_json::json!({ "level": "N3" }))
//!                 .policy(RetryPolicy::bulk()),
//!         )
//!         .await?;
//!     # let _ = (exams, imported);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Request facade, builder, classifier and session signals |
//! | [`resilience`] | Retry executor and readiness gate |
//! | [`envelope`] | Response envelope shape and validation |
//! | [`error_kind`] | Error taxonomy and the normalized [`ApiError`] |
//! | [`transport`] | HTTP transport abstraction over `reqwest` |
//! | [`session`] | Token and user persistence |
//! | [`config`] | Environment and YAML configuration |
//! | [`telemetry`] | Tracing subscriber bootstrap |
//! | [`utils`] | Payload field normalization |

pub mod client;
pub mod config;
pub mod envelope;
pub mod error_kind;
pub mod resilience;
pub mod session;
pub mod telemetry;
pub mod transport;
pub mod utils;

pub use client::{
    ApiClient, ApiClientBuilder, CompletionPredicate, RequestDescriptor, SessionSignal,
    SessionSignalSink,
};
pub use config::ClientConfig;
pub use envelope::{ApiResponse, ApplicationFailure};
pub use error_kind::{ApiError, ApiErrorKind};
pub use resilience::{
    HealthProbe, ReadinessConfig, ReadinessError, ReadinessGate, ReadinessState, RetryExecutor,
    RetryHooks, RetryPolicy,
};
pub use session::{InMemorySessionStore, KeyringSessionStore, SessionStore};
pub use utils::FieldAliases;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
