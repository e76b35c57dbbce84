//! HTTP boundary.
//!
//! The request layer only relies on HTTP semantics: status, body, per-request
//! timeout, and cancellation. [`Transport`] is that contract; [`HttpTransport`]
//! implements it with reqwest, tests implement it in-process.

pub mod http;

pub use http::{HttpTransport, TransportHealthProbe};

use crate::error_kind::ApiError;
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub use reqwest::Method;

/// A fully resolved request, ready for one physical attempt.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    /// Path relative to the base URL, always starting with `/`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Per-request transport timeout; `None` uses the transport default
    pub timeout: Option<Duration>,
}

impl PreparedRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        Self {
            method,
            path,
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// What came back from one attempt, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
    /// Correlation id sent as `x-request-id`
    pub request_id: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One physical request.
///
/// `Ok` means a response arrived (any status). `Err` is reserved for
/// "no response": network failure, timeout, or cancellation, already classified.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: &PreparedRequest,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, ApiError>;
}
