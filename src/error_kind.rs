//! 错误分类词汇：定义 8 种 API 错误类型及其重试语义。
//!
//! API error taxonomy.
//!
//! Every failure that crosses the request layer is described by exactly one
//! [`ApiErrorKind`]. The kind alone decides retryability; callers never inspect
//! the original cause.
//!
//! | Kind         | Group     | Retried |
//! |--------------|-----------|---------|
//! | `network`    | transient | yes     |
//! | `timeout`    | transient | yes     |
//! | `abort`      | transient | yes, unless the caller cancelled |
//! | `server`     | transient | yes     |
//! | `client`     | terminal  | no      |
//! | `auth`       | terminal  | no      |
//! | `forbidden`  | terminal  | no      |
//! | `validation` | terminal  | no      |
//!
//! ## Example
//!
//! ```rust
//! use jlpt_api_client::error_kind::ApiErrorKind;
//!
//! let kind = ApiErrorKind::Server;
//! assert!(kind.is_transient());
//! assert_eq!(kind.name(), "server");
//! assert!(ApiErrorKind::Auth.ends_session());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Classification tag carried by every [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    /// No response was received at all
    Network,
    /// The request exceeded its configured timeout
    Timeout,
    /// The request was cancelled through its abort signal
    Abort,
    /// 5xx, or any other response without a more specific mapping
    Server,
    /// HTTP 400, or a response that does not follow the envelope contract
    Client,
    /// HTTP 401
    Auth,
    /// HTTP 403
    Forbidden,
    /// HTTP 422
    Validation,
}

impl ApiErrorKind {
    pub const ALL: [ApiErrorKind; 8] = [
        Self::Network,
        Self::Timeout,
        Self::Abort,
        Self::Server,
        Self::Client,
        Self::Auth,
        Self::Forbidden,
        Self::Validation,
    ];

    /// Returns the wire name (e.g., `"forbidden"`).
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Abort => "abort",
            Self::Server => "server",
            Self::Client => "client",
            Self::Auth => "auth",
            Self::Forbidden => "forbidden",
            Self::Validation => "validation",
        }
    }

    /// Transient kinds describe conditions that may clear up on their own.
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::Abort | Self::Server
        )
    }

    /// Terminal kinds describe defects of the request itself and are never retried.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !self.is_transient()
    }

    /// Whether this kind invalidates the current session (clear storage, back to login).
    #[inline]
    pub fn ends_session(&self) -> bool {
        matches!(self, Self::Auth | Self::Forbidden)
    }

    /// Short user-facing message used when the backend did not supply one.
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::Network => "Cannot connect to the server. Please check your network connection.",
            Self::Timeout => "The server took too long to respond. Please try again.",
            Self::Abort => "The request was cancelled.",
            Self::Server => "The server encountered an error. Please try again later.",
            Self::Client => "The request could not be processed.",
            Self::Auth => "Your session has expired. Please log in again.",
            Self::Forbidden => "You do not have permission to perform this action.",
            Self::Validation => "Some of the submitted data is invalid.",
        }
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque handle to the underlying failure. Logged, never inspected.
pub type ErrorCause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Classified API failure.
///
/// Immutable once built: the `with_*` methods consume and return a new value.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    /// Localized, user-facing text
    pub message: String,
    pub status: Option<u16>,
    /// Application error code from the response envelope, if any
    pub error_code: Option<String>,
    /// Set when an `abort` came from the caller (manual abort or superseded call)
    pub caller_cancelled: bool,
    #[source]
    pub cause: Option<ErrorCause>,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind) -> Self {
        Self {
            kind,
            message: kind.default_message().to_string(),
            status: None,
            error_code: None,
            caller_cancelled: false,
            cause: None,
        }
    }

    /// Build the `abort` error reported when a request is cancelled.
    pub fn aborted(caller_cancelled: bool) -> Self {
        let mut err = Self::new(ApiErrorKind::Abort);
        err.caller_cancelled = caller_cancelled;
        err
    }

    /// Build the `client` error reported for responses that break the envelope contract.
    pub fn unexpected_shape(details: impl Into<String>) -> Self {
        let details = details.into();
        Self::new(ApiErrorKind::Client)
            .with_message("Unexpected response shape from the server.")
            .with_cause(ShapeMismatch(details))
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Retry decision derived purely from the kind and the cancellation origin.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_transient() && !self.caller_cancelled
    }
}

#[derive(Debug, thiserror::Error)]
#[error("response shape mismatch: {0}")]
struct ShapeMismatch(String);
