use crate::error_kind::ApiError;
use crate::resilience::readiness::ReadinessError;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "base_url", "default_policy.max_delay_ms")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "config_loader", "policy_validator")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the request layer.
///
/// `Api` is the classified transport/HTTP failure. Everything else is reported
/// outside that taxonomy on purpose: application failures come from a well-formed
/// envelope, `NotReady` is a pre-flight condition, `Configuration` is fatal at startup.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Application error (HTTP {status}): {message}")]
    Application {
        status: u16,
        message: String,
        error_code: Option<String>,
    },

    #[error("Backend not ready: {0}")]
    NotReady(#[from] ReadinessError),

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// The classified API error, if this is one.
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            Error::Api(e) => Some(e),
            _ => None,
        }
    }

    /// Only transient, non-cancelled API errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        self.as_api().map(ApiError::is_retryable).unwrap_or(false)
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Text suitable for showing to the user; technical detail stays in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Error::Api(e) => e.message.clone(),
            Error::Application { message, .. } => message.clone(),
            Error::NotReady(_) => "The system is starting up. Please wait a moment.".to_string(),
            Error::Configuration { .. } | Error::Io(_) | Error::Serialization(_) => {
                "The application is not configured correctly.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_kind::ApiErrorKind;

    #[test]
    fn only_transient_api_errors_are_retryable() {
        assert!(Error::from(ApiError::new(ApiErrorKind::Network)).is_retryable());
        assert!(!Error::from(ApiError::new(ApiErrorKind::Auth)).is_retryable());
        let app = Error::Application {
            status: 200,
            message: "quota".into(),
            error_code: None,
        };
        assert!(!app.is_retryable());
    }

    #[test]
    fn configuration_error_displays_context() {
        let err = Error::configuration_with_context(
            "base URL is required",
            ErrorContext::new()
                .with_field_path("base_url")
                .with_source("config_loader"),
        );
        assert_eq!(
            err.to_string(),
            "Configuration error: base URL is required (field: base_url, source: config_loader)"
        );
        assert!(err.context().is_some());
    }

    #[test]
    fn not_ready_has_distinct_user_message() {
        let err = Error::from(ReadinessError::NotReachable {
            attempts: 5,
            last_error: "connection refused".into(),
        });
        assert!(err.user_message().contains("starting up"));
    }
}
