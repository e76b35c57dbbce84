//! Error classification logic

use crate::error_kind::{ApiError, ApiErrorKind};

/// Transport-level facts about a failed request, before classification.
///
/// Built by the transport from whatever it observed; the classifier never looks
/// at anything else.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureSignal {
    /// HTTP status, if a response was received
    pub status: Option<u16>,
    /// The request hit its configured timeout
    pub timed_out: bool,
    /// The request was cancelled through its abort signal
    pub aborted: bool,
    /// The cancellation came from the caller rather than a timer
    pub caller_cancelled: bool,
}

impl FailureSignal {
    /// A response arrived with a non-success status.
    pub fn status(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Nothing came back (connection refused, DNS, reset, ...).
    pub fn no_response() -> Self {
        Self::default()
    }

    pub fn timed_out() -> Self {
        Self {
            timed_out: true,
            ..Self::default()
        }
    }

    pub fn aborted(caller_cancelled: bool) -> Self {
        Self {
            aborted: true,
            caller_cancelled,
            ..Self::default()
        }
    }
}

impl From<&reqwest::Error> for FailureSignal {
    fn from(err: &reqwest::Error) -> Self {
        Self {
            status: err.status().map(|s| s.as_u16()),
            timed_out: err.is_timeout(),
            aborted: false,
            caller_cancelled: false,
        }
    }
}

/// Map a failure to exactly one [`ApiErrorKind`]. First matching rule wins.
///
/// Total and deterministic: same signal, same kind.
pub fn classify_kind(signal: &FailureSignal) -> ApiErrorKind {
    if signal.status.is_none() && !signal.timed_out && !signal.aborted {
        return ApiErrorKind::Network;
    }
    if signal.aborted {
        return ApiErrorKind::Abort;
    }
    match signal.status {
        Some(400) => ApiErrorKind::Client,
        Some(401) => ApiErrorKind::Auth,
        Some(403) => ApiErrorKind::Forbidden,
        Some(422) => ApiErrorKind::Validation,
        Some(500) | Some(502) | Some(503) | Some(504) => ApiErrorKind::Server,
        _ if signal.timed_out => ApiErrorKind::Timeout,
        _ => ApiErrorKind::Server,
    }
}

/// Classify a failure into a full [`ApiError`] carrying the default localized message.
pub fn classify(signal: &FailureSignal) -> ApiError {
    let mut err = ApiError::new(classify_kind(signal));
    err.status = signal.status;
    err.caller_cancelled = signal.aborted && signal.caller_cancelled;
    err
}

/// Classify a reqwest failure, keeping it as the opaque cause.
pub(crate) fn classify_reqwest(err: reqwest::Error) -> ApiError {
    let signal = FailureSignal::from(&err);
    classify(&signal).with_cause(err)
}
