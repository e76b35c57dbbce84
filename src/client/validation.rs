//! 响应解码：状态码分类、信封校验、解包 `data`。
//!
//! Response decoding for one attempt.

use crate::client::error_classification::{classify, FailureSignal};
use crate::client::request::CompletionPredicate;
use crate::envelope::{is_valid_envelope, parse_envelope, ApplicationFailure};
use crate::error_kind::ApiError;
use crate::transport::RawResponse;
use crate::utils::normalize::FieldAliases;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Turn a raw response into the unwrapped, typed `data` payload.
///
/// - non-2xx: classified by status; an envelope body contributes its message and code
/// - 2xx but not an envelope: `client` error, never retried
/// - envelope with `success: false`: [`Error::Application`]
///
/// In both failure-with-envelope cases `accept` may declare the outcome a success.
pub(crate) fn decode_response<T: DeserializeOwned>(
    raw: &RawResponse,
    accept: Option<&CompletionPredicate>,
    aliases: Option<&FieldAliases>,
) -> Result<T> {
    let json: Option<Value> = serde_json::from_str(&raw.body).ok();

    if !raw.is_success() {
        let failure = json
            .filter(is_valid_envelope)
            .and_then(|v| parse_envelope(v).ok())
            .map(|env| ApplicationFailure::from_envelope(raw.status, env));

        if let Some(failure) = failure {
            if accepts(accept, &failure) {
                debug!(http_status = raw.status, "error response accepted as completed");
                return unwrap_data(failure.data, aliases);
            }
            let mut err = classify(&FailureSignal::status(raw.status));
            if let Some(message) = failure.message.filter(|m| !m.trim().is_empty()) {
                err = err.with_message(message);
            }
            if let Some(code) = failure.error_code {
                err = err.with_error_code(code);
            }
            return Err(err.into());
        }
        return Err(classify(&FailureSignal::status(raw.status)).into());
    }

    let value = json.ok_or_else(|| ApiError::unexpected_shape("body is not JSON"))?;
    let envelope = parse_envelope(value)?;

    if !envelope.success {
        let failure = ApplicationFailure::from_envelope(raw.status, envelope);
        if accepts(accept, &failure) {
            debug!(http_status = raw.status, "application failure accepted as completed");
            return unwrap_data(failure.data, aliases);
        }
        return Err(Error::Application {
            status: raw.status,
            message: failure
                .message
                .unwrap_or_else(|| "The request was rejected.".to_string()),
            error_code: failure.error_code,
        });
    }

    unwrap_data(envelope.data, aliases)
}

fn accepts(accept: Option<&CompletionPredicate>, failure: &ApplicationFailure) -> bool {
    accept.map(|pred| pred(failure)).unwrap_or(false)
}

fn unwrap_data<T: DeserializeOwned>(data: Value, aliases: Option<&FieldAliases>) -> Result<T> {
    let data = match aliases {
        Some(a) => a.normalize(data),
        None => data,
    };
    serde_json::from_value(data)
        .map_err(|e| Error::Api(ApiError::unexpected_shape(format!("data: {}", e))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_kind::ApiErrorKind;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Arc;

    fn raw(status: u16, body: Value) -> RawResponse {
        RawResponse {
            status,
            body: body.to_string(),
            request_id: "test".into(),
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: u32,
    }

    #[test]
    fn unwraps_data_on_success() {
        let r = raw(200, json!({"success": true, "data": {"id": 1}, "timestamp": 123}));
        let item: Item = decode_response(&r, None, None).unwrap();
        assert_eq!(item, Item { id: 1 });
    }

    #[test]
    fn non_envelope_success_is_client_error() {
        let r = raw(200, json!({"id": 1}));
        let err = decode_response::<Item>(&r, None, None).unwrap_err();
        assert_eq!(err.as_api().map(|e| e.kind), Some(ApiErrorKind::Client));
        assert!(!err.is_retryable());

        let r = RawResponse {
            status: 200,
            body: "<html>".into(),
            request_id: "x".into(),
        };
        let err = decode_response::<Item>(&r, None, None).unwrap_err();
        assert_eq!(err.as_api().map(|e| e.kind), Some(ApiErrorKind::Client));
    }

    #[test]
    fn success_false_is_application_error() {
        let r = raw(
            200,
            json!({"success": false, "data": null, "message": "Quota exceeded", "errorCode": "Q1", "timestamp": 1}),
        );
        match decode_response::<Option<Item>>(&r, None, None).unwrap_err() {
            Error::Application {
                status,
                message,
                error_code,
            } => {
                assert_eq!(status, 200);
                assert_eq!(message, "Quota exceeded");
                assert_eq!(error_code.as_deref(), Some("Q1"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn error_status_uses_envelope_message() {
        let r = raw(
            422,
            json!({"success": false, "data": null, "message": "Email không hợp lệ", "errorCode": "INVALID_EMAIL", "timestamp": 1}),
        );
        let err = decode_response::<Item>(&r, None, None).unwrap_err();
        let api = err.as_api().unwrap();
        assert_eq!(api.kind, ApiErrorKind::Validation);
        assert_eq!(api.status, Some(422));
        assert_eq!(api.message, "Email không hợp lệ");
        assert_eq!(api.error_code.as_deref(), Some("INVALID_EMAIL"));
    }

    #[test]
    fn error_status_without_envelope_uses_default_message() {
        let r = RawResponse {
            status: 503,
            body: "Service Unavailable".into(),
            request_id: "x".into(),
        };
        let err = decode_response::<Item>(&r, None, None).unwrap_err();
        let api = err.as_api().unwrap();
        assert_eq!(api.kind, ApiErrorKind::Server);
        assert_eq!(api.message, ApiErrorKind::Server.default_message());
    }

    #[test]
    fn completion_predicate_turns_failure_into_success() {
        let accept: CompletionPredicate =
            Arc::new(|f: &ApplicationFailure| f.message_contains("đã nộp bài"));
        let r = raw(
            409,
            json!({"success": false, "data": {"id": 9}, "message": "Bạn đã nộp bài", "timestamp": 1}),
        );
        let item: Item = decode_response(&r, Some(&accept), None).unwrap();
        assert_eq!(item.id, 9);

        let r = raw(
            200,
            json!({"success": false, "data": {"id": 4}, "message": "Bạn đã nộp bài", "timestamp": 1}),
        );
        let item: Item = decode_response(&r, Some(&accept), None).unwrap();
        assert_eq!(item.id, 4);

        let r = raw(
            409,
            json!({"success": false, "data": null, "message": "Conflict", "timestamp": 1}),
        );
        let err = decode_response::<Option<Item>>(&r, Some(&accept), None).unwrap_err();
        assert_eq!(err.as_api().map(|e| e.kind), Some(ApiErrorKind::Server));
    }

    #[test]
    fn aliases_apply_before_deserializing() {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Question {
            correct_answer: String,
        }
        let aliases = FieldAliases::new().alias("correctAnswer", &["correct_answer"]);
        let r = raw(
            200,
            json!({"success": true, "data": [{"correct_answer": "A"}], "timestamp": 1}),
        );
        let qs: Vec<Question> = decode_response(&r, None, Some(&aliases)).unwrap();
        assert_eq!(qs[0].correct_answer, "A");
    }
}
