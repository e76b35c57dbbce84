//! End-to-end client behavior against a local mockito server.

use jlpt_api_client::session::{SESSION_KEYS, TOKEN_KEY, USER_KEY};
use jlpt_api_client::{
    ApiClient, ApiErrorKind, Error, InMemorySessionStore, ReadinessConfig, RequestDescriptor,
    RetryHooks, RetryPolicy, SessionSignal, SessionStore,
};
use jlpt_api_client::client::InMemorySignalSink;
use mockito::Matcher;
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize, PartialEq)]
struct Exam {
    id: u32,
}

fn envelope(data: serde_json::Value) -> String {
    json!({"success": true, "data": data, "timestamp": 1_700_000_000_000u64}).to_string()
}

fn quick_policy() -> RetryPolicy {
    RetryPolicy::none()
        .with_max_retries(3)
        .with_delays(Duration::from_millis(10), Duration::from_millis(50))
}

/// Session store that counts `clear_session` calls.
#[derive(Default)]
struct CountingStore {
    inner: InMemorySessionStore,
    clears: AtomicU32,
}

impl SessionStore for CountingStore {
    fn get_value(&self, key: &str) -> Option<String> {
        self.inner.get_value(key)
    }
    fn set_value(&self, key: &str, value: &str) {
        self.inner.set_value(key, value)
    }
    fn remove_value(&self, key: &str) {
        self.inner.remove_value(key)
    }
    fn clear_session(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
        for key in SESSION_KEYS {
            self.remove_value(key);
        }
    }
}

#[tokio::test]
async fn transient_503s_are_retried_until_success() {
    let mut server = mockito::Server::new_async().await;
    let failing = server
        .mock("GET", "/exams/1")
        .with_status(503)
        .with_body("Service Unavailable")
        .expect(2)
        .create_async()
        .await;
    let ok = server
        .mock("GET", "/exams/1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(envelope(json!({"id": 1})))
        .expect(1)
        .create_async()
        .await;

    let retries = Arc::new(AtomicU32::new(0));
    let counter = retries.clone();
    let client = ApiClient::builder()
        .base_url(server.url())
        .assume_ready()
        .default_policy(quick_policy())
        .retry_hooks(RetryHooks::new().on_retry(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .build()
        .unwrap();

    let exam: Exam = client.get("/exams/1").await.unwrap();

    assert_eq!(exam, Exam { id: 1 });
    assert_eq!(retries.load(Ordering::SeqCst), 2);
    failing.assert_async().await;
    ok.assert_async().await;
}

#[tokio::test]
async fn unauthorized_clears_session_once_without_retry() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/users/me")
        .match_header("authorization", "Bearer expired-token")
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"success": false, "data": null, "message": "Token expired", "errorCode": "AUTH_EXPIRED", "timestamp": 1})
                .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let store = Arc::new(CountingStore::default());
    store.set_token("expired-token");
    store.set_value(USER_KEY, r#"{"id":3}"#);
    let signals = Arc::new(InMemorySignalSink::new());

    let client = ApiClient::builder()
        .base_url(server.url())
        .assume_ready()
        .default_policy(quick_policy())
        .session_store(store.clone())
        .signal_sink(signals.clone())
        .build()
        .unwrap();

    let err = client
        .get::<serde_json::Value>("/users/me")
        .await
        .unwrap_err();

    let api = err.as_api().unwrap();
    assert_eq!(api.kind, ApiErrorKind::Auth);
    assert_eq!(api.status, Some(401));
    assert_eq!(api.message, "Token expired");
    assert_eq!(api.error_code.as_deref(), Some("AUTH_EXPIRED"));
    assert!(!err.is_retryable());

    assert_eq!(store.clears.load(Ordering::SeqCst), 1);
    assert!(store.get_value(TOKEN_KEY).is_none());
    assert!(store.get_value(USER_KEY).is_none());
    assert_eq!(
        signals.signals(),
        vec![SessionSignal::LoginRequired {
            kind: ApiErrorKind::Auth,
            status: Some(401),
        }]
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn unreachable_backend_blocks_calls_until_reset() {
    let mut server = mockito::Server::new_async().await;
    let unhealthy = server
        .mock("GET", "/health")
        .with_status(503)
        .expect(5)
        .create_async()
        .await;
    let exams = server
        .mock("GET", "/exams")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(envelope(json!([{"id": 1}, {"id": 2}])))
        .expect(1)
        .create_async()
        .await;

    let client = ApiClient::builder()
        .base_url(server.url())
        .readiness(
            ReadinessConfig::default()
                .with_delays(Duration::from_millis(5), Duration::from_millis(20))
                .with_probe_timeout(Duration::from_secs(2)),
        )
        .default_policy(RetryPolicy::none())
        .build()
        .unwrap();

    let err = client.get::<Vec<Exam>>("/exams").await.unwrap_err();
    assert!(matches!(err, Error::NotReady(_)));
    assert!(err.user_message().contains("starting up"));
    assert!(err.as_api().is_none());
    unhealthy.assert_async().await;

    let state = client.gate().state();
    assert!(!state.is_ready);
    assert_eq!(state.attempts, 5);

    let healthy = server
        .mock("GET", "/health")
        .with_status(200)
        .with_body("OK")
        .expect(1)
        .create_async()
        .await;
    client.gate().reset();

    let list: Vec<Exam> = client.get("/exams").await.unwrap();
    assert_eq!(list, vec![Exam { id: 1 }, Exam { id: 2 }]);
    assert!(client.gate().is_ready());
    healthy.assert_async().await;
    exams.assert_async().await;
}

#[tokio::test]
async fn application_failure_is_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/exams/7/start")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"success": false, "data": null, "message": "Exam is closed", "errorCode": "EXAM_CLOSED", "timestamp": 1})
                .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let client = ApiClient::builder()
        .base_url(server.url())
        .assume_ready()
        .default_policy(quick_policy())
        .build()
        .unwrap();

    let err = client
        .call::<serde_json::Value>(RequestDescriptor::post("/exams/7/start"))
        .await
        .unwrap_err();
    match err {
        Error::Application {
            message,
            error_code,
            ..
        } => {
            assert_eq!(message, "Exam is closed");
            assert_eq!(error_code.as_deref(), Some("EXAM_CLOSED"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn completed_submission_is_accepted_as_success() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/exams/7/submit")
        .match_header("authorization", "Bearer tok-123")
        .match_header("x-request-id", Matcher::Any)
        .match_body(Matcher::Json(json!({"answers": {"1": "B"}})))
        .with_status(409)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"success": false, "data": {"id": 7}, "message": "Exam already submitted", "timestamp": 1})
                .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let client = ApiClient::builder()
        .base_url(server.url())
        .assume_ready()
        .default_policy(quick_policy())
        .session_store(Arc::new(InMemorySessionStore::with_token("tok-123")))
        .build()
        .unwrap();

    let request = RequestDescriptor::post("exams/7/submit")
        .json(&json!({"answers": {"1": "B"}}))
        .unwrap()
        .accept_completed(|f| f.status == 409 && f.message_contains("already submitted"));
    let exam: Exam = client.call(request).await.unwrap();

    assert_eq!(exam, Exam { id: 7 });
    mock.assert_async().await;
}

#[tokio::test]
async fn non_envelope_success_body_is_a_client_error() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/exams/1")
        .with_status(200)
        .with_body(r#"{"id": 1}"#)
        .expect(1)
        .create_async()
        .await;

    let client = ApiClient::builder()
        .base_url(server.url())
        .assume_ready()
        .default_policy(quick_policy())
        .build()
        .unwrap();

    let err = client.get::<Exam>("/exams/1").await.unwrap_err();
    assert_eq!(err.as_api().map(|e| e.kind), Some(ApiErrorKind::Client));
    mock.assert_async().await;
}
