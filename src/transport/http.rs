use super::{PreparedRequest, RawResponse, Transport};
use crate::client::error_classification::{classify, classify_reqwest, FailureSignal};
use crate::error_kind::ApiError;
use crate::resilience::readiness::HealthProbe;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use reqwest::Proxy;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Build a transport for `base_url` with a default per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let parsed = url::Url::parse(base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("Invalid base URL '{}': {}", base_url, e),
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_source("http_transport"),
            )
        })?;

        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(
                env::var("JLPT_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(16),
            )
            .pool_idle_timeout(Some(Duration::from_secs(90)));

        if let Ok(proxy_url) = env::var("JLPT_PROXY_URL") {
            if let Ok(proxy) = Proxy::all(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        let client = builder.build().map_err(|e| {
            Error::configuration_with_context(
                format!("Failed to build HTTP client: {}", e),
                ErrorContext::new().with_source("http_transport"),
            )
        })?;

        Ok(Self {
            client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn perform(
        &self,
        request: &PreparedRequest,
        request_id: &str,
    ) -> std::result::Result<RawResponse, ApiError> {
        let url = self.url_for(&request.path);
        let mut req = self
            .client
            .request(request.method.clone(), &url)
            .header("x-request-id", request_id);

        for (k, v) in &request.headers {
            req = req.header(k.as_str(), v.as_str());
        }
        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        if let Some(body) = &request.body {
            req = req.json(body);
        }
        if let Some(t) = request.timeout {
            req = req.timeout(t);
        }

        let resp = req.send().await.map_err(classify_reqwest)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(classify_reqwest)?;

        Ok(RawResponse {
            status,
            body,
            request_id: request_id.to_string(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &PreparedRequest,
        cancel: &CancellationToken,
    ) -> std::result::Result<RawResponse, ApiError> {
        let request_id = Uuid::new_v4().to_string();
        let start = std::time::Instant::now();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(classify(&FailureSignal::aborted(false))),
            r = self.perform(request, &request_id) => r,
        };

        match &outcome {
            Ok(resp) => debug!(
                method = %request.method,
                path = request.path.as_str(),
                http_status = resp.status,
                request_id = request_id.as_str(),
                duration_ms = start.elapsed().as_millis() as u64,
                "jlpt-api request completed"
            ),
            Err(err) => debug!(
                method = %request.method,
                path = request.path.as_str(),
                kind = err.kind.name(),
                request_id = request_id.as_str(),
                duration_ms = start.elapsed().as_millis() as u64,
                "jlpt-api request got no response"
            ),
        }
        outcome
    }
}

/// Health probe issuing `GET <health_path>` through any [`Transport`].
///
/// Only HTTP 200 counts as healthy.
pub struct TransportHealthProbe {
    transport: Arc<dyn Transport>,
    path: String,
    timeout: Duration,
}

impl TransportHealthProbe {
    pub fn new(transport: Arc<dyn Transport>, path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            transport,
            path: path.into(),
            timeout,
        }
    }
}

#[async_trait]
impl HealthProbe for TransportHealthProbe {
    async fn check(&self) -> std::result::Result<(), ApiError> {
        let mut request = PreparedRequest::get(self.path.clone());
        request.timeout = Some(self.timeout);
        let resp = self
            .transport
            .send(&request, &CancellationToken::new())
            .await?;
        if resp.status == 200 {
            Ok(())
        } else {
            Err(classify(&FailureSignal::status(resp.status)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_base_url() {
        let err = HttpTransport::new("not a url", Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn joins_paths_without_double_slash() {
        let t = HttpTransport::new("http://localhost:8080/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(t.base_url(), "http://localhost:8080/api");
        assert_eq!(t.url_for("/health"), "http://localhost:8080/api/health");
    }

    #[test]
    fn prepared_request_normalizes_leading_slash() {
        assert_eq!(PreparedRequest::get("exams/1").path, "/exams/1");
        assert_eq!(PreparedRequest::get("/exams/1").path, "/exams/1");
    }
}
