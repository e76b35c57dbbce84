use crate::client::request::RequestDescriptor;
use crate::client::signals::{SessionSignal, SessionSignalSink};
use crate::client::validation::decode_response;
use crate::error_kind::ApiError;
use crate::resilience::readiness::ReadinessGate;
use crate::resilience::retry::{RetryExecutor, RetryHooks, RetryPolicy};
use crate::session::SessionStore;
use crate::transport::Transport;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{info, warn};

/// Authenticated request facade.
///
/// Every call waits on the readiness gate, attaches the bearer token, runs
/// through a retry executor, validates the envelope and returns the unwrapped
/// `data`. `auth`/`forbidden` responses end the session.
pub struct ApiClient {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) gate: ReadinessGate,
    pub(crate) session: Arc<dyn SessionStore>,
    pub(crate) signals: Arc<dyn SessionSignalSink>,
    pub(crate) default_policy: RetryPolicy,
    pub(crate) hooks: RetryHooks,
}

impl ApiClient {
    pub fn builder() -> crate::client::builder::ApiClientBuilder {
        crate::client::builder::ApiClientBuilder::new()
    }

    pub fn gate(&self) -> &ReadinessGate {
        &self.gate
    }

    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.session
    }

    pub fn default_policy(&self) -> &RetryPolicy {
        &self.default_policy
    }

    /// A fresh executor carrying this client's hooks, for use with [`call_with`](Self::call_with).
    pub fn executor(&self) -> RetryExecutor {
        RetryExecutor::with_hooks(self.hooks.clone())
    }

    /// Perform one logical call on its own executor.
    ///
    /// Independent calls never cancel each other.
    pub async fn call<T: DeserializeOwned>(&self, request: RequestDescriptor) -> Result<T> {
        let executor = self.executor();
        self.call_with(&executor, request).await
    }

    /// Perform a call on a shared executor: starting it cancels whatever that
    /// executor was still running (last call wins), including a call still
    /// waiting on the readiness gate.
    pub async fn call_with<T: DeserializeOwned>(
        &self,
        executor: &RetryExecutor,
        request: RequestDescriptor,
    ) -> Result<T> {
        let policy = request
            .policy
            .clone()
            .unwrap_or_else(|| self.default_policy.clone());
        let attempt_timeout = policy.attempt_timeout();

        let transport = &self.transport;
        let session = &self.session;
        let request = &request;
        let gate = &self.gate;
        let result = executor
            .execute_after(
                &policy,
                async move { gate.ensure_ready().await.map_err(Error::from) },
                move |cancel| async move {
                    let token = session.get_token();
                    let prepared = request.prepare(token.as_deref(), attempt_timeout);
                    let raw = transport.send(&prepared, &cancel).await?;
                    decode_response::<T>(
                        &raw,
                        request.accept_completed.as_ref(),
                        request.aliases.as_ref(),
                    )
                },
            )
            .await;

        if let Err(Error::Api(err)) = &result {
            if err.kind.ends_session() {
                self.end_session(err, &request.path).await;
            } else {
                warn!(
                    path = request.path.as_str(),
                    kind = err.kind.name(),
                    status = err.status.unwrap_or_default(),
                    cause = ?err.cause,
                    "jlpt-api call failed"
                );
            }
        }
        result
    }

    /// `GET path` with the default policy.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.call(RequestDescriptor::get(path)).await
    }

    async fn end_session(&self, err: &ApiError, path: &str) {
        info!(
            path,
            kind = err.kind.name(),
            status = err.status.unwrap_or_default(),
            "session rejected by backend, clearing session"
        );
        self.session.clear_session();
        self.signals
            .emit(SessionSignal::LoginRequired {
                kind: err.kind,
                status: err.status,
            })
            .await;
    }
}
