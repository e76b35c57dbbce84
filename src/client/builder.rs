use crate::client::core::ApiClient;
use crate::client::signals::SessionSignalSink;
use crate::config::ClientConfig;
use crate::resilience::readiness::{HealthProbe, ReadinessConfig, ReadinessGate};
use crate::resilience::retry::{RetryHooks, RetryPolicy};
use crate::session::{InMemorySessionStore, SessionStore};
use crate::transport::{HttpTransport, Transport, TransportHealthProbe};
use crate::{Error, ErrorContext, Result};
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`ApiClient`].
///
/// Keep this surface area small and predictable (developer-friendly).
pub struct ApiClientBuilder {
    base_url: Option<String>,
    request_timeout: Duration,
    readiness: ReadinessConfig,
    default_policy: RetryPolicy,
    transport: Option<Arc<dyn Transport>>,
    probe: Option<Arc<dyn HealthProbe>>,
    gate: Option<ReadinessGate>,
    session: Option<Arc<dyn SessionStore>>,
    signals: Arc<dyn SessionSignalSink>,
    hooks: RetryHooks,
}

impl ApiClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            request_timeout: Duration::from_secs(30),
            readiness: ReadinessConfig::default(),
            default_policy: RetryPolicy::interactive(),
            transport: None,
            probe: None,
            gate: None,
            session: None,
            signals: crate::client::signals::noop_sink(),
            hooks: RetryHooks::default(),
        }
    }

    /// Start from a loaded configuration.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new()
            .base_url(config.base_url.clone())
            .request_timeout(Duration::from_millis(config.request_timeout_ms))
            .readiness(config.readiness.clone())
            .default_policy(config.default_policy.clone())
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Transport-level default timeout for requests without a per-attempt timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn readiness(mut self, config: ReadinessConfig) -> Self {
        self.readiness = config;
        self
    }

    /// Policy for calls whose descriptor does not carry one.
    pub fn default_policy(mut self, policy: RetryPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    /// Replace the HTTP transport (primarily for testing).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace the health probe used by a gate this builder creates.
    pub fn health_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Share an existing gate, so several clients wait on one probe sequence.
    pub fn readiness_gate(mut self, gate: ReadinessGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Skip the readiness check entirely.
    pub fn assume_ready(self) -> Self {
        self.readiness_gate(ReadinessGate::always_ready())
    }

    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session = Some(store);
        self
    }

    pub fn signal_sink(mut self, sink: Arc<dyn SessionSignalSink>) -> Self {
        self.signals = sink;
        self
    }

    /// Hooks attached to every executor the client creates.
    pub fn retry_hooks(mut self, hooks: RetryHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Build the client.
    ///
    /// Without an injected transport a base URL is mandatory; its absence is a
    /// fatal configuration error.
    pub fn build(self) -> Result<ApiClient> {
        self.default_policy.validate().map_err(|msg| {
            Error::configuration_with_context(
                msg,
                ErrorContext::new()
                    .with_field_path("default_policy")
                    .with_source("client_builder"),
            )
        })?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => {
                let base_url = self
                    .base_url
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        Error::configuration_with_context(
                            "API base URL is required",
                            ErrorContext::new()
                                .with_field_path("base_url")
                                .with_source("client_builder"),
                        )
                    })?;
                Arc::new(HttpTransport::new(base_url, self.request_timeout)?)
            }
        };

        let gate = match self.gate {
            Some(g) => g,
            None => {
                let probe: Arc<dyn HealthProbe> = match self.probe {
                    Some(p) => p,
                    None => Arc::new(TransportHealthProbe::new(
                        transport.clone(),
                        self.readiness.health_path.clone(),
                        self.readiness.probe_timeout(),
                    )),
                };
                ReadinessGate::new(probe, self.readiness)
            }
        };

        let session: Arc<dyn SessionStore> = match self.session {
            Some(s) => s,
            None => Arc::new(InMemorySessionStore::new()),
        };

        Ok(ApiClient {
            transport,
            gate,
            session,
            signals: self.signals,
            default_policy: self.default_policy,
            hooks: self.hooks,
        })
    }
}

impl Default for ApiClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
