//! Client configuration loading.
//!
//! Configuration comes from the environment (`JLPT_*` variables) or from a
//! YAML document. Loaded values are validated before a client is built;
//! violations are fatal [`Error::Configuration`] errors.

use crate::resilience::readiness::ReadinessConfig;
use crate::resilience::retry::RetryPolicy;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

pub const ENV_BASE_URL: &str = "JLPT_API_BASE_URL";
pub const ENV_HEALTH_PATH: &str = "JLPT_HEALTH_PATH";
pub const ENV_HTTP_TIMEOUT_MS: &str = "JLPT_HTTP_TIMEOUT_MS";
pub const ENV_READY_MAX_ATTEMPTS: &str = "JLPT_READY_MAX_ATTEMPTS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API root, e.g. `http://localhost:8080/api`
    pub base_url: String,
    /// Transport-level timeout for requests that carry no per-attempt timeout
    pub request_timeout_ms: u64,
    pub readiness: ReadinessConfig,
    /// Policy for ordinary interactive calls
    pub default_policy: RetryPolicy,
    /// Policy for long-running bulk operations (imports, generation)
    pub bulk_policy: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            request_timeout_ms: 30_000,
            readiness: ReadinessConfig::default(),
            default_policy: RetryPolicy::interactive(),
            bulk_policy: RetryPolicy::bulk(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Load from `JLPT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url = lookup(ENV_BASE_URL)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                Error::configuration_with_context(
                    format!("{} is not set", ENV_BASE_URL),
                    ErrorContext::new()
                        .with_field_path("base_url")
                        .with_source("env"),
                )
            })?;

        let mut config = Self::new(base_url.trim());

        if let Some(path) = lookup(ENV_HEALTH_PATH).filter(|s| !s.trim().is_empty()) {
            config.readiness.health_path = path.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_HTTP_TIMEOUT_MS) {
            config.request_timeout_ms = parse_number(ENV_HTTP_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_READY_MAX_ATTEMPTS) {
            let attempts: u64 = parse_number(ENV_READY_MAX_ATTEMPTS, &raw)?;
            config.readiness.max_attempts = u32::try_from(attempts).unwrap_or(u32::MAX).max(1);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content).map_err(|e| {
            Error::configuration_with_context(
                format!("Invalid client configuration: {}", e),
                ErrorContext::new().with_source("yaml"),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// Check the base URL and every policy.
    pub fn validate(&self) -> Result<()> {
        let base_url = self.base_url.trim();
        if base_url.is_empty() {
            return Err(Error::configuration_with_context(
                "API base URL is required",
                ErrorContext::new().with_field_path("base_url"),
            ));
        }
        let parsed = url::Url::parse(base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("Invalid base URL '{}': {}", base_url, e),
                ErrorContext::new().with_field_path("base_url"),
            )
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::configuration_with_context(
                format!("Unsupported URL scheme '{}'", parsed.scheme()),
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_details("expected http or https"),
            ));
        }

        for (field, policy) in [
            ("default_policy", &self.default_policy),
            ("bulk_policy", &self.bulk_policy),
        ] {
            policy.validate().map_err(|msg| {
                Error::configuration_with_context(
                    msg,
                    ErrorContext::new().with_field_path(field),
                )
            })?;
        }

        if self.readiness.initial_delay_ms > self.readiness.max_delay_ms {
            return Err(Error::configuration_with_context(
                "initial delay exceeds max delay",
                ErrorContext::new().with_field_path("readiness"),
            ));
        }
        Ok(())
    }
}

fn parse_number(key: &str, raw: &str) -> Result<u64> {
    raw.trim().parse::<u64>().map_err(|_| {
        Error::configuration_with_context(
            format!("{} must be a non-negative integer", key),
            ErrorContext::new()
                .with_field_path(key)
                .with_details(format!("got '{}'", raw)),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_requires_base_url() {
        let err = ClientConfig::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("base_url")
        );
    }

    #[test]
    fn env_overrides_apply() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_BASE_URL, " http://localhost:8080/api "),
            (ENV_HEALTH_PATH, "/actuator/health"),
            (ENV_HTTP_TIMEOUT_MS, "2500"),
            (ENV_READY_MAX_ATTEMPTS, "0"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "http://localhost:8080/api");
        assert_eq!(config.readiness.health_path, "/actuator/health");
        assert_eq!(config.request_timeout_ms, 2500);
        assert_eq!(config.readiness.max_attempts, 1);
    }

    #[test]
    fn env_rejects_garbage_numbers() {
        let err = ClientConfig::from_lookup(lookup(&[
            (ENV_BASE_URL, "http://localhost:8080"),
            (ENV_HTTP_TIMEOUT_MS, "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn yaml_fills_defaults() {
        let config = ClientConfig::from_yaml_str(
            r#"
base_url: https://jlpt.example.com/api
readiness:
  max_attempts: 3
default_policy:
  max_retries: 1
  initial_delay_ms: 100
  max_delay_ms: 200
"#,
        )
        .unwrap();
        assert_eq!(config.readiness.max_attempts, 3);
        assert_eq!(config.readiness.health_path, "/health");
        assert_eq!(config.default_policy.max_retries, 1);
        assert_eq!(config.default_policy.timeout_ms, None);
        assert_eq!(config.bulk_policy, RetryPolicy::bulk());
        assert_eq!(config.request_timeout_ms, 30_000);
    }

    #[test]
    fn rejects_non_http_scheme() {
        let err = ClientConfig::new("ftp://example.com").validate().unwrap_err();
        assert!(err.to_string().contains("ftp"));
        assert!(ClientConfig::new("not a url").validate().is_err());
        assert!(ClientConfig::new("").validate().is_err());
    }

    #[test]
    fn rejects_inverted_policy_delays() {
        let mut config = ClientConfig::new("http://localhost:8080");
        config.bulk_policy.initial_delay_ms = 60_000;
        let err = config.validate().unwrap_err();
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("bulk_policy")
        );
    }

    #[test]
    fn missing_yaml_file_is_io_error() {
        let err = ClientConfig::from_yaml_file("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
