//! Endpoint and tuning values injected into the adapter components.

use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::client::DEFAULT_TIMEOUT;
use crate::retry::RetryPolicy;

/// Default metadata service base URL (link-local address).
pub const DEFAULT_METADATA_URL: &str = "http://169.254.169.254";

/// Audience requested for the billing identity token.
pub const DEFAULT_AUDIENCE: &str = "http://smt-gce.susecloud.net";

/// Usage report endpoint of the local ubbagent sidecar.
pub const DEFAULT_REPORT_URL: &str = "http://localhost:4567/report";

/// Largest identity response accepted from the metadata service.
pub const DEFAULT_MAX_IDENTITY_SIZE: usize = 64 * 1024;

/// Configuration for the Google billing adapter.
///
/// Every field has a default, so an empty JSON object deserializes to the
/// production endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Base URL of the metadata service.
    pub metadata_url: String,

    /// Audience for the instance identity token.
    pub audience: String,

    /// Full URL of the sidecar report endpoint.
    pub report_url: String,

    /// Timeout applied to every network call.
    #[serde(rename = "timeout_ms", deserialize_with = "millis")]
    pub timeout: Duration,

    /// Maximum accepted size of the identity response, in bytes.
    pub max_identity_size: usize,

    /// Retry policy for usage submissions.
    pub retry: RetryPolicy,
}

impl AdapterConfig {
    /// Override the metadata service base URL.
    pub fn with_metadata_url(mut self, url: impl Into<String>) -> Self {
        self.metadata_url = url.into();
        self
    }

    /// Override the identity token audience.
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }

    /// Override the sidecar report URL.
    pub fn with_report_url(mut self, url: impl Into<String>) -> Self {
        self.report_url = url.into();
        self
    }

    /// Override the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the identity response size limit.
    pub fn with_max_identity_size(mut self, max_size: usize) -> Self {
        self.max_identity_size = max_size;
        self
    }

    /// Override the submission retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            metadata_url: DEFAULT_METADATA_URL.to_string(),
            audience: DEFAULT_AUDIENCE.to_string(),
            report_url: DEFAULT_REPORT_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_identity_size: DEFAULT_MAX_IDENTITY_SIZE,
            retry: RetryPolicy::default(),
        }
    }
}

/// Deserialize a `Duration` from an integer number of milliseconds.
pub(crate) fn millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AdapterConfig::default();
        assert_eq!(config.metadata_url, "http://169.254.169.254");
        assert_eq!(config.audience, "http://smt-gce.susecloud.net");
        assert_eq!(config.report_url, "http://localhost:4567/report");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: AdapterConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AdapterConfig::default());
    }

    #[test]
    fn test_partial_json_overrides() {
        let config: AdapterConfig = serde_json::from_str(
            r#"{"report_url": "http://sidecar:4567/report", "timeout_ms": 250, "retry": {"delay_ms": 0}}"#,
        )
        .unwrap();

        assert_eq!(config.report_url, "http://sidecar:4567/report");
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.retry.delay, Duration::ZERO);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.metadata_url, DEFAULT_METADATA_URL);
    }

    #[test]
    fn test_builders() {
        let config = AdapterConfig::default()
            .with_metadata_url("http://localhost:8080")
            .with_report_url("http://localhost:9090/report")
            .with_audience("aud")
            .with_retry(RetryPolicy::immediate(1));

        assert_eq!(config.metadata_url, "http://localhost:8080");
        assert_eq!(config.report_url, "http://localhost:9090/report");
        assert_eq!(config.audience, "aud");
        assert_eq!(config.retry.max_attempts, 1);
    }
}
