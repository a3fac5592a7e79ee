//! Error types for metadata retrieval and usage reporting.

use thiserror::Error;

/// Errors that can occur when querying the GCP metadata service.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// HTTP error with status code.
    #[error("http {0}")]
    Http(u16),

    /// Response was not valid UTF-8.
    #[error("invalid utf-8")]
    Utf8,

    /// HTTP request error.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The identity URL could not be built from the configured base.
    #[error("invalid metadata url: {0}")]
    Url(String),

    /// Response exceeds maximum allowed size.
    #[error("response too large: {0} bytes exceeds limit of {1} bytes")]
    TooLarge(usize, usize),
}

/// Errors that can occur when submitting a usage record to the sidecar.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Transport failure: connection refused, DNS failure, timeout.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The sidecar answered with a non-2xx status.
    #[error("http {0}")]
    Http(u16),

    /// The usage record could not be serialized.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReportError {
    /// Whether another attempt may succeed.
    ///
    /// Transport and protocol errors are transient; serialization errors
    /// will fail identically on every attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReportError::Request(_) | ReportError::Http(_))
    }
}

/// Errors raised while assembling the adapter itself.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The underlying HTTP client could not be constructed.
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(MetadataError::Http(404).to_string(), "http 404");
        assert_eq!(MetadataError::Utf8.to_string(), "invalid utf-8");
        assert_eq!(
            MetadataError::TooLarge(10, 5).to_string(),
            "response too large: 10 bytes exceeds limit of 5 bytes"
        );
        assert_eq!(ReportError::Http(500).to_string(), "http 500");
    }

    #[test]
    fn test_report_error_retryable() {
        assert!(ReportError::Http(503).is_retryable());

        let json_err = serde_json::from_str::<i64>("not a number").unwrap_err();
        assert!(!ReportError::Json(json_err).is_retryable());
    }
}
