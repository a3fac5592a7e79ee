//! HTTP client wrapper shared by the metadata and sidecar requests.

use std::time::Duration;

use reqwest::{Client, Response};

use crate::error::MetadataError;

/// Default timeout for a single network call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client bound to one service endpoint.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    inner: Client,
    endpoint: String,
}

impl ServiceClient {
    /// Create a new client with the specified timeout and endpoint.
    pub fn new(timeout: Duration, endpoint: &str) -> Result<Self, reqwest::Error> {
        let inner = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            inner,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Get the underlying reqwest client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// Get the endpoint, without a trailing slash.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Read a response body, failing with `TooLarge` once it exceeds `max_size`.
///
/// Identity tokens are a few KiB; anything far larger is not a token.
pub async fn read_body_limited(
    response: Response,
    max_size: Option<usize>,
) -> Result<Vec<u8>, MetadataError> {
    let Some(max_size) = max_size else {
        return Ok(response.bytes().await?.to_vec());
    };

    if let Some(content_length) = response.content_length() {
        if content_length as usize > max_size {
            return Err(MetadataError::TooLarge(content_length as usize, max_size));
        }
    }

    // Content-Length may be absent or lie, so the stream is checked as well.
    let capacity = response
        .content_length()
        .map(|cl| (cl as usize).min(max_size))
        .unwrap_or(max_size.min(8192));
    let mut body = Vec::with_capacity(capacity);

    let mut stream = response;
    while let Some(chunk) = stream.chunk().await? {
        let total = body.len().saturating_add(chunk.len());
        if total > max_size {
            return Err(MetadataError::TooLarge(total, max_size));
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeout() {
        assert_eq!(DEFAULT_TIMEOUT, Duration::from_secs(5));
    }

    #[test]
    fn test_client_endpoint() {
        let client = ServiceClient::new(DEFAULT_TIMEOUT, "http://localhost:4567/report").unwrap();
        assert_eq!(client.endpoint(), "http://localhost:4567/report");
    }

    #[test]
    fn test_client_strips_trailing_slash() {
        let client = ServiceClient::new(DEFAULT_TIMEOUT, "http://169.254.169.254/").unwrap();
        assert_eq!(client.endpoint(), "http://169.254.169.254");
    }
}
