//! Instance identity retrieval from the GCP metadata service.

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::client::{read_body_limited, ServiceClient};
use crate::config::AdapterConfig;
use crate::error::MetadataError;
use crate::provider::CSP_NAME;

/// GCP metadata service base path.
const METADATA_PATH: &str = "/computeMetadata/v1";

/// Identity token path of the default service account, below `METADATA_PATH`.
const IDENTITY_PATH: &str = "/instance/service-accounts/default/identity";

/// Token format requested from the identity endpoint.
const IDENTITY_FORMAT: &str = "full";

/// Required header for GCP metadata requests.
const METADATA_FLAVOR_HEADER: &str = "Metadata-Flavor";

/// Required header value for GCP metadata requests.
const METADATA_FLAVOR_VALUE: &str = "Google";

/// Identity returned when the metadata service cannot be queried, for
/// example when running outside of Google Cloud.
pub const IDENTITY_FALLBACK: &str = "{}";

/// Account context handed to the billing pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Signed instance identity token, or [`IDENTITY_FALLBACK`].
    pub identity: String,
    /// Name of the cloud provider, always `"google"`.
    pub cloud_provider: String,
}

/// Client for the GCP metadata service.
///
/// Every call is a single attempt. A missing metadata service is an expected
/// condition, so the infallible methods degrade to [`IDENTITY_FALLBACK`].
#[derive(Debug, Clone)]
pub struct MetadataClient {
    client: ServiceClient,
    audience: String,
    max_size: Option<usize>,
}

impl MetadataClient {
    /// Create a metadata client from the adapter configuration.
    pub fn new(config: &AdapterConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: ServiceClient::new(config.timeout, &config.metadata_url)?,
            audience: config.audience.clone(),
            max_size: Some(config.max_identity_size),
        })
    }

    /// Create a metadata client with a custom base URL (for testing).
    pub fn with_base_url(base_url: &str) -> Result<Self, reqwest::Error> {
        Self::new(&AdapterConfig::default().with_metadata_url(base_url))
    }

    /// Set the maximum accepted size of the identity response.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    /// The audience used by [`fetch_account_info`](Self::fetch_account_info).
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Build the identity URL for `audience`.
    pub fn identity_url(&self, audience: &str) -> Result<Url, MetadataError> {
        let url = format!("{}{}{}", self.client.endpoint(), METADATA_PATH, IDENTITY_PATH);
        Url::parse_with_params(&url, &[("audience", audience), ("format", IDENTITY_FORMAT)])
            .map_err(|e| MetadataError::Url(e.to_string()))
    }

    /// Fetch the instance identity token for `audience`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-2xx status, a body larger
    /// than the configured limit, or a body that is not valid UTF-8.
    pub async fn try_fetch_identity(&self, audience: &str) -> Result<String, MetadataError> {
        let url = self.identity_url(audience)?;
        tracing::debug!(%url, "requesting instance identity");

        let response = self
            .client
            .inner()
            .get(url)
            .header(METADATA_FLAVOR_HEADER, METADATA_FLAVOR_VALUE)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MetadataError::Http(status.as_u16()));
        }

        let body = read_body_limited(response, self.max_size).await?;
        String::from_utf8(body).map_err(|_| MetadataError::Utf8)
    }

    /// Fetch the instance identity token, or [`IDENTITY_FALLBACK`] if the
    /// metadata service is unreachable or answers with an error.
    pub async fn fetch_identity(&self, audience: &str) -> String {
        match self.try_fetch_identity(audience).await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!("metadata service unavailable, using fallback identity: {}", e);
                IDENTITY_FALLBACK.to_string()
            }
        }
    }

    /// Assemble the account information for the configured audience.
    pub async fn fetch_account_info(&self) -> AccountInfo {
        AccountInfo {
            identity: self.fetch_identity(&self.audience).await,
            cloud_provider: CSP_NAME.to_string(),
        }
    }
}

impl AccountInfo {
    /// Account information carrying the fallback identity.
    pub fn fallback() -> Self {
        Self {
            identity: IDENTITY_FALLBACK.to_string(),
            cloud_provider: CSP_NAME.to_string(),
        }
    }
}
