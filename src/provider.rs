//! Billing provider interface and its Google Cloud implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::AdapterConfig;
use crate::error::AdapterError;
use crate::metadata::{AccountInfo, MetadataClient};
use crate::usage::{Dimensions, StatusReport, SubmissionStatus, UsageReporter};

/// Identifier of this cloud service provider.
pub const CSP_NAME: &str = "google";

/// Capabilities a billing orchestrator needs from a cloud provider adapter.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Name of the cloud service provider.
    fn name(&self) -> &'static str;

    /// One-time initialization before the first billing cycle.
    async fn setup(&self);

    /// Account context for the running instance. Never fails.
    async fn account_info(&self) -> AccountInfo;

    /// Report usage for every dimension and return one status per dimension.
    async fn meter_billing(
        &self,
        dimensions: &Dimensions,
        timestamp: DateTime<Utc>,
        dry_run: bool,
    ) -> StatusReport;
}

/// Google Cloud adapter backed by the metadata service and ubbagent.
#[derive(Debug, Clone)]
pub struct GoogleBillingAdapter {
    metadata: MetadataClient,
    reporter: UsageReporter,
}

impl GoogleBillingAdapter {
    /// Build the adapter's clients from `config`.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::Client` if an HTTP client cannot be built.
    pub fn new(config: &AdapterConfig) -> Result<Self, AdapterError> {
        Ok(Self {
            metadata: MetadataClient::new(config)?,
            reporter: UsageReporter::new(config)?,
        })
    }

    /// The metadata client used for account information.
    pub fn metadata(&self) -> &MetadataClient {
        &self.metadata
    }
}

#[async_trait]
impl BillingProvider for GoogleBillingAdapter {
    fn name(&self) -> &'static str {
        CSP_NAME
    }

    async fn setup(&self) {
        tracing::debug!(report_url = %self.reporter.endpoint(), "google billing adapter ready");
    }

    async fn account_info(&self) -> AccountInfo {
        self.metadata.fetch_account_info().await
    }

    async fn meter_billing(
        &self,
        dimensions: &Dimensions,
        timestamp: DateTime<Utc>,
        dry_run: bool,
    ) -> StatusReport {
        self.reporter.submit(dimensions, &timestamp, dry_run).await
    }
}

/// Initialize the adapter. Nothing needs preparing for Google Cloud.
pub async fn setup_adapter(config: &AdapterConfig) {
    tracing::debug!(report_url = %config.report_url, "google billing adapter ready");
}

/// Name of the cloud service provider, independent of `config`.
pub fn get_csp_name(_config: &AdapterConfig) -> &'static str {
    CSP_NAME
}

/// Account information for the running instance.
///
/// Falls back to [`AccountInfo::fallback`] if the adapter cannot be built.
pub async fn get_account_info(config: &AdapterConfig) -> AccountInfo {
    match GoogleBillingAdapter::new(config) {
        Ok(adapter) => adapter.account_info().await,
        Err(e) => {
            tracing::warn!("using fallback identity: {}", e);
            AccountInfo::fallback()
        }
    }
}

/// Report usage for `dimensions` at `timestamp`.
///
/// Every dimension gets an entry in the returned report. If the adapter
/// cannot be built, every dimension is reported as failed.
pub async fn meter_billing(
    config: &AdapterConfig,
    dimensions: &Dimensions,
    timestamp: DateTime<Utc>,
    dry_run: bool,
) -> StatusReport {
    match GoogleBillingAdapter::new(config) {
        Ok(adapter) => adapter.meter_billing(dimensions, timestamp, dry_run).await,
        Err(e) => dimensions
            .keys()
            .map(|name| {
                let status = SubmissionStatus::failed(name, &e);
                if let Some(msg) = status.error() {
                    tracing::error!("{}", msg);
                }
                (name.clone(), status)
            })
            .collect(),
    }
}
