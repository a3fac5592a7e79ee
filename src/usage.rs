//! Metered usage submission to the ubbagent sidecar.
//!
//! Each dimension is turned into its own [`UsageRecord`] and POSTed to the
//! sidecar's report endpoint. Submissions run one after another, each under
//! the configured [`RetryPolicy`], and a failure is recorded for that
//! dimension only.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

use crate::client::ServiceClient;
use crate::config::AdapterConfig;
use crate::error::ReportError;
use crate::retry::{retry, RetryPolicy};

/// Content type of the usage report body.
const JSON_CONTENT_TYPE: &str = "application/json";

/// One usage report for a single dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    /// Dimension identifier.
    pub name: String,
    /// Start of the reporting interval (RFC 3339).
    pub start_time: String,
    /// End of the reporting interval (RFC 3339).
    pub end_time: String,
    /// Reported quantity.
    pub value: UsageValue,
}

/// Typed usage quantity as expected by the sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageValue {
    /// Usage quantity, may be negative.
    #[serde(rename = "int64value")]
    pub int64_value: i64,
}

impl UsageRecord {
    /// Build a record whose start and end are both `timestamp`.
    pub fn new(name: impl Into<String>, quantity: i64, timestamp: &DateTime<Utc>) -> Self {
        let instant = timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, false);
        Self {
            name: name.into(),
            start_time: instant.clone(),
            end_time: instant,
            value: UsageValue {
                int64_value: quantity,
            },
        }
    }
}

/// Outcome of submitting one dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SubmissionStatus {
    /// The sidecar accepted the record.
    Submitted,
    /// Every attempt failed; `error` names the dimension and the last cause.
    Failed { error: String },
}

impl SubmissionStatus {
    /// Failure status for `dimension` caused by `cause`.
    pub fn failed(dimension: &str, cause: impl std::fmt::Display) -> Self {
        SubmissionStatus::Failed {
            error: format!("Failed to meter bill dimension {}: {}", dimension, cause),
        }
    }

    /// Whether the sidecar accepted the record.
    pub fn is_submitted(&self) -> bool {
        matches!(self, SubmissionStatus::Submitted)
    }

    /// The error message, present only for failed submissions.
    pub fn error(&self) -> Option<&str> {
        match self {
            SubmissionStatus::Submitted => None,
            SubmissionStatus::Failed { error } => Some(error),
        }
    }
}

/// Usage quantities keyed by dimension name.
///
/// A name can appear only once, so every dimension maps to exactly one
/// record and one report entry.
pub type Dimensions = BTreeMap<String, i64>;

/// Per-dimension submission results, keyed by dimension name.
pub type StatusReport = BTreeMap<String, SubmissionStatus>;

/// Submits usage records to the sidecar report endpoint.
#[derive(Debug, Clone)]
pub struct UsageReporter {
    client: ServiceClient,
    retry: RetryPolicy,
}

impl UsageReporter {
    /// Create a reporter from the adapter configuration.
    pub fn new(config: &AdapterConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: ServiceClient::new(config.timeout, &config.report_url)?,
            retry: config.retry.clone(),
        })
    }

    /// Create a reporter for a custom report URL (for testing).
    pub fn with_report_url(report_url: &str) -> Result<Self, reqwest::Error> {
        Self::new(&AdapterConfig::default().with_report_url(report_url))
    }

    /// The report URL records are POSTed to.
    pub fn endpoint(&self) -> &str {
        self.client.endpoint()
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Submit one record per dimension and collect the outcomes.
    ///
    /// Dimensions are submitted in map order. A dimension that fails
    /// after exhausting its retries is reported as failed and does not
    /// affect the remaining ones. `dry_run` does not suppress the request:
    /// the sidecar has no dry-run mode.
    pub async fn submit(
        &self,
        dimensions: &Dimensions,
        timestamp: &DateTime<Utc>,
        dry_run: bool,
    ) -> StatusReport {
        let mut report = StatusReport::new();

        for (name, &quantity) in dimensions {
            let record = UsageRecord::new(name.as_str(), quantity, timestamp);

            let status = match self.submit_record(&record, dry_run).await {
                Ok(()) => SubmissionStatus::Submitted,
                Err(e) => {
                    let status = SubmissionStatus::failed(name, &e);
                    if let Some(msg) = status.error() {
                        tracing::error!("{}", msg);
                    }
                    status
                }
            };
            report.insert(name.clone(), status);
        }

        report
    }

    /// Serialize and POST a single record under the retry policy.
    async fn submit_record(&self, record: &UsageRecord, dry_run: bool) -> Result<(), ReportError> {
        let body = serde_json::to_vec(record)?;
        tracing::debug!(
            dimension = %record.name,
            quantity = record.value.int64_value,
            dry_run,
            "reporting usage"
        );

        let description = format!("metering dimension {}", record.name);
        retry(
            &self.retry,
            &description,
            || self.post(body.clone()),
            ReportError::is_retryable,
        )
        .await
    }

    async fn post(&self, body: Vec<u8>) -> Result<(), ReportError> {
        let response = self
            .client
            .inner()
            .post(self.client.endpoint())
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::Http(status.as_u16()));
        }

        let body = response.text().await?;
        tracing::debug!(response = %body, "sidecar accepted usage report");
        Ok(())
    }
}
