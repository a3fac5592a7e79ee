//! Google Cloud billing adapter.
//!
//! Reports metered usage for billable dimensions to the local ubbagent
//! sidecar and retrieves the instance identity from the GCP metadata
//! service.
//!
//! # Example
//!
//! ```ignore
//! use chrono::Utc;
//! use csp_billing_adapter_google::{
//!     AdapterConfig, BillingProvider, Dimensions, GoogleBillingAdapter,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), csp_billing_adapter_google::AdapterError> {
//!     let adapter = GoogleBillingAdapter::new(&AdapterConfig::default())?;
//!
//!     // Identity falls back to "{}" outside of Google Cloud
//!     let account = adapter.account_info().await;
//!
//!     let dimensions = Dimensions::from([("tier_1".to_string(), 10)]);
//!     let report = adapter.meter_billing(&dimensions, Utc::now(), false).await;
//!     for (dimension, status) in &report {
//!         println!("{}: {:?}", dimension, status);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Failure handling
//!
//! | Operation | Retries | On failure |
//! |-----------|---------|------------|
//! | Usage submission | 3 attempts per dimension | `failed` entry for that dimension |
//! | Identity fetch | none | identity `"{}"` |

mod client;
mod config;
mod error;
mod metadata;
mod provider;
mod retry;
mod usage;

pub use config::AdapterConfig;
pub use error::{AdapterError, MetadataError, ReportError};
pub use metadata::{AccountInfo, MetadataClient, IDENTITY_FALLBACK};
pub use provider::{
    get_account_info, get_csp_name, meter_billing, setup_adapter, BillingProvider,
    GoogleBillingAdapter, CSP_NAME,
};
pub use retry::{retry, RetryPolicy};
pub use usage::{Dimensions, StatusReport, SubmissionStatus, UsageRecord, UsageReporter, UsageValue};
