//! CLI binary for the Google billing adapter.

use std::process::ExitCode;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use csp_billing_adapter_google::{
    get_account_info, get_csp_name, meter_billing, AdapterConfig, Dimensions, SubmissionStatus,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "csp-billing-adapter-google")]
#[command(
    author,
    version,
    about = "Report metered usage and instance identity on Google Cloud"
)]
struct Cli {
    #[command(flatten)]
    endpoints: Endpoints,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Endpoints {
    /// Base URL of the metadata service
    #[arg(long, global = true)]
    metadata_url: Option<String>,

    /// Usage report URL of the ubbagent sidecar
    #[arg(long, global = true)]
    report_url: Option<String>,

    /// Audience of the identity token
    #[arg(long, global = true)]
    audience: Option<String>,

    /// Timeout for each network call, in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the cloud service provider name
    Name,

    /// Print account information as JSON
    AccountInfo,

    /// Submit usage for one or more dimensions
    Meter {
        /// Usage as NAME=QUANTITY, may be repeated
        #[arg(short, long = "dimension", value_parser = parse_dimension, required = true)]
        dimensions: Vec<(String, i64)>,

        /// Reporting instant (RFC 3339), defaults to now
        #[arg(short, long)]
        timestamp: Option<DateTime<Utc>>,

        /// Mark the submission as a dry run
        #[arg(long)]
        dry_run: bool,
    },
}

fn parse_dimension(s: &str) -> Result<(String, i64), String> {
    let (name, quantity) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=QUANTITY, got: {}", s))?;
    if name.is_empty() {
        return Err(format!("empty dimension name in: {}", s));
    }
    let quantity = quantity
        .parse::<i64>()
        .map_err(|e| format!("invalid quantity for {}: {}", name, e))?;
    Ok((name.to_string(), quantity))
}

/// Key the parsed dimensions by name, rejecting repeated names.
fn collect_dimensions(pairs: Vec<(String, i64)>) -> Result<Dimensions, String> {
    let mut dimensions = Dimensions::new();
    for (name, quantity) in pairs {
        if dimensions.contains_key(&name) {
            return Err(format!("dimension {} given more than once", name));
        }
        dimensions.insert(name, quantity);
    }
    Ok(dimensions)
}

impl Endpoints {
    fn into_config(self) -> AdapterConfig {
        let mut config = AdapterConfig::default();
        if let Some(url) = self.metadata_url {
            config = config.with_metadata_url(url);
        }
        if let Some(url) = self.report_url {
            config = config.with_report_url(url);
        }
        if let Some(audience) = self.audience {
            config = config.with_audience(audience);
        }
        if let Some(ms) = self.timeout_ms {
            config = config.with_timeout(Duration::from_millis(ms));
        }
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, serde_json::Error> {
    let config = cli.endpoints.into_config();

    match cli.command {
        Commands::Name => {
            println!("{}", get_csp_name(&config));
            Ok(ExitCode::SUCCESS)
        }

        Commands::AccountInfo => {
            let info = get_account_info(&config).await;
            println!("{}", serde_json::to_string_pretty(&info)?);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Meter {
            dimensions,
            timestamp,
            dry_run,
        } => {
            let dimensions = match collect_dimensions(dimensions) {
                Ok(dimensions) => dimensions,
                Err(e) => {
                    eprintln!("error: {}", e);
                    return Ok(ExitCode::FAILURE);
                }
            };
            let timestamp = timestamp.unwrap_or_else(Utc::now);
            let report = meter_billing(&config, &dimensions, timestamp, dry_run).await;
            println!("{}", serde_json::to_string_pretty(&report)?);

            if report.values().all(SubmissionStatus::is_submitted) {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dimension() {
        assert_eq!(
            parse_dimension("tier_1=10").unwrap(),
            ("tier_1".to_string(), 10)
        );
        assert_eq!(
            parse_dimension("credits=-3").unwrap(),
            ("credits".to_string(), -3)
        );
    }

    #[test]
    fn test_parse_dimension_rejects_malformed() {
        assert!(parse_dimension("tier_1").is_err());
        assert!(parse_dimension("=10").is_err());
        assert!(parse_dimension("tier_1=ten").is_err());
    }

    #[test]
    fn test_collect_dimensions_rejects_repeats() {
        let dimensions =
            collect_dimensions(vec![("tier_1".to_string(), 10), ("tier_2".to_string(), 5)])
                .unwrap();
        assert_eq!(dimensions.len(), 2);

        let err = collect_dimensions(vec![("tier_1".to_string(), 10), ("tier_1".to_string(), 5)])
            .unwrap_err();
        assert!(err.contains("tier_1"));
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "csp-billing-adapter-google",
            "--report-url",
            "http://sidecar:4567/report",
            "--timeout-ms",
            "100",
            "meter",
            "-d",
            "tier_1=10",
            "--dry-run",
        ]);
        let config = cli.endpoints.into_config();
        assert_eq!(config.report_url, "http://sidecar:4567/report");
        assert_eq!(config.timeout, Duration::from_millis(100));
        assert_eq!(config.metadata_url, "http://169.254.169.254");
    }
}
