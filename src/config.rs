//! Configuration loader for the `merida-backend` binaries.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). The HTTP API and every Lambda handler build one
//! [`Config`] at process start and pass it by reference from there on, so no
//! other module reads `env::var` directly.
use std::env;

use anyhow::{anyhow, Result};

/// Web client origins allowed when `FRONTEND_ORIGIN` is unset.
pub const DEFAULT_FRONTEND_ORIGINS: &[&str] = &[
    "http://eliseo-app-tic.s3-website.us-east-2.amazonaws.com",
    "http://localhost:5173",
];

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Read an optional string environment variable, treating blanks as unset.
macro_rules! optional_env {
    ($var_name:expr) => {
        env::var($var_name).ok().filter(|v| !v.trim().is_empty())
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// DynamoDB single-table name.
    pub table_name: String,

    /// Custom AWS endpoint (LocalStack); `None` uses the default resolver.
    pub aws_endpoint_url: Option<String>,

    /// SNS topic receiving alerts and holding responsible subscriptions.
    pub alerts_topic_arn: Option<String>,

    /// Brand shown in alert subjects and footers.
    pub alert_brand: String,

    /// Port the HTTP API binds to.
    pub http_port: u16,

    /// Origins allowed by the API's CORS layer; `["*"]` allows any.
    pub frontend_origins: Vec<String>,

    /// Default `limit` for history and irrigation queries.
    pub history_limit: u32,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DYNAMO_TABLE_NAME` – DynamoDB table holding every entity
///
/// Optional:
/// - `AWS_ENDPOINT_URL` – custom AWS endpoint (default: SDK resolution)
/// - `ALERTS_TOPIC_ARN` – SNS topic for alerts (default: unset, publishing disabled)
/// - `ALERT_BRAND` – brand used in alert messages (default: `MERIDA`)
/// - `HTTP_PORT` – API listen port (default: 8080)
/// - `FRONTEND_ORIGIN` – comma-separated CORS origins or `*` (default: the web client origins)
/// - `HISTORY_LIMIT` – default history page size (default: 100)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let table_name = require_env!("DYNAMO_TABLE_NAME");
    let aws_endpoint_url = optional_env!("AWS_ENDPOINT_URL");
    let alerts_topic_arn = optional_env!("ALERTS_TOPIC_ARN");
    let alert_brand = optional_env!("ALERT_BRAND").unwrap_or_else(|| "MERIDA".to_string());
    let http_port = parse_env_u32!("HTTP_PORT", 8080);
    let history_limit = parse_env_u32!("HISTORY_LIMIT", 100);
    let frontend_origins = optional_env!("FRONTEND_ORIGIN")
        .map(|v| parse_origins(&v))
        .unwrap_or_else(default_origins);

    let http_port =
        u16::try_from(http_port).map_err(|_| anyhow!("Invalid HTTP_PORT: {}", http_port))?;

    Ok(Config {
        table_name,
        aws_endpoint_url,
        alerts_topic_arn,
        alert_brand,
        http_port,
        frontend_origins,
        history_limit,
    })
}

fn default_origins() -> Vec<String> {
    DEFAULT_FRONTEND_ORIGINS.iter().map(|o| o.to_string()).collect()
}

/// Split a comma-separated origin list, dropping blanks.
fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    /// Configuration used by tests and local tooling.
    pub fn for_table(table_name: impl Into<String>) -> Self {
        // ---
        Self {
            table_name: table_name.into(),
            aws_endpoint_url: None,
            alerts_topic_arn: None,
            alert_brand: "MERIDA".to_string(),
            http_port: 8080,
            frontend_origins: default_origins(),
            history_limit: 100,
        }
    }

    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        let unset = "<unset>";

        tracing::info!("Configuration loaded:");
        tracing::info!("  DYNAMO_TABLE_NAME : {}", self.table_name);
        tracing::info!(
            "  AWS_ENDPOINT_URL  : {}",
            self.aws_endpoint_url.as_deref().unwrap_or(unset)
        );
        tracing::info!(
            "  ALERTS_TOPIC_ARN  : {}",
            self.alerts_topic_arn.as_deref().unwrap_or(unset)
        );
        tracing::info!("  ALERT_BRAND       : {}", self.alert_brand);
        tracing::info!("  HTTP_PORT         : {}", self.http_port);
        tracing::info!("  FRONTEND_ORIGIN   : {}", self.frontend_origins.join(","));
        tracing::info!("  HISTORY_LIMIT     : {}", self.history_limit);
    }

    /// Shared AWS SDK configuration honouring `aws_endpoint_url`.
    pub async fn aws_sdk_config(&self) -> aws_config::SdkConfig {
        // ---
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(endpoint) = &self.aws_endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        loader.load().await
    }
}
