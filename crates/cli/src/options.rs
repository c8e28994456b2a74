//! Command-line options.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{ensure, Result};
use clap::{Parser, ValueEnum};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One JSON object per line.
    Json,
    /// Multi-line human-readable output.
    Pretty,
}

/// Relays code-hosting webhooks to subscribed services.
#[derive(Debug, Parser)]
#[command(name = "webhook-relay", version, about)]
pub struct Options {
    /// Port to listen on.
    #[arg(long, env = "RELAY_PORT", default_value_t = 8888)]
    pub port: u16,

    /// Path to the YAML routing configuration.
    #[arg(long, env = "RELAY_CONFIG_FILE")]
    pub config_file: PathBuf,

    /// URL path webhooks are POSTed to, without the leading slash.
    #[arg(long, env = "RELAY_HANDLE_PATH", default_value = "webhook")]
    pub handle_path: String,

    /// Seconds to wait for in-flight deliveries on shutdown. 0 waits forever.
    #[arg(long, env = "RELAY_DRAIN_TIMEOUT_SECS", default_value_t = 30)]
    pub drain_timeout_secs: u64,

    /// Per-request timeout for outbound deliveries, in seconds. 0 disables it.
    #[arg(long, env = "RELAY_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Retries after the first attempt when a delivery fails to connect.
    #[arg(long, env = "RELAY_MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    /// Log output format.
    #[arg(long, env = "RELAY_LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,

    /// OTLP gRPC endpoint for span export. Export is off when unset.
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

impl Options {
    /// Checks values clap cannot check on its own.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.port != 0, "--port must be non-zero");
        ensure!(
            !self.handle_path().is_empty(),
            "--handle-path must not be empty"
        );
        ensure!(
            !self.config_file.as_os_str().is_empty(),
            "--config-file must not be empty"
        );
        Ok(())
    }

    /// Handle path with surrounding slashes removed.
    pub fn handle_path(&self) -> &str {
        self.handle_path.trim().trim_matches('/')
    }

    /// Drain bound, `None` meaning unbounded.
    pub fn drain_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.drain_timeout_secs)
    }

    /// Outbound request timeout, `None` meaning disabled.
    pub fn request_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.request_timeout_secs)
    }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
